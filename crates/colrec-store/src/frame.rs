//! On-disk framing for artifacts.
//!
//! ```text
//! [4 bytes: magic "CREC"]
//! [4 bytes: format version (big-endian u32)]
//! repeated:
//!   [4 bytes: payload length (little-endian u32)]
//!   [4 bytes: CRC32 of payload (little-endian u32)]
//!   [N bytes: payload (bincode-serialized Frame)]
//! ```
//!
//! Frames are only ever appended. A reader takes the longest prefix of
//! well-formed frames; anything after a torn or checksum-failing frame is
//! not part of the artifact.

use colrec_types::{ColumnData, DatasetSchema};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Compression;
use crate::error::{StoreError, StoreResult};

pub const MAGIC: &[u8; 4] = b"CREC";
pub const FORMAT_VERSION: u32 = 1;
/// Magic + version.
pub const FILE_HEADER_SIZE: usize = 8;
/// Length + CRC.
pub const FRAME_HEADER_SIZE: usize = 8;

/// How a chunk's column bytes are stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkEncoding {
    Raw,
    Zstd,
}

/// A single persisted structural or data record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Frame {
    Group {
        name: String,
    },
    Dataset {
        group: String,
        name: String,
        schema: DatasetSchema,
        chunk_rows: u32,
    },
    /// `rows` consecutive rows starting at `first_row`.
    Chunk {
        group: String,
        name: String,
        first_row: u64,
        rows: u32,
        encoding: ChunkEncoding,
        data: Vec<u8>,
    },
}

impl Frame {
    /// Build a chunk frame from buffered rows.
    pub fn chunk(
        group: &str,
        name: &str,
        first_row: u64,
        rows: usize,
        column: &ColumnData,
        compression: Compression,
    ) -> StoreResult<Self> {
        let raw = bincode::serialize(column)?;
        let (encoding, data) = match compression {
            Compression::None => (ChunkEncoding::Raw, raw),
            Compression::Zstd { level } => {
                let packed = zstd::encode_all(raw.as_slice(), level)
                    .map_err(|e| StoreError::Compression(e.to_string()))?;
                (ChunkEncoding::Zstd, packed)
            }
        };
        Ok(Self::Chunk {
            group: group.to_string(),
            name: name.to_string(),
            first_row,
            rows: u32::try_from(rows)
                .map_err(|_| StoreError::Config(format!("chunk of {rows} rows is too large")))?,
            encoding,
            data,
        })
    }

    /// Serialize into a length/CRC framed buffer.
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        let payload = bincode::serialize(self)?;
        let length = u32::try_from(payload.len())
            .map_err(|_| StoreError::Serialization(format!("frame of {} bytes", payload.len())))?;
        let crc = crc32fast::hash(&payload);

        let mut buf = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
        buf.extend_from_slice(&length.to_le_bytes());
        buf.extend_from_slice(&crc.to_le_bytes());
        buf.extend_from_slice(&payload);
        Ok(buf)
    }
}

/// Decode the column stored in a chunk payload.
pub fn decode_chunk(encoding: ChunkEncoding, data: &[u8]) -> StoreResult<ColumnData> {
    let column = match encoding {
        ChunkEncoding::Raw => bincode::deserialize(data)?,
        ChunkEncoding::Zstd => {
            let raw = zstd::decode_all(data).map_err(|e| StoreError::Compression(e.to_string()))?;
            bincode::deserialize(&raw)?
        }
    };
    Ok(column)
}

pub fn file_header() -> [u8; FILE_HEADER_SIZE] {
    let mut header = [0u8; FILE_HEADER_SIZE];
    header[0..4].copy_from_slice(MAGIC);
    header[4..8].copy_from_slice(&FORMAT_VERSION.to_be_bytes());
    header
}

/// Validate the file header at the start of `data`.
pub fn check_header(path: &std::path::Path, data: &[u8]) -> StoreResult<()> {
    if data.len() < FILE_HEADER_SIZE || &data[0..4] != MAGIC {
        return Err(StoreError::InvalidMagic {
            path: path.to_path_buf(),
            actual: data[..data.len().min(4)].to_vec(),
        });
    }
    let version = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
    if version != FORMAT_VERSION {
        return Err(StoreError::UnsupportedVersion(version));
    }
    Ok(())
}

/// A frame together with the byte offset it starts at.
#[derive(Debug)]
pub struct ScannedFrame {
    pub offset: u64,
    pub frame: Frame,
}

/// Outcome of scanning an artifact body.
#[derive(Debug)]
pub struct Scan {
    pub frames: Vec<ScannedFrame>,
    /// Length of the well-formed prefix, header included.
    pub valid_len: u64,
}

/// Scan frames from a whole artifact image (header included).
///
/// Stops at the first frame that is truncated, fails its CRC, or does not
/// deserialize.
pub fn scan(data: &[u8]) -> Scan {
    let mut frames = Vec::new();
    let mut offset = FILE_HEADER_SIZE;

    while offset + FRAME_HEADER_SIZE <= data.len() {
        let header = &data[offset..offset + FRAME_HEADER_SIZE];
        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        let start = offset + FRAME_HEADER_SIZE;
        if length == 0 || start + length > data.len() {
            warn!(offset, length, file_len = data.len(), "truncated frame; ending scan");
            break;
        }
        let payload = &data[start..start + length];

        let actual_crc = crc32fast::hash(payload);
        if actual_crc != expected_crc {
            warn!(
                offset,
                expected = expected_crc,
                actual = actual_crc,
                "CRC mismatch; ending scan"
            );
            break;
        }

        match bincode::deserialize::<Frame>(payload) {
            Ok(frame) => frames.push(ScannedFrame {
                offset: offset as u64,
                frame,
            }),
            Err(e) => {
                warn!(offset, error = %e, "undecodable frame; ending scan");
                break;
            }
        }
        offset = start + length;
    }

    debug!(frames = frames.len(), valid_len = offset, "artifact scan complete");
    Scan {
        frames,
        valid_len: offset.min(data.len()) as u64,
    }
}
