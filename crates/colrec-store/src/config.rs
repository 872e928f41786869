use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Rows per chunk unless configured otherwise.
pub const DEFAULT_CHUNK_ROWS: usize = 1024;

/// Flush/sync strategy for artifact writes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` after every frame (safest, highest latency).
    EveryWrite,
    /// `fsync` on flush and close only.
    #[default]
    OnClose,
}

/// Chunk payload compression.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Compression {
    #[default]
    None,
    Zstd { level: i32 },
}

/// Configuration for a [`DatasetStore`](crate::DatasetStore).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Rows buffered per dataset before a chunk is written.
    pub chunk_rows: usize,
    pub compression: Compression,
    pub sync_mode: SyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            chunk_rows: DEFAULT_CHUNK_ROWS,
            compression: Compression::default(),
            sync_mode: SyncMode::default(),
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> StoreResult<()> {
        if self.chunk_rows == 0 || self.chunk_rows > u32::MAX as usize {
            return Err(StoreError::Config(format!(
                "chunk_rows must be in 1..={}, got {}",
                u32::MAX,
                self.chunk_rows
            )));
        }
        if let Compression::Zstd { level } = self.compression {
            if !zstd::compression_level_range().contains(&level) {
                return Err(StoreError::Config(format!("zstd level {level} out of range")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = StoreConfig::default();
        assert_eq!(c.chunk_rows, 1024);
        assert_eq!(c.compression, Compression::None);
        assert_eq!(c.sync_mode, SyncMode::OnClose);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn zero_chunk_rows_rejected() {
        let c = StoreConfig { chunk_rows: 0, ..StoreConfig::default() };
        assert!(matches!(c.validate(), Err(StoreError::Config(_))));
    }

    #[test]
    fn bad_zstd_level_rejected() {
        let c = StoreConfig {
            compression: Compression::Zstd { level: 1000 },
            ..StoreConfig::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn serde_partial() {
        let c: StoreConfig = serde_json::from_str(r#"{"chunk_rows": 16}"#).unwrap();
        assert_eq!(c.chunk_rows, 16);
        assert_eq!(c.sync_mode, SyncMode::OnClose);
        let c: StoreConfig =
            serde_json::from_str(r#"{"compression": {"kind": "zstd", "level": 3}}"#).unwrap();
        assert_eq!(c.compression, Compression::Zstd { level: 3 });
    }
}
