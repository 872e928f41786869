use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use colrec_types::{ColumnData, DatasetSchema, FieldValue};
use serde::Serialize;

use crate::error::{StoreError, StoreResult};
use crate::frame::{self, Frame, ScannedFrame};

/// A fully decoded dataset.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DatasetContents {
    pub schema: DatasetSchema,
    pub chunk_rows: u32,
    pub chunks: usize,
    pub column: ColumnData,
}

impl DatasetContents {
    pub fn row_count(&self) -> u64 {
        self.column.row_count(self.schema.shape) as u64
    }
}

/// Read-only view of an artifact.
///
/// Decodes the valid prefix of the file into memory. Unlike opening for
/// write, a torn tail is reported through [`Self::trailing_bytes`] but the
/// file is left as is.
#[derive(Debug)]
pub struct ArtifactReader {
    path: PathBuf,
    groups: BTreeMap<String, BTreeMap<String, DatasetContents>>,
    valid_len: u64,
    file_len: u64,
}

impl ArtifactReader {
    /// Open and decode the artifact at `path`.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(path, &data)
    }

    /// Decode an artifact image. `path` is only used in error messages.
    pub fn from_bytes(path: &Path, data: &[u8]) -> StoreResult<Self> {
        frame::check_header(path, data)?;
        let scan = frame::scan(data);

        let mut groups: BTreeMap<String, BTreeMap<String, DatasetContents>> = BTreeMap::new();
        for ScannedFrame { offset, frame } in scan.frames {
            let corrupt = |reason: String| StoreError::Corrupt { offset, reason };
            match frame {
                Frame::Group { name } => {
                    groups.entry(name).or_default();
                }
                Frame::Dataset {
                    group,
                    name,
                    schema,
                    chunk_rows,
                } => {
                    let datasets = groups
                        .get_mut(&group)
                        .ok_or_else(|| corrupt(format!("dataset {name} in unknown group {group}")))?;
                    if datasets.contains_key(&name) {
                        return Err(corrupt(format!("duplicate dataset {group}/{name}")));
                    }
                    datasets.insert(
                        name,
                        DatasetContents {
                            schema,
                            chunk_rows,
                            chunks: 0,
                            column: ColumnData::empty(schema.element),
                        },
                    );
                }
                Frame::Chunk {
                    group,
                    name,
                    first_row,
                    rows,
                    encoding,
                    data,
                } => {
                    let dataset = groups
                        .get_mut(&group)
                        .and_then(|d| d.get_mut(&name))
                        .ok_or_else(|| corrupt(format!("chunk for unknown dataset {group}/{name}")))?;
                    if first_row != dataset.row_count() {
                        return Err(corrupt(format!(
                            "chunk for {group}/{name} starts at row {first_row}, expected {}",
                            dataset.row_count()
                        )));
                    }
                    let column = frame::decode_chunk(encoding, &data)?;
                    let expected = rows as usize * dataset.schema.shape.values_per_row();
                    if column.element_type() != dataset.schema.element || column.value_count() != expected {
                        return Err(corrupt(format!(
                            "chunk for {group}/{name} does not hold {rows} rows of {}",
                            dataset.schema
                        )));
                    }
                    dataset
                        .column
                        .extend(column)
                        .map_err(|e| corrupt(e.to_string()))?;
                    dataset.chunks += 1;
                }
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            groups,
            valid_len: scan.valid_len,
            file_len: data.len() as u64,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn groups(&self) -> Vec<String> {
        self.groups.keys().cloned().collect()
    }

    pub fn fields(&self, group: &str) -> Vec<String> {
        self.groups
            .get(group)
            .map(|d| d.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn dataset(&self, group: &str, field: &str) -> Option<&DatasetContents> {
        self.groups.get(group)?.get(field)
    }

    pub fn schema(&self, group: &str, field: &str) -> Option<DatasetSchema> {
        self.dataset(group, field).map(|d| d.schema)
    }

    pub fn row_count(&self, group: &str, field: &str) -> Option<u64> {
        self.dataset(group, field).map(DatasetContents::row_count)
    }

    pub fn column(&self, group: &str, field: &str) -> Option<&ColumnData> {
        self.dataset(group, field).map(|d| &d.column)
    }

    /// Every row of `group/field` as individual values.
    pub fn rows(&self, group: &str, field: &str) -> Option<Vec<FieldValue>> {
        self.dataset(group, field)
            .map(|d| d.column.rows(d.schema.shape))
    }

    /// Bytes past the last well-formed frame.
    pub fn trailing_bytes(&self) -> u64 {
        self.file_len - self.valid_len
    }
}
