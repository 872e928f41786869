use colrec_types::{ColumnData, DatasetSchema};
use serde::{Deserialize, Serialize};

/// Snapshot of a dataset's metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub schema: DatasetSchema,
    /// Total rows, persisted and buffered.
    pub rows: u64,
    /// Rows already written to the artifact in chunks.
    pub persisted_rows: u64,
    pub chunk_rows: usize,
}

/// In-memory state of one dataset in an open artifact.
///
/// Rows are buffered in `tail` until a full chunk can be written; the
/// persisted part is only ever extended.
#[derive(Debug)]
pub(crate) struct Dataset {
    pub(crate) schema: DatasetSchema,
    pub(crate) chunk_rows: usize,
    pub(crate) persisted_rows: u64,
    pub(crate) tail: ColumnData,
}

impl Dataset {
    pub(crate) fn new(schema: DatasetSchema, chunk_rows: usize) -> Self {
        Self {
            schema,
            chunk_rows,
            persisted_rows: 0,
            tail: ColumnData::with_capacity(
                schema.element,
                chunk_rows.saturating_mul(schema.shape.values_per_row()),
            ),
        }
    }

    pub(crate) fn tail_rows(&self) -> usize {
        self.tail.row_count(self.schema.shape)
    }

    pub(crate) fn len(&self) -> u64 {
        self.persisted_rows + self.tail_rows() as u64
    }

    pub(crate) fn tail_is_full(&self) -> bool {
        self.tail_rows() >= self.chunk_rows
    }

    pub(crate) fn info(&self) -> DatasetInfo {
        DatasetInfo {
            schema: self.schema,
            rows: self.len(),
            persisted_rows: self.persisted_rows,
            chunk_rows: self.chunk_rows,
        }
    }
}
