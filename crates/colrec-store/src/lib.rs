//! Typed, append-only dataset store for colrec.
//!
//! An artifact is a single file holding named groups; each group holds
//! named datasets. A dataset is created by the first value written to it,
//! which fixes its element type and shape for good. Every later write must
//! match and appends exactly one row.
//!
//! Rows are buffered per dataset and persisted as chunks of
//! [`StoreConfig::chunk_rows`] rows inside CRC-checked frames (see
//! [`frame`]). Reopening an existing artifact restores its catalog and
//! continues appending after the last complete frame.

pub mod config;
pub mod dataset;
pub mod error;
pub mod frame;
pub mod reader;
pub mod store;

pub use config::{Compression, StoreConfig, SyncMode, DEFAULT_CHUNK_ROWS};
pub use dataset::DatasetInfo;
pub use error::{StoreError, StoreResult};
pub use reader::{ArtifactReader, DatasetContents};
pub use store::DatasetStore;
