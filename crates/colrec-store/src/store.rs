use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use colrec_keypath::{KeypathConfig, KeypathError, ARTIFACT_DELIMITER};
use colrec_types::{ColumnData, FieldValue};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{Compression, StoreConfig, SyncMode};
use crate::dataset::{Dataset, DatasetInfo};
use crate::error::{StoreError, StoreResult};
use crate::frame::{self, Frame, ScannedFrame, FILE_HEADER_SIZE};
use crate::reader::ArtifactReader;

type Catalog = BTreeMap<String, BTreeMap<String, Dataset>>;

/// Append-only writer over a single artifact file.
struct ArtifactFile {
    path: PathBuf,
    file: File,
    /// End of the valid, fully written data.
    len: u64,
    sync_mode: SyncMode,
    #[cfg(test)]
    faults: tests::Faults,
}

impl ArtifactFile {
    fn new(path: &Path, file: File, len: u64, sync_mode: SyncMode) -> Self {
        Self {
            path: path.to_path_buf(),
            file,
            len,
            sync_mode,
            #[cfg(test)]
            faults: tests::Faults::default(),
        }
    }

    /// Append one frame. Returns the offset it was written at.
    ///
    /// A frame only counts once it is written (and synced under
    /// [`SyncMode::EveryWrite`]). On any failure the file is cut back to
    /// its previous length, so the file never holds a frame the caller
    /// did not see succeed.
    fn append(&mut self, frame: &Frame) -> StoreResult<u64> {
        let buf = frame.encode()?;
        let offset = self.len;

        if let Err(e) = self.write_frame(&buf) {
            self.rollback(offset);
            return Err(e.into());
        }
        self.len += buf.len() as u64;
        Ok(offset)
    }

    fn write_frame(&mut self, buf: &[u8]) -> io::Result<()> {
        #[cfg(test)]
        self.faults.before_write()?;
        self.file.seek(SeekFrom::Start(self.len))?;
        self.file.write_all(buf)?;
        if self.sync_mode == SyncMode::EveryWrite {
            #[cfg(test)]
            self.faults.before_sync()?;
            self.file.sync_data()?;
        }
        Ok(())
    }

    /// Forget everything written past `offset`.
    fn rollback(&mut self, offset: u64) {
        self.len = offset;
        if let Err(e) = self.file.set_len(offset) {
            // Later frames are written at `len`, and reopening drops whatever
            // is left past the last valid frame.
            warn!(path = %self.path.display(), offset, error = %e, "failed to cut artifact back");
        }
    }

    fn sync(&mut self) -> StoreResult<()> {
        #[cfg(test)]
        self.faults.before_sync()?;
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}

/// An open artifact: the file plus the catalog of groups and datasets.
struct OpenArtifact {
    file: ArtifactFile,
    groups: Catalog,
}

impl OpenArtifact {
    /// Exclusive create; if the file already exists, reopen it read/write.
    fn open(path: &Path, sync_mode: SyncMode) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        match OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
        {
            Ok(mut file) => {
                file.write_all(&frame::file_header())?;
                info!(path = %path.display(), "artifact created");
                Ok(Self {
                    file: ArtifactFile::new(path, file, FILE_HEADER_SIZE as u64, sync_mode),
                    groups: Catalog::new(),
                })
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Self::reopen(path, sync_mode),
            Err(e) => Err(e.into()),
        }
    }

    fn reopen(path: &Path, sync_mode: SyncMode) -> StoreResult<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        if data.is_empty() {
            file.write_all(&frame::file_header())?;
            data.extend_from_slice(&frame::file_header());
        }
        frame::check_header(path, &data)?;

        let scan = frame::scan(&data);
        let groups = restore_catalog(&scan.frames)?;

        if scan.valid_len < data.len() as u64 {
            warn!(
                path = %path.display(),
                valid_len = scan.valid_len,
                file_len = data.len(),
                "dropping torn artifact tail"
            );
            file.set_len(scan.valid_len)?;
        }

        info!(
            path = %path.display(),
            groups = groups.len(),
            frames = scan.frames.len(),
            "artifact reopened"
        );
        Ok(Self {
            file: ArtifactFile::new(path, file, scan.valid_len, sync_mode),
            groups,
        })
    }

    fn ensure_group(&mut self, name: &str) -> StoreResult<()> {
        if self.groups.contains_key(name) {
            return Ok(());
        }
        self.file.append(&Frame::Group {
            name: name.to_string(),
        })?;
        self.groups.insert(name.to_string(), BTreeMap::new());
        debug!(group = name, "group created");
        Ok(())
    }

    fn append(
        &mut self,
        group: &str,
        field: &str,
        value: FieldValue,
        config: &StoreConfig,
    ) -> StoreResult<()> {
        let datasets = self
            .groups
            .get_mut(group)
            .ok_or_else(|| StoreError::UnknownGroup(group.to_string()))?;

        // Offset of the dataset frame when this append creates the dataset.
        let created_at = match datasets.get(field) {
            Some(dataset) => {
                value.check_against(&dataset.schema)?;
                None
            }
            None => {
                let schema = value.schema();
                let offset = self.file.append(&Frame::Dataset {
                    group: group.to_string(),
                    name: field.to_string(),
                    schema,
                    chunk_rows: config.chunk_rows as u32,
                })?;
                debug!(group, field, %schema, "dataset created");
                datasets.insert(field.to_string(), Dataset::new(schema, config.chunk_rows));
                Some(offset)
            }
        };
        let dataset = datasets
            .get_mut(field)
            .ok_or_else(|| StoreError::UnknownDataset {
                group: group.to_string(),
                field: field.to_string(),
            })?;

        let mark = dataset.tail.value_count();
        dataset.tail.push(value)?;
        if dataset.tail_is_full() {
            if let Err(err) = persist_tail(&mut self.file, group, field, dataset, config.compression) {
                dataset.tail.truncate(mark);
                if let Some(offset) = created_at {
                    // The rejected value must not fix the schema of a new dataset.
                    datasets.remove(field);
                    self.file.rollback(offset);
                }
                return Err(err);
            }
        }
        Ok(())
    }

    fn flush(&mut self, compression: Compression) -> StoreResult<()> {
        for (group, datasets) in self.groups.iter_mut() {
            for (field, dataset) in datasets.iter_mut() {
                persist_tail(&mut self.file, group, field, dataset, compression)?;
            }
        }
        self.file.sync()
    }

    /// Everything written so far, decoded.
    fn snapshot(&self) -> StoreResult<ArtifactReader> {
        let mut data = Vec::new();
        File::open(&self.file.path)?.read_to_end(&mut data)?;
        data.truncate(self.file.len as usize);
        ArtifactReader::from_bytes(&self.file.path, &data)
    }
}

/// Write the buffered rows of `dataset` as one chunk.
fn persist_tail(
    file: &mut ArtifactFile,
    group: &str,
    field: &str,
    dataset: &mut Dataset,
    compression: Compression,
) -> StoreResult<()> {
    let rows = dataset.tail_rows();
    if rows == 0 {
        return Ok(());
    }
    let first_row = dataset.persisted_rows;
    let frame = Frame::chunk(group, field, first_row, rows, &dataset.tail, compression)?;
    let offset = file.append(&frame)?;

    dataset.persisted_rows += rows as u64;
    dataset.tail.clear();
    debug!(group, field, first_row, rows, offset, "chunk written");
    Ok(())
}

/// Rebuild the catalog from scanned frames, counting rows without decoding.
fn restore_catalog(frames: &[ScannedFrame]) -> StoreResult<Catalog> {
    let mut groups = Catalog::new();
    for ScannedFrame { offset, frame } in frames {
        let corrupt = |reason: String| StoreError::Corrupt {
            offset: *offset,
            reason,
        };
        match frame {
            Frame::Group { name } => {
                groups.entry(name.clone()).or_default();
            }
            Frame::Dataset {
                group,
                name,
                schema,
                chunk_rows,
            } => {
                let datasets = groups
                    .get_mut(group)
                    .ok_or_else(|| corrupt(format!("dataset {name} in unknown group {group}")))?;
                if *chunk_rows == 0 || datasets.contains_key(name) {
                    return Err(corrupt(format!("invalid dataset declaration {group}/{name}")));
                }
                datasets.insert(name.clone(), Dataset::new(*schema, *chunk_rows as usize));
            }
            Frame::Chunk {
                group,
                name,
                first_row,
                rows,
                ..
            } => {
                let dataset = groups
                    .get_mut(group)
                    .and_then(|d| d.get_mut(name))
                    .ok_or_else(|| corrupt(format!("chunk for unknown dataset {group}/{name}")))?;
                if *first_row != dataset.persisted_rows {
                    return Err(corrupt(format!(
                        "chunk for {group}/{name} starts at row {first_row}, expected {}",
                        dataset.persisted_rows
                    )));
                }
                dataset.persisted_rows += u64::from(*rows);
            }
        }
    }
    Ok(groups)
}

fn validate_name(name: &str) -> StoreResult<()> {
    if name.is_empty() || name.contains(ARTIFACT_DELIMITER) {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

impl From<KeypathError> for StoreError {
    fn from(err: KeypathError) -> Self {
        match err {
            KeypathError::UnknownGroup(group) => Self::UnknownGroup(group),
            other => Self::Config(other.to_string()),
        }
    }
}

/// The typed extensible dataset store.
///
/// Owns at most one open artifact. Groups and datasets are created on first
/// write; a dataset's element type and shape are fixed by its first value
/// and every later append must match. Rows are only ever appended.
///
/// All mutation goes through `&mut self`, so a single owner serializes
/// appends, group/dataset creation and open/close by construction.
pub struct DatasetStore {
    config: StoreConfig,
    artifact: Option<OpenArtifact>,
}

impl DatasetStore {
    pub fn new(config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            artifact: None,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Open the artifact at `path`, creating it if it does not exist.
    ///
    /// Any artifact already open is closed first.
    pub fn open(&mut self, path: &Path) -> StoreResult<()> {
        self.close()?;
        self.artifact = Some(OpenArtifact::open(path, self.config.sync_mode)?);
        Ok(())
    }

    /// Flush buffered rows and release the artifact. No-op when closed.
    ///
    /// If the final flush fails the artifact stays open with its buffered
    /// rows, so calling `close` again retries the flush.
    pub fn close(&mut self) -> StoreResult<()> {
        let compression = self.config.compression;
        let Some(artifact) = self.artifact.as_mut() else {
            return Ok(());
        };
        if let Err(e) = artifact.flush(compression) {
            warn!(path = %artifact.file.path.display(), error = %e, "artifact flush failed; kept open");
            return Err(e);
        }
        if let Some(artifact) = self.artifact.take() {
            info!(path = %artifact.file.path.display(), "artifact closed");
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.artifact.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.artifact.as_ref().map(|a| a.file.path.as_path())
    }

    /// Persist every buffered row without closing.
    pub fn flush(&mut self) -> StoreResult<()> {
        let compression = self.config.compression;
        self.artifact_mut()?.flush(compression)
    }

    /// Attach to `name`, creating the group if needed.
    pub fn ensure_group(&mut self, name: &str) -> StoreResult<()> {
        validate_name(name)?;
        self.artifact_mut()?.ensure_group(name)
    }

    /// Infer a typed value from `value` and append it to `group/field`.
    pub fn write_field(&mut self, group: &str, field: &str, value: &Value) -> StoreResult<()> {
        self.artifact_mut()?;
        let value = FieldValue::from_json(value)?;
        self.append(group, field, value)
    }

    /// Append one typed row to `group/field`, creating either on first use.
    ///
    /// Validation happens before anything is written: a rejected value
    /// leaves the dataset's rows and length unchanged.
    pub fn append(&mut self, group: &str, field: &str, value: FieldValue) -> StoreResult<()> {
        validate_name(group)?;
        validate_name(field)?;
        let config = self.config.clone();
        let artifact = self.artifact_mut()?;
        artifact.ensure_group(group)?;
        artifact.append(group, field, value, &config)
    }

    /// Write every configured field of `group` that resolves in `record`.
    ///
    /// Fields are visited in configured order. Absent and null fields are
    /// skipped. The first failing field aborts the record; fields written
    /// before it stay written. Returns the number of fields written.
    pub fn save_record(
        &mut self,
        group: &str,
        record: &Value,
        keypaths: &KeypathConfig,
    ) -> StoreResult<usize> {
        validate_name(group)?;
        self.artifact_mut()?;
        let resolved = keypaths.resolve_group(group, record)?;

        let mut written = 0;
        for (field, value) in resolved {
            if value.is_null() {
                continue;
            }
            self.write_field(group, field, value)
                .map_err(|e| e.in_field(group, field))?;
            written += 1;
        }
        Ok(written)
    }

    /// Names of the groups in the open artifact.
    pub fn groups(&self) -> Vec<String> {
        self.artifact
            .as_ref()
            .map(|a| a.groups.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Names of the datasets in `group`.
    pub fn fields(&self, group: &str) -> Vec<String> {
        self.artifact
            .as_ref()
            .and_then(|a| a.groups.get(group))
            .map(|d| d.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn dataset_info(&self, group: &str, field: &str) -> Option<DatasetInfo> {
        self.artifact
            .as_ref()?
            .groups
            .get(group)?
            .get(field)
            .map(Dataset::info)
    }

    /// Total rows in `group/field`, if it exists.
    pub fn row_count(&self, group: &str, field: &str) -> Option<u64> {
        self.dataset_info(group, field).map(|info| info.rows)
    }

    /// All rows of `group/field`, persisted and buffered.
    pub fn read(&self, group: &str, field: &str) -> StoreResult<ColumnData> {
        let artifact = self.artifact.as_ref().ok_or(StoreError::NotOpen)?;
        let dataset = artifact
            .groups
            .get(group)
            .and_then(|d| d.get(field))
            .ok_or_else(|| StoreError::UnknownDataset {
                group: group.to_string(),
                field: field.to_string(),
            })?;

        let mut column = artifact
            .snapshot()?
            .column(group, field)
            .cloned()
            .unwrap_or_else(|| ColumnData::empty(dataset.schema.element));
        column.extend(dataset.tail.clone())?;
        Ok(column)
    }

    fn artifact_mut(&mut self) -> StoreResult<&mut OpenArtifact> {
        self.artifact.as_mut().ok_or(StoreError::NotOpen)
    }
}

impl Drop for DatasetStore {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "closing artifact on drop failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colrec_types::{DatasetSchema, ElementType, Shape};
    use proptest::prelude::*;
    use serde_json::json;

    fn store_with(chunk_rows: usize) -> DatasetStore {
        DatasetStore::new(StoreConfig {
            chunk_rows,
            ..StoreConfig::default()
        })
        .unwrap()
    }

    fn open_store(dir: &tempfile::TempDir, chunk_rows: usize) -> (DatasetStore, PathBuf) {
        let path = dir.path().join("test.col");
        let mut store = store_with(chunk_rows);
        store.open(&path).unwrap();
        (store, path)
    }

    /// Injected I/O failures for an open artifact.
    #[derive(Debug, Default)]
    pub(super) struct Faults {
        writes_left: Option<usize>,
        fail_sync: bool,
    }

    impl Faults {
        pub(super) fn before_write(&mut self) -> io::Result<()> {
            match &mut self.writes_left {
                Some(0) => Err(disk_full()),
                Some(n) => {
                    *n -= 1;
                    Ok(())
                }
                None => Ok(()),
            }
        }

        pub(super) fn before_sync(&mut self) -> io::Result<()> {
            if self.fail_sync {
                Err(disk_full())
            } else {
                Ok(())
            }
        }
    }

    fn disk_full() -> io::Error {
        io::Error::other("no space left on device")
    }

    fn faults(store: &mut DatasetStore) -> &mut Faults {
        &mut store.artifact.as_mut().unwrap().file.faults
    }

    fn file_len(path: &Path) -> u64 {
        fs::metadata(path).unwrap().len()
    }

    #[test]
    fn operations_require_open_artifact() {
        let mut store = store_with(4);
        assert!(matches!(store.ensure_group("g"), Err(StoreError::NotOpen)));
        assert!(matches!(store.write_field("g", "x", &json!(1)), Err(StoreError::NotOpen)));
        assert!(matches!(store.flush(), Err(StoreError::NotOpen)));
        assert!(store.groups().is_empty());
    }

    #[test]
    fn close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, _) = open_store(&dir, 4);
        store.close().unwrap();
        store.close().unwrap();
        assert!(!store.is_open());
    }

    #[test]
    fn scalars_read_back_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, _) = open_store(&dir, 2);
        for v in [1.5, 2.5, 3.5, 4.5, 5.5] {
            store.write_field("g", "x", &json!(v)).unwrap();
        }
        assert_eq!(store.row_count("g", "x"), Some(5));
        let info = store.dataset_info("g", "x").unwrap();
        assert_eq!(info.persisted_rows, 4);
        assert_eq!(info.schema, DatasetSchema::scalar(ElementType::Float64));
        assert_eq!(
            store.read("g", "x").unwrap(),
            ColumnData::Float64(vec![1.5, 2.5, 3.5, 4.5, 5.5])
        );
    }

    #[test]
    fn ensure_group_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, _) = open_store(&dir, 4);
        store.ensure_group("g").unwrap();
        store.ensure_group("g").unwrap();
        assert_eq!(store.groups(), vec!["g"]);
        assert!(store.fields("g").is_empty());
    }

    #[test]
    fn type_mismatch_leaves_dataset_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, _) = open_store(&dir, 4);
        store.write_field("g", "x", &json!(1.0)).unwrap();
        let err = store.write_field("g", "x", &json!("text")).unwrap_err();
        assert!(matches!(err, StoreError::TypeMismatch { .. }));
        let err = store.write_field("g", "x", &json!(2)).unwrap_err();
        assert!(matches!(
            err,
            StoreError::TypeMismatch { expected: ElementType::Float64, found: ElementType::Int64 }
        ));
        assert_eq!(store.read("g", "x").unwrap(), ColumnData::Float64(vec![1.0]));
    }

    #[test]
    fn row_width_is_fixed_after_creation() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, _) = open_store(&dir, 4);
        store.write_field("g", "acc", &json!([1, 2, 3])).unwrap();
        let err = store.write_field("g", "acc", &json!([1, 2])).unwrap_err();
        assert!(matches!(
            err,
            StoreError::ShapeMismatch { expected: Shape::Row { width: 3 }, found: Shape::Row { width: 2 } }
        ));
        let err = store.write_field("g", "acc", &json!(4)).unwrap_err();
        assert!(matches!(err, StoreError::ShapeMismatch { .. }));
        store.write_field("g", "acc", &json!([4, 5, 6])).unwrap();
        assert_eq!(store.read("g", "acc").unwrap(), ColumnData::Int64(vec![1, 2, 3, 4, 5, 6]));
    }

    #[test]
    fn conversion_error_mid_row_does_not_extend() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, _) = open_store(&dir, 4);
        store.write_field("g", "v", &json!([1, 2])).unwrap();
        let err = store.write_field("g", "v", &json!([3, "four"])).unwrap_err();
        assert!(matches!(err, StoreError::Conversion(_)));
        assert_eq!(store.row_count("g", "v"), Some(1));
    }

    #[test]
    fn rejected_first_value_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, _) = open_store(&dir, 4);
        assert!(matches!(store.write_field("g", "e", &json!([])), Err(StoreError::EmptyArray)));
        assert!(matches!(
            store.write_field("g", "o", &json!({"a": 1})),
            Err(StoreError::UnsupportedType(_))
        ));
        assert!(matches!(
            store.write_field("g", "b", &json!(true)),
            Err(StoreError::UnsupportedType(_))
        ));
        assert!(store.groups().is_empty());
    }

    #[test]
    fn strings_are_variable_length() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, _) = open_store(&dir, 2);
        let words = ["a", "much longer string value", "", "ünïcødé"];
        for w in words {
            store.write_field("g", "s", &json!(w)).unwrap();
        }
        assert_eq!(
            store.read("g", "s").unwrap(),
            ColumnData::Utf8(words.iter().map(|w| w.to_string()).collect())
        );
    }

    #[test]
    fn invalid_names_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, _) = open_store(&dir, 4);
        assert!(matches!(store.write_field("", "x", &json!(1)), Err(StoreError::InvalidName(_))));
        assert!(matches!(store.write_field("g", "a/b", &json!(1)), Err(StoreError::InvalidName(_))));
    }

    #[test]
    fn save_record_follows_keypaths() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, _) = open_store(&dir, 4);
        let mut keypaths = KeypathConfig::default();
        keypaths.set_keypaths("imu", ["acc.x", "acc.y", "missing", "nil"]).unwrap();

        let written = store
            .save_record("imu", &json!({"acc": {"x": 1.0, "y": 2.0}, "nil": null}), &keypaths)
            .unwrap();
        assert_eq!(written, 2);
        assert_eq!(store.fields("imu"), vec!["acc.x", "acc.y"]);
        assert_eq!(store.row_count("imu", "missing"), None);

        let written = store.save_record("imu", &json!({"other": 1}), &keypaths).unwrap();
        assert_eq!(written, 0);
        assert_eq!(store.row_count("imu", "acc.x"), Some(1));
    }

    #[test]
    fn save_record_reports_failing_field() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, _) = open_store(&dir, 4);
        let mut keypaths = KeypathConfig::default();
        keypaths.set_keypaths("g", ["a", "b", "c"]).unwrap();

        let err = store
            .save_record("g", &json!({"a": 1, "b": {"deep": true}, "c": 3}), &keypaths)
            .unwrap_err();
        match &err {
            StoreError::Field { field, .. } => assert_eq!(field, "b"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(err.root(), StoreError::UnsupportedType(_)));
        assert_eq!(store.row_count("g", "a"), Some(1));
        assert_eq!(store.row_count("g", "c"), None);
    }

    #[test]
    fn save_record_unknown_group() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, _) = open_store(&dir, 4);
        let err = store
            .save_record("nope", &json!({"a": 1}), &KeypathConfig::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownGroup(_)));
    }

    #[test]
    fn reopen_continues_rows() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, path) = open_store(&dir, 2);
        for i in 0..3i64 {
            store.write_field("g", "n", &json!(i)).unwrap();
        }
        store.close().unwrap();

        store.open(&path).unwrap();
        assert_eq!(store.groups(), vec!["g"]);
        assert_eq!(store.row_count("g", "n"), Some(3));
        store.write_field("g", "n", &json!(3)).unwrap();
        let err = store.write_field("g", "n", &json!(1.5)).unwrap_err();
        assert!(matches!(err, StoreError::TypeMismatch { .. }));
        assert_eq!(store.read("g", "n").unwrap(), ColumnData::Int64(vec![0, 1, 2, 3]));
    }

    #[test]
    fn repeated_open_close_cycles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cycle.col");
        let mut store = store_with(1024);
        for i in 0..5i64 {
            store.open(&path).unwrap();
            store.write_field("g", "n", &json!(i)).unwrap();
            store.close().unwrap();
        }
        store.open(&path).unwrap();
        assert_eq!(store.read("g", "n").unwrap(), ColumnData::Int64(vec![0, 1, 2, 3, 4]));
    }

    #[test]
    fn reopen_drops_torn_tail() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, path) = open_store(&dir, 1);
        store.write_field("g", "n", &json!(1)).unwrap();
        store.write_field("g", "n", &json!(2)).unwrap();
        store.close().unwrap();

        let len = fs::metadata(&path).unwrap().len();
        OpenOptions::new().write(true).open(&path).unwrap().set_len(len - 3).unwrap();

        store.open(&path).unwrap();
        assert_eq!(store.row_count("g", "n"), Some(1));
        store.write_field("g", "n", &json!(9)).unwrap();
        store.close().unwrap();

        let reader = ArtifactReader::open(&path).unwrap();
        assert_eq!(reader.column("g", "n"), Some(&ColumnData::Int64(vec![1, 9])));
    }

    #[test]
    fn reopen_rejects_foreign_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foreign.col");
        fs::write(&path, b"not an artifact").unwrap();
        let mut store = store_with(4);
        assert!(matches!(store.open(&path), Err(StoreError::InvalidMagic { .. })));
        assert!(!store.is_open());
    }

    #[test]
    fn failed_chunk_write_rolls_back_row_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, path) = open_store(&dir, 2);
        store.write_field("g", "n", &json!(1)).unwrap();
        let len = file_len(&path);

        faults(&mut store).writes_left = Some(0);
        assert!(matches!(store.write_field("g", "n", &json!(2)), Err(StoreError::Io(_))));
        assert_eq!(store.row_count("g", "n"), Some(1));
        assert_eq!(file_len(&path), len);
        assert_eq!(store.read("g", "n").unwrap(), ColumnData::Int64(vec![1]));

        faults(&mut store).writes_left = None;
        store.write_field("g", "n", &json!(3)).unwrap();
        store.close().unwrap();

        let reader = ArtifactReader::open(&path).unwrap();
        assert_eq!(reader.column("g", "n"), Some(&ColumnData::Int64(vec![1, 3])));
        assert_eq!(reader.trailing_bytes(), 0);
    }

    #[test]
    fn failed_sync_cuts_chunk_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.col");
        let mut store = DatasetStore::new(StoreConfig {
            chunk_rows: 2,
            sync_mode: SyncMode::EveryWrite,
            ..StoreConfig::default()
        })
        .unwrap();
        store.open(&path).unwrap();
        store.write_field("g", "n", &json!(1)).unwrap();
        let len = file_len(&path);

        faults(&mut store).fail_sync = true;
        assert!(matches!(store.write_field("g", "n", &json!(2)), Err(StoreError::Io(_))));
        assert_eq!(store.row_count("g", "n"), Some(1));
        assert_eq!(file_len(&path), len);

        faults(&mut store).fail_sync = false;
        store.write_field("g", "n", &json!(3)).unwrap();
        store.write_field("g", "n", &json!(4)).unwrap();
        store.close().unwrap();

        store.open(&path).unwrap();
        assert_eq!(store.row_count("g", "n"), Some(3));
        store.close().unwrap();
        let reader = ArtifactReader::open(&path).unwrap();
        assert_eq!(reader.column("g", "n"), Some(&ColumnData::Int64(vec![1, 3, 4])));
        assert_eq!(reader.trailing_bytes(), 0);
    }

    #[test]
    fn failed_close_keeps_buffered_rows_for_retry() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, path) = open_store(&dir, 1024);
        for i in 0..100 {
            store.write_field("g", "s", &json!(format!("row {i}"))).unwrap();
        }
        let len = file_len(&path);

        faults(&mut store).writes_left = Some(0);
        assert!(matches!(store.close(), Err(StoreError::Io(_))));
        assert!(store.is_open());
        assert_eq!(store.row_count("g", "s"), Some(100));
        assert_eq!(file_len(&path), len);

        faults(&mut store).writes_left = None;
        store.close().unwrap();
        assert!(!store.is_open());

        let reader = ArtifactReader::open(&path).unwrap();
        assert_eq!(reader.row_count("g", "s"), Some(100));
        assert_eq!(reader.trailing_bytes(), 0);
    }

    #[test]
    fn failed_close_on_sync_can_be_retried() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, path) = open_store(&dir, 1024);
        store.write_field("g", "n", &json!(7)).unwrap();

        faults(&mut store).fail_sync = true;
        assert!(store.close().is_err());
        assert!(store.is_open());

        faults(&mut store).fail_sync = false;
        store.close().unwrap();
        let reader = ArtifactReader::open(&path).unwrap();
        assert_eq!(reader.column("g", "n"), Some(&ColumnData::Int64(vec![7])));
    }

    #[test]
    fn failed_first_chunk_discards_new_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, path) = open_store(&dir, 1);
        store.ensure_group("g").unwrap();
        let len = file_len(&path);

        // dataset frame lands, its first chunk does not
        faults(&mut store).writes_left = Some(1);
        assert!(store.write_field("g", "x", &json!("text")).is_err());
        assert!(store.fields("g").is_empty());
        assert_eq!(file_len(&path), len);

        faults(&mut store).writes_left = None;
        store.write_field("g", "x", &json!(1.5)).unwrap();
        store.close().unwrap();

        let reader = ArtifactReader::open(&path).unwrap();
        assert_eq!(reader.column("g", "x"), Some(&ColumnData::Float64(vec![1.5])));
        assert_eq!(reader.trailing_bytes(), 0);
    }

    #[test]
    fn zstd_chunks_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("z.col");
        let mut store = DatasetStore::new(StoreConfig {
            chunk_rows: 8,
            compression: Compression::Zstd { level: 3 },
            sync_mode: SyncMode::EveryWrite,
        })
        .unwrap();
        store.open(&path).unwrap();
        for i in 0..20 {
            store.write_field("g", "row", &json!([i as f64, 0.5, -1.0])).unwrap();
        }
        store.close().unwrap();

        let reader = ArtifactReader::open(&path).unwrap();
        assert_eq!(reader.row_count("g", "row"), Some(20));
        assert_eq!(
            reader.rows("g", "row").unwrap()[19],
            FieldValue::Float64Row(vec![19.0, 0.5, -1.0])
        );
    }

    #[test]
    fn query_snapshots_are_owned() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, _) = open_store(&dir, 4);
        store.write_field("a", "x", &json!(1)).unwrap();
        let groups = store.groups();
        store.write_field("b", "x", &json!(1)).unwrap();
        assert_eq!(groups, vec!["a"]);
        assert_eq!(store.groups(), vec!["a", "b"]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn scalar_sequence_persists_in_order(
            values in prop::collection::vec(any::<i64>(), 1..200),
            chunk_rows in 1usize..64,
        ) {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("prop.col");
            let mut store = store_with(chunk_rows);
            store.open(&path).unwrap();
            for v in &values {
                store.write_field("g", "n", &json!(v)).unwrap();
            }
            store.close().unwrap();

            let reader = ArtifactReader::open(&path).unwrap();
            prop_assert_eq!(reader.row_count("g", "n"), Some(values.len() as u64));
            prop_assert_eq!(reader.column("g", "n"), Some(&ColumnData::Int64(values)));
        }

        #[test]
        fn width_mismatch_never_changes_length(
            width in 1usize..8,
            other in 1usize..8,
            appends in 1usize..20,
        ) {
            prop_assume!(width != other);
            let dir = tempfile::tempdir().unwrap();
            let (mut store, _) = open_store(&dir, 4);
            store.write_field("g", "r", &json!(vec![0.5; width])).unwrap();
            for _ in 0..appends {
                let err = store.write_field("g", "r", &json!(vec![0.5; other])).unwrap_err();
                prop_assert!(
                    matches!(err, StoreError::ShapeMismatch { .. }),
                    "unexpected error: {}", err
                );
            }
            prop_assert_eq!(store.row_count("g", "r"), Some(1));
            prop_assert_eq!(store.read("g", "r").unwrap(), ColumnData::Float64(vec![0.5; width]));
        }
    }
}
