use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use colrec_keypath::{resolve, KeypathConfig};
use colrec_store::{DatasetStore, StoreConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{RecorderError, RecorderResult};

/// Artifact file extension.
pub const ARTIFACT_EXTENSION: &str = "col";
/// Prefix marking a session file that is still being written.
pub const PENDING_MARKER: char = '_';

/// Filename of a finished session.
pub fn final_filename(id: i64) -> String {
    format!("acq_{id}.{ARTIFACT_EXTENSION}")
}

/// Filename of a session while it is recording.
pub fn pending_filename(id: i64) -> String {
    format!("{PENDING_MARKER}{}", final_filename(id))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecorderState {
    #[default]
    Idle,
    Recording,
}

impl fmt::Display for RecorderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Recording => f.write_str("recording"),
        }
    }
}

/// The session currently being recorded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub id: i64,
    pub pending_path: PathBuf,
    pub final_path: PathBuf,
}

/// Result of admitting a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdmitOutcome {
    /// The number of fields written.
    Written(usize),
    /// Not recording; the record was dropped.
    Ignored,
    /// Only bookkeeping fields resolved; nothing worth storing.
    NothingToDo,
}

/// Drives the Idle/Recording session state machine over a [`DatasetStore`].
pub struct RecordingController {
    folder: PathBuf,
    keypaths: KeypathConfig,
    bookkeeping: Vec<String>,
    store: DatasetStore,
    state: RecorderState,
    session: Option<Session>,
    /// Pending filename of the last session successfully started.
    last_filename: Option<String>,
}

impl RecordingController {
    pub fn new(
        folder: impl Into<PathBuf>,
        keypaths: KeypathConfig,
        bookkeeping: Vec<String>,
        store_config: StoreConfig,
    ) -> RecorderResult<Self> {
        Ok(Self {
            folder: folder.into(),
            keypaths,
            bookkeeping,
            store: DatasetStore::new(store_config)?,
            state: RecorderState::Idle,
            session: None,
            last_filename: None,
        })
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn keypaths(&self) -> &KeypathConfig {
        &self.keypaths
    }

    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    /// Begin session `id`, writing to its pending file.
    ///
    /// Fails without changing state if already recording, or if the
    /// pending filename equals the previous session's. A collision forgets
    /// the previous filename, so an explicit retry goes through.
    pub fn start(&mut self, id: i64) -> RecorderResult<&Session> {
        if self.is_recording() {
            return Err(RecorderError::AlreadyRecording);
        }

        let filename = pending_filename(id);
        if self.last_filename.as_deref() == Some(filename.as_str()) {
            self.last_filename = None;
            warn!(id, %filename, "filename collision with previous session");
            return Err(RecorderError::Collision { filename });
        }

        self.store.close()?;
        fs::create_dir_all(&self.folder)?;
        let pending_path = self.folder.join(&filename);
        self.store.open(&pending_path)?;

        info!(id, path = %pending_path.display(), "recording started");
        self.last_filename = Some(filename);
        self.state = RecorderState::Recording;
        Ok(&*self.session.insert(Session {
            id,
            pending_path,
            final_path: self.folder.join(final_filename(id)),
        }))
    }

    /// End the session: close the artifact and strip the pending marker.
    ///
    /// If the rename fails the controller stays `Recording` with the
    /// artifact already closed; calling `stop` again retries the rename.
    pub fn stop(&mut self) -> RecorderResult<PathBuf> {
        let session = match (&self.session, self.state) {
            (Some(session), RecorderState::Recording) => session.clone(),
            _ => return Err(RecorderError::NotRecording),
        };

        self.store.close()?;
        fs::rename(&session.pending_path, &session.final_path).map_err(|source| {
            warn!(id = session.id, error = %source, "finalizing session file failed");
            RecorderError::Rename {
                from: session.pending_path.clone(),
                to: session.final_path.clone(),
                source,
            }
        })?;

        info!(id = session.id, path = %session.final_path.display(), "recording stopped");
        self.state = RecorderState::Idle;
        self.session = None;
        Ok(session.final_path)
    }

    /// Store `record` under `group` while recording; ignored while idle.
    pub fn admit(&mut self, group: &str, record: &Value) -> RecorderResult<AdmitOutcome> {
        if !self.is_recording() {
            debug!(group, "not recording; record ignored");
            return Ok(AdmitOutcome::Ignored);
        }
        self.write_record(group, record)
    }

    /// Like [`Self::admit`], but a record arriving while idle is an error.
    pub fn admit_strict(&mut self, group: &str, record: &Value) -> RecorderResult<AdmitOutcome> {
        if !self.is_recording() {
            return Err(RecorderError::NotRecording);
        }
        self.write_record(group, record)
    }

    fn write_record(&mut self, group: &str, record: &Value) -> RecorderResult<AdmitOutcome> {
        if !self.keypaths.contains_group(group) {
            return Err(RecorderError::UnknownGroup(group.to_string()));
        }
        if !self.has_payload(group, record) {
            debug!(group, "only bookkeeping fields present; record skipped");
            return Ok(AdmitOutcome::NothingToDo);
        }
        let written = self.store.save_record(group, record, &self.keypaths)?;
        Ok(AdmitOutcome::Written(written))
    }

    /// Whether any configured non-bookkeeping field of `group` resolves.
    fn has_payload(&self, group: &str, record: &Value) -> bool {
        let Ok(paths) = self.keypaths.keypaths(group) else {
            return false;
        };
        paths
            .iter()
            .filter(|path| !self.bookkeeping.iter().any(|b| b == *path))
            .any(|path| {
                resolve(record, path, self.keypaths.separator()).is_some_and(|v| !v.is_null())
            })
    }
}
