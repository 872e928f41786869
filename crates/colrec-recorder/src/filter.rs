use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use serde_json::Value;
use tracing::info;

use crate::command::{Command, Event};
use crate::config::RecorderConfig;
use crate::controller::{AdmitOutcome, RecorderState, RecordingController};
use crate::error::{RecorderError, RecorderResult};
use crate::health::{HealthReporter, HealthStatus};

/// A message-processing stage driven by a host adapter.
pub trait Filter {
    /// Apply a params object.
    fn configure(&mut self, params: &Value) -> RecorderResult<()>;

    /// Process one inbound message published on `topic`.
    fn ingest(&mut self, topic: &str, message: &Value) -> RecorderResult<IngestOutcome>;

    /// Produce pending output, if any is due at `now`.
    fn drain(&mut self, now: Instant) -> Option<HealthStatus>;

    /// Human-readable description of the current configuration.
    fn info(&self) -> BTreeMap<String, String>;
}

/// What an ingested message did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngestOutcome {
    Started { path: PathBuf },
    Stopped { path: PathBuf },
    Record(AdmitOutcome),
}

/// The recorder as a [`Filter`]: commands drive the controller, data
/// records are admitted to the open session, and `drain` yields health.
pub struct RecorderFilter {
    config: RecorderConfig,
    controller: RecordingController,
    health: HealthReporter,
}

impl RecorderFilter {
    pub fn new(config: RecorderConfig) -> RecorderResult<Self> {
        config.validate()?;
        let controller = RecordingController::new(
            config.folder_path.clone(),
            config.keypath_config()?,
            config.bookkeeping_fields.clone(),
            config.store_config(),
        )?;
        let health = HealthReporter::new(config.health_period(), config.agent_id.clone(), Instant::now());
        Ok(Self {
            config,
            controller,
            health,
        })
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn controller(&self) -> &RecordingController {
        &self.controller
    }

    pub fn state(&self) -> RecorderState {
        self.controller.state()
    }
}

impl Filter for RecorderFilter {
    /// Replace the configuration. Refused while a session is open.
    fn configure(&mut self, params: &Value) -> RecorderResult<()> {
        if self.controller.is_recording() {
            return Err(RecorderError::Config(
                "cannot reconfigure while recording".into(),
            ));
        }
        let config = RecorderConfig::from_params(params)?;
        *self = Self::new(config)?;
        info!(
            folder = %self.config.folder_path.display(),
            keypaths = self.controller.keypaths().len(),
            "recorder configured"
        );
        Ok(())
    }

    fn ingest(&mut self, topic: &str, message: &Value) -> RecorderResult<IngestOutcome> {
        match Event::parse(topic, message)? {
            Event::Command(Command::Start { id }) => {
                let session = self.controller.start(id)?;
                Ok(IngestOutcome::Started {
                    path: session.pending_path.clone(),
                })
            }
            Event::Command(Command::Stop) => {
                let path = self.controller.stop()?;
                Ok(IngestOutcome::Stopped { path })
            }
            Event::Record { group, record } => self
                .controller
                .admit(&group, &record)
                .map(IngestOutcome::Record),
        }
    }

    fn drain(&mut self, now: Instant) -> Option<HealthStatus> {
        self.health.poll(now, self.controller.state())
    }

    fn info(&self) -> BTreeMap<String, String> {
        let keypaths = self.controller.keypaths();
        let mut info = BTreeMap::new();
        info.insert(
            "Folder path".to_string(),
            self.config.folder_path.display().to_string(),
        );
        info.insert(
            "Keypaths".to_string(),
            format!(
                "{} (total: {})",
                keypaths.qualified_keypaths().join(", "),
                keypaths.len()
            ),
        );
        info.insert("Keypath sep.".to_string(), keypaths.separator().to_string());
        info
    }
}
