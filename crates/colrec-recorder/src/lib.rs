//! Recording controller for colrec.
//!
//! Turns a stream of tagged messages into session artifacts. A
//! `{"command": "start", "id": N}` message opens `_acq_N.col` in the
//! configured folder; data records are resolved through the group's
//! keypaths and appended to the open artifact; `{"command": "stop"}`
//! closes it and renames it to `acq_N.col`.
//!
//! # Key Types
//!
//! - [`RecordingController`]: the Idle/Recording state machine
//! - [`RecorderFilter`]: the controller behind the [`Filter`] interface
//! - [`RecorderHandle`]: a tokio actor serializing access to a filter
//! - [`RecorderConfig`]: options loaded from TOML, JSON or params

pub mod actor;
pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod filter;
pub mod health;

pub use actor::RecorderHandle;
pub use command::{Command, Event};
pub use config::RecorderConfig;
pub use controller::{
    final_filename, pending_filename, AdmitOutcome, RecorderState, RecordingController, Session,
};
pub use error::{ErrorKind, RecorderError, RecorderResult};
pub use filter::{Filter, IngestOutcome, RecorderFilter};
pub use health::{HealthReporter, HealthStatus};
