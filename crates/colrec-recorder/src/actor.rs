//! Single-owner actor around a [`RecorderFilter`].
//!
//! ```text
//! Callers ─→ [mpsc channel] ─→ actor task (owns the filter) ─→ artifact
//!        ←────────────── oneshot reply ←──────────────┘
//! ```
//!
//! All transitions and appends run one request at a time, so concurrent
//! callers never interleave on the artifact. Requests that touch the file
//! run on the blocking pool with the filter moved in and handed back.

use std::collections::BTreeMap;
use std::time::Instant;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{self, JoinHandle};
use tracing::debug;

use crate::controller::RecorderState;
use crate::error::{RecorderError, RecorderResult};
use crate::filter::{Filter, IngestOutcome, RecorderFilter};
use crate::health::HealthStatus;

enum Request {
    Configure {
        params: Value,
        reply: oneshot::Sender<RecorderResult<()>>,
    },
    Ingest {
        topic: String,
        message: Value,
        reply: oneshot::Sender<RecorderResult<IngestOutcome>>,
    },
    Drain {
        now: Instant,
        reply: oneshot::Sender<Option<HealthStatus>>,
    },
    Info {
        reply: oneshot::Sender<BTreeMap<String, String>>,
    },
    State {
        reply: oneshot::Sender<RecorderState>,
    },
}

/// Cloneable handle to a running recorder actor.
#[derive(Clone, Debug)]
pub struct RecorderHandle {
    tx: mpsc::Sender<Request>,
}

impl RecorderHandle {
    /// Spawn the actor on the current runtime.
    ///
    /// The task ends once every handle is dropped and returns the filter.
    pub fn spawn(filter: RecorderFilter, capacity: usize) -> (Self, JoinHandle<RecorderFilter>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let task = tokio::spawn(run(filter, rx));
        (Self { tx }, task)
    }

    pub async fn configure(&self, params: Value) -> RecorderResult<()> {
        self.call(|reply| Request::Configure { params, reply }).await?
    }

    pub async fn ingest(&self, topic: impl Into<String>, message: Value) -> RecorderResult<IngestOutcome> {
        let topic = topic.into();
        self.call(|reply| Request::Ingest {
            topic,
            message,
            reply,
        })
        .await?
    }

    pub async fn drain(&self, now: Instant) -> RecorderResult<Option<HealthStatus>> {
        self.call(|reply| Request::Drain { now, reply }).await
    }

    pub async fn info(&self) -> RecorderResult<BTreeMap<String, String>> {
        self.call(|reply| Request::Info { reply }).await
    }

    pub async fn state(&self) -> RecorderResult<RecorderState> {
        self.call(|reply| Request::State { reply }).await
    }

    async fn call<T>(&self, request: impl FnOnce(oneshot::Sender<T>) -> Request) -> RecorderResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(request(reply))
            .await
            .map_err(|_| RecorderError::Closed)?;
        rx.await.map_err(|_| RecorderError::Closed)
    }
}

async fn run(mut filter: RecorderFilter, mut rx: mpsc::Receiver<Request>) -> RecorderFilter {
    while let Some(request) = rx.recv().await {
        // A dropped reply receiver only means the caller stopped waiting.
        match request {
            Request::Configure { params, reply } => {
                let (owned, result) = blocking(filter, move |f| f.configure(&params)).await;
                filter = owned;
                let _ = reply.send(result);
            }
            Request::Ingest {
                topic,
                message,
                reply,
            } => {
                let (owned, result) = blocking(filter, move |f| f.ingest(&topic, &message)).await;
                filter = owned;
                let _ = reply.send(result);
            }
            Request::Drain { now, reply } => {
                let _ = reply.send(filter.drain(now));
            }
            Request::Info { reply } => {
                let _ = reply.send(filter.info());
            }
            Request::State { reply } => {
                let _ = reply.send(filter.state());
            }
        }
    }
    debug!("recorder actor shutting down");
    filter
}

/// Run `op` on the blocking pool. Configure and ingest open, append to,
/// flush and rename artifact files, so they stay off the runtime workers.
async fn blocking<T, F>(mut filter: RecorderFilter, op: F) -> (RecorderFilter, T)
where
    T: Send + 'static,
    F: FnOnce(&mut RecorderFilter) -> T + Send + 'static,
{
    let joined = task::spawn_blocking(move || {
        let out = op(&mut filter);
        (filter, out)
    })
    .await;
    match joined {
        Ok(done) => done,
        Err(err) => std::panic::resume_unwind(err.into_panic()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecorderConfig;
    use crate::controller::AdmitOutcome;
    use serde_json::json;

    fn spawn(folder: &std::path::Path) -> (RecorderHandle, JoinHandle<RecorderFilter>) {
        let config = RecorderConfig::from_params(&json!({
            "folder_path": folder,
            "keypaths": {"coordinator": ["x", "y"]},
        }))
        .unwrap();
        RecorderHandle::spawn(RecorderFilter::new(config).unwrap(), 16)
    }

    #[tokio::test]
    async fn session_through_handle() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, task) = spawn(dir.path());

        handle.ingest("control", json!({"command": "start", "id": 4})).await.unwrap();
        assert_eq!(handle.state().await.unwrap(), RecorderState::Recording);
        let outcome = handle.ingest("coordinator", json!({"x": 1, "y": 2})).await.unwrap();
        assert_eq!(outcome, IngestOutcome::Record(AdmitOutcome::Written(2)));
        handle.ingest("control", json!({"command": "stop"})).await.unwrap();

        drop(handle);
        let filter = task.await.unwrap();
        assert_eq!(filter.state(), RecorderState::Idle);
        assert!(dir.path().join("acq_4.col").is_file());
    }

    #[tokio::test]
    async fn concurrent_callers_are_serialized() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, task) = spawn(dir.path());
        handle.ingest("control", json!({"command": "start", "id": 1})).await.unwrap();

        let mut joins = Vec::new();
        for i in 0..8i64 {
            let handle = handle.clone();
            joins.push(tokio::spawn(async move {
                for j in 0..10i64 {
                    handle
                        .ingest("coordinator", json!({"x": i * 10 + j}))
                        .await
                        .unwrap();
                }
            }));
        }
        for join in joins {
            join.await.unwrap();
        }

        drop(handle);
        let filter = task.await.unwrap();
        assert_eq!(filter.controller().store().row_count("coordinator", "x"), Some(80));
    }

    #[tokio::test]
    async fn closed_actor_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, task) = spawn(dir.path());
        task.abort();
        let _ = task.await;
        assert!(matches!(handle.state().await, Err(RecorderError::Closed)));
    }
}
