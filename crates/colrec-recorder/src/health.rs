use std::time::{Duration, Instant};

use serde::Serialize;

use crate::controller::RecorderState;

/// Periodic status report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub agent_status: RecorderState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

/// Emits a [`HealthStatus`] at most once per period.
#[derive(Debug)]
pub struct HealthReporter {
    period: Duration,
    agent_id: Option<String>,
    last_report: Instant,
}

impl HealthReporter {
    /// The first report is due one period after `now`.
    pub fn new(period: Duration, agent_id: Option<String>, now: Instant) -> Self {
        Self {
            period,
            agent_id,
            last_report: now,
        }
    }

    /// Report `state` if a full period has elapsed since the last report.
    pub fn poll(&mut self, now: Instant, state: RecorderState) -> Option<HealthStatus> {
        if now.saturating_duration_since(self.last_report) < self.period {
            return None;
        }
        self.last_report = now;
        Some(HealthStatus {
            agent_status: state,
            agent_id: self.agent_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reports_at_most_once_per_period() {
        let start = Instant::now();
        let period = Duration::from_millis(500);
        let mut health = HealthReporter::new(period, None, start);

        assert_eq!(health.poll(start + Duration::from_millis(100), RecorderState::Idle), None);
        let status = health.poll(start + period, RecorderState::Idle).unwrap();
        assert_eq!(status.agent_status, RecorderState::Idle);
        assert_eq!(health.poll(start + period + Duration::from_millis(499), RecorderState::Idle), None);
        assert!(health
            .poll(start + period * 2, RecorderState::Recording)
            .is_some());
    }

    #[test]
    fn status_json() {
        let status = HealthStatus {
            agent_status: RecorderState::Recording,
            agent_id: Some("writer-1".into()),
        };
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({"agent_status": "recording", "agent_id": "writer-1"})
        );
        let status = HealthStatus {
            agent_status: RecorderState::Idle,
            agent_id: None,
        };
        assert_eq!(serde_json::to_value(&status).unwrap(), json!({"agent_status": "idle"}));
    }
}
