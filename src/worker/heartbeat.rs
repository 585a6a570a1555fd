use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Body returned by `/heartbeat`.
#[derive(Debug, Clone, Serialize)]
pub struct HeartbeatResponse {
    /// Human-readable, e.g. `1h 2m 3s 500ms`.
    pub uptime: String,
    pub worker_id: String,
    pub started_at: DateTime<Utc>,
}

/// Process start time, captured once and never mutated.
#[derive(Debug, Clone)]
pub struct Uptime {
    started: Instant,
    started_at: DateTime<Utc>,
}

impl Uptime {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    /// Monotonic: backed by `Instant`, so wall-clock changes don't affect it.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn heartbeat(&self, worker_id: &str) -> HeartbeatResponse {
        // Millisecond precision; sub-ms units only add noise.
        let elapsed = Duration::from_millis(self.elapsed().as_millis() as u64);
        HeartbeatResponse {
            uptime: humantime::format_duration(elapsed).to_string(),
            worker_id: worker_id.to_string(),
            started_at: self.started_at,
        }
    }
}
