//! Outbound calls to the coordinator.
//!
//! Registration gates startup: any failure is returned to the caller, which
//! refuses to serve. Task status updates are telemetry about work that has
//! already happened, so their failures are logged and dropped.

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

use crate::config::CoordinatorConfig;
use crate::error::{Result, WorkerError};
use crate::identity::WorkerIdentity;
use crate::task::TaskStatus;

const REGISTER_PATH: &str = "/register";
const STATUS_UPDATE_PATH: &str = "/jobStatusUpdate";

#[derive(Debug, Serialize)]
struct StatusUpdate<'a> {
    task_id: &'a str,
    status: TaskStatus,
}

/// HTTP client for the coordinator. Cheap to clone.
#[derive(Debug, Clone)]
pub struct StatusReporter {
    client: reqwest::Client,
    config: CoordinatorConfig,
}

impl StatusReporter {
    pub fn new(config: CoordinatorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    /// Announce this worker. Succeeds only on a 2xx answer.
    pub async fn register(&self, identity: &WorkerIdentity) -> Result<()> {
        let url = self.config.endpoint(REGISTER_PATH);
        tracing::debug!(url = %url, worker_id = %identity.worker_id, "Registering with coordinator");

        let response = self.client.post(&url).json(identity).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(WorkerError::RegistrationRejected(status.as_u16()));
        }

        tracing::info!(worker_id = %identity.worker_id, "Worker registered with coordinator");
        Ok(())
    }

    /// Post a single status update for `task_id`.
    pub async fn report_task_status(&self, task_id: &str, status: TaskStatus) -> Result<()> {
        let url = self.config.endpoint(STATUS_UPDATE_PATH);
        let response = self
            .client
            .post(&url)
            .json(&StatusUpdate { task_id, status })
            .send()
            .await?;

        let code = response.status();
        if !code.is_success() {
            return Err(WorkerError::ReportRejected {
                task_id: task_id.to_string(),
                status: code.as_u16(),
            });
        }

        tracing::debug!(task_id, status = %status, "Task status reported");
        Ok(())
    }

    /// Open an ordered report stream for one task. Its delivery task is
    /// registered with `tasks` so shutdown can wait for it to drain.
    pub fn task_reports(&self, task_id: impl Into<String>, tasks: &TaskTracker) -> TaskReports {
        TaskReports::spawn(self.clone(), task_id.into(), tasks)
    }
}

/// Per-task status stream.
///
/// Statuses are queued without waiting on the coordinator and delivered by a
/// background task one at a time, in the order they were issued. A status is
/// never posted before the one issued ahead of it has been answered (or has
/// failed), so `STARTED` always reaches the coordinator first.
#[derive(Debug)]
pub struct TaskReports {
    task_id: String,
    tx: mpsc::UnboundedSender<TaskStatus>,
    delivery: JoinHandle<()>,
}

impl TaskReports {
    fn spawn(reporter: StatusReporter, task_id: String, tasks: &TaskTracker) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<TaskStatus>();
        let id = task_id.clone();

        let delivery = tasks.spawn(async move {
            while let Some(status) = rx.recv().await {
                if let Err(e) = reporter.report_task_status(&id, status).await {
                    tracing::warn!(task_id = %id, status = %status, error = %e, "Failed to report task status");
                }
            }
        });

        Self {
            task_id,
            tx,
            delivery,
        }
    }

    /// Queue a status for delivery. Never blocks.
    pub fn issue(&self, status: TaskStatus) {
        // The receiver lives until every sender is gone, so this only fails
        // if the delivery task panicked.
        if self.tx.send(status).is_err() {
            tracing::warn!(task_id = %self.task_id, status = %status, "Report stream closed, status dropped");
        }
    }

    /// Queue the terminal status and close the stream. The returned handle
    /// resolves once every queued status has been attempted.
    pub fn finish(self, status: TaskStatus) -> JoinHandle<()> {
        self.issue(status);
        self.delivery
    }
}
