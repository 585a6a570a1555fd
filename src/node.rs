use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::api::{self, ApiState};
use crate::config::{CoordinatorConfig, WorkerConfig};
use crate::error::Result;
use crate::identity::WorkerIdentity;
use crate::reporter::StatusReporter;
use crate::worker::Uptime;

/// A worker that has completed its registration handshake.
///
/// The only way to obtain one is [`WorkerNode::bootstrap`], so a value of this
/// type is proof that the coordinator knows about us and it is safe to accept
/// work.
pub struct WorkerNode {
    pub config: WorkerConfig,
    pub identity: WorkerIdentity,
    reporter: StatusReporter,
    uptime: Uptime,
    tasks: TaskTracker,
}

impl WorkerNode {
    /// Discover identity and register with the coordinator.
    ///
    /// 1. Resolves the advertised IPv4 address (first non-loopback interface
    ///    unless configured)
    /// 2. Derives the worker id using the configured strategy
    /// 3. Collects CPU and memory metadata
    /// 4. Registers, retrying transport failures with backoff
    ///
    /// # Errors
    ///
    /// Any failure here is fatal: the caller must not start serving.
    pub async fn bootstrap(config: WorkerConfig) -> Result<Self> {
        let uptime = Uptime::start();
        let identity = WorkerIdentity::discover(&config)?;

        tracing::info!(
            worker_id = %identity.worker_id,
            ip = %identity.ip,
            port = %identity.port,
            num_cpu = identity.metadata.num_cpu,
            total_ram = identity.metadata.total_ram,
            coordinator = %config.coordinator.url,
            "Worker identity resolved"
        );

        let reporter = StatusReporter::new(config.coordinator.clone())?;
        register_with_retry(&reporter, &identity, &config.coordinator).await?;

        Ok(Self {
            config,
            identity,
            reporter,
            uptime,
            tasks: TaskTracker::new(),
        })
    }

    pub fn router(&self, shutdown: CancellationToken) -> Router {
        let state = ApiState::new(
            &self.config,
            &self.identity.worker_id,
            self.reporter.clone(),
            self.uptime.clone(),
            shutdown,
            self.tasks.clone(),
        );
        api::router(state)
    }

    /// Bind the configured address and serve until `shutdown` fires.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let listener = TcpListener::bind(self.config.listen_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` fires, then wait
    /// for in-flight executions and their reports to drain.
    pub async fn serve(self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        let app = self.router(shutdown.clone());

        tracing::info!(
            addr = %listener.local_addr()?,
            worker_id = %self.identity.worker_id,
            "Worker accepting tasks"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await?;

        self.drain().await;
        tracing::info!("Worker stopped");
        Ok(())
    }

    /// Wait for tracked work to finish. Cancelled children exit at once, so
    /// what remains is at most two coordinator round trips per task.
    async fn drain(&self) {
        self.tasks.close();
        if self.tasks.is_empty() {
            return;
        }

        let limit = self.config.coordinator.request_timeout.saturating_mul(2);
        tracing::info!(pending = self.tasks.len(), limit = ?limit, "Draining task reports");
        if tokio::time::timeout(limit, self.tasks.wait()).await.is_err() {
            tracing::warn!(
                pending = self.tasks.len(),
                "Task reports still pending at shutdown, dropping them"
            );
        }
    }
}

/// Register, retrying transport errors up to `config.register_attempts`
/// times with exponential backoff. A coordinator rejection is returned
/// immediately.
pub async fn register_with_retry(
    reporter: &StatusReporter,
    identity: &WorkerIdentity,
    config: &CoordinatorConfig,
) -> Result<()> {
    let attempts = config.register_attempts.max(1);
    let mut delay = config.register_backoff;
    let mut attempt = 1;

    loop {
        match reporter.register(identity).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_retryable() && attempt < attempts => {
                tracing::warn!(
                    attempt,
                    attempts,
                    retry_in = ?delay,
                    error = %e,
                    "Registration failed, retrying"
                );
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(attempt, error = %e, "Registration failed");
                return Err(e);
            }
        }
    }
}
