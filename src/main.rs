use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use hydra_worker::config::{
    parse_denylist, CoordinatorConfig, ExecConfig, ExecMode, IdStrategy, WorkerConfig,
    DEFAULT_COORDINATOR_URL,
};
use hydra_worker::node::WorkerNode;
use hydra_worker::shutdown::install_shutdown_handler;

#[derive(Parser, Debug)]
#[command(name = "hydra-worker")]
#[command(version)]
#[command(about = "Task-execution worker: registers with a coordinator and runs submitted commands")]
struct Args {
    /// Port to listen on for /submit and /heartbeat
    #[arg(long, env = "HYDRA_WORKER_PORT", default_value = "8081")]
    port: u16,

    /// Interface to bind the listener to
    #[arg(long, env = "HYDRA_WORKER_BIND", default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Address announced to the coordinator (default: first non-loopback IPv4)
    #[arg(long, env = "HYDRA_WORKER_ADVERTISE_IP")]
    advertise_ip: Option<IpAddr>,

    /// Coordinator base URL
    #[arg(long, env = "HYDRA_COORDINATOR_URL", default_value = DEFAULT_COORDINATOR_URL)]
    coordinator_url: String,

    /// Comma-separated command prefixes to refuse
    #[arg(long, env = "HYDRA_DENYLIST", default_value = "rm -rf,sudo")]
    denylist: String,

    /// How commands are launched
    #[arg(
        long,
        env = "HYDRA_EXEC_MODE",
        value_enum,
        ignore_case = true,
        default_value_t = ExecMode::Direct
    )]
    exec_mode: ExecMode,

    /// Kill commands still running after this many seconds
    #[arg(long, env = "HYDRA_EXEC_TIMEOUT_SECS", default_value = "300")]
    exec_timeout_secs: u64,

    /// How the worker id is derived
    #[arg(
        long,
        env = "HYDRA_ID_STRATEGY",
        value_enum,
        ignore_case = true,
        default_value_t = IdStrategy::Address
    )]
    id_strategy: IdStrategy,

    /// Timeout for each coordinator request, in milliseconds
    #[arg(long, env = "HYDRA_COORDINATOR_TIMEOUT_MS", default_value = "5000")]
    coordinator_timeout_ms: u64,

    /// Registration attempts before giving up (transport errors only)
    #[arg(long, env = "HYDRA_REGISTER_ATTEMPTS", default_value = "1")]
    register_attempts: u32,

    /// Initial backoff between registration attempts, in milliseconds
    #[arg(long, env = "HYDRA_REGISTER_BACKOFF_MS", default_value = "500")]
    register_backoff_ms: u64,
}

impl Args {
    fn into_config(self) -> WorkerConfig {
        WorkerConfig {
            listen_addr: SocketAddr::new(self.bind, self.port),
            advertise_ip: self.advertise_ip,
            id_strategy: self.id_strategy,
            denylist: parse_denylist(&self.denylist),
            exec: ExecConfig {
                mode: self.exec_mode,
                timeout: Duration::from_secs(self.exec_timeout_secs),
            },
            coordinator: CoordinatorConfig {
                url: self.coordinator_url,
                request_timeout: Duration::from_millis(self.coordinator_timeout_ms),
                register_attempts: self.register_attempts,
                register_backoff: Duration::from_millis(self.register_backoff_ms),
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Args::parse().into_config();

    if config.exec.mode == ExecMode::Shell {
        tracing::warn!(
            "Shell exec mode enabled. The denylist only matches command prefixes \
             and is trivially bypassed through the shell."
        );
    }

    tracing::info!(
        listen_addr = %config.listen_addr,
        coordinator = %config.coordinator.url,
        denylist = ?config.denylist,
        exec_mode = ?config.exec.mode,
        "Starting hydra worker"
    );

    let shutdown = install_shutdown_handler()?;

    let node = match WorkerNode::bootstrap(config).await {
        Ok(node) => node,
        Err(e) => {
            tracing::error!(error = %e, "Worker startup failed");
            return Err(e.into());
        }
    };

    node.run(shutdown).await?;
    Ok(())
}
