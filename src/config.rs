use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::ValueEnum;

/// Command prefixes refused when no denylist is configured.
pub const DEFAULT_DENYLIST: &[&str] = &["rm -rf", "sudo"];

pub const DEFAULT_COORDINATOR_URL: &str = "http://127.0.0.1:5001";

pub const DEFAULT_PORT: u16 = 8081;

/// How a submitted command string is turned into a child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ExecMode {
    /// Split on whitespace into program and arguments, no shell involved.
    #[default]
    Direct,
    /// Hand the whole string to `sh -c`. Pipes and redirects work, and the
    /// denylist becomes trivially bypassable.
    Shell,
}

/// How the worker identifier is derived at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum IdStrategy {
    /// `WID_<ip digits><port>`: stable across restarts, collides if two
    /// workers share an address.
    #[default]
    Address,
    /// `WID_<uuid>`: unique per process, changes on every restart.
    Random,
}

/// Limits applied to every command execution.
#[derive(Debug, Clone)]
pub struct ExecConfig {
    pub mode: ExecMode,
    /// Child processes still running after this long are killed.
    pub timeout: Duration,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            mode: ExecMode::Direct,
            timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Base URL, e.g. `http://127.0.0.1:5001`. Paths are appended to it.
    pub url: String,
    pub request_timeout: Duration,
    /// Total registration attempts before startup gives up (minimum 1).
    pub register_attempts: u32,
    /// Delay before the second attempt; doubled for each one after.
    pub register_backoff: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_COORDINATOR_URL.to_string(),
            request_timeout: Duration::from_secs(5),
            register_attempts: 1,
            register_backoff: Duration::from_millis(500),
        }
    }
}

impl CoordinatorConfig {
    /// Join a path onto the base URL, tolerating a trailing slash on the base.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Everything the worker needs, built once in `main` and shared read-only.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub listen_addr: SocketAddr,
    /// Address announced to the coordinator. Discovered from the host
    /// interfaces when unset.
    pub advertise_ip: Option<IpAddr>,
    pub id_strategy: IdStrategy,
    pub denylist: Vec<String>,
    pub exec: ExecConfig,
    pub coordinator: CoordinatorConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            advertise_ip: None,
            id_strategy: IdStrategy::default(),
            denylist: DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect(),
            exec: ExecConfig::default(),
            coordinator: CoordinatorConfig::default(),
        }
    }
}

impl WorkerConfig {
    pub fn new(listen_addr: SocketAddr, coordinator_url: impl Into<String>) -> Self {
        Self {
            listen_addr,
            coordinator: CoordinatorConfig {
                url: coordinator_url.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn with_denylist<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.denylist = entries.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_exec_mode(mut self, mode: ExecMode) -> Self {
        self.exec.mode = mode;
        self
    }

    pub fn port(&self) -> u16 {
        self.listen_addr.port()
    }
}

/// Parse a comma-separated denylist. Entries are trimmed; empty entries are
/// dropped so a trailing comma doesn't deny every command.
pub fn parse_denylist(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
