use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("No non-loopback IPv4 address found")]
    NoLocalAddress,

    #[error("Registration rejected by coordinator: HTTP {0}")]
    RegistrationRejected(u16),

    #[error("Status update for task {task_id} rejected by coordinator: HTTP {status}")]
    ReportRejected { task_id: String, status: u16 },

    #[error("Coordinator request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    /// Transport failures may succeed on a later attempt; a coordinator that
    /// answered with a rejection will not change its mind.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WorkerError::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, WorkerError>;
