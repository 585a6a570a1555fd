//! Local execution side of the worker.
//!
//! - [`CommandExecutor`]: spawns a child process for a validated command and
//!   captures stdout, stderr and exit status
//! - [`heartbeat`]: process uptime, answered on `/heartbeat`
//!
//! # Execution Flow
//!
//! 1. `/submit` handler validates the command against the denylist
//! 2. [`CommandExecutor::execute_until`] spawns the process (directly, or via
//!    `sh -c` in shell mode)
//! 3. The run ends on exit, timeout or shutdown
//! 4. Returns an [`ExecutionResult`](executor::ExecutionResult) with output
//!    and status

pub mod executor;
pub mod heartbeat;

pub use executor::{CommandExecutor, ExecutionResult};
pub use heartbeat::{HeartbeatResponse, Uptime};
