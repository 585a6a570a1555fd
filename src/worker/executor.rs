use std::process::{Output, Stdio};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::config::{ExecConfig, ExecMode};
use crate::task::TaskStatus;

/// Result of a command execution
#[derive(Debug)]
pub struct ExecutionResult {
    pub task_id: String,
    /// Always `Completed` or `Failed`.
    pub status: TaskStatus,
    pub exit_code: Option<i32>,
    pub output: Option<String>,
    pub error: Option<String>,
}

impl ExecutionResult {
    fn failed(task_id: &str, error: String) -> Self {
        Self {
            task_id: task_id.to_string(),
            status: TaskStatus::Failed,
            exit_code: None,
            output: None,
            error: Some(error),
        }
    }

    /// Classify a finished child. Only a zero exit completes the task; a
    /// failure carries stderr, or the exit code when stderr is empty.
    fn from_output(task_id: &str, output: Output) -> Self {
        let exit_code = output.status.code();
        let (status, error) = if output.status.success() {
            (TaskStatus::Completed, None)
        } else {
            let error = non_empty(output.stderr)
                .unwrap_or_else(|| format!("Exit code: {:?}", exit_code));
            (TaskStatus::Failed, Some(error))
        };

        Self {
            task_id: task_id.to_string(),
            status,
            exit_code,
            output: non_empty(output.stdout),
            error,
        }
    }
}

fn non_empty(bytes: Vec<u8>) -> Option<String> {
    (!bytes.is_empty()).then(|| String::from_utf8_lossy(&bytes).into_owned())
}

/// Runs submitted commands as child processes of the worker.
///
/// Children inherit the worker's user, environment and working directory.
/// Each run is bounded by [`ExecConfig::timeout`]; a child that outlives it,
/// or whose cancellation token fires, is killed and reported as failed.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    config: ExecConfig,
}

impl CommandExecutor {
    pub fn new(config: ExecConfig) -> Self {
        Self { config }
    }

    /// Execute a command to completion or timeout.
    pub async fn execute(&self, task_id: &str, command: &str) -> ExecutionResult {
        self.execute_until(task_id, command, &CancellationToken::new())
            .await
    }

    /// Execute a command, giving up early if `cancel` fires.
    pub async fn execute_until(
        &self,
        task_id: &str,
        command: &str,
        cancel: &CancellationToken,
    ) -> ExecutionResult {
        tracing::info!(task_id, command, mode = ?self.config.mode, "Executing task");

        let Some(mut cmd) = self.build_command(command) else {
            tracing::warn!(task_id, "Refusing to execute empty command");
            return ExecutionResult::failed(task_id, "Empty command".to_string());
        };

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Dropping the output future drops the child, which kills it.
        let output = tokio::select! {
            output = cmd.output() => output,
            _ = tokio::time::sleep(self.config.timeout) => {
                tracing::warn!(task_id, timeout = ?self.config.timeout, "Task timed out, killing process");
                return ExecutionResult::failed(
                    task_id,
                    format!("Timed out after {:?}", self.config.timeout),
                );
            }
            _ = cancel.cancelled() => {
                tracing::warn!(task_id, "Task cancelled, killing process");
                return ExecutionResult::failed(task_id, "Cancelled".to_string());
            }
        };

        let result = match output {
            Ok(output) => ExecutionResult::from_output(task_id, output),
            Err(e) => {
                tracing::error!(task_id, error = %e, "Failed to spawn task process");
                return ExecutionResult::failed(task_id, e.to_string());
            }
        };

        tracing::info!(
            task_id,
            status = %result.status,
            exit_code = ?result.exit_code,
            "Task finished"
        );
        result
    }

    fn build_command(&self, command: &str) -> Option<Command> {
        match self.config.mode {
            ExecMode::Direct => {
                let mut parts = command.split_whitespace();
                let program = parts.next()?;
                let mut cmd = Command::new(program);
                cmd.args(parts);
                Some(cmd)
            }
            ExecMode::Shell => {
                if command.trim().is_empty() {
                    return None;
                }
                let mut cmd = Command::new("sh");
                cmd.arg("-c").arg(command);
                Some(cmd)
            }
        }
    }
}
