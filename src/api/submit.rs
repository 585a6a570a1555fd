use axum::{body::Bytes, extract::State, Json};

use super::{ApiError, ApiState, SubmitResponse};
use crate::task::{Task, TaskStatus};
use crate::worker::ExecutionResult;

/// `POST /submit`
///
/// Everything that can go wrong before the command runs is answered with 400
/// and reported nowhere. Once the command is allowed, the task is handed to
/// [`run_task`] and the coordinator hears about it whatever happens next.
///
/// The body is decoded as JSON whatever `Content-Type` says.
pub(super) async fn submit_handler(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<SubmitResponse>, ApiError> {
    let task: Task = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(error = %e, "Rejecting malformed task submission");
        ApiError::BadRequest(format!("Invalid request body: {}", e))
    })?;

    if task.id.trim().is_empty() {
        return Err(ApiError::BadRequest("task_id must not be empty".to_string()));
    }
    if task.command.trim().is_empty() {
        return Err(ApiError::BadRequest("command must not be empty".to_string()));
    }

    tracing::info!(task_id = %task.id, command = %task.command, "Task received");

    if !state.validator.is_allowed(&task.command) {
        tracing::warn!(task_id = %task.id, command = %task.command, "Command rejected by denylist");
        return Err(ApiError::BadRequest(
            "Command not allowed - please retry with a valid command".to_string(),
        ));
    }

    let result = run_task(&state, task).await?;
    let body = SubmitResponse {
        task_id: result.task_id,
        status: result.status,
        exit_code: result.exit_code,
        output: result.output,
        error: result.error,
    };

    match body.status {
        TaskStatus::Completed => Ok(Json(body)),
        _ => Err(ApiError::ExecutionFailed(body)),
    }
}

/// Report `STARTED`, execute, report the outcome.
///
/// The work runs on its own tokio task: if the submitter disconnects and this
/// future is dropped, the child keeps running and its terminal status is
/// still reported. There is no way to cancel a task from the client side.
/// Both the execution and its report delivery are tracked in
/// [`ApiState::tasks`], so shutdown waits for the terminal report.
///
/// # Errors
///
/// Returns [`ApiError::Internal`] only if the execution task panicked.
pub async fn run_task(state: &ApiState, task: Task) -> Result<ExecutionResult, ApiError> {
    let reports = state.reporter.task_reports(task.id.clone(), &state.tasks);
    let executor = state.executor.clone();
    let cancel = state.shutdown.child_token();

    let handle = state.tasks.spawn(async move {
        reports.issue(TaskStatus::Started);
        let result = executor
            .execute_until(&task.id, &task.command, &cancel)
            .await;
        // Delivery continues in the background; the submitter doesn't wait
        // on the coordinator.
        let _delivery = reports.finish(result.status);
        result
    });

    handle.await.map_err(|e| {
        tracing::error!(error = %e, "Task execution aborted");
        ApiError::Internal(format!("Task execution aborted: {}", e))
    })
}
