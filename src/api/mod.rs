//! HTTP surface of the worker: `/submit` and `/heartbeat`.

mod submit;

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower_http::trace::TraceLayer;

use crate::config::WorkerConfig;
use crate::reporter::StatusReporter;
use crate::task::TaskStatus;
use crate::validator::CommandValidator;
use crate::worker::{CommandExecutor, HeartbeatResponse, Uptime};

pub use submit::run_task;

/// Shared, read-only state handed to every request.
#[derive(Clone)]
pub struct ApiState {
    pub worker_id: Arc<str>,
    pub validator: Arc<CommandValidator>,
    pub executor: Arc<CommandExecutor>,
    pub reporter: StatusReporter,
    pub uptime: Arc<Uptime>,
    /// Cancelled on process shutdown; in-flight children are killed.
    pub shutdown: CancellationToken,
    /// Executions and report deliveries that must finish before exit.
    pub tasks: TaskTracker,
}

impl ApiState {
    pub fn new(
        config: &WorkerConfig,
        worker_id: &str,
        reporter: StatusReporter,
        uptime: Uptime,
        shutdown: CancellationToken,
        tasks: TaskTracker,
    ) -> Self {
        Self {
            worker_id: Arc::from(worker_id),
            validator: Arc::new(CommandValidator::new(config.denylist.clone())),
            executor: Arc::new(CommandExecutor::new(config.exec.clone())),
            reporter,
            uptime: Arc::new(uptime),
            shutdown,
            tasks,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitResponse {
    pub task_id: String,
    pub status: TaskStatus,
    pub exit_code: Option<i32>,
    pub output: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// Request never entered the pipeline; nothing is reported.
    BadRequest(String),
    /// Command ran (or failed to spawn) and was reported as FAILED.
    ExecutionFailed(SubmitResponse),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(error) => {
                (StatusCode::BAD_REQUEST, Json(ErrorBody { error })).into_response()
            }
            ApiError::ExecutionFailed(body) => {
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
            ApiError::Internal(error) => {
                (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody { error })).into_response()
            }
        }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route(
            "/submit",
            post(submit::submit_handler).fallback(method_not_allowed),
        )
        .route("/heartbeat", get(heartbeat_handler).post(heartbeat_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn heartbeat_handler(State(state): State<ApiState>) -> Json<HeartbeatResponse> {
    Json(state.uptime.heartbeat(&state.worker_id))
}

// Wrong method is a client error like any other malformed submission.
async fn method_not_allowed() -> ApiError {
    ApiError::BadRequest("Method not allowed".to_string())
}
