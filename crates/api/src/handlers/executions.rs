//! Handlers for the `/executions` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use conductor_core::budget::BudgetSnapshot;
use conductor_core::execution::{ArtifactMeta, Execution};
use conductor_core::todo::{TodoItem, TodoProgress};
use conductor_core::types::EntityId;
use conductor_pipeline::CreateExecution;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for creating an execution.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateExecutionRequest {
    #[validate(length(min = 1, max = 10_000))]
    pub task_description: String,
    #[serde(default)]
    pub project_path: String,
    /// Template to run; the default pipeline when absent.
    pub template_id: Option<String>,
    #[validate(range(min = 0.01))]
    pub budget_limit_usd: Option<f64>,
    /// Pause for human approval before every stage.
    #[serde(default)]
    pub interactive: bool,
}

/// Request body for resolving the open approval request.
#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    pub approved: bool,
}

/// Detail payload for a single execution: the execution itself (flattened)
/// plus its artifact metadata and the current budget snapshot.
#[derive(Debug, serde::Serialize)]
pub struct ExecutionDetail {
    #[serde(flatten)]
    pub execution: Execution,
    pub artifacts: Vec<ArtifactMeta>,
    pub budget: BudgetSnapshot,
}

/// Todo listing payload: the items plus derived progress.
#[derive(Debug, serde::Serialize)]
pub struct TodoListResponse {
    pub todos: Vec<TodoItem>,
    pub progress: TodoProgress,
}

/// POST /api/v1/executions
///
/// Create a new execution in `pending` status. Returns 201 with the created
/// execution; nothing runs until `/run` is called.
pub async fn create_execution(
    State(state): State<AppState>,
    Json(input): Json<CreateExecutionRequest>,
) -> AppResult<impl IntoResponse> {
    input
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let execution = state
        .orchestrator
        .create_execution(CreateExecution {
            task_description: input.task_description,
            project_path: input.project_path,
            template_id: input.template_id,
            budget_limit_usd: input.budget_limit_usd,
            interactive: input.interactive,
        })
        .await?;

    tracing::info!(
        execution_id = %execution.id,
        interactive = execution.interactive,
        "Execution created",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: execution })))
}

/// GET /api/v1/executions
///
/// List all executions, newest first.
pub async fn list_executions(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let executions = state.orchestrator.list_executions().await?;
    Ok(Json(DataResponse { data: executions }))
}

/// GET /api/v1/executions/{id}
///
/// Full detail view: execution state, artifact metadata, budget snapshot.
pub async fn get_execution(
    State(state): State<AppState>,
    Path(id): Path<EntityId>,
) -> AppResult<impl IntoResponse> {
    let execution = state.orchestrator.get_execution(id).await?;
    let artifacts = state.orchestrator.list_artifacts(id).await?;
    let budget = execution.budget_snapshot();
    Ok(Json(DataResponse {
        data: ExecutionDetail {
            execution,
            artifacts,
            budget,
        },
    }))
}

/// POST /api/v1/executions/{id}/run
///
/// Launch a pending execution. Returns 202; progress is observable over the
/// WebSocket or by polling.
pub async fn run_execution(
    State(state): State<AppState>,
    Path(id): Path<EntityId>,
) -> AppResult<impl IntoResponse> {
    state.orchestrator.run(id).await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/v1/executions/{id}/cancel
///
/// Cancel from any non-terminal status. 409 when already terminal.
pub async fn cancel_execution(
    State(state): State<AppState>,
    Path(id): Path<EntityId>,
) -> AppResult<impl IntoResponse> {
    state.orchestrator.cancel(id).await?;
    let execution = state.orchestrator.get_execution(id).await?;
    Ok(Json(DataResponse { data: execution }))
}

/// POST /api/v1/executions/{id}/resume
///
/// Relaunch a paused execution; finished phases are not re-run.
pub async fn resume_execution(
    State(state): State<AppState>,
    Path(id): Path<EntityId>,
) -> AppResult<impl IntoResponse> {
    state.orchestrator.resume(id).await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/v1/executions/{id}/approve
///
/// Resolve the open approval request. 409 when none is pending.
pub async fn approve_execution(
    State(state): State<AppState>,
    Path(id): Path<EntityId>,
    Json(input): Json<ApproveRequest>,
) -> AppResult<impl IntoResponse> {
    state.orchestrator.approve(id, input.approved, "api").await?;
    tracing::info!(execution_id = %id, approved = input.approved, "Approval resolved");
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/executions/{id}
///
/// Delete a terminal execution together with its artifacts and audit trail.
/// 409 while the execution is still live.
pub async fn delete_execution(
    State(state): State<AppState>,
    Path(id): Path<EntityId>,
) -> AppResult<impl IntoResponse> {
    state.orchestrator.delete_execution(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/executions/{id}/budget
pub async fn get_budget(
    State(state): State<AppState>,
    Path(id): Path<EntityId>,
) -> AppResult<Json<DataResponse<BudgetSnapshot>>> {
    let execution = state.orchestrator.get_execution(id).await?;
    Ok(Json(DataResponse {
        data: execution.budget_snapshot(),
    }))
}

/// GET /api/v1/executions/{id}/todos
pub async fn get_todos(
    State(state): State<AppState>,
    Path(id): Path<EntityId>,
) -> AppResult<Json<DataResponse<TodoListResponse>>> {
    let execution = state.orchestrator.get_execution(id).await?;
    let progress = TodoProgress::from_items(&execution.todos);
    Ok(Json(DataResponse {
        data: TodoListResponse {
            todos: execution.todos,
            progress,
        },
    }))
}
