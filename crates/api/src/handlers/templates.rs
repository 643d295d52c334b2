//! Handlers for the `/templates` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use conductor_core::graph::PhaseGraph;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/templates
///
/// Create or replace a phase graph template. The graph is structurally
/// validated (unique phase ids, well-formed parallel groups) before saving.
pub async fn create_template(
    State(state): State<AppState>,
    Json(graph): Json<PhaseGraph>,
) -> AppResult<impl IntoResponse> {
    state.orchestrator.save_template(&graph).await?;
    tracing::info!(template_id = %graph.id, phases = graph.phases.len(), "Template saved");
    Ok((StatusCode::CREATED, Json(DataResponse { data: graph })))
}

/// GET /api/v1/templates
pub async fn list_templates(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let templates = state.orchestrator.list_templates().await?;
    Ok(Json(DataResponse { data: templates }))
}

/// GET /api/v1/templates/{id}
pub async fn get_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let template = state.orchestrator.get_template(&id).await?;
    Ok(Json(DataResponse { data: template }))
}

/// DELETE /api/v1/templates/{id}
pub async fn delete_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    state.orchestrator.delete_template(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
