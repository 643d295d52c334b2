//! Handlers for artifact reads. Artifacts are append-only; there is no
//! write surface here.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

use conductor_core::types::EntityId;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/executions/{id}/artifacts
///
/// Metadata listing, oldest first. Content is fetched per artifact.
pub async fn list_artifacts(
    State(state): State<AppState>,
    Path(id): Path<EntityId>,
) -> AppResult<impl IntoResponse> {
    let artifacts = state.orchestrator.list_artifacts(id).await?;
    Ok(Json(DataResponse { data: artifacts }))
}

/// GET /api/v1/artifacts/{id}
///
/// A single artifact with its full content.
pub async fn get_artifact(
    State(state): State<AppState>,
    Path(id): Path<EntityId>,
) -> AppResult<impl IntoResponse> {
    let artifact = state.orchestrator.get_artifact(id).await?;
    Ok(Json(DataResponse { data: artifact }))
}

/// GET /api/v1/artifacts/{id}/content
///
/// Raw artifact content as plain text, for piping into files or diff tools.
pub async fn get_artifact_content(
    State(state): State<AppState>,
    Path(id): Path<EntityId>,
) -> AppResult<String> {
    let artifact = state.orchestrator.get_artifact(id).await?;
    Ok(artifact.content)
}
