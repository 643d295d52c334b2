pub mod executions;
pub mod health;
pub mod templates;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws/{execution_id}                   WebSocket (live updates + approvals)
///
/// /executions                          list, create
/// /executions/{id}                     get, delete
/// /executions/{id}/run                 launch (POST)
/// /executions/{id}/cancel              cancel (POST)
/// /executions/{id}/resume              resume a paused execution (POST)
/// /executions/{id}/approve             resolve the open approval (POST)
/// /executions/{id}/budget              budget snapshot
/// /executions/{id}/todos               todo list with progress
/// /executions/{id}/artifacts           artifact listing (metadata only)
///
/// /artifacts/{id}                      artifact with content
/// /artifacts/{id}/content              raw content (text/plain)
///
/// /templates                           list, create
/// /templates/{id}                      get, delete
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws/{execution_id}", get(ws::ws_handler))
        .nest("/executions", executions::router())
        .nest("/templates", templates::router())
        .route("/artifacts/{id}", get(handlers::artifacts::get_artifact))
        .route(
            "/artifacts/{id}/content",
            get(handlers::artifacts::get_artifact_content),
        )
}
