//! Route definitions for the `/executions` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{artifacts, executions};
use crate::state::AppState;

/// Routes mounted at `/executions`.
///
/// ```text
/// GET    /                 -> list_executions
/// POST   /                 -> create_execution
/// GET    /{id}             -> get_execution
/// DELETE /{id}             -> delete_execution
/// POST   /{id}/run         -> run_execution
/// POST   /{id}/cancel      -> cancel_execution
/// POST   /{id}/resume      -> resume_execution
/// POST   /{id}/approve     -> approve_execution
/// GET    /{id}/budget      -> get_budget
/// GET    /{id}/todos       -> get_todos
/// GET    /{id}/artifacts   -> list_artifacts
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(executions::list_executions).post(executions::create_execution),
        )
        .route(
            "/{id}",
            get(executions::get_execution).delete(executions::delete_execution),
        )
        .route("/{id}/run", post(executions::run_execution))
        .route("/{id}/cancel", post(executions::cancel_execution))
        .route("/{id}/resume", post(executions::resume_execution))
        .route("/{id}/approve", post(executions::approve_execution))
        .route("/{id}/budget", get(executions::get_budget))
        .route("/{id}/todos", get(executions::get_todos))
        .route("/{id}/artifacts", get(artifacts::list_artifacts))
}
