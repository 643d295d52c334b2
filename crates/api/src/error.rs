use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use conductor_core::error::CoreError;
use conductor_core::store::StoreError;
use conductor_pipeline::{ApprovalError, ControlError};

/// Application-level error type for HTTP handlers.
///
/// Wraps the domain error taxonomy and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `conductor_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A conflict on the approval gate.
    #[error(transparent)]
    Approval(#[from] ApprovalError),

    /// A persistence error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<ControlError> for AppError {
    fn from(error: ControlError) -> Self {
        match error {
            ControlError::Core(e) => Self::Core(e),
            ControlError::Approval(e) => Self::Approval(e),
            ControlError::Store(e) => Self::Store(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::InvalidState { .. } => {
                    (StatusCode::CONFLICT, "CONFLICT", core.to_string())
                }
                CoreError::BudgetExceeded { .. } => {
                    (StatusCode::CONFLICT, "BUDGET_EXCEEDED", core.to_string())
                }
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            // --- Approval gate conflicts ---
            AppError::Approval(approval) => {
                (StatusCode::CONFLICT, "CONFLICT", approval.to_string())
            }

            // --- Persistence errors ---
            AppError::Store(store) => match store {
                StoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                StoreError::Backend(msg) => {
                    tracing::error!(error = %msg, "Storage backend error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
