use crate::status::ExecutionStatus;

/// Domain error taxonomy shared by the orchestration core and the API layer.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The requested control operation is not valid for the current status.
    #[error("Operation '{operation}' is not valid while execution is {status}")]
    InvalidState {
        operation: &'static str,
        status: ExecutionStatus,
    },

    /// Hard stop: launching the phase would push spend strictly above the limit.
    #[error("Budget exceeded: ${total:.4} spent + ${estimated:.4} estimated exceeds limit ${limit:.4}")]
    BudgetExceeded {
        total: f64,
        estimated: f64,
        limit: f64,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
