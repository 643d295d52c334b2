//! Row types for the Postgres schema and their domain conversions.
//!
//! Statuses and enums are stored as snake_case text; the frozen phase graph
//! and the todo list are stored as JSONB documents.

pub mod approval;
pub mod artifact;
pub mod execution;
pub mod template;

/// Failure decoding a stored row into its domain type.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid {field} value '{value}'")]
    InvalidField { field: &'static str, value: String },

    #[error("invalid JSON in {field}: {source}")]
    Json {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },
}
