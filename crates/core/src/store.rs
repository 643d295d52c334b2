//! The persistence boundary.
//!
//! Executions, artifacts, approval audit records and templates must survive
//! process restarts. The state machine persists through this trait so the
//! orchestration core never sees a concrete backend; the `db` crate provides
//! the Postgres implementation and the pipeline crate an in-memory one.

use async_trait::async_trait;

use crate::execution::{ApprovalRecord, Artifact, ArtifactMeta, Execution};
use crate::graph::PhaseGraph;
use crate::types::EntityId;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Upsert an execution together with its phase executions and todos.
    async fn save_execution(&self, execution: &Execution) -> Result<(), StoreError>;

    async fn load_execution(&self, id: EntityId) -> Result<Option<Execution>, StoreError>;

    /// All executions, newest first. Used by listings and restart recovery.
    async fn load_executions(&self) -> Result<Vec<Execution>, StoreError>;

    /// Explicit deletion; cascades to artifacts and approval records.
    /// Returns whether anything was deleted.
    async fn delete_execution(&self, id: EntityId) -> Result<bool, StoreError>;

    /// Artifacts are append-only; an id collision is a backend error.
    async fn insert_artifact(&self, artifact: &Artifact) -> Result<(), StoreError>;

    async fn get_artifact(&self, id: EntityId) -> Result<Option<Artifact>, StoreError>;

    async fn list_artifacts(&self, execution_id: EntityId) -> Result<Vec<ArtifactMeta>, StoreError>;

    async fn record_approval(&self, record: &ApprovalRecord) -> Result<(), StoreError>;

    async fn save_template(&self, graph: &PhaseGraph) -> Result<(), StoreError>;

    async fn get_template(&self, id: &str) -> Result<Option<PhaseGraph>, StoreError>;

    async fn list_templates(&self) -> Result<Vec<PhaseGraph>, StoreError>;

    async fn delete_template(&self, id: &str) -> Result<bool, StoreError>;
}
