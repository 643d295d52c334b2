//! [`PgStore`]: the Postgres-backed `ExecutionStore`.
//!
//! Thin glue between the store trait and the repositories: domain values are
//! converted to rows on the way in and back on the way out, and every
//! backend or decode failure surfaces as `StoreError::Backend`.

use async_trait::async_trait;
use sqlx::PgPool;

use conductor_core::execution::{ApprovalRecord, Artifact, ArtifactMeta, Execution};
use conductor_core::graph::PhaseGraph;
use conductor_core::store::{ExecutionStore, StoreError};
use conductor_core::types::EntityId;

use crate::models::approval::ApprovalRow;
use crate::models::artifact::ArtifactRow;
use crate::models::execution::{ExecutionRow, PhaseExecutionRow};
use crate::repositories::approval_repo::ApprovalRepo;
use crate::repositories::artifact_repo::ArtifactRepo;
use crate::repositories::execution_repo::{ExecutionRepo, PhaseExecutionRepo};
use crate::repositories::template_repo::TemplateRepo;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_with_phases(&self, row: ExecutionRow) -> Result<Execution, StoreError> {
        let phase_rows = PhaseExecutionRepo::list_for_execution(&self.pool, row.id)
            .await
            .map_err(backend)?;
        let phases = phase_rows
            .into_iter()
            .map(|r| r.into_domain().map_err(backend))
            .collect::<Result<Vec<_>, _>>()?;
        row.into_domain(phases).map_err(backend)
    }
}

#[async_trait]
impl ExecutionStore for PgStore {
    async fn save_execution(&self, execution: &Execution) -> Result<(), StoreError> {
        let row = ExecutionRow::from_domain(execution).map_err(backend)?;
        ExecutionRepo::upsert(&self.pool, &row)
            .await
            .map_err(backend)?;
        for (position, phase) in execution.phases.iter().enumerate() {
            let phase_row = PhaseExecutionRow::from_domain(execution.id, position as i32, phase);
            PhaseExecutionRepo::upsert(&self.pool, &phase_row)
                .await
                .map_err(backend)?;
        }
        Ok(())
    }

    async fn load_execution(&self, id: EntityId) -> Result<Option<Execution>, StoreError> {
        match ExecutionRepo::find_by_id(&self.pool, id)
            .await
            .map_err(backend)?
        {
            Some(row) => Ok(Some(self.load_with_phases(row).await?)),
            None => Ok(None),
        }
    }

    async fn load_executions(&self) -> Result<Vec<Execution>, StoreError> {
        let rows = ExecutionRepo::list_all(&self.pool).await.map_err(backend)?;
        let mut executions = Vec::with_capacity(rows.len());
        for row in rows {
            executions.push(self.load_with_phases(row).await?);
        }
        Ok(executions)
    }

    async fn delete_execution(&self, id: EntityId) -> Result<bool, StoreError> {
        ExecutionRepo::delete(&self.pool, id).await.map_err(backend)
    }

    async fn insert_artifact(&self, artifact: &Artifact) -> Result<(), StoreError> {
        let row = ArtifactRow::from_domain(artifact);
        ArtifactRepo::insert(&self.pool, &row).await.map_err(backend)
    }

    async fn get_artifact(&self, id: EntityId) -> Result<Option<Artifact>, StoreError> {
        ArtifactRepo::find_by_id(&self.pool, id)
            .await
            .map_err(backend)?
            .map(|row| row.into_domain().map_err(backend))
            .transpose()
    }

    async fn list_artifacts(&self, execution_id: EntityId) -> Result<Vec<ArtifactMeta>, StoreError> {
        ArtifactRepo::list_meta_for_execution(&self.pool, execution_id)
            .await
            .map_err(backend)?
            .into_iter()
            .map(|row| row.into_domain().map_err(backend))
            .collect()
    }

    async fn record_approval(&self, record: &ApprovalRecord) -> Result<(), StoreError> {
        let row = ApprovalRow::from_domain(record);
        ApprovalRepo::insert(&self.pool, &row).await.map_err(backend)
    }

    async fn save_template(&self, graph: &PhaseGraph) -> Result<(), StoreError> {
        let value = serde_json::to_value(graph)
            .map_err(|e| StoreError::Backend(format!("failed to encode graph: {e}")))?;
        TemplateRepo::upsert(&self.pool, &graph.id, &graph.name, &value)
            .await
            .map_err(backend)
    }

    async fn get_template(&self, id: &str) -> Result<Option<PhaseGraph>, StoreError> {
        TemplateRepo::find_by_id(&self.pool, id)
            .await
            .map_err(backend)?
            .map(|row| row.into_domain().map_err(backend))
            .transpose()
    }

    async fn list_templates(&self) -> Result<Vec<PhaseGraph>, StoreError> {
        TemplateRepo::list_all(&self.pool)
            .await
            .map_err(backend)?
            .into_iter()
            .map(|row| row.into_domain().map_err(backend))
            .collect()
    }

    async fn delete_template(&self, id: &str) -> Result<bool, StoreError> {
        TemplateRepo::delete(&self.pool, id).await.map_err(backend)
    }
}

fn backend(error: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(error.to_string())
}
