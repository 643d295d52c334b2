//! Repository for the `artifacts` table. Artifacts are append-only: there
//! is an insert and there are reads, nothing else.

use sqlx::PgPool;

use conductor_core::types::EntityId;

use crate::models::artifact::{ArtifactMetaRow, ArtifactRow};

/// Column list for artifacts queries.
const ARTIFACT_COLUMNS: &str =
    "id, execution_id, phase_execution_id, artifact_type, name, content, created_at";

/// Column list for artifact listings; size computed instead of content.
const ARTIFACT_META_COLUMNS: &str = "id, execution_id, phase_execution_id, artifact_type, name, \
    octet_length(content) AS size_bytes, created_at";

pub struct ArtifactRepo;

impl ArtifactRepo {
    /// Insert a new artifact. An id collision is an error, never an update.
    pub async fn insert(pool: &PgPool, row: &ArtifactRow) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO artifacts
                (id, execution_id, phase_execution_id, artifact_type, name, content, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(row.id)
        .bind(row.execution_id)
        .bind(row.phase_execution_id)
        .bind(&row.artifact_type)
        .bind(&row.name)
        .bind(&row.content)
        .bind(row.created_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Find an artifact with its content by ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: EntityId,
    ) -> Result<Option<ArtifactRow>, sqlx::Error> {
        let query = format!("SELECT {ARTIFACT_COLUMNS} FROM artifacts WHERE id = $1");
        sqlx::query_as::<_, ArtifactRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List artifact metadata for an execution, oldest first.
    pub async fn list_meta_for_execution(
        pool: &PgPool,
        execution_id: EntityId,
    ) -> Result<Vec<ArtifactMetaRow>, sqlx::Error> {
        let query = format!(
            "SELECT {ARTIFACT_META_COLUMNS} FROM artifacts
             WHERE execution_id = $1
             ORDER BY created_at ASC"
        );
        sqlx::query_as::<_, ArtifactMetaRow>(&query)
            .bind(execution_id)
            .fetch_all(pool)
            .await
    }
}
