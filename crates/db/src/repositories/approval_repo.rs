//! Repository for the `approvals` audit table.

use sqlx::PgPool;

use conductor_core::types::EntityId;

use crate::models::approval::ApprovalRow;

/// Column list for approvals queries.
const APPROVAL_COLUMNS: &str =
    "id, execution_id, message, resolution, source, timeout_secs, requested_at, resolved_at";

pub struct ApprovalRepo;

impl ApprovalRepo {
    /// Record a resolved approval request.
    pub async fn insert(pool: &PgPool, row: &ApprovalRow) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO approvals
                (id, execution_id, message, resolution, source, timeout_secs,
                 requested_at, resolved_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(row.id)
        .bind(row.execution_id)
        .bind(&row.message)
        .bind(&row.resolution)
        .bind(&row.source)
        .bind(row.timeout_secs)
        .bind(row.requested_at)
        .bind(row.resolved_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Audit trail for an execution, oldest first.
    pub async fn list_for_execution(
        pool: &PgPool,
        execution_id: EntityId,
    ) -> Result<Vec<ApprovalRow>, sqlx::Error> {
        let query = format!(
            "SELECT {APPROVAL_COLUMNS} FROM approvals
             WHERE execution_id = $1
             ORDER BY resolved_at ASC"
        );
        sqlx::query_as::<_, ApprovalRow>(&query)
            .bind(execution_id)
            .fetch_all(pool)
            .await
    }
}
