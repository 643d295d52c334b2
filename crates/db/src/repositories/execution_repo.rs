//! Repositories for the `executions` and `phase_executions` tables.

use sqlx::PgPool;

use conductor_core::types::EntityId;

use crate::models::execution::{ExecutionRow, PhaseExecutionRow};

/// Column list for executions queries.
const EXECUTION_COLUMNS: &str = "id, task_description, project_path, status, interactive, \
    graph, todos, budget_limit_usd, total_cost_usd, total_tokens_input, total_tokens_output, \
    error_message, created_at, started_at, completed_at";

/// Column list for phase_executions queries.
const PHASE_COLUMNS: &str = "id, execution_id, phase_id, name, role, status, provider, model, \
    tokens_input, tokens_output, cost_usd, iteration, output_artifact_id, position, \
    started_at, completed_at, error_message";

/// Provides persistence operations for execution rows.
pub struct ExecutionRepo;

impl ExecutionRepo {
    /// Insert or update an execution row. Creation-time fields are never
    /// overwritten; runtime fields always are.
    pub async fn upsert(pool: &PgPool, row: &ExecutionRow) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO executions
                (id, task_description, project_path, status, interactive, graph, todos,
                 budget_limit_usd, total_cost_usd, total_tokens_input, total_tokens_output,
                 error_message, created_at, started_at, completed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
             ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                todos = EXCLUDED.todos,
                total_cost_usd = EXCLUDED.total_cost_usd,
                total_tokens_input = EXCLUDED.total_tokens_input,
                total_tokens_output = EXCLUDED.total_tokens_output,
                error_message = EXCLUDED.error_message,
                started_at = EXCLUDED.started_at,
                completed_at = EXCLUDED.completed_at",
        )
        .bind(row.id)
        .bind(&row.task_description)
        .bind(&row.project_path)
        .bind(&row.status)
        .bind(row.interactive)
        .bind(&row.graph)
        .bind(&row.todos)
        .bind(row.budget_limit_usd)
        .bind(row.total_cost_usd)
        .bind(row.total_tokens_input)
        .bind(row.total_tokens_output)
        .bind(&row.error_message)
        .bind(row.created_at)
        .bind(row.started_at)
        .bind(row.completed_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Find an execution row by its ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: EntityId,
    ) -> Result<Option<ExecutionRow>, sqlx::Error> {
        let query = format!("SELECT {EXECUTION_COLUMNS} FROM executions WHERE id = $1");
        sqlx::query_as::<_, ExecutionRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all execution rows, newest first.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<ExecutionRow>, sqlx::Error> {
        let query = format!("SELECT {EXECUTION_COLUMNS} FROM executions ORDER BY created_at DESC");
        sqlx::query_as::<_, ExecutionRow>(&query)
            .fetch_all(pool)
            .await
    }

    /// Delete an execution; artifacts, phases and approvals cascade.
    /// Returns whether a row was deleted.
    pub async fn delete(pool: &PgPool, id: EntityId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM executions WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Provides persistence operations for phase execution rows.
pub struct PhaseExecutionRepo;

impl PhaseExecutionRepo {
    /// Insert or update one phase execution row.
    pub async fn upsert(pool: &PgPool, row: &PhaseExecutionRow) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO phase_executions
                (id, execution_id, phase_id, name, role, status, provider, model,
                 tokens_input, tokens_output, cost_usd, iteration, output_artifact_id,
                 position, started_at, completed_at, error_message)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
             ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                tokens_input = EXCLUDED.tokens_input,
                tokens_output = EXCLUDED.tokens_output,
                cost_usd = EXCLUDED.cost_usd,
                iteration = EXCLUDED.iteration,
                output_artifact_id = EXCLUDED.output_artifact_id,
                started_at = EXCLUDED.started_at,
                completed_at = EXCLUDED.completed_at,
                error_message = EXCLUDED.error_message",
        )
        .bind(row.id)
        .bind(row.execution_id)
        .bind(&row.phase_id)
        .bind(&row.name)
        .bind(&row.role)
        .bind(&row.status)
        .bind(&row.provider)
        .bind(&row.model)
        .bind(row.tokens_input)
        .bind(row.tokens_output)
        .bind(row.cost_usd)
        .bind(row.iteration)
        .bind(row.output_artifact_id)
        .bind(row.position)
        .bind(row.started_at)
        .bind(row.completed_at)
        .bind(&row.error_message)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// All phase rows for an execution, in launch order.
    pub async fn list_for_execution(
        pool: &PgPool,
        execution_id: EntityId,
    ) -> Result<Vec<PhaseExecutionRow>, sqlx::Error> {
        let query = format!(
            "SELECT {PHASE_COLUMNS} FROM phase_executions
             WHERE execution_id = $1
             ORDER BY position ASC"
        );
        sqlx::query_as::<_, PhaseExecutionRow>(&query)
            .bind(execution_id)
            .fetch_all(pool)
            .await
    }
}
