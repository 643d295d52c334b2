//! Repository for the `templates` table.

use sqlx::PgPool;

use crate::models::template::TemplateRow;

/// Column list for templates queries.
const TEMPLATE_COLUMNS: &str = "id, name, graph, created_at, updated_at";

pub struct TemplateRepo;

impl TemplateRepo {
    /// Insert or replace a template by its ID.
    pub async fn upsert(
        pool: &PgPool,
        id: &str,
        name: &str,
        graph: &serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO templates (id, name, graph)
             VALUES ($1, $2, $3)
             ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                graph = EXCLUDED.graph,
                updated_at = NOW()",
        )
        .bind(id)
        .bind(name)
        .bind(graph)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Find a template by its ID.
    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<TemplateRow>, sqlx::Error> {
        let query = format!("SELECT {TEMPLATE_COLUMNS} FROM templates WHERE id = $1");
        sqlx::query_as::<_, TemplateRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all templates, ordered by ID.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<TemplateRow>, sqlx::Error> {
        let query = format!("SELECT {TEMPLATE_COLUMNS} FROM templates ORDER BY id ASC");
        sqlx::query_as::<_, TemplateRow>(&query)
            .fetch_all(pool)
            .await
    }

    /// Delete a template. Returns whether a row was deleted.
    pub async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM templates WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
