//! Rows for the `templates` table. The graph is stored whole as JSONB; the
//! id and name columns are denormalized for listings.

use sqlx::FromRow;

use conductor_core::graph::PhaseGraph;
use conductor_core::types::Timestamp;

use super::DecodeError;

#[derive(Debug, Clone, FromRow)]
pub struct TemplateRow {
    pub id: String,
    pub name: String,
    pub graph: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TemplateRow {
    pub fn into_domain(self) -> Result<PhaseGraph, DecodeError> {
        serde_json::from_value(self.graph)
            .map_err(|source| DecodeError::Json { field: "graph", source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_row_decodes_the_graph() {
        let graph = PhaseGraph::default_pipeline();
        let row = TemplateRow {
            id: graph.id.clone(),
            name: graph.name.clone(),
            graph: serde_json::to_value(&graph).unwrap(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let back = row.into_domain().unwrap();
        assert_eq!(back.id, "default");
        assert_eq!(back.phases.len(), graph.phases.len());
    }

    #[test]
    fn corrupt_graph_json_is_an_error() {
        let row = TemplateRow {
            id: "broken".into(),
            name: "broken".into(),
            graph: serde_json::json!({"not": "a graph"}),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        assert!(row.into_domain().is_err());
    }
}
