//! Rows for the `artifacts` table.

use sqlx::FromRow;

use conductor_core::execution::{Artifact, ArtifactMeta};
use conductor_core::graph::ArtifactType;
use conductor_core::types::{EntityId, Timestamp};

use super::DecodeError;

/// A full row from the `artifacts` table.
#[derive(Debug, Clone, FromRow)]
pub struct ArtifactRow {
    pub id: EntityId,
    pub execution_id: EntityId,
    pub phase_execution_id: EntityId,
    pub artifact_type: String,
    pub name: String,
    pub content: String,
    pub created_at: Timestamp,
}

impl ArtifactRow {
    pub fn from_domain(artifact: &Artifact) -> Self {
        Self {
            id: artifact.id,
            execution_id: artifact.execution_id,
            phase_execution_id: artifact.phase_execution_id,
            artifact_type: artifact.artifact_type.as_str().to_string(),
            name: artifact.name.clone(),
            content: artifact.content.clone(),
            created_at: artifact.created_at,
        }
    }

    pub fn into_domain(self) -> Result<Artifact, DecodeError> {
        let artifact_type =
            ArtifactType::parse(&self.artifact_type).ok_or(DecodeError::InvalidField {
                field: "artifact_type",
                value: self.artifact_type.clone(),
            })?;
        Ok(Artifact {
            id: self.id,
            execution_id: self.execution_id,
            phase_execution_id: self.phase_execution_id,
            artifact_type,
            name: self.name,
            content: self.content,
            created_at: self.created_at,
        })
    }
}

/// Listing row; content size computed in SQL, content itself not loaded.
#[derive(Debug, Clone, FromRow)]
pub struct ArtifactMetaRow {
    pub id: EntityId,
    pub execution_id: EntityId,
    pub phase_execution_id: EntityId,
    pub artifact_type: String,
    pub name: String,
    pub size_bytes: i64,
    pub created_at: Timestamp,
}

impl ArtifactMetaRow {
    pub fn into_domain(self) -> Result<ArtifactMeta, DecodeError> {
        let artifact_type =
            ArtifactType::parse(&self.artifact_type).ok_or(DecodeError::InvalidField {
                field: "artifact_type",
                value: self.artifact_type.clone(),
            })?;
        Ok(ArtifactMeta {
            id: self.id,
            execution_id: self.execution_id,
            phase_execution_id: self.phase_execution_id,
            artifact_type,
            name: self.name,
            size_bytes: self.size_bytes as u64,
            created_at: self.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::types::new_id;

    #[test]
    fn artifact_row_round_trips() {
        let artifact = Artifact::new(
            new_id(),
            new_id(),
            ArtifactType::ImplementationPlan,
            "plan_output",
            "the plan",
        );
        let row = ArtifactRow::from_domain(&artifact);
        assert_eq!(row.artifact_type, "implementation_plan");
        let back = row.into_domain().unwrap();
        assert_eq!(back.id, artifact.id);
        assert_eq!(back.artifact_type, ArtifactType::ImplementationPlan);
        assert_eq!(back.content, "the plan");
    }
}
