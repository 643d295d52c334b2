//! In-memory [`ExecutionStore`] backend.
//!
//! Backs tests and ephemeral single-process deployments; the Postgres
//! implementation lives in the db crate. Everything is cloned in and out so
//! callers never hold references into the maps.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use conductor_core::execution::{ApprovalRecord, Artifact, ArtifactMeta, Execution};
use conductor_core::graph::PhaseGraph;
use conductor_core::store::{ExecutionStore, StoreError};
use conductor_core::types::EntityId;

#[derive(Default)]
pub struct MemoryStore {
    executions: RwLock<HashMap<EntityId, Execution>>,
    artifacts: RwLock<HashMap<EntityId, Artifact>>,
    approvals: RwLock<Vec<ApprovalRecord>>,
    templates: RwLock<HashMap<String, PhaseGraph>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded approvals for an execution, oldest first. Test hook; the
    /// trait has no read side for the audit trail.
    pub async fn approvals_for(&self, execution_id: EntityId) -> Vec<ApprovalRecord> {
        self.approvals
            .read()
            .await
            .iter()
            .filter(|r| r.execution_id == execution_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ExecutionStore for MemoryStore {
    async fn save_execution(&self, execution: &Execution) -> Result<(), StoreError> {
        self.executions
            .write()
            .await
            .insert(execution.id, execution.clone());
        Ok(())
    }

    async fn load_execution(&self, id: EntityId) -> Result<Option<Execution>, StoreError> {
        Ok(self.executions.read().await.get(&id).cloned())
    }

    async fn load_executions(&self) -> Result<Vec<Execution>, StoreError> {
        let mut all: Vec<Execution> = self.executions.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn delete_execution(&self, id: EntityId) -> Result<bool, StoreError> {
        let existed = self.executions.write().await.remove(&id).is_some();
        if existed {
            self.artifacts
                .write()
                .await
                .retain(|_, a| a.execution_id != id);
            self.approvals
                .write()
                .await
                .retain(|r| r.execution_id != id);
        }
        Ok(existed)
    }

    async fn insert_artifact(&self, artifact: &Artifact) -> Result<(), StoreError> {
        let mut artifacts = self.artifacts.write().await;
        if artifacts.contains_key(&artifact.id) {
            return Err(StoreError::Backend(format!(
                "artifact id collision: {}",
                artifact.id
            )));
        }
        artifacts.insert(artifact.id, artifact.clone());
        Ok(())
    }

    async fn get_artifact(&self, id: EntityId) -> Result<Option<Artifact>, StoreError> {
        Ok(self.artifacts.read().await.get(&id).cloned())
    }

    async fn list_artifacts(&self, execution_id: EntityId) -> Result<Vec<ArtifactMeta>, StoreError> {
        let mut metas: Vec<ArtifactMeta> = self
            .artifacts
            .read()
            .await
            .values()
            .filter(|a| a.execution_id == execution_id)
            .map(Artifact::meta)
            .collect();
        metas.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(metas)
    }

    async fn record_approval(&self, record: &ApprovalRecord) -> Result<(), StoreError> {
        self.approvals.write().await.push(record.clone());
        Ok(())
    }

    async fn save_template(&self, graph: &PhaseGraph) -> Result<(), StoreError> {
        self.templates
            .write()
            .await
            .insert(graph.id.clone(), graph.clone());
        Ok(())
    }

    async fn get_template(&self, id: &str) -> Result<Option<PhaseGraph>, StoreError> {
        Ok(self.templates.read().await.get(id).cloned())
    }

    async fn list_templates(&self) -> Result<Vec<PhaseGraph>, StoreError> {
        let mut all: Vec<PhaseGraph> = self.templates.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    async fn delete_template(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.templates.write().await.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::graph::ArtifactType;
    use conductor_core::types::new_id;

    #[tokio::test]
    async fn executions_round_trip_newest_first() {
        let store = MemoryStore::new();
        let first = Execution::new("a", "", PhaseGraph::default_pipeline(), None, false);
        let second = Execution::new("b", "", PhaseGraph::default_pipeline(), None, false);
        store.save_execution(&first).await.unwrap();
        store.save_execution(&second).await.unwrap();

        let loaded = store.load_execution(first.id).await.unwrap().unwrap();
        assert_eq!(loaded.task_description, "a");

        let all = store.load_executions().await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].created_at >= all[1].created_at);
    }

    #[tokio::test]
    async fn delete_cascades_to_artifacts() {
        let store = MemoryStore::new();
        let exec = Execution::new("a", "", PhaseGraph::default_pipeline(), None, false);
        store.save_execution(&exec).await.unwrap();
        let artifact = Artifact::new(exec.id, new_id(), ArtifactType::Custom, "out", "body");
        store.insert_artifact(&artifact).await.unwrap();

        assert!(store.delete_execution(exec.id).await.unwrap());
        assert!(store.get_artifact(artifact.id).await.unwrap().is_none());
        assert!(!store.delete_execution(exec.id).await.unwrap());
    }

    #[tokio::test]
    async fn artifact_ids_are_append_only() {
        let store = MemoryStore::new();
        let artifact = Artifact::new(new_id(), new_id(), ArtifactType::Custom, "out", "body");
        store.insert_artifact(&artifact).await.unwrap();
        assert!(store.insert_artifact(&artifact).await.is_err());
    }

    #[tokio::test]
    async fn templates_round_trip() {
        let store = MemoryStore::new();
        let graph = PhaseGraph::default_pipeline();
        store.save_template(&graph).await.unwrap();
        assert!(store.get_template("default").await.unwrap().is_some());
        assert_eq!(store.list_templates().await.unwrap().len(), 1);
        assert!(store.delete_template("default").await.unwrap());
        assert!(store.get_template("default").await.unwrap().is_none());
    }
}
