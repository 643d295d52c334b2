//! Execution lifecycle owner.
//!
//! The orchestrator holds the registry of live executions (the shared
//! `Execution` each machine mutates), spawns one [`ExecutionMachine`] per
//! run, and is the single entry point for control operations: create, run,
//! cancel, resume, approve, delete. Reads are served from the live registry
//! when an execution is in flight and from the store otherwise; the two
//! never diverge because machines persist after every mutation.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use conductor_core::error::CoreError;
use conductor_core::execution::{Artifact, ArtifactMeta, Execution};
use conductor_core::graph::PhaseGraph;
use conductor_core::status::ExecutionStatus;
use conductor_core::store::{ExecutionStore, StoreError};
use conductor_core::types::EntityId;
use conductor_events::{ChannelRegistry, ExecutionEvent};

use crate::approval::{ApprovalError, ApprovalGate, PendingApproval};
use crate::machine::{ExecutionMachine, MachineContext};
use crate::registry::ProviderRegistry;

/// Error surface of the control operations.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Approval(#[from] ApprovalError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Applied to every approval request opened by interactive executions.
    pub approval_timeout_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            approval_timeout_secs: 300,
        }
    }
}

/// Request payload for creating an execution.
#[derive(Debug, Clone)]
pub struct CreateExecution {
    pub task_description: String,
    pub project_path: String,
    /// Template to freeze into the execution; the default pipeline when
    /// absent.
    pub template_id: Option<String>,
    pub budget_limit_usd: Option<f64>,
    pub interactive: bool,
}

struct Handle {
    execution: Arc<Mutex<Execution>>,
    /// Replaced with a fresh token on every run/resume.
    cancel: Mutex<CancellationToken>,
}

pub struct Orchestrator {
    ctx: Arc<MachineContext>,
    registry: RwLock<HashMap<EntityId, Arc<Handle>>>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn ExecutionStore>,
        providers: Arc<ProviderRegistry>,
        channels: Arc<ChannelRegistry>,
        config: OrchestratorConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            ctx: Arc::new(MachineContext {
                store,
                providers,
                channels,
                gate: ApprovalGate::new(),
                approval_timeout_secs: config.approval_timeout_secs,
            }),
            registry: RwLock::new(HashMap::new()),
        })
    }

    /// Reconcile persisted executions after a process restart.
    ///
    /// In-flight work cannot be resumed mid-provider-call, so recovery is
    /// fail-safe: `running` becomes `failed` and `awaiting_approval` (whose
    /// gate slot died with the process) becomes `paused`, resumable by hand.
    /// Returns how many executions were reconciled.
    pub async fn recover(&self) -> Result<usize, ControlError> {
        let executions = self.ctx.store.load_executions().await?;
        let mut reconciled = 0;

        for mut exec in executions {
            match exec.status {
                ExecutionStatus::Running => {
                    exec.cancel_open_phases();
                    exec.error_message = Some("Interrupted by engine restart".into());
                    if let Err(e) = exec.set_status(ExecutionStatus::Failed) {
                        tracing::error!(execution_id = %exec.id, error = %e, "Recovery transition failed");
                        continue;
                    }
                }
                ExecutionStatus::AwaitingApproval => {
                    // Outside the runtime transition table; restart
                    // reconciliation is the one writer allowed to do this.
                    exec.status = ExecutionStatus::Paused;
                }
                _ => continue,
            }
            tracing::warn!(
                execution_id = %exec.id,
                status = %exec.status,
                "Reconciled execution after restart"
            );
            self.ctx.store.save_execution(&exec).await?;
            reconciled += 1;
        }

        Ok(reconciled)
    }

    /// Create a pending execution from a template (or the default pipeline).
    pub async fn create_execution(&self, req: CreateExecution) -> Result<Execution, ControlError> {
        if req.task_description.trim().is_empty() {
            return Err(CoreError::Validation("task_description must not be empty".into()).into());
        }
        if matches!(req.budget_limit_usd, Some(limit) if limit <= 0.0) {
            return Err(CoreError::Validation("budget_limit_usd must be positive".into()).into());
        }

        let graph = match &req.template_id {
            Some(template_id) => self
                .ctx
                .store
                .get_template(template_id)
                .await?
                .ok_or_else(|| CoreError::NotFound {
                    entity: "template",
                    id: template_id.clone(),
                })?,
            None => PhaseGraph::default_pipeline(),
        };
        graph.validate()?;

        let execution = Execution::new(
            req.task_description,
            req.project_path,
            graph,
            req.budget_limit_usd,
            req.interactive,
        );
        self.ctx.store.save_execution(&execution).await?;

        self.registry.write().await.insert(
            execution.id,
            Arc::new(Handle {
                execution: Arc::new(Mutex::new(execution.clone())),
                cancel: Mutex::new(CancellationToken::new()),
            }),
        );
        tracing::info!(
            execution_id = %execution.id,
            template = %execution.graph.id,
            interactive = execution.interactive,
            "Created execution"
        );
        Ok(execution)
    }

    /// Launch a pending execution's state machine.
    pub async fn run(self: &Arc<Self>, id: EntityId) -> Result<(), ControlError> {
        self.launch(id, ExecutionStatus::Pending, "run").await
    }

    /// Relaunch a paused execution; already-terminal phases are skipped.
    pub async fn resume(self: &Arc<Self>, id: EntityId) -> Result<(), ControlError> {
        self.launch(id, ExecutionStatus::Paused, "resume").await
    }

    async fn launch(
        self: &Arc<Self>,
        id: EntityId,
        expected: ExecutionStatus,
        operation: &'static str,
    ) -> Result<(), ControlError> {
        let handle = self.handle(id).await?;
        {
            let mut exec = handle.execution.lock().await;
            if exec.status != expected {
                return Err(CoreError::InvalidState {
                    operation,
                    status: exec.status,
                }
                .into());
            }
            exec.set_status(ExecutionStatus::Running)
                .map_err(CoreError::Internal)?;
            self.ctx.store.save_execution(&exec).await?;
            self.ctx
                .channels
                .publish(
                    id,
                    ExecutionEvent::StatusUpdate {
                        status: exec.status,
                        error: None,
                    },
                )
                .await;
        }

        let token = CancellationToken::new();
        *handle.cancel.lock().await = token.clone();
        let machine = ExecutionMachine::new(handle.execution.clone(), self.ctx.clone(), token);
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            machine.drive().await;
            orchestrator.retire_if_terminal(id).await;
        });
        Ok(())
    }

    /// Cancel from any non-terminal status.
    ///
    /// The execution record is finalized here; the machine (if one is
    /// running) observes the token and stops without touching state again.
    pub async fn cancel(&self, id: EntityId) -> Result<(), ControlError> {
        let handle = self.handle(id).await?;
        {
            let mut exec = handle.execution.lock().await;
            if exec.is_terminal() {
                return Err(CoreError::InvalidState {
                    operation: "cancel",
                    status: exec.status,
                }
                .into());
            }
            exec.cancel_open_phases();
            exec.set_status(ExecutionStatus::Cancelled)
                .map_err(CoreError::Internal)?;
            self.ctx.store.save_execution(&exec).await?;
            self.ctx
                .channels
                .publish(
                    id,
                    ExecutionEvent::StatusUpdate {
                        status: exec.status,
                        error: exec.error_message.clone(),
                    },
                )
                .await;
        }

        handle.cancel.lock().await.cancel();
        self.ctx.gate.cancel(id).await;
        self.registry.write().await.remove(&id);
        self.ctx.channels.retire_if_idle(id).await;
        tracing::info!(execution_id = %id, "Cancelled execution");
        Ok(())
    }

    /// Resolve the open approval request for an execution.
    pub async fn approve(
        &self,
        id: EntityId,
        approved: bool,
        source: &str,
    ) -> Result<(), ControlError> {
        // Existence check first so an unknown id is a 404, not a 409.
        self.get_execution(id).await?;
        self.ctx.gate.resolve(id, approved, source).await?;
        Ok(())
    }

    /// The open approval request, if any, with remaining wall time.
    pub async fn pending_approval(&self, id: EntityId) -> Option<PendingApproval> {
        self.ctx.gate.pending(id).await
    }

    /// Current snapshot; live registry first, store fallback.
    pub async fn get_execution(&self, id: EntityId) -> Result<Execution, ControlError> {
        if let Some(handle) = self.registry.read().await.get(&id).cloned() {
            return Ok(handle.execution.lock().await.clone());
        }
        self.ctx
            .store
            .load_execution(id)
            .await?
            .ok_or_else(|| not_found(id).into())
    }

    /// All executions, newest first.
    pub async fn list_executions(&self) -> Result<Vec<Execution>, ControlError> {
        Ok(self.ctx.store.load_executions().await?)
    }

    /// Delete a terminal execution and everything attached to it.
    pub async fn delete_execution(&self, id: EntityId) -> Result<(), ControlError> {
        let execution = self.get_execution(id).await?;
        if !execution.is_terminal() {
            return Err(CoreError::InvalidState {
                operation: "delete",
                status: execution.status,
            }
            .into());
        }

        self.registry.write().await.remove(&id);
        if !self.ctx.store.delete_execution(id).await? {
            return Err(not_found(id).into());
        }
        self.ctx.channels.retire_if_idle(id).await;
        tracing::info!(execution_id = %id, "Deleted execution");
        Ok(())
    }

    pub async fn list_artifacts(&self, id: EntityId) -> Result<Vec<ArtifactMeta>, ControlError> {
        self.get_execution(id).await?;
        Ok(self.ctx.store.list_artifacts(id).await?)
    }

    pub async fn get_artifact(&self, id: EntityId) -> Result<Artifact, ControlError> {
        self.ctx
            .store
            .get_artifact(id)
            .await?
            .ok_or_else(|| {
                ControlError::Core(CoreError::NotFound {
                    entity: "artifact",
                    id: id.to_string(),
                })
            })
    }

    pub async fn save_template(&self, graph: &PhaseGraph) -> Result<(), ControlError> {
        graph.validate()?;
        Ok(self.ctx.store.save_template(graph).await?)
    }

    pub async fn get_template(&self, id: &str) -> Result<PhaseGraph, ControlError> {
        self.ctx.store.get_template(id).await?.ok_or_else(|| {
            ControlError::Core(CoreError::NotFound {
                entity: "template",
                id: id.to_string(),
            })
        })
    }

    pub async fn list_templates(&self) -> Result<Vec<PhaseGraph>, ControlError> {
        Ok(self.ctx.store.list_templates().await?)
    }

    pub async fn delete_template(&self, id: &str) -> Result<(), ControlError> {
        if !self.ctx.store.delete_template(id).await? {
            return Err(CoreError::NotFound {
                entity: "template",
                id: id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Stop every running machine. Executions stay as they are on disk;
    /// `recover` reconciles them on the next start.
    pub async fn shutdown(&self) {
        let registry = self.registry.read().await;
        for handle in registry.values() {
            handle.cancel.lock().await.cancel();
        }
        tracing::info!(live = registry.len(), "Orchestrator shut down");
    }

    async fn handle(&self, id: EntityId) -> Result<Arc<Handle>, ControlError> {
        if let Some(handle) = self.registry.read().await.get(&id).cloned() {
            return Ok(handle);
        }

        // Not live; rehydrate from the store (e.g. resume after restart).
        let execution = self
            .ctx
            .store
            .load_execution(id)
            .await?
            .ok_or_else(not_found_err(id))?;
        let handle = Arc::new(Handle {
            execution: Arc::new(Mutex::new(execution)),
            cancel: Mutex::new(CancellationToken::new()),
        });
        let mut registry = self.registry.write().await;
        Ok(registry.entry(id).or_insert(handle).clone())
    }

    async fn retire_if_terminal(&self, id: EntityId) {
        let terminal = match self.registry.read().await.get(&id) {
            Some(handle) => handle.execution.lock().await.is_terminal(),
            None => return,
        };
        if terminal {
            self.registry.write().await.remove(&id);
        }
    }
}

fn not_found(id: EntityId) -> CoreError {
    CoreError::NotFound {
        entity: "execution",
        id: id.to_string(),
    }
}

fn not_found_err(id: EntityId) -> impl FnOnce() -> ControlError {
    move || ControlError::Core(not_found(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    use crate::memory::MemoryStore;

    fn orchestrator_with(store: Arc<MemoryStore>) -> Arc<Orchestrator> {
        Orchestrator::new(
            store,
            Arc::new(ProviderRegistry::with_defaults()),
            Arc::new(ChannelRegistry::new()),
            OrchestratorConfig::default(),
        )
    }

    fn create_request() -> CreateExecution {
        CreateExecution {
            task_description: "add a feature".into(),
            project_path: "/tmp/project".into(),
            template_id: None,
            budget_limit_usd: None,
            interactive: false,
        }
    }

    #[tokio::test]
    async fn create_uses_default_pipeline_and_persists() {
        let store = Arc::new(MemoryStore::new());
        let orchestrator = orchestrator_with(store.clone());

        let execution = orchestrator.create_execution(create_request()).await.unwrap();
        assert_eq!(execution.status, ExecutionStatus::Pending);
        assert_eq!(execution.graph.id, "default");
        assert!(store.load_execution(execution.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn create_rejects_blank_task_and_unknown_template() {
        let orchestrator = orchestrator_with(Arc::new(MemoryStore::new()));

        let mut req = create_request();
        req.task_description = "  ".into();
        assert_matches!(
            orchestrator.create_execution(req).await,
            Err(ControlError::Core(CoreError::Validation(_)))
        );

        let mut req = create_request();
        req.template_id = Some("nope".into());
        assert_matches!(
            orchestrator.create_execution(req).await,
            Err(ControlError::Core(CoreError::NotFound { entity: "template", .. }))
        );
    }

    #[tokio::test]
    async fn run_requires_pending() {
        let orchestrator = orchestrator_with(Arc::new(MemoryStore::new()));
        let execution = orchestrator.create_execution(create_request()).await.unwrap();

        orchestrator.cancel(execution.id).await.unwrap();
        assert_matches!(
            orchestrator.run(execution.id).await,
            Err(ControlError::Core(CoreError::InvalidState { operation: "run", .. }))
        );
    }

    #[tokio::test]
    async fn cancel_of_terminal_execution_is_a_conflict() {
        let orchestrator = orchestrator_with(Arc::new(MemoryStore::new()));
        let execution = orchestrator.create_execution(create_request()).await.unwrap();

        orchestrator.cancel(execution.id).await.unwrap();
        let cancelled = orchestrator.get_execution(execution.id).await.unwrap();
        assert_eq!(cancelled.status, ExecutionStatus::Cancelled);
        assert!(cancelled
            .phases
            .iter()
            .all(|p| p.status == conductor_core::status::PhaseStatus::Cancelled));

        assert_matches!(
            orchestrator.cancel(execution.id).await,
            Err(ControlError::Core(CoreError::InvalidState { operation: "cancel", .. }))
        );
    }

    #[tokio::test]
    async fn delete_requires_terminal_then_removes() {
        let orchestrator = orchestrator_with(Arc::new(MemoryStore::new()));
        let execution = orchestrator.create_execution(create_request()).await.unwrap();

        assert_matches!(
            orchestrator.delete_execution(execution.id).await,
            Err(ControlError::Core(CoreError::InvalidState { operation: "delete", .. }))
        );

        orchestrator.cancel(execution.id).await.unwrap();
        orchestrator.delete_execution(execution.id).await.unwrap();
        assert_matches!(
            orchestrator.get_execution(execution.id).await,
            Err(ControlError::Core(CoreError::NotFound { .. }))
        );
    }

    #[tokio::test]
    async fn recover_fails_running_and_pauses_awaiting_approval() {
        let store = Arc::new(MemoryStore::new());

        let mut running = Execution::new("a", "", PhaseGraph::default_pipeline(), None, false);
        running.set_status(ExecutionStatus::Running).unwrap();
        store.save_execution(&running).await.unwrap();

        let mut waiting = Execution::new("b", "", PhaseGraph::default_pipeline(), None, true);
        waiting.set_status(ExecutionStatus::Running).unwrap();
        waiting
            .set_status(ExecutionStatus::AwaitingApproval)
            .unwrap();
        store.save_execution(&waiting).await.unwrap();

        let untouched = Execution::new("c", "", PhaseGraph::default_pipeline(), None, false);
        store.save_execution(&untouched).await.unwrap();

        let orchestrator = orchestrator_with(store.clone());
        assert_eq!(orchestrator.recover().await.unwrap(), 2);

        let running = store.load_execution(running.id).await.unwrap().unwrap();
        assert_eq!(running.status, ExecutionStatus::Failed);
        assert!(running.error_message.unwrap().contains("restart"));

        let waiting = store.load_execution(waiting.id).await.unwrap().unwrap();
        assert_eq!(waiting.status, ExecutionStatus::Paused);

        let untouched = store.load_execution(untouched.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, ExecutionStatus::Pending);
    }

    #[tokio::test]
    async fn approve_without_pending_request_is_a_conflict() {
        let orchestrator = orchestrator_with(Arc::new(MemoryStore::new()));
        let execution = orchestrator.create_execution(create_request()).await.unwrap();

        assert_matches!(
            orchestrator.approve(execution.id, true, "api").await,
            Err(ControlError::Approval(ApprovalError::NoPendingRequest))
        );
        assert_matches!(
            orchestrator.approve(conductor_core::types::new_id(), true, "api").await,
            Err(ControlError::Core(CoreError::NotFound { .. }))
        );
    }

    #[tokio::test]
    async fn templates_round_trip_through_control_surface() {
        let orchestrator = orchestrator_with(Arc::new(MemoryStore::new()));
        let graph = PhaseGraph::default_pipeline();

        orchestrator.save_template(&graph).await.unwrap();
        assert_eq!(orchestrator.get_template("default").await.unwrap().id, "default");
        assert_eq!(orchestrator.list_templates().await.unwrap().len(), 1);
        orchestrator.delete_template("default").await.unwrap();
        assert_matches!(
            orchestrator.delete_template("default").await,
            Err(ControlError::Core(CoreError::NotFound { .. }))
        );
    }
}
