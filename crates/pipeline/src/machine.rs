//! The execution state machine.
//!
//! One [`ExecutionMachine`] drives one execution from `running` to a
//! terminal status: it walks the graph's resolved stages in order, runs the
//! budget check and (when interactive) the approval gate before each stage,
//! fans stage members out concurrently, and persists + publishes after every
//! mutation. The shared `Execution` behind the mutex is the source of truth;
//! the store only ever sees snapshots of it.
//!
//! Cancellation is cooperative: the orchestrator finalizes the execution
//! record itself and the machine observes the token (or the already-terminal
//! status) and stops without touching state again.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use conductor_core::error::CoreError;
use conductor_core::execution::{ApprovalRecord, Artifact, Execution};
use conductor_core::graph::{PhaseDef, Stage};
use conductor_core::provider::{render_prompt, Completion, CompletionRequest};
use conductor_core::status::{ExecutionStatus, PhaseStatus};
use conductor_core::store::ExecutionStore;
use conductor_core::todo::TodoProgress;
use conductor_core::types::{new_id, EntityId};
use conductor_events::{ChannelRegistry, ExecutionEvent};

use crate::approval::{ApprovalGate, ResolvedApproval};
use crate::registry::ProviderRegistry;

/// Shared dependencies handed to every machine by the orchestrator.
pub struct MachineContext {
    pub store: Arc<dyn ExecutionStore>,
    pub providers: Arc<ProviderRegistry>,
    pub channels: Arc<ChannelRegistry>,
    pub gate: Arc<ApprovalGate>,
    /// Wall-clock timeout applied to every approval request.
    pub approval_timeout_secs: u64,
}

enum PhaseError {
    Failed(String),
    Interrupted,
}

pub struct ExecutionMachine {
    execution: Arc<Mutex<Execution>>,
    ctx: Arc<MachineContext>,
    cancel: CancellationToken,
}

impl ExecutionMachine {
    pub fn new(
        execution: Arc<Mutex<Execution>>,
        ctx: Arc<MachineContext>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            execution,
            ctx,
            cancel,
        }
    }

    /// Drive a `running` execution to a terminal status.
    ///
    /// Also the resume path: stages whose phases are already terminal are
    /// skipped, so a paused execution picks up where it stopped.
    pub async fn drive(self) {
        let (execution_id, stages) = {
            let exec = self.execution.lock().await;
            (exec.id, exec.graph.stages())
        };
        tracing::info!(execution_id = %execution_id, stages = stages.len(), "Driving execution");

        for stage in &stages {
            if self.cancel.is_cancelled() {
                return;
            }

            let plan = self.plan_stage(stage).await;
            let Some(plan) = plan else {
                continue;
            };

            if let Some(exceeded) = plan.budget_violation {
                self.fail(execution_id, exceeded.to_string()).await;
                return;
            }

            if plan.interactive && !self.await_approval(execution_id, &plan).await {
                return;
            }

            let results = join_all(
                plan.members
                    .iter()
                    .map(|def| self.run_phase(execution_id, def)),
            )
            .await;

            for result in results {
                match result {
                    Ok(()) => {}
                    Err(PhaseError::Interrupted) => return,
                    Err(PhaseError::Failed(message)) => {
                        self.fail(execution_id, message).await;
                        return;
                    }
                }
            }
        }

        self.complete(execution_id).await;
    }

    /// Snapshot what a stage still has to run and whether the budget allows it.
    async fn plan_stage(&self, stage: &Stage) -> Option<StagePlan> {
        let exec = self.execution.lock().await;
        if exec.is_terminal() {
            return None;
        }

        let members: Vec<PhaseDef> = stage
            .phase_ids
            .iter()
            .filter(|id| {
                exec.phase_by_def_id(id)
                    .map(|p| !p.is_terminal())
                    .unwrap_or(false)
            })
            .filter_map(|id| exec.graph.phase(id).cloned())
            .collect();
        if members.is_empty() {
            return None;
        }

        let estimate: f64 = members
            .iter()
            .map(|d| d.estimated_cost_usd.unwrap_or(0.0))
            .sum();
        let ledger = exec.ledger();
        let budget_violation = if ledger.would_exceed(estimate) {
            Some(CoreError::BudgetExceeded {
                total: ledger.total(),
                estimated: estimate,
                // would_exceed is only true when a limit is configured
                limit: ledger.limit().unwrap_or(0.0),
            })
        } else {
            None
        };

        Some(StagePlan {
            members,
            interactive: exec.interactive,
            budget_violation,
        })
    }

    /// Park the execution on the approval gate and wait for a resolution.
    ///
    /// Returns whether the stage may launch. Rejection and expiry both
    /// cancel the execution; an orchestrator-driven cancel mid-wait has
    /// already finalized it, in which case this only observes that.
    async fn await_approval(&self, execution_id: EntityId, plan: &StagePlan) -> bool {
        let names: Vec<&str> = plan.members.iter().map(|d| d.name.as_str()).collect();
        let message = format!("Approve stage: {}?", names.join(", "));
        let timeout_secs = self.ctx.approval_timeout_secs;

        // The slot is opened before the status flips so that anyone who
        // observes `awaiting_approval` can already resolve it.
        let receiver = match self
            .ctx
            .gate
            .request(execution_id, message.clone(), timeout_secs)
            .await
        {
            Ok(receiver) => receiver,
            Err(e) => {
                self.fail(execution_id, format!("Approval gate error: {e}")).await;
                return false;
            }
        };

        {
            let mut exec = self.execution.lock().await;
            if let Err(reason) = exec.set_status(ExecutionStatus::AwaitingApproval) {
                tracing::warn!(execution_id = %execution_id, reason, "Skipping approval pause");
                self.ctx.gate.cancel(execution_id).await;
                return !exec.is_terminal();
            }
            self.persist(&exec).await;
        }
        self.publish_status(execution_id).await;
        self.ctx
            .channels
            .publish(
                execution_id,
                ExecutionEvent::ApprovalNeeded {
                    message,
                    timeout_secs,
                },
            )
            .await;
        tracing::info!(execution_id = %execution_id, timeout_secs, "Awaiting approval");

        let resolved = match receiver.await {
            Ok(resolved) => resolved,
            // Gate dropped the slot without resolving; treat as expiry.
            Err(_) => {
                return self
                    .settle_unapproved(execution_id, None)
                    .await
            }
        };
        self.record_approval(execution_id, &resolved).await;
        self.ctx
            .channels
            .publish(
                execution_id,
                ExecutionEvent::ApprovalResolved {
                    resolution: resolved.resolution,
                },
            )
            .await;

        if resolved.resolution.is_approved() {
            {
                let mut exec = self.execution.lock().await;
                if exec.set_status(ExecutionStatus::Running).is_err() {
                    return false;
                }
                self.persist(&exec).await;
            }
            self.publish_status(execution_id).await;
            true
        } else {
            self.settle_unapproved(execution_id, Some(resolved.resolution.as_str()))
                .await
        }
    }

    /// Cancel after a rejected or expired approval. Always returns `false`.
    async fn settle_unapproved(&self, execution_id: EntityId, reason: Option<&str>) -> bool {
        let finalized = {
            let mut exec = self.execution.lock().await;
            if exec.is_terminal() {
                // An orchestrator cancel got here first.
                false
            } else {
                exec.cancel_open_phases();
                if let Err(e) = exec.set_status(ExecutionStatus::Cancelled) {
                    tracing::error!(execution_id = %execution_id, error = %e, "Cancel transition failed");
                }
                self.persist(&exec).await;
                true
            }
        };
        if finalized {
            tracing::info!(
                execution_id = %execution_id,
                resolution = reason.unwrap_or("expired"),
                "Stage not approved; execution cancelled"
            );
            self.publish_status(execution_id).await;
            self.ctx.channels.retire_if_idle(execution_id).await;
        }
        false
    }

    async fn record_approval(&self, execution_id: EntityId, resolved: &ResolvedApproval) {
        let record = ApprovalRecord {
            id: new_id(),
            execution_id,
            message: resolved.message.clone(),
            resolution: resolved.resolution,
            source: resolved.source.clone(),
            timeout_secs: resolved.timeout_secs,
            requested_at: resolved.requested_at,
            resolved_at: chrono::Utc::now(),
        };
        if let Err(e) = self.ctx.store.record_approval(&record).await {
            tracing::error!(execution_id = %execution_id, error = %e, "Failed to record approval");
        }
    }

    /// Run one phase to a terminal status, retrying under the iteration
    /// budget when the phase allows it.
    async fn run_phase(&self, execution_id: EntityId, def: &PhaseDef) -> Result<(), PhaseError> {
        let attempts = {
            let exec = self.execution.lock().await;
            if def.can_iterate {
                exec.graph.max_iterations
            } else {
                1
            }
        };

        let Some(provider) = self.ctx.providers.get(def.provider.kind) else {
            let message = format!("No provider registered for kind '{}'", def.provider.kind);
            return Err(self.fail_phase(execution_id, &def.id, message).await);
        };

        for attempt in 1..=attempts {
            let (prompt_inputs, phase_snapshot) = {
                let mut exec = self.execution.lock().await;
                let Some(phase) = exec.phase_by_def_id_mut(&def.id) else {
                    return Err(PhaseError::Failed(format!(
                        "Phase '{}' missing from execution",
                        def.id
                    )));
                };
                phase.iteration = attempt;
                phase.set_status(PhaseStatus::Running);
                let snapshot = phase.clone();
                let inputs = (exec.task_description.clone(), exec.project_path.clone());
                self.persist(&exec).await;
                (inputs, snapshot)
            };
            self.ctx
                .channels
                .publish(execution_id, ExecutionEvent::PhaseUpdate { phase: phase_snapshot })
                .await;

            let artifacts = match self.load_artifact_inputs(execution_id).await {
                Ok(artifacts) => artifacts,
                Err(message) => return Err(self.fail_phase(execution_id, &def.id, message).await),
            };
            let request = CompletionRequest {
                prompt: render_prompt(
                    &def.prompt_template,
                    &prompt_inputs.0,
                    &prompt_inputs.1,
                    &artifacts,
                ),
                model: def.provider.model.clone(),
                temperature: def.provider.temperature,
            };

            tracing::debug!(
                execution_id = %execution_id,
                phase = %def.id,
                attempt,
                provider = %def.provider.kind,
                "Submitting phase to provider"
            );
            let result = tokio::select! {
                _ = self.cancel.cancelled() => return Err(PhaseError::Interrupted),
                result = provider.submit(request) => result,
            };

            match result {
                Ok(completion) => {
                    return self.finish_phase_attempt(execution_id, def, completion).await;
                }
                Err(error) if attempt < attempts => {
                    tracing::warn!(
                        execution_id = %execution_id,
                        phase = %def.id,
                        attempt,
                        error = %error,
                        "Phase attempt failed; retrying"
                    );
                    let snapshot = {
                        let mut exec = self.execution.lock().await;
                        let phase = exec.phase_by_def_id_mut(&def.id);
                        let snapshot = phase.map(|p| {
                            p.error_message = Some(error.message.clone());
                            p.clone()
                        });
                        self.persist(&exec).await;
                        snapshot
                    };
                    if let Some(phase) = snapshot {
                        self.ctx
                            .channels
                            .publish(execution_id, ExecutionEvent::PhaseUpdate { phase })
                            .await;
                    }
                }
                Err(error) => {
                    return Err(self.fail_phase(execution_id, &def.id, error.message).await);
                }
            }
        }

        Err(PhaseError::Failed(format!(
            "Phase '{}' exhausted its iteration budget",
            def.id
        )))
    }

    /// Store the artifact and fold a successful completion into the phase.
    async fn finish_phase_attempt(
        &self,
        execution_id: EntityId,
        def: &PhaseDef,
        completion: Completion,
    ) -> Result<(), PhaseError> {
        let (phase_snapshot, budget, todo_event) = {
            let mut exec = self.execution.lock().await;
            let Some(phase) = exec.phase_by_def_id(&def.id) else {
                return Err(PhaseError::Failed(format!(
                    "Phase '{}' missing from execution",
                    def.id
                )));
            };
            let artifact = Artifact::new(
                execution_id,
                phase.id,
                def.output_type,
                format!("{}_output", def.id),
                completion.content.clone(),
            );
            if let Err(e) = self.ctx.store.insert_artifact(&artifact).await {
                let message = format!("Failed to store artifact: {e}");
                drop(exec);
                return Err(self.fail_phase(execution_id, &def.id, message).await);
            }

            let phase = exec
                .phase_by_def_id_mut(&def.id)
                .ok_or_else(|| PhaseError::Failed(format!("Phase '{}' missing from execution", def.id)))?;
            phase.tokens_input += completion.tokens_input;
            phase.tokens_output += completion.tokens_output;
            phase.cost_usd += completion.cost_usd;
            phase.output_artifact_id = Some(artifact.id);
            phase.error_message = None;
            phase.set_status(PhaseStatus::Completed);
            let snapshot = phase.clone();

            exec.recompute_totals();
            let todo_event = if completion.todos.is_empty() {
                None
            } else {
                exec.todos = completion.todos.clone();
                Some(ExecutionEvent::TodoUpdate {
                    todos: completion.todos,
                    progress: TodoProgress::from_items(&exec.todos),
                })
            };
            self.persist(&exec).await;
            (snapshot, exec.budget_snapshot(), todo_event)
        };

        tracing::info!(
            execution_id = %execution_id,
            phase = %def.id,
            cost_usd = phase_snapshot.cost_usd,
            "Phase completed"
        );
        self.ctx
            .channels
            .publish(execution_id, ExecutionEvent::PhaseComplete { phase: phase_snapshot })
            .await;
        self.ctx
            .channels
            .publish(execution_id, ExecutionEvent::BudgetUpdate { budget })
            .await;
        if let Some(event) = todo_event {
            self.ctx.channels.publish(execution_id, event).await;
        }
        Ok(())
    }

    /// Mark a phase failed and return the execution-level error.
    async fn fail_phase(
        &self,
        execution_id: EntityId,
        phase_id: &str,
        message: String,
    ) -> PhaseError {
        let snapshot = {
            let mut exec = self.execution.lock().await;
            let snapshot = exec.phase_by_def_id_mut(phase_id).map(|phase| {
                phase.error_message = Some(message.clone());
                phase.set_status(PhaseStatus::Failed);
                phase.clone()
            });
            self.persist(&exec).await;
            snapshot
        };
        tracing::warn!(execution_id = %execution_id, phase = %phase_id, error = %message, "Phase failed");
        if let Some(phase) = snapshot {
            self.ctx
                .channels
                .publish(execution_id, ExecutionEvent::PhaseComplete { phase })
                .await;
        }
        PhaseError::Failed(message)
    }

    /// Prior artifacts as `(name, content)` pairs for prompt rendering.
    async fn load_artifact_inputs(
        &self,
        execution_id: EntityId,
    ) -> Result<Vec<(String, String)>, String> {
        let metas = self
            .ctx
            .store
            .list_artifacts(execution_id)
            .await
            .map_err(|e| format!("Failed to list artifacts: {e}"))?;

        let mut pairs = Vec::with_capacity(metas.len());
        for meta in metas {
            if let Some(artifact) = self
                .ctx
                .store
                .get_artifact(meta.id)
                .await
                .map_err(|e| format!("Failed to load artifact: {e}"))?
            {
                pairs.push((artifact.name, artifact.content));
            }
        }
        Ok(pairs)
    }

    /// Terminal failure: unlaunched phases are skipped, the reason recorded.
    async fn fail(&self, execution_id: EntityId, message: String) {
        {
            let mut exec = self.execution.lock().await;
            if exec.is_terminal() {
                return;
            }
            for phase in &mut exec.phases {
                if phase.status == PhaseStatus::Pending {
                    phase.set_status(PhaseStatus::Skipped);
                }
            }
            exec.error_message = Some(message.clone());
            if let Err(e) = exec.set_status(ExecutionStatus::Failed) {
                tracing::error!(execution_id = %execution_id, error = %e, "Failed transition rejected");
            }
            self.persist(&exec).await;
        }
        tracing::warn!(execution_id = %execution_id, error = %message, "Execution failed");
        self.publish_status(execution_id).await;
        self.ctx.channels.retire_if_idle(execution_id).await;
    }

    async fn complete(&self, execution_id: EntityId) {
        {
            let mut exec = self.execution.lock().await;
            if exec.is_terminal() {
                return;
            }
            if let Err(e) = exec.set_status(ExecutionStatus::Completed) {
                tracing::error!(execution_id = %execution_id, error = %e, "Completed transition rejected");
            }
            self.persist(&exec).await;
        }
        tracing::info!(execution_id = %execution_id, "Execution completed");
        self.publish_status(execution_id).await;
        self.ctx.channels.retire_if_idle(execution_id).await;
    }

    async fn publish_status(&self, execution_id: EntityId) {
        let (status, error) = {
            let exec = self.execution.lock().await;
            (exec.status, exec.error_message.clone())
        };
        self.ctx
            .channels
            .publish(execution_id, ExecutionEvent::StatusUpdate { status, error })
            .await;
    }

    async fn persist(&self, execution: &Execution) {
        if let Err(e) = self.ctx.store.save_execution(execution).await {
            tracing::error!(execution_id = %execution.id, error = %e, "Failed to persist execution");
        }
    }
}

struct StagePlan {
    members: Vec<PhaseDef>,
    interactive: bool,
    budget_violation: Option<CoreError>,
}
