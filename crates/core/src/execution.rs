//! Runtime entities: executions, phase executions, artifacts, approvals.
//!
//! An [`Execution`] is owned by the orchestrator and mutated only through
//! its state machine. Status setters go through the transition tables in
//! [`crate::status`], which is what enforces monotonicity.

use serde::{Deserialize, Serialize};

use crate::budget::{BudgetLedger, BudgetSnapshot};
use crate::graph::{ArtifactType, PhaseDef, PhaseGraph, PhaseRole};
use crate::status::{ExecutionStatus, PhaseStatus};
use crate::todo::TodoItem;
use crate::types::{new_id, EntityId, Timestamp};

/// Runtime instance of a [`PhaseDef`] within one execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseExecution {
    pub id: EntityId,
    /// Id of the phase definition in the execution's graph.
    pub phase_id: String,
    pub name: String,
    pub role: PhaseRole,
    pub status: PhaseStatus,
    pub provider: String,
    pub model: String,
    pub tokens_input: u64,
    pub tokens_output: u64,
    pub cost_usd: f64,
    /// Attempt counter; 0 until the first attempt starts.
    pub iteration: u32,
    pub output_artifact_id: Option<EntityId>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub error_message: Option<String>,
}

impl PhaseExecution {
    /// Fresh pending instance for a phase definition.
    pub fn from_def(def: &PhaseDef) -> Self {
        Self {
            id: new_id(),
            phase_id: def.id.clone(),
            name: def.name.clone(),
            role: def.role,
            status: PhaseStatus::Pending,
            provider: def.provider.kind.to_string(),
            model: def.provider.model.clone(),
            tokens_input: 0,
            tokens_output: 0,
            cost_usd: 0.0,
            iteration: 0,
            output_artifact_id: None,
            started_at: None,
            completed_at: None,
            error_message: None,
        }
    }

    /// Transition to `status` unless the phase is already terminal.
    ///
    /// Returns whether the transition was applied. Terminal statuses stamp
    /// `completed_at`; entering `Running` stamps `started_at` on the first
    /// attempt.
    pub fn set_status(&mut self, status: PhaseStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        let now = chrono::Utc::now();
        if status == PhaseStatus::Running && self.started_at.is_none() {
            self.started_at = Some(now);
        }
        if status.is_terminal() {
            self.completed_at = Some(now);
        }
        true
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// One run of a phase graph toward a task description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: EntityId,
    pub task_description: String,
    #[serde(default)]
    pub project_path: String,
    pub status: ExecutionStatus,
    /// When set, every stage pauses for human approval before launching.
    #[serde(default)]
    pub interactive: bool,
    /// Frozen copy of the template this execution runs against.
    pub graph: PhaseGraph,
    pub phases: Vec<PhaseExecution>,
    #[serde(default)]
    pub todos: Vec<TodoItem>,
    pub budget_limit_usd: Option<f64>,
    pub total_cost_usd: f64,
    pub total_tokens_input: u64,
    pub total_tokens_output: u64,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

impl Execution {
    /// Create a pending execution with one phase execution per definition,
    /// in ascending graph order.
    pub fn new(
        task_description: impl Into<String>,
        project_path: impl Into<String>,
        graph: PhaseGraph,
        budget_limit_usd: Option<f64>,
        interactive: bool,
    ) -> Self {
        let mut defs: Vec<&PhaseDef> = graph.phases.iter().collect();
        defs.sort_by_key(|d| d.order);
        let phases = defs.into_iter().map(PhaseExecution::from_def).collect();

        Self {
            id: new_id(),
            task_description: task_description.into(),
            project_path: project_path.into(),
            status: ExecutionStatus::Pending,
            interactive,
            graph,
            phases,
            todos: Vec::new(),
            budget_limit_usd,
            total_cost_usd: 0.0,
            total_tokens_input: 0,
            total_tokens_output: 0,
            error_message: None,
            created_at: chrono::Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Validated status transition. Stamps `started_at`/`completed_at`.
    pub fn set_status(&mut self, to: ExecutionStatus) -> Result<(), String> {
        self.status.validate_transition(to)?;
        self.status = to;
        let now = chrono::Utc::now();
        if to == ExecutionStatus::Running && self.started_at.is_none() {
            self.started_at = Some(now);
        }
        if to.is_terminal() {
            self.completed_at = Some(now);
        }
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn phase_by_def_id(&self, phase_id: &str) -> Option<&PhaseExecution> {
        self.phases.iter().find(|p| p.phase_id == phase_id)
    }

    pub fn phase_by_def_id_mut(&mut self, phase_id: &str) -> Option<&mut PhaseExecution> {
        self.phases.iter_mut().find(|p| p.phase_id == phase_id)
    }

    /// Recompute cost and token totals from the phase executions.
    ///
    /// The invariant `total == sum(phase costs)` holds because this is the
    /// only way totals change.
    pub fn recompute_totals(&mut self) {
        self.total_cost_usd = self.phases.iter().map(|p| p.cost_usd).sum();
        self.total_tokens_input = self.phases.iter().map(|p| p.tokens_input).sum();
        self.total_tokens_output = self.phases.iter().map(|p| p.tokens_output).sum();
    }

    /// Ledger view over the current totals.
    pub fn ledger(&self) -> BudgetLedger {
        BudgetLedger::with_total(self.budget_limit_usd, self.total_cost_usd)
    }

    pub fn budget_snapshot(&self) -> BudgetSnapshot {
        self.ledger().snapshot()
    }

    /// Mark every non-terminal phase cancelled (used by `cancel`).
    pub fn cancel_open_phases(&mut self) {
        for phase in &mut self.phases {
            if !phase.is_terminal() {
                phase.set_status(PhaseStatus::Cancelled);
            }
        }
    }
}

/// Outcome of an approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalResolution {
    Approved,
    Rejected,
    /// Timer fired before anyone resolved; treated as a rejection.
    Expired,
}

impl ApprovalResolution {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    pub fn is_approved(self) -> bool {
        matches!(self, Self::Approved)
    }
}

/// Audit record of a resolved approval request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub id: EntityId,
    pub execution_id: EntityId,
    pub message: String,
    pub resolution: ApprovalResolution,
    /// Where the resolution came from: "api", "ws", "timeout", "cancel".
    pub source: String,
    pub timeout_secs: u64,
    pub requested_at: Timestamp,
    pub resolved_at: Timestamp,
}

/// Durable output of a completed phase attempt. Never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: EntityId,
    pub execution_id: EntityId,
    pub phase_execution_id: EntityId,
    pub artifact_type: ArtifactType,
    pub name: String,
    pub content: String,
    pub created_at: Timestamp,
}

impl Artifact {
    pub fn new(
        execution_id: EntityId,
        phase_execution_id: EntityId,
        artifact_type: ArtifactType,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            execution_id,
            phase_execution_id,
            artifact_type,
            name: name.into(),
            content: content.into(),
            created_at: chrono::Utc::now(),
        }
    }

    pub fn meta(&self) -> ArtifactMeta {
        ArtifactMeta {
            id: self.id,
            execution_id: self.execution_id,
            phase_execution_id: self.phase_execution_id,
            artifact_type: self.artifact_type,
            name: self.name.clone(),
            size_bytes: self.content.len() as u64,
            created_at: self.created_at,
        }
    }
}

/// Artifact listing entry; content is fetched separately by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMeta {
    pub id: EntityId,
    pub execution_id: EntityId,
    pub phase_execution_id: EntityId,
    pub artifact_type: ArtifactType,
    pub name: String,
    pub size_bytes: u64,
    pub created_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_execution() -> Execution {
        Execution::new("do the thing", "/tmp/project", PhaseGraph::default_pipeline(), Some(5.0), false)
    }

    #[test]
    fn new_execution_is_pending_with_all_phases_pending() {
        let exec = sample_execution();
        assert_eq!(exec.status, ExecutionStatus::Pending);
        assert_eq!(exec.phases.len(), exec.graph.phases.len());
        assert!(exec.phases.iter().all(|p| p.status == PhaseStatus::Pending));
        assert_eq!(exec.total_cost_usd, 0.0);
    }

    #[test]
    fn phase_status_is_monotonic_once_terminal() {
        let mut exec = sample_execution();
        let phase = &mut exec.phases[0];
        assert!(phase.set_status(PhaseStatus::Running));
        assert!(phase.set_status(PhaseStatus::Completed));
        assert!(!phase.set_status(PhaseStatus::Running));
        assert_eq!(phase.status, PhaseStatus::Completed);
        assert!(phase.completed_at.is_some());
    }

    #[test]
    fn totals_are_recomputed_from_phase_costs() {
        let mut exec = sample_execution();
        exec.phases[0].cost_usd = 0.40;
        exec.phases[1].cost_usd = 0.25;
        exec.phases[0].tokens_input = 100;
        exec.phases[1].tokens_output = 50;
        exec.recompute_totals();
        assert_eq!(exec.total_cost_usd, 0.65);
        assert_eq!(exec.total_tokens_input, 100);
        assert_eq!(exec.total_tokens_output, 50);
        assert_eq!(exec.ledger().total(), 0.65);
    }

    #[test]
    fn invalid_execution_transition_is_rejected() {
        let mut exec = sample_execution();
        assert!(exec.set_status(ExecutionStatus::Completed).is_err());
        exec.set_status(ExecutionStatus::Running).unwrap();
        exec.set_status(ExecutionStatus::Completed).unwrap();
        assert!(exec.set_status(ExecutionStatus::Running).is_err());
        assert!(exec.completed_at.is_some());
    }

    #[test]
    fn cancel_open_phases_spares_terminal_ones() {
        let mut exec = sample_execution();
        exec.phases[0].set_status(PhaseStatus::Running);
        exec.phases[0].set_status(PhaseStatus::Completed);
        exec.cancel_open_phases();
        assert_eq!(exec.phases[0].status, PhaseStatus::Completed);
        assert!(exec.phases[1..]
            .iter()
            .all(|p| p.status == PhaseStatus::Cancelled));
    }

    #[test]
    fn artifact_meta_reports_size() {
        let artifact = Artifact::new(new_id(), new_id(), ArtifactType::Custom, "out", "abcde");
        assert_eq!(artifact.meta().size_bytes, 5);
    }
}
