//! Rows for the `executions` and `phase_executions` tables.

use sqlx::FromRow;

use conductor_core::execution::{Execution, PhaseExecution};
use conductor_core::graph::{PhaseGraph, PhaseRole};
use conductor_core::status::{ExecutionStatus, PhaseStatus};
use conductor_core::todo::TodoItem;
use conductor_core::types::{EntityId, Timestamp};

use super::DecodeError;

/// A row from the `executions` table. Phases are loaded separately.
#[derive(Debug, Clone, FromRow)]
pub struct ExecutionRow {
    pub id: EntityId,
    pub task_description: String,
    pub project_path: String,
    pub status: String,
    pub interactive: bool,
    pub graph: serde_json::Value,
    pub todos: serde_json::Value,
    pub budget_limit_usd: Option<f64>,
    pub total_cost_usd: f64,
    pub total_tokens_input: i64,
    pub total_tokens_output: i64,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

impl ExecutionRow {
    pub fn from_domain(execution: &Execution) -> Result<Self, DecodeError> {
        Ok(Self {
            id: execution.id,
            task_description: execution.task_description.clone(),
            project_path: execution.project_path.clone(),
            status: execution.status.as_str().to_string(),
            interactive: execution.interactive,
            graph: serde_json::to_value(&execution.graph)
                .map_err(|source| DecodeError::Json { field: "graph", source })?,
            todos: serde_json::to_value(&execution.todos)
                .map_err(|source| DecodeError::Json { field: "todos", source })?,
            budget_limit_usd: execution.budget_limit_usd,
            total_cost_usd: execution.total_cost_usd,
            total_tokens_input: execution.total_tokens_input as i64,
            total_tokens_output: execution.total_tokens_output as i64,
            error_message: execution.error_message.clone(),
            created_at: execution.created_at,
            started_at: execution.started_at,
            completed_at: execution.completed_at,
        })
    }

    pub fn into_domain(self, phases: Vec<PhaseExecution>) -> Result<Execution, DecodeError> {
        let status = ExecutionStatus::parse(&self.status).ok_or(DecodeError::InvalidField {
            field: "status",
            value: self.status.clone(),
        })?;
        let graph: PhaseGraph = serde_json::from_value(self.graph)
            .map_err(|source| DecodeError::Json { field: "graph", source })?;
        let todos: Vec<TodoItem> = serde_json::from_value(self.todos)
            .map_err(|source| DecodeError::Json { field: "todos", source })?;

        Ok(Execution {
            id: self.id,
            task_description: self.task_description,
            project_path: self.project_path,
            status,
            interactive: self.interactive,
            graph,
            phases,
            todos,
            budget_limit_usd: self.budget_limit_usd,
            total_cost_usd: self.total_cost_usd,
            total_tokens_input: self.total_tokens_input as u64,
            total_tokens_output: self.total_tokens_output as u64,
            error_message: self.error_message,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
        })
    }
}

/// A row from the `phase_executions` table.
#[derive(Debug, Clone, FromRow)]
pub struct PhaseExecutionRow {
    pub id: EntityId,
    pub execution_id: EntityId,
    pub phase_id: String,
    pub name: String,
    pub role: String,
    pub status: String,
    pub provider: String,
    pub model: String,
    pub tokens_input: i64,
    pub tokens_output: i64,
    pub cost_usd: f64,
    pub iteration: i32,
    pub output_artifact_id: Option<EntityId>,
    pub position: i32,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub error_message: Option<String>,
}

impl PhaseExecutionRow {
    pub fn from_domain(execution_id: EntityId, position: i32, phase: &PhaseExecution) -> Self {
        Self {
            id: phase.id,
            execution_id,
            phase_id: phase.phase_id.clone(),
            name: phase.name.clone(),
            role: phase.role.as_str().to_string(),
            status: phase.status.as_str().to_string(),
            provider: phase.provider.clone(),
            model: phase.model.clone(),
            tokens_input: phase.tokens_input as i64,
            tokens_output: phase.tokens_output as i64,
            cost_usd: phase.cost_usd,
            iteration: phase.iteration as i32,
            output_artifact_id: phase.output_artifact_id,
            position,
            started_at: phase.started_at,
            completed_at: phase.completed_at,
            error_message: phase.error_message.clone(),
        }
    }

    pub fn into_domain(self) -> Result<PhaseExecution, DecodeError> {
        let role = PhaseRole::parse(&self.role).ok_or(DecodeError::InvalidField {
            field: "role",
            value: self.role.clone(),
        })?;
        let status = PhaseStatus::parse(&self.status).ok_or(DecodeError::InvalidField {
            field: "status",
            value: self.status.clone(),
        })?;

        Ok(PhaseExecution {
            id: self.id,
            phase_id: self.phase_id,
            name: self.name,
            role,
            status,
            provider: self.provider,
            model: self.model,
            tokens_input: self.tokens_input as u64,
            tokens_output: self.tokens_output as u64,
            cost_usd: self.cost_usd,
            iteration: self.iteration as u32,
            output_artifact_id: self.output_artifact_id,
            started_at: self.started_at,
            completed_at: self.completed_at,
            error_message: self.error_message,
        })
    }
}
