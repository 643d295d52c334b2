//! Typed events emitted by the execution state machine.
//!
//! Serialized with an internal `"type"` tag so the WebSocket wire format is
//! exactly the in-process representation.

use serde::{Deserialize, Serialize};

use conductor_core::budget::BudgetSnapshot;
use conductor_core::execution::{ApprovalResolution, PhaseExecution};
use conductor_core::status::ExecutionStatus;
use conductor_core::todo::{TodoItem, TodoProgress};

/// One state-machine transition, as observers see it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionEvent {
    /// The execution's status changed.
    StatusUpdate {
        status: ExecutionStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// A phase started or changed mid-flight (new attempt, new status).
    PhaseUpdate { phase: PhaseExecution },

    /// A phase reached a terminal status.
    PhaseComplete { phase: PhaseExecution },

    /// A stage is waiting on human approval.
    ApprovalNeeded { message: String, timeout_secs: u64 },

    /// The open approval request was resolved (or expired).
    ApprovalResolved { resolution: ApprovalResolution },

    /// Totals changed after a phase completion.
    BudgetUpdate { budget: BudgetSnapshot },

    /// A provider replaced the execution's todo list.
    TodoUpdate {
        todos: Vec<TodoItem>,
        progress: TodoProgress,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_a_type_tag() {
        let event = ExecutionEvent::StatusUpdate {
            status: ExecutionStatus::Running,
            error: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "status_update");
        assert_eq!(json["status"], "running");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn approval_resolved_round_trips() {
        let event = ExecutionEvent::ApprovalResolved {
            resolution: ApprovalResolution::Expired,
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: ExecutionEvent = serde_json::from_str(&json).unwrap();
        match back {
            ExecutionEvent::ApprovalResolved { resolution } => {
                assert_eq!(resolution, ApprovalResolution::Expired)
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn todo_update_carries_progress() {
        let event = ExecutionEvent::TodoUpdate {
            todos: vec![],
            progress: TodoProgress::from_items(&[]),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "todo_update");
        assert_eq!(json["progress"]["total"], 0);
    }
}
