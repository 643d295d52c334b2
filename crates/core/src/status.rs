//! Execution and phase status enums with explicit transition tables.
//!
//! Terminal statuses are absorbing: `valid_transitions` returns an empty
//! slice for them, which is what makes phase/execution status monotonic.

use serde::{Deserialize, Serialize};

/// Lifecycle status of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Paused,
    AwaitingApproval,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    /// Stable string form matching the wire/database representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::AwaitingApproval => "awaiting_approval",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse the string form produced by [`as_str`](Self::as_str).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "paused" => Some(Self::Paused),
            "awaiting_approval" => Some(Self::AwaitingApproval),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Completed, failed and cancelled are terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// The set of statuses reachable from `self`.
    ///
    /// Terminal statuses return an empty slice: no further transitions.
    pub fn valid_transitions(self) -> &'static [ExecutionStatus] {
        use ExecutionStatus::*;
        match self {
            Pending => &[Running, Cancelled, Failed],
            Running => &[Paused, AwaitingApproval, Completed, Failed, Cancelled],
            Paused => &[Running, Cancelled, Failed],
            AwaitingApproval => &[Running, Cancelled],
            Completed | Failed | Cancelled => &[],
        }
    }

    /// Check whether a transition from `self` to `to` is valid.
    pub fn can_transition(self, to: ExecutionStatus) -> bool {
        self.valid_transitions().contains(&to)
    }

    /// Validate a transition, returning an error message for invalid ones.
    pub fn validate_transition(self, to: ExecutionStatus) -> Result<(), String> {
        if self.can_transition(to) {
            Ok(())
        } else {
            Err(format!("Invalid transition: {self} -> {to}"))
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a single phase execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
    Cancelled,
}

impl PhaseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "skipped" => Some(Self::Skipped),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Everything except pending/running is terminal for a phase.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }
}

impl std::fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_execution_statuses_have_no_transitions() {
        for status in [
            ExecutionStatus::Completed,
            ExecutionStatus::Failed,
            ExecutionStatus::Cancelled,
        ] {
            assert!(status.is_terminal());
            assert!(status.valid_transitions().is_empty());
        }
    }

    #[test]
    fn pending_can_start_but_not_complete_directly() {
        assert!(ExecutionStatus::Pending.can_transition(ExecutionStatus::Running));
        assert!(!ExecutionStatus::Pending.can_transition(ExecutionStatus::Completed));
    }

    #[test]
    fn awaiting_approval_resolves_to_running_or_cancelled_only() {
        let from = ExecutionStatus::AwaitingApproval;
        assert!(from.can_transition(ExecutionStatus::Running));
        assert!(from.can_transition(ExecutionStatus::Cancelled));
        assert!(!from.can_transition(ExecutionStatus::Completed));
        assert!(!from.can_transition(ExecutionStatus::Paused));
    }

    #[test]
    fn paused_resumes_to_running() {
        assert!(ExecutionStatus::Paused.can_transition(ExecutionStatus::Running));
    }

    #[test]
    fn invalid_transition_message_names_both_states() {
        let err = ExecutionStatus::Completed
            .validate_transition(ExecutionStatus::Running)
            .unwrap_err();
        assert!(err.contains("completed"));
        assert!(err.contains("running"));
    }

    #[test]
    fn phase_terminal_set() {
        assert!(!PhaseStatus::Pending.is_terminal());
        assert!(!PhaseStatus::Running.is_terminal());
        assert!(PhaseStatus::Completed.is_terminal());
        assert!(PhaseStatus::Failed.is_terminal());
        assert!(PhaseStatus::Skipped.is_terminal());
        assert!(PhaseStatus::Cancelled.is_terminal());
    }

    #[test]
    fn string_round_trip() {
        for status in [
            ExecutionStatus::Pending,
            ExecutionStatus::AwaitingApproval,
            ExecutionStatus::Cancelled,
        ] {
            assert_eq!(ExecutionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ExecutionStatus::parse("bogus"), None);
        assert_eq!(PhaseStatus::parse(PhaseStatus::Skipped.as_str()), Some(PhaseStatus::Skipped));
    }
}
