//! Provider-reported sub-task ("todo") tracking.
//!
//! Todo-aware providers surface a task list while a phase runs. The list is
//! owned by whichever phase emitted it last: each emission replaces the
//! execution's current list wholesale.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoPriority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: String,
    pub content: String,
    pub priority: TodoPriority,
    pub status: TodoStatus,
}

/// Derived progress summary accompanying a todo list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoProgress {
    pub completed: usize,
    pub in_progress: usize,
    pub pending: usize,
    pub cancelled: usize,
    pub total: usize,
    pub percent: u8,
}

impl TodoProgress {
    pub fn from_items(items: &[TodoItem]) -> Self {
        let count = |status: TodoStatus| items.iter().filter(|t| t.status == status).count();
        let completed = count(TodoStatus::Completed);
        let total = items.len();
        Self {
            completed,
            in_progress: count(TodoStatus::InProgress),
            pending: count(TodoStatus::Pending),
            cancelled: count(TodoStatus::Cancelled),
            total,
            percent: if total == 0 {
                0
            } else {
                ((completed as f64 / total as f64) * 100.0).round() as u8
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(status: TodoStatus) -> TodoItem {
        TodoItem {
            id: "t1".into(),
            content: "task".into(),
            priority: TodoPriority::Medium,
            status,
        }
    }

    #[test]
    fn empty_list_is_zero_percent() {
        let progress = TodoProgress::from_items(&[]);
        assert_eq!(progress.total, 0);
        assert_eq!(progress.percent, 0);
    }

    #[test]
    fn progress_counts_and_percent() {
        let items = vec![
            item(TodoStatus::Completed),
            item(TodoStatus::Completed),
            item(TodoStatus::InProgress),
            item(TodoStatus::Pending),
        ];
        let progress = TodoProgress::from_items(&items);
        assert_eq!(progress.completed, 2);
        assert_eq!(progress.in_progress, 1);
        assert_eq!(progress.pending, 1);
        assert_eq!(progress.cancelled, 0);
        assert_eq!(progress.percent, 50);
    }
}
