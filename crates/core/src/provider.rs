//! The language-model provider boundary.
//!
//! The core depends only on [`LanguageModelProvider`]; concrete adapters
//! (API clients, local runtimes) live outside this workspace and are handed
//! in at startup. A provider call that fails or times out is an ordinary
//! phase failure from the core's point of view.

use async_trait::async_trait;

use crate::graph::ProviderKind;
use crate::todo::TodoItem;

/// One delegated unit of work sent to a provider.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub model: String,
    pub temperature: f32,
}

/// What a provider returns for a completed request.
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub tokens_input: u64,
    pub tokens_output: u64,
    pub cost_usd: f64,
    pub model_used: String,
    /// Sub-task list surfaced by todo-aware providers; usually empty.
    pub todos: Vec<TodoItem>,
}

/// Failure at the provider boundary.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ProviderError {
    pub message: String,
    /// Hint that a retry might succeed (rate limit, transient network).
    pub retryable: bool,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }
}

/// Polymorphic capability backing a phase.
#[async_trait]
pub trait LanguageModelProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn submit(&self, request: CompletionRequest) -> Result<Completion, ProviderError>;
}

/// Substitute prompt placeholders.
///
/// `{task_description}` and `{project_path}` are replaced directly;
/// `{artifact:NAME}` is replaced with the content of the first earlier
/// artifact whose name contains `NAME` (case-insensitive), or a marker when
/// none matches.
pub fn render_prompt(
    template: &str,
    task_description: &str,
    project_path: &str,
    artifacts: &[(String, String)],
) -> String {
    let mut prompt = template
        .replace("{task_description}", task_description)
        .replace("{project_path}", project_path);

    // The scan resumes after each substitution; artifact content is
    // untrusted and must never be re-scanned for placeholders.
    const OPEN: &str = "{artifact:";
    let mut search_from = 0;
    while let Some(rel_start) = prompt[search_from..].find(OPEN) {
        let start = search_from + rel_start;
        let Some(rel_end) = prompt[start..].find('}') else {
            break;
        };
        let end = start + rel_end;
        let needle = prompt[start + OPEN.len()..end].to_lowercase();
        let replacement = artifacts
            .iter()
            .find(|(name, _)| name.to_lowercase().contains(&needle))
            .map(|(_, content)| content.clone())
            .unwrap_or_else(|| format!("[Artifact '{needle}' not found]"));
        prompt.replace_range(start..=end, &replacement);
        search_from = start + replacement.len();
    }

    prompt
}
