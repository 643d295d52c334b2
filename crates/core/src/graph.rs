//! Phase graph templates.
//!
//! A [`PhaseGraph`] is the immutable template an execution runs against:
//! ordered phase definitions, parallel grouping via `parallel_with`, and the
//! pipeline-wide iteration policy. Grouping is encoded flat on each phase
//! (a pointer to the sibling it runs alongside); [`PhaseGraph::stages`]
//! resolves that into an explicit ordered list of stages exactly once, at
//! execution start, so the driver loop never re-derives it.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Which external provider backs a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    ClaudeCode,
    ClaudeSdk,
    GeminiSdk,
    Openai,
    Openrouter,
    Ollama,
    LmStudio,
    /// Canned provider that returns fixed content; used for dry runs.
    Static,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClaudeCode => "claude_code",
            Self::ClaudeSdk => "claude_sdk",
            Self::GeminiSdk => "gemini_sdk",
            Self::Openai => "openai",
            Self::Openrouter => "openrouter",
            Self::Ollama => "ollama",
            Self::LmStudio => "lm_studio",
            Self::Static => "static",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider assignment for a single phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_temperature() -> f32 {
    0.1
}

/// Role label describing a phase's purpose in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseRole {
    Analyzer,
    Planner,
    Implementer,
    ReviewerFunctional,
    ReviewerStyle,
    ReviewerSecurity,
    Verifier,
    Custom,
}

impl PhaseRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Analyzer => "analyzer",
            Self::Planner => "planner",
            Self::Implementer => "implementer",
            Self::ReviewerFunctional => "reviewer_functional",
            Self::ReviewerStyle => "reviewer_style",
            Self::ReviewerSecurity => "reviewer_security",
            Self::Verifier => "verifier",
            Self::Custom => "custom",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "analyzer" => Some(Self::Analyzer),
            "planner" => Some(Self::Planner),
            "implementer" => Some(Self::Implementer),
            "reviewer_functional" => Some(Self::ReviewerFunctional),
            "reviewer_style" => Some(Self::ReviewerStyle),
            "reviewer_security" => Some(Self::ReviewerSecurity),
            "verifier" => Some(Self::Verifier),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

/// Declared type of the artifact a phase produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactType {
    TaskList,
    CodebaseDocs,
    ImplementationPlan,
    CodeDiff,
    ReviewReport,
    VerificationReport,
    Custom,
}

impl ArtifactType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TaskList => "task_list",
            Self::CodebaseDocs => "codebase_docs",
            Self::ImplementationPlan => "implementation_plan",
            Self::CodeDiff => "code_diff",
            Self::ReviewReport => "review_report",
            Self::VerificationReport => "verification_report",
            Self::Custom => "custom",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "task_list" => Some(Self::TaskList),
            "codebase_docs" => Some(Self::CodebaseDocs),
            "implementation_plan" => Some(Self::ImplementationPlan),
            "code_diff" => Some(Self::CodeDiff),
            "review_report" => Some(Self::ReviewReport),
            "verification_report" => Some(Self::VerificationReport),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

/// Template for one phase of a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseDef {
    /// Template-scoped identifier, referenced by `parallel_with`.
    pub id: String,
    pub name: String,
    pub role: PhaseRole,
    pub provider: ProviderConfig,
    pub prompt_template: String,
    pub output_type: ArtifactType,
    /// Whether a failed attempt may be retried under the iteration budget.
    #[serde(default)]
    pub can_iterate: bool,
    /// Consulted by the pre-launch budget check; `None` counts as zero.
    #[serde(default)]
    pub estimated_cost_usd: Option<f64>,
    /// Ascending execution order of this phase's stage.
    pub order: i32,
    /// Id of a sibling phase this one runs alongside, if any.
    #[serde(default)]
    pub parallel_with: Option<String>,
}

/// An immutable, reusable pipeline template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseGraph {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub phases: Vec<PhaseDef>,
    /// Maximum attempts for a phase with `can_iterate` set.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_max_iterations() -> u32 {
    3
}

/// One step of the resolved pipeline: a set of phases launched together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub phase_ids: Vec<String>,
}

impl PhaseGraph {
    /// Structural validation, run before an execution is created.
    ///
    /// Checks: at least one phase, unique phase ids, `parallel_with`
    /// referencing an existing sibling that is itself a stage anchor
    /// (no chained pointers), and no self-reference.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.phases.is_empty() {
            return Err(CoreError::Validation("phase graph has no phases".into()));
        }
        if self.max_iterations == 0 {
            return Err(CoreError::Validation("max_iterations must be at least 1".into()));
        }

        let mut seen = std::collections::HashSet::new();
        for phase in &self.phases {
            if !seen.insert(phase.id.as_str()) {
                return Err(CoreError::Validation(format!(
                    "duplicate phase id '{}'",
                    phase.id
                )));
            }
        }

        for phase in &self.phases {
            let Some(target_id) = &phase.parallel_with else {
                continue;
            };
            if target_id == &phase.id {
                return Err(CoreError::Validation(format!(
                    "phase '{}' cannot run parallel with itself",
                    phase.id
                )));
            }
            let Some(target) = self.phase(target_id) else {
                return Err(CoreError::Validation(format!(
                    "phase '{}' runs parallel with unknown phase '{target_id}'",
                    phase.id
                )));
            };
            if target.parallel_with.is_some() {
                return Err(CoreError::Validation(format!(
                    "phase '{}' runs parallel with '{target_id}', which is not a stage anchor",
                    phase.id
                )));
            }
        }

        Ok(())
    }

    /// Look up a phase definition by id.
    pub fn phase(&self, id: &str) -> Option<&PhaseDef> {
        self.phases.iter().find(|p| p.id == id)
    }

    /// Resolve the flat `parallel_with` encoding into an ordered stage list.
    ///
    /// Anchors (phases without `parallel_with`) become stages in ascending
    /// `order`; each pointing phase joins its anchor's stage. Call once at
    /// execution start and drive the resulting list.
    pub fn stages(&self) -> Vec<Stage> {
        let mut anchors: Vec<&PhaseDef> = self
            .phases
            .iter()
            .filter(|p| p.parallel_with.is_none())
            .collect();
        anchors.sort_by_key(|p| p.order);

        anchors
            .into_iter()
            .map(|anchor| {
                let mut phase_ids = vec![anchor.id.clone()];
                phase_ids.extend(
                    self.phases
                        .iter()
                        .filter(|p| p.parallel_with.as_deref() == Some(anchor.id.as_str()))
                        .map(|p| p.id.clone()),
                );
                Stage { phase_ids }
            })
            .collect()
    }

    /// Summed `estimated_cost_usd` of a stage's members.
    pub fn stage_estimate(&self, stage: &Stage) -> f64 {
        stage
            .phase_ids
            .iter()
            .filter_map(|id| self.phase(id))
            .filter_map(|p| p.estimated_cost_usd)
            .sum()
    }

    /// The built-in analyze → plan → implement → parallel review pipeline,
    /// used when an execution is created without a template.
    pub fn default_pipeline() -> Self {
        let claude = |model: &str| ProviderConfig {
            kind: ProviderKind::ClaudeCode,
            model: model.to_string(),
            temperature: 0.1,
        };

        Self {
            id: "default".into(),
            name: "Default pipeline".into(),
            description: "Analyze, plan, implement, then review functionally and for style in parallel.".into(),
            phases: vec![
                PhaseDef {
                    id: "analyze".into(),
                    name: "Analyze".into(),
                    role: PhaseRole::Analyzer,
                    provider: claude("claude-sonnet"),
                    prompt_template: "Analyze the codebase at {project_path} for: {task_description}".into(),
                    output_type: ArtifactType::CodebaseDocs,
                    can_iterate: false,
                    estimated_cost_usd: None,
                    order: 0,
                    parallel_with: None,
                },
                PhaseDef {
                    id: "plan".into(),
                    name: "Plan".into(),
                    role: PhaseRole::Planner,
                    provider: claude("claude-sonnet"),
                    prompt_template: "Write an implementation plan for: {task_description}\n\nAnalysis:\n{artifact:analyze}".into(),
                    output_type: ArtifactType::ImplementationPlan,
                    can_iterate: false,
                    estimated_cost_usd: None,
                    order: 1,
                    parallel_with: None,
                },
                PhaseDef {
                    id: "implement".into(),
                    name: "Implement".into(),
                    role: PhaseRole::Implementer,
                    provider: claude("claude-sonnet"),
                    prompt_template: "Implement the plan:\n{artifact:plan}".into(),
                    output_type: ArtifactType::CodeDiff,
                    can_iterate: true,
                    estimated_cost_usd: None,
                    order: 2,
                    parallel_with: None,
                },
                PhaseDef {
                    id: "review_functional".into(),
                    name: "Functional review".into(),
                    role: PhaseRole::ReviewerFunctional,
                    provider: claude("claude-sonnet"),
                    prompt_template: "Review the change for functional correctness:\n{artifact:implement}".into(),
                    output_type: ArtifactType::ReviewReport,
                    can_iterate: false,
                    estimated_cost_usd: None,
                    order: 3,
                    parallel_with: None,
                },
                PhaseDef {
                    id: "review_style".into(),
                    name: "Style review".into(),
                    role: PhaseRole::ReviewerStyle,
                    provider: claude("claude-sonnet"),
                    prompt_template: "Review the change for style and maintainability:\n{artifact:implement}".into(),
                    output_type: ArtifactType::ReviewReport,
                    can_iterate: false,
                    estimated_cost_usd: None,
                    order: 3,
                    parallel_with: Some("review_functional".into()),
                },
            ],
            max_iterations: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn phase(id: &str, order: i32, parallel_with: Option<&str>) -> PhaseDef {
        PhaseDef {
            id: id.into(),
            name: id.into(),
            role: PhaseRole::Custom,
            provider: ProviderConfig {
                kind: ProviderKind::Static,
                model: "test".into(),
                temperature: 0.1,
            },
            prompt_template: "{task_description}".into(),
            output_type: ArtifactType::Custom,
            can_iterate: false,
            estimated_cost_usd: None,
            order,
            parallel_with: parallel_with.map(Into::into),
        }
    }

    fn graph(phases: Vec<PhaseDef>) -> PhaseGraph {
        PhaseGraph {
            id: "g".into(),
            name: "test".into(),
            description: String::new(),
            phases,
            max_iterations: 3,
        }
    }

    #[test]
    fn sequential_phases_become_one_stage_each() {
        let g = graph(vec![phase("a", 0, None), phase("b", 1, None)]);
        let stages = g.stages();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].phase_ids, vec!["a"]);
        assert_eq!(stages[1].phase_ids, vec!["b"]);
    }

    #[test]
    fn parallel_members_join_their_anchor_stage() {
        let g = graph(vec![
            phase("a", 0, None),
            phase("b", 1, None),
            phase("c", 1, Some("b")),
        ]);
        let stages = g.stages();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[1].phase_ids, vec!["b", "c"]);
    }

    #[test]
    fn stages_follow_ascending_order_regardless_of_declaration() {
        let g = graph(vec![phase("late", 5, None), phase("early", 1, None)]);
        let stages = g.stages();
        assert_eq!(stages[0].phase_ids, vec!["early"]);
        assert_eq!(stages[1].phase_ids, vec!["late"]);
    }

    #[test]
    fn validate_rejects_unknown_parallel_target() {
        let g = graph(vec![phase("a", 0, Some("missing"))]);
        assert_matches!(g.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn validate_rejects_chained_parallel_pointers() {
        let g = graph(vec![
            phase("a", 0, None),
            phase("b", 1, Some("a")),
            phase("c", 2, Some("b")),
        ]);
        assert_matches!(g.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn validate_rejects_duplicate_ids_and_self_reference() {
        let g = graph(vec![phase("a", 0, None), phase("a", 1, None)]);
        assert_matches!(g.validate(), Err(CoreError::Validation(_)));

        let g = graph(vec![phase("a", 0, Some("a"))]);
        assert_matches!(g.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn stage_estimate_sums_known_costs() {
        let mut a = phase("a", 0, None);
        a.estimated_cost_usd = Some(0.25);
        let b = phase("b", 0, Some("a"));
        let mut c = phase("c", 0, Some("a"));
        c.estimated_cost_usd = Some(0.10);
        let g = graph(vec![a, b, c]);

        let stages = g.stages();
        assert_eq!(g.stage_estimate(&stages[0]), 0.35);
    }

    #[test]
    fn default_pipeline_is_valid_with_parallel_reviews() {
        let g = PhaseGraph::default_pipeline();
        g.validate().unwrap();
        let stages = g.stages();
        assert_eq!(stages.len(), 4);
        assert_eq!(stages[3].phase_ids.len(), 2);
    }
}
