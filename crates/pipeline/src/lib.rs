//! Conductor orchestration core.
//!
//! Drives executions through their phase graphs: the [`Orchestrator`] owns
//! the registry of live executions and the control surface; each run spawns
//! an [`machine::ExecutionMachine`] that walks the graph's stages, checks
//! the budget, pauses on the [`ApprovalGate`] for interactive executions,
//! and fans parallel stage members out to the registered providers.

pub mod approval;
pub mod machine;
pub mod memory;
pub mod orchestrator;
pub mod registry;

pub use approval::{ApprovalError, ApprovalGate, PendingApproval};
pub use memory::MemoryStore;
pub use orchestrator::{ControlError, CreateExecution, Orchestrator, OrchestratorConfig};
pub use registry::{ProviderRegistry, StaticProvider};
