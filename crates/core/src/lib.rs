//! Conductor domain core.
//!
//! Zero-internal-dep crate holding the domain model of the pipeline
//! orchestration engine:
//!
//! - [`status`] — execution/phase status enums with explicit transition tables.
//! - [`graph`] — phase graph templates and the stage-building algorithm.
//! - [`budget`] — the per-execution budget ledger.
//! - [`execution`] — runtime entities (executions, phase executions, artifacts).
//! - [`todo`] — provider-reported sub-task tracking.
//! - [`provider`] — the language-model provider boundary trait.
//! - [`store`] — the persistence boundary trait.
//! - [`error`] — the shared domain error taxonomy.

pub mod budget;
pub mod error;
pub mod execution;
pub mod graph;
pub mod provider;
pub mod status;
pub mod store;
pub mod todo;
pub mod types;

pub use error::CoreError;
