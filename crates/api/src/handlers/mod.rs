pub mod artifacts;
pub mod executions;
pub mod templates;
