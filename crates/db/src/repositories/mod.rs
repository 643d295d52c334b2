pub mod approval_repo;
pub mod artifact_repo;
pub mod execution_repo;
pub mod template_repo;
