//! Rows for the `approvals` audit table.

use sqlx::FromRow;

use conductor_core::execution::{ApprovalRecord, ApprovalResolution};
use conductor_core::types::{EntityId, Timestamp};

use super::DecodeError;

#[derive(Debug, Clone, FromRow)]
pub struct ApprovalRow {
    pub id: EntityId,
    pub execution_id: EntityId,
    pub message: String,
    pub resolution: String,
    pub source: String,
    pub timeout_secs: i64,
    pub requested_at: Timestamp,
    pub resolved_at: Timestamp,
}

impl ApprovalRow {
    pub fn from_domain(record: &ApprovalRecord) -> Self {
        Self {
            id: record.id,
            execution_id: record.execution_id,
            message: record.message.clone(),
            resolution: record.resolution.as_str().to_string(),
            source: record.source.clone(),
            timeout_secs: record.timeout_secs as i64,
            requested_at: record.requested_at,
            resolved_at: record.resolved_at,
        }
    }

    pub fn into_domain(self) -> Result<ApprovalRecord, DecodeError> {
        let resolution =
            ApprovalResolution::parse(&self.resolution).ok_or(DecodeError::InvalidField {
                field: "resolution",
                value: self.resolution.clone(),
            })?;
        Ok(ApprovalRecord {
            id: self.id,
            execution_id: self.execution_id,
            message: self.message,
            resolution,
            source: self.source,
            timeout_secs: self.timeout_secs as u64,
            requested_at: self.requested_at,
            resolved_at: self.resolved_at,
        })
    }
}
