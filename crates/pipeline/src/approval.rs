//! Single-slot approval gate.
//!
//! Each execution holds at most one open approval request. The state machine
//! calls [`ApprovalGate::request`] and awaits the returned receiver; the API
//! layer resolves the slot via [`ApprovalGate::resolve`], or a spawned expiry
//! task resolves it as [`ApprovalResolution::Expired`] when the timeout
//! elapses first. Whichever side wins removes the slot, so a late resolve
//! observes [`ApprovalError::NoPendingRequest`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, RwLock};
use tokio::task::JoinHandle;

use conductor_core::execution::ApprovalResolution;
use conductor_core::types::{EntityId, Timestamp};

#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    #[error("An approval request is already pending for this execution")]
    AlreadyPending,

    #[error("No approval request is pending for this execution")]
    NoPendingRequest,
}

/// What the waiting state machine receives once the slot is resolved.
#[derive(Debug, Clone)]
pub struct ResolvedApproval {
    pub resolution: ApprovalResolution,
    /// Where the resolution came from: "api", "ws", "timeout", "cancel".
    pub source: String,
    pub message: String,
    pub timeout_secs: u64,
    pub requested_at: Timestamp,
}

/// Snapshot of an open request, served to observers connecting mid-wait.
#[derive(Debug, Clone)]
pub struct PendingApproval {
    pub message: String,
    pub timeout_secs: u64,
    pub remaining_secs: u64,
    pub requested_at: Timestamp,
}

struct Slot {
    message: String,
    timeout_secs: u64,
    requested_at: Timestamp,
    waiter: oneshot::Sender<ResolvedApproval>,
    expiry: JoinHandle<()>,
}

pub struct ApprovalGate {
    slots: RwLock<HashMap<EntityId, Slot>>,
}

impl ApprovalGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            slots: RwLock::new(HashMap::new()),
        })
    }

    /// Open an approval slot and start its expiry timer.
    ///
    /// The returned receiver resolves exactly once, with the resolution and
    /// its source.
    pub async fn request(
        self: &Arc<Self>,
        execution_id: EntityId,
        message: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<oneshot::Receiver<ResolvedApproval>, ApprovalError> {
        let mut slots = self.slots.write().await;
        if slots.contains_key(&execution_id) {
            return Err(ApprovalError::AlreadyPending);
        }

        let (tx, rx) = oneshot::channel();
        let gate = Arc::clone(self);
        let expiry = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(timeout_secs)).await;
            if gate
                .finish(execution_id, ApprovalResolution::Expired, "timeout")
                .await
                .is_ok()
            {
                tracing::info!(execution_id = %execution_id, "Approval request expired");
            }
        });

        slots.insert(
            execution_id,
            Slot {
                message: message.into(),
                timeout_secs,
                requested_at: chrono::Utc::now(),
                waiter: tx,
                expiry,
            },
        );
        Ok(rx)
    }

    /// Resolve the open slot as approved or rejected.
    pub async fn resolve(
        &self,
        execution_id: EntityId,
        approved: bool,
        source: &str,
    ) -> Result<(), ApprovalError> {
        let resolution = if approved {
            ApprovalResolution::Approved
        } else {
            ApprovalResolution::Rejected
        };
        self.finish(execution_id, resolution, source).await
    }

    /// Tear down the slot when the execution is cancelled mid-wait.
    /// The waiter observes an expired resolution with source "cancel".
    pub async fn cancel(&self, execution_id: EntityId) {
        let _ = self
            .finish(execution_id, ApprovalResolution::Expired, "cancel")
            .await;
    }

    /// The open request for an execution, with remaining wall time.
    pub async fn pending(&self, execution_id: EntityId) -> Option<PendingApproval> {
        let slots = self.slots.read().await;
        let slot = slots.get(&execution_id)?;
        let elapsed = (chrono::Utc::now() - slot.requested_at)
            .num_seconds()
            .max(0) as u64;
        Some(PendingApproval {
            message: slot.message.clone(),
            timeout_secs: slot.timeout_secs,
            remaining_secs: slot.timeout_secs.saturating_sub(elapsed),
            requested_at: slot.requested_at,
        })
    }

    pub async fn has_pending(&self, execution_id: EntityId) -> bool {
        self.slots.read().await.contains_key(&execution_id)
    }

    async fn finish(
        &self,
        execution_id: EntityId,
        resolution: ApprovalResolution,
        source: &str,
    ) -> Result<(), ApprovalError> {
        let slot = self
            .slots
            .write()
            .await
            .remove(&execution_id)
            .ok_or(ApprovalError::NoPendingRequest)?;

        // The expiry task resolves itself through this path; aborting it
        // from within would cancel the in-progress resolution.
        if source != "timeout" {
            slot.expiry.abort();
        }

        // A dropped receiver means the machine is gone; nothing to notify.
        let _ = slot.waiter.send(ResolvedApproval {
            resolution,
            source: source.to_string(),
            message: slot.message,
            timeout_secs: slot.timeout_secs,
            requested_at: slot.requested_at,
        });
        Ok(())
    }
}
