//! Per-execution broadcast hubs.
//!
//! One `tokio::sync::broadcast` channel per execution id, created on first
//! subscribe and torn down once the execution is done and unobserved.
//! Delivery is best-effort per observer: publishing never blocks, and a slow
//! or disconnected observer only affects itself (it will observe
//! `RecvError::Lagged` and should reconnect for a fresh snapshot — there is
//! no replay buffer).

use std::collections::HashMap;

use tokio::sync::{broadcast, RwLock};

use conductor_core::types::EntityId;

use crate::event::ExecutionEvent;

/// Buffer capacity of each per-execution broadcast channel.
const CHANNEL_CAPACITY: usize = 256;

/// Registry of live update channels, keyed by execution id.
///
/// Thread-safe via interior `RwLock`; designed to be shared as
/// `Arc<ChannelRegistry>` between the state machines (publishers) and the
/// WebSocket layer (subscribers).
pub struct ChannelRegistry {
    channels: RwLock<HashMap<EntityId, broadcast::Sender<ExecutionEvent>>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Publish an event to the execution's observers.
    ///
    /// A missing channel or zero receivers means nobody is watching; the
    /// event is dropped silently (observers get a full snapshot on connect).
    pub async fn publish(&self, execution_id: EntityId, event: ExecutionEvent) {
        let channels = self.channels.read().await;
        if let Some(sender) = channels.get(&execution_id) {
            let _ = sender.send(event);
        }
    }

    /// Subscribe to an execution's events, creating the channel on demand.
    pub async fn subscribe(&self, execution_id: EntityId) -> broadcast::Receiver<ExecutionEvent> {
        let mut channels = self.channels.write().await;
        channels
            .entry(execution_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Number of observers currently subscribed to an execution.
    pub async fn observer_count(&self, execution_id: EntityId) -> usize {
        self.channels
            .read()
            .await
            .get(&execution_id)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }

    /// Drop the channel if nobody is subscribed.
    ///
    /// Called when an execution reaches a terminal state and when the last
    /// observer disconnects; returns whether the channel was removed.
    pub async fn retire_if_idle(&self, execution_id: EntityId) -> bool {
        let mut channels = self.channels.write().await;
        match channels.get(&execution_id) {
            Some(sender) if sender.receiver_count() == 0 => {
                channels.remove(&execution_id);
                tracing::debug!(execution_id = %execution_id, "Retired idle update channel");
                true
            }
            Some(_) => false,
            None => true,
        }
    }

    /// Number of live channels (for shutdown logging).
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::status::ExecutionStatus;
    use conductor_core::types::new_id;

    fn status_event(status: ExecutionStatus) -> ExecutionEvent {
        ExecutionEvent::StatusUpdate { status, error: None }
    }

    #[tokio::test]
    async fn events_arrive_in_publish_order() {
        let registry = ChannelRegistry::new();
        let id = new_id();
        let mut rx = registry.subscribe(id).await;

        registry.publish(id, status_event(ExecutionStatus::Running)).await;
        registry.publish(id, status_event(ExecutionStatus::Completed)).await;

        match rx.recv().await.unwrap() {
            ExecutionEvent::StatusUpdate { status, .. } => {
                assert_eq!(status, ExecutionStatus::Running)
            }
            other => panic!("unexpected event: {other:?}"),
        }
        match rx.recv().await.unwrap() {
            ExecutionEvent::StatusUpdate { status, .. } => {
                assert_eq!(status, ExecutionStatus::Completed)
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn publish_without_observers_is_a_no_op() {
        let registry = ChannelRegistry::new();
        registry.publish(new_id(), status_event(ExecutionStatus::Running)).await;
    }

    #[tokio::test]
    async fn each_observer_gets_every_event() {
        let registry = ChannelRegistry::new();
        let id = new_id();
        let mut rx1 = registry.subscribe(id).await;
        let mut rx2 = registry.subscribe(id).await;

        registry.publish(id, status_event(ExecutionStatus::Running)).await;

        assert!(rx1.recv().await.is_ok());
        assert!(rx2.recv().await.is_ok());
    }

    #[tokio::test]
    async fn retire_removes_only_idle_channels() {
        let registry = ChannelRegistry::new();
        let id = new_id();
        let rx = registry.subscribe(id).await;

        assert!(!registry.retire_if_idle(id).await);
        assert_eq!(registry.channel_count().await, 1);

        drop(rx);
        assert!(registry.retire_if_idle(id).await);
        assert_eq!(registry.channel_count().await, 0);
    }

    #[tokio::test]
    async fn retire_succeeds_once_an_aborted_forwarder_is_awaited() {
        let registry = ChannelRegistry::new();
        let id = new_id();
        let rx = registry.subscribe(id).await;

        // A forwarding task owns the receiver until it is fully torn down.
        let task = tokio::spawn(async move {
            let mut rx = rx;
            loop {
                let _ = rx.recv().await;
            }
        });

        task.abort();
        let _ = task.await;
        assert!(registry.retire_if_idle(id).await);
        assert_eq!(registry.channel_count().await, 0);
    }

    #[tokio::test]
    async fn executions_are_isolated() {
        let registry = ChannelRegistry::new();
        let a = new_id();
        let b = new_id();
        let mut rx_a = registry.subscribe(a).await;
        let mut rx_b = registry.subscribe(b).await;

        registry.publish(a, status_event(ExecutionStatus::Running)).await;

        assert!(rx_a.recv().await.is_ok());
        assert!(rx_b.try_recv().is_err());
    }
}
