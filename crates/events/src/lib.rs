//! Conductor live update channel.
//!
//! Building blocks for streaming state-machine transitions to observers:
//!
//! - [`ExecutionEvent`] — the canonical typed event envelope.
//! - [`ChannelRegistry`] — per-execution publish/subscribe hubs backed by
//!   `tokio::sync::broadcast`.

pub mod channel;
pub mod event;

pub use channel::ChannelRegistry;
pub use event::ExecutionEvent;
