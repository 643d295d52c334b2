use std::sync::Arc;

use conductor_events::ChannelRegistry;
use conductor_pipeline::Orchestrator;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// The execution lifecycle owner; every control operation goes through it.
    pub orchestrator: Arc<Orchestrator>,
    /// Per-execution live update channels (WebSocket subscriptions).
    pub channels: Arc<ChannelRegistry>,
}
