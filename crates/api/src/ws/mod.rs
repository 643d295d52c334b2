//! Per-execution WebSocket endpoint.
//!
//! Observers connect to `/api/v1/ws/{execution_id}` and receive a full
//! `init` snapshot followed by the live [`ExecutionEvent`] stream for that
//! execution. There is no replay buffer: a lagged observer is disconnected
//! and reconnects for a fresh snapshot.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;

use conductor_core::types::EntityId;
use conductor_events::ExecutionEvent;

use crate::state::AppState;

/// Messages observers may send over the socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    /// Resolve the execution's pending approval request.
    Approve { approved: bool },
}

/// GET /api/v1/ws/{execution_id}
///
/// Upgrades the connection and attaches it to the execution's update channel.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(execution_id): Path<EntityId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, execution_id, state))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Sends the `init` snapshot (execution state + pending approval).
///   2. Spawns a sender task draining an outbound channel into the sink.
///   3. Spawns a forward task copying broadcast events into that channel.
///   4. Processes inbound messages on the current task.
///   5. Cleans up on disconnect, retiring the channel if unobserved.
async fn handle_socket(socket: WebSocket, execution_id: EntityId, state: AppState) {
    tracing::info!(execution_id = %execution_id, "WebSocket connected");

    // Subscribe before snapshotting so no event between the two is lost;
    // at worst the observer sees an event already reflected in the snapshot.
    let mut events = state.channels.subscribe(execution_id).await;

    let execution = match state.orchestrator.get_execution(execution_id).await {
        Ok(execution) => execution,
        Err(e) => {
            tracing::debug!(execution_id = %execution_id, error = %e, "WebSocket rejected");
            // Release our receiver first, or the channel can never retire.
            drop(events);
            let mut socket = socket;
            let _ = socket
                .send(Message::Text(
                    json!({"type": "error", "error": e.to_string()}).to_string().into(),
                ))
                .await;
            let _ = socket.close().await;
            state.channels.retire_if_idle(execution_id).await;
            return;
        }
    };

    let pending = state.orchestrator.pending_approval(execution_id).await;
    let init = json!({
        "type": "init",
        "execution": execution,
        "pending_approval": pending.map(|p| json!({
            "message": p.message,
            "timeout_secs": p.timeout_secs,
            "remaining_secs": p.remaining_secs,
        })),
    });

    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    if tx.send(init.to_string()).is_err() {
        return;
    }

    // Sender task: drain the outbound channel into the sink.
    let send_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Forward task: serialize broadcast events onto the outbound channel.
    let forward_tx = tx.clone();
    let forward_task = tokio::spawn(async move {
        loop {
            let event: ExecutionEvent = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        execution_id = %execution_id,
                        skipped,
                        "Observer lagged behind event stream, disconnecting",
                    );
                    break;
                }
                Err(RecvError::Closed) => break,
            };
            match serde_json::to_string(&event) {
                Ok(text) => {
                    if forward_tx.send(text).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(execution_id = %execution_id, error = %e, "Event serialization failed");
                }
            }
        }
    });

    // Receiver loop: process inbound messages.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Text(text)) => {
                handle_client_message(&state, execution_id, text.as_str(), &tx).await;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(execution_id = %execution_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    send_task.abort();
    forward_task.abort();
    drop(tx);
    // Wait for the forward task to actually finish; it holds the broadcast
    // receiver, and retiring only works once that receiver is gone.
    let _ = send_task.await;
    let _ = forward_task.await;
    state.channels.retire_if_idle(execution_id).await;
    tracing::info!(execution_id = %execution_id, "WebSocket disconnected");
}

/// Dispatch one inbound text frame. Failures are reported back on the socket
/// instead of tearing the connection down.
async fn handle_client_message(
    state: &AppState,
    execution_id: EntityId,
    text: &str,
    tx: &mpsc::UnboundedSender<String>,
) {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            let _ = tx.send(json!({"type": "error", "error": format!("invalid message: {e}")}).to_string());
            return;
        }
    };

    match message {
        ClientMessage::Approve { approved } => {
            if let Err(e) = state.orchestrator.approve(execution_id, approved, "ws").await {
                let _ = tx.send(json!({"type": "error", "error": e.to_string()}).to_string());
            }
        }
    }
}
