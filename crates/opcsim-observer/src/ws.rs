//! `WebSocket` handler for real-time value streaming.
//!
//! Clients connect to `GET /ws/values` and receive an `update_values`
//! event each time the broadcaster publishes a snapshot. The handler
//! uses a [`broadcast::Receiver`] so all connected clients see the same
//! stream. The receiver outlives server restarts, so a client connected
//! while the server is stopped starts receiving as soon as it starts.
//!
//! If a client falls behind, lagged messages are silently skipped and
//! the client resumes from the most recent snapshot.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use opcsim_types::{CurrentValue, ValuesUpdate};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::state::AppState;

/// Event name carried by every pushed message.
pub const UPDATE_EVENT: &str = "update_values";

/// JSON frame pushed to `WebSocket` clients.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ValuesEvent {
    /// Always [`UPDATE_EVENT`].
    pub event: &'static str,
    /// Broadcast sequence number.
    pub sequence: u64,
    /// Current values keyed by variable name.
    pub data: BTreeMap<String, CurrentValue>,
}

impl From<ValuesUpdate> for ValuesEvent {
    fn from(update: ValuesUpdate) -> Self {
        Self {
            event: UPDATE_EVENT,
            sequence: update.sequence,
            data: update.values,
        }
    }
}

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming value snapshots.
///
/// # Route
///
/// `GET /ws/values`
pub async fn ws_values(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Subscribe to the broadcast channel and forward each snapshot as a
/// text frame until the client leaves.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    debug!("WebSocket client connected");

    let mut rx = state.subscribe();

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(update) => {
                        let json = match serde_json::to_string(&ValuesEvent::from(update)) {
                            Ok(j) => j,
                            Err(e) => {
                                warn!("Failed to serialize values update: {e}");
                                continue;
                            }
                        };
                        if socket.send(Message::Text(json.into())).await.is_err() {
                            debug!("WebSocket client disconnected (send failed)");
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        debug!(skipped = n, "WebSocket client lagged, skipping ahead");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Broadcast channel closed, shutting down WebSocket");
                        return;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("WebSocket client disconnected");
                        return;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!("WebSocket client disconnected (pong failed)");
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error: {e}");
                        return;
                    }
                    // Text or binary frames from the client carry no commands.
                    _ => {}
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use opcsim_types::{TagValue, VariableConfig, VariableKind};

    use super::*;

    #[test]
    fn event_frame_shape() {
        let mut values = BTreeMap::new();
        values.insert(
            String::from("Status"),
            CurrentValue {
                value: TagValue::from("Active"),
                kind: VariableKind::Text,
                config: VariableConfig::text("Active"),
            },
        );
        let event = ValuesEvent::from(ValuesUpdate {
            sequence: 4,
            timestamp: Utc::now(),
            values,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "update_values");
        assert_eq!(json["sequence"], 4);
        assert_eq!(json["data"]["Status"]["value"], "Active");
        assert_eq!(json["data"]["Status"]["type"], "String");
    }
}
