//! WebSocket Connection Handler
//!
//! Upgrades the HTTP request, resolves the connection's identity once,
//! registers presence, then pumps frames between the socket and the room
//! coordinator until the transport closes.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::startup::AppState;

use super::coordinator::Outbound;
use super::events::{ClientEvent, ServerEvent};

/// Connection query parameters. Browser WebSocket clients cannot set
/// headers, so the token may arrive as `?token=`.
#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    token: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    auth_header: Option<TypedHeader<Authorization<Bearer>>>,
    State(state): State<AppState>,
) -> Response {
    let token = params
        .token
        .or_else(|| auth_header.map(|TypedHeader(auth)| auth.token().to_string()));

    ws.max_message_size(state.settings.websocket.max_message_size)
        .max_frame_size(state.settings.websocket.max_frame_size)
        .on_upgrade(move |socket| handle_socket(socket, state, token))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState, token: Option<String>) {
    let conn_id = Uuid::new_v4();

    // Resolve identity once; a missing or bad credential downgrades the
    // connection to anonymous instead of refusing it.
    let identity = state.authenticator.authenticate(token.as_deref()).await;

    // Last connection wins the presence entry for this nickname. The
    // superseded connection is not notified.
    if let Some(identity) = &identity {
        if let Err(e) = state.presence.register(&identity.nickname, conn_id).await {
            tracing::warn!(
                connection_id = %conn_id,
                nickname = %identity.nickname,
                error = %e,
                "Presence registration failed"
            );
        }
    }

    tracing::debug!(connection_id = %conn_id, "New WebSocket connection");

    // Split socket for concurrent read/write
    let (mut sink, mut stream) = socket.split();

    // Channel for outgoing frames, drained by the writer task
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    state.coordinator.register(conn_id, identity, tx);

    // Forward frames from the channel to the socket
    let sender_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!("Failed to serialize frame: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Read loop: every parsed frame goes through the coordinator; a frame
    // that fails to parse earns a scoped error and nothing else.
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => state.coordinator.dispatch(conn_id, event).await,
                Err(e) => {
                    tracing::debug!(
                        connection_id = %conn_id,
                        error = %e,
                        "Unparseable event frame"
                    );
                    state.coordinator.deliver(vec![Outbound::ToConnection(
                        conn_id,
                        ServerEvent::error("Malformed event frame"),
                    )]);
                }
            },
            Ok(Message::Close(_)) => {
                tracing::debug!(connection_id = %conn_id, "Connection closed");
                break;
            }
            Ok(Message::Ping(_)) => {
                // Pong is handled automatically by axum
            }
            Err(e) => {
                tracing::debug!(connection_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    // Membership cleanup plus the guarded presence release
    state.coordinator.disconnect(conn_id).await;
    sender_task.abort();
}
