//! GET /query upgrade: `deviceUpdated` over the graphql-transport-ws sub-protocol.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use devicedash::graphql::{self, ErrorExtensions, GraphqlError, GraphqlResponse, UNAUTHENTICATED};
use devicedash::types::Device;
use devicedash::ws::{ClientMessage, ServerMessage, SUBPROTOCOL};
use futures_util::stream::StreamExt;
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

use crate::state::AppState;

use std::sync::atomic::Ordering;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.protocols([SUBPROTOCOL])
        .on_upgrade(move |socket| handle_socket(socket, state))
}

/// Token from a `connection_init` payload (`{"Authorization": "Bearer ..."}`).
pub fn init_token(payload: Option<&Value>) -> Option<&str> {
    payload?
        .get("Authorization")?
        .as_str()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

fn unauthenticated(id: String) -> ServerMessage {
    ServerMessage::Error {
        id,
        payload: vec![GraphqlError {
            message: "authentication required".into(),
            extensions: Some(ErrorExtensions {
                code: Some(UNAUTHENTICATED.into()),
            }),
        }],
    }
}

fn next_frame(id: &str, device: Device) -> ServerMessage {
    ServerMessage::Next {
        id: id.to_string(),
        payload: GraphqlResponse {
            data: Some(json!({ "deviceUpdated": device })),
            errors: vec![],
        },
    }
}

async fn send(socket: &mut WebSocket, msg: &ServerMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(js) => socket.send(Message::Text(js)).await.is_ok(),
        Err(_) => false,
    }
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    state.client_count.fetch_add(1, Ordering::Relaxed);

    // Ensure we decrement on disconnect (drop).
    struct ClientGuard(AppState);
    impl Drop for ClientGuard {
        fn drop(&mut self) {
            self.0.client_count.fetch_sub(1, Ordering::Relaxed);
        }
    }
    let _guard = ClientGuard(state.clone());

    // The first frame must be connection_init.
    let authed = match socket.next().await {
        Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::ConnectionInit { payload }) => {
                let store = state.store.read().await;
                init_token(payload.as_ref())
                    .and_then(|t| store.user_for_token(t))
                    .is_some()
            }
            _ => return,
        },
        _ => return,
    };
    if !send(&mut socket, &ServerMessage::ConnectionAck { payload: None }).await {
        return;
    }
    debug!(authed, "subscription socket acknowledged");

    let mut updates = state.updates.subscribe();
    let mut active: Option<String> = None;
    loop {
        tokio::select! {
            incoming = socket.next() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => continue,
                };
                let reply = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Subscribe { id, .. }) if !authed => Some(unauthenticated(id)),
                    Ok(ClientMessage::Subscribe { id, payload }) => {
                        if payload.operation_name == graphql::DEVICE_UPDATED.name {
                            info!(%id, "deviceUpdated subscribed");
                            active = Some(id);
                            None
                        } else {
                            Some(ServerMessage::Error {
                                id,
                                payload: vec![GraphqlError {
                                    message: format!("unknown subscription '{}'", payload.operation_name),
                                    extensions: None,
                                }],
                            })
                        }
                    }
                    Ok(ClientMessage::Complete { id }) => {
                        if active.as_deref() == Some(id.as_str()) {
                            active = None;
                        }
                        None
                    }
                    Ok(ClientMessage::Ping {}) => Some(ServerMessage::Pong { payload: None }),
                    Ok(_) | Err(_) => None,
                };
                if let Some(reply) = reply {
                    if !send(&mut socket, &reply).await {
                        break;
                    }
                }
            }
            update = updates.recv() => match update {
                Ok(device) => {
                    if let Some(id) = active.as_deref() {
                        if !send(&mut socket, &next_frame(id, device)).await {
                            break;
                        }
                    }
                }
                Err(RecvError::Lagged(n)) => debug!(skipped = n, "subscriber lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }
}
