//! WebSocket client for the `deviceUpdated` subscription (graphql-transport-ws).

use std::path::Path;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};
use url::Url;

use crate::error::ApiError;
use crate::graphql::{self, GraphqlError, GraphqlRequest, GraphqlResponse};
use crate::types::Device;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const SUBPROTOCOL: &str = "graphql-transport-ws";
const SUBSCRIPTION_ID: &str = "device-updated";

/// Client → server frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    ConnectionInit {
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    Subscribe {
        id: String,
        payload: GraphqlRequest,
    },
    Complete {
        id: String,
    },
    Ping {},
    Pong {},
}

/// Server → client frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    ConnectionAck {
        #[serde(default)]
        payload: Option<Value>,
    },
    Next {
        id: String,
        payload: GraphqlResponse,
    },
    Error {
        id: String,
        payload: Vec<GraphqlError>,
    },
    Complete {
        id: String,
    },
    Ping {
        #[serde(default)]
        payload: Option<Value>,
    },
    Pong {
        #[serde(default)]
        payload: Option<Value>,
    },
}

impl ClientMessage {
    fn to_frame(&self) -> Result<Message, ApiError> {
        Ok(Message::Text(serde_json::to_string(self)?))
    }
}

pub fn init_message(token: Option<&str>) -> ClientMessage {
    ClientMessage::ConnectionInit {
        payload: token.map(|t| json!({ "Authorization": format!("Bearer {t}") })),
    }
}

pub fn subscribe_message() -> ClientMessage {
    ClientMessage::Subscribe {
        id: SUBSCRIPTION_ID.to_string(),
        payload: GraphqlRequest::new(&graphql::DEVICE_UPDATED, json!({})),
    }
}

/// What a single server frame means for the subscription.
#[derive(Debug, PartialEq)]
pub enum Frame {
    Update(Box<Device>),
    Ping,
    Ignore,
    Done,
}

pub fn interpret(msg: ServerMessage) -> Result<Frame, ApiError> {
    match msg {
        ServerMessage::Next { mut payload, .. } => {
            if let Some(err) = payload.error() {
                return Err(err);
            }
            let v = payload.take_field(graphql::DEVICE_UPDATED.field);
            if v.is_null() {
                return Ok(Frame::Ignore);
            }
            Ok(Frame::Update(Box::new(serde_json::from_value(v)?)))
        }
        ServerMessage::Error { payload, .. } => Err(GraphqlResponse {
            data: None,
            errors: payload,
        }
        .error()
        .unwrap_or_else(|| ApiError::Subscription("subscription rejected".into()))),
        ServerMessage::Complete { .. } => Ok(Frame::Done),
        ServerMessage::Ping { .. } => Ok(Frame::Ping),
        ServerMessage::ConnectionAck { .. } | ServerMessage::Pong { .. } => Ok(Frame::Ignore),
    }
}

/// Open the socket with the graphql-transport-ws sub-protocol, trusting `tls_ca` if given.
pub async fn connect(url: &Url, tls_ca: Option<&Path>) -> Result<WsStream, ApiError> {
    let mut req = url.as_str().into_client_request()?;
    req.headers_mut()
        .insert("Sec-WebSocket-Protocol", HeaderValue::from_static(SUBPROTOCOL));
    let connector = match tls_ca {
        Some(ca) => Some(Connector::Rustls(crate::tls::rustls_config(ca)?)),
        None => None,
    };
    let (ws, _) = connect_async_tls_with_config(req, None, false, connector).await?;
    Ok(ws)
}

async fn next_message(ws: &mut WsStream) -> Result<Option<ServerMessage>, ApiError> {
    while let Some(msg) = ws.next().await {
        match msg? {
            Message::Text(txt) => return Ok(Some(serde_json::from_str(&txt)?)),
            Message::Close(_) => return Ok(None),
            _ => continue,
        }
    }
    Ok(None)
}

/// Run the subscription until the server completes it, the socket closes, or
/// the receiver goes away. Updates are forwarded to `tx`.
pub async fn run_device_updates(
    url: &Url,
    tls_ca: Option<&Path>,
    token: Option<&str>,
    tx: mpsc::Sender<Device>,
) -> Result<(), ApiError> {
    let mut ws = connect(url, tls_ca).await?;
    ws.send(init_message(token).to_frame()?).await?;

    match next_message(&mut ws).await? {
        Some(ServerMessage::ConnectionAck { .. }) => {}
        Some(other) => {
            return Err(ApiError::Subscription(format!(
                "expected connection_ack, got {other:?}"
            )))
        }
        None => return Err(ApiError::Subscription("closed before ack".into())),
    }
    ws.send(subscribe_message().to_frame()?).await?;
    info!(%url, "subscribed to device updates");

    while let Some(msg) = next_message(&mut ws).await? {
        match interpret(msg)? {
            Frame::Update(device) => {
                debug!(id = %device.id, "device update");
                if tx.send(*device).await.is_err() {
                    let _ = ws
                        .send(
                            ClientMessage::Complete {
                                id: SUBSCRIPTION_ID.into(),
                            }
                            .to_frame()?,
                        )
                        .await;
                    break;
                }
            }
            Frame::Ping => ws.send(ClientMessage::Pong {}.to_frame()?).await?,
            Frame::Ignore => {}
            Frame::Done => break,
        }
    }
    let _ = ws.close(None).await;
    Ok(())
}
