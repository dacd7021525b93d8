// src/services/push.rs
//! Server push over Socket.IO (Engine.IO v4, WebSocket transport only).
//! The channel is informational: events are logged and optionally forwarded
//! to an observer, and nothing here touches controller state.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use reqwest::{
    Url,
    cookie::{CookieStore, Jar},
};
use serde_json::Value;
use tokio::{sync::mpsc::UnboundedSender, task::JoinHandle};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        Message as WsMessage, client::IntoClientRequest, handshake::client::Request, http::header,
    },
};
use tracing::{debug, info, warn};

use crate::error::ClientResult;

/// One decoded Engine.IO frame, with Socket.IO messages unpacked.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open { sid: Option<String>, ping_interval_ms: Option<u64> },
    Close,
    Ping(String),
    Pong(String),
    Noop,
    Connect,
    Disconnect,
    Event { name: String, args: Vec<Value> },
    ConnectError(String),
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    Connected,
    Status { msg: String },
    Event { name: String, args: Vec<Value> },
    Disconnected,
    ConnectError(String),
}

pub fn decode_packet(raw: &str) -> Packet {
    let mut chars = raw.chars();
    let Some(kind) = chars.next() else {
        return Packet::Unknown(String::new());
    };
    let rest = chars.as_str();

    match kind {
        '0' => {
            let handshake: Value = serde_json::from_str(rest).unwrap_or(Value::Null);
            Packet::Open {
                sid: handshake.get("sid").and_then(Value::as_str).map(str::to_string),
                ping_interval_ms: handshake.get("pingInterval").and_then(Value::as_u64),
            }
        }
        '1' => Packet::Close,
        '2' => Packet::Ping(rest.to_string()),
        '3' => Packet::Pong(rest.to_string()),
        '4' => decode_socket_message(rest),
        '6' => Packet::Noop,
        _ => Packet::Unknown(raw.to_string()),
    }
}

fn decode_socket_message(raw: &str) -> Packet {
    let mut chars = raw.chars();
    let Some(kind) = chars.next() else {
        return Packet::Unknown(raw.to_string());
    };
    let payload = strip_namespace_and_ack(chars.as_str());

    match kind {
        '0' => Packet::Connect,
        '1' => Packet::Disconnect,
        '2' => match serde_json::from_str::<Vec<Value>>(payload) {
            Ok(mut items) if !items.is_empty() => match items.remove(0) {
                Value::String(name) => Packet::Event { name, args: items },
                _ => Packet::Unknown(raw.to_string()),
            },
            _ => Packet::Unknown(raw.to_string()),
        },
        '4' => {
            let detail: Value = serde_json::from_str(payload).unwrap_or(Value::Null);
            let message = detail
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| payload.to_string());
            Packet::ConnectError(message)
        }
        _ => Packet::Unknown(raw.to_string()),
    }
}

// "/chat,12[...]" -> "[...]"
fn strip_namespace_and_ack(raw: &str) -> &str {
    let after_ns = if raw.starts_with('/') {
        raw.find(',').map(|i| &raw[i + 1..]).unwrap_or("")
    } else {
        raw
    };
    after_ns.trim_start_matches(|c: char| c.is_ascii_digit())
}

/// Handle to the background push task. Dropping it leaves the task running;
/// call [`PushHandle::close`] to tear it down.
#[derive(Debug)]
pub struct PushHandle {
    task: JoinHandle<()>,
}

impl PushHandle {
    pub fn close(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Where and as whom to connect. The server only greets signed-in sockets,
/// so the handshake carries the login cookie when a jar is attached.
#[derive(Debug, Clone)]
pub struct PushChannel {
    url: Url,
    cookies: Option<(Arc<Jar>, Url)>,
}

impl PushChannel {
    pub fn new(url: Url) -> Self {
        Self { url, cookies: None }
    }

    /// Send the cookies `jar` holds for `origin` (the HTTP base address).
    /// They are read when the socket connects, not when this is built.
    pub fn with_cookies(mut self, jar: Arc<Jar>, origin: Url) -> Self {
        self.cookies = Some((jar, origin));
        self
    }

    /// Anonymous channel on a background task.
    pub fn spawn(url: Url, observer: Option<UnboundedSender<PushEvent>>) -> PushHandle {
        Self::new(url).open(observer)
    }

    /// Open the channel on a background task. No reconnection is attempted
    /// once it ends.
    pub fn open(self, observer: Option<UnboundedSender<PushEvent>>) -> PushHandle {
        let task = tokio::spawn(async move {
            match self.run(observer.as_ref()).await {
                Ok(()) => info!("push channel closed"),
                Err(e) => warn!(error = %e, "push channel stopped"),
            }
        });
        PushHandle { task }
    }

    async fn run(&self, observer: Option<&UnboundedSender<PushEvent>>) -> ClientResult<()> {
        let mut request = self.url.as_str().into_client_request()?;
        if let Some(cookie) = self.cookies.as_ref().and_then(|(jar, origin)| jar.cookies(origin)) {
            request.headers_mut().insert(header::COOKIE, cookie);
        }
        run_channel(request, &self.url, observer).await
    }
}

async fn run_channel(
    request: Request,
    url: &Url,
    observer: Option<&UnboundedSender<PushEvent>>,
) -> ClientResult<()> {
    let emit = |event: PushEvent| {
        if let Some(tx) = observer {
            let _ = tx.send(event);
        }
    };

    let authenticated = request.headers().contains_key(header::COOKIE);
    let (stream, _) = connect_async(request).await?;
    debug!(%url, authenticated, "push socket open");
    let (mut write, mut read) = stream.split();

    while let Some(frame) = read.next().await {
        let text = match frame? {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => break,
            _ => continue,
        };

        match decode_packet(&text) {
            Packet::Open { sid, ping_interval_ms } => {
                debug!(?sid, ?ping_interval_ms, "engine.io handshake");
                write.send(WsMessage::Text("40".into())).await?;
            }
            Packet::Ping(probe) => {
                write.send(WsMessage::Text(format!("3{probe}"))).await?;
            }
            Packet::Connect => {
                info!("push channel connected");
                emit(PushEvent::Connected);
            }
            Packet::Event { name, args } if name == "status" => {
                let msg = args
                    .first()
                    .and_then(|v| v.get("msg"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                info!(%msg, "status update");
                emit(PushEvent::Status { msg });
            }
            Packet::Event { name, args } => {
                debug!(%name, "unhandled push event");
                emit(PushEvent::Event { name, args });
            }
            Packet::ConnectError(message) => {
                warn!(%message, "push namespace refused");
                emit(PushEvent::ConnectError(message));
                break;
            }
            Packet::Disconnect | Packet::Close => {
                emit(PushEvent::Disconnected);
                break;
            }
            Packet::Pong(_) | Packet::Noop => {}
            Packet::Unknown(raw) => debug!(%raw, "ignored push frame"),
        }
    }

    Ok(())
}
