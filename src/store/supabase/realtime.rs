//! Supabase Realtime change feed over the Phoenix channel protocol.
//!
//! One websocket per subscription. The channel joins
//! `realtime:<table>_changes` with a `postgres_changes` filter, keeps the
//! socket alive with heartbeats and reconnects after a fixed delay. Every
//! change event becomes a single "re-read" signal on the subscriber's
//! [`ChangeNotifier`]; after a reconnect one extra signal is sent so changes
//! missed while disconnected are picked up.
use futures::{SinkExt, StreamExt};
use reqwest::Url;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::store::auth::AuthState;
use crate::store::{ChangeNotifier, StoreError};

const HEARTBEAT_EVERY: Duration = Duration::from_secs(25);

pub fn websocket_url(base: &Url, anon_key: &str) -> Result<Url, StoreError> {
    let mut url = base
        .join("realtime/v1/websocket")
        .map_err(|e| StoreError::Realtime(e.to_string()))?;
    let scheme = match url.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => return Err(StoreError::Realtime(format!("unsupported scheme {other}"))),
    };
    url.set_scheme(scheme)
        .map_err(|_| StoreError::Realtime("cannot switch to websocket scheme".into()))?;
    url.query_pairs_mut()
        .append_pair("apikey", anon_key)
        .append_pair("vsn", "1.0.0");
    Ok(url)
}

pub fn topic(table: &str) -> String {
    format!("realtime:{table}_changes")
}

pub fn join_frame(table: &str, access_token: &str, msg_ref: u64) -> Value {
    json!({
        "topic": topic(table),
        "event": "phx_join",
        "payload": {
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": [
                    { "event": "*", "schema": "public", "table": table }
                ]
            },
            "access_token": access_token
        },
        "ref": msg_ref.to_string(),
        "join_ref": msg_ref.to_string()
    })
}

pub fn heartbeat_frame(msg_ref: u64) -> Value {
    json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": msg_ref.to_string()
    })
}

pub fn leave_frame(table: &str, msg_ref: u64) -> Value {
    json!({
        "topic": topic(table),
        "event": "phx_leave",
        "payload": {},
        "ref": msg_ref.to_string()
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Change,
    Joined,
    JoinFailed(String),
    Closed,
    Other,
}

/// Classify an inbound text frame for the channel of `table`.
pub fn parse_frame(table: &str, text: &str) -> Frame {
    let Ok(v) = serde_json::from_str::<Value>(text) else {
        return Frame::Other;
    };
    let on_channel = v.get("topic").and_then(Value::as_str) == Some(topic(table).as_str());
    match v.get("event").and_then(Value::as_str) {
        Some("postgres_changes") if on_channel => Frame::Change,
        Some("phx_reply") if on_channel => {
            let payload = &v["payload"];
            match payload.get("status").and_then(Value::as_str) {
                Some("ok") => Frame::Joined,
                _ => Frame::JoinFailed(payload["response"].to_string()),
            }
        }
        Some("phx_error") | Some("phx_close") if on_channel => Frame::Closed,
        _ => Frame::Other,
    }
}

enum Ended {
    Released,
    Disconnected,
}

/// A realtime listener for one table.
pub struct Channel {
    pub url: Url,
    pub table: &'static str,
    pub anon_key: String,
    pub auth: Arc<AuthState>,
    pub reconnect: Duration,
}

impl Channel {
    /// Run until the subscriber releases its handle.
    pub async fn run(self, notifier: ChangeNotifier) {
        let mut rejoining = false;
        loop {
            if notifier.is_released() {
                return;
            }
            match self.session(&notifier, rejoining).await {
                Ok(Ended::Released) => return,
                Ok(Ended::Disconnected) => {
                    info!(table = self.table, "realtime channel closed, reconnecting")
                }
                Err(e) => warn!(table = self.table, error = %e, "realtime channel failed"),
            }
            rejoining = true;
            tokio::select! {
                _ = notifier.released() => return,
                _ = tokio::time::sleep(self.reconnect) => {}
            }
        }
    }

    async fn session(
        &self,
        notifier: &ChangeNotifier,
        rejoining: bool,
    ) -> Result<Ended, StoreError> {
        let (ws, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| StoreError::Realtime(format!("connect failed: {e}")))?;
        let (mut sink, mut stream) = ws.split();
        let mut msg_ref = 1u64;

        let token = self.auth.bearer(&self.anon_key);
        send(&mut sink, join_frame(self.table, &token, msg_ref)).await?;

        let mut heartbeat = tokio::time::interval(HEARTBEAT_EVERY);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                _ = notifier.released() => {
                    msg_ref += 1;
                    let _ = send(&mut sink, leave_frame(self.table, msg_ref)).await;
                    let _ = sink.close().await;
                    debug!(table = self.table, "realtime subscription released");
                    return Ok(Ended::Released);
                }
                _ = heartbeat.tick() => {
                    msg_ref += 1;
                    send(&mut sink, heartbeat_frame(msg_ref)).await?;
                }
                msg = stream.next() => match msg {
                    None | Some(Ok(Message::Close(_))) => return Ok(Ended::Disconnected),
                    Some(Err(e)) => return Err(StoreError::Realtime(e.to_string())),
                    Some(Ok(Message::Text(text))) => match parse_frame(self.table, &text) {
                        Frame::Change => {
                            notifier.notify();
                        }
                        Frame::Joined => {
                            info!(table = self.table, "realtime channel joined");
                            if rejoining {
                                notifier.notify();
                            }
                        }
                        Frame::JoinFailed(reason) => {
                            return Err(StoreError::Realtime(format!("join rejected: {reason}")));
                        }
                        Frame::Closed => return Ok(Ended::Disconnected),
                        Frame::Other => {}
                    },
                    Some(Ok(_)) => {}
                },
            }
        }
    }
}

async fn send<S>(sink: &mut S, frame: Value) -> Result<(), StoreError>
where
    S: futures::Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    sink.send(Message::Text(frame.to_string()))
        .await
        .map_err(|e| StoreError::Realtime(e.to_string()))
}
