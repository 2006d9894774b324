//! Live customer presence over a Socket.IO push connection
//!
//! [`PresenceFeed`] owns one connection bound to one auth token. It is the
//! only writer of the shared [`PresenceState`]; the rest of the program
//! reads it through cloned [`PresenceView`]s.
//!
//! Lifecycle:
//! - no token: disconnected, empty map
//! - token set: connect, join with `{role: "admin", token}`, then
//!   `presence:snapshot` replaces the map and `presence:update` upserts
//! - connection error or server disconnect: `is_connected` drops, map kept
//! - token changed/cleared or feed dropped: connection closed, map cleared
//!
//! No reconnect is scheduled; a new token (or the same one set again after
//! a teardown) is the only way back to Connected.

pub mod protocol;
pub mod state;
pub mod websocket;

use std::sync::Arc;

use anyhow::{bail, Result};
use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::models::{AdminUser, PresenceRecord};
use protocol::Packet;
use websocket::PresenceSocket;

pub use state::{PresenceLookup, PresenceState};

const SNAPSHOT_EVENT: &str = "presence:snapshot";
const UPDATE_EVENT: &str = "presence:update";

/// Owner of the presence connection for the current token.
pub struct PresenceFeed {
    ws_url: String,
    token: String,
    state: Arc<watch::Sender<PresenceState>>,
    shutdown: Option<CancellationToken>,
}

impl PresenceFeed {
    /// A disconnected feed for the API at `base_url`.
    pub fn new(base_url: &str) -> Self {
        let (tx, _rx) = watch::channel(PresenceState::default());
        Self {
            ws_url: protocol::socket_url(base_url),
            token: String::new(),
            state: Arc::new(tx),
            shutdown: None,
        }
    }

    /// Bind the feed to `token`.
    ///
    /// A different token tears the current connection down and opens a new
    /// one; a blank token just tears down. Must be called inside a tokio
    /// runtime.
    pub fn set_token(&mut self, token: &str) {
        let token = token.trim();
        if token == self.token && (self.shutdown.is_some() || token.is_empty()) {
            return;
        }
        self.teardown();
        self.token = token.to_string();
        if token.is_empty() {
            return;
        }

        let generation = self.state.borrow().generation();
        let shutdown = CancellationToken::new();
        self.shutdown = Some(shutdown.clone());

        tokio::spawn(run_connection(
            self.ws_url.clone(),
            self.token.clone(),
            Arc::clone(&self.state),
            generation,
            shutdown,
        ));
    }

    /// Close the connection and forget all presence data.
    pub fn teardown(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            tracing::debug!("Tearing down presence connection");
            shutdown.cancel();
        }
        self.token.clear();
        self.state.send_modify(|s| {
            s.reset();
        });
    }

    /// Read-only handle on the live state.
    pub fn view(&self) -> PresenceView {
        PresenceView {
            rx: self.state.subscribe(),
        }
    }
}

impl Drop for PresenceFeed {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Cloneable read accessor for presence.
#[derive(Clone)]
pub struct PresenceView {
    rx: watch::Receiver<PresenceState>,
}

impl PresenceView {
    /// Borrow the current state. Keep the guard short-lived: the feed
    /// cannot publish while it is held.
    pub fn state(&self) -> watch::Ref<'_, PresenceState> {
        self.rx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.rx.borrow().is_connected()
    }

    pub fn online_users_count(&self) -> usize {
        self.rx.borrow().online_users_count()
    }

    pub fn revision(&self) -> u64 {
        self.rx.borrow().revision()
    }

    /// Owned copy of the live record for `user`.
    pub fn lookup(&self, user: &AdminUser) -> Option<PresenceRecord> {
        self.rx.borrow().lookup(user).cloned()
    }

    /// Wait for the next change. Returns false once the feed is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Underlying receiver, for stream adapters.
    pub fn receiver(&self) -> watch::Receiver<PresenceState> {
        self.rx.clone()
    }
}

/// Apply `f` only if `generation` still owns the state.
fn publish(
    state: &watch::Sender<PresenceState>,
    generation: u64,
    f: impl FnOnce(&mut PresenceState),
) {
    state.send_if_modified(|s| {
        if s.generation() != generation {
            return false;
        }
        f(s);
        true
    });
}

/// Run one connection until it ends, then mark the feed disconnected.
async fn run_connection(
    ws_url: String,
    token: String,
    state: Arc<watch::Sender<PresenceState>>,
    generation: u64,
    shutdown: CancellationToken,
) {
    match connect_and_listen(&ws_url, &token, &state, generation, &shutdown).await {
        Ok(()) => tracing::info!("Presence feed closed"),
        Err(e) => tracing::warn!("Presence feed disconnected: {:#}", e),
    }
    publish(&state, generation, |s| s.on_disconnected());
}

async fn connect_and_listen(
    ws_url: &str,
    token: &str,
    state: &watch::Sender<PresenceState>,
    generation: u64,
    shutdown: &CancellationToken,
) -> Result<()> {
    let mut ws = tokio::select! {
        ws = PresenceSocket::connect(ws_url) => ws?,
        _ = shutdown.cancelled() => return Ok(()),
    };

    loop {
        let received = tokio::select! {
            frame = ws.recv_frame() => Some(frame?),
            _ = shutdown.cancelled() => None,
        };
        let Some(received) = received else {
            ws.close().await;
            return Ok(());
        };
        let Some(frame) = received else {
            return Ok(());
        };

        match protocol::decode(&frame) {
            Packet::Open => ws.send_text(&protocol::connect_packet(token)).await?,
            Packet::Ping => ws.send_text(protocol::PONG).await?,
            Packet::Connected => {
                tracing::info!("Presence feed connected");
                publish(state, generation, |s| s.on_connected());
            }
            Packet::ConnectError(message) => bail!("Presence connect rejected: {}", message),
            Packet::Disconnect | Packet::Close => {
                tracing::info!("Presence server ended the session");
                return Ok(());
            }
            Packet::Event { name, payload } => handle_event(&name, payload, state, generation),
            Packet::Pong | Packet::Other(_) => {
                tracing::debug!("Presence frame ignored: {}", frame);
            }
        }
    }
}

fn handle_event(
    name: &str,
    payload: Value,
    state: &watch::Sender<PresenceState>,
    generation: u64,
) {
    match name {
        SNAPSHOT_EVENT => {
            let users = parse_snapshot(payload);
            tracing::debug!("Presence snapshot: {} users", users.len());
            publish(state, generation, |s| s.apply_snapshot(users));
        }
        UPDATE_EVENT => match serde_json::from_value::<PresenceRecord>(payload) {
            Ok(record) if record.user_key.as_deref().is_some_and(|k| !k.is_empty()) => {
                publish(state, generation, |s| {
                    s.apply_update(record);
                });
            }
            Ok(_) => tracing::debug!("Presence update without user_key ignored"),
            Err(e) => tracing::debug!("Malformed presence update ignored: {}", e),
        },
        other => tracing::debug!("Unhandled presence event: {}", other),
    }
}

/// Records from a snapshot payload; a missing or non-array `users` is an empty set.
fn parse_snapshot(payload: Value) -> Vec<PresenceRecord> {
    let users = match payload {
        Value::Object(mut map) => match map.remove("users") {
            Some(Value::Array(users)) => users,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    users
        .into_iter()
        .filter_map(|u| serde_json::from_value(u).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{SinkExt, StreamExt};
    use serde_json::json;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio_tungstenite::tungstenite::Message;

    async fn wait_for(view: &mut PresenceView, what: &str, pred: impl Fn(&PresenceState) -> bool) {
        let reached = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if pred(&view.state()) {
                    return true;
                }
                if !view.changed().await {
                    return pred(&view.state());
                }
            }
        })
        .await;
        assert_eq!(reached, Ok(true), "condition not reached: {}", what);
    }

    #[test]
    fn test_parse_snapshot_tolerates_bad_payloads() {
        assert!(parse_snapshot(json!(null)).is_empty());
        assert!(parse_snapshot(json!({ "users": "nope" })).is_empty());
        let users = parse_snapshot(json!({
            "users": [
                { "user_key": "id:1", "is_online": true },
                "garbage",
                { "user_key": "id:2", "is_online": false, "last_seen_at": null }
            ]
        }));
        assert_eq!(users.len(), 2);
    }

    #[test]
    fn test_stale_generation_cannot_write() {
        let (tx, _rx) = watch::channel(PresenceState::default());
        let old = tx.borrow().generation();
        tx.send_modify(|s| {
            s.reset();
        });
        publish(&tx, old, |s| s.on_connected());
        assert!(!tx.borrow().is_connected());
    }

    #[test]
    fn test_view_wakes_only_on_current_generation() {
        let feed = PresenceFeed::new("http://127.0.0.1:9");
        let mut view = feed.view();
        let mut changed = tokio_test::task::spawn(view.changed());
        tokio_test::assert_pending!(changed.poll());

        let current = feed.state.borrow().generation();
        publish(&feed.state, current + 1, |s| s.on_connected());
        assert!(!changed.is_woken());
        tokio_test::assert_pending!(changed.poll());

        publish(&feed.state, current, |s| s.on_connected());
        assert!(changed.is_woken());
        tokio_test::assert_ready_eq!(changed.poll(), true);
    }

    #[test]
    fn test_dropping_feed_clears_outliving_views() {
        let feed = PresenceFeed::new("http://127.0.0.1:9");
        let view = feed.view();
        let current = feed.state.borrow().generation();
        publish(&feed.state, current, |s| {
            s.on_connected();
            s.apply_snapshot(vec![state::record("id:1", true, None)]);
        });
        assert!(view.is_connected());
        assert_eq!(view.state().len(), 1);

        drop(feed);
        assert!(!view.is_connected());
        assert!(view.state().is_empty());
    }

    #[tokio::test]
    async fn test_no_token_stays_disconnected() {
        let mut feed = PresenceFeed::new("http://127.0.0.1:9");
        feed.set_token("   ");
        let view = feed.view();
        assert!(!view.is_connected());
        assert_eq!(view.online_users_count(), 0);
    }

    #[tokio::test]
    async fn test_feed_lifecycle_against_socketio_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (close_tx, close_rx) = oneshot::channel::<()>();

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            let send = |s: &str| Message::Text(s.to_string());

            ws.send(send(r#"0{"sid":"e1","pingInterval":25000,"pingTimeout":20000}"#))
                .await
                .unwrap();
            let join = ws.next().await.unwrap().unwrap().into_text().unwrap();
            let auth: Value = serde_json::from_str(join.strip_prefix("40").unwrap()).unwrap();
            assert_eq!(auth, json!({ "role": "admin", "token": "tok-1" }));

            ws.send(send(r#"40{"sid":"s1"}"#)).await.unwrap();
            ws.send(send(
                r#"42["presence:snapshot",{"users":[{"user_key":"id:1","is_online":true}]}]"#,
            ))
            .await
            .unwrap();
            ws.send(send(r#"42["presence:update",{"user_key":"id:2","is_online":true}]"#))
                .await
                .unwrap();
            ws.send(send(r#"42["presence:update",{"is_online":true}]"#))
                .await
                .unwrap();

            ws.send(send("2")).await.unwrap();
            let pong = ws.next().await.unwrap().unwrap().into_text().unwrap();
            assert_eq!(pong, "3");

            ws.send(send(
                r#"42["presence:snapshot",{"users":[{"user_key":"id:1","is_online":false}]}]"#,
            ))
            .await
            .unwrap();

            let _ = close_rx.await;
            let _ = ws.close(None).await;
        });

        let mut feed = PresenceFeed::new(&format!("http://{}", addr));
        let mut view = feed.view();
        feed.set_token("tok-1");

        wait_for(&mut view, "two users online", |s| {
            s.is_connected() && s.online_users_count() == 2
        })
        .await;

        wait_for(&mut view, "second snapshot replaced map", |s| {
            s.len() == 1 && s.get("id:2").is_none()
        })
        .await;
        assert_eq!(view.online_users_count(), 0);
        let user = AdminUser {
            id: Some(1),
            ..Default::default()
        };
        assert_eq!(view.lookup(&user).map(|r| r.is_online), Some(false));

        close_tx.send(()).unwrap();
        wait_for(&mut view, "disconnected", |s| !s.is_connected()).await;
        // Stale data survives a disconnect.
        assert_eq!(view.state().len(), 1);

        feed.set_token("");
        assert!(!view.is_connected());
        assert!(view.state().is_empty());

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_error_marks_disconnected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            ws.send(Message::Text(r#"0{"sid":"e1"}"#.to_string()))
                .await
                .unwrap();
            let _join = ws.next().await;
            ws.send(Message::Text(r#"44{"message":"invalid token"}"#.to_string()))
                .await
                .unwrap();
            // Keep the socket open until the client hangs up.
            while let Some(Ok(_)) = ws.next().await {}
        });

        let mut feed = PresenceFeed::new(&format!("http://{}", addr));
        let mut view = feed.view();
        feed.set_token("bad");
        let start = view.revision();
        wait_for(&mut view, "rejection processed", |s| s.revision() > start).await;
        assert!(!view.is_connected());
        assert!(view.state().is_empty());

        drop(feed);
        let _ = tokio::time::timeout(Duration::from_secs(5), server).await;
    }
}
