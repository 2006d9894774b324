//! CLI command handlers (print to stdout)

pub mod conversations;
pub mod presence;
pub mod tickets;

use std::time::Duration;

use anyhow::{bail, Result};
use chrono::{DateTime, Local};

use crate::api::{AdminClient, ApiError};
use crate::auth::{handle_auth_failure, FileStorage, SessionStore};
use crate::config::Config;
use crate::presence::{PresenceFeed, PresenceView};
use crate::views::ResolvedPresence;

/// How long `--live` waits for the first presence snapshot.
pub const LIVE_WAIT: Duration = Duration::from_secs(3);

/// Logged-in context shared by every authenticated command.
pub struct AdminSession {
    pub config: Config,
    pub client: AdminClient,
    store: SessionStore<FileStorage>,
    token: String,
}

impl AdminSession {
    pub fn open(config: &Config) -> Result<Self> {
        let store = SessionStore::open()?;
        let token = store.get();
        if token.is_empty() {
            bail!("Not logged in. Run 'support-console login' first.");
        }
        Ok(Self {
            config: config.clone(),
            client: AdminClient::new(config)?,
            store,
            token,
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Attach context to an API failure, logging out on 401.
    pub fn check<T>(&mut self, result: Result<T, ApiError>, what: &'static str) -> Result<T> {
        result.map_err(|e| {
            let err = anyhow::Error::from(e).context(what);
            if handle_auth_failure(&err, &mut self.store) {
                self.token.clear();
            }
            err
        })
    }

    /// Start a presence feed for this session and wait briefly for data.
    pub async fn live_presence(&self) -> (PresenceFeed, PresenceView) {
        let mut feed = PresenceFeed::new(&self.config.api_base_url);
        feed.set_token(&self.token);
        let mut view = feed.view();
        if !wait_for_snapshot(&mut view, LIVE_WAIT).await {
            eprintln!("Live presence unavailable; showing last known status.");
        }
        (feed, view)
    }
}

/// Wait until the feed is connected and has delivered its first snapshot.
///
/// Returns false on timeout or once the connection has ended.
pub async fn wait_for_snapshot(view: &mut PresenceView, wait: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        {
            let state = view.state();
            if state.is_connected() && state.has_snapshot() {
                return true;
            }
            if state.has_ended() {
                return false;
            }
        }
        match tokio::time::timeout_at(deadline, view.changed()).await {
            Ok(true) => {}
            Ok(false) | Err(_) => return false,
        }
    }
}

/// Local wall-clock rendering of an RFC 3339 timestamp; unparseable input is shown as-is.
pub fn format_time(value: &str) -> String {
    match DateTime::parse_from_rfc3339(value.trim()) {
        Ok(t) => t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
        Err(_) => value.to_string(),
    }
}

pub fn presence_label(presence: &ResolvedPresence) -> String {
    if presence.is_online {
        return "online".to_string();
    }
    match presence.last_seen_at.as_deref() {
        Some(t) => format!("offline, last seen {}", format_time(t)),
        None => "offline".to_string(),
    }
}

/// Cut `text` to at most `max` characters, marking the cut with "...".
pub fn truncate(text: &str, max: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_label() {
        let online = ResolvedPresence {
            is_online: true,
            last_seen_at: Some("2024-01-01T00:00:00Z".into()),
        };
        assert_eq!(presence_label(&online), "online");
        assert_eq!(presence_label(&ResolvedPresence::default()), "offline");
        let seen = ResolvedPresence {
            is_online: false,
            last_seen_at: Some("yesterday".into()),
        };
        assert_eq!(presence_label(&seen), "offline, last seen yesterday");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("  short ", 10), "short");
        assert_eq!(truncate("abcdefghijk", 8), "abcde...");
        assert_eq!(truncate("ééééé", 4), "é...");
    }

    /// One-connection Socket.IO server: open, read the join, then send `frames`.
    async fn presence_server(frames: &'static [&'static str]) -> String {
        use futures::{SinkExt, StreamExt};
        use tokio_tungstenite::tungstenite::Message;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            ws.send(Message::Text(r#"0{"sid":"e1"}"#.to_string()))
                .await
                .unwrap();
            let _join = ws.next().await;
            for frame in frames {
                ws.send(Message::Text(frame.to_string())).await.unwrap();
            }
            // Keep the socket open until the client leaves.
            while let Some(Ok(_)) = ws.next().await {}
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_wait_for_snapshot_accepts_empty_snapshot_seen_earlier() {
        let base = presence_server(&[r#"40{"sid":"s1"}"#, r#"42["presence:snapshot",{"users":[]}]"#]).await;
        let mut feed = PresenceFeed::new(&base);
        feed.set_token("tok");
        let mut view = feed.view();

        // Let the empty snapshot land before anyone waits.
        tokio::time::timeout(Duration::from_secs(5), async {
            while !view.state().has_snapshot() {
                view.changed().await;
            }
        })
        .await
        .unwrap();
        assert!(view.state().is_empty());

        assert!(wait_for_snapshot(&mut view, Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn test_wait_for_snapshot_gives_up_when_connect_is_rejected() {
        let base = presence_server(&[r#"44{"message":"invalid token"}"#]).await;
        let mut feed = PresenceFeed::new(&base);
        feed.set_token("tok");
        let mut view = feed.view();

        let started = tokio::time::Instant::now();
        assert!(!wait_for_snapshot(&mut view, Duration::from_secs(10)).await);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(view.state().has_ended());
    }

    #[tokio::test]
    async fn test_wait_for_snapshot_times_out_without_feed() {
        let feed = PresenceFeed::new("http://127.0.0.1:9");
        let mut view = feed.view();
        assert!(!wait_for_snapshot(&mut view, Duration::from_millis(50)).await);
    }
}
