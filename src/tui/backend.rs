//! Async backend: runs admin API calls for the inbox event loop.
//!
//! The TUI sends `BackendCommand` values over an mpsc channel; each one is
//! executed on its own task and answered with a `BackendResponse`.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::api::conversations::{fetch_thread, list_conversations_until, reply, ConversationQuery};
use crate::api::stats::fetch_stats;
use crate::api::{AdminClient, ApiError};
use crate::models::{AdminMessage, AdminStats, ConversationSummary, ConversationThread, Page};

pub enum BackendCommand {
    LoadStats,
    LoadConversations(ConversationQuery),
    LoadThread { session_key: String },
    SendReply { session_key: String, content: String },
}

pub enum BackendResponse {
    Stats(Result<AdminStats, ApiError>),
    Conversations {
        /// Query that was sent; answers for any other query are stale.
        query: ConversationQuery,
        result: Result<Page<ConversationSummary>, ApiError>,
    },
    Thread {
        session_key: String,
        result: Result<ConversationThread, ApiError>,
    },
    ReplySent {
        session_key: String,
        result: Result<AdminMessage, ApiError>,
    },
}

/// Handle for interacting with the backend from the TUI side.
pub struct Backend {
    cmd_tx: mpsc::UnboundedSender<BackendCommand>,
    resp_rx: mpsc::UnboundedReceiver<BackendResponse>,
}

impl Backend {
    /// Spawn the backend loop. Must be called inside a tokio runtime.
    pub fn start(client: AdminClient, token: String) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (resp_tx, resp_rx) = mpsc::unbounded_channel();

        tokio::spawn(backend_loop(Arc::new(client), Arc::from(token), cmd_rx, resp_tx));

        Self { cmd_tx, resp_rx }
    }

    pub fn send(&self, cmd: BackendCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            tracing::error!("Backend channel closed -- command dropped");
        }
    }

    /// Next response; `None` once the backend is gone.
    pub async fn recv(&mut self) -> Option<BackendResponse> {
        self.resp_rx.recv().await
    }
}

async fn backend_loop(
    client: Arc<AdminClient>,
    token: Arc<str>,
    mut cmd_rx: mpsc::UnboundedReceiver<BackendCommand>,
    resp_tx: mpsc::UnboundedSender<BackendResponse>,
) {
    let mut listing = CancellationToken::new();
    while let Some(cmd) = cmd_rx.recv().await {
        // A newer listing supersedes the one in flight.
        if matches!(cmd, BackendCommand::LoadConversations(_)) {
            listing.cancel();
            listing = CancellationToken::new();
        }
        let cancel = listing.clone();
        let client = Arc::clone(&client);
        let token = Arc::clone(&token);
        let resp_tx = resp_tx.clone();

        tokio::spawn(async move {
            let response = match cmd {
                BackendCommand::LoadStats => {
                    BackendResponse::Stats(fetch_stats(&client, &token).await)
                }
                BackendCommand::LoadConversations(query) => {
                    let result = list_conversations_until(&client, &token, &query, cancel).await;
                    BackendResponse::Conversations { query, result }
                }
                BackendCommand::LoadThread { session_key } => {
                    let result = fetch_thread(&client, &token, &session_key).await;
                    BackendResponse::Thread {
                        session_key,
                        result,
                    }
                }
                BackendCommand::SendReply {
                    session_key,
                    content,
                } => {
                    let result = reply(&client, &token, &session_key, &content).await;
                    BackendResponse::ReplySent {
                        session_key,
                        result,
                    }
                }
            };
            let _ = resp_tx.send(response);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_commands_round_trip_through_backend() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/admin/stats")
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"online_users_current":3}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/api/admin/conversations/chat-one/messages")
            .with_status(401)
            .create_async()
            .await;

        let client = AdminClient::with_timeout(&server.url(), Duration::from_secs(5));
        let mut backend = Backend::start(client, "tok".to_string());

        backend.send(BackendCommand::LoadStats);
        match backend.recv().await {
            Some(BackendResponse::Stats(Ok(stats))) => assert_eq!(stats.online_users_current, 3),
            _ => panic!("expected stats"),
        }

        backend.send(BackendCommand::LoadThread {
            session_key: "chat-one".into(),
        });
        match backend.recv().await {
            Some(BackendResponse::Thread {
                session_key,
                result,
            }) => {
                assert_eq!(session_key, "chat-one");
                assert_eq!(result.unwrap_err(), ApiError::Unauthorized);
            }
            _ => panic!("expected thread"),
        }
    }

    #[tokio::test]
    async fn test_newer_listing_cancels_the_one_in_flight() {
        // Accepts connections and never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let client = AdminClient::with_timeout(&format!("http://{}", addr), Duration::from_secs(30));
        let mut backend = Backend::start(client, "tok".to_string());

        let first = ConversationQuery {
            page: 1,
            limit: 20,
            ..Default::default()
        };
        let second = ConversationQuery {
            q: "refund".into(),
            ..first.clone()
        };
        backend.send(BackendCommand::LoadConversations(first.clone()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        backend.send(BackendCommand::LoadConversations(second));

        let response = tokio::time::timeout(Duration::from_secs(5), backend.recv())
            .await
            .unwrap();
        match response {
            Some(BackendResponse::Conversations { query, result }) => {
                assert_eq!(query, first);
                assert_eq!(result.unwrap_err(), ApiError::Cancelled);
            }
            _ => panic!("expected the first listing to be cancelled"),
        }
    }
}
