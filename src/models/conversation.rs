//! Conversation (chat session) models

use serde::{Deserialize, Serialize};

use super::{AdminMessage, AdminTicket, AdminUser};

/// Preview of the most recent message in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMessage {
    pub sender: String,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// One customer chat session as returned by the conversation listing.
///
/// `is_online` / `last_seen_at` are whatever the REST layer knew when the
/// page was built; live presence supersedes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub session_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub user: AdminUser,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default)]
    pub last_seen_at: Option<String>,
    #[serde(default)]
    pub message_count: u64,
    #[serde(default)]
    pub last_message: Option<LastMessage>,
}

/// A page of list results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
    pub items: Vec<T>,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 0,
            total: 0,
            total_pages: 0,
            items: Vec::new(),
        }
    }
}

/// Session header of a conversation thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadSession {
    pub session_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub user: AdminUser,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default)]
    pub last_seen_at: Option<String>,
    #[serde(default)]
    pub open_ticket_count: u32,
}

/// Full message thread for one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationThread {
    pub session: ThreadSession,
    #[serde(default)]
    pub messages: Vec<AdminMessage>,
    #[serde(default)]
    pub tickets: Vec<AdminTicket>,
}

/// Response to a rename.
#[derive(Debug, Clone, Deserialize)]
pub struct RenamedSession {
    pub session_id: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenameResponse {
    pub session: RenamedSession,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeletedConversation {
    pub deleted_session_id: i64,
    pub deleted_session_key: String,
}
