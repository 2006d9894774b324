//! Conversation listing, threads and message mutations

use reqwest::Method;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::client::{param, AdminClient};
use super::RequestOptions;
use super::error::ApiError;
use super::segment_path;
use crate::models::{
    AdminMessage, ConversationSummary, ConversationThread, DeletedConversation, DeletedMessage,
    MessageMutation, Page, RenameResponse, RenamedSession,
};

/// Longest title the backend accepts.
pub const MAX_TITLE_LEN: usize = 120;

/// Sender recorded for replies written from the console.
const REPLY_SENDER: &str = "assistant";

/// Filters for the conversation listing. Dates are `YYYY-MM-DD` or empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationQuery {
    pub page: u32,
    pub limit: u32,
    pub q: String,
    pub user_email: String,
    pub from_date: String,
    pub to_date: String,
}

impl ConversationQuery {
    /// Query parameters; date bounds widen to the start/end of the day.
    pub fn params(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("page", param(self.page)),
            ("limit", param(self.limit)),
            ("q", Some(self.q.clone())),
            ("user_email", Some(self.user_email.clone())),
            ("from", day_bound(&self.from_date, "T00:00:00Z")),
            ("to", day_bound(&self.to_date, "T23:59:59Z")),
        ]
    }
}

fn day_bound(date: &str, suffix: &str) -> Option<String> {
    let date = date.trim();
    (!date.is_empty()).then(|| format!("{}{}", date, suffix))
}

fn session_path(session_key: &str) -> Result<String, ApiError> {
    segment_path(["api", "admin", "conversations", session_key])
}

fn require_text(value: &str, what: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation(format!("{} cannot be empty.", what)));
    }
    Ok(trimmed.to_string())
}

pub async fn list_conversations(
    client: &AdminClient,
    token: &str,
    query: &ConversationQuery,
) -> Result<Page<ConversationSummary>, ApiError> {
    client
        .get("/api/admin/conversations", token, &query.params())
        .await
}

/// Listing abandoned with [`ApiError::Cancelled`] once `cancel` fires.
pub async fn list_conversations_until(
    client: &AdminClient,
    token: &str,
    query: &ConversationQuery,
    cancel: CancellationToken,
) -> Result<Page<ConversationSummary>, ApiError> {
    client
        .get_with(
            "/api/admin/conversations",
            token,
            &query.params(),
            RequestOptions::default().cancel_on(cancel),
        )
        .await
}

pub async fn fetch_thread(
    client: &AdminClient,
    token: &str,
    session_key: &str,
) -> Result<ConversationThread, ApiError> {
    let path = format!("{}/messages", session_path(session_key)?);
    client.get(&path, token, &[]).await
}

/// Post a reply into the conversation as the assistant.
pub async fn reply(
    client: &AdminClient,
    token: &str,
    session_key: &str,
    content: &str,
) -> Result<AdminMessage, ApiError> {
    let content = require_text(content, "Message")?;
    let path = format!("{}/messages", session_path(session_key)?);
    let resp: MessageMutation = client
        .send_json(
            Method::POST,
            &path,
            token,
            json!({ "content": content, "sender": REPLY_SENDER }),
        )
        .await?;
    Ok(resp.message)
}

pub async fn edit_message(
    client: &AdminClient,
    token: &str,
    session_key: &str,
    message_id: i64,
    content: &str,
) -> Result<AdminMessage, ApiError> {
    let content = require_text(content, "Message")?;
    let path = format!("{}/messages/{}", session_path(session_key)?, message_id);
    let resp: MessageMutation = client
        .send_json(Method::PUT, &path, token, json!({ "content": content }))
        .await?;
    Ok(resp.message)
}

pub async fn delete_message(
    client: &AdminClient,
    token: &str,
    session_key: &str,
    message_id: i64,
) -> Result<i64, ApiError> {
    let path = format!("{}/messages/{}", session_path(session_key)?, message_id);
    let resp: DeletedMessage = client.delete(&path, token).await?;
    Ok(resp.deleted_message_id)
}

pub async fn delete_conversation(
    client: &AdminClient,
    token: &str,
    session_key: &str,
) -> Result<DeletedConversation, ApiError> {
    client.delete(&session_path(session_key)?, token).await
}

pub async fn rename_conversation(
    client: &AdminClient,
    token: &str,
    session_key: &str,
    title: &str,
) -> Result<RenamedSession, ApiError> {
    let title = require_text(title, "Title")?;
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ApiError::validation(format!(
            "Title must be at most {} characters.",
            MAX_TITLE_LEN
        )));
    }
    let resp: RenameResponse = client
        .send_json(
            Method::PUT,
            &session_path(session_key)?,
            token,
            json!({ "title": title }),
        )
        .await?;
    Ok(resp.session)
}
