//! Dashboard, conversation list, thread and message commands

use anyhow::Result;

use super::{format_time, presence_label, truncate, AdminSession};
use crate::api::conversations::{
    delete_conversation, delete_message, edit_message, fetch_thread, list_conversations,
    rename_conversation, reply,
};
use crate::api::stats::fetch_stats;
use crate::api::{AdminClient, ApiError};
use crate::config::Config;
use crate::models::{resolve_attachment_url, AdminMessage, RenamedSession};
use crate::presence::PresenceState;
use crate::views::thread::UNTITLED;
use crate::views::{online_users_now, ConversationsView, ResolvedPresence, ThreadView};

/// Filters accepted by `conversations`.
#[derive(Debug, Clone, Default)]
pub struct ListArgs {
    pub page: u32,
    pub q: String,
    pub user_email: String,
    pub from_date: String,
    pub to_date: String,
    pub live: bool,
}

pub async fn stats(config: &Config) -> Result<()> {
    let mut session = AdminSession::open(config)?;
    let result = fetch_stats(&session.client, session.token()).await;
    let stats = session.check(result, "Failed to load dashboard stats")?;

    println!("\nDashboard:");
    println!("{:-<40}", "");
    println!("  Customers:          {}", stats.total_users);
    println!("  Conversations:      {}", stats.total_sessions);
    println!("  Messages:           {}", stats.total_messages);
    println!("  Messages today:     {}", stats.messages_today);
    println!("  Active (7 days):    {}", stats.active_users_last_7_days);
    println!(
        "  Online now:         {}",
        online_users_now(&PresenceState::default(), Some(&stats))
    );
    Ok(())
}

pub async fn list(config: &Config, args: ListArgs) -> Result<()> {
    let mut session = AdminSession::open(config)?;

    let mut view = ConversationsView::new();
    view.draft.q = args.q;
    view.draft.user_email = args.user_email;
    view.draft.from_date = args.from_date;
    view.draft.to_date = args.to_date;
    view.apply_filters();
    for _ in 1..args.page.max(1) {
        view.next_page();
    }

    let live = if args.live {
        Some(session.live_presence().await)
    } else {
        None
    };

    tracing::info!("Fetching conversations...");
    let result = list_conversations(&session.client, session.token(), &view.query()).await;
    let page = session.check(result, "Failed to load conversations")?;
    view.set_data(page);

    let presence = match &live {
        Some((_, v)) => v.state().clone(),
        None => PresenceState::default(),
    };

    println!(
        "\nConversations ({} total, {}):",
        view.total(),
        view.pager().label()
    );
    println!("{:-<60}", "");

    let groups = view.groups(&presence);
    if groups.is_empty() {
        println!("  (no conversations found)");
        return Ok(());
    }

    for group in groups {
        let email = group
            .email
            .as_deref()
            .filter(|e| !e.is_empty() && *e != group.display_name)
            .map(|e| format!(" <{}>", e))
            .unwrap_or_default();
        let presence = ResolvedPresence {
            is_online: group.is_online,
            last_seen_at: group.last_seen_at.clone(),
        };
        println!(
            "{}{}  [{}]",
            group.display_name,
            email,
            presence_label(&presence)
        );
        for conv in &group.sessions {
            let title = conv.title.as_deref().filter(|t| !t.trim().is_empty());
            println!(
                "  {}  {}  ({} messages)",
                conv.session_id,
                title.unwrap_or(UNTITLED),
                conv.message_count
            );
            if let Some(last) = &conv.last_message {
                println!("    [{}]: {}", last.sender, truncate(&last.content, 72));
            }
        }
        println!();
    }

    if live.is_some() {
        println!("Online now: {}", online_users_now(&presence, None));
    }
    Ok(())
}

pub async fn thread(config: &Config, session_key: &str, live: bool) -> Result<()> {
    let mut session = AdminSession::open(config)?;
    let feed = if live {
        Some(session.live_presence().await)
    } else {
        None
    };

    let result = fetch_thread(&session.client, session.token(), session_key).await;
    let view = ThreadView::new(session.check(result, "Failed to load conversation")?);

    let presence = match &feed {
        Some((_, v)) => v.state().clone(),
        None => PresenceState::default(),
    };
    let header = view.header_presence(&presence);
    let info = &view.thread().session;

    println!("\n{}", view.title());
    println!("{:-<60}", "");
    println!("  Session:  {}", info.session_id);
    println!("  Customer: {}", info.user.display_name());
    if let Some(email) = info.user.email.as_deref().filter(|e| !e.is_empty()) {
        println!("  Email:    {}", email);
    }
    println!("  Status:   {}", presence_label(&header));
    if info.open_ticket_count > 0 {
        println!("  Open tickets: {}", info.open_ticket_count);
    }
    println!();

    if view.thread().messages.is_empty() {
        println!("(no messages)");
    }
    for msg in &view.thread().messages {
        let time = msg.created_at.as_deref().map(format_time).unwrap_or_default();
        println!("#{} [{}] {}: {}", msg.id, time, msg.sender, msg.content);
        for attachment in &msg.attachments {
            println!(
                "    attachment: {} <{}>",
                attachment.file_name(),
                resolve_attachment_url(&config.api_base_url, &attachment.url)
            );
        }
    }

    if !view.thread().tickets.is_empty() {
        println!("\nTickets:");
        for ticket in &view.thread().tickets {
            println!(
                "  #{} {}  [{}]  {}",
                ticket.id,
                ticket.ticket_key,
                ticket.status.label(),
                ticket.subject
            );
        }
    }
    Ok(())
}

pub async fn send_reply(config: &Config, session_key: &str, content: &str) -> Result<()> {
    let mut session = AdminSession::open(config)?;
    let result = reply(&session.client, session.token(), session_key, content).await;
    let message = session.check(result, "Failed to send reply")?;
    println!("Reply sent (#{}).", message.id);
    Ok(())
}

async fn load_thread(session: &mut AdminSession, session_key: &str) -> Result<ThreadView> {
    let result = fetch_thread(&session.client, session.token(), session_key).await;
    Ok(ThreadView::new(session.check(result, "Failed to load conversation")?))
}

/// Replace a message's content; ids outside the thread never reach the server.
async fn edit_in_thread(
    client: &AdminClient,
    token: &str,
    view: &mut ThreadView,
    message_id: i64,
    content: &str,
) -> Result<AdminMessage, ApiError> {
    if !view.start_edit(message_id) {
        return Err(not_in_thread(message_id));
    }
    if let Some(draft) = view.edit.as_mut() {
        draft.content = content.to_string();
    }
    let session_key = view.thread().session.session_id.clone();
    let message = edit_message(client, token, &session_key, message_id, content).await?;
    view.on_message_edited(message.clone());
    Ok(message)
}

async fn delete_in_thread(
    client: &AdminClient,
    token: &str,
    view: &mut ThreadView,
    message_id: i64,
) -> Result<i64, ApiError> {
    if !view.thread().messages.iter().any(|m| m.id == message_id) {
        return Err(not_in_thread(message_id));
    }
    let session_key = view.thread().session.session_id.clone();
    let deleted = delete_message(client, token, &session_key, message_id).await?;
    view.on_message_deleted(deleted);
    Ok(deleted)
}

async fn rename_in_thread(
    client: &AdminClient,
    token: &str,
    view: &mut ThreadView,
    title: &str,
) -> Result<RenamedSession, ApiError> {
    view.start_rename();
    view.title_draft = Some(title.to_string());
    let session_key = view.thread().session.session_id.clone();
    let renamed = rename_conversation(client, token, &session_key, title).await?;
    view.on_renamed(renamed.title.clone());
    Ok(renamed)
}

fn not_in_thread(message_id: i64) -> ApiError {
    ApiError::validation(format!(
        "Message #{} is not part of this conversation.",
        message_id
    ))
}

pub async fn edit(config: &Config, session_key: &str, message_id: i64, content: &str) -> Result<()> {
    let mut session = AdminSession::open(config)?;
    let mut view = load_thread(&mut session, session_key).await?;
    let previous = view
        .thread()
        .messages
        .iter()
        .find(|m| m.id == message_id)
        .map(|m| truncate(&m.content, 60));

    let result = edit_in_thread(
        &session.client,
        session.token(),
        &mut view,
        message_id,
        content,
    )
    .await;
    let message = session.check(result, "Failed to edit message")?;
    println!("Message #{} updated.", message.id);
    if let Some(previous) = previous {
        println!("  was: {}", previous);
    }
    println!("  now: {}", truncate(&message.content, 60));
    Ok(())
}

pub async fn remove_message(config: &Config, session_key: &str, message_id: i64) -> Result<()> {
    let mut session = AdminSession::open(config)?;
    let mut view = load_thread(&mut session, session_key).await?;
    let result = delete_in_thread(&session.client, session.token(), &mut view, message_id).await;
    let deleted = session.check(result, "Failed to delete message")?;
    println!(
        "Message #{} deleted. {} message(s) left in \"{}\".",
        deleted,
        view.thread().messages.len(),
        view.title()
    );
    Ok(())
}

pub async fn remove_conversation(config: &Config, session_key: &str) -> Result<()> {
    let mut session = AdminSession::open(config)?;
    let result = delete_conversation(&session.client, session.token(), session_key).await;
    let deleted = session.check(result, "Failed to delete conversation")?;
    println!("Conversation {} deleted.", deleted.deleted_session_key);
    Ok(())
}

pub async fn rename(config: &Config, session_key: &str, title: &str) -> Result<()> {
    let mut session = AdminSession::open(config)?;
    let mut view = load_thread(&mut session, session_key).await?;
    let previous = view.title().to_string();
    let result = rename_in_thread(&session.client, session.token(), &mut view, title).await;
    let renamed = session.check(result, "Failed to rename conversation")?;
    println!(
        "Conversation {} renamed from \"{}\" to \"{}\".",
        renamed.session_id,
        previous,
        view.title()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AdminUser, ConversationThread, ThreadSession};
    use mockito::Matcher;
    use std::time::Duration;

    fn message(id: i64, content: &str) -> AdminMessage {
        AdminMessage {
            id,
            sender: "user".into(),
            content: content.into(),
            created_at: None,
            attachments: vec![],
        }
    }

    fn view() -> ThreadView {
        ThreadView::new(ConversationThread {
            session: ThreadSession {
                session_id: "chat-one".into(),
                title: Some("Billing".into()),
                created_at: None,
                user: AdminUser::default(),
                is_online: false,
                last_seen_at: None,
                open_ticket_count: 0,
            },
            messages: vec![message(10, "hi"), message(11, "refund please")],
            tickets: vec![],
        })
    }

    #[tokio::test]
    async fn test_edit_unknown_message_never_reaches_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let client = AdminClient::with_timeout(&server.url(), Duration::from_secs(5));

        let mut view = view();
        let err = edit_in_thread(&client, "tok", &mut view, 99, "x")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(view.edit.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_edit_updates_local_thread() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/api/admin/conversations/chat-one/messages/11")
            .match_body(Matcher::Json(serde_json::json!({ "content": "refund sent" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message":{"id":11,"sender":"user","content":"refund sent","attachments":[]}}"#)
            .create_async()
            .await;
        let client = AdminClient::with_timeout(&server.url(), Duration::from_secs(5));

        let mut view = view();
        let message = edit_in_thread(&client, "tok", &mut view, 11, "refund sent")
            .await
            .unwrap();
        assert_eq!(message.content, "refund sent");
        assert_eq!(view.thread().messages[1].content, "refund sent");
        assert!(view.edit.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_and_rename_apply_to_view() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/api/admin/conversations/chat-one/messages/10")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"deleted_message_id":10}"#)
            .create_async()
            .await;
        server
            .mock("PUT", "/api/admin/conversations/chat-one")
            .match_body(Matcher::Json(serde_json::json!({ "title": "Refund" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"session":{"session_id":"chat-one","title":"Refund"}}"#)
            .create_async()
            .await;
        let client = AdminClient::with_timeout(&server.url(), Duration::from_secs(5));

        let mut view = view();
        assert_eq!(delete_in_thread(&client, "tok", &mut view, 10).await.unwrap(), 10);
        assert_eq!(view.thread().messages.len(), 1);
        assert!(matches!(
            delete_in_thread(&client, "tok", &mut view, 10).await,
            Err(ApiError::Validation(_))
        ));

        rename_in_thread(&client, "tok", &mut view, "Refund").await.unwrap();
        assert_eq!(view.title(), "Refund");
        assert!(view.title_draft.is_none());
    }
}
