//! Single conversation view-model

use crate::models::{AdminMessage, ConversationThread};
use crate::presence::{PresenceLookup, PresenceState};

use super::grouping::{resolve_presence, ResolvedPresence};

pub const UNTITLED: &str = "Untitled chat";

/// Message being edited in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditDraft {
    pub message_id: i64,
    pub content: String,
}

pub struct ThreadView {
    thread: ConversationThread,
    pub reply_draft: String,
    pub edit: Option<EditDraft>,
    /// Present while the title is being edited.
    pub title_draft: Option<String>,
}

impl ThreadView {
    pub fn new(thread: ConversationThread) -> Self {
        Self {
            thread,
            reply_draft: String::new(),
            edit: None,
            title_draft: None,
        }
    }

    pub fn thread(&self) -> &ConversationThread {
        &self.thread
    }

    pub fn title(&self) -> &str {
        self.thread
            .session
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(UNTITLED)
    }

    /// Header presence: live record, then the thread payload.
    ///
    /// Absent both, the customer shows offline with no last-seen.
    pub fn header_presence(&self, presence: &PresenceState) -> ResolvedPresence {
        let session = &self.thread.session;
        resolve_presence(
            presence.lookup(&session.user),
            session.is_online,
            session.last_seen_at.as_deref(),
        )
    }

    /// Begin editing a message, seeded with its current content.
    pub fn start_edit(&mut self, message_id: i64) -> bool {
        let Some(message) = self.thread.messages.iter().find(|m| m.id == message_id) else {
            return false;
        };
        self.edit = Some(EditDraft {
            message_id,
            content: message.content.clone(),
        });
        true
    }

    pub fn start_rename(&mut self) {
        self.title_draft = Some(self.thread.session.title.clone().unwrap_or_default());
    }

    pub fn on_reply_sent(&mut self, message: AdminMessage) {
        self.thread.messages.push(message);
        self.reply_draft.clear();
    }

    pub fn on_message_edited(&mut self, message: AdminMessage) {
        if let Some(slot) = self.thread.messages.iter_mut().find(|m| m.id == message.id) {
            *slot = message;
        }
        self.edit = None;
    }

    /// Apply a successful rename.
    pub fn on_renamed(&mut self, title: Option<String>) {
        self.thread.session.title = title;
        self.title_draft = None;
    }

    /// Drop a deleted message from the local copy.
    pub fn on_message_deleted(&mut self, message_id: i64) {
        self.thread.messages.retain(|m| m.id != message_id);
        if self.edit.as_ref().map(|e| e.message_id) == Some(message_id) {
            self.edit = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AdminUser, ThreadSession};
    use crate::presence::state::record;

    fn thread(title: Option<&str>, online: bool) -> ThreadView {
        ThreadView::new(ConversationThread {
            session: ThreadSession {
                session_id: "chat-one".into(),
                title: title.map(String::from),
                created_at: None,
                user: AdminUser {
                    id: Some(4),
                    ..Default::default()
                },
                is_online: online,
                last_seen_at: Some("2024-05-01T08:00:00Z".into()),
                open_ticket_count: 0,
            },
            messages: vec![AdminMessage {
                id: 10,
                sender: "user".into(),
                content: "hi".into(),
                created_at: None,
                attachments: vec![],
            }],
            tickets: vec![],
        })
    }

    #[test]
    fn test_title_falls_back() {
        assert_eq!(thread(None, false).title(), UNTITLED);
        assert_eq!(thread(Some("  "), false).title(), UNTITLED);
        let mut view = thread(Some("Billing"), false);
        assert_eq!(view.title(), "Billing");
        view.on_renamed(Some("Refund".into()));
        assert_eq!(view.title(), "Refund");
    }

    #[test]
    fn test_header_presence_prefers_live() {
        let view = thread(None, true);
        let mut presence = PresenceState::default();
        assert!(view.header_presence(&presence).is_online);

        presence.apply_update(record("id:4", false, Some("2024-05-02T08:00:00Z")));
        let resolved = view.header_presence(&presence);
        assert!(!resolved.is_online);
        assert_eq!(resolved.last_seen_at.as_deref(), Some("2024-05-02T08:00:00Z"));
    }

    #[test]
    fn test_drafts_clear_on_success() {
        let mut view = thread(Some("Billing"), false);

        view.reply_draft = "on it".into();
        view.on_reply_sent(AdminMessage {
            id: 11,
            sender: "assistant".into(),
            content: "on it".into(),
            created_at: None,
            attachments: vec![],
        });
        assert!(view.reply_draft.is_empty());
        assert_eq!(view.thread().messages.len(), 2);

        assert!(!view.start_edit(99));
        assert!(view.start_edit(10));
        assert_eq!(view.edit.as_ref().map(|e| e.content.as_str()), Some("hi"));
        view.on_message_edited(AdminMessage {
            id: 10,
            sender: "user".into(),
            content: "hello".into(),
            created_at: None,
            attachments: vec![],
        });
        assert!(view.edit.is_none());
        assert_eq!(view.thread().messages[0].content, "hello");

        view.start_rename();
        assert_eq!(view.title_draft.as_deref(), Some("Billing"));
        view.on_renamed(Some("Refund".into()));
        assert!(view.title_draft.is_none());
    }

    #[test]
    fn test_message_delete_is_local() {
        let mut view = thread(None, false);
        view.start_edit(10);
        view.on_message_deleted(10);
        assert!(view.thread().messages.is_empty());
        assert!(view.edit.is_none());
    }
}
