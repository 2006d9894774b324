//! Conversation grouping: one row per customer, with live presence merged in

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, FixedOffset};

use crate::models::{ConversationSummary, PresenceRecord};
use crate::presence::PresenceLookup;

/// Who a conversation belongs to, in precedence order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CustomerIdentity {
    ByUserId(i64),
    /// Lowercased address.
    ByEmail(String),
    /// Neither id nor email; the session stands alone.
    BySessionFallback(String),
}

impl CustomerIdentity {
    pub fn of(conversation: &ConversationSummary) -> Self {
        let user = &conversation.user;
        if let Some(id) = user.id {
            return CustomerIdentity::ByUserId(id);
        }
        match user.normalized_email() {
            Some(email) => CustomerIdentity::ByEmail(email),
            None => CustomerIdentity::BySessionFallback(conversation.session_id.clone()),
        }
    }
}

impl fmt::Display for CustomerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CustomerIdentity::ByUserId(id) => write!(f, "id:{}", id),
            CustomerIdentity::ByEmail(email) => write!(f, "email:{}", email),
            CustomerIdentity::BySessionFallback(session) => write!(f, "session:{}", session),
        }
    }
}

/// Effective presence for one session or customer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedPresence {
    pub is_online: bool,
    pub last_seen_at: Option<String>,
}

/// Live record first, then the REST-supplied values.
///
/// A live record without `last_seen_at` still defers to the REST value for
/// that field.
pub fn resolve_presence(
    live: Option<&PresenceRecord>,
    fallback_online: bool,
    fallback_last_seen: Option<&str>,
) -> ResolvedPresence {
    match live {
        Some(record) => ResolvedPresence {
            is_online: record.is_online,
            last_seen_at: record
                .last_seen_at
                .clone()
                .or_else(|| fallback_last_seen.map(String::from)),
        },
        None => ResolvedPresence {
            is_online: fallback_online,
            last_seen_at: fallback_last_seen.map(String::from),
        },
    }
}

fn parse_instant(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value.trim()).ok()
}

/// More recent of two optional timestamps; `None` never wins over a value.
pub fn latest_timestamp(current: Option<String>, candidate: Option<String>) -> Option<String> {
    match (current, candidate) {
        (None, c) => c,
        (cur, None) => cur,
        (Some(cur), Some(cand)) => match (parse_instant(&cur), parse_instant(&cand)) {
            (Some(a), Some(b)) if b.cmp(&a) == Ordering::Greater => Some(cand),
            (None, Some(_)) => Some(cand),
            _ => Some(cur),
        },
    }
}

/// All sessions of one customer on the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerGroup {
    pub identity: CustomerIdentity,
    pub display_name: String,
    pub email: Option<String>,
    /// True if any session's customer is online.
    pub is_online: bool,
    /// Most recent last-seen across sessions.
    pub last_seen_at: Option<String>,
    /// Member sessions in server order.
    pub sessions: Vec<ConversationSummary>,
}

/// Group a page of conversations by customer, merging live presence.
///
/// Groups appear in first-appearance order. Pure: identical inputs always
/// yield identical output.
pub fn group_conversations(
    conversations: &[ConversationSummary],
    presence: &impl PresenceLookup,
) -> Vec<CustomerGroup> {
    let mut groups: Vec<CustomerGroup> = Vec::new();
    let mut index: HashMap<CustomerIdentity, usize> = HashMap::new();

    for conversation in conversations {
        let identity = CustomerIdentity::of(conversation);
        let resolved = resolve_presence(
            presence.lookup(&conversation.user),
            conversation.is_online,
            conversation.last_seen_at.as_deref(),
        );

        match index.get(&identity) {
            Some(&slot) => {
                let group = &mut groups[slot];
                group.is_online |= resolved.is_online;
                group.last_seen_at =
                    latest_timestamp(group.last_seen_at.take(), resolved.last_seen_at);
                group.sessions.push(conversation.clone());
            }
            None => {
                index.insert(identity.clone(), groups.len());
                groups.push(CustomerGroup {
                    identity,
                    display_name: conversation.user.display_name(),
                    email: conversation.user.email.clone(),
                    is_online: resolved.is_online,
                    last_seen_at: resolved.last_seen_at,
                    sessions: vec![conversation.clone()],
                });
            }
        }
    }

    groups
}
