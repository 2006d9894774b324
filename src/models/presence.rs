//! Presence records pushed by the presence service

use serde::{Deserialize, Serialize};

/// Online/offline state for one customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRecord {
    /// `id:<n>` or `email:<addr>`. Records without a key are dropped.
    #[serde(default)]
    pub user_key: Option<String>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default)]
    pub last_seen_at: Option<String>,
}
