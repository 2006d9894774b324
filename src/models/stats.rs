//! Dashboard counters

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminStats {
    #[serde(default)]
    pub total_users: u64,
    #[serde(default)]
    pub total_sessions: u64,
    #[serde(default)]
    pub total_messages: u64,
    #[serde(default)]
    pub messages_today: u64,
    #[serde(default)]
    pub active_users_last_7_days: u64,
    #[serde(default)]
    pub online_users_current: u64,
}
