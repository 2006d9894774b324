//! Screen view-models, independent of any rendering

pub mod conversations;
pub mod grouping;
pub mod pagination;
pub mod thread;
pub mod tickets;

pub use conversations::ConversationsView;
pub use grouping::{group_conversations, CustomerGroup, CustomerIdentity, ResolvedPresence};
pub use pagination::{Pager, PAGE_SIZE};
pub use thread::ThreadView;
pub use tickets::TicketsView;

use crate::models::AdminStats;
use crate::presence::PresenceState;

/// "Online now" figure: the live count while connected, otherwise the
/// dashboard counter.
pub fn online_users_now(presence: &PresenceState, stats: Option<&AdminStats>) -> u64 {
    if presence.is_connected() {
        return presence.online_users_count() as u64;
    }
    stats.map(|s| s.online_users_current).unwrap_or(0)
}
