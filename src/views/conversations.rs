//! Conversations list view-model: filters, paging and grouped rows

use crate::api::conversations::ConversationQuery;
use crate::models::{ConversationSummary, Page};
use crate::presence::PresenceState;

use super::grouping::{group_conversations, CustomerGroup};
use super::pagination::{Pager, PAGE_SIZE};

/// Filter fields as typed by the operator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationFilters {
    pub q: String,
    pub user_email: String,
    /// `YYYY-MM-DD` or empty.
    pub from_date: String,
    pub to_date: String,
}

impl ConversationFilters {
    fn committed(&self) -> Self {
        Self {
            q: self.q.trim().to_string(),
            user_email: self.user_email.trim().to_string(),
            from_date: self.from_date.clone(),
            to_date: self.to_date.clone(),
        }
    }
}

struct GroupMemo {
    page_revision: u64,
    presence_revision: u64,
    groups: Vec<CustomerGroup>,
}

/// Draft filters are edited freely; queries only ever see the committed copy.
#[derive(Default)]
pub struct ConversationsView {
    pub draft: ConversationFilters,
    committed: ConversationFilters,
    pager: Pager,
    data: Option<Page<ConversationSummary>>,
    page_revision: u64,
    memo: Option<GroupMemo>,
}

impl ConversationsView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn committed(&self) -> &ConversationFilters {
        &self.committed
    }

    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    /// Commit the draft (text fields trimmed) and go back to page 1.
    pub fn apply_filters(&mut self) {
        self.committed = self.draft.committed();
        self.pager.reset();
    }

    pub fn clear_filters(&mut self) {
        self.draft = ConversationFilters::default();
        self.apply_filters();
    }

    /// Request for the current page under the committed filters.
    pub fn query(&self) -> ConversationQuery {
        ConversationQuery {
            page: self.pager.page(),
            limit: PAGE_SIZE,
            q: self.committed.q.clone(),
            user_email: self.committed.user_email.clone(),
            from_date: self.committed.from_date.clone(),
            to_date: self.committed.to_date.clone(),
        }
    }

    pub fn next_page(&mut self) -> bool {
        self.pager.next()
    }

    pub fn prev_page(&mut self) -> bool {
        self.pager.prev()
    }

    /// Store a freshly fetched page.
    pub fn set_data(&mut self, page: Page<ConversationSummary>) {
        self.pager.set_total_pages(page.total_pages);
        self.data = Some(page);
        self.page_revision += 1;
    }

    pub fn data(&self) -> Option<&Page<ConversationSummary>> {
        self.data.as_ref()
    }

    /// Total matching conversations, 0 before the first load.
    pub fn total(&self) -> u64 {
        self.data.as_ref().map(|p| p.total).unwrap_or(0)
    }

    /// Grouped rows for the current page.
    ///
    /// Recomputed only when the page data or the presence map changed.
    pub fn groups(&mut self, presence: &PresenceState) -> &[CustomerGroup] {
        let fresh = matches!(
            &self.memo,
            Some(m) if m.page_revision == self.page_revision
                && m.presence_revision == presence.revision()
        );
        if !fresh {
            let items = self.data.as_ref().map(|p| p.items.as_slice()).unwrap_or(&[]);
            self.memo = Some(GroupMemo {
                page_revision: self.page_revision,
                presence_revision: presence.revision(),
                groups: group_conversations(items, presence),
            });
        }
        self.memo.as_ref().map(|m| m.groups.as_slice()).unwrap_or(&[])
    }
}
