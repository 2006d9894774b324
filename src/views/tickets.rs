//! Tickets list and editor view-model

use crate::api::tickets::TicketQuery;
use crate::models::{AdminTicket, Page, StatusFilter, TicketStatus, TicketUpdate};

use super::pagination::{Pager, PAGE_SIZE};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketFilters {
    pub q: String,
    pub status: StatusFilter,
}

/// Local edits for the selected ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketDraft {
    pub status: TicketStatus,
    pub admin_note: String,
}

impl TicketDraft {
    fn seeded_from(ticket: &AdminTicket) -> Self {
        Self {
            status: ticket.status,
            admin_note: ticket.admin_note.clone().unwrap_or_default(),
        }
    }
}

#[derive(Default)]
pub struct TicketsView {
    pub filter_draft: TicketFilters,
    committed: TicketFilters,
    pager: Pager,
    data: Option<Page<AdminTicket>>,
    selected: Option<i64>,
    detail: Option<AdminTicket>,
    /// Present once a ticket is selected.
    pub edit: Option<TicketDraft>,
}

impl TicketsView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn committed(&self) -> &TicketFilters {
        &self.committed
    }

    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    pub fn apply_filters(&mut self) {
        self.committed = TicketFilters {
            q: self.filter_draft.q.trim().to_string(),
            status: self.filter_draft.status,
        };
        self.pager.reset();
    }

    pub fn clear_filters(&mut self) {
        self.filter_draft = TicketFilters::default();
        self.apply_filters();
    }

    pub fn query(&self) -> TicketQuery {
        TicketQuery {
            page: self.pager.page(),
            limit: PAGE_SIZE,
            q: self.committed.q.clone(),
            status: self.committed.status,
        }
    }

    pub fn next_page(&mut self) -> bool {
        self.pager.next()
    }

    pub fn prev_page(&mut self) -> bool {
        self.pager.prev()
    }

    pub fn set_data(&mut self, page: Page<AdminTicket>) {
        self.pager.set_total_pages(page.total_pages);
        self.data = Some(page);
    }

    pub fn rows(&self) -> &[AdminTicket] {
        self.data.as_ref().map(|p| p.items.as_slice()).unwrap_or(&[])
    }

    pub fn total(&self) -> u64 {
        self.data.as_ref().map(|p| p.total).unwrap_or(0)
    }

    pub fn selected(&self) -> Option<i64> {
        self.selected
    }

    pub fn detail(&self) -> Option<&AdminTicket> {
        self.detail.as_ref()
    }

    /// Select a row; drafts are seeded from the row until the detail loads.
    pub fn select(&mut self, ticket: &AdminTicket) {
        if self.selected == Some(ticket.id) {
            return;
        }
        self.selected = Some(ticket.id);
        self.detail = None;
        self.edit = Some(TicketDraft::seeded_from(ticket));
    }

    /// Detail fetched. Reseeds drafts the first time it arrives for the
    /// current selection; later refetches keep in-progress edits.
    pub fn on_detail_loaded(&mut self, ticket: AdminTicket) {
        if self.selected != Some(ticket.id) {
            return;
        }
        if self.detail.is_none() {
            self.edit = Some(TicketDraft::seeded_from(&ticket));
        }
        self.detail = Some(ticket);
    }

    /// Payload for saving the current drafts.
    pub fn pending_update(&self) -> Option<(i64, TicketUpdate)> {
        let id = self.selected?;
        let draft = self.edit.as_ref()?;
        Some((
            id,
            TicketUpdate {
                status: Some(draft.status),
                admin_note: Some(draft.admin_note.clone()),
            },
        ))
    }

    /// Save succeeded: reseed drafts and refresh the matching list row.
    pub fn on_saved(&mut self, ticket: AdminTicket) {
        if let Some(page) = self.data.as_mut() {
            if let Some(row) = page.items.iter_mut().find(|t| t.id == ticket.id) {
                *row = ticket.clone();
            }
        }
        if self.selected == Some(ticket.id) {
            self.edit = Some(TicketDraft::seeded_from(&ticket));
            self.detail = Some(ticket);
        }
    }
}
