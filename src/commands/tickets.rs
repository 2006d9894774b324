//! Ticket commands

use anyhow::{bail, Result};

use super::{format_time, truncate, AdminSession};
use crate::api::tickets::{fetch_ticket, list_tickets, update_ticket};
use crate::config::Config;
use crate::models::{resolve_attachment_url, AdminTicket, StatusFilter, TicketStatus};
use crate::views::TicketsView;

pub async fn list(config: &Config, q: String, status: StatusFilter, page: u32) -> Result<()> {
    let mut session = AdminSession::open(config)?;

    let mut view = TicketsView::new();
    view.filter_draft.q = q;
    view.filter_draft.status = status;
    view.apply_filters();
    for _ in 1..page.max(1) {
        view.next_page();
    }

    let result = list_tickets(&session.client, session.token(), &view.query()).await;
    view.set_data(session.check(result, "Failed to load tickets")?);

    println!(
        "\nTickets ({} total, {}):",
        view.total(),
        view.pager().label()
    );
    println!("{:-<60}", "");
    if view.rows().is_empty() {
        println!("  (no tickets found)");
        return Ok(());
    }
    for ticket in view.rows() {
        println!(
            "#{:<5} {}  [{}]  {}",
            ticket.id,
            ticket.ticket_key,
            ticket.status.label(),
            truncate(&ticket.subject, 48)
        );
        println!("       {}", ticket.user.display_name());
    }
    Ok(())
}

fn print_ticket(config: &Config, ticket: &AdminTicket) {
    println!("\n{}  {}", ticket.ticket_key, ticket.subject);
    println!("{:-<60}", "");
    println!("  Status:   {}", ticket.status.label());
    println!("  Customer: {}", ticket.user.display_name());
    if let Some(session) = &ticket.session {
        println!("  Session:  {}", session.session_id);
    }
    if let Some(created) = &ticket.created_at {
        println!("  Opened:   {}", format_time(created));
    }
    if let Some(updated) = &ticket.updated_at {
        println!("  Updated:  {}", format_time(updated));
    }
    if let Some(description) = ticket.description.as_deref().filter(|d| !d.trim().is_empty()) {
        println!("\n{}", description.trim());
    }
    if let Some(attachment) = &ticket.attachment {
        println!(
            "\n  attachment: {} <{}>",
            attachment.file_name(),
            resolve_attachment_url(&config.api_base_url, &attachment.url)
        );
    }
    if let Some(note) = ticket.admin_note.as_deref().filter(|n| !n.trim().is_empty()) {
        println!("\nAdmin note: {}", note.trim());
    }
}

pub async fn show(config: &Config, ticket_id: i64) -> Result<()> {
    let mut session = AdminSession::open(config)?;
    let result = fetch_ticket(&session.client, session.token(), ticket_id).await;
    let ticket = session.check(result, "Failed to load ticket")?;
    print_ticket(config, &ticket);
    Ok(())
}

/// Load the ticket, apply the requested edits over its current values and save.
pub async fn update(
    config: &Config,
    ticket_id: i64,
    status: Option<TicketStatus>,
    note: Option<String>,
) -> Result<()> {
    if status.is_none() && note.is_none() {
        bail!("Nothing to update. Pass --status and/or --note.");
    }
    let mut session = AdminSession::open(config)?;

    let result = fetch_ticket(&session.client, session.token(), ticket_id).await;
    let current = session.check(result, "Failed to load ticket")?;

    let mut view = TicketsView::new();
    view.select(&current);
    view.on_detail_loaded(current);
    if let Some(draft) = view.edit.as_mut() {
        if let Some(status) = status {
            draft.status = status;
        }
        if let Some(note) = note {
            draft.admin_note = note;
        }
    }

    let Some((id, payload)) = view.pending_update() else {
        bail!("No ticket selected");
    };
    let result = update_ticket(&session.client, session.token(), id, &payload).await;
    let saved = session.check(result, "Failed to update ticket")?;
    view.on_saved(saved);

    if let Some(ticket) = view.detail() {
        println!("Ticket {} saved.", ticket.ticket_key);
        print_ticket(config, ticket);
    }
    Ok(())
}
