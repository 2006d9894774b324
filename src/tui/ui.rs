//! UI rendering for the inbox

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use super::app::{App, InboxRow, Pane};
use super::input::{self, INPUT_HEIGHT};
use crate::commands::{format_time, presence_label};
use crate::models::resolve_attachment_url;

/// Height of the log pane, borders included.
const LOG_HEIGHT: u16 = 8;

/// Returns status indicator symbol and color based on online state
fn status_indicator(is_online: bool) -> (&'static str, Color) {
    if is_online {
        ("*", Color::Green)
    } else {
        ("o", Color::DarkGray)
    }
}

fn pane_block(title: String, focused: bool) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(if focused {
            BorderType::Double
        } else {
            BorderType::Plain
        })
        .border_style(if focused {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::DarkGray)
        })
        .title(title)
}

/// Main render function
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();
    let input_height = match app.pane {
        Pane::Reply | Pane::Filter => INPUT_HEIGHT,
        _ => 0,
    };

    let [header_area, main_area, input_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Fill(1),
        Constraint::Length(input_height),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(header_area, frame.buffer_mut(), app);

    let log_height = if app.show_logs { LOG_HEIGHT } else { 0 };
    let [panes_area, log_area] =
        Layout::vertical([Constraint::Fill(1), Constraint::Length(log_height)]).areas(main_area);
    let [list_area, thread_area] =
        Layout::horizontal([Constraint::Percentage(40), Constraint::Fill(1)]).areas(panes_area);

    render_inbox(list_area, frame.buffer_mut(), app);
    render_thread(thread_area, frame.buffer_mut(), app);
    if app.show_logs {
        render_logs(log_area, frame.buffer_mut(), app);
    }

    match app.pane {
        Pane::Reply => input::render(
            input_area,
            frame,
            &app.reply,
            "Reply",
            "Type a reply",
            true,
        ),
        Pane::Filter => input::render(
            input_area,
            frame,
            &app.filter,
            "Search",
            "Search conversations",
            true,
        ),
        _ => {}
    }

    render_status(status_area, frame.buffer_mut(), app);
}

fn render_header(area: Rect, buf: &mut Buffer, app: &App) {
    let title = " Support Console";
    let (symbol, color) = status_indicator(app.presence.is_connected());
    let live = if app.presence.is_connected() {
        "live"
    } else {
        "offline"
    };
    let right = format!(" {} {}  {} online now ", symbol, live, app.online_now());

    let padding = (area.width as usize)
        .saturating_sub(UnicodeWidthStr::width(title) + UnicodeWidthStr::width(right.as_str()));

    let line = Line::from(vec![
        Span::styled(
            title,
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" ".repeat(padding)),
        Span::styled(right, Style::default().fg(color)),
    ]);
    Paragraph::new(line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

fn render_inbox(area: Rect, buf: &mut Buffer, app: &App) {
    let filter = &app.conversations.committed().q;
    let mut title = format!(
        " Inbox ({}) {} ",
        app.conversations.total(),
        app.conversations.pager().label()
    );
    if !filter.is_empty() {
        title.push_str(&format!("[/{}] ", filter));
    }
    let block = pane_block(title, app.pane == Pane::List);
    let inner = block.inner(area);
    block.render(area, buf);

    if app.loading && app.rows.is_empty() {
        Paragraph::new("Loading...")
            .style(Style::default().fg(Color::DarkGray))
            .render(inner, buf);
        return;
    }
    if app.rows.is_empty() {
        Paragraph::new("(no conversations)")
            .style(Style::default().fg(Color::DarkGray))
            .render(inner, buf);
        return;
    }

    let lines: Vec<Line> = app
        .rows
        .iter()
        .enumerate()
        .map(|(idx, row)| match row {
            InboxRow::Customer {
                name,
                email,
                presence,
                sessions,
            } => {
                let (symbol, color) = status_indicator(presence.is_online);
                let mut spans = vec![
                    Span::styled(format!("{} ", symbol), Style::default().fg(color)),
                    Span::styled(name.clone(), Style::default().add_modifier(Modifier::BOLD)),
                ];
                if let Some(email) = email.as_ref().filter(|e| *e != name) {
                    spans.push(Span::styled(
                        format!(" <{}>", email),
                        Style::default().fg(Color::Gray),
                    ));
                }
                if *sessions > 1 {
                    spans.push(Span::styled(
                        format!(" ({})", sessions),
                        Style::default().fg(Color::DarkGray),
                    ));
                }
                Line::from(spans)
            }
            InboxRow::Session {
                title,
                preview,
                message_count,
                ..
            } => {
                let style = if idx == app.selected {
                    Style::default().fg(Color::Black).bg(Color::Cyan)
                } else {
                    Style::default()
                };
                let mut text = format!("   {} [{}]", title, message_count);
                if let Some(preview) = preview {
                    text.push_str(&format!("  {}", preview));
                }
                Line::from(Span::styled(text, style))
            }
        })
        .collect();

    // Keep the selection on screen.
    let height = inner.height as usize;
    let offset = app.selected.saturating_sub(height.saturating_sub(1));
    Paragraph::new(lines)
        .scroll((offset as u16, 0))
        .render(inner, buf);
}

fn render_thread(area: Rect, buf: &mut Buffer, app: &App) {
    let focused = matches!(app.pane, Pane::Thread | Pane::Reply);
    let Some(view) = &app.thread else {
        let block = pane_block(" Conversation ".to_string(), focused);
        let inner = block.inner(area);
        block.render(area, buf);
        let hint = if focused {
            "Loading..."
        } else {
            "Select a conversation and press Enter"
        };
        Paragraph::new(hint)
            .style(Style::default().fg(Color::DarkGray))
            .render(inner, buf);
        return;
    };

    let block = pane_block(format!(" {} ", view.title()), focused);
    let inner = block.inner(area);
    block.render(area, buf);

    let session = &view.thread().session;
    let header = view.header_presence(&app.presence);
    let (symbol, color) = status_indicator(header.is_online);

    let mut lines = vec![Line::from(vec![
        Span::styled(format!("{} ", symbol), Style::default().fg(color)),
        Span::styled(
            session.user.display_name(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("  {}", presence_label(&header)),
            Style::default().fg(Color::Gray),
        ),
    ])];
    if session.open_ticket_count > 0 {
        lines.push(Line::from(Span::styled(
            format!("{} open ticket(s)", session.open_ticket_count),
            Style::default().fg(Color::Yellow),
        )));
    }
    lines.push(Line::from(""));

    for msg in &view.thread().messages {
        let sender_color = if msg.sender == "user" {
            Color::Cyan
        } else {
            Color::Green
        };
        let time = msg.created_at.as_deref().map(format_time).unwrap_or_default();
        lines.push(Line::from(vec![
            Span::styled(
                msg.sender.clone(),
                Style::default()
                    .fg(sender_color)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!("  {}", time), Style::default().fg(Color::DarkGray)),
        ]));
        for text in msg.content.lines() {
            lines.push(Line::from(format!("  {}", text)));
        }
        for attachment in &msg.attachments {
            lines.push(Line::from(Span::styled(
                format!(
                    "  [{}] {}",
                    attachment.file_name(),
                    resolve_attachment_url(&app.api_base_url, &attachment.url)
                ),
                Style::default().fg(Color::Blue),
            )));
        }
        lines.push(Line::from(""));
    }
    if view.thread().messages.is_empty() {
        lines.push(Line::from(Span::styled(
            "(no messages)",
            Style::default().fg(Color::DarkGray),
        )));
    }
    if !view.reply_draft.is_empty() && app.pane != Pane::Reply {
        lines.push(Line::from(Span::styled(
            format!("Draft: {}", view.reply_draft),
            Style::default().fg(Color::Yellow),
        )));
    }

    Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((app.thread_scroll, 0))
        .render(inner, buf);
}

fn render_logs(area: Rect, buf: &mut Buffer, app: &App) {
    let block = pane_block(" Log ".to_string(), false);
    let inner = block.inner(area);
    block.render(area, buf);
    let lines: Vec<Line> = app
        .logs
        .tail(inner.height as usize)
        .into_iter()
        .map(|l| Line::from(Span::styled(l, Style::default().fg(Color::Gray))))
        .collect();
    Paragraph::new(lines).render(inner, buf);
}

fn render_status(area: Rect, buf: &mut Buffer, app: &App) {
    if let Some(ref msg) = app.status_message {
        let style = if app.status_is_error {
            Style::default().fg(Color::Red).bg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Green).bg(Color::DarkGray)
        };
        Paragraph::new(Line::from(Span::styled(format!(" {} ", msg), style)))
            .style(Style::default().bg(Color::DarkGray))
            .render(area, buf);
        return;
    }

    let hints = match app.pane {
        Pane::List => "j/k: move  Enter: open  n/p: page  /: search  c: clear  R: reload  L: log  q: quit",
        Pane::Thread => "j/k: scroll  r: reply  R: reload  L: log  Esc: back",
        Pane::Reply => "Enter: send  Esc: keep draft",
        Pane::Filter => "Enter: apply  Esc: cancel",
    };
    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", app.pane.as_str()),
            Style::default().fg(Color::Cyan),
        ),
        Span::styled("| ", Style::default().fg(Color::Gray)),
        Span::styled(hints, Style::default().fg(Color::Gray)),
    ]);
    Paragraph::new(line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}
