//! Inbox application state and main event loop

use anyhow::{bail, Result};
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::DefaultTerminal;
use tokio_stream::wrappers::WatchStream;

use super::backend::{Backend, BackendCommand, BackendResponse};
use super::input::LineInput;
use super::log_capture::LogBuffer;
use super::ui;
use crate::api::{AdminClient, ApiError};
use crate::auth::{handle_auth_failure, SessionStore};
use crate::commands::truncate;
use crate::config::Config;
use crate::models::AdminStats;
use crate::presence::{PresenceFeed, PresenceState};
use crate::views::thread::UNTITLED;
use crate::views::{online_users_now, ConversationsView, ResolvedPresence, ThreadView};

/// Active pane in the TUI
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    #[default]
    List,
    Thread,
    Reply,
    Filter,
}

impl Pane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pane::List => "inbox",
            Pane::Thread => "thread",
            Pane::Reply => "reply",
            Pane::Filter => "search",
        }
    }
}

/// One line of the inbox list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboxRow {
    Customer {
        name: String,
        email: Option<String>,
        presence: ResolvedPresence,
        sessions: usize,
    },
    Session {
        session_id: String,
        title: String,
        preview: Option<String>,
        message_count: u64,
    },
}

pub struct App {
    pub should_exit: bool,
    pub pane: Pane,
    pub conversations: ConversationsView,
    pub rows: Vec<InboxRow>,
    /// Index into `rows`; always a session row when any exist.
    pub selected: usize,
    pub thread: Option<ThreadView>,
    pub thread_scroll: u16,
    /// Latest published presence.
    pub presence: PresenceState,
    pub stats: Option<AdminStats>,
    pub loading: bool,
    pub reply: LineInput,
    pub filter: LineInput,
    pub status_message: Option<String>,
    pub status_is_error: bool,
    /// Set when the backend rejected our token.
    pub auth_error: Option<ApiError>,
    pub api_base_url: String,
    /// Captured tracing output, shown in the log pane.
    pub logs: LogBuffer,
    pub show_logs: bool,
}

impl App {
    pub fn new(api_base_url: String, logs: LogBuffer) -> Self {
        Self {
            should_exit: false,
            pane: Pane::default(),
            conversations: ConversationsView::new(),
            rows: Vec::new(),
            selected: 0,
            thread: None,
            thread_scroll: 0,
            presence: PresenceState::default(),
            stats: None,
            loading: true,
            reply: LineInput::default(),
            filter: LineInput::default(),
            status_message: None,
            status_is_error: false,
            auth_error: None,
            api_base_url,
            logs,
            show_logs: false,
        }
    }

    pub fn initial_commands(&mut self) -> Vec<BackendCommand> {
        vec![BackendCommand::LoadStats, self.reload()]
    }

    fn reload(&mut self) -> BackendCommand {
        self.loading = true;
        BackendCommand::LoadConversations(self.conversations.query())
    }

    pub fn online_now(&self) -> u64 {
        online_users_now(&self.presence, self.stats.as_ref())
    }

    pub fn selected_session(&self) -> Option<&str> {
        match self.rows.get(self.selected)? {
            InboxRow::Session { session_id, .. } => Some(session_id),
            InboxRow::Customer { .. } => None,
        }
    }

    /// New presence state from the feed.
    pub fn on_presence(&mut self, state: PresenceState) {
        self.presence = state;
        self.rebuild_rows();
    }

    fn rebuild_rows(&mut self) {
        let current = self.selected_session().map(String::from);
        let mut rows = Vec::new();
        for group in self.conversations.groups(&self.presence) {
            rows.push(InboxRow::Customer {
                name: group.display_name.clone(),
                email: group.email.clone().filter(|e| !e.is_empty()),
                presence: ResolvedPresence {
                    is_online: group.is_online,
                    last_seen_at: group.last_seen_at.clone(),
                },
                sessions: group.sessions.len(),
            });
            for conv in &group.sessions {
                rows.push(InboxRow::Session {
                    session_id: conv.session_id.clone(),
                    title: conv
                        .title
                        .clone()
                        .filter(|t| !t.trim().is_empty())
                        .unwrap_or_else(|| UNTITLED.to_string()),
                    preview: conv
                        .last_message
                        .as_ref()
                        .map(|m| format!("{}: {}", m.sender, truncate(&m.content, 60))),
                    message_count: conv.message_count,
                });
            }
        }
        self.rows = rows;

        // Keep the same session selected across presence/data refreshes.
        let keep = current.and_then(|id| {
            self.rows.iter().position(
                |r| matches!(r, InboxRow::Session { session_id, .. } if *session_id == id),
            )
        });
        self.selected = keep.unwrap_or(0);
        if self.selected_session().is_none() {
            self.move_selection(1);
        }
    }

    fn move_selection(&mut self, step: isize) {
        let mut idx = self.selected as isize;
        loop {
            idx += step;
            if idx < 0 || idx as usize >= self.rows.len() {
                return;
            }
            if matches!(self.rows[idx as usize], InboxRow::Session { .. }) {
                self.selected = idx as usize;
                return;
            }
        }
    }

    fn set_status(&mut self, message: impl Into<String>, is_error: bool) {
        self.status_message = Some(message.into());
        self.status_is_error = is_error;
    }

    fn on_error(&mut self, what: &str, err: ApiError) {
        if err.is_unauthorized() {
            self.auth_error = Some(err);
            self.should_exit = true;
            return;
        }
        self.set_status(format!("{}: {}", what, err), true);
    }

    /// Handle one key press; returns backend work to start.
    pub fn handle_key(&mut self, key: KeyEvent) -> Vec<BackendCommand> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_exit = true;
            return Vec::new();
        }
        match self.pane {
            Pane::List => self.handle_list_key(key),
            Pane::Thread => self.handle_thread_key(key),
            Pane::Reply => self.handle_reply_key(key),
            Pane::Filter => self.handle_filter_key(key),
        }
    }

    fn handle_list_key(&mut self, key: KeyEvent) -> Vec<BackendCommand> {
        match key.code {
            KeyCode::Char('q') => self.should_exit = true,
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
            KeyCode::Enter | KeyCode::Right => {
                if let Some(session_key) = self.selected_session().map(String::from) {
                    self.pane = Pane::Thread;
                    self.thread = None;
                    self.thread_scroll = 0;
                    return vec![BackendCommand::LoadThread { session_key }];
                }
            }
            KeyCode::Char('n') => {
                if self.conversations.next_page() {
                    return vec![self.reload()];
                }
            }
            KeyCode::Char('p') => {
                if self.conversations.prev_page() {
                    return vec![self.reload()];
                }
            }
            KeyCode::Char('/') => {
                self.filter = LineInput::with_text(&self.conversations.draft.q);
                self.pane = Pane::Filter;
            }
            KeyCode::Char('c') => {
                self.conversations.clear_filters();
                return vec![self.reload()];
            }
            KeyCode::Char('R') => return vec![BackendCommand::LoadStats, self.reload()],
            KeyCode::Char('L') => self.show_logs = !self.show_logs,
            _ => {}
        }
        Vec::new()
    }

    fn handle_thread_key(&mut self, key: KeyEvent) -> Vec<BackendCommand> {
        match key.code {
            KeyCode::Esc | KeyCode::Left | KeyCode::Char('q') => self.pane = Pane::List,
            KeyCode::Up | KeyCode::Char('k') => {
                self.thread_scroll = self.thread_scroll.saturating_sub(1)
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.thread_scroll = self.thread_scroll.saturating_add(1)
            }
            KeyCode::Char('L') => self.show_logs = !self.show_logs,
            KeyCode::Char('r') => {
                if let Some(thread) = &self.thread {
                    self.reply = LineInput::with_text(&thread.reply_draft);
                    self.pane = Pane::Reply;
                }
            }
            KeyCode::Char('R') => {
                if let Some(thread) = &self.thread {
                    return vec![BackendCommand::LoadThread {
                        session_key: thread.thread().session.session_id.clone(),
                    }];
                }
            }
            _ => {}
        }
        Vec::new()
    }

    fn handle_reply_key(&mut self, key: KeyEvent) -> Vec<BackendCommand> {
        match key.code {
            KeyCode::Esc => {
                if let Some(thread) = self.thread.as_mut() {
                    thread.reply_draft = self.reply.text.clone();
                }
                self.pane = Pane::Thread;
            }
            KeyCode::Enter => {
                let content = self.reply.text.trim().to_string();
                if content.is_empty() {
                    return Vec::new();
                }
                let Some(thread) = self.thread.as_mut() else {
                    return Vec::new();
                };
                thread.reply_draft = content.clone();
                let session_key = thread.thread().session.session_id.clone();
                self.set_status("Sending...", false);
                return vec![BackendCommand::SendReply {
                    session_key,
                    content,
                }];
            }
            _ => edit_line(&mut self.reply, key),
        }
        Vec::new()
    }

    fn handle_filter_key(&mut self, key: KeyEvent) -> Vec<BackendCommand> {
        match key.code {
            KeyCode::Esc => {
                self.conversations.draft.q = self.conversations.committed().q.clone();
                self.pane = Pane::List;
            }
            KeyCode::Enter => {
                self.conversations.apply_filters();
                self.pane = Pane::List;
                return vec![self.reload()];
            }
            _ => {
                edit_line(&mut self.filter, key);
                self.conversations.draft.q = self.filter.text.clone();
            }
        }
        Vec::new()
    }

    /// Handle a backend answer; returns follow-up work.
    pub fn handle_response(&mut self, response: BackendResponse) -> Vec<BackendCommand> {
        match response {
            BackendResponse::Stats(result) => match result {
                Ok(stats) => self.stats = Some(stats),
                Err(e) => self.on_error("Stats", e),
            },
            BackendResponse::Conversations { query, result } => {
                if query != self.conversations.query()
                    || matches!(result, Err(ApiError::Cancelled))
                {
                    return Vec::new();
                }
                self.loading = false;
                match result {
                    Ok(data) => {
                        self.conversations.set_data(data);
                        self.rebuild_rows();
                    }
                    Err(e) => self.on_error("Conversations", e),
                }
            }
            BackendResponse::Thread {
                session_key,
                result,
            } => {
                if self.selected_session() != Some(session_key.as_str()) {
                    return Vec::new();
                }
                match result {
                    Ok(thread) => {
                        let draft = self
                            .thread
                            .take()
                            .filter(|t| t.thread().session.session_id == session_key)
                            .map(|t| t.reply_draft)
                            .unwrap_or_default();
                        let mut view = ThreadView::new(thread);
                        view.reply_draft = draft;
                        self.thread = Some(view);
                    }
                    Err(e) => self.on_error("Conversation", e),
                }
            }
            BackendResponse::ReplySent {
                session_key,
                result,
            } => match result {
                Ok(message) => {
                    if let Some(thread) = self.thread.as_mut() {
                        if thread.thread().session.session_id == session_key {
                            thread.on_reply_sent(message);
                        }
                    }
                    self.reply.clear();
                    if self.pane == Pane::Reply {
                        self.pane = Pane::Thread;
                    }
                    self.set_status("Reply sent.", false);
                }
                Err(e) => self.on_error("Reply", e),
            },
        }
        Vec::new()
    }
}

fn edit_line(input: &mut LineInput, key: KeyEvent) {
    match key.code {
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => input.clear(),
        KeyCode::Char(c) => input.insert_char(c),
        KeyCode::Backspace => input.backspace(),
        KeyCode::Delete => input.delete(),
        KeyCode::Left => input.move_left(),
        KeyCode::Right => input.move_right(),
        KeyCode::Home => input.move_home(),
        KeyCode::End => input.move_end(),
        _ => {}
    }
}

/// Run the inbox until the operator quits.
pub async fn run(config: &Config, logs: LogBuffer) -> Result<()> {
    let mut store = SessionStore::open()?;
    let token = store.get();
    if token.is_empty() {
        bail!("Not logged in. Run 'support-console login' first.");
    }

    let mut backend = Backend::start(AdminClient::new(config)?, token.clone());
    let mut feed = PresenceFeed::new(&config.api_base_url);
    feed.set_token(&token);

    let mut app = App::new(config.api_base_url.clone(), logs);
    for cmd in app.initial_commands() {
        backend.send(cmd);
    }

    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, &mut app, &mut backend, &feed).await;
    ratatui::restore();
    feed.teardown();

    if let Some(err) = app.auth_error.take() {
        handle_auth_failure(&anyhow::Error::from(err), &mut store);
    }
    result
}

async fn event_loop(
    terminal: &mut DefaultTerminal,
    app: &mut App,
    backend: &mut Backend,
    feed: &PresenceFeed,
) -> Result<()> {
    let mut events = EventStream::new();
    let mut presence = WatchStream::new(feed.view().receiver());

    while !app.should_exit {
        terminal.draw(|frame| ui::render(frame, app))?;

        tokio::select! {
            maybe_event = events.next() => match maybe_event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    for cmd in app.handle_key(key) {
                        backend.send(cmd);
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => break,
            },
            Some(response) = backend.recv() => {
                for cmd in app.handle_response(response) {
                    backend.send(cmd);
                }
            }
            Some(state) = presence.next() => app.on_presence(state),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AdminUser, ConversationSummary, ConversationThread, Page, ThreadSession};
    use crate::presence::state::record;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn conv(session: &str, id: i64) -> ConversationSummary {
        ConversationSummary {
            session_id: session.into(),
            title: None,
            created_at: None,
            user: AdminUser {
                id: Some(id),
                full_name: Some(format!("Customer {}", id)),
                ..Default::default()
            },
            is_online: false,
            last_seen_at: None,
            message_count: 2,
            last_message: None,
        }
    }

    fn loaded_app() -> App {
        let mut app = App::new("http://localhost:5050".into(), LogBuffer::new());
        app.initial_commands();
        let query = app.conversations.query();
        app.handle_response(BackendResponse::Conversations {
            query,
            result: Ok(Page {
                page: 1,
                limit: 20,
                total: 3,
                total_pages: 2,
                items: vec![conv("a", 1), conv("b", 2), conv("c", 1)],
            }),
        });
        app
    }

    #[test]
    fn test_rows_group_by_customer_and_skip_headers() {
        let mut app = loaded_app();
        assert!(!app.loading);
        assert_eq!(app.rows.len(), 5);
        assert_eq!(app.selected_session(), Some("a"));
        app.handle_key(key(KeyCode::Down));
        assert_eq!(app.selected_session(), Some("c"));
        app.handle_key(key(KeyCode::Down));
        assert_eq!(app.selected_session(), Some("b"));
        app.handle_key(key(KeyCode::Down));
        assert_eq!(app.selected_session(), Some("b"));
    }

    #[test]
    fn test_presence_updates_rows_and_keeps_selection() {
        let mut app = loaded_app();
        app.handle_key(key(KeyCode::Down));
        let mut state = PresenceState::default();
        state.on_connected();
        state.apply_snapshot(vec![record("id:2", true, None)]);
        app.on_presence(state);

        assert_eq!(app.selected_session(), Some("c"));
        assert_eq!(app.online_now(), 1);
        let online: Vec<bool> = app
            .rows
            .iter()
            .filter_map(|r| match r {
                InboxRow::Customer { presence, .. } => Some(presence.is_online),
                _ => None,
            })
            .collect();
        assert_eq!(online, vec![false, true]);
    }

    #[test]
    fn test_filter_commits_on_enter_only() {
        let mut app = loaded_app();
        app.handle_key(key(KeyCode::Char('n')));
        assert_eq!(app.conversations.pager().page(), 2);

        app.handle_key(key(KeyCode::Char('/')));
        for c in "refund".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        assert_eq!(app.conversations.query().q, "");

        let cmds = app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.pane, Pane::List);
        match cmds.as_slice() {
            [BackendCommand::LoadConversations(query)] => {
                assert_eq!(query.q, "refund");
                assert_eq!(query.page, 1);
            }
            _ => panic!("expected a reload"),
        }
    }

    #[test]
    fn test_reply_flow_and_unauthorized_exit() {
        let mut app = loaded_app();
        let cmds = app.handle_key(key(KeyCode::Enter));
        assert!(matches!(
            cmds.as_slice(),
            [BackendCommand::LoadThread { session_key }] if session_key == "a"
        ));
        app.handle_response(BackendResponse::Thread {
            session_key: "a".into(),
            result: Ok(ConversationThread {
                session: ThreadSession {
                    session_id: "a".into(),
                    title: None,
                    created_at: None,
                    user: AdminUser::default(),
                    is_online: false,
                    last_seen_at: None,
                    open_ticket_count: 0,
                },
                messages: vec![],
                tickets: vec![],
            }),
        });
        assert!(app.thread.is_some());

        app.handle_key(key(KeyCode::Char('r')));
        assert_eq!(app.pane, Pane::Reply);
        app.handle_key(key(KeyCode::Char('h')));
        app.handle_key(key(KeyCode::Char('i')));
        let cmds = app.handle_key(key(KeyCode::Enter));
        assert!(matches!(
            cmds.as_slice(),
            [BackendCommand::SendReply { content, .. }] if content == "hi"
        ));

        app.handle_response(BackendResponse::ReplySent {
            session_key: "a".into(),
            result: Err(ApiError::Unauthorized),
        });
        assert!(app.should_exit);
        assert_eq!(app.auth_error, Some(ApiError::Unauthorized));
    }

    #[test]
    fn test_stale_page_is_ignored() {
        let mut app = loaded_app();
        let first_page = app.conversations.query();
        app.handle_key(key(KeyCode::Char('n')));
        app.handle_response(BackendResponse::Conversations {
            query: first_page,
            result: Ok(Page::default()),
        });
        assert_eq!(app.rows.len(), 5);
    }

    #[test]
    fn test_answer_for_previous_filters_is_ignored() {
        let mut app = App::new("http://localhost:5050".into(), LogBuffer::new());
        let unfiltered = app.conversations.query();

        app.handle_key(key(KeyCode::Char('/')));
        for c in "refund".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        app.handle_key(key(KeyCode::Enter));
        let filtered = app.conversations.query();
        assert_eq!(filtered.page, unfiltered.page);

        app.handle_response(BackendResponse::Conversations {
            query: filtered,
            result: Ok(Page {
                page: 1,
                limit: 20,
                total: 1,
                total_pages: 1,
                items: vec![conv("refund-only", 1)],
            }),
        });
        app.handle_response(BackendResponse::Conversations {
            query: unfiltered,
            result: Ok(Page {
                page: 1,
                limit: 20,
                total: 2,
                total_pages: 1,
                items: vec![conv("u1", 2), conv("u2", 3)],
            }),
        });

        assert_eq!(app.conversations.committed().q, "refund");
        assert_eq!(app.selected_session(), Some("refund-only"));
        assert_eq!(app.conversations.total(), 1);

        // A superseded load of the same query is not an error.
        let current = app.conversations.query();
        app.handle_response(BackendResponse::Conversations {
            query: current,
            result: Err(ApiError::Cancelled),
        });
        assert!(app.status_message.is_none());
        assert_eq!(app.conversations.total(), 1);
    }

    #[test]
    fn test_log_pane_toggles_outside_inputs() {
        let mut app = loaded_app();
        app.handle_key(key(KeyCode::Char('L')));
        assert!(app.show_logs);

        app.handle_key(key(KeyCode::Char('/')));
        app.handle_key(key(KeyCode::Char('L')));
        assert!(app.show_logs);
        assert_eq!(app.filter.text, "L");
    }
}
