// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table};
use roster_app::{
    ApiError, AppCommand, AppMode, AppState, CommitOutcome, CommitRequest, CommitStart,
    EditOutcome, FetchOutcome, FetchRequest, FormKind, HelpVisibility, ListController, LoadPhase,
    User, UserDirectory, UserField, UserForm, UserId, UserUpdate,
};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use tracing::debug;

const TABLE_FIELDS: [UserField; 3] = UserField::ALL;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiTiming {
    /// Wait between a successful save and the re-fetch that follows it.
    pub refresh_delay: Duration,
    /// Lifetime of a status line notice.
    pub status_ttl: Duration,
}

impl Default for UiTiming {
    fn default() -> Self {
        Self {
            refresh_delay: Duration::from_secs(1),
            status_ttl: Duration::from_secs(4),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundRequest {
    Search(FetchRequest),
    Commit(CommitRequest),
    SaveForm { kind: FormKind, update: UserUpdate },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus {
        token: u64,
    },
    RefreshDue(FetchRequest),
    SearchFinished {
        seq: u64,
        result: Result<Vec<User>, ApiError>,
    },
    CommitFinished(Result<Vec<User>, ApiError>),
    FormSaved {
        kind: FormKind,
        result: Result<User, ApiError>,
    },
}

/// Runs `request` against `directory` and wraps the reply for the event
/// loop.
pub fn execute_request<D>(directory: &D, request: BackgroundRequest) -> InternalEvent
where
    D: UserDirectory + ?Sized,
{
    match request {
        BackgroundRequest::Search(fetch) => InternalEvent::SearchFinished {
            seq: fetch.seq,
            result: directory.search_users(fetch.name.as_deref()),
        },
        BackgroundRequest::Commit(commit) => {
            InternalEvent::CommitFinished(directory.update_users(&commit.updates))
        }
        BackgroundRequest::SaveForm { kind, update } => InternalEvent::FormSaved {
            kind,
            result: directory.update_user(&update),
        },
    }
}

pub trait AppRuntime {
    fn directory(&self) -> &dyn UserDirectory;

    fn timing(&self) -> UiTiming {
        UiTiming::default()
    }

    /// Starts `request` and reports its reply on `tx`. The default runs the
    /// request inline; runtimes that talk to a real server override this to
    /// keep the event loop responsive.
    fn dispatch_request(
        &mut self,
        request: BackgroundRequest,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let event = execute_request(self.directory(), request);
        tx.send(event)
            .map_err(|_| anyhow!("request event channel closed"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FormUiState {
    form: UserForm,
    field_index: usize,
    error: Option<String>,
    saving: bool,
}

impl FormUiState {
    fn new(form: UserForm) -> Self {
        Self {
            form,
            field_index: 0,
            error: None,
            saving: false,
        }
    }

    fn field(&self) -> UserField {
        TABLE_FIELDS[self.field_index % TABLE_FIELDS.len()]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct ViewData {
    list: ListController,
    selected_row: usize,
    selected_col: usize,
    search_input: String,
    cell_input: String,
    cell_target: Option<(UserId, UserField)>,
    form: Option<FormUiState>,
    status_token: u64,
    timing: UiTiming,
}

pub fn run_app<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    initial_search: &str,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData {
        timing: runtime.timing(),
        ..ViewData::default()
    };
    let (internal_tx, internal_rx) = mpsc::channel();

    start_search(state, runtime, &mut view_data, &internal_tx, initial_search);

    let mut result = Ok(());
    loop {
        process_internal_events(state, runtime, &mut view_data, &internal_tx, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(Duration::from_millis(120)).context("poll event")?;
        if has_event {
            match event::read().context("read event")? {
                Event::Key(key) => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        handle_internal_event(state, runtime, view_data, tx, event);
    }
}

fn handle_internal_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    event: InternalEvent,
) {
    match event {
        InternalEvent::ClearStatus { token } if token == view_data.status_token => {
            state.dispatch(AppCommand::ClearStatus);
        }
        InternalEvent::ClearStatus { .. } => {}
        InternalEvent::RefreshDue(request) => {
            if request.seq == view_data.list.latest_seq() {
                dispatch(state, runtime, view_data, tx, BackgroundRequest::Search(request));
            } else {
                debug!(seq = request.seq, "skipping superseded refresh");
            }
        }
        InternalEvent::SearchFinished { seq, result } => {
            match view_data.list.finish_fetch(seq, result) {
                FetchOutcome::Loaded(_) => clamp_selection(view_data),
                FetchOutcome::Failed => {
                    clamp_selection(view_data);
                    let message = view_data.list.fetch_error().unwrap_or_default().to_owned();
                    emit_status(state, view_data, tx, format!("search failed: {message}"));
                }
                FetchOutcome::Stale => {}
            }
        }
        InternalEvent::CommitFinished(result) => match view_data.list.finish_commit(result) {
            CommitOutcome::Committed { refresh, .. } => {
                let notice = view_data.list.commit_notice().unwrap_or_default().to_owned();
                emit_status(state, view_data, tx, notice);
                schedule_refresh(tx, view_data.timing.refresh_delay, refresh);
            }
            CommitOutcome::Failed => {
                let message = view_data.list.commit_error().unwrap_or_default().to_owned();
                emit_status(state, view_data, tx, format!("save failed: {message}"));
            }
        },
        InternalEvent::FormSaved { kind, result } => match result {
            Ok(_) => {
                if view_data
                    .form
                    .as_ref()
                    .is_some_and(|form| form.form.kind == kind)
                {
                    view_data.form = None;
                    state.dispatch(AppCommand::ExitToNav);
                }
                emit_status(state, view_data, tx, kind.success_message());
                let refresh = view_data.list.begin_refresh();
                schedule_refresh(tx, view_data.timing.refresh_delay, refresh);
            }
            Err(error) => {
                if let Some(form) = view_data.form.as_mut()
                    && form.form.kind == kind
                {
                    form.saving = false;
                    form.error = Some(error.message);
                } else {
                    emit_status(state, view_data, tx, format!("save failed: {error}"));
                }
            }
        },
    }
}

/// Hands `request` to the runtime. If it cannot even start, the failure is
/// fed back through the same path a failed reply would take.
fn dispatch<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    request: BackgroundRequest,
) {
    if let Err(error) = runtime.dispatch_request(request.clone(), tx.clone()) {
        let error = ApiError::new(format!("{error:#}"));
        let event = match request {
            BackgroundRequest::Search(fetch) => InternalEvent::SearchFinished {
                seq: fetch.seq,
                result: Err(error),
            },
            BackgroundRequest::Commit(_) => InternalEvent::CommitFinished(Err(error)),
            BackgroundRequest::SaveForm { kind, .. } => InternalEvent::FormSaved {
                kind,
                result: Err(error),
            },
        };
        handle_internal_event(state, runtime, view_data, tx, event);
    }
}

fn start_search<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    term: &str,
) {
    let request = view_data.list.begin_search(term);
    view_data.selected_row = 0;
    dispatch(state, runtime, view_data, tx, BackgroundRequest::Search(request));
}

fn schedule_refresh(internal_tx: &Sender<InternalEvent>, delay: Duration, request: FetchRequest) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(delay);
        let _ = sender.send(InternalEvent::RefreshDue(request));
    });
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, ttl: Duration, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(ttl);
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.dispatch(AppCommand::SetStatus(message.into()));
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.timing.status_ttl, view_data.status_token);
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if state.help == HelpVisibility::Visible {
        if key.code == KeyCode::Esc || key.code == KeyCode::Char('?') {
            state.dispatch(AppCommand::ToggleHelp);
        }
        return false;
    }

    match state.mode {
        AppMode::Nav => handle_nav_key(state, runtime, view_data, internal_tx, key),
        AppMode::Search => {
            handle_search_key(state, runtime, view_data, internal_tx, key);
            false
        }
        AppMode::CellEdit => {
            handle_cell_edit_key(state, view_data, internal_tx, key);
            false
        }
        AppMode::Form(_) => {
            handle_form_key(state, runtime, view_data, internal_tx, key);
            false
        }
    }
}

fn handle_nav_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('j') | KeyCode::Down => move_row(view_data, 1),
        KeyCode::Char('k') | KeyCode::Up => move_row(view_data, -1),
        KeyCode::Char('h') => move_col(view_data, -1),
        KeyCode::Char('l') => move_col(view_data, 1),
        KeyCode::Char('n') | KeyCode::Right => {
            view_data.list.next_page();
            view_data.selected_row = 0;
        }
        KeyCode::Char('p') | KeyCode::Left => {
            view_data.list.prev_page();
            view_data.selected_row = 0;
        }
        KeyCode::Char('g') => {
            view_data.list.change_page(1);
            view_data.selected_row = 0;
        }
        KeyCode::Char('G') => {
            view_data.list.last_page();
            view_data.selected_row = 0;
        }
        KeyCode::Char('/') => {
            view_data.search_input = view_data.list.search_term().unwrap_or_default().to_owned();
            state.dispatch(AppCommand::StartSearch);
        }
        KeyCode::Char('c') => {
            if view_data.list.search_term().is_some() {
                view_data.search_input.clear();
                start_search(state, runtime, view_data, internal_tx, "");
                emit_status(state, view_data, internal_tx, "search cleared");
            } else {
                emit_status(state, view_data, internal_tx, "no search filter active");
            }
        }
        KeyCode::Enter => begin_cell_edit(state, view_data, internal_tx),
        KeyCode::Char('a') => {
            view_data.form = Some(FormUiState::new(UserForm::create()));
            state.dispatch(AppCommand::OpenForm(FormKind::Create));
        }
        KeyCode::Char('e') => match selected_user(view_data).map(UserForm::edit) {
            Some(form) => {
                let kind = form.kind;
                view_data.form = Some(FormUiState::new(form));
                state.dispatch(AppCommand::OpenForm(kind));
            }
            None => emit_status(state, view_data, internal_tx, "no user selected"),
        },
        KeyCode::Char('s') => commit_pending(state, runtime, view_data, internal_tx),
        KeyCode::Char('x') => {
            if view_data.list.edits().is_empty() {
                emit_status(state, view_data, internal_tx, "no pending edits");
            } else {
                view_data.list.discard();
                emit_status(state, view_data, internal_tx, "pending edits discarded");
            }
        }
        KeyCode::Char('r') => {
            let request = view_data.list.begin_refresh();
            dispatch(state, runtime, view_data, internal_tx, BackgroundRequest::Search(request));
        }
        KeyCode::Char('?') => {
            state.dispatch(AppCommand::ToggleHelp);
        }
        _ => {}
    }
    false
}

fn handle_search_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Esc => {
            state.dispatch(AppCommand::ExitToNav);
        }
        KeyCode::Enter => {
            let term = view_data.search_input.clone();
            state.dispatch(AppCommand::ExitToNav);
            start_search(state, runtime, view_data, internal_tx, &term);
        }
        KeyCode::Backspace => {
            view_data.search_input.pop();
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            view_data.search_input.push(ch);
        }
        _ => {}
    }
}

fn begin_cell_edit(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let field = TABLE_FIELDS[view_data.selected_col.min(TABLE_FIELDS.len() - 1)];
    let Some(user) = selected_user(view_data) else {
        emit_status(state, view_data, internal_tx, "no user selected");
        return;
    };
    let id = user.id;
    let value = view_data.list.display_value(user, field);
    view_data.cell_input = value;
    view_data.cell_target = Some((id, field));
    state.dispatch(AppCommand::EditCell);
}

fn handle_cell_edit_key(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Esc => {
            view_data.cell_target = None;
            state.dispatch(AppCommand::ExitToNav);
        }
        KeyCode::Enter => {
            let Some((id, field)) = view_data.cell_target.take() else {
                state.dispatch(AppCommand::ExitToNav);
                return;
            };
            let outcome = view_data.list.propose_edit(id, field, &view_data.cell_input);
            state.dispatch(AppCommand::ExitToNav);
            let message = match outcome {
                EditOutcome::Staged => format!("{} changed; press s to save", field.label()),
                EditOutcome::Reverted => format!("{} matches the saved value", field.label()),
                EditOutcome::UnknownRecord => "user is no longer in the list".to_owned(),
            };
            emit_status(state, view_data, internal_tx, message);
        }
        KeyCode::Backspace => {
            view_data.cell_input.pop();
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            view_data.cell_input.push(ch);
        }
        _ => {}
    }
}

fn handle_form_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    if key.code == KeyCode::Esc {
        view_data.form = None;
        state.dispatch(AppCommand::ExitToNav);
        emit_status(state, view_data, internal_tx, "form canceled");
        return;
    }

    let submit = key.code == KeyCode::Enter
        || (key.code == KeyCode::Char('s') && key.modifiers.contains(KeyModifiers::CONTROL));

    let Some(form) = view_data.form.as_mut() else {
        state.dispatch(AppCommand::ExitToNav);
        return;
    };
    if form.saving {
        return;
    }

    if submit {
        match form.form.submission() {
            Ok(update) => {
                form.saving = true;
                form.error = None;
                let request = BackgroundRequest::SaveForm {
                    kind: form.form.kind,
                    update,
                };
                dispatch(state, runtime, view_data, internal_tx, request);
            }
            Err(error) => form.error = Some(error.to_string()),
        }
        return;
    }

    match key.code {
        KeyCode::Tab | KeyCode::Down => {
            form.field_index = (form.field_index + 1) % TABLE_FIELDS.len();
        }
        KeyCode::BackTab | KeyCode::Up => {
            form.field_index = (form.field_index + TABLE_FIELDS.len() - 1) % TABLE_FIELDS.len();
        }
        KeyCode::Backspace => {
            let field = form.field();
            form.form.input.value_mut(field).pop();
            form.error = None;
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            let field = form.field();
            form.form.input.value_mut(field).push(ch);
            form.error = None;
        }
        _ => {}
    }
}

fn commit_pending<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    match view_data.list.begin_commit() {
        CommitStart::Nothing => emit_status(state, view_data, internal_tx, "no pending edits"),
        CommitStart::Busy => emit_status(state, view_data, internal_tx, "save already in progress"),
        CommitStart::Ready(request) => {
            let count = request.updates.len();
            emit_status(
                state,
                view_data,
                internal_tx,
                format!("saving {count} user{}...", plural(count)),
            );
            dispatch(state, runtime, view_data, internal_tx, BackgroundRequest::Commit(request));
        }
    }
}

fn move_row(view_data: &mut ViewData, delta: isize) {
    let len = view_data.list.page_users().len();
    if len == 0 {
        view_data.selected_row = 0;
        return;
    }
    let next = (view_data.selected_row as isize + delta).clamp(0, len as isize - 1);
    view_data.selected_row = next as usize;
}

fn move_col(view_data: &mut ViewData, delta: isize) {
    let max = TABLE_FIELDS.len() as isize - 1;
    view_data.selected_col = (view_data.selected_col as isize + delta).clamp(0, max) as usize;
}

fn clamp_selection(view_data: &mut ViewData) {
    let len = view_data.list.page_users().len();
    view_data.selected_row = view_data.selected_row.min(len.saturating_sub(1));
}

fn selected_user(view_data: &ViewData) -> Option<&User> {
    view_data.list.page_users().get(view_data.selected_row)
}

const fn plural(count: usize) -> &'static str {
    if count == 1 { "" } else { "s" }
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let pending = pending_bar_text(&view_data.list);
    let pending_height = if pending.is_empty() {
        0
    } else {
        pending.lines().count() as u16 + 2
    };
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(pending_height),
            Constraint::Length(4),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let header = Paragraph::new(header_text(state, view_data))
        .block(Block::default().title("roster").borders(Borders::ALL));
    frame.render_widget(header, layout[0]);

    render_body(frame, layout[1], state, view_data);

    if !pending.is_empty() {
        let style = if view_data.list.commit_error().is_some() {
            Style::default().fg(Color::Red)
        } else {
            Style::default().fg(Color::Green)
        };
        let bar = Paragraph::new(pending)
            .style(style)
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(bar, layout[2]);
    }

    let pager = Paragraph::new(pager_text(&view_data.list))
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(pager, layout[3]);

    let status_widget = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status_widget, layout[4]);

    if let Some(form) = &view_data.form {
        let area = centered_rect(60, 40, frame.area());
        frame.render_widget(Clear, area);
        let overlay = Paragraph::new(render_form_text(form)).block(
            Block::default()
                .title(form.form.kind.title())
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Cyan)),
        );
        frame.render_widget(overlay, area);
    }

    if state.help == HelpVisibility::Visible {
        let area = centered_rect(70, 60, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn render_body(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    state: &AppState,
    view_data: &ViewData,
) {
    let list = &view_data.list;
    let message = match list.phase() {
        LoadPhase::Idle => Some(("Waiting for first search...".to_owned(), Color::White)),
        LoadPhase::Loading if list.users().is_empty() => {
            Some(("Loading users...".to_owned(), Color::White))
        }
        LoadPhase::Failed => Some((
            format!("Error: {}", list.fetch_error().unwrap_or_default()),
            Color::Red,
        )),
        _ if list.users().is_empty() => Some((
            "No users found\nThere are no users to display.".to_owned(),
            Color::White,
        )),
        _ => None,
    };
    if let Some((text, color)) = message {
        let body = Paragraph::new(text)
            .style(Style::default().fg(color))
            .block(Block::default().borders(Borders::ALL).title("users"));
        frame.render_widget(body, area);
        return;
    }

    let header_cells = std::iter::once("ID")
        .chain(TABLE_FIELDS.iter().map(|field| field.label()))
        .map(|label| {
            Cell::from(label).style(
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            )
        });
    let header = Row::new(header_cells);

    let editing = match state.mode {
        AppMode::CellEdit => view_data.cell_target,
        _ => None,
    };
    let rows = list
        .page_users()
        .iter()
        .enumerate()
        .map(|(row_index, user)| {
            let selected_row = row_index == view_data.selected_row;
            let row_style = if selected_row {
                Style::default().bg(Color::DarkGray)
            } else {
                Style::default()
            };
            let mut cells = vec![Cell::from(user.id.to_string()).style(row_style)];
            for (column_index, field) in TABLE_FIELDS.iter().copied().enumerate() {
                let text = if editing == Some((user.id, field)) {
                    format!("{}_", view_data.cell_input)
                } else {
                    list.display_value(user, field)
                };
                let mut style = row_style;
                if list.edits().is_dirty(user.id, field) {
                    style = style.fg(Color::Yellow).add_modifier(Modifier::BOLD);
                }
                if selected_row && column_index == view_data.selected_col {
                    style = Style::default()
                        .fg(Color::Black)
                        .bg(Color::Cyan)
                        .add_modifier(Modifier::BOLD);
                }
                cells.push(Cell::from(text).style(style));
            }
            Row::new(cells)
        });

    let widths = [
        Constraint::Length(6),
        Constraint::Min(12),
        Constraint::Min(20),
        Constraint::Length(12),
    ];
    let title = if list.is_loading() {
        "users (loading)"
    } else {
        "users"
    };
    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(Block::default().title(title).borders(Borders::ALL));
    frame.render_widget(table, area);
}

fn header_text(state: &AppState, view_data: &ViewData) -> String {
    if state.mode == AppMode::Search {
        return format!("search: {}_", view_data.search_input);
    }
    search_summary_text(&view_data.list).unwrap_or_else(|| "All users".to_owned())
}

fn search_summary_text(list: &ListController) -> Option<String> {
    let term = list.search_term()?;
    let found = list.users().len();
    Some(format!(
        "Search results for: \"{term}\" - Found {found} user{}",
        plural(found)
    ))
}

fn pending_bar_text(list: &ListController) -> String {
    let mut lines = Vec::new();
    if list.edits().has_changes() {
        let count = list.edits().dirty_count();
        let action = if list.is_committing() {
            "Updating..."
        } else {
            "s update users | x discard changes"
        };
        lines.push(format!("{count} user{} modified | {action}", plural(count)));
    }
    if let Some(error) = list.commit_error() {
        lines.push(format!("Error: {error}"));
    }
    lines.join("\n")
}

fn pagination_text(list: &ListController) -> Option<String> {
    let view = list.page_view();
    if view.total_pages() <= 1 {
        return None;
    }
    let pages = view
        .window()
        .into_iter()
        .map(|page| {
            if page == view.page {
                format!("[{page}]")
            } else {
                page.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    let prev = if view.has_prev() { "< Previous" } else { "  Previous" };
    let next = if view.has_next() { "Next >" } else { "Next  " };
    Some(format!("{prev}  {pages}  {next}"))
}

fn footer_text(list: &ListController) -> Option<String> {
    if list.users().is_empty() {
        return None;
    }
    Some(format!(
        "Showing {} of {} users (Page {} of {})",
        list.page_users().len(),
        list.users().len(),
        list.page(),
        list.total_pages()
    ))
}

fn pager_text(list: &ListController) -> String {
    [pagination_text(list), footer_text(list)]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_form_text(form: &FormUiState) -> String {
    let mut lines = TABLE_FIELDS
        .iter()
        .enumerate()
        .map(|(index, field)| {
            let value = form.form.input.value(*field);
            if index == form.field_index {
                format!("> {}: {value}_", field.label())
            } else {
                format!("  {}: {value}", field.label())
            }
        })
        .collect::<Vec<_>>();
    lines.push(String::new());
    if form.saving {
        lines.push("Saving...".to_owned());
    } else if let Some(error) = &form.error {
        lines.push(format!("Error: {error}"));
    }
    lines.push("birthdate format: YYYY-MM-DD".to_owned());
    lines.join("\n")
}

fn status_text(state: &AppState, view_data: &ViewData) -> String {
    if state.help == HelpVisibility::Visible {
        return String::new();
    }

    let (mode, hints) = match state.mode {
        AppMode::Nav => (
            "NAV",
            "j/k/h/l move | n/p page | / search | enter edit | a add | e form | s save | x discard | r refresh | ? help | q quit",
        ),
        AppMode::Search => ("SEARCH", "type a name | enter apply | esc cancel"),
        AppMode::CellEdit => ("EDIT", "enter stage | esc cancel"),
        AppMode::Form(_) => ("FORM", "tab/shift+tab field | enter or ctrl+s save | esc cancel"),
    };
    let hints = if matches!(state.mode, AppMode::Nav) && view_data.list.is_committing() {
        format!("saving... | {hints}")
    } else {
        hints.to_owned()
    };
    match &state.status_line {
        Some(status) => format!("{mode} | {status} | {hints}"),
        None => format!("{mode} | {hints}"),
    }
}

fn help_overlay_text() -> &'static str {
    "global: ctrl+q quit | ? help\n\
nav: j/k rows | h/l columns | n/p or right/left pages | g/G first/last page\n\
nav: / search | c clear search | r refresh | q quit\n\
edit: enter edit cell | s save pending edits | x discard pending edits\n\
users: a add user | e edit selected user\n\
search: type a name | enter apply | esc cancel\n\
cell edit: type a value | enter stage | esc cancel\n\
form: tab/shift+tab field | enter or ctrl+s submit | esc cancel"
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::{
        AppRuntime, BackgroundRequest, InternalEvent, UiTiming, ViewData, execute_request,
        footer_text, handle_internal_event, handle_key_event, help_overlay_text,
        pagination_text, pending_bar_text, render_form_text, search_summary_text, status_text,
    };
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use roster_app::{
        ApiError, AppMode, AppState, FormKind, HelpVisibility, UserDirectory, UserField, UserId,
    };
    use roster_testkit::{FakeDirectory, fixture_users, sample_users};
    use std::sync::mpsc;
    use std::time::Duration;

    struct TestRuntime {
        directory: FakeDirectory,
        dispatch_error: bool,
    }

    impl TestRuntime {
        fn new(users: Vec<roster_app::User>) -> Self {
            Self {
                directory: FakeDirectory::new(users),
                dispatch_error: false,
            }
        }
    }

    impl AppRuntime for TestRuntime {
        fn directory(&self) -> &dyn UserDirectory {
            &self.directory
        }

        fn timing(&self) -> UiTiming {
            UiTiming {
                refresh_delay: Duration::ZERO,
                status_ttl: Duration::from_secs(600),
            }
        }

        fn dispatch_request(
            &mut self,
            request: BackgroundRequest,
            tx: mpsc::Sender<InternalEvent>,
        ) -> anyhow::Result<()> {
            if self.dispatch_error {
                return Err(anyhow::anyhow!("worker pool unavailable"));
            }
            tx.send(execute_request(&self.directory, request))
                .map_err(|_| anyhow::anyhow!("request event channel closed"))?;
            Ok(())
        }
    }

    struct Harness {
        state: AppState,
        runtime: TestRuntime,
        view_data: ViewData,
        tx: mpsc::Sender<InternalEvent>,
        rx: mpsc::Receiver<InternalEvent>,
    }

    impl Harness {
        fn new(users: Vec<roster_app::User>) -> Self {
            let runtime = TestRuntime::new(users);
            let (tx, rx) = mpsc::channel();
            Self {
                state: AppState::default(),
                view_data: ViewData {
                    timing: runtime.timing(),
                    ..ViewData::default()
                },
                runtime,
                tx,
                rx,
            }
        }

        fn loaded(users: Vec<roster_app::User>) -> Self {
            let mut harness = Self::new(users);
            harness.press(KeyCode::Char('r'));
            harness.pump();
            harness
        }

        fn key(&mut self, key: KeyEvent) -> bool {
            handle_key_event(
                &mut self.state,
                &mut self.runtime,
                &mut self.view_data,
                &self.tx,
                key,
            )
        }

        fn press(&mut self, code: KeyCode) -> bool {
            self.key(KeyEvent::new(code, KeyModifiers::NONE))
        }

        fn type_text(&mut self, text: &str) {
            for ch in text.chars() {
                self.press(KeyCode::Char(ch));
            }
        }

        fn handle(&mut self, event: InternalEvent) {
            handle_internal_event(
                &mut self.state,
                &mut self.runtime,
                &mut self.view_data,
                &self.tx,
                event,
            );
        }

        /// Handles everything already queued.
        fn pump(&mut self) {
            while let Ok(event) = self.rx.try_recv() {
                self.handle(event);
            }
        }

        /// Waits for `count` events, including ones sent from timer threads.
        fn wait_for(&mut self, count: usize) {
            for _ in 0..count {
                let event = self
                    .rx
                    .recv_timeout(Duration::from_secs(2))
                    .expect("event should arrive");
                self.handle(event);
            }
        }
    }

    #[test]
    fn ctrl_q_and_q_quit_from_nav() {
        let mut harness = Harness::new(fixture_users());
        assert!(harness.key(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::CONTROL)));
        assert!(harness.press(KeyCode::Char('q')));
    }

    #[test]
    fn search_mode_captures_text_and_applies_term() {
        let mut harness = Harness::loaded(fixture_users());
        assert_eq!(harness.view_data.list.users().len(), 4);

        harness.press(KeyCode::Char('/'));
        assert_eq!(harness.state.mode, AppMode::Search);
        harness.type_text("aliq");
        harness.press(KeyCode::Backspace);
        assert!(!harness.press(KeyCode::Char('q')));
        harness.press(KeyCode::Backspace);
        harness.press(KeyCode::Enter);
        harness.pump();

        assert_eq!(harness.state.mode, AppMode::Nav);
        assert_eq!(harness.view_data.list.search_term(), Some("ali"));
        assert_eq!(
            search_summary_text(&harness.view_data.list).as_deref(),
            Some("Search results for: \"ali\" - Found 2 users")
        );

        harness.press(KeyCode::Char('c'));
        harness.pump();
        assert_eq!(harness.view_data.list.search_term(), None);
        assert_eq!(harness.view_data.list.users().len(), 4);
    }

    #[test]
    fn superseded_search_reply_is_ignored() {
        let mut harness = Harness::loaded(fixture_users());
        let stale_seq = harness.view_data.list.latest_seq();
        harness.view_data.list.begin_search("zzz");

        harness.handle(InternalEvent::SearchFinished {
            seq: stale_seq,
            result: Ok(sample_users(30)),
        });
        assert!(harness.view_data.list.is_loading());
        assert_eq!(harness.view_data.list.users().len(), 4);
    }

    #[test]
    fn inline_edit_save_and_refresh() {
        let mut harness = Harness::loaded(fixture_users());

        harness.press(KeyCode::Enter);
        assert_eq!(harness.state.mode, AppMode::CellEdit);
        assert_eq!(harness.view_data.cell_input, "carol");
        harness.type_text("ine");
        harness.press(KeyCode::Enter);

        assert_eq!(harness.state.mode, AppMode::Nav);
        assert!(harness.view_data.list.edits().is_dirty(UserId::new(3), UserField::Username));
        assert_eq!(
            pending_bar_text(&harness.view_data.list),
            "1 user modified | s update users | x discard changes"
        );

        harness.press(KeyCode::Char('s'));
        harness.wait_for(3);

        assert!(harness.view_data.list.edits().is_empty());
        assert_eq!(
            harness.state.status_line.as_deref(),
            Some("Successfully updated 1 user!")
        );
        assert_eq!(harness.runtime.directory.update_batches().len(), 1);
        assert_eq!(harness.runtime.directory.searches().len(), 2);
        let carol = harness.view_data.list.user(UserId::new(3)).expect("user 3");
        assert_eq!(carol.username, "caroline");
    }

    #[test]
    fn failed_save_keeps_edits_and_shows_error() {
        let mut harness = Harness::loaded(fixture_users());
        harness.press(KeyCode::Char('l'));
        harness.press(KeyCode::Enter);
        harness.type_text("x");
        harness.press(KeyCode::Enter);

        harness
            .runtime
            .directory
            .fail_next(ApiError::with_status(400, "[0].email is invalid"));
        harness.press(KeyCode::Char('s'));
        harness.pump();

        assert!(harness.view_data.list.edits().is_dirty(UserId::new(3), UserField::Email));
        assert!(
            pending_bar_text(&harness.view_data.list).contains("Error: Email is invalid")
        );
        assert_eq!(
            harness.state.status_line.as_deref(),
            Some("save failed: Email is invalid")
        );
    }

    #[test]
    fn discard_and_empty_save_report_status() {
        let mut harness = Harness::loaded(fixture_users());
        harness.press(KeyCode::Char('s'));
        assert_eq!(harness.state.status_line.as_deref(), Some("no pending edits"));

        harness.press(KeyCode::Enter);
        harness.type_text("2");
        harness.press(KeyCode::Enter);
        harness.press(KeyCode::Char('x'));
        assert!(harness.view_data.list.edits().is_empty());
        assert_eq!(
            harness.state.status_line.as_deref(),
            Some("pending edits discarded")
        );
        assert!(harness.runtime.directory.update_batches().is_empty());
    }

    #[test]
    fn create_form_validates_then_saves() {
        let mut harness = Harness::loaded(fixture_users());
        harness.press(KeyCode::Char('a'));
        assert_eq!(harness.state.mode, AppMode::Form(FormKind::Create));

        harness.press(KeyCode::Enter);
        let form = harness.view_data.form.as_ref().expect("form open");
        assert_eq!(form.error.as_deref(), Some("Username is required"));
        assert!(harness.runtime.directory.update_batches().is_empty());

        harness.type_text("zed");
        harness.press(KeyCode::Tab);
        harness.type_text("zed@example.com");
        harness.press(KeyCode::Tab);
        harness.type_text("2000-01-01");
        harness.press(KeyCode::Enter);
        harness.wait_for(3);

        assert!(harness.view_data.form.is_none());
        assert_eq!(harness.state.mode, AppMode::Nav);
        assert_eq!(
            harness.state.status_line.as_deref(),
            Some("User created successfully!")
        );
        assert_eq!(harness.view_data.list.users().len(), 5);
    }

    #[test]
    fn edit_form_prefills_selected_user() {
        let mut harness = Harness::loaded(fixture_users());
        harness.press(KeyCode::Char('j'));
        harness.press(KeyCode::Char('e'));

        assert_eq!(harness.state.mode, AppMode::Form(FormKind::Edit(UserId::new(5))));
        let form = harness.view_data.form.as_ref().expect("form open");
        assert_eq!(form.form.input.birthdate, "1979-11-03");
        assert!(render_form_text(form).contains("> Username: erin_"));

        harness.press(KeyCode::Esc);
        assert!(harness.view_data.form.is_none());
        assert_eq!(harness.state.mode, AppMode::Nav);
    }

    #[test]
    fn dispatch_failure_surfaces_as_fetch_error() {
        let mut harness = Harness::new(fixture_users());
        harness.runtime.dispatch_error = true;
        harness.press(KeyCode::Char('r'));

        assert_eq!(
            harness.view_data.list.fetch_error(),
            Some("worker pool unavailable")
        );
        assert_eq!(
            harness.state.status_line.as_deref(),
            Some("search failed: worker pool unavailable")
        );
    }

    #[test]
    fn paging_keys_and_footer() {
        let mut harness = Harness::loaded(sample_users(25));
        assert_eq!(
            pagination_text(&harness.view_data.list).as_deref(),
            Some("  Previous  [1] 2 3  Next >")
        );

        harness.press(KeyCode::Char('G'));
        assert_eq!(harness.view_data.list.page(), 3);
        assert_eq!(
            footer_text(&harness.view_data.list).as_deref(),
            Some("Showing 5 of 25 users (Page 3 of 3)")
        );
        for _ in 0..10 {
            harness.press(KeyCode::Char('j'));
        }
        assert_eq!(harness.view_data.selected_row, 4);

        harness.press(KeyCode::Left);
        assert_eq!(harness.view_data.list.page(), 2);
        harness.press(KeyCode::Char('g'));
        assert_eq!(harness.view_data.list.page(), 1);
        assert_eq!(harness.runtime.directory.searches().len(), 1);
    }

    #[test]
    fn stale_status_clear_is_ignored() {
        let mut harness = Harness::loaded(fixture_users());
        harness.press(KeyCode::Char('x'));
        let old_token = harness.view_data.status_token;
        harness.press(KeyCode::Char('s'));

        harness.handle(InternalEvent::ClearStatus { token: old_token });
        assert_eq!(harness.state.status_line.as_deref(), Some("no pending edits"));

        let token = harness.view_data.status_token;
        harness.handle(InternalEvent::ClearStatus { token });
        assert_eq!(harness.state.status_line, None);
    }

    #[test]
    fn help_overlay_hides_status_and_swallows_keys() {
        let mut harness = Harness::loaded(fixture_users());
        harness.press(KeyCode::Char('?'));
        assert_eq!(harness.state.help, HelpVisibility::Visible);
        assert_eq!(status_text(&harness.state, &harness.view_data), "");
        assert!(!harness.press(KeyCode::Char('q')));

        harness.press(KeyCode::Esc);
        assert_eq!(harness.state.help, HelpVisibility::Hidden);
        assert!(status_text(&harness.state, &harness.view_data).starts_with("NAV | "));
        assert!(help_overlay_text().contains("s save pending edits"));
    }

    #[test]
    fn empty_results_have_no_pager() {
        let harness = Harness::loaded(Vec::new());
        assert_eq!(pagination_text(&harness.view_data.list), None);
        assert_eq!(footer_text(&harness.view_data.list), None);
    }
}
