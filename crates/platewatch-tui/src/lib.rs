// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use platewatch_app::{
    AfterDelete, AppCommand, AppMode, AppState, Car, CarColumn, CarId, CarSource, CarStore,
    CarUpdate, Coordinates, DeleteRequest, EditForm, FetchTicket, FilterCriteria, FilterField,
    FilterOptions, Key, LookupRequest, LookupResult, MapSurface, MapView, MarkerHandle,
    ReviewModal, ShortcutCommand, SortDirection, Step, TableView, ViewKind,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols;
use ratatui::text::{Line, Span};
use ratatui::widgets::canvas::{Canvas, Map, MapResolution, Points};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs, Wrap};
use std::collections::BTreeMap;
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use time::UtcOffset;

const SORT_MARK_ASC: &str = "▲";
const SORT_MARK_DESC: &str = "▼";
const CURSOR_MARK: &str = "›";
const MIN_MAP_PAD_DEGREES: f64 = 0.005;
const FALLBACK_SPAN_DEGREES: f64 = 0.5;

/// Everything the front end needs from the outside world.
pub trait AppRuntime {
    fn load_cars(&mut self, source: CarSource, criteria: &FilterCriteria) -> Result<Vec<Car>>;
    fn load_filter_options(&mut self) -> Result<FilterOptions>;
    fn load_models(&mut self, make: Option<&str>) -> Result<Vec<String>>;
    fn first_car_location(&mut self) -> Result<Coordinates>;
    fn update_car(&mut self, update: &CarUpdate) -> Result<()>;
    fn delete_car(&mut self, request: &DeleteRequest) -> Result<()>;
    fn refresh_car(&mut self, request: &LookupRequest) -> Result<LookupResult>;
    fn spawn_fetch(
        &mut self,
        ticket: FetchTicket,
        source: CarSource,
        criteria: FilterCriteria,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let result = self
            .load_cars(source, &criteria)
            .map_err(|error| error.to_string());
        tx.send(InternalEvent::CarsLoaded { ticket, result })
            .map_err(|_| anyhow!("fetch event channel closed"))?;
        Ok(())
    }
    fn play_video(&mut self, _video_path: &str) -> Result<()> {
        Ok(())
    }
    fn pause_video(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InternalEvent {
    ClearStatus {
        token: u64,
    },
    CarsLoaded {
        ticket: FetchTicket,
        result: Result<Vec<Car>, String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiOptions {
    pub autoplay: bool,
    pub offset: UtcOffset,
}

impl Default for UiOptions {
    fn default() -> Self {
        Self {
            autoplay: true,
            offset: UtcOffset::UTC,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct PlacedMarker {
    id: CarId,
    at: Coordinates,
    title: String,
}

/// Canvas-backed map surface. Markers live here so the renderer can draw them
/// without consulting the store.
#[derive(Debug, Clone, PartialEq, Default)]
struct CanvasMap {
    next_handle: u64,
    markers: BTreeMap<MarkerHandle, PlacedMarker>,
    open: Option<MarkerHandle>,
    center: Option<Coordinates>,
}

impl MapSurface for CanvasMap {
    fn place_marker(&mut self, id: CarId, at: Coordinates, title: &str) -> MarkerHandle {
        self.next_handle = self.next_handle.saturating_add(1);
        let handle = MarkerHandle::new(self.next_handle);
        self.markers.insert(
            handle,
            PlacedMarker {
                id,
                at,
                title: title.to_owned(),
            },
        );
        handle
    }

    fn remove_marker(&mut self, handle: MarkerHandle) {
        self.markers.remove(&handle);
        if self.open == Some(handle) {
            self.open = None;
        }
    }

    fn open_overlay(&mut self, handle: MarkerHandle) {
        self.open = Some(handle);
    }

    fn close_overlay(&mut self) {
        self.open = None;
    }

    fn set_center(&mut self, center: Coordinates) {
        self.center = Some(center);
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
struct FilterPanel {
    draft: FilterCriteria,
    cursor: usize,
}

impl FilterPanel {
    fn field(&self) -> FilterField {
        FilterField::ALL[self.cursor.min(FilterField::ALL.len() - 1)]
    }

    fn move_cursor(&mut self, delta: isize) {
        let len = FilterField::ALL.len() as isize;
        self.cursor = (self.cursor as isize + delta).rem_euclid(len) as usize;
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ViewData {
    store: CarStore,
    table: TableView,
    map: MapView,
    canvas: CanvasMap,
    review: ReviewModal,
    filter: FilterPanel,
    criteria: FilterCriteria,
    options: FilterOptions,
    ui: UiOptions,
    loading: bool,
    overlay_playing: bool,
    saved_car: Option<CarId>,
    status_token: u64,
}

impl ViewData {
    fn new(ui: UiOptions) -> Self {
        Self {
            store: CarStore::new(),
            table: TableView::default(),
            map: MapView::default(),
            canvas: CanvasMap::default(),
            review: ReviewModal::default(),
            filter: FilterPanel::default(),
            criteria: FilterCriteria::default(),
            options: FilterOptions::default(),
            ui,
            loading: false,
            overlay_playing: false,
            saved_car: None,
            status_token: 0,
        }
    }
}

pub fn run_app<R: AppRuntime>(state: &mut AppState, runtime: &mut R, ui: UiOptions) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::new(ui);
    let (internal_tx, internal_rx) = mpsc::channel();

    request_fetch(state, runtime, &mut view_data, &internal_tx);

    let mut result = Ok(());
    loop {
        process_internal_events(state, runtime, &mut view_data, &internal_tx, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(anyhow::Error::new(error).context("draw frame"));
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

    if let Err(error) = runtime.pause_video() {
        tracing::warn!(%error, "stop video on exit");
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
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::CarsLoaded { ticket, result } => {
                handle_cars_loaded(state, runtime, view_data, tx, ticket, result);
            }
        }
    }
}

fn handle_cars_loaded<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    ticket: FetchTicket,
    result: Result<Vec<Car>, String>,
) {
    if !view_data.store.is_current(ticket) {
        tracing::debug!(ticket = ticket.get(), "ignoring superseded fetch");
        return;
    }
    view_data.loading = false;
    match result {
        Ok(cars) => {
            if !view_data.store.apply_fetch(ticket, cars) {
                return;
            }
            view_data.table.sync(&view_data.store);
            match view_data.saved_car.take() {
                Some(saved) => view_data.review.resync(&view_data.store, saved),
                None => view_data.review.refresh_snapshot(&view_data.store),
            };
            focus_review(view_data);
            if state.active_view == ViewKind::Map {
                sync_map(state, runtime, view_data);
            }
            let counts = view_data.store.counts();
            emit_status(
                state,
                view_data,
                tx,
                format!("{} cars, {} unknown", counts.total, counts.unknown),
            );
        }
        Err(error) => {
            tracing::error!(ticket = ticket.get(), %error, "car list fetch failed");
            view_data.saved_car = None;
            show_notice(state, format!("load failed: {error}"));
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(4));
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
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn show_notice(state: &mut AppState, message: impl Into<String>) {
    state.dispatch(AppCommand::ShowNotice(message.into()));
}

fn report_failure(state: &mut AppState, action: &str, error: &anyhow::Error) {
    tracing::error!(action, error = %format!("{error:#}"), "operation failed");
    show_notice(state, format!("{action} failed: {error:#}"));
}

fn request_fetch<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
) {
    let ticket = view_data.store.begin_fetch();
    let source = state.active_view.source();
    view_data.loading = true;
    tracing::debug!(ticket = ticket.get(), ?source, "fetching cars");
    if let Err(error) = runtime.spawn_fetch(ticket, source, view_data.criteria.clone(), tx.clone())
    {
        view_data.loading = false;
        report_failure(state, "load", &error);
    }
}

fn sync_map<R: AppRuntime>(state: &mut AppState, runtime: &mut R, view_data: &mut ViewData) {
    if !view_data.map.is_synced(&view_data.store) {
        view_data.map.sync(&view_data.store, &mut view_data.canvas);
        if view_data.map.needs_fallback_center() {
            let location = match runtime.first_car_location() {
                Ok(location) => Some(location),
                Err(error) => {
                    tracing::warn!(error = %format!("{error:#}"), "first car location");
                    None
                }
            };
            view_data
                .map
                .apply_fallback_center(location, &mut view_data.canvas);
        }
    }
    if state.mode == AppMode::Overlay && !view_data.map.overlay_open() {
        stop_overlay_video(runtime, view_data);
        state.dispatch(AppCommand::ExitToNav);
    }
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

    if state.has_notice() {
        state.dispatch(AppCommand::DismissNotice);
        return false;
    }

    match state.mode {
        AppMode::Help => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?')) {
                state.dispatch(AppCommand::ExitToNav);
            }
        }
        AppMode::Filter => handle_filter_key(state, runtime, view_data, internal_tx, key),
        AppMode::Review => handle_review_key(state, runtime, view_data, internal_tx, key),
        AppMode::Overlay => handle_overlay_key(state, runtime, view_data, internal_tx, key),
        AppMode::Nav => handle_nav_key(state, runtime, view_data, internal_tx, key),
    }
    false
}

fn handle_nav_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Tab => {
            switch_view(state, runtime, view_data, internal_tx, AppCommand::NextView);
            return;
        }
        KeyCode::BackTab => {
            switch_view(state, runtime, view_data, internal_tx, AppCommand::PrevView);
            return;
        }
        KeyCode::Char('?') => {
            state.dispatch(AppCommand::Enter(AppMode::Help));
            return;
        }
        KeyCode::Char('f') => {
            open_filter_panel(state, runtime, view_data);
            return;
        }
        KeyCode::Char('r') => {
            request_fetch(state, runtime, view_data, internal_tx);
            emit_status(state, view_data, internal_tx, "refreshing");
            return;
        }
        _ => {}
    }

    if state.active_view == ViewKind::Map {
        handle_map_key(state, runtime, view_data, internal_tx, key);
    } else {
        handle_table_key(state, runtime, view_data, internal_tx, key);
    }
}

fn switch_view<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    command: AppCommand,
) {
    let previous = state.active_view.source();
    state.dispatch(command);
    if state.active_view.source() != previous {
        request_fetch(state, runtime, view_data, internal_tx);
    }
    if state.active_view == ViewKind::Map {
        sync_map(state, runtime, view_data);
    }
}

fn handle_table_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    view_data.table.sync(&view_data.store);
    let row_count = view_data.store.len();
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => view_data.table.move_row(1, row_count),
        KeyCode::Char('k') | KeyCode::Up => view_data.table.move_row(-1, row_count),
        KeyCode::Char('g') | KeyCode::Home => view_data.table.jump_first_row(),
        KeyCode::Char('G') | KeyCode::End => view_data.table.jump_last_row(row_count),
        KeyCode::Char('h') | KeyCode::Left => view_data.table.move_column(-1),
        KeyCode::Char('l') | KeyCode::Right => view_data.table.move_column(1),
        KeyCode::Char('s') => {
            let column = view_data.table.selected_column();
            let message = match view_data.table.click_column(column) {
                Some(spec) => format!(
                    "sort: {} {}",
                    column.label(),
                    direction_label(spec.direction)
                ),
                None => format!("{} does not sort", column.label()),
            };
            emit_status(state, view_data, internal_tx, message);
        }
        KeyCode::Char('S') => {
            view_data.table.clear_sort();
            emit_status(state, view_data, internal_tx, "sort cleared");
        }
        KeyCode::Enter => match view_data.table.review_target(&view_data.store) {
            Ok(index) => open_review(state, runtime, view_data, internal_tx, index),
            Err(notice) => show_notice(state, notice.message()),
        },
        _ => {}
    }
}

fn direction_label(direction: SortDirection) -> &'static str {
    match direction {
        SortDirection::Asc => "asc",
        SortDirection::Desc => "desc",
    }
}

fn handle_map_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    sync_map(state, runtime, view_data);
    match key.code {
        KeyCode::Char('j') | KeyCode::Down | KeyCode::Right => {
            if let Some(marker) = view_data.map.cycle(1) {
                let id = marker.id;
                emit_status(state, view_data, internal_tx, format!("car #{id}"));
            }
        }
        KeyCode::Char('k') | KeyCode::Up | KeyCode::Left => {
            if let Some(marker) = view_data.map.cycle(-1) {
                let id = marker.id;
                emit_status(state, view_data, internal_tx, format!("car #{id}"));
            }
        }
        KeyCode::Enter => {
            match view_data
                .map
                .open_overlay(&view_data.store, &mut view_data.canvas)
            {
                Ok(_) => {
                    view_data.overlay_playing = false;
                    state.dispatch(AppCommand::Enter(AppMode::Overlay));
                }
                Err(notice) => show_notice(state, notice.message()),
            }
        }
        _ => {}
    }
}

fn open_review<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    index: usize,
) {
    match view_data
        .review
        .open(&view_data.store, index, view_data.ui.autoplay)
    {
        Ok(id) => {
            focus_review(view_data);
            state.dispatch(AppCommand::Enter(AppMode::Review));
            sync_review_playback(state, runtime, view_data);
            emit_status(state, view_data, internal_tx, format!("reviewing car #{id}"));
        }
        Err(notice) => show_notice(state, notice.message()),
    }
}

/// Points the store focus at the record under review.
fn focus_review(view_data: &mut ViewData) {
    let Some(id) = view_data.review.session().map(|session| session.current_id()) else {
        return;
    };
    match view_data.store.position_of(id) {
        Some(index) => {
            view_data.store.set_focus(index);
        }
        None => view_data.store.clear_focus(),
    }
}

fn sync_review_playback<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &ViewData,
) {
    let result = match view_data.review.session().map(|session| session.playback()) {
        Some(playback) if playback.is_playing() => runtime.play_video(playback.source()),
        _ => runtime.pause_video(),
    };
    if let Err(error) = result {
        report_failure(state, "video", &error);
    }
}

fn close_review<R: AppRuntime>(state: &mut AppState, runtime: &mut R, view_data: &mut ViewData) {
    let last = view_data
        .review
        .session()
        .and_then(|session| view_data.store.position_of(session.current_id()));
    view_data.review.close();
    if let Some(index) = last {
        view_data.table.select_store_index(&view_data.store, index);
    }
    view_data.store.clear_focus();
    if let Err(error) = runtime.pause_video() {
        tracing::warn!(error = %format!("{error:#}"), "stop video");
    }
    state.dispatch(AppCommand::ExitToNav);
}

fn shortcut_key(key: KeyEvent) -> Key {
    match key.code {
        KeyCode::Char(' ') => Key::Space,
        KeyCode::Char(ch) => Key::Char(ch),
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Up | KeyCode::BackTab => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Tab => Key::Tab,
        KeyCode::Enter => Key::Enter,
        KeyCode::Esc => Key::Esc,
        KeyCode::Backspace => Key::Backspace,
        _ => Key::Other,
    }
}

/// Keys the dispatcher leaves alone go to the focused field.
fn type_into(form: &mut EditForm, key: Key) {
    match key {
        Key::Char(ch) => form.push_char(ch),
        Key::Space => form.push_char(' '),
        Key::Backspace => form.pop_char(),
        _ => {}
    }
}

fn edit_form_command(form: &mut EditForm, command: ShortcutCommand) -> Option<&'static str> {
    match command {
        ShortcutCommand::BlurInput => {
            form.blur();
            None
        }
        ShortcutCommand::FocusField => {
            if form.focus() {
                None
            } else {
                Some("field is read-only")
            }
        }
        ShortcutCommand::FieldUp => {
            form.move_cursor(-1);
            None
        }
        ShortcutCommand::FieldDown => {
            form.move_cursor(1);
            None
        }
        _ => None,
    }
}

fn handle_review_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(session) = view_data.review.session_mut() else {
        state.dispatch(AppCommand::ExitToNav);
        return;
    };
    let key = shortcut_key(key);
    let focused = session.form().is_editing();
    let Some(command) = platewatch_app::dispatch(key, focused) else {
        if focused {
            type_into(session.form_mut(), key);
        }
        return;
    };

    match command {
        ShortcutCommand::PreviousVideo | ShortcutCommand::NextVideo => {
            let step = if command == ShortcutCommand::PreviousVideo {
                Step::Previous
            } else {
                Step::Next
            };
            match view_data.review.step(step) {
                Ok(id) => {
                    focus_review(view_data);
                    sync_review_playback(state, runtime, view_data);
                    emit_status(state, view_data, internal_tx, format!("reviewing car #{id}"));
                }
                Err(notice) => show_notice(state, notice.message()),
            }
        }
        ShortcutCommand::TogglePlayback => {
            let playing = session.playback_mut().toggle();
            sync_review_playback(state, runtime, view_data);
            let label = if playing { "playing" } else { "paused" };
            emit_status(state, view_data, internal_tx, label);
        }
        ShortcutCommand::RefreshLookup => review_lookup(state, runtime, view_data, internal_tx),
        ShortcutCommand::Save => review_save(state, runtime, view_data, internal_tx),
        ShortcutCommand::Delete => review_delete(state, runtime, view_data, internal_tx),
        ShortcutCommand::Close => close_review(state, runtime, view_data),
        ShortcutCommand::BlurInput
        | ShortcutCommand::FocusField
        | ShortcutCommand::FieldUp
        | ShortcutCommand::FieldDown => {
            if let Some(message) = edit_form_command(session.form_mut(), command) {
                emit_status(state, view_data, internal_tx, message);
            }
        }
    }
}

fn review_save<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let update = match view_data.review.save_payload() {
        Ok(update) => update,
        Err(error) => {
            show_notice(state, format!("{error:#}"));
            return;
        }
    };
    if let Err(error) = runtime.update_car(&update) {
        report_failure(state, "save", &error);
        return;
    }
    emit_status(state, view_data, internal_tx, format!("saved car #{}", update.id));
    view_data.saved_car = Some(update.id);
    request_fetch(state, runtime, view_data, internal_tx);
}

fn review_lookup<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let request = match view_data.review.lookup_request() {
        Ok(request) => request,
        Err(error) => {
            show_notice(state, format!("{error:#}"));
            return;
        }
    };
    match runtime.refresh_car(&request) {
        Ok(result) => {
            view_data.review.apply_lookup(&result);
            emit_status(state, view_data, internal_tx, lookup_summary(&result));
            request_fetch(state, runtime, view_data, internal_tx);
        }
        Err(error) => report_failure(state, "lookup", &error),
    }
}

fn review_delete<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let request = match view_data.review.delete_request() {
        Ok(request) => request,
        Err(error) => {
            show_notice(state, format!("{error:#}"));
            return;
        }
    };
    if let Err(error) = runtime.delete_car(&request) {
        report_failure(state, "delete", &error);
        return;
    }
    match view_data.review.remove_current() {
        AfterDelete::MovedTo(_) => {
            focus_review(view_data);
            sync_review_playback(state, runtime, view_data);
        }
        AfterDelete::Closed => close_review(state, runtime, view_data),
    }
    emit_status(state, view_data, internal_tx, format!("deleted car #{}", request.id));
    request_fetch(state, runtime, view_data, internal_tx);
}

fn lookup_summary(result: &LookupResult) -> String {
    let parts = [
        result.year.map(|year| year.to_string()),
        result.make.clone(),
        result.model.clone(),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>();
    if parts.is_empty() {
        "lookup returned nothing new".to_owned()
    } else {
        format!("lookup: {}", parts.join(" "))
    }
}

fn handle_overlay_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(form) = view_data.map.overlay_form_mut() else {
        state.dispatch(AppCommand::ExitToNav);
        return;
    };
    let key = shortcut_key(key);
    let focused = form.is_editing();
    let Some(command) = platewatch_app::dispatch(key, focused) else {
        if focused {
            type_into(form, key);
        }
        return;
    };

    match command {
        ShortcutCommand::PreviousVideo | ShortcutCommand::NextVideo => {
            show_notice(state, "the map overlay has no previous or next car");
        }
        ShortcutCommand::TogglePlayback => toggle_overlay_video(state, runtime, view_data),
        ShortcutCommand::RefreshLookup => overlay_lookup(state, runtime, view_data, internal_tx),
        ShortcutCommand::Save => overlay_save(state, runtime, view_data, internal_tx),
        ShortcutCommand::Delete => overlay_delete(state, runtime, view_data, internal_tx),
        ShortcutCommand::Close => close_overlay(state, runtime, view_data),
        ShortcutCommand::BlurInput
        | ShortcutCommand::FocusField
        | ShortcutCommand::FieldUp
        | ShortcutCommand::FieldDown => {
            if let Some(message) = edit_form_command(form, command) {
                emit_status(state, view_data, internal_tx, message);
            }
        }
    }
}

fn toggle_overlay_video<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
) {
    let Some(path) = view_data
        .map
        .overlay_car(&view_data.store)
        .and_then(Car::video)
        .map(str::to_owned)
    else {
        show_notice(state, "no video for this car");
        return;
    };
    view_data.overlay_playing = !view_data.overlay_playing;
    let result = if view_data.overlay_playing {
        runtime.play_video(&path)
    } else {
        runtime.pause_video()
    };
    if let Err(error) = result {
        view_data.overlay_playing = false;
        report_failure(state, "video", &error);
    }
}

fn stop_overlay_video<R: AppRuntime>(runtime: &mut R, view_data: &mut ViewData) {
    if view_data.overlay_playing {
        view_data.overlay_playing = false;
        if let Err(error) = runtime.pause_video() {
            tracing::warn!(error = %format!("{error:#}"), "stop video");
        }
    }
}

fn close_overlay<R: AppRuntime>(state: &mut AppState, runtime: &mut R, view_data: &mut ViewData) {
    stop_overlay_video(runtime, view_data);
    view_data.map.close_overlay(&mut view_data.canvas);
    state.dispatch(AppCommand::ExitToNav);
}

fn overlay_save<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(form) = view_data.map.overlay_form() else {
        return;
    };
    let update = match form.to_update() {
        Ok(update) => update,
        Err(error) => {
            show_notice(state, format!("{error:#}"));
            return;
        }
    };
    if let Err(error) = runtime.update_car(&update) {
        report_failure(state, "save", &error);
        return;
    }
    close_overlay(state, runtime, view_data);
    emit_status(state, view_data, internal_tx, format!("saved car #{}", update.id));
    request_fetch(state, runtime, view_data, internal_tx);
}

fn overlay_lookup<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(form) = view_data.map.overlay_form() else {
        return;
    };
    let request = match form.lookup_request() {
        Ok(request) => request,
        Err(error) => {
            show_notice(state, format!("{error:#}"));
            return;
        }
    };
    match runtime.refresh_car(&request) {
        Ok(result) => {
            close_overlay(state, runtime, view_data);
            emit_status(state, view_data, internal_tx, lookup_summary(&result));
            request_fetch(state, runtime, view_data, internal_tx);
        }
        Err(error) => report_failure(state, "lookup", &error),
    }
}

fn overlay_delete<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let request = match view_data.map.delete_request(&view_data.store) {
        Ok(request) => request,
        Err(notice) => {
            show_notice(state, notice.message());
            return;
        }
    };
    if let Err(error) = runtime.delete_car(&request) {
        report_failure(state, "delete", &error);
        return;
    }
    stop_overlay_video(runtime, view_data);
    view_data
        .map
        .remove_marker_for(request.id, &mut view_data.canvas);
    state.dispatch(AppCommand::ExitToNav);
    emit_status(state, view_data, internal_tx, format!("deleted car #{}", request.id));
    request_fetch(state, runtime, view_data, internal_tx);
}

fn open_filter_panel<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
) {
    view_data.filter = FilterPanel {
        draft: view_data.criteria.clone(),
        cursor: 0,
    };
    state.dispatch(AppCommand::Enter(AppMode::Filter));
    match runtime.load_filter_options() {
        Ok(options) => view_data.options = options,
        Err(error) => {
            report_failure(state, "load filter choices", &error);
            return;
        }
    }
    let make = view_data.filter.draft.make.clone();
    if make.is_some() {
        reload_models(state, runtime, view_data, make.as_deref());
    }
}

fn reload_models<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    make: Option<&str>,
) {
    match runtime.load_models(make) {
        Ok(models) => {
            let draft = &mut view_data.filter.draft;
            if draft
                .model
                .as_ref()
                .is_some_and(|model| !models.contains(model))
            {
                draft.set(FilterField::Model, "");
            }
            view_data.options.models = models;
        }
        Err(error) => report_failure(state, "load models", &error),
    }
}

fn filter_choices(options: &FilterOptions, field: FilterField) -> Vec<String> {
    match field {
        FilterField::Make => options.makes.iter().map(|entry| entry.make.clone()).collect(),
        FilterField::Model => options.models.clone(),
        FilterField::StartYear | FilterField::EndYear => {
            options.years.iter().map(|year| year.to_string()).collect()
        }
        FilterField::State => options.states.clone(),
        FilterField::LicensePlate
        | FilterField::Color
        | FilterField::StartDate
        | FilterField::EndDate => Vec::new(),
    }
}

/// Steps through "any" plus every choice, wrapping at both ends.
fn cycle_choice(current: Option<&str>, choices: &[String], delta: isize) -> String {
    let len = choices.len() as isize + 1;
    let position = current
        .and_then(|value| choices.iter().position(|choice| choice == value))
        .map_or(0, |index| index as isize + 1);
    let next = (position + delta).rem_euclid(len) as usize;
    if next == 0 {
        String::new()
    } else {
        choices[next - 1].clone()
    }
}

fn handle_filter_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let field = view_data.filter.field();
    match key.code {
        KeyCode::Esc => {
            state.dispatch(AppCommand::ExitToNav);
            emit_status(state, view_data, internal_tx, "filters unchanged");
        }
        KeyCode::Enter => {
            view_data.criteria = view_data.filter.draft.clone();
            state.dispatch(AppCommand::ExitToNav);
            let active = view_data.criteria.active_count();
            request_fetch(state, runtime, view_data, internal_tx);
            emit_status(state, view_data, internal_tx, format!("{active} filters active"));
        }
        KeyCode::Up | KeyCode::BackTab => view_data.filter.move_cursor(-1),
        KeyCode::Down | KeyCode::Tab => view_data.filter.move_cursor(1),
        KeyCode::Left | KeyCode::Right => {
            let delta = if key.code == KeyCode::Left { -1 } else { 1 };
            let choices = filter_choices(&view_data.options, field);
            if choices.is_empty() {
                return;
            }
            let next = cycle_choice(view_data.filter.draft.get(field), &choices, delta);
            view_data.filter.draft.set(field, next);
            if field == FilterField::Make {
                let make = view_data.filter.draft.make.clone();
                reload_models(state, runtime, view_data, make.as_deref());
            }
        }
        KeyCode::Char('x') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            view_data.filter.draft = FilterCriteria::default();
            emit_status(state, view_data, internal_tx, "filters cleared");
        }
        KeyCode::Backspace => {
            let mut value = view_data.filter.draft.get(field).unwrap_or_default().to_owned();
            value.pop();
            view_data.filter.draft.set(field, value);
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            let mut value = view_data.filter.draft.get(field).unwrap_or_default().to_owned();
            value.push(ch);
            view_data.filter.draft.set(field, value);
        }
        _ => {}
    }
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(frame.area());

    let selected = ViewKind::ALL
        .iter()
        .position(|view| *view == state.active_view)
        .unwrap_or(0);
    let titles = ViewKind::ALL
        .iter()
        .map(|view| view.label().to_owned())
        .collect::<Vec<String>>();
    let tabs = Tabs::new(titles)
        .block(
            Block::default()
                .title(header_title(view_data))
                .borders(Borders::ALL),
        )
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .select(selected);
    frame.render_widget(tabs, layout[0]);

    if state.active_view == ViewKind::Map {
        render_map(frame, layout[1], view_data);
    } else {
        render_table(frame, layout[1], state, view_data);
    }

    let status_widget = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(status_widget, layout[2]);

    match state.mode {
        AppMode::Filter => {
            let area = centered_rect(60, 60, frame.area());
            frame.render_widget(Clear, area);
            let panel = Paragraph::new(render_filter_text(view_data))
                .block(Block::default().title("filter").borders(Borders::ALL));
            frame.render_widget(panel, area);
        }
        AppMode::Review => {
            let area = centered_rect(70, 62, frame.area());
            frame.render_widget(Clear, area);
            let modal = Paragraph::new(render_review_text(view_data))
                .block(Block::default().title("review").borders(Borders::ALL));
            frame.render_widget(modal, area);
        }
        AppMode::Overlay => {
            let area = centered_rect(56, 72, frame.area());
            frame.render_widget(Clear, area);
            let overlay = Paragraph::new(render_overlay_text(view_data)).block(
                Block::default()
                    .title("car")
                    .borders(Borders::ALL)
                    .style(Style::default().fg(Color::Cyan)),
            );
            frame.render_widget(overlay, area);
        }
        AppMode::Help => {
            let area = centered_rect(70, 70, frame.area());
            frame.render_widget(Clear, area);
            let help = Paragraph::new(help_overlay_text())
                .block(Block::default().title("help").borders(Borders::ALL));
            frame.render_widget(help, area);
        }
        AppMode::Nav => {}
    }

    if let Some(notice) = &state.notice {
        let area = centered_rect(50, 24, frame.area());
        frame.render_widget(Clear, area);
        let widget = Paragraph::new(format!("{notice}\n\npress any key"))
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .title("notice")
                    .borders(Borders::ALL)
                    .style(Style::default().fg(Color::Red)),
            );
        frame.render_widget(widget, area);
    }
}

fn header_title(view_data: &ViewData) -> String {
    let counts = view_data.store.counts();
    let mut title = format!(
        "platewatch | total {} | unknown {}",
        counts.total, counts.unknown
    );
    let active = view_data.criteria.active_count();
    if active > 0 {
        title.push_str(&format!(" | {active} filters"));
    }
    if view_data.loading {
        title.push_str(" | loading");
    }
    title
}

fn render_table(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    state: &AppState,
    view_data: &ViewData,
) {
    let records = view_data.store.records();
    let order = view_data.table.rows(records);
    let sort = view_data.table.sort();
    let selected_col = view_data.table.selected_column();

    let header_cells = CarColumn::ALL.iter().map(|column| {
        let mark = match sort {
            Some(spec) if spec.column == *column => match spec.direction {
                SortDirection::Asc => SORT_MARK_ASC,
                SortDirection::Desc => SORT_MARK_DESC,
            },
            _ => "",
        };
        let mut style = Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD);
        if *column == selected_col {
            style = style.fg(Color::Cyan);
        }
        Cell::from(format!("{}{mark}", column.label())).style(style)
    });
    let header = Row::new(header_cells);

    let rows = order.iter().enumerate().map(|(row_index, store_index)| {
        let car = &records[*store_index];
        let selected_row = row_index == view_data.table.selected_row();
        let cells = CarColumn::ALL
            .iter()
            .map(|column| {
                let mut style = Style::default();
                if car.is_unknown() {
                    style = style.fg(Color::DarkGray);
                }
                if selected_row {
                    style = style.bg(Color::DarkGray).fg(Color::White);
                }
                if selected_row && *column == selected_col {
                    style = Style::default()
                        .fg(Color::Black)
                        .bg(Color::Cyan)
                        .add_modifier(Modifier::BOLD);
                }
                Cell::from(column.cell_text(car, view_data.ui.offset)).style(style)
            })
            .collect::<Vec<_>>();
        Row::new(cells)
    });

    let widths = [
        Constraint::Length(19),
        Constraint::Min(8),
        Constraint::Length(5),
        Constraint::Length(5),
        Constraint::Min(8),
        Constraint::Min(8),
        Constraint::Min(6),
        Constraint::Min(8),
        Constraint::Length(5),
    ];
    let table = Table::new(rows, widths).header(header).block(
        Block::default()
            .borders(Borders::ALL)
            .title(state.active_view.label()),
    );
    frame.render_widget(table, area);
}

/// Longitude/latitude bounds for the canvas.
fn map_viewport(view_data: &ViewData) -> ([f64; 2], [f64; 2]) {
    if let Some((south_west, north_east)) = view_data.map.bounds() {
        let pad_lon = ((north_east.longitude - south_west.longitude) * 0.15).max(MIN_MAP_PAD_DEGREES);
        let pad_lat = ((north_east.latitude - south_west.latitude) * 0.15).max(MIN_MAP_PAD_DEGREES);
        return (
            [south_west.longitude - pad_lon, north_east.longitude + pad_lon],
            [south_west.latitude - pad_lat, north_east.latitude + pad_lat],
        );
    }
    let center = view_data.map.center();
    if center == Coordinates::ORIGIN {
        return ([-180.0, 180.0], [-90.0, 90.0]);
    }
    (
        [
            center.longitude - FALLBACK_SPAN_DEGREES,
            center.longitude + FALLBACK_SPAN_DEGREES,
        ],
        [
            center.latitude - FALLBACK_SPAN_DEGREES,
            center.latitude + FALLBACK_SPAN_DEGREES,
        ],
    )
}

fn render_map(frame: &mut ratatui::Frame<'_>, area: Rect, view_data: &ViewData) {
    let (x_bounds, y_bounds) = map_viewport(view_data);
    let coords = view_data
        .canvas
        .markers
        .values()
        .map(|marker| (marker.at.longitude, marker.at.latitude))
        .collect::<Vec<_>>();
    let selected = view_data
        .map
        .selected_marker()
        .and_then(|marker| view_data.canvas.markers.get(&marker.handle));
    let title = format!("map | {} markers", coords.len());

    let canvas = Canvas::default()
        .block(Block::default().title(title).borders(Borders::ALL))
        .marker(symbols::Marker::Braille)
        .x_bounds(x_bounds)
        .y_bounds(y_bounds)
        .paint(|ctx| {
            ctx.draw(&Map {
                color: Color::DarkGray,
                resolution: MapResolution::High,
            });
            ctx.layer();
            ctx.draw(&Points {
                coords: &coords,
                color: Color::Yellow,
            });
            if let Some(marker) = selected {
                ctx.print(
                    marker.at.longitude,
                    marker.at.latitude,
                    Line::from(Span::styled(
                        format!("{CURSOR_MARK} {} #{}", marker.title, marker.id),
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD),
                    )),
                );
            }
        });
    frame.render_widget(canvas, area);
}

fn render_form_lines(form: &EditForm) -> Vec<String> {
    form.fields()
        .enumerate()
        .map(|(index, (spec, value))| {
            let cursor = if index == form.cursor() { CURSOR_MARK } else { " " };
            let caret = if index == form.cursor() && form.is_editing() {
                "▏"
            } else {
                ""
            };
            let lock = if spec.editable { "" } else { " (read-only)" };
            format!("{cursor} {:<10} {value}{caret}{lock}", spec.label)
        })
        .collect()
}

fn render_review_text(view_data: &ViewData) -> String {
    let Some(session) = view_data.review.session() else {
        return String::new();
    };
    let title = session
        .current()
        .map(Car::title)
        .unwrap_or_else(|| format!("car #{}", session.current_id()));
    let seen = session
        .current()
        .and_then(|car| car.date_time.as_deref())
        .map(|raw| platewatch_app::format_local_time(raw, view_data.ui.offset))
        .unwrap_or_default();
    let playback = session.playback();
    let state = if playback.is_playing() { "playing" } else { "paused" };

    let mut lines = vec![
        format!("{title}  (#{})", session.current_id()),
        format!("seen: {seen}"),
        format!("video: {} [{state}]", playback.source()),
        String::new(),
    ];
    lines.extend(render_form_lines(session.form()));
    lines.push(String::new());
    lines.push(
        "←/→ prev/next | space play/pause | r lookup | s save | d delete | enter edit | esc close"
            .to_owned(),
    );
    lines.join("\n")
}

fn render_overlay_text(view_data: &ViewData) -> String {
    let Some(form) = view_data.map.overlay_form() else {
        return String::new();
    };
    let video_state = if view_data.overlay_playing {
        "playing"
    } else {
        "stopped"
    };
    let mut lines = vec![format!("car #{}  video: {video_state}", form.id()), String::new()];
    lines.extend(render_form_lines(form));
    lines.push(String::new());
    lines.push(
        "space video | r lookup | s save | d delete | enter edit | esc close".to_owned(),
    );
    lines.join("\n")
}

fn render_filter_text(view_data: &ViewData) -> String {
    let mut lines = FilterField::ALL
        .iter()
        .enumerate()
        .map(|(index, field)| {
            let cursor = if index == view_data.filter.cursor {
                CURSOR_MARK
            } else {
                " "
            };
            let value = view_data.filter.draft.get(*field).unwrap_or("any");
            let cycle = if filter_choices(&view_data.options, *field).is_empty() {
                ""
            } else {
                "  ‹ ›"
            };
            format!("{cursor} {:<10} {value}{cycle}", field.label())
        })
        .collect::<Vec<_>>();
    lines.push(String::new());
    lines.push("type to edit | ←/→ choices | enter apply | ctrl+x clear | esc cancel".to_owned());
    lines.join("\n")
}

fn status_text(state: &AppState, view_data: &ViewData) -> String {
    let mode = match state.mode {
        AppMode::Nav => "NAV",
        AppMode::Filter => "FILTER",
        AppMode::Review => "REVIEW",
        AppMode::Overlay => "CAR",
        AppMode::Help => "HELP",
    };
    let hints = match (state.mode, state.active_view) {
        (AppMode::Nav, ViewKind::Map) => "j/k marker | enter open | f filter | r reload | tab view | ? | ctrl+q",
        (AppMode::Nav, _) => {
            "j/k/h/l g/G | s/S sort | enter review | f filter | r reload | tab view | ? | ctrl+q"
        }
        _ => "esc close | ctrl+q",
    };
    let editing = match state.mode {
        AppMode::Review => view_data
            .review
            .session()
            .is_some_and(|session| session.form().is_editing()),
        AppMode::Overlay => view_data
            .map
            .overlay_form()
            .is_some_and(EditForm::is_editing),
        _ => false,
    };
    let mode = if editing { format!("{mode}:EDIT") } else { mode.to_owned() };
    match &state.status_line {
        Some(status) => format!("{mode} | {status} | {hints}"),
        None => format!("{mode} | {hints}"),
    }
}

fn help_overlay_text() -> &'static str {
    "views
  tab / shift+tab   cycle cars, map, unknown
  r                 reload from the backend
  f                 filter panel

table
  j/k  h/l  g/G     move
  s                 sort by column (again to flip)
  S                 clear sort
  enter             review the selected car

map
  j/k               select marker
  enter             open the marker's car

review and car overlay
  ←/→               previous / next car with video
  space             play / pause
  r                 plate lookup
  s                 save
  d                 delete
  enter             edit the field under the cursor
  esc               stop editing, or close

ctrl+q quits"
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
