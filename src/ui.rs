use std::collections::HashSet;
use std::io::{self, Stdout};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};
use crossterm::event::{self, DisableFocusChange, EnableFocusChange, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction as LayoutDirection, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Padding, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use textwrap::wrap;
use unicode_width::UnicodeWidthChar;

use crate::catalog::CatalogItem;
use crate::data::CatalogService;
use crate::focus::{Direction, FocusCoordinator};
use crate::host;
use crate::playback::{self, LifecycleEvent, SessionState};
use crate::rows::{self, Row};
use crate::video::debug_log;

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

const CARD_WIDTH: u16 = 26;
const CARD_HEIGHT: u16 = 4;
const CARD_GAP: u16 = 2;
// Title line + card + one blank line between rows.
const ROW_HEIGHT: u16 = CARD_HEIGHT + 2;

const COLOR_BG: Color = Color::Rgb(30, 30, 46);
const COLOR_PANEL_BG: Color = Color::Rgb(24, 24, 36);
const COLOR_PANEL_FOCUSED_BG: Color = Color::Rgb(49, 50, 68);
const COLOR_PANEL_SELECTED_BG: Color = Color::Rgb(69, 71, 90);
const COLOR_BORDER_IDLE: Color = Color::Rgb(49, 50, 68);
const COLOR_BORDER_FOCUSED: Color = Color::Rgb(137, 180, 250);
const COLOR_TEXT_PRIMARY: Color = Color::Rgb(205, 214, 244);
const COLOR_TEXT_SECONDARY: Color = Color::Rgb(166, 173, 200);
const COLOR_ACCENT: Color = Color::Rgb(137, 180, 250);
const COLOR_SUCCESS: Color = Color::Rgb(166, 227, 161);
const COLOR_ERROR: Color = Color::Rgb(243, 139, 168);

#[derive(Clone, Copy, PartialEq, Eq)]
enum Screen {
    Home,
    Details,
    Player,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
enum DetailsButton {
    #[default]
    Play,
    Watchlist,
    Back,
}

impl DetailsButton {
    fn next(self) -> Self {
        match self {
            DetailsButton::Play => DetailsButton::Watchlist,
            DetailsButton::Watchlist => DetailsButton::Back,
            DetailsButton::Back => DetailsButton::Back,
        }
    }

    fn previous(self) -> Self {
        match self {
            DetailsButton::Play => DetailsButton::Play,
            DetailsButton::Watchlist => DetailsButton::Play,
            DetailsButton::Back => DetailsButton::Watchlist,
        }
    }

    fn label(self, in_watchlist: bool) -> &'static str {
        match self {
            DetailsButton::Play => "Play",
            DetailsButton::Watchlist => {
                if in_watchlist {
                    "Remove from Watchlist"
                } else {
                    "Add to Watchlist"
                }
            }
            DetailsButton::Back => "Back",
        }
    }
}

struct PendingCatalog {
    request_id: u64,
    cancel_flag: Arc<AtomicBool>,
}

enum AsyncResponse {
    Catalog {
        request_id: u64,
        result: Result<crate::catalog::Snapshot>,
    },
}

struct Spinner {
    index: usize,
    last_tick: Instant,
}

impl Spinner {
    fn new() -> Self {
        Self {
            index: 0,
            last_tick: Instant::now(),
        }
    }

    fn frame(&self) -> &'static str {
        SPINNER_FRAMES[self.index % SPINNER_FRAMES.len()]
    }

    fn advance(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_tick) >= Duration::from_millis(120) {
            self.index = (self.index + 1) % SPINNER_FRAMES.len();
            self.last_tick = now;
            true
        } else {
            false
        }
    }

    fn reset(&mut self) {
        self.index = 0;
        self.last_tick = Instant::now();
    }
}

pub struct Options {
    pub status_message: String,
    pub catalog_service: Option<Arc<dyn CatalogService + Send + Sync>>,
    pub pipeline_factory: playback::PipelineFactory,
    pub host: host::Hooks,
    pub config_path: String,
    pub fetch_catalog_on_start: bool,
}

pub struct Model {
    status_message: String,
    rows: Vec<Row>,
    row_scroll: usize,
    row_offsets: Vec<usize>,
    focus: FocusCoordinator,
    screen_stack: Vec<Screen>,
    selected_item: Option<CatalogItem>,
    watchlist: HashSet<String>,
    details_button: DetailsButton,
    playback: playback::Controller,
    catalog_service: Option<Arc<dyn CatalogService + Send + Sync>>,
    host: host::Hooks,
    first_paint_pending: bool,
    first_paint_reported: bool,
    load_failed: bool,
    spinner: Spinner,
    needs_redraw: bool,
    config_path: String,
    response_tx: Sender<AsyncResponse>,
    response_rx: Receiver<AsyncResponse>,
    next_request_id: u64,
    pending_catalog: Option<PendingCatalog>,
    fetch_catalog_on_start: bool,
}

impl Model {
    pub fn new(opts: Options) -> Self {
        let (response_tx, response_rx) = unbounded();
        Self {
            status_message: opts.status_message,
            rows: Vec::new(),
            row_scroll: 0,
            row_offsets: Vec::new(),
            focus: FocusCoordinator::new(),
            screen_stack: vec![Screen::Home],
            selected_item: None,
            watchlist: HashSet::new(),
            details_button: DetailsButton::default(),
            playback: playback::Controller::new(opts.pipeline_factory),
            catalog_service: opts.catalog_service,
            host: opts.host,
            first_paint_pending: false,
            first_paint_reported: false,
            load_failed: false,
            spinner: Spinner::new(),
            needs_redraw: true,
            config_path: opts.config_path,
            response_tx,
            response_rx,
            next_request_id: 1,
            pending_catalog: None,
            fetch_catalog_on_start: opts.fetch_catalog_on_start,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        stdout.execute(EnableFocusChange)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        if self.fetch_catalog_on_start {
            self.reload_catalog();
        }

        let result = self.event_loop(&mut terminal);

        self.playback.dispose();

        disable_raw_mode()?;
        terminal.backend_mut().execute(DisableFocusChange)?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        let tick_rate = Duration::from_millis(120);

        loop {
            if self.poll_async() {
                self.mark_dirty();
            }
            if self.poll_playback() {
                self.mark_dirty();
            }

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
                self.report_first_paint();
            }

            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));

            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        match self.handle_key(key.code) {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(err) => {
                                self.status_message = format!("Error: {}", err);
                                self.mark_dirty();
                            }
                        }
                    }
                    Event::FocusGained => {
                        // Warm start: the terminal came back to the
                        // foreground after the first paint already happened.
                        if self.first_paint_reported {
                            self.host.report_fully_drawn();
                        }
                    }
                    Event::Resize(_, _) => self.mark_dirty(),
                    _ => {}
                }
            }

            if self.poll_async() {
                self.mark_dirty();
            }

            if last_tick.elapsed() >= tick_rate {
                last_tick = Instant::now();
                if self.is_loading() && self.spinner.advance() {
                    self.mark_dirty();
                } else if !self.is_loading() {
                    self.spinner.reset();
                }
            }
        }

        Ok(())
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    fn is_loading(&self) -> bool {
        self.pending_catalog.is_some()
            || self.playback.state() == SessionState::Initializing
    }

    fn current_screen(&self) -> Screen {
        *self.screen_stack.last().unwrap_or(&Screen::Home)
    }

    fn push_screen(&mut self, screen: Screen) {
        self.screen_stack.push(screen);
        self.mark_dirty();
    }

    fn pop_screen(&mut self) {
        if self.screen_stack.len() <= 1 {
            return;
        }
        let left = self.screen_stack.pop();
        match left {
            Some(Screen::Player) => self.playback.dispose(),
            Some(Screen::Details) => {
                self.selected_item = None;
                self.focus.selection_handled();
            }
            _ => {}
        }
        self.mark_dirty();
    }

    /// First successful content paint: tell the host we are fully drawn,
    /// then let the splash screen go. The order is part of the contract.
    fn report_first_paint(&mut self) {
        if !self.first_paint_pending || self.first_paint_reported {
            return;
        }
        self.first_paint_pending = false;
        self.first_paint_reported = true;
        self.host.report_fully_drawn();
        self.host.hide_splash();
    }

    fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        match self.current_screen() {
            Screen::Home => self.handle_home_key(code),
            Screen::Details => self.handle_details_key(code),
            Screen::Player => self.handle_player_key(code),
        }
    }

    fn handle_home_key(&mut self, code: KeyCode) -> Result<bool> {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
            KeyCode::Char('r') | KeyCode::Char('R') => {
                self.reload_catalog();
            }
            KeyCode::Left | KeyCode::Char('h') => self.move_focus(Direction::Left),
            KeyCode::Right | KeyCode::Char('l') => self.move_focus(Direction::Right),
            KeyCode::Up | KeyCode::Char('k') => self.move_focus(Direction::Up),
            KeyCode::Down | KeyCode::Char('j') => self.move_focus(Direction::Down),
            KeyCode::Enter => self.activate_selection(),
            _ => {}
        }
        Ok(false)
    }

    fn handle_details_key(&mut self, code: KeyCode) -> Result<bool> {
        match code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Esc | KeyCode::Backspace => self.pop_screen(),
            KeyCode::Left | KeyCode::Char('h') => {
                self.details_button = self.details_button.previous();
                self.mark_dirty();
            }
            KeyCode::Right | KeyCode::Char('l') => {
                self.details_button = self.details_button.next();
                self.mark_dirty();
            }
            KeyCode::Enter => match self.details_button {
                DetailsButton::Play => self.start_playback(),
                DetailsButton::Watchlist => self.toggle_watchlist(),
                DetailsButton::Back => self.pop_screen(),
            },
            _ => {}
        }
        Ok(false)
    }

    fn handle_player_key(&mut self, code: KeyCode) -> Result<bool> {
        match code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Esc | KeyCode::Backspace => {
                self.status_message = "Stopped playback.".to_string();
                self.pop_screen();
            }
            _ => {}
        }
        Ok(false)
    }

    fn move_focus(&mut self, direction: Direction) {
        match self.focus.on_directional_input(direction) {
            Ok(true) => self.mark_dirty(),
            Ok(false) => {}
            Err(err) => {
                // A real bookkeeping defect, not a boundary stop; surface it.
                debug_log(format!("focus error: {err}"));
                self.status_message = format!("Internal focus error: {err}");
                self.mark_dirty();
            }
        }
    }

    fn activate_selection(&mut self) {
        let Some(item_id) = self.focus.on_item_activated() else {
            return;
        };
        let Some((row, col)) = self.focus.focused() else {
            return;
        };
        let item = match self.rows.get(row).and_then(|row| row.items.get(col)) {
            Some(item) if item.id == item_id => item.clone(),
            _ => {
                self.focus.selection_handled();
                return;
            }
        };
        self.status_message = format!("{} — press Enter to play.", item.title);
        self.selected_item = Some(item);
        self.details_button = DetailsButton::Play;
        self.push_screen(Screen::Details);
    }

    fn toggle_watchlist(&mut self) {
        let Some(item) = self.selected_item.as_ref() else {
            return;
        };
        if self.watchlist.remove(&item.id) {
            self.status_message = format!("Removed {} from the watchlist.", item.title);
        } else {
            self.watchlist.insert(item.id.clone());
            self.status_message = format!("Added {} to the watchlist.", item.title);
        }
        self.mark_dirty();
    }

    fn start_playback(&mut self) {
        let Some(item) = self.selected_item.clone() else {
            return;
        };
        let Some(source) = item.primary_source() else {
            // Feed entries without sources are selectable but not playable.
            self.status_message = format!("No playable source for {}.", item.title);
            self.mark_dirty();
            return;
        };
        match self.playback.start(&source.url) {
            Ok(()) => {
                self.status_message = format!("Preparing {}…", item.title);
                self.push_screen(Screen::Player);
            }
            Err(err) => {
                self.status_message = format!("Playback failed: {err}");
                self.mark_dirty();
            }
        }
    }

    fn poll_playback(&mut self) -> bool {
        let events = self.playback.poll();
        if events.is_empty() {
            return false;
        }
        for event in events {
            match event {
                LifecycleEvent::SurfaceReady => {
                    if let Some(item) = self.selected_item.as_ref() {
                        self.status_message = format!("Playing {}.", item.title);
                    }
                }
                LifecycleEvent::ReturnToBrowsing => {
                    self.status_message = "Playback finished.".to_string();
                    self.pop_screen();
                }
                LifecycleEvent::InitFailed(message) => {
                    self.status_message = format!("Playback failed: {message}");
                    self.pop_screen();
                }
            }
        }
        true
    }

    fn reload_catalog(&mut self) {
        let Some(service) = self.catalog_service.clone() else {
            self.status_message = "Catalog service unavailable.".to_string();
            self.load_failed = true;
            self.mark_dirty();
            return;
        };

        if let Some(pending) = self.pending_catalog.take() {
            pending.cancel_flag.store(true, Ordering::SeqCst);
        }

        let request_id = self.next_request_id;
        self.next_request_id += 1;
        let cancel_flag = Arc::new(AtomicBool::new(false));
        self.pending_catalog = Some(PendingCatalog {
            request_id,
            cancel_flag: cancel_flag.clone(),
        });
        self.status_message = "Loading catalog…".to_string();
        self.load_failed = false;
        self.mark_dirty();

        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let result = service.fetch_catalog();
            if cancel_flag.load(Ordering::SeqCst) {
                return;
            }
            let _ = tx.send(AsyncResponse::Catalog { request_id, result });
        });
    }

    fn poll_async(&mut self) -> bool {
        let mut changed = false;
        while let Ok(message) = self.response_rx.try_recv() {
            self.handle_async_response(message);
            changed = true;
        }
        changed
    }

    fn handle_async_response(&mut self, message: AsyncResponse) {
        match message {
            AsyncResponse::Catalog { request_id, result } => {
                let Some(pending) = &self.pending_catalog else {
                    return;
                };
                if pending.cancel_flag.load(Ordering::SeqCst) {
                    return;
                }
                if pending.request_id != request_id {
                    return;
                }
                self.pending_catalog = None;

                match result {
                    Ok(snapshot) => self.apply_snapshot(snapshot),
                    Err(err) => {
                        self.rows.clear();
                        self.row_offsets.clear();
                        self.row_scroll = 0;
                        self.focus.on_content_loaded(&self.rows);
                        self.load_failed = true;
                        self.status_message = format!("Failed to load catalog: {err:#}");
                    }
                }
                self.mark_dirty();
            }
        }
    }

    fn apply_snapshot(&mut self, snapshot: crate::catalog::Snapshot) {
        for anomaly in &snapshot.anomalies {
            debug_log(anomaly);
        }

        let mut dropped = snapshot.anomalies.len();
        self.rows = rows::aggregate_with(&snapshot.items, |item, reason| {
            dropped += 1;
            debug_log(format!("catalog item {:?} dropped: {:?}", item.id, reason));
        });
        self.row_offsets = vec![0; self.rows.len()];
        self.row_scroll = 0;
        self.focus.on_content_loaded(&self.rows);

        if self.rows.is_empty() {
            self.status_message = "Catalog is empty.".to_string();
            return;
        }

        let titles: usize = snapshot.items.len();
        self.status_message = if dropped > 0 {
            format!(
                "Loaded {} titles in {} rows ({} entries skipped).",
                titles,
                self.rows.len(),
                dropped
            )
        } else {
            format!("Loaded {} titles in {} rows.", titles, self.rows.len())
        };
        self.first_paint_pending = true;
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let full = frame.size();
        frame.render_widget(Block::default().style(Style::default().bg(COLOR_BG)), full);

        let layout = Layout::default()
            .direction(LayoutDirection::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(full);

        let status_text = if self.is_loading() {
            format!("{} {}", self.spinner.frame(), self.status_message)
                .trim()
                .to_string()
        } else {
            self.status_message.clone()
        };
        let status_line = Paragraph::new(status_text).style(
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .bg(COLOR_PANEL_FOCUSED_BG)
                .add_modifier(Modifier::BOLD),
        );
        frame.render_widget(status_line, layout[0]);

        match self.current_screen() {
            Screen::Home => self.draw_home(frame, layout[1]),
            Screen::Details => self.draw_details(frame, layout[1]),
            Screen::Player => self.draw_player(frame, layout[1]),
        }

        let footer = Paragraph::new(self.footer_text())
            .style(
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .bg(COLOR_PANEL_BG)
                    .add_modifier(Modifier::ITALIC),
            )
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(footer, layout[2]);
    }

    fn footer_text(&self) -> String {
        match self.current_screen() {
            Screen::Home => format!(
                "←↑↓→/hjkl move · Enter details · r refresh · q quit · {}",
                self.config_path
            ),
            Screen::Details => "←/→ choose · Enter confirm · Esc back · q quit".to_string(),
            Screen::Player => "Esc stop and go back · q quit".to_string(),
        }
    }

    fn draw_home(&mut self, frame: &mut Frame<'_>, area: Rect) {
        if self.rows.is_empty() {
            let message = if self.pending_catalog.is_some() {
                format!("{} Loading catalog…", self.spinner.frame())
            } else if self.load_failed {
                "Could not load the catalog.\nPress r to retry.".to_string()
            } else {
                "Catalog is empty.\nPress r to refresh.".to_string()
            };
            let empty = Paragraph::new(message)
                .style(Style::default().fg(COLOR_TEXT_SECONDARY).bg(COLOR_BG))
                .alignment(Alignment::Center);
            frame.render_widget(empty, centered_rect(60, 30, area));
            return;
        }

        let visible_rows = ((area.height / ROW_HEIGHT) as usize).max(1);
        let focused_row = self.focus.focused().map(|(row, _)| row).unwrap_or(0);
        if focused_row < self.row_scroll {
            self.row_scroll = focused_row;
        } else if focused_row >= self.row_scroll + visible_rows {
            self.row_scroll = focused_row + 1 - visible_rows;
        }

        let end = (self.row_scroll + visible_rows).min(self.rows.len());
        for (slot, row_index) in (self.row_scroll..end).enumerate() {
            let y = area.y + (slot as u16) * ROW_HEIGHT;
            if y + ROW_HEIGHT > area.y + area.height {
                break;
            }
            self.draw_row(frame, area, y, row_index);
        }
    }

    fn draw_row(&mut self, frame: &mut Frame<'_>, area: Rect, y: u16, row_index: usize) {
        let row = &self.rows[row_index];
        let focused_here = self
            .focus
            .focused()
            .filter(|(focus_row, _)| *focus_row == row_index);

        let title_style = if focused_here.is_some() {
            Style::default()
                .fg(COLOR_ACCENT)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(COLOR_TEXT_SECONDARY)
        };
        let title_area = Rect::new(area.x + 1, y, area.width.saturating_sub(1), 1);
        frame.render_widget(Paragraph::new(row.title.clone()).style(title_style), title_area);

        let card_stride = CARD_WIDTH + CARD_GAP;
        let visible_cards = ((area.width / card_stride) as usize).max(1);

        let offset = &mut self.row_offsets[row_index];
        if let Some((_, col)) = focused_here {
            if col < *offset {
                *offset = col;
            } else if col >= *offset + visible_cards {
                *offset = col + 1 - visible_cards;
            }
        }
        let offset = (*offset).min(row.items.len().saturating_sub(1));

        let cards_y = y + 1;
        let end = (offset + visible_cards).min(row.items.len());
        for (slot, item_index) in (offset..end).enumerate() {
            let item = &row.items[item_index];
            let x = area.x + 1 + (slot as u16) * card_stride;
            if x + CARD_WIDTH > area.x + area.width {
                break;
            }
            let card_area = Rect::new(x, cards_y, CARD_WIDTH, CARD_HEIGHT);
            let is_focused = focused_here.map(|(_, col)| col) == Some(item_index);
            draw_item_card(frame, card_area, item, is_focused);
        }
    }

    fn draw_details(&mut self, frame: &mut Frame<'_>, area: Rect) {
        let Some(item) = self.selected_item.clone() else {
            frame.render_widget(
                Paragraph::new("Nothing selected.")
                    .style(Style::default().fg(COLOR_TEXT_SECONDARY)),
                area,
            );
            return;
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(COLOR_BORDER_IDLE))
            .style(Style::default().bg(COLOR_PANEL_BG))
            .padding(Padding::uniform(2));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let mut lines: Vec<Line> = Vec::new();
        lines.push(Line::from(Span::styled(
            item.title.clone(),
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .add_modifier(Modifier::BOLD),
        )));

        let mut meta = item.category.clone();
        if item.trending {
            meta.push_str(" · Trending");
        }
        if self.watchlist.contains(&item.id) {
            meta.push_str(" · On your watchlist");
        }
        lines.push(Line::from(Span::styled(
            meta,
            Style::default().fg(COLOR_TEXT_SECONDARY),
        )));
        lines.push(Line::default());

        let text_width = inner.width.saturating_sub(2).max(20) as usize;
        for wrapped in wrap(&item.description, text_width) {
            lines.push(Line::from(Span::styled(
                wrapped.into_owned(),
                Style::default().fg(COLOR_TEXT_PRIMARY),
            )));
        }
        lines.push(Line::default());

        let in_watchlist = self.watchlist.contains(&item.id);
        let mut button_spans: Vec<Span> = Vec::new();
        for button in [
            DetailsButton::Play,
            DetailsButton::Watchlist,
            DetailsButton::Back,
        ] {
            if !button_spans.is_empty() {
                button_spans.push(Span::raw("  "));
            }
            let selected = self.details_button == button;
            let mut style = Style::default().fg(COLOR_TEXT_SECONDARY);
            if selected {
                style = Style::default()
                    .fg(COLOR_TEXT_PRIMARY)
                    .bg(COLOR_PANEL_SELECTED_BG)
                    .add_modifier(Modifier::BOLD);
            }
            button_spans.push(Span::styled(
                format!(" {} ", button.label(in_watchlist)),
                style,
            ));
        }
        lines.push(Line::from(button_spans));

        if item.primary_source().is_none() {
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(
                "This title has no playable source.",
                Style::default().fg(COLOR_ERROR),
            )));
        }

        frame.render_widget(
            Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false }),
            inner,
        );
    }

    fn draw_player(&mut self, frame: &mut Frame<'_>, area: Rect) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(COLOR_BORDER_FOCUSED))
            .style(Style::default().bg(COLOR_PANEL_BG))
            .padding(Padding::uniform(1));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let title = self
            .selected_item
            .as_ref()
            .map(|item| item.title.clone())
            .unwrap_or_else(|| "Unknown title".to_string());

        // The surface is the signal: it only exists once the stream is
        // prepared, so nothing player-shaped renders before that.
        let lines: Vec<Line> = match self.playback.surface() {
            Some(surface) => vec![
                Line::from(Span::styled(
                    "Now playing",
                    Style::default().fg(COLOR_SUCCESS).add_modifier(Modifier::BOLD),
                )),
                Line::default(),
                Line::from(Span::styled(
                    title,
                    Style::default()
                        .fg(COLOR_TEXT_PRIMARY)
                        .add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::styled(
                    surface.source_url.clone(),
                    Style::default().fg(COLOR_TEXT_SECONDARY),
                )),
                Line::default(),
                Line::from(Span::styled(
                    "The video plays in the mpv window. It returns here when it ends.",
                    Style::default().fg(COLOR_TEXT_SECONDARY),
                )),
            ],
            None => vec![
                Line::from(Span::styled(
                    format!("{} Preparing stream…", self.spinner.frame()),
                    Style::default().fg(COLOR_TEXT_PRIMARY),
                )),
                Line::default(),
                Line::from(Span::styled(
                    title,
                    Style::default().fg(COLOR_TEXT_SECONDARY),
                )),
            ],
        };

        frame.render_widget(
            Paragraph::new(Text::from(lines)).alignment(Alignment::Center),
            centered_rect(80, 50, inner),
        );
    }
}

fn draw_item_card(frame: &mut Frame<'_>, area: Rect, item: &CatalogItem, focused: bool) {
    let (border_style, bg) = if focused {
        (
            Style::default().fg(COLOR_BORDER_FOCUSED),
            COLOR_PANEL_SELECTED_BG,
        )
    } else {
        (Style::default().fg(COLOR_BORDER_IDLE), COLOR_PANEL_BG)
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .style(Style::default().bg(bg));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let width = inner.width as usize;
    let mut title_style = Style::default().fg(COLOR_TEXT_PRIMARY);
    if focused {
        title_style = title_style.add_modifier(Modifier::BOLD);
    }
    let lines = vec![
        Line::from(Span::styled(
            truncate_to_width(&item.title, width),
            title_style,
        )),
        Line::from(Span::styled(
            truncate_to_width(&item.category, width),
            Style::default().fg(COLOR_TEXT_SECONDARY),
        )),
    ];
    frame.render_widget(Paragraph::new(Text::from(lines)), inner);
}

fn truncate_to_width(text: &str, width: usize) -> String {
    if width == 0 {
        return String::new();
    }
    let mut used = 0usize;
    let mut out = String::new();
    for ch in text.chars() {
        let ch_width = ch.width().unwrap_or(0);
        if used + ch_width > width.saturating_sub(1) {
            out.push('…');
            return out;
        }
        used += ch_width;
        out.push(ch);
    }
    out
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let percent_x = percent_x.min(100);
    let percent_y = percent_y.min(100);
    let horizontal = Layout::default()
        .direction(LayoutDirection::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage(100 - percent_x - (100 - percent_x) / 2),
        ])
        .split(area);
    let vertical = Layout::default()
        .direction(LayoutDirection::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage(100 - percent_y - (100 - percent_y) / 2),
        ])
        .split(horizontal[1]);
    vertical[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn details_buttons_cycle_and_clamp() {
        let mut button = DetailsButton::Play;
        assert_eq!(button.previous(), DetailsButton::Play);
        button = button.next();
        assert_eq!(button, DetailsButton::Watchlist);
        button = button.next();
        assert_eq!(button, DetailsButton::Back);
        assert_eq!(button.next(), DetailsButton::Back);
        assert_eq!(button.previous(), DetailsButton::Watchlist);
    }

    #[test]
    fn watchlist_button_label_follows_membership() {
        assert_eq!(DetailsButton::Watchlist.label(false), "Add to Watchlist");
        assert_eq!(
            DetailsButton::Watchlist.label(true),
            "Remove from Watchlist"
        );
    }

    #[test]
    fn truncate_respects_display_width() {
        assert_eq!(truncate_to_width("short", 20), "short");
        assert_eq!(truncate_to_width("a very long movie title", 8), "a very …");
        assert_eq!(truncate_to_width("anything", 0), "");
    }

    #[test]
    fn centered_rect_stays_inside() {
        let area = Rect::new(0, 0, 100, 40);
        let inner = centered_rect(60, 30, area);
        assert!(inner.width <= 60);
        assert!(inner.height <= 12);
        assert!(inner.x >= 20);
    }
}
