use std::io::Stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::ListState;
use ratatui::Terminal;
use unicode_segmentation::UnicodeSegmentation;

use crate::catalog;
use crate::config::AppConfig;
use crate::render::CardBoard;
use crate::storage::Persistence;
use crate::ui;

pub mod actions;
pub mod state;

pub use actions::{ActionDispatcher, ActionOutcome, GalleryAction};
pub use state::{
    AppState, ComposeFocus, GalleryOptions, GalleryState, OverlayState, PendingDeletion,
};

const MAX_TEXT_GRAPHEMES: usize = 280;

enum Action {
    Quit,
    CursorDown(isize),
    CursorUp(isize),
    FilterLeft,
    FilterRight,
    ToggleFilter,
    ShowAll,
    ToggleFavorite,
    ToggleSelection,
    ClearSelection,
    BulkFavorite,
    BulkDelete,
    Compose,
    Edit,
    Delete,
    ToggleTheme,
}

pub struct App {
    pub config: Arc<AppConfig>,
    state: AppState,
    list_state: ListState,
    should_quit: bool,
    tick_rate: Duration,
}

impl App {
    pub fn new(config: Arc<AppConfig>, persistence: Persistence) -> Self {
        let catalog = catalog::load_catalog(&config.catalog_path);
        let mut gallery = GalleryState::new(
            catalog,
            persistence,
            GalleryOptions::from(config.as_ref()),
            CardBoard::new(),
        );
        gallery.reset_and_render(Instant::now());
        Self {
            config,
            state: AppState::new(gallery),
            list_state: ListState::default(),
            should_quit: false,
            tick_rate: Duration::from_millis(100),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        loop {
            terminal
                .draw(|frame| {
                    if self.state.board().is_empty() {
                        self.list_state.select(None);
                    } else {
                        self.list_state.select(Some(self.state.cursor));
                    }
                    ui::draw_app(frame, &self.state, &mut self.list_state);
                })
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            let mut timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(0));
            if let Some(deadline) = self.state.gallery.pending_deadline() {
                timeout = timeout.min(deadline.saturating_duration_since(Instant::now()));
            }

            if event::poll(timeout).context("polling for terminal events")? {
                match event::read().context("reading terminal event")? {
                    Event::Key(key) => self.handle_key(key),
                    Event::Mouse(mouse) => match mouse.kind {
                        MouseEventKind::ScrollDown => self.handle_action(Action::CursorDown(1)),
                        MouseEventKind::ScrollUp => self.handle_action(Action::CursorUp(1)),
                        _ => {}
                    },
                    _ => {}
                }
            }

            if last_tick.elapsed() >= self.tick_rate || self.state.gallery.pending_deadline().is_some()
            {
                self.state.tick(Instant::now());
                last_tick = Instant::now();
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if self.handle_overlay_key(key) {
            return;
        }

        let plain = !key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER);
        let action = match key.code {
            KeyCode::Char('q') => Some(Action::Quit),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::Quit)
            }
            KeyCode::Char('j') | KeyCode::Down => Some(Action::CursorDown(1)),
            KeyCode::Char('k') | KeyCode::Up => Some(Action::CursorUp(1)),
            KeyCode::PageDown => Some(Action::CursorDown(5)),
            KeyCode::PageUp => Some(Action::CursorUp(5)),
            KeyCode::Char('h') | KeyCode::Left => Some(Action::FilterLeft),
            KeyCode::Char('l') | KeyCode::Right => Some(Action::FilterRight),
            KeyCode::Enter => Some(Action::ToggleFilter),
            KeyCode::Char('a') if plain => Some(Action::ShowAll),
            KeyCode::Char('f') if plain => Some(Action::ToggleFavorite),
            KeyCode::Char(' ') => Some(Action::ToggleSelection),
            KeyCode::Esc => Some(Action::ClearSelection),
            KeyCode::Char('F') => Some(Action::BulkFavorite),
            KeyCode::Char('D') => Some(Action::BulkDelete),
            KeyCode::Char('n') if plain => Some(Action::Compose),
            KeyCode::Char('e') if plain => Some(Action::Edit),
            KeyCode::Char('d') if plain => Some(Action::Delete),
            KeyCode::Char('t') if plain => Some(Action::ToggleTheme),
            _ => None,
        };

        if let Some(action) = action {
            self.handle_action(action);
        }
    }

    fn handle_action(&mut self, action: Action) {
        let now = Instant::now();
        match action {
            Action::Quit => self.should_quit = true,
            Action::CursorDown(step) => self.state.move_cursor(step, now),
            Action::CursorUp(step) => self.state.move_cursor(-step, now),
            Action::FilterLeft => self.state.move_filter_cursor(-1),
            Action::FilterRight => self.state.move_filter_cursor(1),
            Action::ToggleFilter => self.state.toggle_filter_at_cursor(now),
            Action::ShowAll => self.state.reset_filters(now),
            Action::ToggleFavorite => self.state.toggle_favorite_at_cursor(now),
            Action::ToggleSelection => self.state.toggle_selection_at_cursor(now),
            Action::ClearSelection => self.state.clear_selection(now),
            Action::BulkFavorite => self.state.bulk_favorite(now),
            Action::BulkDelete => self.state.open_bulk_delete(now),
            Action::Compose => {
                self.state.open_compose();
                self.state
                    .set_status_message(Some("Type the message, Tab to pick categories"));
            }
            Action::Edit => self.state.open_edit(),
            Action::Delete => self.state.open_delete(now),
            Action::ToggleTheme => self.state.toggle_theme(now),
        }
    }

    fn handle_overlay_key(&mut self, key: KeyEvent) -> bool {
        let typing = !key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER);
        let now = Instant::now();
        match self.state.overlay_mut() {
            Some(OverlayState::Compose(compose)) => {
                match key.code {
                    KeyCode::Esc => {
                        self.state.close_overlay();
                        self.state.set_status_message(Some("Canceled new message"));
                    }
                    KeyCode::Enter => self.state.submit_overlay(now),
                    KeyCode::Tab | KeyCode::BackTab => compose.toggle_focus(),
                    KeyCode::Up => compose.move_highlight(-1),
                    KeyCode::Down => compose.move_highlight(1),
                    KeyCode::Char(' ') if compose.focus == ComposeFocus::Categories => {
                        compose.toggle_highlighted();
                    }
                    KeyCode::Char('k') if compose.focus == ComposeFocus::Categories => {
                        compose.move_highlight(-1);
                    }
                    KeyCode::Char('j') if compose.focus == ComposeFocus::Categories => {
                        compose.move_highlight(1);
                    }
                    KeyCode::Backspace if compose.focus == ComposeFocus::Text => {
                        pop_grapheme(&mut compose.text);
                    }
                    KeyCode::Char(ch) if typing && compose.focus == ComposeFocus::Text => {
                        push_bounded(&mut compose.text, ch);
                    }
                    _ => {}
                }
                true
            }
            Some(OverlayState::Edit(edit)) => {
                match key.code {
                    KeyCode::Esc => {
                        self.state.close_overlay();
                        self.state.set_status_message(Some("Edit canceled"));
                    }
                    KeyCode::Enter => self.state.submit_overlay(now),
                    KeyCode::Backspace => pop_grapheme(&mut edit.text),
                    KeyCode::Char(ch) if typing => push_bounded(&mut edit.text, ch),
                    _ => {}
                }
                true
            }
            Some(OverlayState::Delete(_)) => {
                match key.code {
                    KeyCode::Esc | KeyCode::Char('n') => {
                        self.state.close_overlay();
                        self.state.set_status_message(Some("Delete canceled"));
                    }
                    KeyCode::Enter | KeyCode::Char('y') => self.state.submit_overlay(now),
                    _ => {}
                }
                true
            }
            None => false,
        }
    }
}

fn push_bounded(text: &mut String, ch: char) {
    if text.graphemes(true).count() < MAX_TEXT_GRAPHEMES {
        text.push(ch);
    }
}

fn pop_grapheme(text: &mut String) {
    if let Some((index, _)) = text.grapheme_indices(true).next_back() {
        text.truncate(index);
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal backend")?;
    terminal.hide_cursor().context("hiding cursor")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("restoring screen state")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backspace_removes_whole_graphemes() {
        let mut text = "hola 👋🏽".to_string();
        pop_grapheme(&mut text);
        assert_eq!(text, "hola ");
        let mut empty = String::new();
        pop_grapheme(&mut empty);
        assert!(empty.is_empty());
    }

    #[test]
    fn typing_stops_at_the_limit() {
        let mut text = "x".repeat(MAX_TEXT_GRAPHEMES);
        push_bounded(&mut text, 'y');
        assert_eq!(text.len(), MAX_TEXT_GRAPHEMES);
    }
}
