//! Terminal front end
//!
//! Pages are drawn as bordered blocks in a single centered column. The
//! reader works in document pixels; one terminal cell counts as
//! [`CELL_WIDTH_PX`] by [`CELL_HEIGHT_PX`].

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use log::{debug, info};
use ratatui::{
    Frame, Terminal,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
};

use crate::event_source::{Event, EventSource, KeyCode, KeyEvent, MouseEventKind};
use crate::notification::NotificationLevel;
use crate::reader::{LoadPolicy, NavKey, Reader, SessionStatus};
use crate::settings;

pub const CELL_WIDTH_PX: u32 = 8;
pub const CELL_HEIGHT_PX: u32 = 16;

/// Rows moved per j/k press or wheel notch
const SCROLL_ROWS: i64 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Reading,
    /// Typing a path to open
    OpenPrompt(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAction {
    Quit,
}

pub struct App {
    pub reader: Reader,
    pub mode: InputMode,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        Self::with_reader(Reader::new())
    }

    pub fn with_reader(reader: Reader) -> Self {
        Self {
            reader,
            mode: InputMode::Reading,
        }
    }

    pub fn open(&mut self, path: PathBuf) {
        info!("opening {path:?}");
        // Errors are already surfaced as notifications
        let _ = self.reader.open_path(&path);
    }

    pub fn handle_event(&mut self, event: &Event) -> Option<AppAction> {
        match event {
            Event::Key(key) => self.handle_key_event(*key),
            Event::Mouse(mouse) => {
                match mouse.kind {
                    MouseEventKind::ScrollDown => self.scroll_rows(SCROLL_ROWS),
                    MouseEventKind::ScrollUp => self.scroll_rows(-SCROLL_ROWS),
                    _ => {}
                }
                None
            }
            _ => None,
        }
    }

    pub fn handle_key_event(&mut self, key: KeyEvent) -> Option<AppAction> {
        if let InputMode::OpenPrompt(input) = &mut self.mode {
            match key.code {
                KeyCode::Enter => {
                    let path = PathBuf::from(input.trim());
                    self.mode = InputMode::Reading;
                    self.open(path);
                }
                KeyCode::Esc => self.mode = InputMode::Reading,
                KeyCode::Backspace => {
                    input.pop();
                }
                KeyCode::Char(c) => input.push(c),
                _ => {}
            }
            return None;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Some(AppAction::Quit),
            KeyCode::Down | KeyCode::Right | KeyCode::Char(' ') => self.reader.key(NavKey::Next),
            KeyCode::Up | KeyCode::Left => self.reader.key(NavKey::Previous),
            KeyCode::Home => self.reader.key(NavKey::First),
            KeyCode::End => self.reader.key(NavKey::Last),
            KeyCode::Char('j') => self.scroll_rows(SCROLL_ROWS),
            KeyCode::Char('k') => self.scroll_rows(-SCROLL_ROWS),
            KeyCode::Char(']') => self.nudge_slider(1),
            KeyCode::Char('[') => self.nudge_slider(-1),
            KeyCode::Enter => {
                if self.slider_visible() {
                    self.reader.slider_commit(self.reader.slider_value());
                }
            }
            KeyCode::Char('s') => {
                let enabled = settings::toggle_slider();
                self.reader
                    .notifications_mut()
                    .info(if enabled { "Slider on" } else { "Slider off" });
            }
            KeyCode::Char('w') => {
                let unbounded = settings::toggle_unbounded_width();
                self.reader.notifications_mut().info(if unbounded {
                    "Full width"
                } else {
                    "Bounded width"
                });
            }
            KeyCode::Char('o') => {
                self.reader.reset();
                self.mode = InputMode::OpenPrompt(String::new());
            }
            _ => {}
        }
        None
    }

    fn scroll_rows(&mut self, rows: i64) {
        self.reader.scroll_by(rows * i64::from(CELL_HEIGHT_PX));
    }

    fn nudge_slider(&mut self, delta: isize) {
        if !self.slider_visible() {
            return;
        }
        let total = self.reader.total().unwrap_or(1);
        let value = self
            .reader
            .slider_value()
            .saturating_add_signed(delta)
            .clamp(1, total);
        self.reader.slider_drag(value);
    }

    pub fn slider_visible(&self) -> bool {
        self.reader.slider_visible(settings::is_slider_enabled())
    }

    /// Periodic work; returns true if anything visible changed
    pub fn tick(&mut self) -> bool {
        let pumped = self.reader.pump();
        let expired = self.reader.notifications_mut().update();
        pumped > 0 || expired
    }

    pub fn draw(&mut self, f: &mut Frame) {
        let area = f.area();
        let slider_rows = u16::from(self.slider_visible());
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(1),
                Constraint::Length(slider_rows),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(area);

        let column = column_rect(chunks[0]);
        self.reader.set_viewport(
            u32::from(column.width) * CELL_WIDTH_PX,
            u32::from(column.height) * CELL_HEIGHT_PX,
        );

        self.draw_pages(f, column);
        if slider_rows > 0 {
            self.draw_slider(f, chunks[1]);
        }
        self.draw_notification(f, chunks[2]);
        self.draw_footer(f, chunks[3]);
    }

    fn draw_pages(&self, f: &mut Frame, column: Rect) {
        let scroll_top = self.reader.viewport().scroll_top;
        let rows = u64::from(column.height);
        let current = self.reader.current_page();

        if self.reader.pages().is_empty() {
            let text = match self.reader.status() {
                SessionStatus::Idle => "Press o to open a .cbz, .cbr or .cbt file",
                SessionStatus::Failed => "Nothing to show",
                _ => "Loading...",
            };
            f.render_widget(
                Paragraph::new(text).style(Style::default().fg(Color::DarkGray)),
                column,
            );
            return;
        }

        for page_box in self.reader.layout() {
            // Rows relative to the viewport top, clipped at zero
            let top = page_box.top.saturating_sub(scroll_top) / u64::from(CELL_HEIGHT_PX);
            let bottom = page_box.bottom().saturating_sub(scroll_top) / u64::from(CELL_HEIGHT_PX);
            if bottom == 0 || top >= rows {
                continue;
            }
            let Some(page) = self.reader.pages().get(page_box.index) else {
                continue;
            };

            let visible_bottom = bottom.min(rows);
            let rect = Rect {
                x: column.x,
                y: column.y + top as u16,
                width: column.width,
                height: (visible_bottom - top) as u16,
            };

            let border = if current == Some(page.index) {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            let mut title = format!(" {} ", page.index);
            if page.load == LoadPolicy::Lazy {
                title.push_str("(lazy) ");
            }
            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(border)
                .title(title);

            let mime = self
                .reader
                .store()
                .get(&page.url)
                .map_or("?", |blob| blob.mime);
            let dims = if page.has_dimensions() {
                format!("{} x {}", page.width, page.height)
            } else {
                "unknown size".to_string()
            };
            let body = Paragraph::new(vec![
                Line::from(Span::styled(page.id(), Style::default().fg(Color::Cyan))),
                Line::from(format!("{dims}  {mime}")),
            ])
            .block(block);

            f.render_widget(body, rect);
        }
    }

    fn draw_slider(&self, f: &mut Frame, area: Rect) {
        let total = self.reader.total().unwrap_or(1).max(1);
        let value = self.reader.slider_value().min(total);
        let gauge = Gauge::default()
            .gauge_style(Style::default().fg(Color::Blue))
            .ratio(value as f64 / total as f64)
            .label(format!("{value} / {total}"));
        f.render_widget(gauge, column_rect(area));
    }

    fn draw_notification(&self, f: &mut Frame, area: Rect) {
        let Some(notification) = self.reader.notifications().current() else {
            return;
        };
        let color = match notification.level {
            NotificationLevel::Info => Color::Green,
            NotificationLevel::Warning => Color::Yellow,
            NotificationLevel::Error => Color::Red,
        };
        f.render_widget(
            Paragraph::new(notification.display_text())
                .style(Style::default().fg(color).add_modifier(Modifier::BOLD)),
            area,
        );
    }

    fn draw_footer(&self, f: &mut Frame, area: Rect) {
        if let InputMode::OpenPrompt(input) = &self.mode {
            let line = Line::from(vec![
                Span::styled("Open: ", Style::default().fg(Color::Yellow)),
                Span::raw(input.as_str()),
            ]);
            f.render_widget(Paragraph::new(line), area);
            return;
        }

        let name = self.reader.file_name().unwrap_or("no file");
        let position = match (self.reader.current_page(), self.reader.total()) {
            (Some(current), Some(total)) => format!("{current}/{total}"),
            (_, None) if self.reader.is_loading() => format!("{} loaded", self.reader.pages().len()),
            _ => String::new(),
        };
        let line = Line::from(vec![
            Span::styled(name.to_string(), Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  "),
            Span::raw(position),
            Span::styled(
                "  ↓/↑ page  j/k scroll  [ ] slider  s slider  w width  o open  q quit",
                Style::default().fg(Color::DarkGray),
            ),
        ]);
        f.render_widget(Paragraph::new(line), area);
    }
}

/// Page column, centered and capped per the width setting
fn column_rect(area: Rect) -> Rect {
    let width = settings::column_cells(area.width);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y,
        width,
        height: area.height,
    }
}

pub fn run_app_with_event_source<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    event_source: &mut dyn EventSource,
) -> Result<()>
where
    B::Error: Send + Sync + 'static,
{
    let tick_rate = Duration::from_millis(50);
    let mut last_tick = Instant::now();
    let mut needs_redraw = true;

    loop {
        let mut events_processed = 0;
        let mut should_quit = false;
        while event_source.poll(Duration::from_millis(0))? && events_processed < 50 {
            let event = event_source.read()?;
            events_processed += 1;
            if app.handle_event(&event) == Some(AppAction::Quit) {
                should_quit = true;
                break;
            }
            if matches!(event, Event::Resize(_, _)) {
                needs_redraw = true;
            }
        }
        if should_quit {
            debug!("quit requested");
            break;
        }
        needs_redraw |= events_processed > 0;

        if last_tick.elapsed() >= tick_rate {
            needs_redraw |= app.tick();
            last_tick = Instant::now();
        }

        if needs_redraw {
            terminal.draw(|f| app.draw(f))?;
            needs_redraw = false;
        }

        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        if !event_source.poll(timeout)? {
            needs_redraw |= app.tick();
            last_tick = Instant::now();
        }
    }

    Ok(())
}
