//! Reader session - wires the decode worker, page list, position and
//! resource ownership together behind one single-threaded reducer.
//!
//! Every input (worker message, scroll, key, slider) enters through a
//! `&mut self` method, so the state is only ever mutated from one place.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use super::controller::{PageList, RenderController, RenderEffect};
use super::intersection::{IntersectionTracker, PageBox, layout_pages, top_of};
use super::lifecycle::ResourceLifecycle;
use super::position::{NavKey, PositionCommand, PositionEffect, PositionState};
use crate::decode::{DecodeWorker, EngineState, SessionId, WorkerEvent, WorkerMessage};
use crate::notification::NotificationManager;
use crate::resource::ResourceStore;

/// Extensions accepted before any decoding is attempted
pub const ACCEPTED_EXTENSIONS: [&str; 3] = [".cbr", ".cbz", ".cbt"];

/// Host-side failures, before the worker is involved
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    #[error("Invalid File Type")]
    InvalidFileType { file_name: String },

    #[error("Error Reading File")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Decode worker unavailable")]
    WorkerUnavailable,
}

/// Gate on the last four characters of the file name
pub fn check_file_type(file_name: &str) -> Result<(), ReaderError> {
    let tail_start = file_name
        .char_indices()
        .rev()
        .nth(3)
        .map_or(0, |(i, _)| i);
    let tail = file_name[tail_start..].to_lowercase();

    if ACCEPTED_EXTENSIONS.contains(&tail.as_str()) {
        Ok(())
    } else {
        Err(ReaderError::InvalidFileType {
            file_name: file_name.to_string(),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Opening,
    Streaming,
    Ready,
    Failed,
}

impl SessionStatus {
    /// No further events are expected
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            SessionStatus::Idle | SessionStatus::Ready | SessionStatus::Failed
        )
    }
}

/// The archive currently open
#[derive(Clone, Debug)]
pub struct Session {
    pub id: SessionId,
    pub file_name: String,
    pub status: SessionStatus,
    /// Page count as announced by any event, even before the last page arrives
    pub announced_total: Option<usize>,
    pub rendered: usize,
    pub failed_entries: usize,
}

impl Session {
    fn new(id: SessionId, file_name: &str) -> Self {
        Self {
            id,
            file_name: file_name.to_string(),
            status: SessionStatus::Opening,
            announced_total: None,
            rendered: 0,
            failed_entries: 0,
        }
    }

    fn record(&mut self, message: &WorkerMessage) {
        match message {
            WorkerMessage::Uncompress(page) => {
                self.announced_total = Some(page.total);
                self.rendered += 1;
                if self.status == SessionStatus::Opening {
                    self.status = SessionStatus::Streaming;
                }
            }
            WorkerMessage::Error { error } if error.is_session_fatal() => {
                self.status = SessionStatus::Failed;
            }
            WorkerMessage::Error { error } => {
                if let crate::decode::DecodeError::EntryRead { total, .. } = error {
                    self.announced_total = Some(*total);
                }
                self.failed_entries += 1;
            }
            WorkerMessage::Ready => {}
        }

        if let Some(total) = self.announced_total {
            if self.status != SessionStatus::Failed && self.rendered + self.failed_entries >= total
            {
                self.status = SessionStatus::Ready;
            }
        }
    }
}

/// Viewport geometry in document pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub column_width: u32,
    pub height: u32,
    pub scroll_top: u64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            column_width: 800,
            height: 800,
            scroll_top: 0,
        }
    }
}

pub struct Reader {
    store: ResourceStore,
    worker: DecodeWorker,
    engine: EngineState,
    session: Option<Session>,
    next_session: u64,
    controller: RenderController,
    position: PositionState,
    lifecycle: ResourceLifecycle,
    tracker: IntersectionTracker,
    layout: Vec<PageBox>,
    viewport: Viewport,
    notifications: NotificationManager,
    recorded: Option<Vec<WorkerMessage>>,
}

impl Default for Reader {
    fn default() -> Self {
        Self::new()
    }
}

impl Reader {
    #[must_use]
    pub fn new() -> Self {
        Self::with_store(ResourceStore::new())
    }

    #[must_use]
    pub fn with_store(store: ResourceStore) -> Self {
        Self {
            worker: DecodeWorker::spawn(store.clone()),
            lifecycle: ResourceLifecycle::new(store.clone()),
            store,
            engine: EngineState::Initializing,
            session: None,
            next_session: 1,
            controller: RenderController::new(),
            position: PositionState::new(),
            tracker: IntersectionTracker::new(),
            layout: Vec::new(),
            viewport: Viewport::default(),
            notifications: NotificationManager::new(),
            recorded: None,
        }
    }

    pub fn store(&self) -> &ResourceStore {
        &self.store
    }

    pub fn engine_state(&self) -> EngineState {
        self.engine
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn status(&self) -> SessionStatus {
        self.session
            .as_ref()
            .map_or(SessionStatus::Idle, |s| s.status)
    }

    pub fn file_name(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.file_name.as_str())
    }

    pub fn pages(&self) -> &PageList {
        self.controller.pages()
    }

    pub fn current_page(&self) -> Option<usize> {
        self.position.current()
    }

    pub fn slider_value(&self) -> usize {
        self.position.slider_value()
    }

    /// Total page count once the last page has arrived
    pub fn total(&self) -> Option<usize> {
        self.controller.total()
    }

    pub fn is_loading(&self) -> bool {
        self.controller.is_busy()
    }

    pub fn is_reading(&self) -> bool {
        self.controller.is_reading()
    }

    /// Slider is offered only while a page is active in a bounded document
    pub fn slider_visible(&self, enabled: bool) -> bool {
        enabled && self.total().is_some_and(|t| t > 0) && self.current_page().is_some()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn layout(&self) -> &[PageBox] {
        &self.layout
    }

    /// Full document height in pixels
    pub fn content_height(&self) -> u64 {
        self.layout.last().map_or(0, PageBox::bottom)
    }

    pub fn notifications(&self) -> &NotificationManager {
        &self.notifications
    }

    pub fn notifications_mut(&mut self) -> &mut NotificationManager {
        &mut self.notifications
    }

    /// Keep a copy of every accepted worker message, for `take_recorded`
    pub fn record_messages(&mut self) {
        self.recorded.get_or_insert_with(Vec::new);
    }

    pub fn take_recorded(&mut self) -> Vec<WorkerMessage> {
        self.recorded.as_mut().map(std::mem::take).unwrap_or_default()
    }

    /// Open a file from disk
    pub fn open_path(&mut self, path: &Path) -> Result<SessionId, ReaderError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.gate(&file_name)?;

        match fs::read(path) {
            Ok(bytes) => self.open_bytes(&file_name, bytes),
            Err(source) => {
                warn!("failed to read {path:?}: {source}");
                let err = ReaderError::ReadFile {
                    path: path.to_path_buf(),
                    source,
                };
                self.notifications.error(err.to_string());
                Err(err)
            }
        }
    }

    /// Open an archive already in memory. The buffer is handed to the worker without copying.
    pub fn open_bytes(&mut self, file_name: &str, bytes: Vec<u8>) -> Result<SessionId, ReaderError> {
        self.gate(file_name)?;

        self.reset();
        self.ensure_worker();

        let id = SessionId(self.next_session);
        self.next_session += 1;
        self.session = Some(Session::new(id, file_name));
        self.controller.begin_session();

        info!("opening {file_name:?} ({} bytes) as session {}", bytes.len(), id.0);
        if !self.worker.start(id, file_name, bytes) {
            let err = ReaderError::WorkerUnavailable;
            self.notifications.error(err.to_string());
            if let Some(session) = self.session.as_mut() {
                session.status = SessionStatus::Failed;
            }
            return Err(err);
        }
        Ok(id)
    }

    fn gate(&mut self, file_name: &str) -> Result<(), ReaderError> {
        check_file_type(file_name).inspect_err(|e| {
            info!("rejected {file_name:?}: {e}");
            self.notifications.error(e.to_string());
        })
    }

    fn ensure_worker(&mut self) {
        if !self.worker.is_terminated() {
            return;
        }
        // Anything still queued on the old worker will never be rendered
        for event in self.worker.poll_events() {
            if let WorkerMessage::Uncompress(page) = event.message {
                self.lifecycle.release_orphan(&page.url);
            }
        }
        debug!("respawning decode worker");
        self.worker = DecodeWorker::spawn(self.store.clone());
        self.engine = EngineState::Initializing;
        self.controller.engine_starting();
    }

    /// Process every queued worker event without blocking
    pub fn pump(&mut self) -> usize {
        let events = self.worker.poll_events();
        let count = events.len();
        for event in events {
            self.handle_event(event);
        }
        count
    }

    /// Wait up to `timeout` for one event, then drain the rest
    pub fn pump_blocking(&mut self, timeout: Duration) -> usize {
        match self.worker.recv_timeout(timeout) {
            Some(event) => {
                self.handle_event(event);
                1 + self.pump()
            }
            None => 0,
        }
    }

    /// Pump until the session is Ready, Failed or the timeout passes
    pub fn wait_until_settled(&mut self, timeout: Duration) -> SessionStatus {
        let deadline = Instant::now() + timeout;
        while !self.status().is_settled() {
            let now = Instant::now();
            if now >= deadline {
                warn!("session still {:?} after {timeout:?}", self.status());
                break;
            }
            self.pump_blocking(deadline - now);
        }
        self.status()
    }

    /// Pump until the archive engine reports ready or the timeout passes
    pub fn wait_for_engine(&mut self, timeout: Duration) -> EngineState {
        let deadline = Instant::now() + timeout;
        while self.engine == EngineState::Initializing {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            self.pump_blocking(deadline - now);
        }
        self.engine
    }

    /// Reduce one worker event
    pub fn handle_event(&mut self, event: WorkerEvent) {
        let WorkerEvent { session, message } = event;

        if let Some(id) = session {
            if self.session.as_ref().map(|s| s.id) != Some(id) {
                self.discard_stale(id, message);
                return;
            }
        }

        if let Some(recorded) = self.recorded.as_mut() {
            recorded.push(message.clone());
        }

        if let Some(current) = self.session.as_mut() {
            if session.is_some() {
                current.record(&message);
            }
        }

        for effect in self.controller.handle(message) {
            self.apply_render_effect(effect);
        }
    }

    fn discard_stale(&mut self, id: SessionId, message: WorkerMessage) {
        debug!("dropping event from superseded session {}", id.0);
        if let WorkerMessage::Uncompress(page) = message {
            self.lifecycle.release_orphan(&page.url);
        }
    }

    fn apply_render_effect(&mut self, effect: RenderEffect) {
        match effect {
            RenderEffect::PageInserted { index, url } => {
                self.lifecycle.adopt(index, url);
                self.relayout(false);
            }

            RenderEffect::Superseded(previous) => {
                self.lifecycle.release_orphan(&previous.url);
            }

            RenderEffect::ContentReady => {
                debug!("first page ready");
            }

            RenderEffect::TotalKnown(total) => {
                let _ = self
                    .position
                    .apply(PositionCommand::EnableTracking(total), self.controller.pages());
                self.tracker.observe(&self.layout);
                self.refresh_intersections();
            }

            RenderEffect::Notify(error) => {
                self.notifications.error(error.to_string());
            }

            RenderEffect::EngineReady => {
                self.engine = EngineState::Ready;
            }
        }
    }

    fn apply_position_effects(&mut self, effects: Vec<PositionEffect>) {
        for effect in effects {
            match effect {
                PositionEffect::ScrollIntoView(index) => {
                    if let Some(top) = top_of(&self.layout, index) {
                        self.viewport.scroll_top = top;
                        self.refresh_intersections();
                    }
                }
            }
        }
    }

    fn refresh_intersections(&mut self) {
        let changes = self
            .tracker
            .update(self.viewport.scroll_top, self.viewport.height);
        if changes.is_empty() {
            return;
        }
        let effects = self.position.apply(
            PositionCommand::Intersections(changes),
            self.controller.pages(),
        );
        self.apply_position_effects(effects);
    }

    /// Recompute page boxes; with `anchor`, keep the current page at the viewport top
    fn relayout(&mut self, anchor: bool) {
        self.layout = layout_pages(self.controller.pages(), self.viewport.column_width);
        if anchor {
            if let Some(top) = self
                .position
                .current()
                .and_then(|current| top_of(&self.layout, current))
            {
                self.viewport.scroll_top = top;
            }
        }
        self.viewport.scroll_top = self.viewport.scroll_top.min(self.max_scroll());
        self.tracker.relayout(&self.layout);
        self.refresh_intersections();
    }

    /// Scrolling stops once the last page's top reaches the viewport top
    fn max_scroll(&self) -> u64 {
        self.layout.last().map_or(0, |b| b.top)
    }

    pub fn set_viewport(&mut self, column_width: u32, height: u32) {
        let column_width = column_width.max(1);
        if self.viewport.column_width == column_width && self.viewport.height == height {
            return;
        }
        self.viewport.column_width = column_width;
        self.viewport.height = height;
        self.relayout(true);
    }

    /// Scroll-driven input
    pub fn scroll_to(&mut self, scroll_top: u64) {
        self.viewport.scroll_top = scroll_top.min(self.max_scroll());
        self.refresh_intersections();
    }

    pub fn scroll_by(&mut self, delta: i64) {
        let target = if delta < 0 {
            self.viewport.scroll_top.saturating_sub(delta.unsigned_abs())
        } else {
            self.viewport.scroll_top.saturating_add(delta.unsigned_abs())
        };
        self.scroll_to(target);
    }

    /// Keyboard-driven input
    pub fn key(&mut self, key: NavKey) {
        let effects = self
            .position
            .apply(PositionCommand::Key(key), self.controller.pages());
        self.apply_position_effects(effects);
    }

    /// Live slider movement; never scrolls
    pub fn slider_drag(&mut self, value: usize) {
        let effects = self
            .position
            .apply(PositionCommand::SliderDrag(value), self.controller.pages());
        self.apply_position_effects(effects);
    }

    pub fn slider_commit(&mut self, value: usize) {
        let effects = self
            .position
            .apply(PositionCommand::SliderCommit(value), self.controller.pages());
        self.apply_position_effects(effects);
    }

    /// End the session: stop its decoding, release every page resource, clear all state
    pub fn reset(&mut self) -> usize {
        self.worker.cancel_session();
        self.session = None;
        self.tracker.disconnect();
        let revoked = self
            .lifecycle
            .reset(&mut self.controller, &mut self.position);
        self.layout.clear();
        self.viewport.scroll_top = 0;
        revoked
    }

    /// Abandon decoding entirely. Pages already materialized stay owned until [`Reader::reset`].
    pub fn teardown(&mut self) {
        self.worker.terminate();
        if let Some(session) = self.session.as_mut() {
            if !session.status.is_settled() {
                session.status = SessionStatus::Failed;
            }
        }
    }
}
