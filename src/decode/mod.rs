//! Archive decoding off the interactive thread
//!
//! [`DecodeWorker`] owns a dedicated thread that opens archives and streams
//! one [`WorkerMessage`] per decoded page. Entries decode in parallel, so
//! pages arrive in any order; each carries its 1-based archive index.

mod image_kind;
mod message;
mod worker;

use std::thread::JoinHandle;
use std::time::Duration;

use flume::{Receiver, RecvTimeoutError, Sender};
use log::{debug, warn};

pub use image_kind::{DEFAULT_MIME, ImageKind, is_page_image, mime_for_name, sniff_dimensions};
pub use message::{
    CancelToken, DecodeError, PageReady, SessionId, WorkerEvent, WorkerMessage, WorkerRequest,
};
pub use worker::{EngineState, decode_worker, page_entries, run_session};

use crate::resource::ResourceStore;

/// Handle to the decode thread
pub struct DecodeWorker {
    request_tx: Sender<WorkerRequest>,
    event_rx: Receiver<WorkerEvent>,
    current: Option<CancelToken>,
    thread: Option<JoinHandle<()>>,
    terminated: bool,
}

impl DecodeWorker {
    /// Spawn the worker thread. Resources it creates are registered in `store`.
    #[must_use]
    pub fn spawn(store: ResourceStore) -> Self {
        let (request_tx, request_rx) = flume::unbounded();
        let (event_tx, event_rx) = flume::unbounded();

        let thread = std::thread::spawn(move || {
            decode_worker(request_rx, event_tx, store);
        });

        Self {
            request_tx,
            event_rx,
            current: None,
            thread: Some(thread),
            terminated: false,
        }
    }

    /// Begin decoding `bytes`. Any session still decoding is cancelled first.
    ///
    /// Returns false if the worker has been terminated.
    pub fn start(&mut self, session: SessionId, file_name: &str, bytes: Vec<u8>) -> bool {
        if self.terminated {
            warn!("start on terminated decode worker ignored");
            return false;
        }

        self.cancel_session();
        let cancel = CancelToken::new();
        self.current = Some(cancel.clone());

        self.request_tx
            .send(WorkerRequest::Start {
                session,
                file_name: file_name.to_string(),
                bytes,
                cancel,
            })
            .is_ok()
    }

    /// Stop decoding the current session; already emitted events still arrive
    pub fn cancel_session(&mut self) {
        if let Some(cancel) = self.current.take() {
            cancel.cancel();
        }
    }

    /// Drain every event currently queued
    pub fn poll_events(&self) -> Vec<WorkerEvent> {
        self.event_rx.try_iter().collect()
    }

    /// Wait up to `timeout` for the next event
    pub fn recv_timeout(&self, timeout: Duration) -> Option<WorkerEvent> {
        match self.event_rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Cancel any session and stop the thread. The handle cannot start new sessions afterwards.
    pub fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.cancel_session();
        let _ = self.request_tx.send(WorkerRequest::Shutdown);
        self.terminated = true;
        // Entry decodes may still be finishing on the rayon pool; don't block on them
        self.thread.take();
        debug!("decode worker terminated");
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }
}

impl Drop for DecodeWorker {
    fn drop(&mut self) {
        self.terminate();
    }
}
