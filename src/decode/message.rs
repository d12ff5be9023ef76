//! Messages exchanged with the decode worker

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Serialize, Serializer};

use crate::resource::ResourceUrl;

/// Identifies one `start` request; events from older sessions are stale
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

/// Cancellation flag for the session currently being decoded
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Consumer -> worker
#[derive(Debug)]
pub enum WorkerRequest {
    /// Open an archive. The buffer is moved into the worker.
    Start {
        session: SessionId,
        file_name: String,
        bytes: Vec<u8>,
        cancel: CancelToken,
    },

    Shutdown,
}

/// One successfully decoded page
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PageReady {
    pub url: ResourceUrl,
    /// 1-based position among the archive's image entries
    pub index: usize,
    pub width: u32,
    pub height: u32,
    pub total: usize,
}

/// Failures reported by the worker. Display strings are user-facing.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Error Opening Archive")]
    Open { reason: String },

    #[error("No Images Found")]
    NoImagesFound,

    #[error("Error Reading Entry")]
    EntryRead {
        index: usize,
        total: usize,
        reason: String,
    },
}

impl DecodeError {
    /// Whether the session can produce no further pages
    pub fn is_session_fatal(&self) -> bool {
        !matches!(self, DecodeError::EntryRead { .. })
    }
}

impl Serialize for DecodeError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Worker -> consumer
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum WorkerMessage {
    Uncompress(PageReady),
    Error { error: DecodeError },
    /// Engine finished registering formats and accepts `start`
    Ready,
}

/// A message plus the session it belongs to (`None` for engine-level messages)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerEvent {
    pub session: Option<SessionId>,
    pub message: WorkerMessage,
}

impl WorkerEvent {
    pub fn engine(message: WorkerMessage) -> Self {
        Self {
            session: None,
            message,
        }
    }

    pub fn session(session: SessionId, message: WorkerMessage) -> Self {
        Self {
            session: Some(session),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceStore;

    #[test]
    fn wire_form_matches_protocol() {
        let url = ResourceStore::new().create(vec![], "image/png");
        let page = WorkerMessage::Uncompress(PageReady {
            url: url.clone(),
            index: 2,
            width: 640,
            height: 960,
            total: 12,
        });

        let json: serde_json::Value = serde_json::to_value(&page).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "action": "uncompress",
                "url": url.as_str(),
                "index": 2,
                "width": 640,
                "height": 960,
                "total": 12,
            })
        );

        let error = WorkerMessage::Error {
            error: DecodeError::NoImagesFound,
        };
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            serde_json::json!({"action": "error", "error": "No Images Found"})
        );

        assert_eq!(
            serde_json::to_value(&WorkerMessage::Ready).unwrap(),
            serde_json::json!({"action": "ready"})
        );
    }

    #[test]
    fn only_entry_errors_are_recoverable() {
        assert!(
            DecodeError::Open {
                reason: "bad".into()
            }
            .is_session_fatal()
        );
        assert!(DecodeError::NoImagesFound.is_session_fatal());
        assert!(
            !DecodeError::EntryRead {
                index: 1,
                total: 2,
                reason: "crc".into()
            }
            .is_session_fatal()
        );
    }
}
