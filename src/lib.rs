pub mod app;
pub mod archive;
pub mod decode;
pub mod event_source;
pub mod notification;
pub mod panic_handler;
pub mod reader;
pub mod resource;
pub mod settings;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use app::{App, run_app_with_event_source};
pub use reader::{Reader, ReaderError, SessionStatus};
