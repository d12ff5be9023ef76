//! Interactive side of the reader
//!
//! The decode worker streams pages in; everything here runs on the
//! interactive thread and is driven by explicit commands.

pub mod controller;
pub mod intersection;
pub mod lifecycle;
pub mod position;
mod session;

pub use controller::{EAGER_PAGE_LIMIT, LoadPolicy, PageElement, PageList, RenderController, RenderEffect};
pub use intersection::{IntersectionEntry, IntersectionTracker, PageBox};
pub use lifecycle::ResourceLifecycle;
pub use position::{NavKey, PositionCommand, PositionEffect, PositionState};
pub use session::{
    ACCEPTED_EXTENSIONS, Reader, ReaderError, Session, SessionStatus, Viewport, check_file_type,
};
