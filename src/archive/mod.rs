//! Archive access - the container formats a comic file may come in
//!
//! Opening sniffs the container from its magic bytes and hands back a
//! backend that lists entries in archive order and reads them on demand.
//! Backends are `Send + Sync` so the decode worker can read entries from
//! several threads at once.

mod tarball;
mod zipfile;

use std::fmt;
use std::sync::Arc;

use log::debug;

pub use tarball::TarBackend;
pub use zipfile::ZipBackend;

const ZIP_LOCAL_MAGIC: &[u8] = b"PK\x03\x04";
const ZIP_EMPTY_MAGIC: &[u8] = b"PK\x05\x06";
const RAR_MAGIC: &[u8] = b"Rar!\x1a\x07";
const TAR_MAGIC: &[u8] = b"ustar";
const TAR_MAGIC_OFFSET: usize = 257;
const TAR_BLOCK: usize = 512;

/// Container formats the engine knows about
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Rar,
    Tar,
}

impl ArchiveFormat {
    /// Every format the engine registers at startup
    pub const ALL: [ArchiveFormat; 3] = [ArchiveFormat::Rar, ArchiveFormat::Zip, ArchiveFormat::Tar];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Rar => "rar",
            ArchiveFormat::Tar => "tar",
        }
    }

    /// Whether a backend exists for this format
    pub fn is_readable(&self) -> bool {
        !matches!(self, ArchiveFormat::Rar)
    }

    /// Identify a container from its leading bytes
    #[must_use]
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(ZIP_LOCAL_MAGIC) || bytes.starts_with(ZIP_EMPTY_MAGIC) {
            return Some(ArchiveFormat::Zip);
        }
        if bytes.starts_with(RAR_MAGIC) {
            return Some(ArchiveFormat::Rar);
        }
        let ustar = bytes
            .get(TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + TAR_MAGIC.len())
            .is_some_and(|magic| magic == TAR_MAGIC);
        // Pre-POSIX tars carry no magic; accept block-aligned buffers and let the parser decide
        if ustar || (bytes.len() >= 2 * TAR_BLOCK && bytes.len() % TAR_BLOCK == 0) {
            return Some(ArchiveFormat::Tar);
        }
        None
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while opening or reading an archive
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("unrecognized archive format")]
    Unrecognized,

    #[error("unsupported archive format: {0}")]
    Unsupported(ArchiveFormat),

    #[error("zip: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("no entry at position {0}")]
    NoSuchEntry(usize),

    #[error("invalid password for entry {0}")]
    InvalidPassword(String),

    #[error("entry {name} is truncated")]
    Truncated { name: String },
}

/// One record inside an archive
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryInfo {
    pub name: String,
    pub is_file: bool,
}

/// An opened archive
pub trait Archive: Send + Sync {
    fn format(&self) -> ArchiveFormat;

    /// Entries in archive order
    fn entries(&self) -> &[EntryInfo];

    /// Read the full payload of the entry at `position` in [`Archive::entries`]
    fn read_entry(&self, position: usize) -> Result<Vec<u8>, ArchiveError>;
}

/// Archive bytes shared between the backend and its readers without copying
#[derive(Clone, Debug)]
pub struct SharedBytes(Arc<Vec<u8>>);

impl SharedBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Arc::new(bytes))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for SharedBytes {
    fn as_ref(&self) -> &[u8] {
        self.0.as_slice()
    }
}

/// Open an archive from a complete in-memory buffer
///
/// The buffer is moved in; the returned backend owns it for its lifetime.
/// An empty `password` is treated as no password.
pub fn open_archive(
    file_name: &str,
    password: Option<&str>,
    bytes: Vec<u8>,
) -> Result<Box<dyn Archive>, ArchiveError> {
    let format = ArchiveFormat::sniff(&bytes).ok_or(ArchiveError::Unrecognized)?;
    debug!("Opening {file_name:?} as {format} ({} bytes)", bytes.len());

    let password = password.filter(|p| !p.is_empty());
    let shared = SharedBytes::new(bytes);
    match format {
        ArchiveFormat::Zip => Ok(Box::new(ZipBackend::open(shared, password)?)),
        ArchiveFormat::Tar => Ok(Box::new(TarBackend::open(shared)?)),
        ArchiveFormat::Rar => Err(ArchiveError::Unsupported(format)),
    }
}
