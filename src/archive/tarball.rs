//! TAR backend (.cbt)

use super::{Archive, ArchiveError, ArchiveFormat, EntryInfo, SharedBytes};

/// Location of an entry's payload within the archive buffer
#[derive(Clone, Copy, Debug)]
struct Span {
    offset: u64,
    len: u64,
}

pub struct TarBackend {
    bytes: SharedBytes,
    entries: Vec<EntryInfo>,
    spans: Vec<Span>,
}

impl TarBackend {
    pub fn open(bytes: SharedBytes) -> Result<Self, ArchiveError> {
        let mut entries = Vec::new();
        let mut spans = Vec::new();

        {
            let mut archive = tar::Archive::new(bytes.as_ref());
            for entry in archive.entries()? {
                let entry = entry?;
                let header = entry.header();
                entries.push(EntryInfo {
                    name: entry.path()?.to_string_lossy().into_owned(),
                    is_file: header.entry_type().is_file(),
                });
                spans.push(Span {
                    offset: entry.raw_file_position(),
                    len: header.entry_size()?,
                });
            }
        }

        Ok(Self {
            bytes,
            entries,
            spans,
        })
    }
}

impl Archive for TarBackend {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Tar
    }

    fn entries(&self) -> &[EntryInfo] {
        &self.entries
    }

    fn read_entry(&self, position: usize) -> Result<Vec<u8>, ArchiveError> {
        let (entry, span) = self
            .entries
            .get(position)
            .zip(self.spans.get(position))
            .ok_or(ArchiveError::NoSuchEntry(position))?;

        let start = usize::try_from(span.offset).ok();
        let end = start.and_then(|s| s.checked_add(usize::try_from(span.len).ok()?));
        match (start, end) {
            (Some(start), Some(end)) if end <= self.bytes.len() => {
                Ok(self.bytes.as_ref()[start..end].to_vec())
            }
            _ => Err(ArchiveError::Truncated {
                name: entry.name.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TarItem, gif_bytes, tar_archive, tar_archive_with};

    #[test]
    fn reads_payloads_by_offset() {
        let bytes = tar_archive(&[
            ("001.gif", gif_bytes(10, 20)),
            ("002.gif", gif_bytes(30, 40)),
        ]);
        let backend = TarBackend::open(SharedBytes::new(bytes)).unwrap();

        assert_eq!(backend.entries().len(), 2);
        assert_eq!(backend.entries()[1].name, "002.gif");
        assert_eq!(backend.read_entry(0).unwrap(), gif_bytes(10, 20));
        assert_eq!(backend.read_entry(1).unwrap(), gif_bytes(30, 40));
    }

    #[test]
    fn directories_are_listed_but_not_files() {
        let bytes = tar_archive_with(&[
            TarItem::Dir("vol1/"),
            TarItem::File("vol1/001.gif", gif_bytes(1, 1)),
        ]);
        let backend = TarBackend::open(SharedBytes::new(bytes)).unwrap();

        assert_eq!(backend.entries().len(), 2);
        assert!(!backend.entries()[0].is_file);
        assert!(backend.entries()[1].is_file);
    }

    #[test]
    fn zero_filled_buffer_is_an_empty_archive() {
        let backend = TarBackend::open(SharedBytes::new(vec![0; 1024])).unwrap();
        assert!(backend.entries().is_empty());
    }
}
