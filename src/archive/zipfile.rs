//! ZIP backend (.cbz)

use std::io::{Cursor, Read};
use std::sync::{Mutex, PoisonError};

use zip::ZipArchive;

use super::{Archive, ArchiveError, ArchiveFormat, EntryInfo, SharedBytes};

pub struct ZipBackend {
    // ZipArchive needs &mut for reads, so concurrent readers take turns here
    archive: Mutex<ZipArchive<Cursor<SharedBytes>>>,
    entries: Vec<EntryInfo>,
    password: Option<Vec<u8>>,
}

impl ZipBackend {
    pub fn open(bytes: SharedBytes, password: Option<&str>) -> Result<Self, ArchiveError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;

        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            // Raw access reads the header only, so encrypted entries list fine
            let file = archive.by_index_raw(i)?;
            entries.push(EntryInfo {
                name: file.name().to_string(),
                is_file: file.is_file(),
            });
        }

        Ok(Self {
            archive: Mutex::new(archive),
            entries,
            password: password.map(|p| p.as_bytes().to_vec()),
        })
    }
}

impl Archive for ZipBackend {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Zip
    }

    fn entries(&self) -> &[EntryInfo] {
        &self.entries
    }

    fn read_entry(&self, position: usize) -> Result<Vec<u8>, ArchiveError> {
        let entry = self
            .entries
            .get(position)
            .ok_or(ArchiveError::NoSuchEntry(position))?;

        let mut archive = self.archive.lock().unwrap_or_else(PoisonError::into_inner);
        let mut file = match &self.password {
            Some(password) => archive
                .by_index_decrypt(position, password)?
                .map_err(|_| ArchiveError::InvalidPassword(entry.name.clone()))?,
            None => archive.by_index(position)?,
        };

        // Declared sizes come from the central directory and are not trusted for allocation
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        ZipItem, gif_bytes, inflate_declared_size, zip_archive, zip_archive_with,
    };

    #[test]
    fn lists_entries_in_archive_order() {
        let bytes = zip_archive(&[
            ("b.gif", gif_bytes(1, 1)),
            ("a.gif", gif_bytes(2, 2)),
            ("notes.txt", b"hello".to_vec()),
        ]);
        let backend = ZipBackend::open(SharedBytes::new(bytes), None).unwrap();

        let names: Vec<_> = backend.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["b.gif", "a.gif", "notes.txt"]);
        assert_eq!(backend.read_entry(1).unwrap(), gif_bytes(2, 2));
        assert_eq!(backend.read_entry(2).unwrap(), b"hello".to_vec());
    }

    #[test]
    fn directories_are_not_files() {
        let bytes = zip_archive_with(&[
            ZipItem::Dir("chapter1/"),
            ZipItem::File("chapter1/01.gif", gif_bytes(1, 1)),
        ]);
        let backend = ZipBackend::open(SharedBytes::new(bytes), None).unwrap();

        assert!(!backend.entries()[0].is_file);
        assert!(backend.entries()[1].is_file);
    }

    #[test]
    fn out_of_range_read_fails() {
        let bytes = zip_archive(&[("a.gif", gif_bytes(1, 1))]);
        let backend = ZipBackend::open(SharedBytes::new(bytes), None).unwrap();

        assert!(matches!(
            backend.read_entry(5),
            Err(ArchiveError::NoSuchEntry(5))
        ));
    }

    #[test]
    fn truncated_central_directory_fails_to_open() {
        let mut bytes = zip_archive(&[("a.gif", gif_bytes(1, 1))]);
        bytes.truncate(bytes.len() / 2);

        assert!(ZipBackend::open(SharedBytes::new(bytes), None).is_err());
    }

    #[test]
    fn huge_declared_size_does_not_preallocate() {
        let mut bytes = zip_archive(&[("a.gif", gif_bytes(1, 1)), ("b.gif", gif_bytes(2, 2))]);
        inflate_declared_size(&mut bytes, 0, 0xFFFF_FFF0);
        let backend = ZipBackend::open(SharedBytes::new(bytes), None).unwrap();

        // Whatever the lying entry yields, it must come back without a 4GiB buffer
        if let Ok(data) = backend.read_entry(0) {
            assert!(data.len() < 4096);
        }
        assert_eq!(backend.read_entry(1).unwrap(), gif_bytes(2, 2));
    }
}
