//! Fixtures shared by unit and integration tests: in-memory archives,
//! minimal image headers and a scripted terminal session.

use std::io::{Cursor, Write};

use zip::CompressionMethod;
use zip::write::FileOptions;

/// Item to place in a generated ZIP
pub enum ZipItem<'a> {
    File(&'a str, Vec<u8>),
    Dir(&'a str),
}

/// Item to place in a generated TAR
pub enum TarItem<'a> {
    File(&'a str, Vec<u8>),
    Dir(&'a str),
}

/// Smallest GIF header `imagesize` can measure
pub fn gif_bytes(width: u16, height: u16) -> Vec<u8> {
    let mut data = b"GIF89a".to_vec();
    data.extend_from_slice(&width.to_le_bytes());
    data.extend_from_slice(&height.to_le_bytes());
    data.extend_from_slice(&[0x00, 0x00, 0x00, b';']);
    data
}

/// PNG signature plus IHDR chunk
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut data = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    data.extend_from_slice(&13u32.to_be_bytes());
    data.extend_from_slice(b"IHDR");
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&height.to_be_bytes());
    data.extend_from_slice(&[8, 6, 0, 0, 0]);
    data.extend_from_slice(&[0, 0, 0, 0]);
    data
}

pub fn zip_archive(files: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let items: Vec<ZipItem> = files
        .iter()
        .map(|(name, data)| ZipItem::File(*name, data.clone()))
        .collect();
    zip_archive_with(&items)
}

/// Stored (uncompressed) so tests can locate and corrupt payload bytes
pub fn zip_archive_with(items: &[ZipItem]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);

    for item in items {
        match item {
            ZipItem::File(name, data) => {
                zip.start_file(*name, options).unwrap();
                zip.write_all(data).unwrap();
            }
            ZipItem::Dir(name) => {
                zip.add_directory(*name, options).unwrap();
            }
        }
    }

    zip.finish().unwrap().into_inner()
}

pub fn tar_archive(files: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let items: Vec<TarItem> = files
        .iter()
        .map(|(name, data)| TarItem::File(*name, data.clone()))
        .collect();
    tar_archive_with(&items)
}

pub fn tar_archive_with(items: &[TarItem]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());

    for item in items {
        let mut header = tar::Header::new_gnu();
        header.set_mode(0o644);
        match item {
            TarItem::File(name, data) => {
                header.set_entry_type(tar::EntryType::Regular);
                header.set_size(data.len() as u64);
                header.set_cksum();
                builder.append_data(&mut header, name, data.as_slice()).unwrap();
            }
            TarItem::Dir(name) => {
                header.set_entry_type(tar::EntryType::Directory);
                header.set_size(0);
                header.set_cksum();
                builder.append_data(&mut header, name, std::io::empty()).unwrap();
            }
        }
    }

    builder.into_inner().unwrap()
}

/// A comic with `pages` GIF pages named `001.gif`, `002.gif`, ...
/// Page `n` measures `100 * n` by `150 * n`.
pub fn comic_zip(pages: usize) -> Vec<u8> {
    let files: Vec<(String, Vec<u8>)> = (1..=pages)
        .map(|n| {
            let n16 = n as u16;
            (format!("{n:03}.gif"), gif_bytes(100 * n16, 150 * n16))
        })
        .collect();
    let borrowed: Vec<(&str, Vec<u8>)> = files
        .iter()
        .map(|(name, data)| (name.as_str(), data.clone()))
        .collect();
    zip_archive(&borrowed)
}

/// Flip one byte of the first occurrence of `needle` so its CRC no longer matches
pub fn corrupt_payload(archive: &mut [u8], needle: &[u8]) {
    let at = archive
        .windows(needle.len())
        .position(|w| w == needle)
        .expect("payload present in archive");
    archive[at + needle.len() - 1] ^= 0xFF;
}

/// Overwrite the compressed and uncompressed sizes of the `nth` central-directory record
pub fn inflate_declared_size(archive: &mut [u8], nth: usize, size: u32) {
    let at = archive
        .windows(4)
        .enumerate()
        .filter(|(_, w)| *w == b"PK\x01\x02")
        .nth(nth)
        .map(|(i, _)| i)
        .expect("central directory record present");
    archive[at + 20..at + 24].copy_from_slice(&size.to_le_bytes());
    archive[at + 24..at + 28].copy_from_slice(&size.to_le_bytes());
}

pub mod test_helpers {
    use crate::event_source::{Event, KeyCode, KeyEvent, KeyModifiers, SimulatedEventSource};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    /// Builder for creating test scenarios with simulated user input
    pub struct TestScenarioBuilder {
        events: Vec<Event>,
    }

    impl Default for TestScenarioBuilder {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TestScenarioBuilder {
        pub fn new() -> Self {
            Self { events: Vec::new() }
        }

        pub fn press(mut self, code: KeyCode) -> Self {
            self.events.push(SimulatedEventSource::key_event(
                code,
                KeyModifiers::empty(),
            ));
            self
        }

        pub fn press_char(self, c: char) -> Self {
            self.press(KeyCode::Char(c))
        }

        /// Next page n times (Down arrow)
        pub fn next_page(mut self, times: usize) -> Self {
            for _ in 0..times {
                self = self.press(KeyCode::Down);
            }
            self
        }

        /// Previous page n times (Up arrow)
        pub fn prev_page(mut self, times: usize) -> Self {
            for _ in 0..times {
                self = self.press(KeyCode::Up);
            }
            self
        }

        pub fn quit(self) -> Self {
            self.press_char('q')
        }

        pub fn events(&self) -> &[Event] {
            &self.events
        }

        pub fn build(self) -> SimulatedEventSource {
            SimulatedEventSource::new(self.events)
        }
    }

    pub fn enter_key() -> Event {
        Event::Key(KeyEvent::new(KeyCode::Enter, KeyModifiers::empty()))
    }

    /// Create a test terminal for snapshot testing
    pub fn create_test_terminal(width: u16, height: u16) -> Terminal<TestBackend> {
        let backend = TestBackend::new(width, height);
        Terminal::new(backend).unwrap()
    }

    /// Capture the current terminal buffer as a string
    pub fn capture_terminal_state(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut lines = Vec::new();

        for y in 0..buffer.area.height {
            let mut line = String::new();
            for x in 0..buffer.area.width {
                line.push_str(buffer[(x, y)].symbol());
            }
            lines.push(line.trim_end().to_string());
        }

        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }

        lines.join("\n")
    }
}
