//! Decode worker - runs on its own thread, fans entry decoding out to rayon

use flume::{Receiver, Sender};
use log::{debug, info, warn};
use rayon::prelude::*;

use super::image_kind::{is_page_image, mime_for_name, sniff_dimensions};
use super::message::{
    CancelToken, DecodeError, PageReady, SessionId, WorkerEvent, WorkerMessage, WorkerRequest,
};
use crate::archive::{self, Archive, ArchiveFormat, EntryInfo};
use crate::resource::ResourceStore;

/// Password handed to the archive engine; comic archives are not encrypted
const ARCHIVE_PASSWORD: &str = "";

/// Archive engine lifecycle on the worker side
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Initializing,
    Ready,
}

/// Worker loop: announce readiness, then serve `Start` requests until shutdown
pub fn decode_worker(
    requests: Receiver<WorkerRequest>,
    events: Sender<WorkerEvent>,
    store: ResourceStore,
) {
    let mut engine = EngineState::Initializing;
    let formats: Vec<&str> = ArchiveFormat::ALL
        .iter()
        .filter(|f| f.is_readable())
        .map(ArchiveFormat::as_str)
        .collect();
    debug!("archive engine {engine:?}, registering formats {formats:?}");
    engine = EngineState::Ready;
    info!("archive engine {engine:?}");
    let _ = events.send(WorkerEvent::engine(WorkerMessage::Ready));

    for request in requests {
        match request {
            WorkerRequest::Start {
                session,
                file_name,
                bytes,
                cancel,
            } => {
                if cancel.is_cancelled() {
                    debug!("session {session:?} cancelled before it started");
                    continue;
                }
                run_session(session, &file_name, bytes, &events, &store, &cancel);
            }

            WorkerRequest::Shutdown => break,
        }
    }

    debug!("decode worker exiting");
}

/// Open one archive and stream its pages
pub fn run_session(
    session: SessionId,
    file_name: &str,
    bytes: Vec<u8>,
    events: &Sender<WorkerEvent>,
    store: &ResourceStore,
    cancel: &CancelToken,
) {
    let send = |message: WorkerMessage| {
        if let Err(flume::SendError(event)) = events.send(WorkerEvent::session(session, message)) {
            release_undelivered(store, event.message);
        }
    };

    let archive = match archive::open_archive(file_name, Some(ARCHIVE_PASSWORD), bytes) {
        Ok(archive) => archive,
        Err(e) => {
            warn!("failed to open {file_name:?}: {e}");
            send(WorkerMessage::Error {
                error: DecodeError::Open {
                    reason: e.to_string(),
                },
            });
            return;
        }
    };

    let pages = page_entries(archive.entries());
    let total = pages.len();
    if total == 0 {
        info!("{file_name:?} contains no page images");
        send(WorkerMessage::Error {
            error: DecodeError::NoImagesFound,
        });
        return;
    }

    info!(
        "decoding {total} pages from {file_name:?} ({} entries)",
        archive.entries().len()
    );

    pages.par_iter().enumerate().for_each(|(i, &position)| {
        if cancel.is_cancelled() {
            return;
        }
        let index = i + 1;
        let message = match decode_page(&*archive, position, index, total, store, cancel) {
            Some(Ok(page)) => WorkerMessage::Uncompress(page),
            Some(Err(error)) => WorkerMessage::Error { error },
            None => return,
        };
        send(message);
    });

    debug!("session {session:?} finished decoding");
}

/// Nobody is listening any more; free what the message would have handed over
fn release_undelivered(store: &ResourceStore, message: WorkerMessage) {
    if let WorkerMessage::Uncompress(page) = message {
        debug!("consumer gone, releasing page {}", page.index);
        store.revoke(&page.url);
    }
}

/// Archive positions of the entries that become pages, in archive order
pub fn page_entries(entries: &[EntryInfo]) -> Vec<usize> {
    entries
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry.is_file && is_page_image(&entry.name))
        .map(|(position, _)| position)
        .collect()
}

/// Decode one entry; `None` when cancellation was observed before a resource was created
fn decode_page(
    archive: &dyn Archive,
    position: usize,
    index: usize,
    total: usize,
    store: &ResourceStore,
    cancel: &CancelToken,
) -> Option<Result<PageReady, DecodeError>> {
    let name = &archive.entries()[position].name;
    let data = match archive.read_entry(position) {
        Ok(data) => data,
        Err(e) => {
            warn!("failed to read entry {name:?} (page {index}): {e}");
            return Some(Err(DecodeError::EntryRead {
                index,
                total,
                reason: e.to_string(),
            }));
        }
    };

    let (width, height) = sniff_dimensions(&data);
    if width == 0 || height == 0 {
        debug!("could not measure {name:?}, reporting 0x0");
    }

    if cancel.is_cancelled() {
        return None;
    }
    let url = store.create(data, mime_for_name(name));

    Some(Ok(PageReady {
        url,
        index,
        width,
        height,
        total,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{gif_bytes, zip_archive};

    fn run(bytes: Vec<u8>) -> (Vec<WorkerEvent>, ResourceStore) {
        let (tx, rx) = flume::unbounded();
        let store = ResourceStore::new();
        run_session(
            SessionId(7),
            "test.cbz",
            bytes,
            &tx,
            &store,
            &CancelToken::new(),
        );
        drop(tx);
        (rx.iter().collect(), store)
    }

    #[test]
    fn page_entries_skip_non_images_and_directories() {
        let entries = vec![
            EntryInfo {
                name: "ComicInfo.xml".into(),
                is_file: true,
            },
            EntryInfo {
                name: "covers.jpg".into(),
                is_file: false,
            },
            EntryInfo {
                name: "01.jpg".into(),
                is_file: true,
            },
            EntryInfo {
                name: "02.PNG".into(),
                is_file: true,
            },
        ];
        assert_eq!(page_entries(&entries), vec![2, 3]);
    }

    #[test]
    fn indices_follow_archive_order() {
        let bytes = zip_archive(&[
            ("b.gif", gif_bytes(1, 2)),
            ("info.txt", b"x".to_vec()),
            ("a.gif", gif_bytes(3, 4)),
        ]);
        let (events, store) = run(bytes);

        let mut pages: Vec<_> = events
            .iter()
            .filter_map(|e| match &e.message {
                WorkerMessage::Uncompress(p) => Some((p.index, p.width, p.height, p.total)),
                _ => None,
            })
            .collect();
        pages.sort();

        assert_eq!(pages, vec![(1, 1, 2, 2), (2, 3, 4, 2)]);
        assert!(events.iter().all(|e| e.session == Some(SessionId(7))));
        assert_eq!(store.live(), 2);
    }

    #[test]
    fn garbage_yields_single_open_error() {
        let (events, store) = run(b"not an archive".to_vec());

        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0].message,
            WorkerMessage::Error {
                error: DecodeError::Open { .. }
            }
        ));
        assert_eq!(store.stats().created, 0);
    }

    #[test]
    fn archive_without_images_reports_once() {
        let (events, _) = run(zip_archive(&[("readme.txt", b"hi".to_vec())]));

        assert_eq!(
            events,
            vec![WorkerEvent::session(
                SessionId(7),
                WorkerMessage::Error {
                    error: DecodeError::NoImagesFound
                }
            )]
        );
    }

    #[test]
    fn cancelled_session_creates_no_resources() {
        let (tx, rx) = flume::unbounded();
        let store = ResourceStore::new();
        let cancel = CancelToken::new();
        cancel.cancel();

        run_session(
            SessionId(1),
            "c.cbz",
            zip_archive(&[("a.gif", gif_bytes(1, 1))]),
            &tx,
            &store,
            &cancel,
        );
        drop(tx);

        assert_eq!(rx.iter().count(), 0);
        assert_eq!(store.stats().created, 0);
    }

    #[test]
    fn undelivered_pages_are_released() {
        let (tx, rx) = flume::unbounded();
        drop(rx);
        let store = ResourceStore::new();

        run_session(
            SessionId(3),
            "gone.cbz",
            zip_archive(&[("a.gif", gif_bytes(1, 1)), ("b.gif", gif_bytes(2, 2))]),
            &tx,
            &store,
            &CancelToken::new(),
        );

        assert_eq!(store.stats().created, 2);
        assert_eq!(store.live(), 0);
    }

    #[test]
    fn unmeasurable_pages_report_zero_dimensions() {
        let (events, store) = run(zip_archive(&[("broken.jpg", b"not jpeg".to_vec())]));

        match &events[0].message {
            WorkerMessage::Uncompress(page) => {
                assert_eq!((page.width, page.height), (0, 0));
                assert_eq!(store.get(&page.url).unwrap().mime, "image/jpeg");
            }
            other => panic!("expected a page, got {other:?}"),
        }
    }
}
