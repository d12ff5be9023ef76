//! Revocable in-memory display resources
//!
//! A decoded page's bytes are registered here and addressed by a
//! [`ResourceUrl`]. The URL is what travels through the event stream and
//! into the page list; the bytes stay in the store until the URL is revoked.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, warn};
use serde::Serialize;

const URL_PREFIX: &str = "blob:panels/";

/// Live resources above this count are reported as a probable leak
const LIVE_AUDIT_THRESHOLD: usize = 4096;

/// Address of a registered resource
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ResourceUrl(String);

impl ResourceUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registered bytes plus their display type
#[derive(Clone, Debug)]
pub struct Blob {
    pub mime: &'static str,
    pub data: Arc<[u8]>,
}

impl Blob {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Lifetime counters, useful for leak checks
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResourceStats {
    pub created: usize,
    pub revoked: usize,
    pub live: usize,
}

#[derive(Default)]
struct StoreInner {
    blobs: Mutex<HashMap<ResourceUrl, Blob>>,
    next_id: AtomicU64,
    created: AtomicUsize,
    revoked: AtomicUsize,
}

/// Process-wide registry of display resources; clones share the registry
#[derive(Clone, Default)]
pub struct ResourceStore {
    inner: Arc<StoreInner>,
}

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `data` and return its address
    pub fn create(&self, data: Vec<u8>, mime: &'static str) -> ResourceUrl {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let url = ResourceUrl(format!("{URL_PREFIX}{id}"));
        let blob = Blob {
            mime,
            data: Arc::from(data),
        };

        self.blobs().insert(url.clone(), blob);
        self.inner.created.fetch_add(1, Ordering::Relaxed);
        self.audit();
        url
    }

    /// Release the bytes behind `url`.
    ///
    /// Returns false if the URL was never registered or was already revoked.
    pub fn revoke(&self, url: &ResourceUrl) -> bool {
        if self.blobs().remove(url).is_some() {
            self.inner.revoked.fetch_add(1, Ordering::Relaxed);
            debug!("revoked {url}");
            true
        } else {
            warn!("revoke of unknown or already revoked resource {url}");
            false
        }
    }

    pub fn get(&self, url: &ResourceUrl) -> Option<Blob> {
        self.blobs().get(url).cloned()
    }

    pub fn contains(&self, url: &ResourceUrl) -> bool {
        self.blobs().contains_key(url)
    }

    pub fn live(&self) -> usize {
        self.blobs().len()
    }

    pub fn stats(&self) -> ResourceStats {
        ResourceStats {
            created: self.inner.created.load(Ordering::Relaxed),
            revoked: self.inner.revoked.load(Ordering::Relaxed),
            live: self.live(),
        }
    }

    fn blobs(&self) -> std::sync::MutexGuard<'_, HashMap<ResourceUrl, Blob>> {
        self.inner
            .blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn audit(&self) {
        let live = self.live();
        if live > LIVE_AUDIT_THRESHOLD {
            warn!(
                "resource audit: live={live} threshold={LIVE_AUDIT_THRESHOLD} created={} revoked={}",
                self.inner.created.load(Ordering::Relaxed),
                self.inner.revoked.load(Ordering::Relaxed)
            );
        }
    }
}

impl fmt::Debug for ResourceStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceStore")
            .field("stats", &self.stats())
            .finish()
    }
}
