//! Progressive page materialization
//!
//! Consumes worker messages and maintains the index-ordered page list.
//! Arrival order never matters: pages are keyed by their archive index.

use std::collections::BTreeMap;

use log::{debug, info, warn};

use crate::decode::{DecodeError, PageReady, WorkerMessage};
use crate::resource::ResourceUrl;

/// Pages up to this index load eagerly; later pages are deferred
pub const EAGER_PAGE_LIMIT: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadPolicy {
    Eager,
    Lazy,
}

impl LoadPolicy {
    #[must_use]
    pub fn for_index(index: usize) -> Self {
        if index > EAGER_PAGE_LIMIT {
            LoadPolicy::Lazy
        } else {
            LoadPolicy::Eager
        }
    }
}

/// One materialized page
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageElement {
    pub index: usize,
    pub url: ResourceUrl,
    pub width: u32,
    pub height: u32,
    pub load: LoadPolicy,
}

impl PageElement {
    fn from_ready(page: PageReady) -> Self {
        Self {
            index: page.index,
            load: LoadPolicy::for_index(page.index),
            url: page.url,
            width: page.width,
            height: page.height,
        }
    }

    /// Stable element id, `image-<index>`
    pub fn id(&self) -> String {
        format!("image-{}", self.index)
    }

    pub fn has_dimensions(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Rendered pages, always iterated in ascending index order
#[derive(Debug, Default)]
pub struct PageList {
    pages: BTreeMap<usize, PageElement>,
}

impl PageList {
    pub fn get(&self, index: usize) -> Option<&PageElement> {
        self.pages.get(&index)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.pages.contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PageElement> {
        self.pages.values()
    }

    pub fn indices(&self) -> Vec<usize> {
        self.pages.keys().copied().collect()
    }

    fn insert(&mut self, page: PageElement) -> Option<PageElement> {
        self.pages.insert(page.index, page)
    }

    fn clear(&mut self) {
        self.pages.clear();
    }
}

/// What the session must do after the controller consumed a message
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderEffect {
    /// A page was inserted; its resource now belongs to the page
    PageInserted { index: usize, url: ResourceUrl },
    /// An element was displaced by a page with the same index and must be released
    Superseded(PageElement),
    /// First page is in; leave the loading screen
    ContentReady,
    /// The last page announced its total; bounded navigation can start
    TotalKnown(usize),
    /// Report to the user
    Notify(DecodeError),
    /// Archive engine is up
    EngineReady,
}

/// Owner of the page list and the loading flags
#[derive(Debug)]
pub struct RenderController {
    pages: PageList,
    engine_loading: bool,
    loading: bool,
    reading: bool,
    total: Option<usize>,
}

impl Default for RenderController {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderController {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pages: PageList::default(),
            engine_loading: true,
            loading: false,
            reading: false,
            total: None,
        }
    }

    pub fn pages(&self) -> &PageList {
        &self.pages
    }

    /// Total page count, known once the last page has arrived
    pub fn total(&self) -> Option<usize> {
        self.total
    }

    /// A session is opening and nothing is visible yet
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// The archive engine has not reported ready yet
    pub fn is_engine_loading(&self) -> bool {
        self.engine_loading
    }

    pub fn is_busy(&self) -> bool {
        self.engine_loading || self.loading
    }

    /// Pages are on screen
    pub fn is_reading(&self) -> bool {
        self.reading
    }

    pub fn begin_session(&mut self) {
        self.loading = true;
    }

    /// A fresh engine is starting and has not reported ready yet
    pub fn engine_starting(&mut self) {
        self.engine_loading = true;
    }

    /// Consume one worker message
    #[must_use]
    pub fn handle(&mut self, message: WorkerMessage) -> Vec<RenderEffect> {
        match message {
            WorkerMessage::Uncompress(page) => self.materialize(page),

            WorkerMessage::Error { error } => {
                warn!("decode error: {error:?}");
                self.loading = false;
                vec![RenderEffect::Notify(error)]
            }

            WorkerMessage::Ready => {
                self.engine_loading = false;
                vec![RenderEffect::EngineReady]
            }
        }
    }

    fn materialize(&mut self, page: PageReady) -> Vec<RenderEffect> {
        let index = page.index;
        let total = page.total;
        let element = PageElement::from_ready(page);
        debug!(
            "materialized {} ({}x{}, {:?})",
            element.id(),
            element.width,
            element.height,
            element.load
        );

        let mut effects = vec![RenderEffect::PageInserted {
            index,
            url: element.url.clone(),
        }];
        if let Some(previous) = self.pages.insert(element) {
            warn!("page {index} delivered twice; releasing the earlier copy");
            effects.push(RenderEffect::Superseded(previous));
        }

        if index == 1 {
            self.reading = true;
            self.loading = false;
            effects.push(RenderEffect::ContentReady);
        }

        if index == total && self.total.is_none() {
            info!("total page count known: {total}");
            self.total = Some(total);
            effects.push(RenderEffect::TotalKnown(total));
        }

        effects
    }

    /// Drop every element and derived flag. Resources must be released by the caller.
    pub fn clear(&mut self) {
        self.pages.clear();
        self.loading = false;
        self.reading = false;
        self.total = None;
    }
}
