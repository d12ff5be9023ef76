//! Ownership of page resources from materialization to reset

use std::collections::BTreeMap;

use log::{debug, info, warn};

use super::controller::RenderController;
use super::position::PositionState;
use crate::resource::{ResourceStore, ResourceUrl};

/// Maps page index to the resource it displays; revokes them on reset
#[derive(Debug)]
pub struct ResourceLifecycle {
    store: ResourceStore,
    handles: BTreeMap<usize, ResourceUrl>,
}

impl ResourceLifecycle {
    pub fn new(store: ResourceStore) -> Self {
        Self {
            store,
            handles: BTreeMap::new(),
        }
    }

    pub fn store(&self) -> &ResourceStore {
        &self.store
    }

    /// Take ownership of a materialized page's resource
    pub fn adopt(&mut self, index: usize, url: ResourceUrl) {
        self.handles.insert(index, url);
    }

    pub fn handle(&self, index: usize) -> Option<&ResourceUrl> {
        self.handles.get(&index)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Release a resource no page owns (stale or displaced delivery)
    pub fn release_orphan(&self, url: &ResourceUrl) {
        debug!("releasing orphaned resource {url}");
        self.store.revoke(url);
    }

    /// Revoke every owned handle once, then clear the page list and position.
    ///
    /// Returns the number of handles revoked. Safe to call with nothing rendered.
    pub fn reset(
        &mut self,
        controller: &mut RenderController,
        position: &mut PositionState,
    ) -> usize {
        let handles = std::mem::take(&mut self.handles);
        let mut revoked = 0;
        for (index, url) in &handles {
            if self.store.revoke(url) {
                revoked += 1;
            } else {
                warn!("page {index} resource {url} was already released");
            }
        }

        controller.clear();
        position.reset();

        if revoked > 0 {
            info!("reset released {revoked} page resources");
        }
        revoked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{PageReady, WorkerMessage};
    use crate::reader::controller::RenderEffect;

    fn materialize(
        store: &ResourceStore,
        controller: &mut RenderController,
        lifecycle: &mut ResourceLifecycle,
        index: usize,
        total: usize,
    ) {
        let effects = controller.handle(WorkerMessage::Uncompress(PageReady {
            url: store.create(vec![0; 8], "image/png"),
            index,
            width: 1,
            height: 1,
            total,
        }));
        for effect in effects {
            if let RenderEffect::PageInserted { index, url } = effect {
                lifecycle.adopt(index, url);
            }
        }
    }

    #[test]
    fn reset_revokes_each_handle_once() {
        let store = ResourceStore::new();
        let mut controller = RenderController::new();
        let mut position = PositionState::new();
        let mut lifecycle = ResourceLifecycle::new(store.clone());

        for index in 1..=4 {
            materialize(&store, &mut controller, &mut lifecycle, index, 4);
        }
        assert_eq!(store.live(), 4);

        let revoked = lifecycle.reset(&mut controller, &mut position);

        assert_eq!(revoked, 4);
        assert_eq!(store.stats().revoked, 4);
        assert_eq!(store.live(), 0);
        assert!(controller.pages().is_empty());
        assert_eq!(controller.total(), None);
        assert!(lifecycle.is_empty());
    }

    #[test]
    fn second_reset_is_a_no_op() {
        let store = ResourceStore::new();
        let mut controller = RenderController::new();
        let mut position = PositionState::new();
        let mut lifecycle = ResourceLifecycle::new(store.clone());
        materialize(&store, &mut controller, &mut lifecycle, 1, 1);

        assert_eq!(lifecycle.reset(&mut controller, &mut position), 1);
        assert_eq!(lifecycle.reset(&mut controller, &mut position), 0);
        assert_eq!(store.stats().revoked, 1);
    }

    #[test]
    fn orphans_are_released_immediately() {
        let store = ResourceStore::new();
        let lifecycle = ResourceLifecycle::new(store.clone());
        let url = store.create(vec![1], "image/gif");

        lifecycle.release_orphan(&url);
        assert!(!store.contains(&url));
    }
}
