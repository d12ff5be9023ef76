//! Page layout and near-top visibility tracking
//!
//! Pages stack vertically in a single column. Document coordinates are
//! `u64` and saturate, since page sizes come from untrusted image headers. The tracker watches a thin
//! band at the top of the viewport and reports which pages started or
//! stopped crossing it, batching changes the way an intersection observer
//! does.

use std::collections::BTreeMap;

use super::controller::PageList;

/// Band starts this many pixels below the viewport top
pub const ROOT_MARGIN_TOP_PX: u64 = 1;

/// Band ends this fraction of the viewport height below the viewport top
pub const BAND_PERCENT: u64 = 1;

/// Height used for pages whose dimensions could not be read, as a ratio of width
const PLACEHOLDER_ASPECT: (u32, u32) = (3, 2);

/// A page's vertical extent in document pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageBox {
    pub index: usize,
    pub top: u64,
    pub height: u64,
}

impl PageBox {
    pub fn bottom(&self) -> u64 {
        self.top.saturating_add(self.height)
    }

    fn crosses(&self, band: (u64, u64)) -> bool {
        self.top < band.1 && self.bottom() > band.0
    }
}

/// Stack `pages` in index order at `column_width` pixels wide
pub fn layout_pages(pages: &PageList, column_width: u32) -> Vec<PageBox> {
    let mut top: u64 = 0;
    pages
        .iter()
        .map(|page| {
            let height = if page.has_dimensions() {
                scale(column_width, page.height, page.width)
            } else {
                scale(column_width, PLACEHOLDER_ASPECT.0, PLACEHOLDER_ASPECT.1)
            }
            .max(1);
            let placed = PageBox {
                index: page.index,
                top,
                height,
            };
            top = top.saturating_add(height);
            placed
        })
        .collect()
}

fn scale(value: u32, num: u32, den: u32) -> u64 {
    u64::from(value) * u64::from(num) / u64::from(den.max(1))
}

/// The band of the viewport that decides the current page
pub fn top_band(scroll_top: u64, viewport_height: u32) -> (u64, u64) {
    let start = scroll_top.saturating_add(ROOT_MARGIN_TOP_PX);
    let end = scroll_top.saturating_add(u64::from(viewport_height) * BAND_PERCENT / 100);
    (start, end.max(start.saturating_add(1)))
}

/// One reported change
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntersectionEntry {
    pub index: usize,
    pub is_intersecting: bool,
}

#[derive(Clone, Copy, Debug)]
struct Target {
    bounds: PageBox,
    /// `None` until the first observation has been delivered
    intersecting: Option<bool>,
}

/// Tracks which observed pages cross the top band
#[derive(Debug, Default)]
pub struct IntersectionTracker {
    targets: BTreeMap<usize, Target>,
    connected: bool,
}

impl IntersectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Start observing `layout`. Every target's first state is reported on the next update.
    pub fn observe(&mut self, layout: &[PageBox]) {
        self.connected = true;
        self.targets.clear();
        self.relayout(layout);
    }

    /// Replace page bounds, keeping known states and adding new targets
    pub fn relayout(&mut self, layout: &[PageBox]) {
        if !self.connected {
            return;
        }
        let mut targets = BTreeMap::new();
        for bounds in layout {
            let intersecting = self.targets.get(&bounds.index).and_then(|t| t.intersecting);
            targets.insert(
                bounds.index,
                Target {
                    bounds: *bounds,
                    intersecting,
                },
            );
        }
        self.targets = targets;
    }

    pub fn disconnect(&mut self) {
        self.connected = false;
        self.targets.clear();
    }

    /// Recompute against the viewport and return the changes, in index order
    pub fn update(&mut self, scroll_top: u64, viewport_height: u32) -> Vec<IntersectionEntry> {
        if !self.connected {
            return Vec::new();
        }
        let band = top_band(scroll_top, viewport_height);

        let mut changes = Vec::new();
        for (index, target) in &mut self.targets {
            let now = target.bounds.crosses(band);
            if target.intersecting != Some(now) {
                target.intersecting = Some(now);
                changes.push(IntersectionEntry {
                    index: *index,
                    is_intersecting: now,
                });
            }
        }
        changes
    }
}

/// Top edge of page `index` in `layout`
pub fn top_of(layout: &[PageBox], index: usize) -> Option<u64> {
    layout.iter().find(|b| b.index == index).map(|b| b.top)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxes(heights: &[u64]) -> Vec<PageBox> {
        let mut top = 0;
        heights
            .iter()
            .enumerate()
            .map(|(i, &height)| {
                let b = PageBox {
                    index: i + 1,
                    top,
                    height,
                };
                top = top.saturating_add(height);
                b
            })
            .collect()
    }

    #[test]
    fn band_is_at_least_one_pixel() {
        assert_eq!(top_band(0, 800), (1, 8));
        assert_eq!(top_band(100, 40), (101, 102));
    }

    #[test]
    fn first_update_reports_every_target() {
        let mut tracker = IntersectionTracker::new();
        tracker.observe(&boxes(&[1000, 1000, 1000]));

        let changes = tracker.update(0, 800);
        assert_eq!(changes.len(), 3);
        assert_eq!(
            changes[0],
            IntersectionEntry {
                index: 1,
                is_intersecting: true
            }
        );
        assert!(changes[1..].iter().all(|c| !c.is_intersecting));
    }

    #[test]
    fn scrolling_reports_only_changes() {
        let mut tracker = IntersectionTracker::new();
        tracker.observe(&boxes(&[1000, 1000, 1000]));
        let _ = tracker.update(0, 800);

        assert!(tracker.update(500, 800).is_empty());

        let changes = tracker.update(1000, 800);
        assert_eq!(
            changes,
            vec![
                IntersectionEntry {
                    index: 1,
                    is_intersecting: false
                },
                IntersectionEntry {
                    index: 2,
                    is_intersecting: true
                },
            ]
        );
    }

    #[test]
    fn short_pages_can_intersect_together() {
        let mut tracker = IntersectionTracker::new();
        tracker.observe(&boxes(&[3, 3, 1000]));

        let intersecting: Vec<_> = tracker
            .update(0, 800)
            .into_iter()
            .filter(|c| c.is_intersecting)
            .map(|c| c.index)
            .collect();
        assert_eq!(intersecting, vec![1, 2, 3]);
    }

    #[test]
    fn relayout_reports_new_targets_only() {
        let mut tracker = IntersectionTracker::new();
        tracker.observe(&boxes(&[1000, 1000]));
        let _ = tracker.update(0, 800);

        tracker.relayout(&boxes(&[1000, 1000, 1000]));
        let changes = tracker.update(0, 800);
        assert_eq!(
            changes,
            vec![IntersectionEntry {
                index: 3,
                is_intersecting: false
            }]
        );
    }

    #[test]
    fn disconnected_tracker_is_silent() {
        let mut tracker = IntersectionTracker::new();
        tracker.relayout(&boxes(&[10]));
        assert!(tracker.update(0, 800).is_empty());

        tracker.observe(&boxes(&[10]));
        tracker.disconnect();
        assert!(tracker.update(0, 800).is_empty());
    }

    #[test]
    fn huge_pages_saturate_instead_of_wrapping() {
        let near_max = u64::MAX - 10;
        let layout = boxes(&[near_max, 1000]);

        assert_eq!(layout[1].top, near_max);
        assert_eq!(layout[1].bottom(), u64::MAX);
        assert_eq!(top_band(u64::MAX, 800), (u64::MAX, u64::MAX));

        let mut tracker = IntersectionTracker::new();
        tracker.observe(&layout);
        let changes = tracker.update(0, 800);
        assert!(changes[0].is_intersecting);
        assert!(!changes[1].is_intersecting);
    }
}
