//! Current-page state shared by scroll tracking, keyboard and slider
//!
//! All three inputs go through [`PositionState::apply`]; the last accepted
//! write wins. Effects tell the session what to scroll; this module never
//! touches resources.

use super::controller::PageList;
use super::intersection::IntersectionEntry;

/// Keyboard navigation intents
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavKey {
    Next,
    Previous,
    First,
    Last,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PositionCommand {
    /// Total page count became known; tracking starts
    EnableTracking(usize),
    /// One batch of intersection changes
    Intersections(Vec<IntersectionEntry>),
    Key(NavKey),
    /// Live slider movement
    SliderDrag(usize),
    /// Slider released on a value
    SliderCommit(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PositionEffect {
    ScrollIntoView(usize),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PositionState {
    current: Option<usize>,
    pending_slider: usize,
    total: Option<usize>,
}

impl Default for PositionState {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: None,
            pending_slider: 1,
            total: None,
        }
    }

    /// Current page (1-based), `None` before any page was visible
    pub fn current(&self) -> Option<usize> {
        self.current
    }

    /// Value the slider displays
    pub fn slider_value(&self) -> usize {
        self.pending_slider
    }

    pub fn total(&self) -> Option<usize> {
        self.total
    }

    pub fn is_tracking(&self) -> bool {
        self.total.is_some()
    }

    /// Apply a command; `pages` is consulted to skip pages that are not rendered yet
    #[must_use]
    pub fn apply(&mut self, cmd: PositionCommand, pages: &PageList) -> Vec<PositionEffect> {
        match cmd {
            PositionCommand::EnableTracking(total) => {
                self.total = Some(total.max(1));
                vec![]
            }

            PositionCommand::Intersections(entries) => {
                if !self.is_tracking() {
                    return vec![];
                }
                // Several pages can cross the band at once; the topmost wins
                let topmost = entries
                    .iter()
                    .filter(|e| e.is_intersecting)
                    .map(|e| e.index)
                    .min();
                if let Some(index) = topmost {
                    self.set_current(index);
                }
                vec![]
            }

            PositionCommand::Key(key) => {
                let (Some(current), Some(total)) = (self.current, self.total) else {
                    return vec![];
                };
                let target = match key {
                    NavKey::Next => (current + 1).min(total),
                    NavKey::Previous => current.saturating_sub(1).max(1),
                    NavKey::First => 1,
                    NavKey::Last => total,
                };
                if target == current || !pages.contains(target) {
                    return vec![];
                }
                self.set_current(target);
                vec![PositionEffect::ScrollIntoView(target)]
            }

            PositionCommand::SliderDrag(value) => {
                if let Some(total) = self.total {
                    self.pending_slider = value.clamp(1, total);
                }
                vec![]
            }

            PositionCommand::SliderCommit(value) => {
                let Some(total) = self.total else {
                    return vec![];
                };
                let target = value.clamp(1, total);
                self.set_current(target);
                if pages.contains(target) {
                    vec![PositionEffect::ScrollIntoView(target)]
                } else {
                    vec![]
                }
            }
        }
    }

    fn set_current(&mut self, index: usize) {
        self.current = Some(index);
        self.pending_slider = index;
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{PageReady, WorkerMessage};
    use crate::reader::controller::RenderController;
    use crate::resource::ResourceStore;

    fn rendered(total: usize) -> RenderController {
        let store = ResourceStore::new();
        let mut controller = RenderController::new();
        for index in 1..=total {
            let _ = controller.handle(WorkerMessage::Uncompress(PageReady {
                url: store.create(vec![], "image/gif"),
                index,
                width: 10,
                height: 10,
                total,
            }));
        }
        controller
    }

    fn visible(index: usize) -> PositionCommand {
        PositionCommand::Intersections(vec![IntersectionEntry {
            index,
            is_intersecting: true,
        }])
    }

    fn tracking_state(total: usize, pages: &PageList) -> PositionState {
        let mut state = PositionState::new();
        let _ = state.apply(PositionCommand::EnableTracking(total), pages);
        let _ = state.apply(visible(1), pages);
        state
    }

    #[test]
    fn intersections_ignored_until_total_known() {
        let controller = rendered(3);
        let mut state = PositionState::new();

        let _ = state.apply(visible(2), controller.pages());
        assert_eq!(state.current(), None);

        let _ = state.apply(PositionCommand::EnableTracking(3), controller.pages());
        let _ = state.apply(visible(2), controller.pages());
        assert_eq!(state.current(), Some(2));
        assert_eq!(state.slider_value(), 2);
    }

    #[test]
    fn batch_picks_lowest_intersecting_index() {
        let controller = rendered(4);
        let mut state = PositionState::new();
        let _ = state.apply(PositionCommand::EnableTracking(4), controller.pages());

        let effects = state.apply(
            PositionCommand::Intersections(vec![
                IntersectionEntry {
                    index: 3,
                    is_intersecting: true,
                },
                IntersectionEntry {
                    index: 1,
                    is_intersecting: false,
                },
                IntersectionEntry {
                    index: 2,
                    is_intersecting: true,
                },
            ]),
            controller.pages(),
        );

        assert_eq!(state.current(), Some(2));
        assert!(effects.is_empty());
    }

    #[test]
    fn keyboard_walks_to_last_page_and_stops() {
        let controller = rendered(5);
        let mut state = tracking_state(5, controller.pages());

        for expected in 2..=5 {
            let effects = state.apply(PositionCommand::Key(NavKey::Next), controller.pages());
            assert_eq!(state.current(), Some(expected));
            assert_eq!(effects, vec![PositionEffect::ScrollIntoView(expected)]);
        }

        let effects = state.apply(PositionCommand::Key(NavKey::Next), controller.pages());
        assert_eq!(state.current(), Some(5));
        assert!(effects.is_empty());
    }

    #[test]
    fn keyboard_does_not_go_below_first_page() {
        let controller = rendered(3);
        let mut state = tracking_state(3, controller.pages());

        let effects = state.apply(PositionCommand::Key(NavKey::Previous), controller.pages());
        assert_eq!(state.current(), Some(1));
        assert!(effects.is_empty());
    }

    #[test]
    fn keyboard_is_inert_without_active_page() {
        let controller = rendered(3);
        let mut state = PositionState::new();
        let _ = state.apply(PositionCommand::EnableTracking(3), controller.pages());

        let effects = state.apply(PositionCommand::Key(NavKey::Next), controller.pages());
        assert_eq!(state.current(), None);
        assert!(effects.is_empty());
    }

    #[test]
    fn home_and_end_jump() {
        let controller = rendered(6);
        let mut state = tracking_state(6, controller.pages());

        let effects = state.apply(PositionCommand::Key(NavKey::Last), controller.pages());
        assert_eq!(effects, vec![PositionEffect::ScrollIntoView(6)]);
        let effects = state.apply(PositionCommand::Key(NavKey::First), controller.pages());
        assert_eq!(effects, vec![PositionEffect::ScrollIntoView(1)]);
    }

    #[test]
    fn slider_drag_never_scrolls() {
        let controller = rendered(10);
        let mut state = tracking_state(10, controller.pages());

        for value in [2, 5, 9] {
            let effects = state.apply(PositionCommand::SliderDrag(value), controller.pages());
            assert!(effects.is_empty());
        }
        assert_eq!(state.slider_value(), 9);
        assert_eq!(state.current(), Some(1));
    }

    #[test]
    fn slider_commit_sets_exact_value_and_scrolls() {
        let controller = rendered(10);
        let mut state = tracking_state(10, controller.pages());
        let _ = state.apply(PositionCommand::SliderDrag(6), controller.pages());

        let effects = state.apply(PositionCommand::SliderCommit(7), controller.pages());
        assert_eq!(state.current(), Some(7));
        assert_eq!(state.slider_value(), 7);
        assert_eq!(effects, vec![PositionEffect::ScrollIntoView(7)]);
    }

    #[test]
    fn reset_returns_to_initial_state() {
        let controller = rendered(2);
        let mut state = tracking_state(2, controller.pages());
        state.reset();

        assert_eq!(state, PositionState::new());
        assert!(!state.is_tracking());
    }
}
