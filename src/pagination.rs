use crate::error::NavRejection;
use log::debug;
use std::time::{Duration, Instant};

/// Drag distance (in presentation units) a release must exceed to turn the page.
pub const SWIPE_THRESHOLD: f32 = 50.0;
pub const TRANSITION_DURATION: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PaginationState {
    Idle {
        index: usize,
    },
    Dragging {
        index: usize,
        offset: f32,
    },
    Transitioning {
        from: usize,
        to: usize,
        started_at: Instant,
    },
}

/// What a navigation event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavOutcome {
    /// A drag began.
    DragStarted,
    /// A transition toward `to` began.
    Started { from: usize, to: usize },
    /// Back to idle on the same page.
    SnappedBack,
    /// Nothing changed.
    Ignored(NavRejection),
}

/// Snapshot for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationCursor {
    pub current_index: usize,
    pub is_transitioning: bool,
}

/// Page-flip state machine.
///
/// Single-threaded and event driven: the caller feeds gestures, jumps and
/// clock ticks. Only one transition may be in flight, and every event that
/// arrives during it is dropped rather than queued.
#[derive(Debug, Clone)]
pub struct PaginationMachine {
    page_count: usize,
    state: PaginationState,
    swipe_threshold: f32,
    transition_duration: Duration,
}

impl PaginationMachine {
    pub fn new(page_count: usize, index: usize) -> Self {
        Self {
            page_count,
            state: PaginationState::Idle {
                index: clamp_index(index, page_count),
            },
            swipe_threshold: SWIPE_THRESHOLD,
            transition_duration: TRANSITION_DURATION,
        }
    }

    pub fn with_timing(mut self, swipe_threshold: f32, transition_duration: Duration) -> Self {
        self.swipe_threshold = swipe_threshold;
        self.transition_duration = transition_duration;
        self
    }

    pub fn state(&self) -> PaginationState {
        self.state
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// The page on screen; during a transition, the page being left.
    pub fn current_index(&self) -> usize {
        match self.state {
            PaginationState::Idle { index } | PaginationState::Dragging { index, .. } => index,
            PaginationState::Transitioning { from, .. } => from,
        }
    }

    pub fn is_transitioning(&self) -> bool {
        matches!(self.state, PaginationState::Transitioning { .. })
    }

    pub fn cursor(&self) -> PaginationCursor {
        PaginationCursor {
            current_index: self.current_index(),
            is_transitioning: self.is_transitioning(),
        }
    }

    pub fn begin_drag(&mut self) -> NavOutcome {
        match self.state {
            PaginationState::Idle { index } => {
                self.state = PaginationState::Dragging { index, offset: 0.0 };
                NavOutcome::DragStarted
            }
            PaginationState::Dragging { .. } => NavOutcome::DragStarted,
            PaginationState::Transitioning { .. } => {
                NavOutcome::Ignored(NavRejection::TransitionInProgress)
            }
        }
    }

    /// Accumulates drag movement. Ignored unless a drag is in progress.
    pub fn drag_by(&mut self, delta: f32) {
        if let PaginationState::Dragging { offset, .. } = &mut self.state {
            *offset += delta;
        }
    }

    /// Releases the drag: past the threshold, turns toward the adjacent page
    /// (negative offset → next, positive → previous); otherwise, or at a
    /// boundary, snaps back.
    pub fn end_drag(&mut self, now: Instant) -> NavOutcome {
        let PaginationState::Dragging { index, offset } = self.state else {
            return match self.state {
                PaginationState::Transitioning { .. } => {
                    NavOutcome::Ignored(NavRejection::TransitionInProgress)
                }
                _ => NavOutcome::SnappedBack,
            };
        };

        if offset.abs() <= self.swipe_threshold {
            self.state = PaginationState::Idle { index };
            return NavOutcome::SnappedBack;
        }
        let target = if offset < 0.0 {
            index.checked_add(1)
        } else {
            index.checked_sub(1)
        };
        self.turn_to(index, target, now)
    }

    /// Abandons a drag without turning.
    pub fn cancel_drag(&mut self) {
        if let PaginationState::Dragging { index, .. } = self.state {
            self.state = PaginationState::Idle { index };
        }
    }

    pub fn next(&mut self, now: Instant) -> NavOutcome {
        self.step(now, |index| index.checked_add(1))
    }

    pub fn previous(&mut self, now: Instant) -> NavOutcome {
        self.step(now, |index| index.checked_sub(1))
    }

    fn step(&mut self, now: Instant, target: impl Fn(usize) -> Option<usize>) -> NavOutcome {
        match self.state {
            PaginationState::Transitioning { .. } => {
                NavOutcome::Ignored(NavRejection::TransitionInProgress)
            }
            PaginationState::Idle { index } | PaginationState::Dragging { index, .. } => {
                self.turn_to(index, target(index), now)
            }
        }
    }

    fn turn_to(&mut self, from: usize, target: Option<usize>, now: Instant) -> NavOutcome {
        match target.filter(|&to| to < self.page_count) {
            Some(to) => self.start_transition(from, to, now),
            None => {
                debug!("Page turn past the book boundary from {from}, snapping back");
                self.state = PaginationState::Idle { index: from };
                NavOutcome::SnappedBack
            }
        }
    }

    /// Jumps straight to `target`. Rejected when out of range or while a
    /// transition is running; jumping to the current page does nothing.
    pub fn jump_to(&mut self, target: usize, now: Instant) -> NavOutcome {
        if self.is_transitioning() {
            return NavOutcome::Ignored(NavRejection::TransitionInProgress);
        }
        if target >= self.page_count {
            return NavOutcome::Ignored(NavRejection::OutOfRangePage);
        }
        let from = self.current_index();
        if target == from {
            self.state = PaginationState::Idle { index: from };
            return NavOutcome::SnappedBack;
        }
        self.start_transition(from, target, now)
    }

    fn start_transition(&mut self, from: usize, to: usize, now: Instant) -> NavOutcome {
        self.state = PaginationState::Transitioning {
            from,
            to,
            started_at: now,
        };
        NavOutcome::Started { from, to }
    }

    /// Resolves a transition whose animation time has elapsed. Returns the
    /// page landed on.
    pub fn tick(&mut self, now: Instant) -> Option<usize> {
        match self.state {
            PaginationState::Transitioning { started_at, .. }
                if now.saturating_duration_since(started_at) >= self.transition_duration =>
            {
                self.finish_transition()
            }
            _ => None,
        }
    }

    /// Resolves any in-flight transition immediately.
    pub fn finish_transition(&mut self) -> Option<usize> {
        if let PaginationState::Transitioning { to, .. } = self.state {
            self.state = PaginationState::Idle { index: to };
            return Some(to);
        }
        None
    }

    /// Swaps in a new page list (after a reflow). Any transition is resolved
    /// first and any drag is dropped.
    pub fn replace_pages(&mut self, page_count: usize, index: usize) {
        self.finish_transition();
        self.page_count = page_count;
        self.state = PaginationState::Idle {
            index: clamp_index(index, page_count),
        };
    }
}

fn clamp_index(index: usize, page_count: usize) -> usize {
    index.min(page_count.saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine(pages: usize, index: usize) -> PaginationMachine {
        PaginationMachine::new(pages, index)
    }

    #[test]
    fn test_swipe_left_turns_to_next_page() {
        let now = Instant::now();
        let mut pager = machine(5, 1);
        assert_eq!(pager.begin_drag(), NavOutcome::DragStarted);
        pager.drag_by(-30.0);
        pager.drag_by(-40.0);
        assert_eq!(pager.end_drag(now), NavOutcome::Started { from: 1, to: 2 });
        assert!(pager.is_transitioning());
        assert_eq!(pager.current_index(), 1);

        assert_eq!(pager.tick(now + Duration::from_millis(100)), None);
        assert_eq!(pager.tick(now + TRANSITION_DURATION), Some(2));
        assert_eq!(pager.state(), PaginationState::Idle { index: 2 });
    }

    #[test]
    fn test_swipe_right_turns_to_previous_page() {
        let now = Instant::now();
        let mut pager = machine(5, 3);
        pager.begin_drag();
        pager.drag_by(80.0);
        assert_eq!(pager.end_drag(now), NavOutcome::Started { from: 3, to: 2 });
    }

    #[test]
    fn test_short_drag_snaps_back() {
        let mut pager = machine(5, 2);
        pager.begin_drag();
        pager.drag_by(-SWIPE_THRESHOLD);
        assert_eq!(pager.end_drag(Instant::now()), NavOutcome::SnappedBack);
        assert_eq!(pager.state(), PaginationState::Idle { index: 2 });
    }

    #[test]
    fn test_boundaries_snap_back_without_wrapping() {
        let now = Instant::now();
        let mut pager = machine(3, 0);
        pager.begin_drag();
        pager.drag_by(100.0);
        assert_eq!(pager.end_drag(now), NavOutcome::SnappedBack);
        assert_eq!(pager.current_index(), 0);

        let mut pager = machine(3, 2);
        assert_eq!(pager.next(now), NavOutcome::SnappedBack);
        assert_eq!(pager.current_index(), 2);
    }

    #[test]
    fn test_events_during_transition_are_ignored() {
        let now = Instant::now();
        let mut pager = machine(5, 0);
        pager.next(now);

        let busy = NavOutcome::Ignored(NavRejection::TransitionInProgress);
        assert_eq!(pager.begin_drag(), busy);
        assert_eq!(pager.next(now), busy);
        assert_eq!(pager.jump_to(4, now), busy);
        assert_eq!(pager.tick(now + TRANSITION_DURATION), Some(1));
        assert_eq!(pager.current_index(), 1);
    }

    #[test]
    fn test_jump_out_of_range_is_rejected() {
        let mut pager = machine(3, 1);
        assert_eq!(
            pager.jump_to(3, Instant::now()),
            NavOutcome::Ignored(NavRejection::OutOfRangePage)
        );
        assert_eq!(pager.state(), PaginationState::Idle { index: 1 });
    }

    #[test]
    fn test_jump_starts_transition() {
        let now = Instant::now();
        let mut pager = machine(10, 1);
        assert_eq!(pager.jump_to(7, now), NavOutcome::Started { from: 1, to: 7 });
        assert_eq!(pager.finish_transition(), Some(7));
        assert_eq!(pager.cursor(), PaginationCursor { current_index: 7, is_transitioning: false });
    }

    #[test]
    fn test_empty_book_stays_at_zero() {
        let now = Instant::now();
        let mut pager = machine(0, 5);
        assert_eq!(pager.current_index(), 0);
        assert_eq!(pager.next(now), NavOutcome::SnappedBack);
        assert_eq!(
            pager.jump_to(0, now),
            NavOutcome::Ignored(NavRejection::OutOfRangePage)
        );
    }

    #[test]
    fn test_replace_pages_clamps_and_resolves() {
        let now = Instant::now();
        let mut pager = machine(10, 8);
        pager.next(now);
        pager.replace_pages(4, 9);
        assert_eq!(pager.state(), PaginationState::Idle { index: 3 });
        assert_eq!(pager.page_count(), 4);
    }

    #[test]
    fn test_cancel_drag_returns_to_idle() {
        let mut pager = machine(4, 2);
        pager.begin_drag();
        pager.drag_by(-500.0);
        pager.cancel_drag();
        assert_eq!(pager.state(), PaginationState::Idle { index: 2 });
    }

    #[test]
    fn test_custom_timing() {
        let now = Instant::now();
        let mut pager = machine(4, 0).with_timing(10.0, Duration::from_millis(5));
        pager.begin_drag();
        pager.drag_by(-11.0);
        assert_eq!(pager.end_drag(now), NavOutcome::Started { from: 0, to: 1 });
        assert_eq!(pager.tick(now + Duration::from_millis(5)), Some(1));
    }
}
