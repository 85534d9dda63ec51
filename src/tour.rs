use crate::playback::PointId;
use crate::schedule::Timeline;
use std::time::{Duration, Instant};

pub const DEFAULT_POPUP_DELAY: Duration = Duration::from_millis(1_500);
pub const DEFAULT_AUTOPLAY_DELAY: Duration = Duration::from_millis(500);

/// Cursor over a fixed ordered list of points. `None` means no tour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TourState {
    index: Option<usize>,
    len: usize,
}

impl TourState {
    pub fn new(len: usize) -> Self {
        Self { index: None, len }
    }

    pub fn start(&mut self) -> Option<usize> {
        self.index = (self.len > 0).then_some(0);
        self.index
    }

    pub fn stop(&mut self) {
        self.index = None;
    }

    /// Moves to the next point; past the last one the tour ends instead of
    /// wrapping.
    pub fn advance(&mut self) -> Option<usize> {
        self.index = match self.index {
            Some(index) if index + 1 < self.len => Some(index + 1),
            _ => None,
        };
        self.index
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_active(&self) -> bool {
        self.index.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TourCommand {
    Navigate { index: usize, point_id: PointId },
    OpenPopup { point_id: PointId },
    Autoplay { point_id: PointId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TourTimings {
    /// From navigation to opening the popup.
    pub popup_delay: Duration,
    /// From opening the popup to the autoplay attempt.
    pub autoplay_delay: Duration,
}

impl Default for TourTimings {
    fn default() -> Self {
        Self {
            popup_delay: DEFAULT_POPUP_DELAY,
            autoplay_delay: DEFAULT_AUTOPLAY_DELAY,
        }
    }
}

/// Drives a guided tour: every step emits `Navigate` right away and queues the
/// popup and autoplay follow-ups, which the next step (or `stop`) cancels.
#[derive(Debug, Clone)]
pub struct TourController {
    state: TourState,
    point_ids: Vec<PointId>,
    timeline: Timeline<TourCommand>,
    timings: TourTimings,
}

impl TourController {
    pub fn new(point_ids: Vec<PointId>, timings: TourTimings) -> Self {
        Self {
            state: TourState::new(point_ids.len()),
            point_ids,
            timeline: Timeline::new(),
            timings,
        }
    }

    /// Replaces the ordered point list. A running tour is stopped.
    pub fn set_points(&mut self, point_ids: Vec<PointId>) {
        if self.state.is_active() {
            tracing::info!("tour stopped: point list changed");
        }
        self.timeline.cancel_all();
        self.state = TourState::new(point_ids.len());
        self.point_ids = point_ids;
    }

    pub fn start(&mut self, now: Instant) -> Option<TourCommand> {
        let entered = self.state.start();
        if entered.is_none() {
            tracing::info!("tour not started: no points");
        }
        self.enter(entered, now)
    }

    pub fn advance(&mut self, now: Instant) -> Option<TourCommand> {
        if !self.state.is_active() {
            return None;
        }
        let entered = self.state.advance();
        if entered.is_none() {
            tracing::info!("tour finished");
        }
        self.enter(entered, now)
    }

    pub fn stop(&mut self) {
        if self.state.is_active() {
            tracing::info!("tour stopped");
        }
        self.state.stop();
        self.timeline.cancel_all();
    }

    /// Follow-up commands that came due, earliest first.
    pub fn poll(&mut self, now: Instant) -> Vec<TourCommand> {
        self.timeline.drain_due(now)
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.timeline.next_due()
    }

    pub fn pending(&self) -> usize {
        self.timeline.pending()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.state.index()
    }

    pub fn current_point(&self) -> Option<PointId> {
        self.state
            .index()
            .and_then(|index| self.point_ids.get(index).copied())
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn len(&self) -> usize {
        self.point_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.point_ids.is_empty()
    }

    pub fn timings(&self) -> TourTimings {
        self.timings
    }

    fn enter(&mut self, index: Option<usize>, now: Instant) -> Option<TourCommand> {
        self.timeline.supersede();
        let index = index?;
        let point_id = *self.point_ids.get(index)?;
        tracing::info!(index, point_id, total = self.point_ids.len(), "tour step");

        let popup_at = now + self.timings.popup_delay;
        self.timeline
            .schedule(popup_at, TourCommand::OpenPopup { point_id });
        self.timeline.schedule(
            popup_at + self.timings.autoplay_delay,
            TourCommand::Autoplay { point_id },
        );
        Some(TourCommand::Navigate { index, point_id })
    }
}
