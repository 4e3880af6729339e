//! Per-subject debounce state

use std::collections::HashMap;
use std::time::{Duration, Instant};

use visibility::Reason;

/// Subject state (tracked across frames)
#[derive(Debug, Clone, Default)]
pub struct SubjectState {
    /// When an artifact was last captured for this subject
    pub last_save_at: Option<Instant>,

    /// First sighting of each continuously observed anomaly
    pub issue_started_at: HashMap<Reason, Instant>,

    /// Frames offered to the sampler
    pub sample_counter: u64,

    /// A capture was granted and its write has not finished yet
    pub capture_pending: bool,
}

impl SubjectState {
    /// Whether the cooldown window after the last capture is still open
    pub fn cooldown_remaining(&self, cooldown: Duration, now: Instant) -> Option<Duration> {
        let since = now.saturating_duration_since(self.last_save_at?);
        (since < cooldown).then(|| cooldown - since)
    }

    /// How long `reason` has been continuously observed
    pub fn issue_age(&self, reason: &Reason, now: Instant) -> Option<Duration> {
        self.issue_started_at
            .get(reason)
            .map(|started| now.saturating_duration_since(*started))
    }

    /// Drop all accumulated issue timers; returns how many were tracked
    pub fn clear_issues(&mut self) -> usize {
        let cleared = self.issue_started_at.len();
        self.issue_started_at.clear();
        cleared
    }

    /// Drop every tracked issue except `reason`; returns how many were dropped
    pub fn retain_issue(&mut self, reason: &Reason) -> usize {
        let before = self.issue_started_at.len();
        self.issue_started_at.retain(|tracked, _| tracked == reason);
        before - self.issue_started_at.len()
    }

    /// Whether any anomaly is currently being tracked
    pub fn has_issues(&self) -> bool {
        !self.issue_started_at.is_empty()
    }
}
