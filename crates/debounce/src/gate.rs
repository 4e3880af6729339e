//! Persistence and cooldown gate

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use visibility::Reason;

use crate::state::SubjectState;

/// Debounce configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebounceConfig {
    /// Minimum time between two captures for the same subject (seconds)
    pub save_cooldown_secs: f64,
    /// Minimum continuous duration of an anomaly before capture (seconds)
    pub min_persistence_secs: f64,
    /// Classify every Nth frame per subject (1 = all frames)
    pub sample_interval: u32,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            save_cooldown_secs: 5.0,
            min_persistence_secs: 1.0,
            sample_interval: 1,
        }
    }
}

impl DebounceConfig {
    pub fn save_cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.save_cooldown_secs.max(0.0))
    }

    pub fn min_persistence(&self) -> Duration {
        Duration::from_secs_f64(self.min_persistence_secs.max(0.0))
    }
}

/// Permission to capture one artifact; hand it back via [`DebounceGate::complete`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureTicket {
    pub reason: Reason,
    /// Frame time at which the capture was granted
    pub granted_at: Instant,
    /// How long the anomaly had persisted when granted
    pub persisted: Duration,
}

/// Outcome of feeding one verdict through the gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Frame was fine; all tracked issues were dropped
    Cleared { cleared: usize },

    /// A capture happened recently; nothing changes
    CooldownActive { remaining: Duration },

    /// Another request holds a capture ticket for this subject
    CapturePending,

    /// First sighting of this anomaly; persistence timer started
    TrackingStarted,

    /// Anomaly seen before but not for long enough
    Accumulating { elapsed: Duration, required: Duration },

    /// Anomaly persisted and cooldown is clear
    Capture(CaptureTicket),
}

impl GateDecision {
    pub fn ticket(&self) -> Option<&CaptureTicket> {
        match self {
            GateDecision::Capture(ticket) => Some(ticket),
            _ => None,
        }
    }
}

/// Decides when a persistent anomaly may be captured.
///
/// Cooldown is checked before persistence: while a cooldown is open no timer
/// starts. A running timer survives a capture.
#[derive(Debug, Clone)]
pub struct DebounceGate {
    cooldown: Duration,
    persistence: Duration,
}

impl DebounceGate {
    pub fn new(config: &DebounceConfig) -> Self {
        Self {
            cooldown: config.save_cooldown(),
            persistence: config.min_persistence(),
        }
    }

    /// Apply one verdict reason to the subject's state
    pub fn evaluate(&self, state: &mut SubjectState, reason: &Reason, now: Instant) -> GateDecision {
        if reason.is_ok() {
            return GateDecision::Cleared {
                cleared: state.clear_issues(),
            };
        }

        // A different reason breaks continuity for whatever was tracked before
        state.retain_issue(reason);

        if let Some(remaining) = state.cooldown_remaining(self.cooldown, now) {
            return GateDecision::CooldownActive { remaining };
        }

        if state.capture_pending {
            return GateDecision::CapturePending;
        }

        let elapsed = match state.issue_age(reason, now) {
            Some(elapsed) => elapsed,
            None => {
                state.issue_started_at.insert(reason.clone(), now);
                return GateDecision::TrackingStarted;
            }
        };

        if elapsed < self.persistence {
            return GateDecision::Accumulating {
                elapsed,
                required: self.persistence,
            };
        }

        state.capture_pending = true;
        GateDecision::Capture(CaptureTicket {
            reason: reason.clone(),
            granted_at: now,
            persisted: elapsed,
        })
    }

    /// Settle a granted capture. Only a successful write opens the cooldown;
    /// issue tracking is left as is either way.
    pub fn complete(&self, state: &mut SubjectState, ticket: &CaptureTicket, saved: bool) {
        state.capture_pending = false;
        if saved {
            state.last_save_at = Some(ticket.granted_at);
        }
    }
}
