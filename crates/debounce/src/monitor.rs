//! Monitor facade: sampler + gate over the subject store

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};
use visibility::Reason;

use crate::gate::{CaptureTicket, DebounceConfig, DebounceGate, GateDecision};
use crate::sampler::FrameSampler;
use crate::state::SubjectState;
use crate::store::SubjectStore;

/// Per-subject anomaly monitor shared by all request handlers
#[derive(Debug)]
pub struct Monitor {
    config: DebounceConfig,
    store: SubjectStore,
    gate: DebounceGate,
    sampler: FrameSampler,
}

impl Monitor {
    pub fn new(config: DebounceConfig) -> Self {
        info!("Creating anomaly monitor with config: {:?}", config);
        Self {
            gate: DebounceGate::new(&config),
            sampler: FrameSampler::new(config.sample_interval),
            store: SubjectStore::new(),
            config,
        }
    }

    pub fn config(&self) -> &DebounceConfig {
        &self.config
    }

    /// Whether this subject's frame should be classified
    pub fn admit(&self, subject: &str) -> bool {
        let admitted = self.store.with_subject(subject, |state| self.sampler.admit(state));
        if !admitted {
            debug!(subject, "Frame skipped by sampler");
        }
        admitted
    }

    /// Feed one verdict reason through the debounce gate
    pub fn observe(&self, subject: &str, reason: &Reason, now: Instant) -> GateDecision {
        let decision = self
            .store
            .with_subject(subject, |state| self.gate.evaluate(state, reason, now));

        match &decision {
            GateDecision::Cleared { cleared } if *cleared > 0 => {
                info!(subject, cleared, "Subject back to normal, issue tracking reset");
            }
            GateDecision::Cleared { .. } => debug!(subject, "Monitoring normal"),
            GateDecision::CooldownActive { remaining } => {
                info!(subject, %reason, "Cooldown active, {:.1}s remaining", remaining.as_secs_f64());
            }
            GateDecision::CapturePending => {
                debug!(subject, %reason, "Capture already in flight");
            }
            GateDecision::TrackingStarted => info!(
                subject,
                %reason,
                "First occurrence, tracking persistence (need {:.1}s)",
                self.config.min_persistence_secs
            ),
            GateDecision::Accumulating { elapsed, required } => info!(
                subject,
                %reason,
                "Not persistent yet: {:.1}s / {:.1}s",
                elapsed.as_secs_f64(),
                required.as_secs_f64()
            ),
            GateDecision::Capture(ticket) => info!(
                subject,
                %reason,
                "Anomaly persisted for {:.1}s, capture granted",
                ticket.persisted.as_secs_f64()
            ),
        }

        decision
    }

    /// Report the outcome of a granted capture
    pub fn finish_capture(&self, subject: &str, ticket: &CaptureTicket, saved: bool) {
        self.store
            .with_subject(subject, |state| self.gate.complete(state, ticket, saved));
    }

    /// Take ownership of a granted capture. The returned guard settles the
    /// ticket as unsaved if it is dropped before [`PendingCapture::finish`].
    pub fn hold(self: &Arc<Self>, subject: &str, ticket: CaptureTicket) -> PendingCapture {
        PendingCapture {
            monitor: Arc::clone(self),
            subject: subject.to_string(),
            ticket,
            settled: false,
        }
    }

    /// Copy of a subject's state, if it has been seen
    pub fn subject_state(&self, subject: &str) -> Option<SubjectState> {
        self.store.snapshot(subject)
    }

    pub fn subject_count(&self) -> usize {
        self.store.subject_count()
    }
}

/// A granted capture that has not been settled yet
#[derive(Debug)]
pub struct PendingCapture {
    monitor: Arc<Monitor>,
    subject: String,
    ticket: CaptureTicket,
    settled: bool,
}

impl PendingCapture {
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn ticket(&self) -> &CaptureTicket {
        &self.ticket
    }

    /// Report the outcome of the write
    pub fn finish(mut self, saved: bool) {
        self.settle(saved);
    }

    fn settle(&mut self, saved: bool) {
        if !self.settled {
            self.settled = true;
            self.monitor.finish_capture(&self.subject, &self.ticket, saved);
        }
    }
}

impl Drop for PendingCapture {
    fn drop(&mut self) {
        if !self.settled {
            warn!(subject = %self.subject, reason = %self.ticket.reason, "Capture abandoned before completion");
            self.settle(false);
        }
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new(DebounceConfig::default())
    }
}
