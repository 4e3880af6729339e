//! Anomaly Debounce
//!
//! Decides which anomalous frames become captured artifacts:
//! - Per-subject state behind per-subject locks
//! - Persistence window (ignore momentary glitches)
//! - Capture cooldown (rate-limit artifacts for a sustained issue)
//! - Every-Nth-frame sampling to bound classification cost

pub mod gate;
pub mod monitor;
pub mod sampler;
pub mod state;
pub mod store;

pub use gate::{CaptureTicket, DebounceConfig, DebounceGate, GateDecision};
pub use monitor::{Monitor, PendingCapture};
pub use sampler::FrameSampler;
pub use state::SubjectState;
pub use store::{subject_key, SubjectStore, UNKNOWN_SUBJECT};
