//! Every-Nth-frame sampling

use crate::state::SubjectState;

/// Admits one of every `interval` frames per subject, starting with the first
#[derive(Debug, Clone, Copy)]
pub struct FrameSampler {
    interval: u32,
}

impl FrameSampler {
    pub fn new(interval: u32) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    /// Count the frame and decide whether it gets classified
    pub fn admit(&self, state: &mut SubjectState) -> bool {
        let position = state.sample_counter;
        state.sample_counter += 1;

        if self.interval <= 1 {
            return true;
        }
        position % self.interval as u64 == 0
    }
}
