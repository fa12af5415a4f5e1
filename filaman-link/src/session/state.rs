//! Session record

use filaman_common::SessionState;
use tokio::time::Instant;

/// One connection attempt and, if it opens, its lifetime
///
/// A fresh `Session` is created for every attempt; the previous one is
/// discarded, never reused.
#[derive(Debug, Clone)]
pub struct Session {
    /// Attempt counter, for log correlation
    pub generation: u64,
    pub state: SessionState,
    /// Last time any inbound frame arrived
    pub last_liveness_ack: Instant,
}

impl Session {
    pub fn new(generation: u64, state: SessionState) -> Self {
        Self {
            generation,
            state,
            last_liveness_ack: Instant::now(),
        }
    }

    pub fn ack(&mut self) {
        self.last_liveness_ack = Instant::now();
    }

    /// Whether the silence since the last ack exceeds `timeout`
    pub fn is_silent_for(&self, timeout: std::time::Duration) -> bool {
        self.last_liveness_ack.elapsed() > timeout
    }
}
