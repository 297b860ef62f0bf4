//! Clock implementations

use crate::common::traits::Clock;
use crate::common::types::Timestamp;
use std::sync::atomic::{AtomicU64, Ordering};

/// Wall clock backed by `chrono`, never moving backwards
#[derive(Debug, Default)]
pub struct SystemClock {
    last: AtomicU64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let wall = chrono::Utc::now().timestamp().max(0) as u64;
        let previous = self.last.fetch_max(wall, Ordering::Relaxed);
        previous.max(wall)
    }
}

/// Manually driven clock for tests and simulations
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    /// Move the clock forward by `secs`
    pub fn advance(&self, secs: u64) {
        let _ = self
            .now
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |t| Some(t.saturating_add(secs)));
    }

    /// Jump to `at` if it lies in the future; earlier values are ignored
    pub fn set(&self, at: Timestamp) {
        self.now.fetch_max(at, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}
