//! Clock abstraction so retry backoff and timestamps are testable without
//! real sleeps. Grounded on the pack's own job-engine example
//! (`alfredjeanlab-oddjobs::clock::{Clock, SystemClock, FakeClock}`).

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of wall-clock time. `now_epoch_secs` drives `available_at`
/// comparisons and retry backoff; `now_iso` stamps durable records.
pub trait Clock: Send + Sync + 'static {
    fn now_epoch_secs(&self) -> u64;
    fn now_iso(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }

    fn now_iso(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Deterministic clock for tests: starts at a fixed epoch and only moves
/// when told to via [`FakeClock::advance`].
#[derive(Debug, Clone)]
pub struct FakeClock {
    epoch_secs: Arc<AtomicU64>,
}

impl FakeClock {
    pub fn new(start_epoch_secs: u64) -> Self {
        Self {
            epoch_secs: Arc::new(AtomicU64::new(start_epoch_secs)),
        }
    }

    pub fn advance(&self, secs: u64) {
        self.epoch_secs.fetch_add(secs, Ordering::SeqCst);
    }

    pub fn set(&self, epoch_secs: u64) {
        self.epoch_secs.store(epoch_secs, Ordering::SeqCst);
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new(1_700_000_000)
    }
}

impl Clock for FakeClock {
    fn now_epoch_secs(&self) -> u64 {
        self.epoch_secs.load(Ordering::SeqCst)
    }

    fn now_iso(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.now_epoch_secs() as i64, 0).unwrap_or_else(Utc::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_advances_deterministically() {
        let clock = FakeClock::new(1000);
        assert_eq!(clock.now_epoch_secs(), 1000);
        clock.advance(5);
        assert_eq!(clock.now_epoch_secs(), 1005);
        clock.set(2000);
        assert_eq!(clock.now_epoch_secs(), 2000);
    }

    #[test]
    fn fake_clock_clones_share_state() {
        let clock = FakeClock::new(10);
        let clone = clock.clone();
        clock.advance(1);
        assert_eq!(clone.now_epoch_secs(), 11);
    }
}
