//! Manually driven clock.

use crate::traits::Clock;
use dock_core::Millis;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Clock that only moves when told to.
///
/// Clones share the same time, so a test can keep one copy and hand another to
/// the firmware.
///
/// # Examples
///
/// ```
/// use dock_hardware::mock::MockClock;
/// use dock_hardware::traits::Clock;
///
/// let clock = MockClock::new();
/// let shared = clock.clone();
///
/// clock.advance(80);
/// assert_eq!(shared.now_millis(), 80);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockClock {
    now: Arc<AtomicU64>,
}

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(now: Millis) -> Self {
        let clock = Self::new();
        clock.set(now);
        clock
    }

    /// Move time forward by `ms` and return the new time.
    pub fn advance(&self, ms: Millis) -> Millis {
        self.now.fetch_add(ms, Ordering::SeqCst) + ms
    }

    /// Jump to an absolute time. Moving backwards is ignored.
    pub fn set(&self, now: Millis) {
        self.now.fetch_max(now, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_millis(&self) -> Millis {
        self.now.load(Ordering::SeqCst)
    }
}
