//! Time Source for Bounded Waits
//!
//! Every poll loop, settle delay and retry back-off in the crate reads time
//! and sleeps through a [`Clock`]. Production code uses [`SystemClock`];
//! tests inject a [`FakeClock`] whose `sleep` advances virtual time
//! instantly, so a 10 second timeout runs in microseconds.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time source with a blocking sleep
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current instant
    fn now(&self) -> Instant;

    /// Block the calling thread for `duration`
    fn sleep(&self, duration: Duration);
}

/// Wall-clock time backed by `std::thread::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Shared handle to the system clock
#[must_use]
pub fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}

/// Virtual clock: `sleep` advances time without blocking
#[derive(Debug)]
pub struct FakeClock {
    origin: Instant,
    offset_nanos: AtomicU64,
    sleeps: AtomicU64,
}

impl FakeClock {
    /// Create a clock frozen at the current instant
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset_nanos: AtomicU64::new(0),
            sleeps: AtomicU64::new(0),
        }
    }

    /// Create a clock ready to be handed to components
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Move virtual time forward
    pub fn advance(&self, duration: Duration) {
        self.offset_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Virtual time elapsed since creation
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
    }

    /// Number of `sleep` calls observed
    #[must_use]
    pub fn sleep_count(&self) -> u64 {
        self.sleeps.load(Ordering::SeqCst)
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.fetch_add(1, Ordering::SeqCst);
        self.advance(duration);
    }
}

/// Fixed point in time after which a bounded wait gives up
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    end: Instant,
}

impl Deadline {
    /// Deadline `timeout` from now
    #[must_use]
    pub fn after(clock: &dyn Clock, timeout: Duration) -> Self {
        let start = clock.now();
        Self {
            start,
            end: start + timeout,
        }
    }

    /// Time left, zero once passed
    #[must_use]
    pub fn remaining(&self, clock: &dyn Clock) -> Duration {
        self.end.saturating_duration_since(clock.now())
    }

    /// Time since the deadline was set
    #[must_use]
    pub fn elapsed(&self, clock: &dyn Clock) -> Duration {
        clock.now().saturating_duration_since(self.start)
    }

    /// Whether the deadline has passed
    #[must_use]
    pub fn is_expired(&self, clock: &dyn Clock) -> bool {
        clock.now() >= self.end
    }
}
