//! Settle Waits
//!
//! Two primitives. [`SettleWaiter::wait_until`] polls an observable
//! condition (results present, readiness flag complete, element displayed)
//! until it holds or the timeout passes. [`SettleWaiter::settle`] then
//! pauses for a fixed, per-kind delay: readiness signals routinely flip
//! before layout and animation finish, and the delay absorbs that gap.
//!
//! ## Toyota Way Application
//!
//! - **Jidoka**: A condition that never holds stops with `SettleTimeout`
//! - **Heijunka**: One configured delay per kind of interaction
//! - **Muda**: Polling stops as soon as the condition holds

use crate::clock::{system_clock, Clock, Deadline};
use crate::result::{ProbeError, ProbeResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for condition waits (10 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 10_000;

/// Default polling interval (250ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

// =============================================================================
// SETTLE DELAYS
// =============================================================================

/// Kind of interaction whose aftermath needs a settle delay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettleKind {
    /// After tapping a container that opens another view
    Tap,
    /// After typing a query
    TextEntry,
    /// After an overlay was dismissed
    OverlayDismissed,
    /// After content (article, result list) reported loaded
    ContentLoaded,
    /// After navigating back
    BackNavigation,
    /// After scrolling
    Scroll,
    /// After a page load reached its readiness flag
    PageSettle,
}

impl SettleKind {
    /// Every kind, in declaration order
    pub const ALL: [Self; 7] = [
        Self::Tap,
        Self::TextEntry,
        Self::OverlayDismissed,
        Self::ContentLoaded,
        Self::BackNavigation,
        Self::Scroll,
        Self::PageSettle,
    ];

    /// Configuration key
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::Tap => "tap",
            Self::TextEntry => "text_entry",
            Self::OverlayDismissed => "overlay",
            Self::ContentLoaded => "content_loaded",
            Self::BackNavigation => "back_navigation",
            Self::Scroll => "scroll",
            Self::PageSettle => "page_settle",
        }
    }
}

impl fmt::Display for SettleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Fixed settle delay per interaction kind, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleDelays {
    /// After tapping a container
    pub tap_ms: u64,
    /// After typing a query
    pub text_entry_ms: u64,
    /// After dismissing an overlay
    pub overlay_ms: u64,
    /// After content loaded
    pub content_loaded_ms: u64,
    /// After navigating back
    pub back_navigation_ms: u64,
    /// After scrolling
    pub scroll_ms: u64,
    /// After a page load
    pub page_settle_ms: u64,
}

impl Default for SettleDelays {
    fn default() -> Self {
        Self {
            tap_ms: 500,
            text_entry_ms: 1_500,
            overlay_ms: 1_000,
            content_loaded_ms: 1_000,
            back_navigation_ms: 1_500,
            scroll_ms: 500,
            page_settle_ms: 1_000,
        }
    }
}

impl SettleDelays {
    /// All delays zero
    #[must_use]
    pub const fn none() -> Self {
        Self {
            tap_ms: 0,
            text_entry_ms: 0,
            overlay_ms: 0,
            content_loaded_ms: 0,
            back_navigation_ms: 0,
            scroll_ms: 0,
            page_settle_ms: 0,
        }
    }

    /// Delay for one kind
    #[must_use]
    pub const fn delay_for(&self, kind: SettleKind) -> Duration {
        Duration::from_millis(match kind {
            SettleKind::Tap => self.tap_ms,
            SettleKind::TextEntry => self.text_entry_ms,
            SettleKind::OverlayDismissed => self.overlay_ms,
            SettleKind::ContentLoaded => self.content_loaded_ms,
            SettleKind::BackNavigation => self.back_navigation_ms,
            SettleKind::Scroll => self.scroll_ms,
            SettleKind::PageSettle => self.page_settle_ms,
        })
    }

    /// Override one kind
    #[must_use]
    pub const fn with_delay(mut self, kind: SettleKind, ms: u64) -> Self {
        match kind {
            SettleKind::Tap => self.tap_ms = ms,
            SettleKind::TextEntry => self.text_entry_ms = ms,
            SettleKind::OverlayDismissed => self.overlay_ms = ms,
            SettleKind::ContentLoaded => self.content_loaded_ms = ms,
            SettleKind::BackNavigation => self.back_navigation_ms = ms,
            SettleKind::Scroll => self.scroll_ms = ms,
            SettleKind::PageSettle => self.page_settle_ms = ms,
        }
        self
    }
}

// =============================================================================
// WAIT SPEC
// =============================================================================

/// One bounded condition wait
pub struct WaitSpec<F> {
    description: String,
    condition: F,
    timeout: Duration,
    poll_interval: Duration,
}

impl<F> fmt::Debug for WaitSpec<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitSpec")
            .field("description", &self.description)
            .field("timeout", &self.timeout)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl<F> WaitSpec<F>
where
    F: FnMut() -> ProbeResult<bool>,
{
    /// Wait for `condition` with default timeout and poll interval
    #[must_use]
    pub fn new(description: impl Into<String>, condition: F) -> Self {
        Self {
            description: description.into(),
            condition,
            timeout: Duration::from_millis(DEFAULT_WAIT_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }

    /// Set timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set polling interval
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// What is being waited for
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Configured timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Outcome of a successful wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitResult {
    /// What was waited for
    pub waited_for: String,
    /// Time until the condition held
    pub elapsed: Duration,
    /// Number of times the condition was evaluated
    pub polls: u32,
}

// =============================================================================
// WAITER
// =============================================================================

/// Bounded condition waits plus fixed settle delays
#[derive(Debug, Clone)]
pub struct SettleWaiter {
    clock: Arc<dyn Clock>,
    delays: SettleDelays,
}

impl Default for SettleWaiter {
    fn default() -> Self {
        Self::new()
    }
}

impl SettleWaiter {
    /// Waiter on the system clock with default delays
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    /// Waiter on an explicit clock
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            delays: SettleDelays::default(),
        }
    }

    /// Replace settle delays
    #[must_use]
    pub fn with_delays(mut self, delays: SettleDelays) -> Self {
        self.delays = delays;
        self
    }

    /// Configured delays
    #[must_use]
    pub const fn delays(&self) -> &SettleDelays {
        &self.delays
    }

    /// Poll `spec`'s condition until it holds
    ///
    /// Transient failures while evaluating the condition count as "not
    /// yet"; any other failure aborts the wait.
    pub fn wait_until<F>(&self, mut spec: WaitSpec<F>) -> ProbeResult<WaitResult>
    where
        F: FnMut() -> ProbeResult<bool>,
    {
        let clock = self.clock.as_ref();
        let deadline = Deadline::after(clock, spec.timeout);
        let poll = spec.poll_interval.max(Duration::from_millis(1));
        let mut polls = 0;

        loop {
            polls += 1;
            match (spec.condition)() {
                Ok(true) => {
                    let elapsed = deadline.elapsed(clock);
                    debug!(
                        waited_for = %spec.description,
                        elapsed_ms = elapsed.as_millis() as u64,
                        polls,
                        "Condition met"
                    );
                    return Ok(WaitResult {
                        waited_for: spec.description,
                        elapsed,
                        polls,
                    });
                }
                Ok(false) => {}
                Err(err) if err.is_transient() => {
                    trace!(waited_for = %spec.description, error = %err, "Condition not ready");
                }
                Err(err) => return Err(err),
            }

            let remaining = deadline.remaining(clock);
            if remaining.is_zero() {
                let elapsed = deadline.elapsed(clock);
                debug!(
                    waited_for = %spec.description,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Condition timed out"
                );
                return Err(ProbeError::SettleTimeout {
                    waited_for: spec.description,
                    elapsed,
                    timeout: spec.timeout,
                });
            }
            clock.sleep(poll.min(remaining));
        }
    }

    /// Shorthand for [`wait_until`](Self::wait_until)
    pub fn wait_for<F>(
        &self,
        description: &str,
        timeout: Duration,
        condition: F,
    ) -> ProbeResult<WaitResult>
    where
        F: FnMut() -> ProbeResult<bool>,
    {
        self.wait_until(WaitSpec::new(description, condition).with_timeout(timeout))
    }

    /// Pause unconditionally
    pub fn settle_delay(&self, duration: Duration) {
        if !duration.is_zero() {
            trace!(delay_ms = duration.as_millis() as u64, "Settling");
            self.clock.sleep(duration);
        }
    }

    /// Pause for the configured delay of `kind`
    pub fn settle(&self, kind: SettleKind) {
        self.settle_delay(self.delays.delay_for(kind));
    }
}

// =============================================================================
// CONDITIONS
// =============================================================================

/// Conditions commonly awaited by page objects
pub mod conditions {
    use crate::locator::{InteractionMode, LogicalElement};
    use crate::resolver::ElementResolver;
    use crate::result::{ProbeError, ProbeResult};
    use crate::session::Session;
    use std::time::Duration;

    /// Collection found by `element` has at least one member
    pub fn collection_non_empty<'a, S: Session + ?Sized>(
        session: &'a S,
        resolver: &'a ElementResolver,
        element: &'a LogicalElement,
    ) -> impl FnMut() -> ProbeResult<bool> + 'a {
        collection_len_at_least(session, resolver, element, 1)
    }

    /// Collection found by `element` has at least `min` members
    pub fn collection_len_at_least<'a, S: Session + ?Sized>(
        session: &'a S,
        resolver: &'a ElementResolver,
        element: &'a LogicalElement,
        min: usize,
    ) -> impl FnMut() -> ProbeResult<bool> + 'a {
        move || Ok(resolver.find_all(session, element)?.len() >= min)
    }

    /// Session readiness flag has reached its terminal value
    pub fn readiness_complete<S: Session + ?Sized>(
        session: &S,
    ) -> impl FnMut() -> ProbeResult<bool> + '_ {
        move || Ok(session.current_readiness()?)
    }

    /// `element` resolves as displayed on a single probe
    pub fn element_displayed<'a, S: Session + ?Sized>(
        session: &'a S,
        resolver: &'a ElementResolver,
        element: &'a LogicalElement,
    ) -> impl FnMut() -> ProbeResult<bool> + 'a {
        move || match resolver.resolve(session, element, Duration::ZERO, InteractionMode::Visible) {
            Ok(_) => Ok(true),
            Err(ProbeError::ElementNotFound { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }
}
