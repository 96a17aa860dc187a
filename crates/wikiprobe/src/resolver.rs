//! Element Resolution with Fallback Strategies
//!
//! [`ElementResolver::resolve`] walks a [`LogicalElement`]'s strategies in
//! declared order. Each strategy polls within its own slice of the overall
//! timeout; the first one that yields a handle satisfying the requested
//! [`InteractionMode`] wins and later strategies are never queried. Trying
//! the next strategy is ordinary control flow, not error recovery.
//!
//! ## Toyota Way Application
//!
//! - **Jidoka**: Session-fatal driver errors stop resolution immediately
//! - **Poka-Yoke**: A handle is only returned once its mode is confirmed
//! - **Muda**: The cheap strategy answers the common case; fallbacks cost
//!   time only when the UI has drifted

use crate::clock::{system_clock, Clock, Deadline};
use crate::locator::{InteractionMode, LocatorStrategy, LogicalElement};
use crate::result::{DriverError, DriverResult, ProbeError, ProbeResult};
use crate::session::{ElementHandle, Session};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default overall resolution timeout (10 seconds)
pub const DEFAULT_RESOLVE_TIMEOUT_MS: u64 = 10_000;

/// Default polling interval between lookups (250ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

/// Floor for the poll interval so a zero setting cannot spin
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

// =============================================================================
// OPTIONS
// =============================================================================

/// Resolver tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverOptions {
    /// Pause between lookups of the same strategy, in milliseconds
    pub poll_interval_ms: u64,
    /// Fixed per-strategy budget; `None` splits the remaining time evenly
    pub strategy_timeout_ms: Option<u64>,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            strategy_timeout_ms: None,
        }
    }
}

impl ResolverOptions {
    /// Create default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Cap each strategy at a fixed budget
    #[must_use]
    pub const fn with_strategy_timeout(mut self, ms: u64) -> Self {
        self.strategy_timeout_ms = Some(ms);
        self
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms).max(MIN_POLL_INTERVAL)
    }

    /// Budget for the next strategy given the time left
    fn strategy_budget(&self, remaining: Duration, strategies_left: usize) -> Duration {
        match self.strategy_timeout_ms {
            Some(ms) => Duration::from_millis(ms).min(remaining),
            None => remaining / strategies_left.max(1) as u32,
        }
    }
}

// =============================================================================
// RESOLVED HANDLE
// =============================================================================

/// Live element found by a specific strategy
///
/// Borrows the session it came from and is deliberately not `Clone`: a
/// handle is only good for the interaction that immediately follows
/// resolution.
pub struct ResolvedHandle<'s, S: Session + ?Sized> {
    session: &'s S,
    handle: ElementHandle,
    element: String,
    strategy: LocatorStrategy,
}

impl<S: Session + ?Sized> fmt::Debug for ResolvedHandle<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedHandle")
            .field("element", &self.element)
            .field("strategy", &self.strategy)
            .field("handle", &self.handle)
            .finish()
    }
}

impl<'s, S: Session + ?Sized> ResolvedHandle<'s, S> {
    /// Logical element name
    #[must_use]
    pub fn element_name(&self) -> &str {
        &self.element
    }

    /// Strategy that found the element
    #[must_use]
    pub fn strategy(&self) -> &LocatorStrategy {
        &self.strategy
    }

    /// Backend element reference
    #[must_use]
    pub fn handle(&self) -> &ElementHandle {
        &self.handle
    }

    /// Session the element lives in
    #[must_use]
    pub fn session(&self) -> &'s S {
        self.session
    }

    /// Click the element
    pub fn click(&self) -> ProbeResult<()> {
        debug!(element = %self.element, "Clicking element");
        Ok(self.session.click(&self.handle)?)
    }

    /// Type text into the element
    pub fn send_keys(&self, text: &str) -> ProbeResult<()> {
        Ok(self.session.send_keys(&self.handle, text)?)
    }

    /// Clear the element
    pub fn clear(&self) -> ProbeResult<()> {
        Ok(self.session.clear(&self.handle)?)
    }

    /// Visible text of the element
    pub fn text(&self) -> ProbeResult<String> {
        Ok(self.session.text(&self.handle)?)
    }

    /// Whether the element is still displayed
    pub fn is_displayed(&self) -> ProbeResult<bool> {
        Ok(self.session.is_displayed(&self.handle)?)
    }

    /// First descendant matching `locator`
    pub fn find_within(&self, locator: &LocatorStrategy) -> ProbeResult<Option<ElementHandle>> {
        Ok(self.session.find_element_within(&self.handle, locator)?)
    }

    /// Release the borrow, keeping the raw reference
    #[must_use]
    pub fn into_handle(self) -> ElementHandle {
        self.handle
    }
}

// =============================================================================
// RESOLVER
// =============================================================================

/// Resolves logical elements to live handles
#[derive(Debug, Clone)]
pub struct ElementResolver {
    clock: Arc<dyn Clock>,
    options: ResolverOptions,
}

impl Default for ElementResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementResolver {
    /// Resolver on the system clock with default options
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    /// Resolver on an explicit clock
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            options: ResolverOptions::default(),
        }
    }

    /// Replace options
    #[must_use]
    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    /// Current options
    #[must_use]
    pub const fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Clock used for polling
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Resolve `element` to a handle satisfying `mode` within `timeout`
    ///
    /// Every strategy is probed at least once even if the budget is spent.
    /// Not-found, stale and not-interactable replies move on to the next
    /// poll; any other driver error is returned as-is.
    pub fn resolve<'s, S: Session + ?Sized>(
        &self,
        session: &'s S,
        element: &LogicalElement,
        timeout: Duration,
        mode: InteractionMode,
    ) -> ProbeResult<ResolvedHandle<'s, S>> {
        let clock = self.clock.as_ref();
        let deadline = Deadline::after(clock, timeout);
        let poll = self.options.poll_interval();
        let strategies = element.strategies();

        let mut strategies_tried = Vec::with_capacity(strategies.len());
        let mut last_error: Option<DriverError> = None;

        for (index, strategy) in strategies.iter().enumerate() {
            strategies_tried.push(strategy.to_string());
            let budget = self
                .options
                .strategy_budget(deadline.remaining(clock), strategies.len() - index);
            let strategy_deadline = Deadline::after(clock, budget);
            trace!(element = %element, %strategy, budget_ms = budget.as_millis() as u64, "Trying strategy");

            loop {
                match probe(session, strategy, mode) {
                    Ok(Some(handle)) => {
                        debug!(
                            element = %element,
                            %strategy,
                            elapsed_ms = deadline.elapsed(clock).as_millis() as u64,
                            "Element resolved"
                        );
                        return Ok(ResolvedHandle {
                            session,
                            handle,
                            element: element.name().to_string(),
                            strategy: strategy.clone(),
                        });
                    }
                    Ok(None) => {}
                    Err(err) if err.is_transient() => last_error = Some(err),
                    Err(err) => return Err(err.into()),
                }

                let remaining = strategy_deadline.remaining(clock);
                if remaining.is_zero() {
                    break;
                }
                clock.sleep(poll.min(remaining));
            }
        }

        debug!(
            element = %element,
            elapsed_ms = deadline.elapsed(clock).as_millis() as u64,
            "Element not found"
        );
        Err(ProbeError::ElementNotFound {
            element: element.name().to_string(),
            strategies_tried,
            last_error,
        })
    }

    /// Like [`resolve`](Self::resolve), mapping `ElementNotFound` to `None`
    pub fn try_resolve<'s, S: Session + ?Sized>(
        &self,
        session: &'s S,
        element: &LogicalElement,
        timeout: Duration,
        mode: InteractionMode,
    ) -> ProbeResult<Option<ResolvedHandle<'s, S>>> {
        match self.resolve(session, element, timeout, mode) {
            Ok(handle) => Ok(Some(handle)),
            Err(ProbeError::ElementNotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// All elements found by the first strategy with a non-empty match
    ///
    /// Single pass, no polling; an empty vector means nothing matched.
    pub fn find_all<S: Session + ?Sized>(
        &self,
        session: &S,
        element: &LogicalElement,
    ) -> ProbeResult<Vec<ElementHandle>> {
        for strategy in element.strategies() {
            match session.find_elements(strategy) {
                Ok(found) if !found.is_empty() => {
                    trace!(element = %element, %strategy, count = found.len(), "Collection found");
                    return Ok(found);
                }
                Ok(_) => {}
                Err(err) if err.is_transient() => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(Vec::new())
    }
}

/// One lookup plus the mode check
fn probe<S: Session + ?Sized>(
    session: &S,
    strategy: &LocatorStrategy,
    mode: InteractionMode,
) -> DriverResult<Option<ElementHandle>> {
    let Some(handle) = session.find_element(strategy)? else {
        return Ok(None);
    };
    let satisfied = match mode {
        InteractionMode::Presence => true,
        InteractionMode::Visible => session.is_displayed(&handle)?,
        InteractionMode::Clickable => {
            session.is_displayed(&handle)? && session.is_enabled(&handle)?
        }
    };
    Ok(satisfied.then_some(handle))
}
