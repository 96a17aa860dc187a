//! Retrying Operation Runner
//!
//! Runs a unit of work against a freshly created session and rebuilds the
//! session between attempts. Every session the runner creates is closed
//! exactly once, whether the attempt succeeds, fails or panics.
//!
//! ```text
//! Attempting ──ok──► Success
//!     │
//!     └─err─► (attempts < max && retryable) ─► sleep(backoff) ─► Attempting
//!                 │
//!                 └─otherwise─► ExhaustedFailure { attempts, last_error }
//! ```

use crate::clock::{system_clock, Clock};
use crate::result::{ProbeError, ProbeResult};
use crate::session::{Session, SessionFactory};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default number of attempts
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default pause between attempts (2 seconds)
pub const DEFAULT_BACKOFF_MS: u64 = 2_000;

/// Default retry classifier: configuration problems never heal on retry
#[must_use]
pub fn retry_unless_config(error: &ProbeError) -> bool {
    !matches!(error, ProbeError::Config { .. } | ProbeError::Yaml(_))
}

// =============================================================================
// POLICY
// =============================================================================

/// Bound and pacing of retries for one operation kind
#[derive(Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
    is_retryable: fn(&ProbeError) -> bool,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, Duration::from_millis(DEFAULT_BACKOFF_MS))
    }
}

impl RetryPolicy {
    /// Policy with `max_attempts` (at least one) and fixed `backoff`
    #[must_use]
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            is_retryable: retry_unless_config,
        }
    }

    /// Single attempt, no retry
    #[must_use]
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Replace the retry classifier
    #[must_use]
    pub fn with_retryable(mut self, is_retryable: fn(&ProbeError) -> bool) -> Self {
        self.is_retryable = is_retryable;
        self
    }

    /// Maximum session creations
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Pause between attempts
    #[must_use]
    pub const fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Whether `error` may be retried
    #[must_use]
    pub fn is_retryable(&self, error: &ProbeError) -> bool {
        (self.is_retryable)(error)
    }
}

// =============================================================================
// SESSION GUARD
// =============================================================================

/// Owns a session for one attempt and closes it exactly once
struct SessionGuard<S: Session> {
    session: S,
    closed: bool,
}

impl<S: Session> SessionGuard<S> {
    fn new(session: S) -> Self {
        Self {
            session,
            closed: false,
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        match self.session.close() {
            Ok(()) => debug!("Session closed"),
            Err(err) => warn!(error = %err, "Failed to close session"),
        }
    }
}

impl<S: Session> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        self.close();
    }
}

// =============================================================================
// RUNNER
// =============================================================================

/// Executes operations with session rebuild between attempts
#[derive(Debug, Clone)]
pub struct RetryingOperationRunner {
    clock: Arc<dyn Clock>,
}

impl Default for RetryingOperationRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryingOperationRunner {
    /// Runner on the system clock
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    /// Runner on an explicit clock
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Run `operation` against sessions from `factory` under `policy`
    ///
    /// A failed session creation consumes an attempt. A failure the policy
    /// does not consider retryable ends the run at once.
    pub fn run<F, T, Op>(
        &self,
        factory: &mut F,
        mut operation: Op,
        policy: &RetryPolicy,
    ) -> ProbeResult<T>
    where
        F: SessionFactory,
        Op: FnMut(&F::Session) -> ProbeResult<T>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = factory.create().and_then(|session| {
                let mut guard = SessionGuard::new(session);
                let result = operation(&guard.session);
                guard.close();
                result
            });

            let error = match outcome {
                Ok(value) => {
                    info!(attempt, "Operation succeeded");
                    return Ok(value);
                }
                Err(error) => error,
            };

            if attempt >= policy.max_attempts() || !policy.is_retryable(&error) {
                warn!(attempt, error = %error, "Operation failed, giving up");
                return Err(ProbeError::ExhaustedFailure {
                    attempts: attempt,
                    last_error: Box::new(error),
                });
            }

            warn!(
                attempt,
                max_attempts = policy.max_attempts(),
                error = %error,
                "Attempt failed, retrying with a new session"
            );
            self.clock.sleep(policy.backoff());
        }
    }
}
