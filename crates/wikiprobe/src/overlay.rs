//! Transient Overlay Dismissal
//!
//! Onboarding screens, announcement cards, cookie banners and popups show
//! up depending on network timing and account state. Page objects call
//! [`OverlayDismisser::dismiss_all`] before any interaction that a modal
//! could block; it closes whatever is showing, in registry order, and
//! reports how many overlays it closed.
//!
//! Dismissal is best-effort: every failure in here is logged and
//! swallowed, never returned.

use crate::locator::{InteractionMode, LocatorStrategy, LogicalElement};
use crate::resolver::ElementResolver;
use crate::result::{ProbeError, ProbeResult};
use crate::session::Session;
use crate::wait::{SettleKind, SettleWaiter};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default bound for probing one overlay (2 seconds)
pub const DEFAULT_OVERLAY_PROBE_TIMEOUT_MS: u64 = 2_000;

/// How a showing overlay is closed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DismissAction {
    /// Click the overlay element itself
    Click,
    /// Press back / navigate back
    Back,
    /// Click a child of the overlay element
    ClickWithin(LocatorStrategy),
}

/// Known transient overlay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlaySignature {
    element: LogicalElement,
    action: DismissAction,
}

impl OverlaySignature {
    /// Overlay found by `element`, closed with `action`
    #[must_use]
    pub fn new(element: LogicalElement, action: DismissAction) -> Self {
        Self { element, action }
    }

    /// Overlay closed by clicking it
    #[must_use]
    pub fn click(element: LogicalElement) -> Self {
        Self::new(element, DismissAction::Click)
    }

    /// Overlay closed by navigating back
    #[must_use]
    pub fn back(element: LogicalElement) -> Self {
        Self::new(element, DismissAction::Back)
    }

    /// Overlay name
    #[must_use]
    pub fn name(&self) -> &str {
        self.element.name()
    }

    /// Element that detects the overlay
    #[must_use]
    pub const fn element(&self) -> &LogicalElement {
        &self.element
    }

    /// Dismiss action
    #[must_use]
    pub const fn action(&self) -> &DismissAction {
        &self.action
    }
}

/// Ordered overlay signatures; earlier entries are dismissed first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlayRegistry {
    signatures: Vec<OverlaySignature>,
}

impl OverlayRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a signature
    #[must_use]
    pub fn with(mut self, signature: OverlaySignature) -> Self {
        self.signatures.push(signature);
        self
    }

    /// Append a signature in place
    pub fn push(&mut self, signature: OverlaySignature) {
        self.signatures.push(signature);
    }

    /// Signatures in dismissal order
    pub fn iter(&self) -> impl Iterator<Item = &OverlaySignature> {
        self.signatures.iter()
    }

    /// Number of signatures
    #[must_use]
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

/// Closes any registered overlay that is currently showing
#[derive(Debug, Clone)]
pub struct OverlayDismisser {
    resolver: ElementResolver,
    waiter: SettleWaiter,
    registry: OverlayRegistry,
    probe_timeout: Duration,
}

impl OverlayDismisser {
    /// Dismisser over `registry`
    #[must_use]
    pub fn new(resolver: ElementResolver, waiter: SettleWaiter, registry: OverlayRegistry) -> Self {
        Self {
            resolver,
            waiter,
            registry,
            probe_timeout: Duration::from_millis(DEFAULT_OVERLAY_PROBE_TIMEOUT_MS),
        }
    }

    /// Bound for probing each overlay
    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Registered overlays
    #[must_use]
    pub const fn registry(&self) -> &OverlayRegistry {
        &self.registry
    }

    /// Dismiss every showing overlay, returning how many were closed
    pub fn dismiss_all<S: Session + ?Sized>(&self, session: &S) -> usize {
        let mut dismissed = 0;
        for signature in self.registry.iter() {
            match self.dismiss_one(session, signature) {
                Ok(true) => {
                    info!(overlay = signature.name(), "Overlay dismissed");
                    dismissed += 1;
                }
                Ok(false) => debug!(overlay = signature.name(), "Overlay not showing"),
                Err(err) => {
                    warn!(overlay = signature.name(), error = %err, "Overlay dismissal failed");
                }
            }
        }
        dismissed
    }

    fn dismiss_one<S: Session + ?Sized>(
        &self,
        session: &S,
        signature: &OverlaySignature,
    ) -> ProbeResult<bool> {
        let handle = match self.resolver.resolve(
            session,
            signature.element(),
            self.probe_timeout,
            InteractionMode::Presence,
        ) {
            Ok(handle) => handle,
            Err(ProbeError::ElementNotFound { .. }) => return Ok(false),
            Err(err) => return Err(err),
        };
        if !handle.is_displayed()? {
            return Ok(false);
        }

        match signature.action() {
            DismissAction::Click => handle.click()?,
            DismissAction::Back => session.navigate_back()?,
            DismissAction::ClickWithin(locator) => match handle.find_within(locator)? {
                Some(child) => session.click(&child)?,
                None => {
                    debug!(overlay = signature.name(), %locator, "Dismiss control not found");
                    return Ok(false);
                }
            },
        }

        self.waiter.settle(SettleKind::OverlayDismissed);
        Ok(true)
    }
}
