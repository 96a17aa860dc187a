//! Remote Automation Session
//!
//! The resilient layer drives exactly one remote session at a time: a
//! browser through WebDriver or the Android app through Appium. This module
//! is the seam to that opaque collaborator. A lookup that matches nothing
//! is `Ok(None)`, not an error; errors are reserved for protocol failures.

use crate::locator::LocatorStrategy;
use crate::result::{DriverResult, ProbeResult};
use serde_json::Value;
use std::fmt;

/// W3C web element identifier key
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Reference to an element inside the remote UI tree
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle {
    id: String,
}

impl ElementHandle {
    /// Wrap a backend element id
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Backend element id
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// JSON form accepted as a script argument
    #[must_use]
    pub fn to_script_arg(&self) -> Value {
        serde_json::json!({ ELEMENT_KEY: self.id })
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// One live connection to a remote automation backend
///
/// Commands are serialized against the backend, so every query takes
/// `&self`; only `close` needs exclusive access.
pub trait Session {
    /// First element matching `locator`
    fn find_element(&self, locator: &LocatorStrategy) -> DriverResult<Option<ElementHandle>>;

    /// All elements matching `locator`, possibly none
    fn find_elements(&self, locator: &LocatorStrategy) -> DriverResult<Vec<ElementHandle>>;

    /// First descendant of `parent` matching `locator`
    fn find_element_within(
        &self,
        parent: &ElementHandle,
        locator: &LocatorStrategy,
    ) -> DriverResult<Option<ElementHandle>>;

    /// Click an element
    fn click(&self, element: &ElementHandle) -> DriverResult<()>;

    /// Type text into an element
    fn send_keys(&self, element: &ElementHandle, text: &str) -> DriverResult<()>;

    /// Clear an editable element
    fn clear(&self, element: &ElementHandle) -> DriverResult<()>;

    /// Visible text of an element
    fn text(&self, element: &ElementHandle) -> DriverResult<String>;

    /// Whether an element is displayed
    fn is_displayed(&self, element: &ElementHandle) -> DriverResult<bool>;

    /// Whether an element accepts input
    fn is_enabled(&self, element: &ElementHandle) -> DriverResult<bool>;

    /// Load a URL
    fn navigate_to(&self, url: &str) -> DriverResult<()>;

    /// History back / system back button
    fn navigate_back(&self) -> DriverResult<()>;

    /// Current URL
    fn current_url(&self) -> DriverResult<String>;

    /// Current page title
    fn title(&self) -> DriverResult<String>;

    /// Readiness flag has reached its terminal value
    fn current_readiness(&self) -> DriverResult<bool>;

    /// Execute a raw script command in the target
    fn execute_script(&self, script: &str, args: Vec<Value>) -> DriverResult<Value>;

    /// PNG screenshot of the current viewport
    fn screenshot(&self) -> DriverResult<Vec<u8>>;

    /// Tear down the remote session
    fn close(&mut self) -> DriverResult<()>;
}

/// Produces fresh sessions for the retrying runner
pub trait SessionFactory {
    /// Session type produced
    type Session: Session;

    /// Create a new session
    fn create(&mut self) -> ProbeResult<Self::Session>;
}

impl<S, F> SessionFactory for F
where
    S: Session,
    F: FnMut() -> ProbeResult<S>,
{
    type Session = S;

    fn create(&mut self) -> ProbeResult<S> {
        self()
    }
}
