//! Remote WebDriver / Appium Session
//!
//! Blocking HTTP backend for [`Session`]. One [`RemoteSession`] owns one
//! server-side session and deletes it on close or drop.
//!
//! ## Toyota Way Application
//!
//! - **Jidoka**: session-fatal protocol errors surface immediately
//! - **Poka-Yoke**: `close` is idempotent, so a guard and `Drop` cannot double-delete

use crate::capabilities::{android_capabilities, browser_capabilities};
use crate::config::{AndroidConfig, DriverConfig};
use crate::locator::LocatorStrategy;
use crate::protocol::{
    bool_from_value, element_from_value, elements_from_value, parse_response,
    session_id_from_value, string_from_value, Command, Dialect, HttpMethod,
};
use crate::result::{DriverError, DriverResult, ProbeError, ProbeResult};
use crate::session::{ElementHandle, Session, SessionFactory};
use base64::Engine;
use reqwest::blocking::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Upper bound on a single HTTP round trip
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 120_000;

const READY_STATE_SCRIPT: &str = "return document.readyState";

/// Live session on a WebDriver-compatible server
#[derive(Debug)]
pub struct RemoteSession {
    client: Client,
    server_url: String,
    session_id: String,
    dialect: Dialect,
    closed: bool,
}

impl RemoteSession {
    /// Create a session on `server_url` with `capabilities`
    pub fn connect(
        server_url: &str,
        capabilities: &Value,
        dialect: Dialect,
        http_timeout: Duration,
    ) -> ProbeResult<Self> {
        let client = Client::builder()
            .timeout(http_timeout)
            .build()
            .map_err(|e| ProbeError::session_creation(format!("HTTP client: {e}")))?;
        let server_url = server_url.trim_end_matches('/').to_string();

        let request = Command::NewSession(capabilities).to_request(dialect, "");
        let url = format!("{server_url}{}", request.path);
        info!(server = %server_url, ?dialect, "Creating session");

        let response = client
            .post(&url)
            .json(&request.body)
            .send()
            .map_err(|e| ProbeError::session_creation(format!("{url}: {e}")))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| ProbeError::session_creation(format!("{url}: {e}")))?;
        let value = parse_response(status, &body)
            .map_err(|e| ProbeError::session_creation(e.to_string()))?;
        let session_id = session_id_from_value(&value)
            .map_err(|e| ProbeError::session_creation(e.to_string()))?;

        info!(session_id = %session_id, "Session created");
        Ok(Self {
            client,
            server_url,
            session_id,
            dialect,
            closed: false,
        })
    }

    /// Server-side session id
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Backend family
    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn send(&self, command: Command<'_>) -> DriverResult<Value> {
        let request = command.to_request(self.dialect, &self.session_id);
        let url = format!("{}{}", self.server_url, request.path);
        trace!(method = ?request.method, path = %request.path, "WebDriver command");

        let builder = match request.method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url).json(&request.body),
            HttpMethod::Delete => self.client.delete(&url),
        };
        let response = builder.send().map_err(transport)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(transport)?;
        parse_response(status, &body)
    }
}

fn transport(err: reqwest::Error) -> DriverError {
    if err.is_timeout() {
        DriverError::Timeout(err.to_string())
    } else {
        DriverError::Transport(err.to_string())
    }
}

/// `no such element` is an answer, not a failure
fn absent_as_none(result: DriverResult<Value>) -> DriverResult<Option<ElementHandle>> {
    match result {
        Ok(value) => element_from_value(&value).map(Some),
        Err(DriverError::NoSuchElement(_)) => Ok(None),
        Err(err) => Err(err),
    }
}

impl Session for RemoteSession {
    fn find_element(&self, locator: &LocatorStrategy) -> DriverResult<Option<ElementHandle>> {
        absent_as_none(self.send(Command::FindElement(locator)))
    }

    fn find_elements(&self, locator: &LocatorStrategy) -> DriverResult<Vec<ElementHandle>> {
        elements_from_value(&self.send(Command::FindElements(locator))?)
    }

    fn find_element_within(
        &self,
        parent: &ElementHandle,
        locator: &LocatorStrategy,
    ) -> DriverResult<Option<ElementHandle>> {
        absent_as_none(self.send(Command::FindElementFromElement(parent, locator)))
    }

    fn click(&self, element: &ElementHandle) -> DriverResult<()> {
        self.send(Command::ElementClick(element)).map(drop)
    }

    fn send_keys(&self, element: &ElementHandle, text: &str) -> DriverResult<()> {
        self.send(Command::ElementSendKeys(element, text)).map(drop)
    }

    fn clear(&self, element: &ElementHandle) -> DriverResult<()> {
        self.send(Command::ElementClear(element)).map(drop)
    }

    fn text(&self, element: &ElementHandle) -> DriverResult<String> {
        string_from_value(&self.send(Command::GetElementText(element))?)
    }

    fn is_displayed(&self, element: &ElementHandle) -> DriverResult<bool> {
        bool_from_value(&self.send(Command::IsElementDisplayed(element))?)
    }

    fn is_enabled(&self, element: &ElementHandle) -> DriverResult<bool> {
        bool_from_value(&self.send(Command::IsElementEnabled(element))?)
    }

    fn navigate_to(&self, url: &str) -> DriverResult<()> {
        debug!(url, "Navigating");
        self.send(Command::NavigateTo(url)).map(drop)
    }

    fn navigate_back(&self) -> DriverResult<()> {
        self.send(Command::Back).map(drop)
    }

    fn current_url(&self) -> DriverResult<String> {
        string_from_value(&self.send(Command::GetCurrentUrl)?)
    }

    fn title(&self) -> DriverResult<String> {
        string_from_value(&self.send(Command::GetTitle)?)
    }

    fn current_readiness(&self) -> DriverResult<bool> {
        match self.dialect {
            Dialect::Web => {
                let state = self.execute_script(READY_STATE_SCRIPT, Vec::new())?;
                Ok(state.as_str() == Some("complete"))
            }
            // native screens have no document lifecycle
            Dialect::Appium => Ok(true),
        }
    }

    fn execute_script(&self, script: &str, args: Vec<Value>) -> DriverResult<Value> {
        self.send(Command::ExecuteScript(script, &args))
    }

    fn screenshot(&self) -> DriverResult<Vec<u8>> {
        let encoded = string_from_value(&self.send(Command::TakeScreenshot)?)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| DriverError::Protocol {
                code: "invalid response".into(),
                message: format!("screenshot is not base64: {e}"),
            })
    }

    fn close(&mut self) -> DriverResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        info!(session_id = %self.session_id, "Deleting session");
        self.send(Command::DeleteSession).map(drop)
    }
}

impl Drop for RemoteSession {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(session_id = %self.session_id, error = %err, "Session delete on drop failed");
        }
    }
}

// =============================================================================
// FACTORY
// =============================================================================

/// Creates [`RemoteSession`]s from a validated config
#[derive(Debug, Clone)]
pub struct RemoteSessionFactory {
    server_url: String,
    capabilities: Value,
    dialect: Dialect,
    http_timeout: Duration,
}

impl RemoteSessionFactory {
    /// Factory for desktop browser sessions
    pub fn browser(config: &DriverConfig) -> ProbeResult<Self> {
        config.validate()?;
        Ok(Self {
            server_url: config.server_url.clone(),
            capabilities: browser_capabilities(config),
            dialect: Dialect::Web,
            http_timeout: Duration::from_millis(DEFAULT_HTTP_TIMEOUT_MS),
        })
    }

    /// Factory for Android app sessions
    pub fn android(config: &AndroidConfig) -> ProbeResult<Self> {
        config.validate()?;
        Ok(Self {
            server_url: config.server_url.clone(),
            capabilities: android_capabilities(config),
            dialect: Dialect::Appium,
            http_timeout: Duration::from_millis(DEFAULT_HTTP_TIMEOUT_MS),
        })
    }

    /// Override the per-request HTTP timeout
    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Capabilities sent on each `New Session`
    #[must_use]
    pub const fn capabilities(&self) -> &Value {
        &self.capabilities
    }

    /// Backend family
    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }
}

impl SessionFactory for RemoteSessionFactory {
    type Session = RemoteSession;

    fn create(&mut self) -> ProbeResult<RemoteSession> {
        RemoteSession::connect(
            &self.server_url,
            &self.capabilities,
            self.dialect,
            self.http_timeout,
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::Browser;
    use serde_json::json;

    #[test]
    fn test_absent_as_none() {
        assert_eq!(
            absent_as_none(Err(DriverError::NoSuchElement("x".into()))).unwrap(),
            None
        );
        let found = absent_as_none(Ok(json!({ crate::session::ELEMENT_KEY: "e1" }))).unwrap();
        assert_eq!(found.unwrap().id(), "e1");
        assert!(absent_as_none(Err(DriverError::InvalidSession("gone".into()))).is_err());
    }

    #[test]
    fn test_browser_factory_uses_web_dialect() {
        let factory =
            RemoteSessionFactory::browser(&DriverConfig::new().with_browser(Browser::Firefox))
                .unwrap();
        assert_eq!(factory.dialect(), Dialect::Web);
        assert_eq!(
            factory.capabilities()["capabilities"]["alwaysMatch"]["browserName"],
            "firefox"
        );
    }

    #[test]
    fn test_android_factory_uses_appium_dialect() {
        let factory = RemoteSessionFactory::android(&AndroidConfig::default()).unwrap();
        assert_eq!(factory.dialect(), Dialect::Appium);
    }

    #[test]
    fn test_factory_rejects_invalid_config() {
        let config = DriverConfig::new().with_server_url("");
        assert!(matches!(
            RemoteSessionFactory::browser(&config),
            Err(ProbeError::Config { .. })
        ));
    }

    #[test]
    fn test_unreachable_server_is_session_creation_error() {
        let mut factory = RemoteSessionFactory::browser(
            &DriverConfig::new().with_server_url("http://127.0.0.1:1"),
        )
        .unwrap()
        .with_http_timeout(Duration::from_millis(500));
        assert!(matches!(
            factory.create(),
            Err(ProbeError::SessionCreation { .. })
        ));
    }
}
