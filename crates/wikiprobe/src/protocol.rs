//! WebDriver Wire Mapping
//!
//! Translates session commands into W3C WebDriver HTTP requests and
//! responses back into values or [`DriverError`]s. Browser drivers and
//! Appium speak the same protocol but accept different locator strategies,
//! captured by [`Dialect`].

use crate::locator::LocatorStrategy;
use crate::result::{DriverError, DriverResult};
use crate::session::{ElementHandle, ELEMENT_KEY};
use serde_json::{json, Value};

/// Legacy JSON-wire element key still sent by some Appium builds
const LEGACY_ELEMENT_KEY: &str = "ELEMENT";

/// Which backend family a session talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// Desktop browser driver (chromedriver, geckodriver, ...)
    Web,
    /// Appium with a native app
    Appium,
}

/// Quote a value for a CSS attribute selector
fn css_attr_value(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

impl Dialect {
    /// `using` / `value` pair for a locator
    #[must_use]
    pub fn locator(&self, strategy: &LocatorStrategy) -> (&'static str, String) {
        match (self, strategy) {
            (Self::Web, LocatorStrategy::StableId(id)) => {
                ("css selector", format!("[id={}]", css_attr_value(id)))
            }
            (Self::Web, LocatorStrategy::AccessibilityLabel(label)) => (
                "css selector",
                format!("[aria-label={}]", css_attr_value(label)),
            ),
            (Self::Web, LocatorStrategy::ClassName(class)) => {
                ("css selector", format!("[class~={}]", css_attr_value(class)))
            }
            (Self::Appium, LocatorStrategy::StableId(id)) => ("id", id.clone()),
            (Self::Appium, LocatorStrategy::AccessibilityLabel(label)) => {
                ("accessibility id", label.clone())
            }
            (Self::Appium, LocatorStrategy::ClassName(class)) => ("class name", class.clone()),
            (_, LocatorStrategy::StructuralPath(path)) => ("xpath", path.clone()),
            (_, LocatorStrategy::Css(selector)) => ("css selector", selector.clone()),
            (_, LocatorStrategy::UiAutomator(selector)) => {
                ("-android uiautomator", selector.clone())
            }
        }
    }
}

/// HTTP verb of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// DELETE
    Delete,
}

/// One HTTP request against the server
#[derive(Debug, Clone, PartialEq)]
pub struct WireRequest {
    /// Verb
    pub method: HttpMethod,
    /// Path relative to the server root
    pub path: String,
    /// JSON body for POST
    pub body: Option<Value>,
}

/// Session commands used by the remote backend
#[derive(Debug, Clone, Copy)]
pub enum Command<'a> {
    /// Create a session
    NewSession(&'a Value),
    /// Delete the session
    DeleteSession,
    /// Find one element
    FindElement(&'a LocatorStrategy),
    /// Find all elements
    FindElements(&'a LocatorStrategy),
    /// Find one element under a parent
    FindElementFromElement(&'a ElementHandle, &'a LocatorStrategy),
    /// Click
    ElementClick(&'a ElementHandle),
    /// Type text
    ElementSendKeys(&'a ElementHandle, &'a str),
    /// Clear
    ElementClear(&'a ElementHandle),
    /// Read text
    GetElementText(&'a ElementHandle),
    /// Read displayedness
    IsElementDisplayed(&'a ElementHandle),
    /// Read enabledness
    IsElementEnabled(&'a ElementHandle),
    /// Load a URL
    NavigateTo(&'a str),
    /// History back
    Back,
    /// Read current URL
    GetCurrentUrl,
    /// Read title
    GetTitle,
    /// Run a synchronous script
    ExecuteScript(&'a str, &'a [Value]),
    /// Capture the viewport
    TakeScreenshot,
}

impl Command<'_> {
    /// HTTP request for this command in session `session_id`
    #[must_use]
    pub fn to_request(&self, dialect: Dialect, session_id: &str) -> WireRequest {
        let base = format!("/session/{session_id}");
        let element = |handle: &ElementHandle, suffix: &str| {
            format!("{base}/element/{}{suffix}", handle.id())
        };
        let find_body = |strategy: &LocatorStrategy| {
            let (using, value) = dialect.locator(strategy);
            Some(json!({ "using": using, "value": value }))
        };
        let (method, path, body) = match *self {
            Self::NewSession(caps) => (HttpMethod::Post, "/session".to_string(), Some(caps.clone())),
            Self::DeleteSession => (HttpMethod::Delete, base.clone(), None),
            Self::FindElement(s) => (HttpMethod::Post, format!("{base}/element"), find_body(s)),
            Self::FindElements(s) => (HttpMethod::Post, format!("{base}/elements"), find_body(s)),
            Self::FindElementFromElement(parent, s) => {
                (HttpMethod::Post, element(parent, "/element"), find_body(s))
            }
            Self::ElementClick(h) => (HttpMethod::Post, element(h, "/click"), Some(json!({}))),
            Self::ElementSendKeys(h, text) => (
                HttpMethod::Post,
                element(h, "/value"),
                Some(json!({ "text": text })),
            ),
            Self::ElementClear(h) => (HttpMethod::Post, element(h, "/clear"), Some(json!({}))),
            Self::GetElementText(h) => (HttpMethod::Get, element(h, "/text"), None),
            Self::IsElementDisplayed(h) => (HttpMethod::Get, element(h, "/displayed"), None),
            Self::IsElementEnabled(h) => (HttpMethod::Get, element(h, "/enabled"), None),
            Self::NavigateTo(url) => (
                HttpMethod::Post,
                format!("{base}/url"),
                Some(json!({ "url": url })),
            ),
            Self::Back => (HttpMethod::Post, format!("{base}/back"), Some(json!({}))),
            Self::GetCurrentUrl => (HttpMethod::Get, format!("{base}/url"), None),
            Self::GetTitle => (HttpMethod::Get, format!("{base}/title"), None),
            Self::ExecuteScript(script, args) => (
                HttpMethod::Post,
                format!("{base}/execute/sync"),
                Some(json!({ "script": script, "args": args })),
            ),
            Self::TakeScreenshot => (HttpMethod::Get, format!("{base}/screenshot"), None),
        };
        WireRequest { method, path, body }
    }
}

/// Unwrap a response body into its `value`, mapping protocol errors
pub fn parse_response(status: u16, body: &str) -> DriverResult<Value> {
    let success = (200..300).contains(&status);
    if success && body.trim().is_empty() {
        return Ok(Value::Null);
    }
    let parsed: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(err) => {
            return Err(DriverError::Protocol {
                code: format!("http {status}"),
                message: format!("unparseable response: {err}"),
            })
        }
    };
    let value = parsed.get("value").cloned().unwrap_or(Value::Null);

    if let Some(code) = value.get("error").and_then(Value::as_str) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default();
        return Err(DriverError::from_code(code, message));
    }
    if !success {
        return Err(DriverError::Protocol {
            code: format!("http {status}"),
            message: value.to_string(),
        });
    }
    Ok(value)
}

/// Element reference inside a response value
pub fn element_from_value(value: &Value) -> DriverResult<ElementHandle> {
    value
        .get(ELEMENT_KEY)
        .or_else(|| value.get(LEGACY_ELEMENT_KEY))
        .and_then(Value::as_str)
        .map(ElementHandle::new)
        .ok_or_else(|| DriverError::Protocol {
            code: "invalid response".into(),
            message: format!("no element reference in {value}"),
        })
}

/// Element references inside a response array
pub fn elements_from_value(value: &Value) -> DriverResult<Vec<ElementHandle>> {
    match value {
        Value::Array(items) => items.iter().map(element_from_value).collect(),
        Value::Null => Ok(Vec::new()),
        other => Err(DriverError::Protocol {
            code: "invalid response".into(),
            message: format!("expected element array, got {other}"),
        }),
    }
}

/// Session id from a `New Session` response value
pub fn session_id_from_value(value: &Value) -> DriverResult<String> {
    value
        .get("sessionId")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| DriverError::SessionNotCreated(format!("no sessionId in {value}")))
}

/// String response value
pub fn string_from_value(value: &Value) -> DriverResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Null => Ok(String::new()),
        other => Err(DriverError::Protocol {
            code: "invalid response".into(),
            message: format!("expected string, got {other}"),
        }),
    }
}

/// Boolean response value
pub fn bool_from_value(value: &Value) -> DriverResult<bool> {
    value.as_bool().ok_or_else(|| DriverError::Protocol {
        code: "invalid response".into(),
        message: format!("expected boolean, got {value}"),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod dialect_tests {
        use super::*;

        #[test]
        fn test_web_maps_ids_and_labels_to_css() {
            assert_eq!(
                Dialect::Web.locator(&LocatorStrategy::stable_id("searchInput")),
                ("css selector", "[id=\"searchInput\"]".to_string())
            );
            assert_eq!(
                Dialect::Web.locator(&LocatorStrategy::accessibility_label("Search \"Wikipedia\"")),
                ("css selector", "[aria-label=\"Search \\\"Wikipedia\\\"\"]".to_string())
            );
        }

        #[test]
        fn test_appium_uses_native_strategies() {
            assert_eq!(
                Dialect::Appium.locator(&LocatorStrategy::stable_id("org.wikipedia.alpha:id/search_container")),
                ("id", "org.wikipedia.alpha:id/search_container".to_string())
            );
            assert_eq!(
                Dialect::Appium.locator(&LocatorStrategy::accessibility_label("Navigate up")),
                ("accessibility id", "Navigate up".to_string())
            );
            assert_eq!(
                Dialect::Appium.locator(&LocatorStrategy::class_name("android.widget.TextView")),
                ("class name", "android.widget.TextView".to_string())
            );
            assert_eq!(
                Dialect::Appium.locator(&LocatorStrategy::ui_automator(
                    "new UiSelector().description(\"Navigate up\")"
                )),
                (
                    "-android uiautomator",
                    "new UiSelector().description(\"Navigate up\")".to_string()
                )
            );
        }

        #[test]
        fn test_xpath_is_shared() {
            let path = LocatorStrategy::structural_path("//h1");
            assert_eq!(Dialect::Web.locator(&path), Dialect::Appium.locator(&path));
        }
    }

    mod command_tests {
        use super::*;

        #[test]
        fn test_find_element_request() {
            let strategy = LocatorStrategy::css(".infobox");
            let req = Command::FindElement(&strategy).to_request(Dialect::Web, "abc");
            assert_eq!(req.method, HttpMethod::Post);
            assert_eq!(req.path, "/session/abc/element");
            assert_eq!(
                req.body.unwrap(),
                json!({ "using": "css selector", "value": ".infobox" })
            );
        }

        #[test]
        fn test_element_scoped_paths() {
            let handle = ElementHandle::new("e1");
            let strategy = LocatorStrategy::css("button");
            assert_eq!(
                Command::FindElementFromElement(&handle, &strategy)
                    .to_request(Dialect::Web, "s")
                    .path,
                "/session/s/element/e1/element"
            );
            assert_eq!(
                Command::IsElementDisplayed(&handle).to_request(Dialect::Web, "s").path,
                "/session/s/element/e1/displayed"
            );
            let keys = Command::ElementSendKeys(&handle, "Rust").to_request(Dialect::Appium, "s");
            assert_eq!(keys.body.unwrap(), json!({ "text": "Rust" }));
        }

        #[test]
        fn test_session_level_commands() {
            let caps = json!({ "capabilities": {} });
            let new = Command::NewSession(&caps).to_request(Dialect::Web, "");
            assert_eq!(new.path, "/session");
            let delete = Command::DeleteSession.to_request(Dialect::Web, "s");
            assert_eq!(delete.method, HttpMethod::Delete);
            assert_eq!(delete.path, "/session/s");
            let script = Command::ExecuteScript("return 1", &[]).to_request(Dialect::Web, "s");
            assert_eq!(script.path, "/session/s/execute/sync");
            assert_eq!(script.body.unwrap()["args"], json!([]));
        }
    }

    mod response_tests {
        use super::*;

        #[test]
        fn test_success_unwraps_value() {
            let value = parse_response(200, r#"{"value": "Rust"}"#).unwrap();
            assert_eq!(value, json!("Rust"));
        }

        #[test]
        fn test_error_body_maps_code() {
            let err = parse_response(
                404,
                r#"{"value": {"error": "no such element", "message": "nope", "stacktrace": ""}}"#,
            )
            .unwrap_err();
            assert_eq!(err, DriverError::NoSuchElement("nope".into()));
        }

        #[test]
        fn test_non_json_error_is_protocol() {
            let err = parse_response(502, "<html>Bad Gateway</html>").unwrap_err();
            assert!(matches!(err, DriverError::Protocol { .. }));
        }

        #[test]
        fn test_empty_success_body_is_null() {
            assert_eq!(parse_response(200, "").unwrap(), Value::Null);
        }

        #[test]
        fn test_element_keys() {
            let w3c = json!({ ELEMENT_KEY: "w3c-id" });
            let legacy = json!({ "ELEMENT": "legacy-id" });
            assert_eq!(element_from_value(&w3c).unwrap().id(), "w3c-id");
            assert_eq!(element_from_value(&legacy).unwrap().id(), "legacy-id");
            assert!(element_from_value(&json!({})).is_err());
        }

        #[test]
        fn test_elements_array() {
            let value = json!([{ ELEMENT_KEY: "a" }, { ELEMENT_KEY: "b" }]);
            let handles = elements_from_value(&value).unwrap();
            assert_eq!(handles.len(), 2);
            assert!(elements_from_value(&json!([])).unwrap().is_empty());
        }

        #[test]
        fn test_session_id() {
            let value = json!({ "sessionId": "1234", "capabilities": {} });
            assert_eq!(session_id_from_value(&value).unwrap(), "1234");
            assert!(matches!(
                session_id_from_value(&json!({})),
                Err(DriverError::SessionNotCreated(_))
            ));
        }
    }
}
