//! Result and error types for wikiprobe.
//!
//! Two layers: [`DriverError`] is what the remote automation backend
//! reports for a single command, [`ProbeError`] is what the resilient
//! layer surfaces to callers once a low-level failure has been translated
//! at a component boundary.

use std::time::Duration;
use thiserror::Error;

/// Result type for wikiprobe operations
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Result type for single remote-session commands
pub type DriverResult<T> = Result<T, DriverError>;

/// Failure of one command against the remote automation session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// Locator matched nothing
    #[error("no such element: {0}")]
    NoSuchElement(String),

    /// Element reference belongs to a torn-down UI tree
    #[error("stale element reference: {0}")]
    StaleElement(String),

    /// Element exists but cannot receive input
    #[error("element not interactable: {0}")]
    NotInteractable(String),

    /// Another element would receive the click
    #[error("element click intercepted: {0}")]
    ClickIntercepted(String),

    /// Backend-side command timeout
    #[error("command timed out: {0}")]
    Timeout(String),

    /// Session is gone (crashed target, expired id)
    #[error("invalid session id: {0}")]
    InvalidSession(String),

    /// Backend refused to create a session
    #[error("session not created: {0}")]
    SessionNotCreated(String),

    /// Script evaluation failed inside the target
    #[error("javascript error: {0}")]
    Script(String),

    /// Connection-level failure talking to the backend
    #[error("transport failure: {0}")]
    Transport(String),

    /// Any other protocol error code
    #[error("{code}: {message}")]
    Protocol {
        /// Protocol error code
        code: String,
        /// Backend-supplied message
        message: String,
    },
}

impl DriverError {
    /// Map a W3C WebDriver error code onto a variant
    #[must_use]
    pub fn from_code(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            "no such element" => Self::NoSuchElement(message),
            "stale element reference" => Self::StaleElement(message),
            "element not interactable" | "invalid element state" => {
                Self::NotInteractable(message)
            }
            "element click intercepted" => Self::ClickIntercepted(message),
            "timeout" | "script timeout" => Self::Timeout(message),
            "invalid session id" => Self::InvalidSession(message),
            "session not created" => Self::SessionNotCreated(message),
            "javascript error" => Self::Script(message),
            other => Self::Protocol {
                code: other.to_string(),
                message,
            },
        }
    }

    /// The W3C error code for this failure
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::NoSuchElement(_) => "no such element",
            Self::StaleElement(_) => "stale element reference",
            Self::NotInteractable(_) => "element not interactable",
            Self::ClickIntercepted(_) => "element click intercepted",
            Self::Timeout(_) => "timeout",
            Self::InvalidSession(_) => "invalid session id",
            Self::SessionNotCreated(_) => "session not created",
            Self::Script(_) => "javascript error",
            Self::Transport(_) => "transport failure",
            Self::Protocol { code, .. } => code,
        }
    }

    /// UI churn that a later poll may not see again
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NoSuchElement(_)
                | Self::StaleElement(_)
                | Self::NotInteractable(_)
                | Self::ClickIntercepted(_)
                | Self::Timeout(_)
        )
    }

    /// The session cannot be used for further commands
    #[must_use]
    pub const fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidSession(_) | Self::SessionNotCreated(_) | Self::Transport(_)
        )
    }
}

/// Errors surfaced by the resilient element layer
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Every locator strategy failed within the overall timeout
    #[error(
        "Element '{element}' not found (tried: {})",
        .strategies_tried.join(", ")
    )]
    ElementNotFound {
        /// Logical element name
        element: String,
        /// Human-readable strategies, in the order tried
        strategies_tried: Vec<String>,
        /// Last driver failure observed while probing, if any
        last_error: Option<DriverError>,
    },

    /// An awaited condition never held
    #[error(
        "Timed out waiting for {waited_for} after {}ms (timeout {}ms)",
        .elapsed.as_millis(),
        .timeout.as_millis()
    )]
    SettleTimeout {
        /// Description of the condition
        waited_for: String,
        /// Time spent polling
        elapsed: Duration,
        /// Configured bound
        timeout: Duration,
    },

    /// Retrying runner used all of its attempts
    #[error("Operation failed after {attempts} attempt(s): {last_error}")]
    ExhaustedFailure {
        /// Attempts made, including the failing one
        attempts: u32,
        /// Failure of the final attempt
        #[source]
        last_error: Box<ProbeError>,
    },

    /// Remote session command failed
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// Session factory could not produce a session
    #[error("Failed to create session: {message}")]
    SessionCreation {
        /// Error message
        message: String,
    },

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl ProbeError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a session creation error
    pub fn session_creation(message: impl Into<String>) -> Self {
        Self::SessionCreation {
            message: message.into(),
        }
    }

    /// A later poll of the same condition may succeed
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::ElementNotFound { .. } | Self::SettleTimeout { .. } => true,
            Self::Driver(err) => err.is_transient(),
            _ => false,
        }
    }

    /// The session behind this failure must be rebuilt
    #[must_use]
    pub const fn is_session_fatal(&self) -> bool {
        match self {
            Self::Driver(err) => err.is_session_fatal(),
            Self::SessionCreation { .. } => true,
            _ => false,
        }
    }

    /// `ElementNotFound` or `SettleTimeout`
    #[must_use]
    pub const fn is_absence(&self) -> bool {
        matches!(
            self,
            Self::ElementNotFound { .. } | Self::SettleTimeout { .. }
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod driver_error_tests {
        use super::*;

        #[test]
        fn test_from_code_maps_known_codes() {
            assert_eq!(
                DriverError::from_code("no such element", "x"),
                DriverError::NoSuchElement("x".into())
            );
            assert_eq!(
                DriverError::from_code("invalid session id", "gone"),
                DriverError::InvalidSession("gone".into())
            );
            assert_eq!(
                DriverError::from_code("invalid element state", "disabled"),
                DriverError::NotInteractable("disabled".into())
            );
        }

        #[test]
        fn test_from_code_keeps_unknown_code() {
            let err = DriverError::from_code("unsupported operation", "nope");
            assert_eq!(err.code(), "unsupported operation");
            assert_eq!(err.to_string(), "unsupported operation: nope");
        }

        #[test]
        fn test_transient_and_fatal_are_disjoint() {
            let all = [
                DriverError::NoSuchElement(String::new()),
                DriverError::StaleElement(String::new()),
                DriverError::NotInteractable(String::new()),
                DriverError::ClickIntercepted(String::new()),
                DriverError::Timeout(String::new()),
                DriverError::InvalidSession(String::new()),
                DriverError::SessionNotCreated(String::new()),
                DriverError::Script(String::new()),
                DriverError::Transport(String::new()),
            ];
            for err in &all {
                assert!(!(err.is_transient() && err.is_session_fatal()), "{err}");
            }
            assert!(DriverError::StaleElement(String::new()).is_transient());
            assert!(DriverError::Transport(String::new()).is_session_fatal());
            assert!(!DriverError::Script(String::new()).is_transient());
        }
    }

    mod probe_error_tests {
        use super::*;

        #[test]
        fn test_element_not_found_lists_strategies() {
            let err = ProbeError::ElementNotFound {
                element: "search input".into(),
                strategies_tried: vec!["id 'a'".into(), "accessibility id 'b'".into()],
                last_error: None,
            };
            assert_eq!(
                err.to_string(),
                "Element 'search input' not found (tried: id 'a', accessibility id 'b')"
            );
        }

        #[test]
        fn test_settle_timeout_reports_millis() {
            let err = ProbeError::SettleTimeout {
                waited_for: "search results".into(),
                elapsed: Duration::from_millis(500),
                timeout: Duration::from_millis(500),
            };
            assert!(err.to_string().contains("after 500ms"));
        }

        #[test]
        fn test_exhausted_failure_has_source() {
            use std::error::Error as _;
            let err = ProbeError::ExhaustedFailure {
                attempts: 3,
                last_error: Box::new(ProbeError::session_creation("refused")),
            };
            assert!(err.source().is_some());
            assert!(err.to_string().starts_with("Operation failed after 3 attempt(s)"));
        }

        #[test]
        fn test_classification() {
            assert!(ProbeError::from(DriverError::StaleElement(String::new())).is_transient());
            assert!(ProbeError::from(DriverError::InvalidSession(String::new()))
                .is_session_fatal());
            assert!(ProbeError::session_creation("x").is_session_fatal());
            assert!(!ProbeError::config("x").is_transient());
            assert!(ProbeError::SettleTimeout {
                waited_for: String::new(),
                elapsed: Duration::ZERO,
                timeout: Duration::ZERO,
            }
            .is_absence());
        }
    }
}
