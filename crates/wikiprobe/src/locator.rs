//! Locator Strategies and Logical Elements
//!
//! A [`LogicalElement`] names *what* a page object wants ("search input")
//! and carries the ordered list of [`LocatorStrategy`] alternatives that
//! may find it. Cheap, stable strategies go first; structural paths are the
//! fallback for UI drift such as renamed resource ids or localized labels.
//!
//! ## Toyota Way Application
//!
//! - **Poka-Yoke**: An element cannot be built without a primary strategy
//! - **Jidoka**: Strategy order is explicit data, not exception handling

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// LOCATOR STRATEGY
// =============================================================================

/// One way of finding a UI element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum LocatorStrategy {
    /// Stable identifier (DOM id or Android resource id)
    StableId(String),
    /// Accessibility label (`aria-label` or content description)
    AccessibilityLabel(String),
    /// Structural path (XPath)
    StructuralPath(String),
    /// CSS selector (web only)
    Css(String),
    /// Platform widget class (e.g. `android.widget.TextView`)
    ClassName(String),
    /// UiAutomator selector expression (Android only)
    UiAutomator(String),
}

impl LocatorStrategy {
    /// Locate by stable identifier
    #[must_use]
    pub fn stable_id(id: impl Into<String>) -> Self {
        Self::StableId(id.into())
    }

    /// Locate by accessibility label
    #[must_use]
    pub fn accessibility_label(label: impl Into<String>) -> Self {
        Self::AccessibilityLabel(label.into())
    }

    /// Locate by structural path
    #[must_use]
    pub fn structural_path(path: impl Into<String>) -> Self {
        Self::StructuralPath(path.into())
    }

    /// Locate by CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Locate by widget class name
    #[must_use]
    pub fn class_name(class: impl Into<String>) -> Self {
        Self::ClassName(class.into())
    }

    /// Locate by UiAutomator selector
    #[must_use]
    pub fn ui_automator(selector: impl Into<String>) -> Self {
        Self::UiAutomator(selector.into())
    }

    /// Short name of the technique
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::StableId(_) => "id",
            Self::AccessibilityLabel(_) => "accessibility id",
            Self::StructuralPath(_) => "xpath",
            Self::Css(_) => "css",
            Self::ClassName(_) => "class name",
            Self::UiAutomator(_) => "uiautomator",
        }
    }

    /// Raw locator value
    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::StableId(v)
            | Self::AccessibilityLabel(v)
            | Self::StructuralPath(v)
            | Self::Css(v)
            | Self::ClassName(v)
            | Self::UiAutomator(v) => v,
        }
    }
}

impl fmt::Display for LocatorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind(), self.value())
    }
}

// =============================================================================
// LOGICAL ELEMENT
// =============================================================================

/// Named UI element with one or more ordered locator strategies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalElement {
    name: String,
    strategies: Vec<LocatorStrategy>,
}

impl LogicalElement {
    /// Create an element with its primary strategy
    #[must_use]
    pub fn new(name: impl Into<String>, primary: LocatorStrategy) -> Self {
        Self {
            name: name.into(),
            strategies: vec![primary],
        }
    }

    /// Append a fallback strategy, tried after all earlier ones
    #[must_use]
    pub fn or(mut self, fallback: LocatorStrategy) -> Self {
        self.strategies.push(fallback);
        self
    }

    /// Semantic name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Strategies in resolution order (never empty)
    #[must_use]
    pub fn strategies(&self) -> &[LocatorStrategy] {
        &self.strategies
    }

    /// First strategy tried
    #[must_use]
    pub fn primary(&self) -> &LocatorStrategy {
        &self.strategies[0]
    }
}

impl fmt::Display for LogicalElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

// =============================================================================
// INTERACTION MODE
// =============================================================================

/// What a resolved handle must satisfy before it is returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionMode {
    /// Attached to the UI tree
    Presence,
    /// Attached and displayed
    #[default]
    Visible,
    /// Displayed and enabled
    Clickable,
}

impl InteractionMode {
    /// Human-readable requirement
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Presence => "present",
            Self::Visible => "visible",
            Self::Clickable => "clickable",
        }
    }
}

impl fmt::Display for InteractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}
