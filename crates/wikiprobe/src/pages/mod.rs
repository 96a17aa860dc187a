//! Page Objects
//!
//! Wikipedia screens expressed purely through the resilient primitives:
//! every element is a [`LogicalElement`] in an immutable [`ElementMap`],
//! every wait goes through the [`SettleWaiter`], and popups are handled by
//! an [`OverlayDismisser`].
//!
//! ## Toyota Way Application
//!
//! - **Muda**: Locators are declared once per page, never rebuilt per call
//! - **Genchi Genbutsu**: Page objects mirror what the user actually sees

mod app;
mod web;

pub use app::WikipediaAppPage;
pub use web::{ArticleTab, SearchResult, WikipediaPage};

use crate::clock::{system_clock, Clock};
use crate::config::{SuiteConfig, TimeoutProfile};
use crate::locator::LogicalElement;
use crate::overlay::{OverlayDismisser, OverlayRegistry};
use crate::resolver::ElementResolver;
use crate::result::{ProbeError, ProbeResult};
use crate::wait::SettleWaiter;
use std::sync::Arc;

/// A screen or component with named elements
pub trait PageObject {
    /// Page name for logging
    fn name(&self) -> &str;

    /// Every element the page knows about
    fn elements(&self) -> &ElementMap;

    /// Element by name
    fn element(&self, name: &str) -> ProbeResult<&LogicalElement> {
        self.elements().get(name).ok_or_else(|| {
            ProbeError::config(format!("page '{}' has no element '{name}'", self.name()))
        })
    }
}

// =============================================================================
// ELEMENT MAP
// =============================================================================

/// Ordered, immutable set of logical elements keyed by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementMap {
    elements: Vec<LogicalElement>,
}

impl ElementMap {
    /// Element by name; the first declaration wins
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&LogicalElement> {
        self.elements.iter().find(|e| e.name() == name)
    }

    /// Whether `name` is declared
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Elements in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &LogicalElement> {
        self.elements.iter()
    }

    /// Declared names in order
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.elements.iter().map(LogicalElement::name).collect()
    }

    /// Number of elements
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the map is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl FromIterator<LogicalElement> for ElementMap {
    fn from_iter<I: IntoIterator<Item = LogicalElement>>(iter: I) -> Self {
        Self {
            elements: iter.into_iter().collect(),
        }
    }
}

// =============================================================================
// CONTEXT
// =============================================================================

/// Resolver, waiter and wait bounds shared by page objects
#[derive(Debug, Clone)]
pub struct PageContext {
    resolver: ElementResolver,
    waiter: SettleWaiter,
    timeouts: TimeoutProfile,
}

impl Default for PageContext {
    fn default() -> Self {
        Self::with_clock(system_clock())
    }
}

impl PageContext {
    /// Default settings on an explicit clock
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            resolver: ElementResolver::with_clock(clock.clone()),
            waiter: SettleWaiter::with_clock(clock),
            timeouts: TimeoutProfile::default(),
        }
    }

    /// Settings from a suite config
    #[must_use]
    pub fn from_config(config: &SuiteConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            resolver: ElementResolver::with_clock(clock.clone()).with_options(config.resolver),
            waiter: SettleWaiter::with_clock(clock).with_delays(config.settle),
            timeouts: config.timeouts,
        }
    }

    /// Replace the wait bounds
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: TimeoutProfile) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Replace the waiter
    #[must_use]
    pub fn with_waiter(mut self, waiter: SettleWaiter) -> Self {
        self.waiter = waiter;
        self
    }

    /// Element resolver
    #[must_use]
    pub const fn resolver(&self) -> &ElementResolver {
        &self.resolver
    }

    /// Settle waiter
    #[must_use]
    pub const fn waiter(&self) -> &SettleWaiter {
        &self.waiter
    }

    /// Wait bounds
    #[must_use]
    pub const fn timeouts(&self) -> &TimeoutProfile {
        &self.timeouts
    }

    /// Overlay dismisser over `registry` using this context
    #[must_use]
    pub fn dismisser(&self, registry: OverlayRegistry) -> OverlayDismisser {
        OverlayDismisser::new(self.resolver.clone(), self.waiter.clone(), registry)
            .with_probe_timeout(self.timeouts.overlay_probe())
    }
}

/// Map absence to `false`, keep every other failure
pub(crate) fn absent_as_false(result: ProbeResult<()>) -> ProbeResult<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(err) if err.is_absence() => Ok(false),
        Err(err) => Err(err),
    }
}

/// Quote `text` as an XPath string literal
pub(crate) fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        format!("'{text}'")
    } else if !text.contains('"') {
        format!("\"{text}\"")
    } else {
        let parts: Vec<String> = text.split('\'').map(|p| format!("'{p}'")).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::locator::LocatorStrategy;
    use crate::result::DriverError;
    use crate::wait::SettleDelays;
    use std::time::Duration;

    struct SamplePage {
        elements: ElementMap,
    }

    impl PageObject for SamplePage {
        fn name(&self) -> &str {
            "sample"
        }

        fn elements(&self) -> &ElementMap {
            &self.elements
        }
    }

    fn sample() -> SamplePage {
        SamplePage {
            elements: [
                LogicalElement::new("heading", LocatorStrategy::stable_id("firstHeading")),
                LogicalElement::new("search", LocatorStrategy::stable_id("searchInput"))
                    .or(LocatorStrategy::css("input[name='search']")),
            ]
            .into_iter()
            .collect(),
        }
    }

    mod element_map_tests {
        use super::*;

        #[test]
        fn test_preserves_declaration_order() {
            let page = sample();
            assert_eq!(page.elements().names(), vec!["heading", "search"]);
            assert_eq!(page.elements().len(), 2);
        }

        #[test]
        fn test_lookup_by_name() {
            let page = sample();
            assert_eq!(page.element("search").unwrap().strategies().len(), 2);
            assert!(page.elements().contains("heading"));
        }

        #[test]
        fn test_unknown_name_is_config_error() {
            let page = sample();
            let err = page.element("logo").unwrap_err();
            assert!(matches!(err, ProbeError::Config { .. }));
            assert!(err.to_string().contains("sample"));
        }
    }

    mod context_tests {
        use super::*;
        use crate::clock::FakeClock;
        use crate::wait::SettleKind;

        #[test]
        fn test_from_config_carries_settings() {
            let mut config = SuiteConfig::default();
            config.settle = SettleDelays::none().with_delay(SettleKind::Tap, 42);
            config.timeouts.overlay_probe_ms = 123;
            let ctx = PageContext::from_config(&config, FakeClock::shared());

            assert_eq!(ctx.waiter().delays().delay_for(SettleKind::Tap), Duration::from_millis(42));
            assert_eq!(ctx.timeouts().overlay_probe(), Duration::from_millis(123));
            assert_eq!(*ctx.resolver().options(), config.resolver);
        }
    }

    mod helper_tests {
        use super::*;

        #[test]
        fn test_absent_as_false() {
            assert!(absent_as_false(Ok(())).unwrap());
            let missing = ProbeError::ElementNotFound {
                element: "infobox".into(),
                strategies_tried: vec![],
                last_error: None,
            };
            assert!(!absent_as_false(Err(missing)).unwrap());
            assert!(absent_as_false(Err(DriverError::InvalidSession("gone".into()).into())).is_err());
        }

        #[test]
        fn test_xpath_literal_quoting() {
            assert_eq!(xpath_literal("История"), "'История'");
            assert_eq!(xpath_literal("O'Brien"), "\"O'Brien\"");
            assert_eq!(
                xpath_literal("a'b\"c"),
                "concat('a', \"'\", 'b\"c')"
            );
        }
    }
}
