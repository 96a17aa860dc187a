//! Wikipedia Android app.

use super::{absent_as_false, ElementMap, PageContext, PageObject};
use crate::config::DEFAULT_APP_PACKAGE;
use crate::locator::{InteractionMode, LocatorStrategy, LogicalElement};
use crate::overlay::{OverlayDismisser, OverlayRegistry, OverlaySignature};
use crate::resolver::ResolvedHandle;
use crate::result::{DriverResult, ProbeError, ProbeResult};
use crate::session::{ElementHandle, Session};
use crate::wait::{conditions, SettleKind};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const PAGE_NAME: &str = "WikipediaAppPage";

const SEARCH_CONTAINER: &str = "search container";
const SEARCH_INPUT: &str = "search input";
const RESULT_TITLES: &str = "result titles";
const ARTICLE_HEADER: &str = "article header";
const TEXT_VIEWS: &str = "text views";
const FIRST_TEXT_VIEW: &str = "first text view";
const NAVIGATE_UP: &str = "navigate up";
const ONBOARDING_SKIP: &str = "onboarding skip";
const ANNOUNCEMENT_DISMISS: &str = "announcement dismiss";
const CLOSE_BUTTON: &str = "close button";
const DIALOG_CONTAINER: &str = "dialog container";

/// Popups in dismissal order
const OVERLAYS: [&str; 4] = [
    ONBOARDING_SKIP,
    ANNOUNCEMENT_DISMISS,
    CLOSE_BUTTON,
    DIALOG_CONTAINER,
];

fn app_elements(package: &str) -> ElementMap {
    let id = |suffix: &str| LocatorStrategy::stable_id(format!("{package}:id/{suffix}"));
    [
        LogicalElement::new(SEARCH_CONTAINER, id("search_container")),
        LogicalElement::new(SEARCH_INPUT, id("search_src_text"))
            .or(LocatorStrategy::accessibility_label("Search Wikipedia")),
        LogicalElement::new(RESULT_TITLES, id("page_list_item_title")),
        LogicalElement::new(ARTICLE_HEADER, id("view_article_header_title")),
        LogicalElement::new(
            TEXT_VIEWS,
            LocatorStrategy::class_name("android.widget.TextView"),
        ),
        LogicalElement::new(
            FIRST_TEXT_VIEW,
            LocatorStrategy::structural_path("//android.widget.TextView[contains(@text, '')][1]"),
        ),
        LogicalElement::new(
            NAVIGATE_UP,
            LocatorStrategy::ui_automator("new UiSelector().description(\"Navigate up\")"),
        )
        .or(LocatorStrategy::accessibility_label("Navigate up"))
        .or(LocatorStrategy::structural_path(
            "//android.widget.ImageButton[@content-desc='Navigate up']",
        )),
        LogicalElement::new(ONBOARDING_SKIP, id("fragment_onboarding_skip_button")),
        LogicalElement::new(ANNOUNCEMENT_DISMISS, id("view_announcement_action_negative")),
        LogicalElement::new(CLOSE_BUTTON, id("closeButton")),
        LogicalElement::new(DIALOG_CONTAINER, id("dialogContainer")),
    ]
    .into_iter()
    .collect()
}

fn app_overlays(elements: &ElementMap) -> OverlayRegistry {
    OVERLAYS
        .iter()
        .filter_map(|name| elements.get(name).cloned())
        .fold(OverlayRegistry::new(), |registry, element| {
            registry.with(OverlaySignature::click(element))
        })
}

/// Title heuristic for untagged text views
fn is_plausible_title(text: &str) -> bool {
    let len = text.chars().count();
    len > 3 && len < 100
}

/// Transient failures on a single element mean "skip it"
fn transient_as_none<T>(result: DriverResult<T>) -> ProbeResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_transient() => Ok(None),
        Err(err) => Err(err.into()),
    }
}

// =============================================================================
// PAGE
// =============================================================================

/// Wikipedia Android app driven through an Appium session
pub struct WikipediaAppPage<'s, S: Session + ?Sized> {
    session: &'s S,
    ctx: PageContext,
    package: String,
    elements: ElementMap,
    overlays: OverlayDismisser,
}

impl<S: Session + ?Sized> fmt::Debug for WikipediaAppPage<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(PAGE_NAME)
            .field("package", &self.package)
            .field("elements", &self.elements.len())
            .finish_non_exhaustive()
    }
}

impl<S: Session + ?Sized> PageObject for WikipediaAppPage<'_, S> {
    fn name(&self) -> &str {
        PAGE_NAME
    }

    fn elements(&self) -> &ElementMap {
        &self.elements
    }
}

impl<'s, S: Session + ?Sized> WikipediaAppPage<'s, S> {
    /// Page object for the default app build
    #[must_use]
    pub fn new(session: &'s S, ctx: PageContext) -> Self {
        Self::for_package(session, ctx, DEFAULT_APP_PACKAGE)
    }

    /// Page object for another app build (e.g. `org.wikipedia`)
    #[must_use]
    pub fn for_package(session: &'s S, ctx: PageContext, package: &str) -> Self {
        let elements = app_elements(package);
        let overlays = ctx.dismisser(app_overlays(&elements));
        Self {
            session,
            ctx,
            package: package.to_string(),
            elements,
            overlays,
        }
    }

    /// App package the locators are built for
    #[must_use]
    pub fn package(&self) -> &str {
        &self.package
    }

    fn resolve(
        &self,
        name: &str,
        timeout: Duration,
        mode: InteractionMode,
    ) -> ProbeResult<ResolvedHandle<'s, S>> {
        self.ctx
            .resolver()
            .resolve(self.session, self.element(name)?, timeout, mode)
    }

    fn is_present(&self, name: &str, timeout: Duration, mode: InteractionMode) -> ProbeResult<bool> {
        absent_as_false(self.resolve(name, timeout, mode).map(drop))
    }

    /// Close onboarding, announcements and dialogs that are showing
    pub fn dismiss_overlays(&self) -> usize {
        self.overlays.dismiss_all(self.session)
    }

    /// Search bar is usable once popups are out of the way
    #[instrument(skip(self), fields(page = PAGE_NAME))]
    pub fn is_main_screen_loaded(&self) -> ProbeResult<bool> {
        self.dismiss_overlays();
        let loaded = self.is_present(
            SEARCH_CONTAINER,
            self.ctx.timeouts().default_wait(),
            InteractionMode::Clickable,
        )?;
        if !loaded {
            warn!("Main screen did not load");
        }
        Ok(loaded)
    }

    /// Search for `query` and open the first result
    #[instrument(skip(self), fields(page = PAGE_NAME))]
    pub fn search_article(&self, query: &str) -> ProbeResult<()> {
        info!("Searching for article");
        self.dismiss_overlays();
        let wait = self.ctx.timeouts().default_wait();

        self.resolve(SEARCH_CONTAINER, wait, InteractionMode::Clickable)?
            .click()?;
        self.ctx.waiter().settle(SettleKind::Tap);

        self.resolve(SEARCH_INPUT, wait, InteractionMode::Visible)?
            .send_keys(query)?;
        self.ctx.waiter().settle(SettleKind::TextEntry);

        let first = self.nth_result(0)?;
        self.session.click(&first)?;
        self.wait_for_article_to_load()
    }

    /// `index`-th search result once at least `index + 1` are listed
    fn nth_result(&self, index: usize) -> ProbeResult<ElementHandle> {
        let titles = self.element(RESULT_TITLES)?;
        self.ctx.waiter().wait_for(
            &format!("search result #{index}"),
            self.ctx.timeouts().default_wait(),
            conditions::collection_len_at_least(
                self.session,
                self.ctx.resolver(),
                titles,
                index.saturating_add(1),
            ),
        )?;
        let results = self.ctx.resolver().find_all(self.session, titles)?;
        info!(count = results.len(), index, "Search results listed");
        results
            .into_iter()
            .nth(index)
            .ok_or_else(|| ProbeError::ElementNotFound {
                element: format!("{} #{index}", titles.name()),
                strategies_tried: titles.strategies().iter().map(ToString::to_string).collect(),
                last_error: None,
            })
    }

    /// Wait for any article text, then clear popups and settle
    ///
    /// An article that never shows text is logged and tolerated.
    fn wait_for_article_to_load(&self) -> ProbeResult<()> {
        let views = self.element(TEXT_VIEWS)?;
        let loaded = self.ctx.waiter().wait_for(
            "article text",
            self.ctx.timeouts().default_wait(),
            || self.any_displayed(views),
        );
        match loaded {
            Ok(_) => {}
            Err(err) if err.is_absence() => warn!(error = %err, "Article did not finish loading"),
            Err(err) => return Err(err),
        }
        self.dismiss_overlays();
        self.ctx.waiter().settle(SettleKind::ContentLoaded);
        Ok(())
    }

    fn any_displayed(&self, element: &LogicalElement) -> ProbeResult<bool> {
        for view in self.ctx.resolver().find_all(self.session, element)? {
            if transient_as_none(self.session.is_displayed(&view))? == Some(true) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Article title: header, then a plausible text view, then the first text view
    ///
    /// Empty when none of them yields text.
    #[instrument(skip(self), fields(page = PAGE_NAME))]
    pub fn article_title(&self) -> ProbeResult<String> {
        self.dismiss_overlays();

        match self.resolve(
            ARTICLE_HEADER,
            self.ctx.timeouts().short_wait(),
            InteractionMode::Visible,
        ) {
            Ok(header) => {
                let title = header.text()?.trim().to_string();
                if !title.is_empty() {
                    return Ok(title);
                }
            }
            Err(err) if err.is_absence() => debug!("No article header, scanning text views"),
            Err(err) => return Err(err),
        }

        for view in self
            .ctx
            .resolver()
            .find_all(self.session, self.element(TEXT_VIEWS)?)?
        {
            if transient_as_none(self.session.is_displayed(&view))? != Some(true) {
                continue;
            }
            if let Some(text) = transient_as_none(self.session.text(&view))? {
                if is_plausible_title(text.trim()) {
                    return Ok(text.trim().to_string());
                }
            }
        }

        let first = self.ctx.resolver().try_resolve(
            self.session,
            self.element(FIRST_TEXT_VIEW)?,
            Duration::ZERO,
            InteractionMode::Presence,
        )?;
        if let Some(first) = first {
            let text = first.text()?.trim().to_string();
            if !text.is_empty() {
                return Ok(text);
            }
        }

        warn!("Article title not found");
        Ok(String::new())
    }

    /// Back via the toolbar's navigate-up button, or the system back button
    #[instrument(skip(self), fields(page = PAGE_NAME))]
    pub fn go_back(&self) -> ProbeResult<()> {
        self.dismiss_overlays();

        let pressed = if self.is_navigate_up_displayed()? {
            match self
                .resolve(
                    NAVIGATE_UP,
                    self.ctx.timeouts().default_wait(),
                    InteractionMode::Clickable,
                )
                .and_then(|button| button.click())
            {
                Ok(()) => true,
                Err(err) if err.is_session_fatal() => return Err(err),
                Err(err) => {
                    warn!(error = %err, "Navigate-up failed");
                    false
                }
            }
        } else {
            false
        };

        if pressed {
            info!("Pressed navigate-up");
        } else {
            self.session.navigate_back()?;
            info!("Used system back");
        }
        self.ctx.waiter().settle(SettleKind::BackNavigation);
        self.dismiss_overlays();
        Ok(())
    }

    /// Number of listed search results, 0 if none show up
    pub fn search_results_count(&self) -> ProbeResult<usize> {
        let titles = self.element(RESULT_TITLES)?;
        let listed = absent_as_false(
            self.ctx
                .waiter()
                .wait_for(
                    "search results",
                    self.ctx.timeouts().default_wait(),
                    conditions::collection_non_empty(self.session, self.ctx.resolver(), titles),
                )
                .map(drop),
        )?;
        if !listed {
            return Ok(0);
        }
        Ok(self.ctx.resolver().find_all(self.session, titles)?.len())
    }

    /// Open the `index`-th search result (zero-based)
    #[instrument(skip(self), fields(page = PAGE_NAME))]
    pub fn select_search_result(&self, index: usize) -> ProbeResult<()> {
        let result = self.nth_result(index)?;
        self.session.click(&result)?;
        self.wait_for_article_to_load()
    }

    /// Clear the search field if it is showing
    pub fn clear_search_field(&self) -> ProbeResult<()> {
        let input = self.ctx.resolver().try_resolve(
            self.session,
            self.element(SEARCH_INPUT)?,
            self.ctx.timeouts().short_wait(),
            InteractionMode::Visible,
        )?;
        match input {
            Some(input) => {
                input.clear()?;
                self.ctx.waiter().settle(SettleKind::Tap);
            }
            None => debug!("Search field not showing"),
        }
        Ok(())
    }

    /// Whether the toolbar's navigate-up button is showing
    pub fn is_navigate_up_displayed(&self) -> ProbeResult<bool> {
        self.is_present(
            NAVIGATE_UP,
            self.ctx.timeouts().short_wait(),
            InteractionMode::Visible,
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::mock::{MockEffect, MockElement, MockSession};
    use crate::result::DriverError;
    use std::sync::Arc;

    fn app_id(suffix: &str) -> LocatorStrategy {
        LocatorStrategy::stable_id(format!("{DEFAULT_APP_PACKAGE}:id/{suffix}"))
    }

    fn text_view() -> LocatorStrategy {
        LocatorStrategy::class_name("android.widget.TextView")
    }

    fn navigate_up_selector() -> LocatorStrategy {
        LocatorStrategy::ui_automator("new UiSelector().description(\"Navigate up\")")
    }

    fn navigate_up_xpath() -> LocatorStrategy {
        LocatorStrategy::structural_path("//android.widget.ImageButton[@content-desc='Navigate up']")
    }

    fn page<'s>(
        session: &'s MockSession,
        clock: &Arc<FakeClock>,
    ) -> WikipediaAppPage<'s, MockSession> {
        WikipediaAppPage::new(session, PageContext::with_clock(clock.clone()))
    }

    fn result_title(text: &str) -> MockElement {
        MockElement::new(app_id("page_list_item_title"))
            .with_text(text)
            .on_click(MockEffect::Reveal(text_view()))
    }

    mod element_tests {
        use super::*;

        #[test]
        fn test_ids_follow_package() {
            let clock = FakeClock::shared();
            let session = MockSession::new();
            let p = WikipediaAppPage::for_package(
                &session,
                PageContext::with_clock(clock.clone()),
                "org.wikipedia",
            );
            assert_eq!(
                p.element(SEARCH_CONTAINER).unwrap().primary(),
                &LocatorStrategy::stable_id("org.wikipedia:id/search_container")
            );
            assert_eq!(p.package(), "org.wikipedia");
        }

        #[test]
        fn test_overlay_registry_order() {
            let overlays = app_overlays(&app_elements(DEFAULT_APP_PACKAGE));
            let names: Vec<&str> = overlays.iter().map(OverlaySignature::name).collect();
            assert_eq!(names, OVERLAYS.to_vec());
        }

        #[test]
        fn test_plausible_title_bounds() {
            assert!(!is_plausible_title("Rus"));
            assert!(is_plausible_title("Rust"));
            assert!(is_plausible_title(&"ж".repeat(99)));
            assert!(!is_plausible_title(&"ж".repeat(100)));
        }
    }

    mod main_screen_tests {
        use super::*;

        #[test]
        fn test_onboarding_skipped_before_checking_search() {
            let clock = FakeClock::shared();
            let session = MockSession::new()
                .with_element(
                    MockElement::new(app_id("fragment_onboarding_skip_button"))
                        .on_click(MockEffect::RemoveSelf),
                )
                .with_element(MockElement::new(app_id("search_container")));

            assert!(page(&session, &clock).is_main_screen_loaded().unwrap());
            assert_eq!(session.call_count("click:"), 1);
        }

        #[test]
        fn test_popups_dismissed_in_registry_order() {
            let clock = FakeClock::shared();
            let session = MockSession::new();
            let dialog = session.add(
                MockElement::new(app_id("dialogContainer")).on_click(MockEffect::RemoveSelf),
            );
            let announcement = session.add(
                MockElement::new(app_id("view_announcement_action_negative"))
                    .on_click(MockEffect::RemoveSelf),
            );
            let p = page(&session, &clock);

            assert_eq!(p.dismiss_overlays(), 2);
            let clicks: Vec<String> = session
                .history()
                .into_iter()
                .filter(|c| c.starts_with("click:"))
                .collect();
            assert_eq!(
                clicks,
                vec![format!("click:{announcement}"), format!("click:{dialog}")]
            );
            assert_eq!(p.dismiss_overlays(), 0);
        }

        #[test]
        fn test_missing_search_bar_is_not_loaded() {
            let clock = FakeClock::shared();
            let session = MockSession::new();
            assert!(!page(&session, &clock).is_main_screen_loaded().unwrap());
        }
    }

    mod search_tests {
        use super::*;

        fn search_session() -> MockSession {
            let input = app_id("search_src_text");
            MockSession::new()
                .with_element(
                    MockElement::new(app_id("search_container"))
                        .on_click(MockEffect::Reveal(input.clone())),
                )
                .with_element(MockElement::new(input).absent())
                .with_element(MockElement::new(text_view()).with_text("Rust").absent())
        }

        #[test]
        fn test_search_opens_first_result() {
            let clock = FakeClock::shared();
            let session = search_session();
            let first = session.add(result_title("Rust"));
            session.add(result_title("Rust (fungus)"));

            page(&session, &clock).search_article("Rust").unwrap();

            assert!(session.was_called(&format!("click:{first}")));
            assert!(session.was_called("send_keys:"));
        }

        #[test]
        fn test_search_without_results_times_out() {
            let clock = FakeClock::shared();
            let session = search_session();

            let err = page(&session, &clock).search_article("zzzz").unwrap_err();
            assert!(matches!(err, ProbeError::SettleTimeout { .. }));
        }

        #[test]
        fn test_search_input_found_by_label_fallback() {
            let clock = FakeClock::shared();
            let label = LocatorStrategy::accessibility_label("Search Wikipedia");
            let session = MockSession::new()
                .with_element(MockElement::new(app_id("search_container")))
                .with_element(MockElement::new(label.clone()))
                .with_element(result_title("Rust"))
                .with_element(MockElement::new(text_view()).absent());

            page(&session, &clock).search_article("Rust").unwrap();
            assert!(session.lookup_count(&label) >= 1);
        }

        #[test]
        fn test_select_second_result() {
            let clock = FakeClock::shared();
            let session = MockSession::new();
            session.add(result_title("Rust"));
            let second = session.add(result_title("Rust (fungus)"));
            session.add(result_title("Rust Belt"));

            let p = page(&session, &clock);
            assert_eq!(p.search_results_count().unwrap(), 3);
            p.select_search_result(1).unwrap();
            assert!(session.was_called(&format!("click:{second}")));
        }

        #[test]
        fn test_select_out_of_range_times_out() {
            let clock = FakeClock::shared();
            let session = MockSession::new();
            session.add(result_title("Rust"));

            let err = page(&session, &clock).select_search_result(5).unwrap_err();
            assert!(err.is_absence());
            assert!(!session.was_called("click:"));
        }

        #[test]
        fn test_select_last_possible_index_times_out() {
            let clock = FakeClock::shared();
            let session = MockSession::new();
            session.add(result_title("Rust"));

            let err = page(&session, &clock).select_search_result(usize::MAX).unwrap_err();
            assert!(err.is_absence());
            assert!(!session.was_called("click:"));
        }

        #[test]
        fn test_results_count_zero_when_none() {
            let clock = FakeClock::shared();
            let session = MockSession::new();
            assert_eq!(page(&session, &clock).search_results_count().unwrap(), 0);
            assert!(clock.elapsed() >= Duration::from_secs(10));
        }

        #[test]
        fn test_clear_search_field() {
            let clock = FakeClock::shared();
            let session = MockSession::new();
            let input = session.add(MockElement::new(app_id("search_src_text")));
            session
                .send_keys(&ElementHandle::new(input.clone()), "Rust")
                .unwrap();

            page(&session, &clock).clear_search_field().unwrap();
            assert_eq!(session.typed_text(&input).unwrap(), "");
        }
    }

    mod article_tests {
        use super::*;

        #[test]
        fn test_title_from_header() {
            let clock = FakeClock::shared();
            let session = MockSession::new().with_element(
                MockElement::new(app_id("view_article_header_title")).with_text(" Rust "),
            );
            assert_eq!(page(&session, &clock).article_title().unwrap(), "Rust");
        }

        #[test]
        fn test_title_from_plausible_text_view() {
            let clock = FakeClock::shared();
            let session = MockSession::new()
                .with_element(MockElement::new(text_view()).with_text("OK"))
                .with_element(MockElement::new(text_view()).with_text("Hidden title").hidden())
                .with_element(MockElement::new(text_view()).with_text("Rust (язык программирования)"));

            assert_eq!(
                page(&session, &clock).article_title().unwrap(),
                "Rust (язык программирования)"
            );
        }

        #[test]
        fn test_title_from_first_text_view_path() {
            let clock = FakeClock::shared();
            let session = MockSession::new().with_element(
                MockElement::new(LocatorStrategy::structural_path(
                    "//android.widget.TextView[contains(@text, '')][1]",
                ))
                .with_text("Go"),
            );
            assert_eq!(page(&session, &clock).article_title().unwrap(), "Go");
        }

        #[test]
        fn test_title_empty_when_nothing_found() {
            let clock = FakeClock::shared();
            let session = MockSession::new();
            assert_eq!(page(&session, &clock).article_title().unwrap(), "");
        }

        #[test]
        fn test_title_propagates_dead_session() {
            let clock = FakeClock::shared();
            let session = MockSession::new();
            let mut closer = session.clone();
            closer.close().unwrap();

            let err = page(&session, &clock).article_title().unwrap_err();
            assert!(matches!(err, ProbeError::Driver(DriverError::InvalidSession(_))));
        }
    }

    mod back_tests {
        use super::*;

        #[test]
        fn test_go_back_prefers_uiautomator_selector() {
            let clock = FakeClock::shared();
            let session = MockSession::new();
            let button = session.add(MockElement::new(navigate_up_selector()));
            session.add(MockElement::new(LocatorStrategy::accessibility_label("Navigate up")));

            page(&session, &clock).go_back().unwrap();

            assert!(session.was_called(&format!("click:{button}")));
            assert_eq!(session.call_count("click:"), 1);
            assert_eq!(
                session.lookup_count(&LocatorStrategy::accessibility_label("Navigate up")),
                0
            );
        }

        #[test]
        fn test_go_back_uses_navigate_up_xpath_fallback() {
            let clock = FakeClock::shared();
            let session = MockSession::new();
            let button = session.add(MockElement::new(navigate_up_xpath()));

            page(&session, &clock).go_back().unwrap();

            assert!(session.was_called(&format!("click:{button}")));
            assert!(!session.was_called("navigate_back"));
        }

        #[test]
        fn test_go_back_uses_system_back_without_button() {
            let clock = FakeClock::shared();
            let session = MockSession::new();

            let p = page(&session, &clock);
            assert!(!p.is_navigate_up_displayed().unwrap());
            p.go_back().unwrap();
            assert!(session.was_called("navigate_back"));
        }

        #[test]
        fn test_go_back_falls_back_when_button_not_clickable() {
            let clock = FakeClock::shared();
            let session = MockSession::new()
                .with_element(MockElement::new(LocatorStrategy::accessibility_label("Navigate up")).disabled());

            page(&session, &clock).go_back().unwrap();
            assert!(session.was_called("navigate_back"));
        }
    }
}
