//! Wikipedia desktop site.

use super::{absent_as_false, xpath_literal, ElementMap, PageContext, PageObject};
use crate::config::DEFAULT_BASE_URL;
use crate::locator::{InteractionMode, LocatorStrategy, LogicalElement};
use crate::overlay::{DismissAction, OverlayDismisser, OverlayRegistry, OverlaySignature};
use crate::resolver::ResolvedHandle;
use crate::result::{DriverResult, ProbeResult};
use crate::session::Session;
use crate::wait::{conditions, SettleKind};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, instrument, warn};

const PAGE_NAME: &str = "WikipediaPage";

/// Main page article title
pub const MAIN_PAGE_TITLE: &str = "Заглавная_страница";

const MAIN_PAGE_TITLE_ENCODED: &str =
    "%D0%97%D0%B0%D0%B3%D0%BB%D0%B0%D0%B2%D0%BD%D0%B0%D1%8F_%D1%81%D1%82%D1%80%D0%B0%D0%BD%D0%B8%D1%86%D0%B0";

const RANDOM_PAGE_PATH: &str = "/wiki/Special:Random";

/// WebDriver key code for Return
const RETURN_KEY: &str = "\u{E006}";

const SCROLL_INTO_VIEW_SCRIPT: &str = "arguments[0].scrollIntoView(true);";
const SCROLL_TO_BOTTOM_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight);";

// element names
const LOGO: &str = "wiki logo";
const HEADING: &str = "page heading";
const BODY_CONTENT: &str = "body content";
const SEARCH_INPUT: &str = "search input";
const SEARCH_SUGGESTIONS: &str = "search suggestions";
const SEARCH_RESULTS: &str = "search results";
const RESULTS_INFO: &str = "results info";
const RANDOM_PAGE_LINK: &str = "random page link";
const INFOBOX: &str = "infobox";
const TABLE_OF_CONTENTS: &str = "table of contents";
const CATEGORY_LINKS: &str = "category links";
const COORDINATES: &str = "coordinates";
const EXTERNAL_LINKS: &str = "external links";
const IMAGES: &str = "images";
const COOKIE_BANNER: &str = "cookie banner";

/// Article namespace tabs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleTab {
    /// The article itself
    Article,
    /// Talk page
    Discussion,
    /// Source editor
    Edit,
    /// Revision history
    History,
}

impl ArticleTab {
    /// Every tab
    pub const ALL: [Self; 4] = [Self::Article, Self::Discussion, Self::Edit, Self::History];

    /// Element name in the page map
    #[must_use]
    pub const fn element_name(&self) -> &'static str {
        match self {
            Self::Article => "article tab",
            Self::Discussion => "discussion tab",
            Self::Edit => "edit tab",
            Self::History => "history tab",
        }
    }

    const fn dom_id(&self) -> &'static str {
        match self {
            Self::Article => "ca-nstab-main",
            Self::Discussion => "ca-talk",
            Self::Edit => "ca-edit",
            Self::History => "ca-history",
        }
    }
}

/// Outcome of a search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Reported or counted number of results; 1 when a suggestion was followed
    pub results_count: usize,
    /// Heading of the page landed on
    pub article_title: String,
}

impl fmt::Display for SearchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} result(s), landed on '{}'",
            self.results_count, self.article_title
        )
    }
}

fn cookie_banner() -> LogicalElement {
    LogicalElement::new(
        COOKIE_BANNER,
        LocatorStrategy::css(".mw-cookiewarning-container, .cookie-banner"),
    )
}

fn web_elements() -> ElementMap {
    let css = LocatorStrategy::css;
    let id = LocatorStrategy::stable_id;
    let mut elements = vec![
        LogicalElement::new(LOGO, css("div#p-logo a")).or(css("a.mw-logo")),
        LogicalElement::new(HEADING, id("firstHeading")),
        LogicalElement::new(BODY_CONTENT, id("bodyContent")),
        LogicalElement::new(SEARCH_INPUT, id("searchInput")).or(css("input[name='search']")),
        LogicalElement::new(SEARCH_SUGGESTIONS, css(".suggestions-results a"))
            .or(css(".cdx-menu-item a")),
        LogicalElement::new(SEARCH_RESULTS, css(".mw-search-results li"))
            .or(css(".mw-search-result")),
        LogicalElement::new(RESULTS_INFO, css(".results-info")),
        LogicalElement::new(RANDOM_PAGE_LINK, id("n-randompage")),
        LogicalElement::new(INFOBOX, css(".infobox")),
        LogicalElement::new(TABLE_OF_CONTENTS, id("toc")).or(id("vector-toc")),
        LogicalElement::new(CATEGORY_LINKS, css("#catlinks ul li a")),
        LogicalElement::new(COORDINATES, css(".geo-dms, .geo-dec")),
        LogicalElement::new(EXTERNAL_LINKS, css("a.external")),
        LogicalElement::new(IMAGES, css(".image img, .thumb img")).or(css("figure img")),
        cookie_banner(),
    ];
    elements.extend(
        ArticleTab::ALL
            .iter()
            .map(|tab| LogicalElement::new(tab.element_name(), id(tab.dom_id()))),
    );
    elements.into_iter().collect()
}

/// A number with optional thousands separators
fn number_pattern() -> Result<&'static Regex, &'static regex::Error> {
    static NUMBER: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    NUMBER
        .get_or_init(|| Regex::new("\\d(?:[\\d,.\u{00A0}\u{202F}\u{2009} ]*\\d)?"))
        .as_ref()
}

/// Total from a "results 1 – 20 of 1 234" banner: the last number in it
fn total_from_results_info(text: &str) -> Option<usize> {
    let number = match number_pattern() {
        Ok(number) => number,
        Err(err) => {
            warn!(error = %err, "Invalid results number pattern");
            return None;
        }
    };
    let last = number.find_iter(text).last()?;
    let digits: String = last.as_str().chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

// =============================================================================
// PAGE
// =============================================================================

/// Desktop Wikipedia driven through a browser session
pub struct WikipediaPage<'s, S: Session + ?Sized> {
    session: &'s S,
    ctx: PageContext,
    base_url: String,
    elements: ElementMap,
    overlays: OverlayDismisser,
}

impl<S: Session + ?Sized> fmt::Debug for WikipediaPage<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(PAGE_NAME)
            .field("base_url", &self.base_url)
            .field("elements", &self.elements.len())
            .finish_non_exhaustive()
    }
}

impl<S: Session + ?Sized> PageObject for WikipediaPage<'_, S> {
    fn name(&self) -> &str {
        PAGE_NAME
    }

    fn elements(&self) -> &ElementMap {
        &self.elements
    }
}

impl<'s, S: Session + ?Sized> WikipediaPage<'s, S> {
    /// Page object for the default wiki
    #[must_use]
    pub fn new(session: &'s S, ctx: PageContext) -> Self {
        let overlays = ctx.dismisser(OverlayRegistry::new().with(OverlaySignature::new(
            cookie_banner(),
            DismissAction::ClickWithin(LocatorStrategy::css("button")),
        )));
        Self {
            session,
            ctx,
            base_url: DEFAULT_BASE_URL.to_string(),
            elements: web_elements(),
            overlays,
        }
    }

    /// Target another wiki
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Wiki root URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Main page URL
    #[must_use]
    pub fn main_page_url(&self) -> String {
        format!("{}/wiki/{MAIN_PAGE_TITLE}", self.base_url)
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

    fn wait_for_collection(&self, name: &str, timeout: Duration) -> ProbeResult<bool> {
        let element = self.element(name)?;
        let condition = conditions::collection_non_empty(self.session, self.ctx.resolver(), element);
        absent_as_false(self.ctx.waiter().wait_for(name, timeout, condition).map(drop))
    }

    fn count(&self, name: &str) -> ProbeResult<usize> {
        Ok(self
            .ctx
            .resolver()
            .find_all(self.session, self.element(name)?)?
            .len())
    }

    /// Body present, document ready, then the page settle delay
    ///
    /// A page that never finishes loading is logged and tolerated.
    fn wait_for_page_load(&self) -> ProbeResult<()> {
        let bound = self.ctx.timeouts().page_load();
        let loaded = self
            .resolve(BODY_CONTENT, bound, InteractionMode::Presence)
            .and_then(|_| {
                self.ctx
                    .waiter()
                    .wait_for(
                        "document ready",
                        bound,
                        conditions::readiness_complete(self.session),
                    )
                    .map(drop)
            });
        match loaded {
            Ok(()) => {}
            Err(err) if err.is_absence() => warn!(error = %err, "Page did not finish loading"),
            Err(err) => return Err(err),
        }
        self.ctx.waiter().settle(SettleKind::PageSettle);
        Ok(())
    }

    /// Close the cookie banner if it is showing
    pub fn dismiss_overlays(&self) -> usize {
        self.overlays.dismiss_all(self.session)
    }

    /// Load the main page and clear the cookie banner
    #[instrument(skip(self), fields(page = PAGE_NAME))]
    pub fn open_main_page(&self) -> ProbeResult<()> {
        info!(url = %self.main_page_url(), "Opening main page");
        self.session.navigate_to(&self.main_page_url())?;
        self.wait_for_page_load()?;
        self.dismiss_overlays();
        Ok(())
    }

    /// Logo and heading visible, and the URL is the main page
    pub fn is_main_page_loaded(&self) -> ProbeResult<bool> {
        let wait = self.ctx.timeouts().default_wait();
        if !self.is_present(LOGO, wait, InteractionMode::Visible)?
            || !self.is_present(HEADING, wait, InteractionMode::Visible)?
        {
            warn!("Main page did not load");
            return Ok(false);
        }
        let url = self.session.current_url()?;
        Ok(url.contains(MAIN_PAGE_TITLE) || url.contains(MAIN_PAGE_TITLE_ENCODED))
    }

    /// Search for `query`, optionally following the first suggestion
    ///
    /// Falls back to submitting the form when no suggestion shows up. The
    /// input is resolved again for the submit since the suggestion waits
    /// may have rebuilt it.
    #[instrument(skip(self), fields(page = PAGE_NAME))]
    pub fn search_article(&self, query: &str, use_suggestions: bool) -> ProbeResult<SearchResult> {
        info!("Searching for article");
        self.dismiss_overlays();
        let wait = self.ctx.timeouts().default_wait();
        let input = self.resolve(SEARCH_INPUT, wait, InteractionMode::Clickable)?;
        input.clear()?;
        input.send_keys(query)?;

        if use_suggestions && self.are_search_suggestions_available()? {
            if let Some(result) = self.select_first_suggestion()? {
                return Ok(result);
            }
        }

        info!("Submitting search form");
        self.resolve(SEARCH_INPUT, wait, InteractionMode::Clickable)?
            .send_keys(RETURN_KEY)?;
        self.wait_for_page_load()?;
        Ok(SearchResult {
            results_count: self.search_results_count()?,
            article_title: self.page_title()?,
        })
    }

    /// Whether the suggestion dropdown has entries
    pub fn are_search_suggestions_available(&self) -> ProbeResult<bool> {
        self.wait_for_collection(SEARCH_SUGGESTIONS, self.ctx.timeouts().overlay_probe())
    }

    /// Follow the first suggestion, `None` if there is none
    pub fn select_first_suggestion(&self) -> ProbeResult<Option<SearchResult>> {
        self.dismiss_overlays();
        let first = match self.resolve(
            SEARCH_SUGGESTIONS,
            self.ctx.timeouts().default_wait(),
            InteractionMode::Visible,
        ) {
            Ok(first) => first,
            Err(err) if err.is_absence() => {
                warn!("No search suggestions");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        info!(suggestion = %first.text()?, "Selecting suggestion");
        first.click()?;
        self.wait_for_page_load()?;
        Ok(Some(SearchResult {
            results_count: 1,
            article_title: self.page_title()?,
        }))
    }

    /// Open a random article, through the sidebar link if direct navigation fails
    #[instrument(skip(self), fields(page = PAGE_NAME))]
    pub fn go_to_random_page(&self) -> ProbeResult<()> {
        match self.session.navigate_to(&format!("{}{RANDOM_PAGE_PATH}", self.base_url)) {
            Ok(()) => {}
            Err(err) if err.is_session_fatal() => return Err(err.into()),
            Err(err) => {
                warn!(error = %err, "Direct navigation failed, using sidebar link");
                self.dismiss_overlays();
                self.resolve(
                    RANDOM_PAGE_LINK,
                    self.ctx.timeouts().default_wait(),
                    InteractionMode::Clickable,
                )?
                .click()?;
            }
        }
        self.wait_for_page_load()?;
        info!(title = %self.page_title()?, "Random page opened");
        Ok(())
    }

    /// Trimmed first heading, empty when the heading never shows
    pub fn page_title(&self) -> ProbeResult<String> {
        match self.resolve(
            HEADING,
            self.ctx.timeouts().default_wait(),
            InteractionMode::Visible,
        ) {
            Ok(heading) => Ok(heading.text()?.trim().to_string()),
            Err(err) if err.is_absence() => {
                warn!(error = %err, "Page heading not found");
                Ok(String::new())
            }
            Err(err) => Err(err),
        }
    }

    /// Whether the article has an infobox
    pub fn has_infobox(&self) -> ProbeResult<bool> {
        self.wait_for_collection(INFOBOX, self.ctx.timeouts().short_wait())
    }

    /// Infobox text, `None` without one
    pub fn infobox_content(&self) -> ProbeResult<Option<String>> {
        if !self.has_infobox()? {
            return Ok(None);
        }
        let infobox = self
            .ctx
            .resolver()
            .try_resolve(
                self.session,
                self.element(INFOBOX)?,
                Duration::ZERO,
                InteractionMode::Presence,
            )?;
        infobox.map(|i| i.text()).transpose()
    }

    /// Whether a table of contents is visible
    pub fn has_table_of_contents(&self) -> ProbeResult<bool> {
        self.is_present(
            TABLE_OF_CONTENTS,
            self.ctx.timeouts().default_wait(),
            InteractionMode::Visible,
        )
    }

    /// Click the contents entry containing `link_text`
    #[instrument(skip(self), fields(page = PAGE_NAME))]
    pub fn click_toc_link(&self, link_text: &str) -> ProbeResult<()> {
        self.dismiss_overlays();
        let literal = xpath_literal(link_text);
        let link = LogicalElement::new(
            format!("toc link '{link_text}'"),
            LocatorStrategy::structural_path(format!(
                "//div[@id='toc']//a[contains(., {literal})]"
            )),
        )
        .or(LocatorStrategy::structural_path(format!(
            "//*[@id='vector-toc']//a[contains(., {literal})]"
        )));
        self.ctx
            .resolver()
            .resolve(
                self.session,
                &link,
                self.ctx.timeouts().default_wait(),
                InteractionMode::Clickable,
            )?
            .click()?;
        self.ctx.waiter().settle(SettleKind::Scroll);
        Ok(())
    }

    /// Switch to an article tab and wait for it to load
    #[instrument(skip(self), fields(page = PAGE_NAME))]
    pub fn switch_to_tab(&self, tab: ArticleTab) -> ProbeResult<()> {
        info!("Switching tab");
        self.dismiss_overlays();
        self.resolve(
            tab.element_name(),
            self.ctx.timeouts().default_wait(),
            InteractionMode::Clickable,
        )?
        .click()?;
        self.wait_for_page_load()
    }

    /// Number of article images
    pub fn count_images(&self) -> ProbeResult<usize> {
        if !self.wait_for_collection(IMAGES, self.ctx.timeouts().short_wait())? {
            return Ok(0);
        }
        self.count(IMAGES)
    }

    /// Number of external links on the page
    pub fn count_external_links(&self) -> ProbeResult<usize> {
        self.count(EXTERNAL_LINKS)
    }

    /// Geographic coordinates text, `None` when the article has none
    pub fn coordinates(&self) -> ProbeResult<Option<String>> {
        let found = self.ctx.resolver().try_resolve(
            self.session,
            self.element(COORDINATES)?,
            Duration::ZERO,
            InteractionMode::Presence,
        )?;
        found.map(|c| c.text()).transpose()
    }

    /// Category names at the bottom of the article
    pub fn article_categories(&self) -> ProbeResult<Vec<String>> {
        let links = self
            .ctx
            .resolver()
            .find_all(self.session, self.element(CATEGORY_LINKS)?)?;
        let names = links
            .iter()
            .map(|link| self.session.text(link))
            .collect::<DriverResult<Vec<_>>>()?;
        Ok(names
            .into_iter()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect())
    }

    /// Total from the results banner, or the number of listed results
    pub fn search_results_count(&self) -> ProbeResult<usize> {
        let info = self.ctx.resolver().try_resolve(
            self.session,
            self.element(RESULTS_INFO)?,
            Duration::ZERO,
            InteractionMode::Presence,
        )?;
        if let Some(info) = info {
            if let Some(total) = total_from_results_info(&info.text()?) {
                return Ok(total);
            }
        }
        self.count(SEARCH_RESULTS)
    }

    /// Scroll `element` into view
    pub fn scroll_to(&self, element: &LogicalElement) -> ProbeResult<()> {
        let target = self.ctx.resolver().resolve(
            self.session,
            element,
            self.ctx.timeouts().default_wait(),
            InteractionMode::Presence,
        )?;
        self.session
            .execute_script(SCROLL_INTO_VIEW_SCRIPT, vec![target.handle().to_script_arg()])?;
        self.ctx.waiter().settle(SettleKind::Scroll);
        Ok(())
    }

    /// Scroll to the end of the document
    pub fn scroll_to_bottom(&self) -> ProbeResult<()> {
        self.session
            .execute_script(SCROLL_TO_BOTTOM_SCRIPT, Vec::new())?;
        self.ctx.waiter().settle(SettleKind::PageSettle);
        Ok(())
    }

    /// PNG of the viewport
    pub fn screenshot(&self) -> ProbeResult<Vec<u8>> {
        Ok(self.session.screenshot()?)
    }

    /// Whether the search box is visible and enabled
    pub fn is_search_input_available(&self) -> ProbeResult<bool> {
        self.is_present(
            SEARCH_INPUT,
            self.ctx.timeouts().default_wait(),
            InteractionMode::Clickable,
        )
    }
}
