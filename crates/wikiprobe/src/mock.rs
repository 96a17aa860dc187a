//! Scripted In-Memory Session
//!
//! [`MockSession`] stands in for a remote backend in unit and integration
//! tests. Elements are registered against the locator that finds them and
//! can appear late, hide, vanish or reveal other elements when clicked,
//! which is enough to replay onboarding dialogs, slow search results and
//! locale-dependent ids without a browser or emulator.
//!
//! Clones share state, so a test can keep a handle to a session it has
//! moved into a page object or the retrying runner.

use crate::locator::LocatorStrategy;
use crate::result::{DriverError, DriverResult, ProbeError, ProbeResult};
use crate::session::{ElementHandle, Session, SessionFactory};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Keystroke the backends interpret as RETURN
pub const ENTER_KEY: char = '\u{E006}';

/// PNG signature returned by mock screenshots
pub const MOCK_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

// =============================================================================
// ELEMENTS
// =============================================================================

/// State change triggered by clicking or submitting an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEffect {
    /// The element itself leaves the UI tree
    RemoveSelf,
    /// Every element found by the locator leaves the UI tree
    Remove(LocatorStrategy),
    /// Every element found by the locator becomes present and displayed
    Reveal(LocatorStrategy),
    /// The session navigates to a URL
    Navigate(String),
    /// The session title changes
    SetTitle(String),
}

/// Scripted element
#[derive(Debug, Clone)]
pub struct MockElement {
    locator: LocatorStrategy,
    parent: Option<LocatorStrategy>,
    present: bool,
    displayed: bool,
    enabled: bool,
    text: String,
    appear_after: u32,
    dismissed_by_back: bool,
    on_click: Vec<MockEffect>,
    on_enter: Vec<MockEffect>,
}

impl MockElement {
    /// Present, displayed and enabled element found by `locator`
    #[must_use]
    pub fn new(locator: LocatorStrategy) -> Self {
        Self {
            locator,
            parent: None,
            present: true,
            displayed: true,
            enabled: true,
            text: String::new(),
            appear_after: 0,
            dismissed_by_back: false,
            on_click: Vec::new(),
            on_enter: Vec::new(),
        }
    }

    /// Visible text
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Nest under the first element found by `parent`
    #[must_use]
    pub fn within(mut self, parent: LocatorStrategy) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Attached but not displayed
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.displayed = false;
        self
    }

    /// Displayed but not accepting input
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Not in the UI tree until revealed
    #[must_use]
    pub fn absent(mut self) -> Self {
        self.present = false;
        self
    }

    /// Miss the first `lookups` queries for this locator
    #[must_use]
    pub fn appear_after(mut self, lookups: u32) -> Self {
        self.appear_after = lookups;
        self
    }

    /// Leaves the tree when the session navigates back
    #[must_use]
    pub fn dismissed_by_back(mut self) -> Self {
        self.dismissed_by_back = true;
        self
    }

    /// Effect applied when clicked
    #[must_use]
    pub fn on_click(mut self, effect: MockEffect) -> Self {
        self.on_click.push(effect);
        self
    }

    /// Effect applied when RETURN is typed into it
    #[must_use]
    pub fn on_enter(mut self, effect: MockEffect) -> Self {
        self.on_enter.push(effect);
        self
    }
}

#[derive(Debug, Clone)]
struct Slot {
    id: String,
    element: MockElement,
    typed: String,
    removed: bool,
}

// =============================================================================
// SESSION
// =============================================================================

#[derive(Debug, Default)]
struct MockState {
    slots: Vec<Slot>,
    lookups: HashMap<LocatorStrategy, u32>,
    history: Vec<String>,
    url: String,
    title: String,
    back_stack: Vec<String>,
    ready_after: u32,
    readiness_polls: u32,
    script_results: Vec<(String, Value)>,
    failures: VecDeque<DriverError>,
    closed: bool,
    close_counter: Option<Arc<AtomicU32>>,
}

impl MockState {
    fn record(&mut self, entry: String) -> DriverResult<()> {
        self.history.push(entry);
        if self.closed {
            return Err(DriverError::InvalidSession("session closed".into()));
        }
        match self.failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn bump_lookup(&mut self, locator: &LocatorStrategy) -> u32 {
        let count = self.lookups.entry(locator.clone()).or_insert(0);
        *count += 1;
        *count
    }

    fn is_live(slot: &Slot, lookups: u32) -> bool {
        !slot.removed && slot.element.present && lookups > slot.element.appear_after
    }

    fn matching(&mut self, locator: &LocatorStrategy) -> Vec<ElementHandle> {
        let lookups = self.bump_lookup(locator);
        self.slots
            .iter()
            .filter(|slot| &slot.element.locator == locator && Self::is_live(slot, lookups))
            .map(|slot| ElementHandle::new(slot.id.clone()))
            .collect()
    }

    fn slot(&self, handle: &ElementHandle) -> DriverResult<&Slot> {
        self.slots
            .iter()
            .find(|slot| slot.id == handle.id() && !slot.removed && slot.element.present)
            .ok_or_else(|| DriverError::StaleElement(handle.id().to_string()))
    }

    fn slot_mut(&mut self, handle: &ElementHandle) -> DriverResult<&mut Slot> {
        self.slots
            .iter_mut()
            .find(|slot| slot.id == handle.id() && !slot.removed && slot.element.present)
            .ok_or_else(|| DriverError::StaleElement(handle.id().to_string()))
    }

    fn apply(&mut self, source_id: &str, effects: Vec<MockEffect>) {
        for effect in effects {
            match effect {
                MockEffect::RemoveSelf => {
                    for slot in self.slots.iter_mut().filter(|s| s.id == source_id) {
                        slot.removed = true;
                    }
                }
                MockEffect::Remove(locator) => {
                    for slot in self.slots.iter_mut().filter(|s| s.element.locator == locator) {
                        slot.removed = true;
                    }
                }
                MockEffect::Reveal(locator) => {
                    for slot in self.slots.iter_mut().filter(|s| s.element.locator == locator) {
                        slot.removed = false;
                        slot.element.present = true;
                        slot.element.displayed = true;
                        slot.element.appear_after = 0;
                    }
                }
                MockEffect::Navigate(url) => self.go(url),
                MockEffect::SetTitle(title) => self.title = title,
            }
        }
    }

    fn go(&mut self, url: String) {
        let previous = std::mem::replace(&mut self.url, url);
        if !previous.is_empty() {
            self.back_stack.push(previous);
        }
    }
}

/// In-memory [`Session`] with scripted elements
#[derive(Clone, Default)]
pub struct MockSession {
    state: Arc<Mutex<MockState>>,
}

impl fmt::Debug for MockSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("MockSession")
            .field("elements", &state.slots.len())
            .field("url", &state.url)
            .field("closed", &state.closed)
            .finish()
    }
}

impl MockSession {
    /// Empty session on a blank page
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an element, returning its handle id
    pub fn add(&self, element: MockElement) -> String {
        let mut state = self.lock();
        let id = format!("mock-{}", uuid::Uuid::new_v4());
        state.slots.push(Slot {
            id: id.clone(),
            element,
            typed: String::new(),
            removed: false,
        });
        id
    }

    /// Register an element, builder style
    #[must_use]
    pub fn with_element(self, element: MockElement) -> Self {
        self.add(element);
        self
    }

    /// Start on a URL
    #[must_use]
    pub fn with_url(self, url: impl Into<String>) -> Self {
        self.lock().url = url.into();
        self
    }

    /// Start with a page title
    #[must_use]
    pub fn with_title(self, title: impl Into<String>) -> Self {
        self.lock().title = title.into();
        self
    }

    /// Readiness flag stays false for the first `polls` queries
    #[must_use]
    pub fn ready_after(self, polls: u32) -> Self {
        self.lock().ready_after = polls;
        self
    }

    /// Value returned by scripts containing `fragment`
    #[must_use]
    pub fn with_script_result(self, fragment: impl Into<String>, value: Value) -> Self {
        self.lock().script_results.push((fragment.into(), value));
        self
    }

    /// Count `close` calls into a shared counter
    #[must_use]
    pub fn with_close_counter(self, counter: Arc<AtomicU32>) -> Self {
        self.lock().close_counter = Some(counter);
        self
    }

    /// Fail the next command with `error`
    pub fn fail_next(&self, error: DriverError) {
        self.lock().failures.push_back(error);
    }

    /// Remove every element found by `locator`
    pub fn remove(&self, locator: &LocatorStrategy) {
        self.lock()
            .apply("", vec![MockEffect::Remove(locator.clone())]);
    }

    /// Reveal every element found by `locator`
    pub fn reveal(&self, locator: &LocatorStrategy) {
        self.lock()
            .apply("", vec![MockEffect::Reveal(locator.clone())]);
    }

    /// Number of lookups issued for `locator`
    #[must_use]
    pub fn lookup_count(&self, locator: &LocatorStrategy) -> u32 {
        self.lock().lookups.get(locator).copied().unwrap_or(0)
    }

    /// Text typed into an element since its last clear
    #[must_use]
    pub fn typed_text(&self, id: &str) -> Option<String> {
        self.lock()
            .slots
            .iter()
            .find(|slot| slot.id == id)
            .map(|slot| slot.typed.clone())
    }

    /// Recorded commands, `method:argument`
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.lock().history.clone()
    }

    /// Whether any recorded command starts with `method`
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.lock().history.iter().any(|c| c.starts_with(method))
    }

    /// Number of recorded commands starting with `method`
    #[must_use]
    pub fn call_count(&self, method: &str) -> usize {
        self.lock()
            .history
            .iter()
            .filter(|c| c.starts_with(method))
            .count()
    }

    /// Whether `close` has been called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// URL the session is on
    #[must_use]
    pub fn url(&self) -> String {
        self.lock().url.clone()
    }
}

impl Session for MockSession {
    fn find_element(&self, locator: &LocatorStrategy) -> DriverResult<Option<ElementHandle>> {
        let mut state = self.lock();
        state.record(format!("find_element:{locator}"))?;
        Ok(state.matching(locator).into_iter().next())
    }

    fn find_elements(&self, locator: &LocatorStrategy) -> DriverResult<Vec<ElementHandle>> {
        let mut state = self.lock();
        state.record(format!("find_elements:{locator}"))?;
        Ok(state.matching(locator))
    }

    fn find_element_within(
        &self,
        parent: &ElementHandle,
        locator: &LocatorStrategy,
    ) -> DriverResult<Option<ElementHandle>> {
        let mut state = self.lock();
        state.record(format!("find_element_within:{parent}:{locator}"))?;
        let parent_locator = state.slot(parent)?.element.locator.clone();
        let lookups = state.bump_lookup(locator);
        Ok(state
            .slots
            .iter()
            .find(|slot| {
                &slot.element.locator == locator
                    && slot.element.parent.as_ref() == Some(&parent_locator)
                    && MockState::is_live(slot, lookups)
            })
            .map(|slot| ElementHandle::new(slot.id.clone())))
    }

    fn click(&self, element: &ElementHandle) -> DriverResult<()> {
        let mut state = self.lock();
        state.record(format!("click:{element}"))?;
        let slot = state.slot(element)?;
        if !slot.element.displayed || !slot.element.enabled {
            return Err(DriverError::NotInteractable(element.id().to_string()));
        }
        let effects = slot.element.on_click.clone();
        state.apply(element.id(), effects);
        Ok(())
    }

    fn send_keys(&self, element: &ElementHandle, text: &str) -> DriverResult<()> {
        let mut state = self.lock();
        state.record(format!("send_keys:{element}:{text}"))?;
        let slot = state.slot_mut(element)?;
        if !slot.element.enabled {
            return Err(DriverError::NotInteractable(element.id().to_string()));
        }
        slot.typed.extend(text.chars().filter(|c| *c != ENTER_KEY));
        if text.contains(ENTER_KEY) {
            let effects = slot.element.on_enter.clone();
            state.apply(element.id(), effects);
        }
        Ok(())
    }

    fn clear(&self, element: &ElementHandle) -> DriverResult<()> {
        let mut state = self.lock();
        state.record(format!("clear:{element}"))?;
        state.slot_mut(element)?.typed.clear();
        Ok(())
    }

    fn text(&self, element: &ElementHandle) -> DriverResult<String> {
        let mut state = self.lock();
        state.record(format!("text:{element}"))?;
        Ok(state.slot(element)?.element.text.clone())
    }

    fn is_displayed(&self, element: &ElementHandle) -> DriverResult<bool> {
        let mut state = self.lock();
        state.record(format!("is_displayed:{element}"))?;
        Ok(state.slot(element)?.element.displayed)
    }

    fn is_enabled(&self, element: &ElementHandle) -> DriverResult<bool> {
        let mut state = self.lock();
        state.record(format!("is_enabled:{element}"))?;
        Ok(state.slot(element)?.element.enabled)
    }

    fn navigate_to(&self, url: &str) -> DriverResult<()> {
        let mut state = self.lock();
        state.record(format!("navigate:{url}"))?;
        state.go(url.to_string());
        Ok(())
    }

    fn navigate_back(&self) -> DriverResult<()> {
        let mut state = self.lock();
        state.record("navigate_back".to_string())?;
        for slot in state.slots.iter_mut().filter(|s| s.element.dismissed_by_back) {
            slot.removed = true;
        }
        if let Some(previous) = state.back_stack.pop() {
            state.url = previous;
        }
        Ok(())
    }

    fn current_url(&self) -> DriverResult<String> {
        let mut state = self.lock();
        state.record("current_url".to_string())?;
        Ok(state.url.clone())
    }

    fn title(&self) -> DriverResult<String> {
        let mut state = self.lock();
        state.record("title".to_string())?;
        Ok(state.title.clone())
    }

    fn current_readiness(&self) -> DriverResult<bool> {
        let mut state = self.lock();
        state.record("current_readiness".to_string())?;
        state.readiness_polls += 1;
        Ok(state.readiness_polls > state.ready_after)
    }

    fn execute_script(&self, script: &str, _args: Vec<Value>) -> DriverResult<Value> {
        let mut state = self.lock();
        state.record(format!("execute_script:{script}"))?;
        Ok(state
            .script_results
            .iter()
            .find(|(fragment, _)| script.contains(fragment.as_str()))
            .map(|(_, value)| value.clone())
            .unwrap_or(Value::Null))
    }

    fn screenshot(&self) -> DriverResult<Vec<u8>> {
        let mut state = self.lock();
        state.record("screenshot".to_string())?;
        Ok(MOCK_PNG.to_vec())
    }

    fn close(&mut self) -> DriverResult<()> {
        let mut state = self.lock();
        state.history.push("close".to_string());
        if state.closed {
            return Err(DriverError::InvalidSession("session already closed".into()));
        }
        state.closed = true;
        if let Some(counter) = &state.close_counter {
            counter.fetch_add(1, Ordering::SeqCst);
        }
        match state.failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

// =============================================================================
// FACTORY
// =============================================================================

/// Counts session creations and closes
pub struct MockSessionFactory {
    setup: Box<dyn FnMut(u32) -> ProbeResult<MockSession>>,
    created: Arc<AtomicU32>,
    closed: Arc<AtomicU32>,
    sessions: Vec<MockSession>,
}

impl fmt::Debug for MockSessionFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockSessionFactory")
            .field("created", &self.created_count())
            .field("closed", &self.closed_count())
            .finish()
    }
}

impl MockSessionFactory {
    /// Factory producing empty sessions
    #[must_use]
    pub fn new() -> Self {
        Self::with_setup(|_| Ok(MockSession::new()))
    }

    /// Factory building each session with `setup(attempt)`, 1-based
    #[must_use]
    pub fn with_setup(setup: impl FnMut(u32) -> ProbeResult<MockSession> + 'static) -> Self {
        Self {
            setup: Box::new(setup),
            created: Arc::new(AtomicU32::new(0)),
            closed: Arc::new(AtomicU32::new(0)),
            sessions: Vec::new(),
        }
    }

    /// Factory whose first `failures` creations are refused
    #[must_use]
    pub fn failing_first(failures: u32) -> Self {
        Self::with_setup(move |attempt| {
            if attempt <= failures {
                Err(ProbeError::session_creation(format!(
                    "backend refused attempt {attempt}"
                )))
            } else {
                Ok(MockSession::new())
            }
        })
    }

    /// Times `create` was called
    #[must_use]
    pub fn created_count(&self) -> u32 {
        self.created.load(Ordering::SeqCst)
    }

    /// Times a produced session was closed
    #[must_use]
    pub fn closed_count(&self) -> u32 {
        self.closed.load(Ordering::SeqCst)
    }

    /// Sessions produced so far
    #[must_use]
    pub fn sessions(&self) -> &[MockSession] {
        &self.sessions
    }
}

impl Default for MockSessionFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionFactory for MockSessionFactory {
    type Session = MockSession;

    fn create(&mut self) -> ProbeResult<MockSession> {
        let attempt = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        let session = (self.setup)(attempt)?.with_close_counter(Arc::clone(&self.closed));
        self.sessions.push(session.clone());
        Ok(session)
    }
}
