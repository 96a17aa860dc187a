//! Wikiprobe: Resilient Element Location for Wikipedia UI Tests
//!
//! A thin layer between test scenarios and a remote automation session
//! (a browser over WebDriver or the Android app over Appium). It absorbs
//! the everyday flakiness of a live UI: locators that drift, popups that
//! cover the target, content that arrives late and sessions that die.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Page objects (WikipediaPage, WikipediaAppPage)                 │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ElementResolver   OverlayDismisser   SettleWaiter              │
//! │  (fallback chain)  (best effort)      (bounded polls, delays)   │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  RetryingOperationRunner ── SessionFactory ──► Session          │
//! │                                     (RemoteSession, MockSession)│
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything is synchronous. Every wait goes through a [`Clock`], so
//! tests run on a [`FakeClock`] without sleeping.

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_frames))]

#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::doc_markdown
)]
pub mod capabilities;
pub mod clock;
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::doc_markdown
)]
pub mod config;
pub mod locator;
pub mod logging;
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
pub mod mock;
pub mod overlay;
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::doc_markdown
)]
pub mod pages;
#[allow(clippy::missing_errors_doc, clippy::doc_markdown)]
pub mod protocol;
#[cfg(feature = "remote")]
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::doc_markdown
)]
pub mod remote;
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::cast_possible_truncation
)]
pub mod resolver;
pub mod result;
#[allow(clippy::missing_errors_doc)]
pub mod retry;
pub mod session;
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation
)]
pub mod wait;

pub use clock::{system_clock, Clock, Deadline, FakeClock, SystemClock};
pub use config::{
    AndroidConfig, Browser, DriverConfig, LogFormat, LoggingConfig, RetrySettings, SuiteConfig,
    TimeoutProfile,
};
pub use locator::{InteractionMode, LocatorStrategy, LogicalElement};
pub use logging::{init_test_tracing, init_tracing};
pub use mock::{MockEffect, MockElement, MockSession, MockSessionFactory};
pub use overlay::{DismissAction, OverlayDismisser, OverlayRegistry, OverlaySignature};
pub use pages::{
    ArticleTab, ElementMap, PageContext, PageObject, SearchResult, WikipediaAppPage,
    WikipediaPage,
};
pub use protocol::Dialect;
#[cfg(feature = "remote")]
pub use remote::{RemoteSession, RemoteSessionFactory};
pub use resolver::{ElementResolver, ResolvedHandle, ResolverOptions};
pub use result::{DriverError, DriverResult, ProbeError, ProbeResult};
pub use retry::{RetryPolicy, RetryingOperationRunner};
pub use session::{ElementHandle, Session, SessionFactory};
pub use wait::{SettleDelays, SettleKind, SettleWaiter, WaitResult, WaitSpec};

/// Everything a test scenario usually needs
pub mod prelude {
    pub use super::clock::*;
    pub use super::config::*;
    pub use super::locator::*;
    pub use super::overlay::*;
    pub use super::pages::*;
    #[cfg(feature = "remote")]
    pub use super::remote::*;
    pub use super::resolver::*;
    pub use super::result::*;
    pub use super::retry::*;
    pub use super::session::*;
    pub use super::wait::*;
}
