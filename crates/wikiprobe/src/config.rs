//! Suite Configuration
//!
//! Everything a run needs to know about its target: which browser or
//! device, where the automation server lives, and how long to wait for
//! what. Values come from defaults, environment variables or a YAML file.

use crate::resolver::ResolverOptions;
use crate::result::{ProbeError, ProbeResult};
use crate::retry::{RetryPolicy, DEFAULT_BACKOFF_MS, DEFAULT_MAX_ATTEMPTS};
use crate::wait::SettleDelays;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default WebDriver server
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:4444";

/// Default Appium server
pub const DEFAULT_APPIUM_URL: &str = "http://127.0.0.1:4723";

/// Default wiki under test
pub const DEFAULT_BASE_URL: &str = "https://ru.wikipedia.org";

/// Default Android application package
pub const DEFAULT_APP_PACKAGE: &str = "org.wikipedia.alpha";

/// Default Android launch activity
pub const DEFAULT_APP_ACTIVITY: &str = "org.wikipedia.main.MainActivity";

fn parse_flag(key: &str, value: &str) -> ProbeResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ProbeError::config(format!(
            "{key}: expected a boolean, got '{other}'"
        ))),
    }
}

fn check_url(field: &str, url: &str) -> ProbeResult<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ProbeError::config(format!(
            "{field}: '{url}' is not an http(s) URL"
        )))
    }
}

// =============================================================================
// BROWSER
// =============================================================================

/// Supported desktop browsers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    /// Google Chrome / Chromium
    #[default]
    Chrome,
    /// Mozilla Firefox
    Firefox,
    /// Microsoft Edge
    Edge,
    /// Apple Safari
    Safari,
}

impl Browser {
    /// W3C `browserName`
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Chrome => "chrome",
            Self::Firefox => "firefox",
            Self::Edge => "MicrosoftEdge",
            Self::Safari => "safari",
        }
    }

    /// Whether the browser can run without a window
    #[must_use]
    pub const fn supports_headless(&self) -> bool {
        !matches!(self, Self::Safari)
    }
}

impl fmt::Display for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Browser {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chrome" | "chromium" => Ok(Self::Chrome),
            "firefox" | "ff" => Ok(Self::Firefox),
            "edge" | "microsoftedge" => Ok(Self::Edge),
            "safari" => Ok(Self::Safari),
            other => Err(ProbeError::config(format!("unknown browser '{other}'"))),
        }
    }
}

// =============================================================================
// DRIVER CONFIG
// =============================================================================

/// Desktop browser session settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Browser to launch
    pub browser: Browser,
    /// Run without a visible window
    pub headless: bool,
    /// WebDriver server URL
    pub server_url: String,
    /// Chrome device emulation profile (e.g. "Pixel 7")
    pub mobile_emulation: Option<String>,
    /// Window width in headless mode
    pub window_width: u32,
    /// Window height in headless mode
    pub window_height: u32,
    /// Backend implicit wait; must stay zero for per-strategy budgets to hold
    pub implicit_wait_ms: u64,
    /// Page load timeout
    pub page_load_timeout_ms: u64,
    /// Script timeout
    pub script_timeout_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chrome,
            headless: false,
            server_url: DEFAULT_WEBDRIVER_URL.to_string(),
            mobile_emulation: None,
            window_width: 1920,
            window_height: 1080,
            implicit_wait_ms: 0,
            page_load_timeout_ms: 30_000,
            script_timeout_ms: 15_000,
        }
    }
}

impl DriverConfig {
    /// Create default config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set browser
    #[must_use]
    pub fn with_browser(mut self, browser: Browser) -> Self {
        self.browser = browser;
        self
    }

    /// Set headless mode
    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set WebDriver server URL
    #[must_use]
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    /// Enable Chrome mobile emulation
    #[must_use]
    pub fn with_mobile_emulation(mut self, device: impl Into<String>) -> Self {
        self.mobile_emulation = Some(device.into());
        self
    }

    /// Set headless window size
    #[must_use]
    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.window_width = width;
        self.window_height = height;
        self
    }

    /// Defaults overridden by `WIKIPROBE_*` environment variables
    pub fn from_env() -> ProbeResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by values from `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ProbeResult<Self> {
        let mut config = Self::default();
        if let Some(browser) = lookup("WIKIPROBE_BROWSER") {
            config.browser = browser.parse()?;
        }
        if let Some(headless) = lookup("WIKIPROBE_HEADLESS") {
            config.headless = parse_flag("WIKIPROBE_HEADLESS", &headless)?;
        }
        if let Some(url) = lookup("WIKIPROBE_SERVER_URL") {
            config.server_url = url;
        }
        config.mobile_emulation = lookup("WIKIPROBE_MOBILE_EMULATION").filter(|d| !d.is_empty());
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no backend would accept
    pub fn validate(&self) -> ProbeResult<()> {
        check_url("driver.server_url", &self.server_url)?;
        if self.mobile_emulation.is_some() && self.browser != Browser::Chrome {
            return Err(ProbeError::config(format!(
                "mobile emulation requires chrome, not {}",
                self.browser
            )));
        }
        if self.window_width == 0 || self.window_height == 0 {
            return Err(ProbeError::config("window size must be non-zero"));
        }
        Ok(())
    }
}

// =============================================================================
// ANDROID CONFIG
// =============================================================================

/// Android app session settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AndroidConfig {
    /// Appium server URL
    pub server_url: String,
    /// Application package
    pub app_package: String,
    /// Launch activity
    pub app_activity: String,
    /// Device UDID
    pub device_udid: String,
    /// Device name
    pub device_name: String,
    /// Android version
    pub platform_version: String,
    /// Emulator AVD to boot, if any
    pub avd_name: Option<String>,
    /// Boot the emulator without a window
    pub headless_emulator: bool,
    /// Install from this APK instead of launching the installed package
    pub apk_path: Option<PathBuf>,
    /// Appium new-command timeout
    pub new_command_timeout_secs: u64,
    /// AVD launch timeout
    pub avd_launch_timeout_secs: u64,
    /// AVD ready timeout
    pub avd_ready_timeout_secs: u64,
}

impl Default for AndroidConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_APPIUM_URL.to_string(),
            app_package: DEFAULT_APP_PACKAGE.to_string(),
            app_activity: DEFAULT_APP_ACTIVITY.to_string(),
            device_udid: "emulator-5554".to_string(),
            device_name: "Android Emulator".to_string(),
            platform_version: "11.0".to_string(),
            avd_name: None,
            headless_emulator: false,
            apk_path: None,
            new_command_timeout_secs: 60,
            avd_launch_timeout_secs: 120,
            avd_ready_timeout_secs: 120,
        }
    }
}

impl AndroidConfig {
    /// Create default config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set device UDID
    #[must_use]
    pub fn with_udid(mut self, udid: impl Into<String>) -> Self {
        self.device_udid = udid.into();
        self
    }

    /// Install from an APK
    #[must_use]
    pub fn with_apk(mut self, path: impl Into<PathBuf>) -> Self {
        self.apk_path = Some(path.into());
        self
    }

    /// Defaults overridden by `ANDROID_*` / `APPIUM_*` environment variables
    pub fn from_env() -> ProbeResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by values from `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ProbeResult<Self> {
        let mut config = Self::default();
        if let Some(url) = lookup("APPIUM_SERVER_URL") {
            config.server_url = url;
        }
        if let Some(udid) = lookup("ANDROID_DEVICE_UDID") {
            config.device_udid = udid;
        }
        if let Some(name) = lookup("ANDROID_DEVICE_NAME") {
            config.device_name = name;
        }
        if let Some(version) = lookup("ANDROID_PLATFORM_VERSION") {
            config.platform_version = version;
        }
        config.avd_name = lookup("ANDROID_AVD_NAME").filter(|n| !n.is_empty());
        if let Some(headless) = lookup("ANDROID_AVD_HEADLESS") {
            config.headless_emulator = parse_flag("ANDROID_AVD_HEADLESS", &headless)?;
        }
        config.apk_path = lookup("ANDROID_APK_PATH")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        config.validate()?;
        Ok(config)
    }

    /// Reject settings Appium would refuse
    pub fn validate(&self) -> ProbeResult<()> {
        check_url("android.server_url", &self.server_url)?;
        if self.apk_path.is_none() && self.app_package.is_empty() {
            return Err(ProbeError::config(
                "android: either app_package or apk_path is required",
            ));
        }
        Ok(())
    }
}

// =============================================================================
// TIMEOUTS / RETRY / LOGGING
// =============================================================================

/// Wait bounds used by page objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutProfile {
    /// Main element wait
    pub default_wait_ms: u64,
    /// Quick probes for optional elements
    pub short_wait_ms: u64,
    /// Probe bound per overlay signature
    pub overlay_probe_ms: u64,
    /// Page load readiness bound
    pub page_load_ms: u64,
}

impl Default for TimeoutProfile {
    fn default() -> Self {
        Self {
            default_wait_ms: 10_000,
            short_wait_ms: 3_000,
            overlay_probe_ms: 2_000,
            page_load_ms: 30_000,
        }
    }
}

impl TimeoutProfile {
    /// Main element wait
    #[must_use]
    pub const fn default_wait(&self) -> Duration {
        Duration::from_millis(self.default_wait_ms)
    }

    /// Quick probe wait
    #[must_use]
    pub const fn short_wait(&self) -> Duration {
        Duration::from_millis(self.short_wait_ms)
    }

    /// Overlay probe wait
    #[must_use]
    pub const fn overlay_probe(&self) -> Duration {
        Duration::from_millis(self.overlay_probe_ms)
    }

    /// Page load wait
    #[must_use]
    pub const fn page_load(&self) -> Duration {
        Duration::from_millis(self.page_load_ms)
    }

    /// Every bound zero, for scripted sessions
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            default_wait_ms: 0,
            short_wait_ms: 0,
            overlay_probe_ms: 0,
            page_load_ms: 0,
        }
    }
}

/// Retry settings for session-level operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Maximum session creations
    pub max_attempts: u32,
    /// Pause between attempts
    pub backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_ms: DEFAULT_BACKOFF_MS,
        }
    }
}

impl RetrySettings {
    /// Build the runtime policy
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.backoff_ms))
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset
    pub filter: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

// =============================================================================
// SUITE CONFIG
// =============================================================================

/// Complete configuration for a test run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Wiki under test
    pub base_url: String,
    /// Browser session settings
    pub driver: DriverConfig,
    /// Android session settings
    pub android: AndroidConfig,
    /// Settle delay per interaction kind
    pub settle: SettleDelays,
    /// Wait bounds
    pub timeouts: TimeoutProfile,
    /// Resolver tuning
    pub resolver: ResolverOptions,
    /// Session retry settings
    pub retry: RetrySettings,
    /// Logging settings
    pub logging: LoggingConfig,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            driver: DriverConfig::default(),
            android: AndroidConfig::default(),
            settle: SettleDelays::default(),
            timeouts: TimeoutProfile::default(),
            resolver: ResolverOptions::default(),
            retry: RetrySettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl SuiteConfig {
    /// Parse and validate YAML
    pub fn from_yaml_str(yaml: &str) -> ProbeResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> ProbeResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> ProbeResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> ProbeResult<()> {
        check_url("base_url", &self.base_url)?;
        self.driver.validate()?;
        self.android.validate()?;
        if self.retry.max_attempts == 0 {
            return Err(ProbeError::config("retry.max_attempts must be at least 1"));
        }
        if self.resolver.poll_interval_ms == 0 {
            return Err(ProbeError::config("resolver.poll_interval_ms must be positive"));
        }
        Ok(())
    }
}
