//! Session Capabilities
//!
//! Builds the W3C `New Session` payload for a desktop browser or the
//! Android app. Pure functions over the config types so the exact JSON a
//! backend receives can be asserted without one.

use crate::config::{AndroidConfig, Browser, DriverConfig};
use serde_json::{json, Map, Value};

/// Chrome/Edge switches applied to every session
const CHROMIUM_ARGS: &[&str] = &[
    "--start-maximized",
    "--disable-notifications",
    "--remote-allow-origins=*",
    "--disable-dev-shm-usage",
    "--no-sandbox",
];

fn w3c(always_match: Value) -> Value {
    json!({ "capabilities": { "alwaysMatch": always_match } })
}

fn chromium_args(config: &DriverConfig) -> Vec<String> {
    let mut args: Vec<String> = CHROMIUM_ARGS.iter().map(|a| (*a).to_string()).collect();
    if config.headless {
        args.push("--headless=new".to_string());
        args.push(format!(
            "--window-size={},{}",
            config.window_width, config.window_height
        ));
    }
    args
}

/// `New Session` payload for a desktop browser
#[must_use]
pub fn browser_capabilities(config: &DriverConfig) -> Value {
    let mut caps = Map::new();
    caps.insert("browserName".into(), json!(config.browser.name()));
    caps.insert("pageLoadStrategy".into(), json!("normal"));
    caps.insert(
        "timeouts".into(),
        json!({
            "implicit": config.implicit_wait_ms,
            "pageLoad": config.page_load_timeout_ms,
            "script": config.script_timeout_ms,
        }),
    );

    match config.browser {
        Browser::Chrome => {
            let mut options = json!({
                "args": chromium_args(config),
                "excludeSwitches": ["enable-automation"],
                "useAutomationExtension": false,
            });
            if let Some(device) = &config.mobile_emulation {
                options["mobileEmulation"] = json!({ "deviceName": device });
            }
            caps.insert("goog:chromeOptions".into(), options);
        }
        Browser::Edge => {
            caps.insert(
                "ms:edgeOptions".into(),
                json!({ "args": chromium_args(config) }),
            );
        }
        Browser::Firefox => {
            let args: Vec<&str> = if config.headless {
                vec!["-headless"]
            } else {
                Vec::new()
            };
            caps.insert(
                "moz:firefoxOptions".into(),
                json!({
                    "args": args,
                    "prefs": {
                        "dom.webnotifications.enabled": false,
                        "browser.cache.disk.enable": false,
                        "browser.cache.memory.enable": false,
                    },
                }),
            );
        }
        Browser::Safari => {}
    }

    w3c(Value::Object(caps))
}

/// `New Session` payload for the Android app through UiAutomator2
#[must_use]
pub fn android_capabilities(config: &AndroidConfig) -> Value {
    let mut caps = Map::new();
    let mut set = |key: &str, value: Value| {
        caps.insert(key.to_string(), value);
    };

    set("platformName", json!("Android"));
    set("appium:automationName", json!("UiAutomator2"));
    set("appium:udid", json!(config.device_udid));
    set("appium:deviceName", json!(config.device_name));
    set("appium:autoGrantPermissions", json!(true));
    set("appium:noReset", json!(false));
    set("appium:newCommandTimeout", json!(config.new_command_timeout_secs));

    match &config.apk_path {
        Some(apk) => {
            set("appium:app", json!(apk.to_string_lossy()));
            set("appium:fullReset", json!(true));
        }
        None => {
            set("appium:appPackage", json!(config.app_package));
            set("appium:appActivity", json!(config.app_activity));
            set("appium:fullReset", json!(false));
            set("appium:platformVersion", json!(config.platform_version));
        }
    }

    if let Some(avd) = &config.avd_name {
        set("appium:avd", json!(avd));
        set(
            "appium:avdLaunchTimeout",
            json!(config.avd_launch_timeout_secs * 1_000),
        );
        set(
            "appium:avdReadyTimeout",
            json!(config.avd_ready_timeout_secs * 1_000),
        );
        set("appium:isHeadless", json!(config.headless_emulator));
    }

    set("appium:unicodeKeyboard", json!(true));
    set("appium:resetKeyboard", json!(true));
    set("appium:autoAcceptAlerts", json!(true));
    set("appium:autoDismissAlerts", json!(true));

    w3c(Value::Object(caps))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn always(caps: &Value) -> &Value {
        &caps["capabilities"]["alwaysMatch"]
    }

    #[test]
    fn test_chrome_headless_adds_window_size() {
        let caps = browser_capabilities(&DriverConfig::new().headless(true));
        let args = always(&caps)["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(args.contains(&json!("--headless=new")));
        assert!(args.contains(&json!("--window-size=1920,1080")));
        assert!(args.contains(&json!("--no-sandbox")));
        assert_eq!(always(&caps)["browserName"], "chrome");
    }

    #[test]
    fn test_chrome_mobile_emulation() {
        let caps = browser_capabilities(&DriverConfig::new().with_mobile_emulation("Pixel 7"));
        assert_eq!(
            always(&caps)["goog:chromeOptions"]["mobileEmulation"]["deviceName"],
            "Pixel 7"
        );
    }

    #[test]
    fn test_timeouts_are_w3c_millis() {
        let caps = browser_capabilities(&DriverConfig::default());
        let timeouts = &always(&caps)["timeouts"];
        assert_eq!(timeouts["implicit"], 0);
        assert_eq!(timeouts["pageLoad"], 30_000);
        assert_eq!(timeouts["script"], 15_000);
    }

    #[test]
    fn test_firefox_prefs_and_headless() {
        let caps = browser_capabilities(
            &DriverConfig::new()
                .with_browser(Browser::Firefox)
                .headless(true),
        );
        let options = &always(&caps)["moz:firefoxOptions"];
        assert_eq!(options["args"], json!(["-headless"]));
        assert_eq!(options["prefs"]["dom.webnotifications.enabled"], false);
    }

    #[test]
    fn test_safari_has_no_vendor_options() {
        let caps = browser_capabilities(&DriverConfig::new().with_browser(Browser::Safari));
        let obj = always(&caps).as_object().unwrap();
        assert!(!obj.keys().any(|k| k.contains(':')));
    }

    #[test]
    fn test_android_installed_package() {
        let caps = android_capabilities(&AndroidConfig::default());
        let a = always(&caps);
        assert_eq!(a["platformName"], "Android");
        assert_eq!(a["appium:automationName"], "UiAutomator2");
        assert_eq!(a["appium:appPackage"], "org.wikipedia.alpha");
        assert_eq!(a["appium:appActivity"], "org.wikipedia.main.MainActivity");
        assert_eq!(a["appium:udid"], "emulator-5554");
        assert!(a.get("appium:app").is_none());
        assert!(a.get("appium:avd").is_none());
    }

    #[test]
    fn test_android_apk_install_resets() {
        let caps = android_capabilities(&AndroidConfig::default().with_apk("/tmp/wiki.apk"));
        let a = always(&caps);
        assert_eq!(a["appium:app"], "/tmp/wiki.apk");
        assert_eq!(a["appium:fullReset"], true);
        assert!(a.get("appium:appPackage").is_none());
    }

    #[test]
    fn test_android_avd_timeouts_in_millis() {
        let mut config = AndroidConfig::default();
        config.avd_name = Some("Pixel_API_30".into());
        config.headless_emulator = true;
        let caps = android_capabilities(&config);
        let a = always(&caps);
        assert_eq!(a["appium:avd"], "Pixel_API_30");
        assert_eq!(a["appium:avdLaunchTimeout"], 120_000);
        assert_eq!(a["appium:isHeadless"], true);
    }
}
