//! Derives a stable device label from a client's user-agent string.
//!
//! Labels are advisory. They key the "one active session per device" rule but
//! never gate authentication, so anything unrecognisable collapses to
//! [`UNKNOWN_DEVICE`] instead of failing.

use once_cell::sync::Lazy;
use regex::Regex;

pub const UNKNOWN_DEVICE: &str = "unknown";

const UNKNOWN_PART: &str = "unknown";

static OS_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    compile(&[
        (r"(?i)windows phone", "windows-phone"),
        (r"(?i)\b(iphone|ipad|ipod)\b|cpu (iphone )?os \d", "ios"),
        (r"(?i)\bandroid\b", "android"),
        (r"\bCrOS\b", "chromeos"),
        (r"(?i)\bwindows\b", "windows"),
        (r"(?i)mac os x|macintosh", "macos"),
        (r"(?i)\blinux\b|\bx11\b", "linux"),
    ])
});

// Order matters: Chromium derivatives also advertise Chrome and Safari.
static BROWSER_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    compile(&[
        (r"\b(Edg|Edge|EdgA|EdgiOS)/", "edge"),
        (r"\b(OPR|Opera)\b", "opera"),
        (r"\bSamsungBrowser/", "samsung"),
        (r"\bYaBrowser/", "yandex"),
        (r"\b(Firefox|FxiOS)/", "firefox"),
        (r"\b(Chrome|CriOS|Chromium)/", "chrome"),
        (r"\bSafari/", "safari"),
    ])
});

static TABLET_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bipad\b|\btablet\b").expect("valid tablet pattern"));
static MOBILE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bmobi|\biphone\b|\bipod\b|windows phone").expect("valid mobile pattern")
});
static ANDROID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bandroid\b").expect("valid android pattern"));

fn compile(patterns: &[(&str, &'static str)]) -> Vec<(Regex, &'static str)> {
    patterns
        .iter()
        .map(|(pattern, name)| (Regex::new(pattern).expect("valid device pattern"), *name))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Desktop,
    Mobile,
    Tablet,
}

/// Parsed view of a user-agent string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub os: Option<&'static str>,
    pub browser: Option<&'static str>,
    pub class: DeviceClass,
}

impl DeviceInfo {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();

        let os = first_match(&OS_PATTERNS, raw);
        let browser = first_match(&BROWSER_PATTERNS, raw);

        let class = if TABLET_PATTERN.is_match(raw) {
            DeviceClass::Tablet
        } else if MOBILE_PATTERN.is_match(raw) {
            DeviceClass::Mobile
        } else if ANDROID_PATTERN.is_match(raw) {
            // Android user agents without a "Mobile" token are tablets.
            DeviceClass::Tablet
        } else {
            DeviceClass::Desktop
        };

        Self { os, browser, class }
    }

    /// `<os>-<browser>`, suffixed with the device class for handhelds.
    pub fn label(&self) -> String {
        if self.os.is_none() && self.browser.is_none() {
            return UNKNOWN_DEVICE.to_string();
        }

        let mut label = format!(
            "{}-{}",
            self.os.unwrap_or(UNKNOWN_PART),
            self.browser.unwrap_or(UNKNOWN_PART)
        );
        match self.class {
            DeviceClass::Desktop => {}
            DeviceClass::Mobile => label.push_str("-mobile"),
            DeviceClass::Tablet => label.push_str("-tablet"),
        }
        label
    }
}

fn first_match(patterns: &[(Regex, &'static str)], raw: &str) -> Option<&'static str> {
    patterns
        .iter()
        .find(|(pattern, _)| pattern.is_match(raw))
        .map(|(_, name)| *name)
}

/// Maps raw device descriptors to labels. Deterministic and infallible.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceResolver;

impl DeviceResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, raw_descriptor: Option<&str>) -> String {
        match raw_descriptor.map(str::trim) {
            Some(raw) if !raw.is_empty() => DeviceInfo::parse(raw).label(),
            _ => UNKNOWN_DEVICE.to_string(),
        }
    }
}
