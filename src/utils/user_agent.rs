//! Coarse User-Agent classification for click analytics.
//!
//! Only two buckets are extracted: the device class and the OS family. Anything
//! unrecognized maps to [`UNKNOWN`].

use regex::Regex;
use std::sync::LazyLock;

pub const UNKNOWN: &str = "unknown";

static BOT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)bot|crawl|spider|slurp|curl/|wget/|python-requests|headless")
        .expect("valid bot regex")
});
static TABLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)ipad|tablet|kindle|silk/|playbook").expect("valid regex"));
static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)iphone|ipod|mobi|windows phone|blackberry").expect("valid phone regex")
});
static ANDROID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)android").expect("valid android regex"));
static DESKTOP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)windows nt|macintosh|x11|cros|linux").expect("valid desktop regex")
});

/// Ordered OS matchers; the first hit wins.
static OS_FAMILIES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("ios", r"(?i)iphone|ipad|ipod|\bios\b"),
        ("android", r"(?i)android"),
        ("windows", r"(?i)windows"),
        ("chromeos", r"(?i)cros"),
        ("macos", r"(?i)mac os x|macintosh"),
        ("linux", r"(?i)linux|x11"),
    ]
    .into_iter()
    .map(|(family, pattern)| (family, Regex::new(pattern).expect("valid os regex")))
    .collect()
});

/// Classifies the device behind a User-Agent header.
///
/// Returns one of `bot`, `tablet`, `phone`, `desktop` or `unknown`.
pub fn device_class(user_agent: Option<&str>) -> &'static str {
    let Some(ua) = user_agent.filter(|ua| !ua.trim().is_empty()) else {
        return UNKNOWN;
    };

    if BOT.is_match(ua) {
        "bot"
    } else if TABLET.is_match(ua) {
        "tablet"
    } else if ANDROID.is_match(ua) {
        // Android tablets omit the "Mobile" token.
        if PHONE.is_match(ua) { "phone" } else { "tablet" }
    } else if PHONE.is_match(ua) {
        "phone"
    } else if DESKTOP.is_match(ua) {
        "desktop"
    } else {
        UNKNOWN
    }
}

/// Returns the OS family named by a User-Agent header.
pub fn os_family(user_agent: Option<&str>) -> &'static str {
    let Some(ua) = user_agent else {
        return UNKNOWN;
    };

    OS_FAMILIES
        .iter()
        .find(|(_, pattern)| pattern.is_match(ua))
        .map_or(UNKNOWN, |(family, _)| *family)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME_WINDOWS: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
    const SAFARI_IPAD: &str = "Mozilla/5.0 (iPad; CPU OS 16_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Mobile/15E148 Safari/604.1";
    const ANDROID_PHONE: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Mobile Safari/537.36";
    const ANDROID_TABLET: &str = "Mozilla/5.0 (Linux; Android 13; SM-X700) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
    const FIREFOX_MAC: &str =
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 14.1; rv:121.0) Gecko/20100101 Firefox/121.0";
    const FIREFOX_LINUX: &str =
        "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";
    const GOOGLEBOT: &str =
        "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

    #[test]
    fn test_device_class() {
        assert_eq!(device_class(Some(CHROME_WINDOWS)), "desktop");
        assert_eq!(device_class(Some(SAFARI_IPHONE)), "phone");
        assert_eq!(device_class(Some(SAFARI_IPAD)), "tablet");
        assert_eq!(device_class(Some(ANDROID_PHONE)), "phone");
        assert_eq!(device_class(Some(ANDROID_TABLET)), "tablet");
        assert_eq!(device_class(Some(FIREFOX_MAC)), "desktop");
        assert_eq!(device_class(Some(GOOGLEBOT)), "bot");
        assert_eq!(device_class(Some("curl/8.4.0")), "bot");
    }

    #[test]
    fn test_device_class_missing_header() {
        assert_eq!(device_class(None), UNKNOWN);
        assert_eq!(device_class(Some("   ")), UNKNOWN);
        assert_eq!(device_class(Some("SomethingElse/1.0")), UNKNOWN);
    }

    #[test]
    fn test_os_family() {
        assert_eq!(os_family(Some(CHROME_WINDOWS)), "windows");
        assert_eq!(os_family(Some(SAFARI_IPHONE)), "ios");
        assert_eq!(os_family(Some(SAFARI_IPAD)), "ios");
        assert_eq!(os_family(Some(ANDROID_PHONE)), "android");
        assert_eq!(os_family(Some(FIREFOX_MAC)), "macos");
        assert_eq!(os_family(Some(FIREFOX_LINUX)), "linux");
        assert_eq!(os_family(None), UNKNOWN);
    }
}
