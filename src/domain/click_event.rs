//! Request metadata captured for click analytics.

use chrono::{DateTime, Utc};

use crate::domain::entities::{ClickEvent, DIRECT_REFERRER};
use crate::utils::user_agent::{UNKNOWN, device_class, os_family};

/// Client details of a resolve request.
///
/// Extracted by the HTTP layer and carried to the background capture job, so
/// the redirect never waits on classification.
///
/// All fields are optional to handle missing headers gracefully.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub country: Option<String>,
}

impl ClientInfo {
    pub fn new(
        ip: Option<String>,
        user_agent: Option<&str>,
        referer: Option<&str>,
        country: Option<&str>,
    ) -> Self {
        Self {
            ip,
            user_agent: user_agent.map(|s| s.to_string()),
            referer: referer.map(|s| s.to_string()),
            country: country.map(|s| s.to_string()),
        }
    }

    /// Identity used for per-client quotas.
    pub fn identity(&self) -> &str {
        self.ip.as_deref().unwrap_or("anonymous")
    }
}

impl ClickEvent {
    /// Builds the analytics event for one resolution of `record_id`.
    pub fn capture(record_id: i64, client: &ClientInfo, timestamp: DateTime<Utc>) -> Self {
        let user_agent = client.user_agent.as_deref();

        Self {
            record_id,
            geo: non_empty(client.country.as_deref())
                .map(|c| c.to_ascii_uppercase())
                .unwrap_or_else(|| UNKNOWN.to_string()),
            device: device_class(user_agent).to_string(),
            os: os_family(user_agent).to_string(),
            referrer: non_empty(client.referer.as_deref())
                .unwrap_or(DIRECT_REFERRER)
                .to_string(),
            timestamp,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_full_client() {
        let client = ClientInfo::new(
            Some("203.0.113.9".to_string()),
            Some("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Mobile/15E148"),
            Some("https://news.ycombinator.com/"),
            Some("de"),
        );
        let now = Utc::now();

        let event = ClickEvent::capture(42, &client, now);

        assert_eq!(event.record_id, 42);
        assert_eq!(event.device, "phone");
        assert_eq!(event.os, "ios");
        assert_eq!(event.geo, "DE");
        assert_eq!(event.referrer, "https://news.ycombinator.com/");
        assert_eq!(event.timestamp, now);
    }

    #[test]
    fn test_capture_minimal_client() {
        let event = ClickEvent::capture(7, &ClientInfo::default(), Utc::now());

        assert_eq!(event.device, UNKNOWN);
        assert_eq!(event.os, UNKNOWN);
        assert_eq!(event.geo, UNKNOWN);
        assert_eq!(event.referrer, DIRECT_REFERRER);
    }

    #[test]
    fn test_blank_referer_is_direct() {
        let client = ClientInfo::new(None, None, Some("  "), None);
        let event = ClickEvent::capture(1, &client, Utc::now());

        assert_eq!(event.referrer, DIRECT_REFERRER);
    }

    #[test]
    fn test_identity_falls_back_to_anonymous() {
        assert_eq!(ClientInfo::default().identity(), "anonymous");

        let client = ClientInfo::new(Some("10.0.0.1".to_string()), None, None, None);
        assert_eq!(client.identity(), "10.0.0.1");
    }
}
