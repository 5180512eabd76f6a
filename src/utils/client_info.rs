//! Client metadata extraction from HTTP request headers.

use axum::http::{HeaderMap, header};
use std::net::SocketAddr;

use crate::domain::click_event::ClientInfo;

/// Country code set by Cloudflare in front of the service.
pub const COUNTRY_HEADER: &str = "cf-ipcountry";

const FORWARDED_FOR: &str = "x-forwarded-for";
const REAL_IP: &str = "x-real-ip";

/// Builds [`ClientInfo`] for a request.
///
/// When `behind_proxy` is set the client IP is the first `X-Forwarded-For`
/// entry (or `X-Real-IP`), falling back to the peer address. Otherwise
/// forwarding headers are ignored, since any client can forge them.
pub fn client_info_from_request(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    behind_proxy: bool,
) -> ClientInfo {
    let forwarded = behind_proxy.then(|| forwarded_ip(headers)).flatten();
    let ip = forwarded.or_else(|| peer.map(|addr| addr.ip().to_string()));

    ClientInfo::new(
        ip,
        header_str(headers, header::USER_AGENT.as_str()),
        header_str(headers, header::REFERER.as_str()),
        header_str(headers, COUNTRY_HEADER).filter(|c| is_country_code(c)),
    )
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    header_str(headers, FORWARDED_FOR)
        .and_then(|value| value.split(',').next())
        .or_else(|| header_str(headers, REAL_IP))
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Cloudflare sends `XX` for unknown and `T1` for Tor.
fn is_country_code(value: &str) -> bool {
    value.len() == 2 && value != "XX" && value.chars().all(|c| c.is_ascii_alphanumeric())
}
