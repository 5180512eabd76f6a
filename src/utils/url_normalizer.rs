//! URL normalization and sanitization utilities.
//!
//! Ensures consistent URL representation by normalizing hostnames, removing
//! fragments, and handling default ports.

use url::Url;

/// Errors that can occur during URL normalization.
#[derive(Debug, thiserror::Error)]
pub enum UrlNormalizationError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(String),

    #[error("Only HTTP and HTTPS protocols are allowed")]
    UnsupportedProtocol,

    #[error("Failed to normalize URL: {0}")]
    NormalizationFailed(String),
}

/// Normalizes a URL to a canonical form.
///
/// # Normalization Rules
///
/// 1. **Protocol**: Only HTTP and HTTPS are allowed; a bare host such as
///    `example.org/path` gets `https://` prepended
/// 2. **Hostname**: Converted to lowercase
/// 3. **Default ports**: Removed (80 for HTTP, 443 for HTTPS)
/// 4. **Fragments**: Removed (e.g., `#section`)
/// 5. **Query parameters**: Preserved as-is
/// 6. **Path**: Preserved with case sensitivity
///
/// # Errors
///
/// Returns [`UrlNormalizationError::InvalidFormat`] for malformed URLs.
/// Returns [`UrlNormalizationError::UnsupportedProtocol`] for non-HTTP(S) schemes.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(
///     normalize_url("EXAMPLE.org:443/Path#top").unwrap(),
///     "https://example.org/Path"
/// );
/// ```
pub fn normalize_url(input: &str) -> Result<String, UrlNormalizationError> {
    let input = input.trim();
    let mut url = match Url::parse(input) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) if looks_like_host(input) => {
            Url::parse(&format!("https://{}", input))
                .map_err(|e| UrlNormalizationError::InvalidFormat(e.to_string()))?
        }
        Err(e) => return Err(UrlNormalizationError::InvalidFormat(e.to_string())),
    };

    match url.scheme() {
        "http" | "https" => {}
        _ => return Err(UrlNormalizationError::UnsupportedProtocol),
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(UrlNormalizationError::InvalidFormat(
            "URL has no host".to_string(),
        ));
    }

    if let Some(host) = url.host_str() {
        let host_lowercase = host.to_ascii_lowercase();
        url.set_host(Some(&host_lowercase)).map_err(|_| {
            UrlNormalizationError::NormalizationFailed("Failed to set normalized host".to_string())
        })?;
    }

    url.set_fragment(None);

    let is_default_port = matches!(
        (url.scheme(), url.port()),
        ("http", Some(80)) | ("https", Some(443))
    );
    if is_default_port {
        url.set_port(None).map_err(|_| {
            UrlNormalizationError::NormalizationFailed("Failed to remove default port".to_string())
        })?;
    }

    Ok(url.to_string())
}

/// `example.org` or `example.org/path`, but not `not a url`.
fn looks_like_host(input: &str) -> bool {
    let host = input.split(['/', '?', '#']).next().unwrap_or_default();
    host.contains('.')
        && !host.starts_with('.')
        && !host.ends_with('.')
        && host
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | ':'))
}
