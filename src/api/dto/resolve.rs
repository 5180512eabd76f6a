//! Query parameters of the redirect endpoint.

use serde::Deserialize;

/// `GET /{code}?revalidate=...`
///
/// Kept as a raw string: anything that is not a boolean reads as `false`
/// instead of rejecting the redirect.
#[derive(Debug, Default, Deserialize)]
pub struct ResolveQuery {
    pub revalidate: Option<String>,
}

impl ResolveQuery {
    pub fn force_revalidate(&self) -> bool {
        self.revalidate
            .as_deref()
            .map(str::trim)
            .is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "t"))
    }
}
