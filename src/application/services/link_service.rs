//! Short link management: creation, updates and deletion.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::json;
use tracing::info;

use crate::domain::entities::{LimitPolicy, Link, LinkPatch, NewLink};
use crate::domain::repositories::LinkRepository;
use crate::error::AppError;
use crate::infrastructure::cache::LinkCache;
use crate::utils::code_generator::{generate_code, is_reserved, validate_custom_code};
use crate::utils::url_normalizer::normalize_url;

use super::rate_limiter::QuotaLimiter;

/// Expiry applied when the caller does not pick one.
pub const DEFAULT_EXPIRY_HOURS: i64 = 48;

/// Quota scope for link writes.
pub const SHORTEN_SCOPE: &str = "shorten";

const SHORTEN_ACTION: &str = "Shorten URL";

/// Input for [`LinkService::create_link`].
#[derive(Debug, Clone, Default)]
pub struct CreateLink {
    pub destination: String,
    pub code: Option<String>,
    pub owner_id: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Service for creating and changing short links.
///
/// Every change to an existing link drops its cache entry, so readers fall
/// back to the durable store on their next lookup.
pub struct LinkService {
    links: Arc<dyn LinkRepository>,
    cache: LinkCache,
    limiter: QuotaLimiter,
    shorten_policy: LimitPolicy,
}

impl LinkService {
    /// Creates a new link service.
    pub fn new(
        links: Arc<dyn LinkRepository>,
        cache: LinkCache,
        limiter: QuotaLimiter,
        shorten_policy: LimitPolicy,
    ) -> Self {
        Self {
            links,
            cache,
            limiter,
            shorten_policy,
        }
    }

    /// Creates a short link.
    ///
    /// # Code Generation
    ///
    /// - If `code` is provided, validates and uses it (or returns conflict error)
    /// - Otherwise, generates a random 8-character code
    /// - Retries up to 10 times on collision before failing
    ///
    /// # Errors
    ///
    /// Returns [`AppError::QuotaExceeded`] when the owner used up the
    /// `shorten` quota.
    /// Returns [`AppError::Validation`] if the URL, the custom code or the
    /// expiry is invalid.
    /// Returns [`AppError::Conflict`] if the custom code already exists.
    pub async fn create_link(&self, request: CreateLink) -> Result<Link, AppError> {
        let identity = request
            .owner_id
            .map_or_else(|| "anonymous".to_string(), |id| id.to_string());
        self.limiter
            .enforce(SHORTEN_SCOPE, &identity, self.shorten_policy, SHORTEN_ACTION)
            .await?;

        let destination = normalize_destination(&request.destination)?;

        let now = Utc::now();
        let expires_at = request
            .expires_at
            .unwrap_or_else(|| now + ChronoDuration::hours(DEFAULT_EXPIRY_HOURS));
        if expires_at <= now {
            return Err(AppError::bad_request(
                "Expiry must be in the future",
                json!({ "expires_at": expires_at }),
            ));
        }

        let code = match request.code {
            Some(custom) => {
                validate_custom_code(&custom)?;

                if self.links.find_by_code(&custom).await?.is_some() {
                    return Err(AppError::conflict(
                        "Custom code already exists",
                        json!({ "code": custom }),
                    ));
                }
                custom
            }
            None => self.generate_unique_code().await?,
        };

        let link = self
            .links
            .insert(NewLink {
                code,
                destination,
                owner_id: request.owner_id,
                expires_at,
            })
            .await?;

        info!("Created link {} -> {}", link.code, link.destination);
        Ok(link)
    }

    /// Retrieves a link by id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if no link has this id.
    pub async fn get_link(&self, id: i64) -> Result<Link, AppError> {
        self.links
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Link not found", json!({ "id": id })))
    }

    /// Applies a partial update and invalidates the cached copy.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if no link has this id.
    /// Returns [`AppError::Validation`] for an invalid code or URL.
    /// Returns [`AppError::Conflict`] if the new code is taken.
    pub async fn update_link(&self, id: i64, mut patch: LinkPatch) -> Result<Link, AppError> {
        let existing = self.get_link(id).await?;

        if let Some(code) = &patch.code {
            validate_custom_code(code)?;
        }
        if let Some(destination) = &patch.destination {
            patch.destination = Some(normalize_destination(destination)?);
        }

        let updated = self.links.update(id, patch).await?;

        self.cache.invalidate(&existing.code).await;
        if updated.code != existing.code {
            self.cache.invalidate(&updated.code).await;
        }

        info!("Updated link {}", updated.code);
        Ok(updated)
    }

    /// Deletes a link and its cached copy.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if no link has this id.
    pub async fn delete_link(&self, id: i64) -> Result<(), AppError> {
        let existing = self.get_link(id).await?;

        if !self.links.delete(id).await? {
            return Err(AppError::not_found("Link not found", json!({ "id": id })));
        }
        self.cache.invalidate(&existing.code).await;

        info!("Deleted link {}", existing.code);
        Ok(())
    }

    /// Generates a code that is neither reserved nor taken.
    ///
    /// Attempts up to 10 times before failing.
    async fn generate_unique_code(&self) -> Result<String, AppError> {
        const MAX_ATTEMPTS: usize = 10;

        for _ in 0..MAX_ATTEMPTS {
            let code = generate_code()?;
            if is_reserved(&code) || code.starts_with('-') || code.ends_with('-') {
                continue;
            }

            if self.links.find_by_code(&code).await?.is_none() {
                return Ok(code);
            }
        }

        Err(AppError::store(
            "Failed to generate unique code",
            json!({ "reason": "Too many collisions" }),
        ))
    }
}

fn normalize_destination(destination: &str) -> Result<String, AppError> {
    normalize_url(destination).map_err(|e| {
        AppError::bad_request("Invalid URL format", json!({ "reason": e.to_string() }))
    })
}
