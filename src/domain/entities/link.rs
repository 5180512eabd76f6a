//! Link entity representing a short code → destination mapping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A short link record as stored in the durable store.
///
/// The same shape is serialized into the cache, so a cached snapshot carries
/// its own expiry and can be re-checked by the reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: i64,
    pub code: String,
    pub destination: String,
    pub owner_id: Option<i64>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub total_clicks: i64,
}

impl Link {
    /// Creates a new Link instance.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: i64,
        code: String,
        destination: String,
        owner_id: Option<i64>,
        expires_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        total_clicks: i64,
    ) -> Self {
        Self {
            id,
            code,
            destination,
            owner_id,
            expires_at,
            created_at,
            updated_at,
            total_clicks,
        }
    }

    /// Returns true once `now` has reached the expiry time.
    ///
    /// Expired links stay in storage but resolve as not found.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Returns true if the link has passed its expiry time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Time left until expiry, or zero when already expired.
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Input data for creating a new link.
#[derive(Debug, Clone)]
pub struct NewLink {
    pub code: String,
    pub destination: String,
    pub owner_id: Option<i64>,
    pub expires_at: DateTime<Utc>,
}

/// Partial update for an existing link.
///
/// `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct LinkPatch {
    pub code: Option<String>,
    pub destination: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}
