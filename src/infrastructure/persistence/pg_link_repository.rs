//! PostgreSQL implementation of link repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;

use crate::domain::entities::{Link, LinkPatch, NewLink};
use crate::domain::repositories::LinkRepository;
use crate::error::AppError;

const LINK_COLUMNS: &str =
    "id, code, destination, owner_id, expires_at, created_at, updated_at, total_clicks";

#[derive(sqlx::FromRow)]
struct LinkRow {
    id: i64,
    code: String,
    destination: String,
    owner_id: Option<i64>,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    total_clicks: i64,
}

impl From<LinkRow> for Link {
    fn from(r: LinkRow) -> Self {
        Link::new(
            r.id,
            r.code,
            r.destination,
            r.owner_id,
            r.expires_at,
            r.created_at,
            r.updated_at,
            r.total_clicks,
        )
    }
}

/// PostgreSQL repository for short link records.
///
/// Uses SQLx bound parameters for SQL injection protection.
pub struct PgLinkRepository {
    pool: Arc<PgPool>,
}

impl PgLinkRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LinkRepository for PgLinkRepository {
    async fn find_by_code(&self, code: &str) -> Result<Option<Link>, AppError> {
        let row = sqlx::query_as::<_, LinkRow>(&format!(
            "SELECT {LINK_COLUMNS} FROM links WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(Link::from))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Link>, AppError> {
        let row = sqlx::query_as::<_, LinkRow>(&format!(
            "SELECT {LINK_COLUMNS} FROM links WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(Link::from))
    }

    async fn insert(&self, new_link: NewLink) -> Result<Link, AppError> {
        let row = sqlx::query_as::<_, LinkRow>(&format!(
            r#"
            INSERT INTO links (code, destination, owner_id, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING {LINK_COLUMNS}
            "#
        ))
        .bind(&new_link.code)
        .bind(&new_link.destination)
        .bind(new_link.owner_id)
        .bind(new_link.expires_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(row.into())
    }

    async fn update(&self, id: i64, patch: LinkPatch) -> Result<Link, AppError> {
        let row = sqlx::query_as::<_, LinkRow>(&format!(
            r#"
            UPDATE links
            SET code = COALESCE($2, code),
                destination = COALESCE($3, destination),
                expires_at = COALESCE($4, expires_at),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {LINK_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.code)
        .bind(patch.destination)
        .bind(patch.expires_at)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(Link::from)
            .ok_or_else(|| AppError::not_found("Link not found", json!({ "id": id })))
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM links WHERE id = $1")
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn increment_clicks(&self, id: i64, by: i64) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE links SET total_clicks = total_clicks + $2 WHERE id = $1")
            .bind(id)
            .bind(by)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, owner_id: Option<i64>) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM links WHERE ($1::bigint IS NULL OR owner_id = $1)",
        )
        .bind(owner_id)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count)
    }
}
