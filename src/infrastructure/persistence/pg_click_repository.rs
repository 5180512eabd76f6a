//! PostgreSQL implementation of the analytical click store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::sync::Arc;

use crate::domain::entities::ClickEvent;
use crate::domain::repositories::ClickRepository;
use crate::error::AppError;

/// Rows per INSERT statement; keeps bind parameters well under the
/// Postgres limit of 65535 (six per row).
const INSERT_CHUNK: usize = 1000;

#[derive(sqlx::FromRow)]
struct ClickRow {
    record_id: i64,
    geo: String,
    device: String,
    os: String,
    referrer: String,
    timestamp: DateTime<Utc>,
}

impl From<ClickRow> for ClickEvent {
    fn from(r: ClickRow) -> Self {
        ClickEvent {
            record_id: r.record_id,
            geo: r.geo,
            device: r.device,
            os: r.os,
            referrer: r.referrer,
            timestamp: r.timestamp,
        }
    }
}

/// PostgreSQL repository for `click_events`.
///
/// The pool may point at a separate analytics database.
pub struct PgClickRepository {
    pool: Arc<PgPool>,
}

impl PgClickRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClickRepository for PgClickRepository {
    async fn insert_batch(&self, events: Vec<ClickEvent>) -> Result<u64, AppError> {
        if events.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for chunk in events.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO click_events (record_id, geo, device, os, referrer, timestamp) ",
            );
            builder.push_values(chunk, |mut row, event| {
                row.push_bind(event.record_id)
                    .push_bind(&event.geo)
                    .push_bind(&event.device)
                    .push_bind(&event.os)
                    .push_bind(&event.referrer)
                    .push_bind(event.timestamp);
            });

            inserted += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn find_in_range(
        &self,
        record_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ClickEvent>, AppError> {
        let rows = sqlx::query_as::<_, ClickRow>(
            r#"
            SELECT record_id, geo, device, os, referrer, timestamp
            FROM click_events
            WHERE record_id = $1 AND timestamp >= $2 AND timestamp <= $3
            ORDER BY timestamp DESC
            "#,
        )
        .bind(record_id)
        .bind(start)
        .bind(end)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.into_iter().map(ClickEvent::from).collect())
    }
}
