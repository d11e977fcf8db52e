//! SQLite-backed quota store

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use super::store::QuotaStore;
use super::types::QuotaRecord;
use crate::error::{Result, SentimentError};

type QuotaRow = (String, String, i64, i64, i64);

/// Quota records in the `api_quotas` table
#[derive(Clone)]
pub struct SqliteQuotaStore {
    pool: SqlitePool,
}

impl SqliteQuotaStore {
    /// Wrap `pool`, creating the quota table if it does not exist
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS api_quotas (
                owner TEXT PRIMARY KEY,
                secret TEXT NOT NULL UNIQUE,
                requests_used INTEGER NOT NULL DEFAULT 0 CHECK (requests_used >= 0),
                max_requests INTEGER NOT NULL CHECK (max_requests > 0),
                window_start INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        info!("Quota table ready");
        Ok(Self { pool })
    }
}

fn from_row(row: QuotaRow) -> Result<QuotaRecord> {
    let (owner, secret, used, limit, window_start) = row;

    let used = u32::try_from(used)
        .map_err(|_| SentimentError::Storage(format!("requests_used out of range for {}", owner)))?;
    let limit = u32::try_from(limit)
        .map_err(|_| SentimentError::Storage(format!("max_requests out of range for {}", owner)))?;
    let window_start = DateTime::from_timestamp_millis(window_start)
        .ok_or_else(|| SentimentError::Storage(format!("window_start out of range for {}", owner)))?;

    Ok(QuotaRecord {
        owner,
        secret,
        used,
        limit,
        window_start,
    })
}

#[async_trait]
impl QuotaStore for SqliteQuotaStore {
    async fn insert_if_absent(&self, record: QuotaRecord) -> Result<QuotaRecord> {
        let result = sqlx::query(
            r#"
            INSERT INTO api_quotas (owner, secret, requests_used, max_requests, window_start)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(owner) DO NOTHING
            "#,
        )
        .bind(&record.owner)
        .bind(&record.secret)
        .bind(i64::from(record.used))
        .bind(i64::from(record.limit))
        .bind(record.window_start.timestamp_millis())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            debug!("Provisioned quota for {}", record.owner);
        }

        self.find_by_owner(&record.owner)
            .await?
            .ok_or_else(|| SentimentError::NotFound(format!("quota for {}", record.owner)))
    }

    async fn find_by_owner(&self, owner: &str) -> Result<Option<QuotaRecord>> {
        let row = sqlx::query_as::<_, QuotaRow>(
            r#"
            SELECT owner, secret, requests_used, max_requests, window_start
            FROM api_quotas WHERE owner = ?
            "#,
        )
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;

        row.map(from_row).transpose()
    }

    async fn find_by_secret(&self, secret: &str) -> Result<Option<QuotaRecord>> {
        let row = sqlx::query_as::<_, QuotaRow>(
            r#"
            SELECT owner, secret, requests_used, max_requests, window_start
            FROM api_quotas WHERE secret = ?
            "#,
        )
        .bind(secret)
        .fetch_optional(&self.pool)
        .await?;

        row.map(from_row).transpose()
    }

    async fn list(&self) -> Result<Vec<QuotaRecord>> {
        let rows = sqlx::query_as::<_, QuotaRow>(
            r#"
            SELECT owner, secret, requests_used, max_requests, window_start
            FROM api_quotas ORDER BY owner
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(from_row).collect()
    }

    async fn try_consume(
        &self,
        owner: &str,
        now: DateTime<Utc>,
        period: Duration,
    ) -> Result<Option<QuotaRecord>> {
        // A window that started at or before the cutoff has lasted a full period.
        let cutoff = (now - period).timestamp_millis();

        let row = sqlx::query_as::<_, QuotaRow>(
            r#"
            UPDATE api_quotas
            SET requests_used = CASE WHEN window_start <= ?1 THEN 1 ELSE requests_used + 1 END,
                window_start = CASE WHEN window_start <= ?1 THEN ?2 ELSE window_start END
            WHERE owner = ?3
              AND (window_start <= ?1 OR requests_used < max_requests)
            RETURNING owner, secret, requests_used, max_requests, window_start
            "#,
        )
        .bind(cutoff)
        .bind(now.timestamp_millis())
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;

        row.map(from_row).transpose()
    }
}
