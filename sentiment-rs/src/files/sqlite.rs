use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::store::{FileStore, VideoFile};
use crate::error::{Result, SentimentError};

type FileRow = (String, String, bool, i64);

/// Video records in the `video_files` table
#[derive(Clone)]
pub struct SqliteFileStore {
    pool: SqlitePool,
}

impl SqliteFileStore {
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS video_files (
                key TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                analyzed INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_video_files_owner ON video_files (owner)")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }
}

fn from_row(row: FileRow) -> Result<VideoFile> {
    let (key, owner, analyzed, created_at) = row;
    let created_at = DateTime::from_timestamp_millis(created_at)
        .ok_or_else(|| SentimentError::Storage(format!("created_at out of range for {}", key)))?;

    Ok(VideoFile {
        key,
        owner,
        analyzed,
        created_at,
    })
}

#[async_trait]
impl FileStore for SqliteFileStore {
    async fn create(&self, key: &str, owner: &str, now: DateTime<Utc>) -> Result<VideoFile> {
        let result = sqlx::query(
            r#"
            INSERT INTO video_files (key, owner, analyzed, created_at)
            VALUES (?, ?, 0, ?)
            ON CONFLICT(key) DO NOTHING
            "#,
        )
        .bind(key)
        .bind(owner)
        .bind(now.timestamp_millis())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SentimentError::InvalidRequest(format!(
                "File key already exists: {}",
                key
            )));
        }

        Ok(VideoFile {
            key: key.to_string(),
            owner: owner.to_string(),
            analyzed: false,
            created_at: now,
        })
    }

    async fn find(&self, key: &str) -> Result<Option<VideoFile>> {
        let row = sqlx::query_as::<_, FileRow>(
            "SELECT key, owner, analyzed, created_at FROM video_files WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(from_row).transpose()
    }

    async fn mark_analyzed(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE video_files SET analyzed = 1 WHERE key = ? AND analyzed = 0")
            .bind(key)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }

        match self.find(key).await? {
            Some(_) => Ok(false),
            None => Err(SentimentError::NotFound(format!("file {}", key))),
        }
    }
}
