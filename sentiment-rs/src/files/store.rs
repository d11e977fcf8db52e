use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::{Result, SentimentError};

/// A video uploaded (or about to be uploaded) to object storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoFile {
    pub key: String,
    pub owner: String,
    pub analyzed: bool,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Record a new upload key for `owner`
    async fn create(&self, key: &str, owner: &str, now: DateTime<Utc>) -> Result<VideoFile>;

    async fn find(&self, key: &str) -> Result<Option<VideoFile>>;

    /// Flip `analyzed` to true; returns false if it already was
    async fn mark_analyzed(&self, key: &str) -> Result<bool>;
}

#[derive(Default)]
pub struct MemoryFileStore {
    files: RwLock<HashMap<String, VideoFile>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn create(&self, key: &str, owner: &str, now: DateTime<Utc>) -> Result<VideoFile> {
        let mut files = self.files.write().await;
        if files.contains_key(key) {
            return Err(SentimentError::InvalidRequest(format!(
                "File key already exists: {}",
                key
            )));
        }

        let file = VideoFile {
            key: key.to_string(),
            owner: owner.to_string(),
            analyzed: false,
            created_at: now,
        };
        files.insert(key.to_string(), file.clone());
        Ok(file)
    }

    async fn find(&self, key: &str) -> Result<Option<VideoFile>> {
        Ok(self.files.read().await.get(key).cloned())
    }

    async fn mark_analyzed(&self, key: &str) -> Result<bool> {
        let mut files = self.files.write().await;
        match files.get_mut(key) {
            Some(file) if !file.analyzed => {
                file.analyzed = true;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(SentimentError::NotFound(format!("file {}", key))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_find() {
        let store = MemoryFileStore::new();
        let now = Utc::now();
        let file = store.create("inference/a.mp4", "user-1", now).await.unwrap();
        assert!(!file.analyzed);

        let found = store.find("inference/a.mp4").await.unwrap().unwrap();
        assert_eq!(found, file);
        assert!(store.find("inference/b.mp4").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_key_rejected() {
        let store = MemoryFileStore::new();
        store.create("k", "user-1", Utc::now()).await.unwrap();
        let result = store.create("k", "user-2", Utc::now()).await;
        assert!(matches!(result, Err(SentimentError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_mark_analyzed_once() {
        let store = MemoryFileStore::new();
        store.create("k", "user-1", Utc::now()).await.unwrap();

        assert!(store.mark_analyzed("k").await.unwrap());
        assert!(!store.mark_analyzed("k").await.unwrap());
        assert!(store.find("k").await.unwrap().unwrap().analyzed);

        let missing = store.mark_analyzed("nope").await;
        assert!(matches!(missing, Err(SentimentError::NotFound(_))));
    }
}
