//! Quota persistence
//!
//! A store owns the atomic check-and-increment primitive. The ledger never
//! reads a record and writes it back in two steps; every deducting admission
//! goes through [`QuotaStore::try_consume`].

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use super::types::QuotaRecord;
use crate::error::Result;

#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// Insert `record` unless its owner already has one; returns the stored record
    async fn insert_if_absent(&self, record: QuotaRecord) -> Result<QuotaRecord>;

    async fn find_by_owner(&self, owner: &str) -> Result<Option<QuotaRecord>>;

    async fn find_by_secret(&self, secret: &str) -> Result<Option<QuotaRecord>>;

    async fn list(&self) -> Result<Vec<QuotaRecord>>;

    /// Atomically count one billable call for `owner`.
    ///
    /// Starts a new window (with `used = 1`) when the current one has lasted
    /// `period`, otherwise increments `used` if it is below `limit`. Returns
    /// the updated record, or `None` when nothing was written (cap reached or
    /// no such owner).
    async fn try_consume(
        &self,
        owner: &str,
        now: DateTime<Utc>,
        period: Duration,
    ) -> Result<Option<QuotaRecord>>;
}

/// In-process store; each record sits behind its own lock
#[derive(Default)]
pub struct MemoryQuotaStore {
    records: RwLock<HashMap<String, Arc<Mutex<QuotaRecord>>>>,
    secrets: RwLock<HashMap<String, String>>,
}

impl MemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a record wholesale (test fixtures and imports)
    pub async fn put(&self, record: QuotaRecord) {
        let mut records = self.records.write().await;
        let mut secrets = self.secrets.write().await;
        if let Some(previous) = records.get(&record.owner) {
            let previous = previous.lock().await;
            secrets.remove(&previous.secret);
        }
        secrets.insert(record.secret.clone(), record.owner.clone());
        records.insert(record.owner.clone(), Arc::new(Mutex::new(record)));
    }

    async fn slot(&self, owner: &str) -> Option<Arc<Mutex<QuotaRecord>>> {
        self.records.read().await.get(owner).cloned()
    }
}

#[async_trait]
impl QuotaStore for MemoryQuotaStore {
    async fn insert_if_absent(&self, record: QuotaRecord) -> Result<QuotaRecord> {
        let mut records = self.records.write().await;
        if let Some(existing) = records.get(&record.owner) {
            return Ok(existing.lock().await.clone());
        }

        self.secrets
            .write()
            .await
            .insert(record.secret.clone(), record.owner.clone());
        records.insert(record.owner.clone(), Arc::new(Mutex::new(record.clone())));
        Ok(record)
    }

    async fn find_by_owner(&self, owner: &str) -> Result<Option<QuotaRecord>> {
        match self.slot(owner).await {
            Some(slot) => Ok(Some(slot.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn find_by_secret(&self, secret: &str) -> Result<Option<QuotaRecord>> {
        let owner = self.secrets.read().await.get(secret).cloned();
        match owner {
            Some(owner) => self.find_by_owner(&owner).await,
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<QuotaRecord>> {
        let slots: Vec<_> = self.records.read().await.values().cloned().collect();
        let mut out = Vec::with_capacity(slots.len());
        for slot in slots {
            out.push(slot.lock().await.clone());
        }
        out.sort_by(|a, b| a.owner.cmp(&b.owner));
        Ok(out)
    }

    async fn try_consume(
        &self,
        owner: &str,
        now: DateTime<Utc>,
        period: Duration,
    ) -> Result<Option<QuotaRecord>> {
        let Some(slot) = self.slot(owner).await else {
            return Ok(None);
        };

        let mut record = slot.lock().await;
        let decision = record.decide(now, period, true);
        if !decision.mutates() {
            return Ok(None);
        }
        record.apply(decision, now);
        Ok(Some(record.clone()))
    }
}
