use std::sync::Arc;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::store::QuotaStore;
use super::types::{Admission, QuotaPolicy, QuotaRecord};
use crate::error::{Result, SentimentError};

/// Gate for billable operations
///
/// Each identity gets `limit` billable calls per fixed-length window. The
/// window restarts on the first deducting call made after it has run its
/// full length.
#[derive(Clone)]
pub struct QuotaLedger {
    store: Arc<dyn QuotaStore>,
    clock: Arc<dyn Clock>,
    policy: QuotaPolicy,
}

impl QuotaLedger {
    /// Create a ledger over `store` using the system clock
    pub fn new(store: Arc<dyn QuotaStore>, policy: QuotaPolicy) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), policy)
    }

    pub fn with_clock(store: Arc<dyn QuotaStore>, clock: Arc<dyn Clock>, policy: QuotaPolicy) -> Self {
        QuotaLedger {
            store,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> &QuotaPolicy {
        &self.policy
    }

    /// Check whether `owner` may perform a billable operation.
    ///
    /// With `deduct` set, an admission counts the call in a single atomic
    /// store update. A denial never writes.
    pub async fn admit(&self, owner: &str, deduct: bool) -> Result<Admission> {
        let now = self.clock.now();
        let period = self.policy.reset_period;

        if !deduct {
            let record = self.record(owner).await?;
            return Ok(record.decide(now, period, false).admission());
        }

        match self.store.try_consume(owner, now, period).await? {
            Some(record) => {
                debug!(
                    "Admitted {} ({}/{} used, window from {})",
                    owner, record.used, record.limit, record.window_start
                );
                Ok(Admission::Admitted)
            }
            None => {
                if self.store.find_by_owner(owner).await?.is_none() {
                    return Err(SentimentError::NotFound(format!("quota for {}", owner)));
                }
                warn!("Quota exhausted for {}", owner);
                Ok(Admission::Denied)
            }
        }
    }

    /// Return the record for `owner`, creating it on first access
    pub async fn provision(&self, owner: &str) -> Result<QuotaRecord> {
        let candidate = QuotaRecord::new(owner, self.policy.default_limit, self.clock.now());
        let issued = candidate.secret.clone();
        let record = self.store.insert_if_absent(candidate).await?;
        if record.secret == issued {
            info!("Provisioned API quota for {}", owner);
        }
        Ok(record)
    }

    /// Resolve a bearer API key to its record
    pub async fn identify(&self, secret: &str) -> Result<Option<QuotaRecord>> {
        self.store.find_by_secret(secret).await
    }

    pub async fn record(&self, owner: &str) -> Result<QuotaRecord> {
        self.store
            .find_by_owner(owner)
            .await?
            .ok_or_else(|| SentimentError::NotFound(format!("quota for {}", owner)))
    }

    pub async fn list(&self) -> Result<Vec<QuotaRecord>> {
        self.store.list().await
    }
}
