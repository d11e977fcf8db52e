use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::config::QuotaConfig;

/// Prefix carried by every issued API key
pub const SECRET_PREFIX: &str = "sa_live_";

/// Random bytes behind an API key (hex encoded after the prefix)
const SECRET_BYTES: usize = 24;

/// Per-identity API quota
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaRecord {
    /// Identity owning the record
    pub owner: String,
    /// Bearer API key, fixed at creation
    pub secret: String,
    /// Billable requests consumed in the current window
    pub used: u32,
    /// Maximum billable requests per window
    pub limit: u32,
    /// Start of the current accounting window
    pub window_start: DateTime<Utc>,
}

impl QuotaRecord {
    /// Create a fresh record whose window opens at `now`
    pub fn new(owner: impl Into<String>, limit: u32, now: DateTime<Utc>) -> Self {
        QuotaRecord {
            owner: owner.into(),
            secret: generate_secret(),
            used: 0,
            limit,
            window_start: now,
        }
    }

    /// Whether a fixed-length window has fully elapsed at `now`
    pub fn is_window_expired(&self, now: DateTime<Utc>, period: Duration) -> bool {
        now - self.window_start >= period
    }

    /// Decide what an admission attempt at `now` does to this record
    pub fn decide(&self, now: DateTime<Utc>, period: Duration, deduct: bool) -> Decision {
        if self.is_window_expired(now, period) {
            return if deduct { Decision::Reset } else { Decision::Pass };
        }

        if self.used >= self.limit {
            return Decision::Deny;
        }

        if deduct {
            Decision::Increment
        } else {
            Decision::Pass
        }
    }

    /// Apply a decision made by [`QuotaRecord::decide`]
    pub fn apply(&mut self, decision: Decision, now: DateTime<Utc>) {
        match decision {
            Decision::Reset => {
                self.window_start = now;
                self.used = 1;
            }
            Decision::Increment => self.used = self.used.saturating_add(1),
            Decision::Pass | Decision::Deny => {}
        }
    }

    /// Requests left in the current window
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used)
    }

    /// Instant at which the current window ends
    pub fn resets_at(&self, period: Duration) -> DateTime<Utc> {
        self.window_start + period
    }
}

/// Outcome of evaluating a record against the clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Window expired: start a new one counting this call
    Reset,
    /// Window active with headroom: count this call
    Increment,
    /// Admitted without touching the record
    Pass,
    /// Cap reached in the active window
    Deny,
}

impl Decision {
    pub fn admission(&self) -> Admission {
        match self {
            Decision::Deny => Admission::Denied,
            _ => Admission::Admitted,
        }
    }

    pub fn mutates(&self) -> bool {
        matches!(self, Decision::Reset | Decision::Increment)
    }
}

/// Ledger verdict for a billable operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Admission {
    Admitted,
    Denied,
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }
}

/// Limits applied to newly provisioned records and window accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaPolicy {
    pub default_limit: u32,
    pub reset_period: Duration,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        QuotaPolicy::from(&QuotaConfig::default())
    }
}

impl From<&QuotaConfig> for QuotaPolicy {
    fn from(config: &QuotaConfig) -> Self {
        QuotaPolicy {
            default_limit: config.default_limit,
            reset_period: Duration::days(i64::from(config.reset_period_days)),
        }
    }
}

/// Generate a new opaque API key
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    format!("{}{}", SECRET_PREFIX, hex::encode(bytes))
}
