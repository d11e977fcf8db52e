/// API quota accounting
///
/// This module provides the quota ledger that gates billable requests:
/// - One record per identity, holding its API key and usage counters
/// - A fixed-length rolling window (30 days by default)
/// - Atomic check-and-increment in the backing store

pub mod clock;
pub mod ledger;
pub mod sqlite;
pub mod store;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use ledger::QuotaLedger;
pub use sqlite::SqliteQuotaStore;
pub use store::{MemoryQuotaStore, QuotaStore};
pub use types::{Admission, QuotaPolicy, QuotaRecord};
