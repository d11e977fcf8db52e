//! Integration tests for the quota ledger over both store backends

use chrono::{DateTime, Duration, TimeZone, Utc};
use sentiment_rs::quota::{
    Admission, ManualClock, MemoryQuotaStore, QuotaLedger, QuotaPolicy, QuotaRecord, QuotaStore,
    SqliteQuotaStore,
};
use sentiment_rs::SentimentError;
use std::sync::Arc;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 31, 23, 0, 0).unwrap()
}

fn policy() -> QuotaPolicy {
    QuotaPolicy {
        default_limit: 10_000,
        reset_period: Duration::days(30),
    }
}

async fn sqlite_store(url: &str, connections: u32) -> Arc<SqliteQuotaStore> {
    let pool = sentiment_rs::db::connect(url, connections).await.unwrap();
    Arc::new(SqliteQuotaStore::new(pool).await.unwrap())
}

/// Run `check` against a memory store and an in-memory SQLite store
async fn for_each_store<F, Fut>(check: F)
where
    F: Fn(Arc<dyn QuotaStore>) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let memory: Arc<dyn QuotaStore> = Arc::new(MemoryQuotaStore::new());
    check(memory).await;

    let sqlite: Arc<dyn QuotaStore> = sqlite_store("sqlite::memory:", 1).await;
    check(sqlite).await;
}

async fn seed(store: &Arc<dyn QuotaStore>, used: u32, limit: u32, window_start: DateTime<Utc>) {
    let mut record = QuotaRecord::new("user-1", limit, window_start);
    record.used = used;
    store.insert_if_absent(record).await.unwrap();
}

#[tokio::test]
async fn test_admit_increments_below_limit() {
    for_each_store(|store| async move {
        seed(&store, 41, 100, start()).await;
        let clock = Arc::new(ManualClock::new(start() + Duration::days(10)));
        let ledger = QuotaLedger::with_clock(store.clone(), clock, policy());

        assert_eq!(ledger.admit("user-1", true).await.unwrap(), Admission::Admitted);

        let after = ledger.record("user-1").await.unwrap();
        assert_eq!(after.used, 42);
        assert_eq!(after.window_start, start());
    })
    .await;
}

#[tokio::test]
async fn test_admit_denied_at_limit_without_mutation() {
    for_each_store(|store| async move {
        seed(&store, 100, 100, start()).await;
        let clock = Arc::new(ManualClock::new(start() + Duration::days(29)));
        let ledger = QuotaLedger::with_clock(store.clone(), clock, policy());
        let before = ledger.record("user-1").await.unwrap();

        assert_eq!(ledger.admit("user-1", true).await.unwrap(), Admission::Denied);
        assert_eq!(ledger.record("user-1").await.unwrap(), before);
    })
    .await;
}

#[tokio::test]
async fn test_expired_window_resets_to_one() {
    for_each_store(|store| async move {
        let now = start() + Duration::days(31);
        seed(&store, 9_999, 10_000, start()).await;
        let clock = Arc::new(ManualClock::new(now));
        let ledger = QuotaLedger::with_clock(store.clone(), clock, policy());

        assert_eq!(ledger.admit("user-1", true).await.unwrap(), Admission::Admitted);

        let after = ledger.record("user-1").await.unwrap();
        assert_eq!(after.used, 1);
        assert_eq!(after.window_start, now);
    })
    .await;
}

#[tokio::test]
async fn test_expired_window_admits_even_when_capped() {
    for_each_store(|store| async move {
        let now = start() + Duration::days(30);
        seed(&store, 10_000, 10_000, start()).await;
        let clock = Arc::new(ManualClock::new(now));
        let ledger = QuotaLedger::with_clock(store.clone(), clock, policy());

        assert_eq!(ledger.admit("user-1", true).await.unwrap(), Admission::Admitted);
        assert_eq!(ledger.record("user-1").await.unwrap().used, 1);
    })
    .await;
}

#[tokio::test]
async fn test_window_spanning_short_month_uses_fixed_duration() {
    // Jan 31 + 29 days lands on Feb 29 (leap year): a calendar "month" has
    // passed but the 30-day window has not.
    for_each_store(|store| async move {
        seed(&store, 5, 5, start()).await;
        let clock = Arc::new(ManualClock::new(start() + Duration::days(29)));
        let ledger = QuotaLedger::with_clock(store.clone(), clock.clone(), policy());

        assert_eq!(ledger.admit("user-1", true).await.unwrap(), Admission::Denied);

        clock.advance(Duration::days(1));
        assert_eq!(ledger.admit("user-1", true).await.unwrap(), Admission::Admitted);
    })
    .await;
}

#[tokio::test]
async fn test_admit_without_deduct_is_read_only() {
    for_each_store(|store| async move {
        seed(&store, 3, 10, start()).await;
        let clock = Arc::new(ManualClock::new(start() + Duration::days(1)));
        let ledger = QuotaLedger::with_clock(store.clone(), clock.clone(), policy());
        let before = ledger.record("user-1").await.unwrap();

        assert_eq!(ledger.admit("user-1", false).await.unwrap(), Admission::Admitted);
        assert_eq!(ledger.record("user-1").await.unwrap(), before);

        clock.advance(Duration::days(60));
        assert_eq!(ledger.admit("user-1", false).await.unwrap(), Admission::Admitted);
        assert_eq!(ledger.record("user-1").await.unwrap(), before);
    })
    .await;
}

#[tokio::test]
async fn test_admit_missing_record_is_not_found() {
    for_each_store(|store| async move {
        let ledger = QuotaLedger::with_clock(store, Arc::new(ManualClock::new(start())), policy());
        assert!(matches!(
            ledger.admit("nobody", true).await,
            Err(SentimentError::NotFound(_))
        ));
    })
    .await;
}

#[tokio::test]
async fn test_fresh_record_allows_exactly_limit_calls() {
    for_each_store(|store| async move {
        let clock = Arc::new(ManualClock::new(start()));
        let ledger = QuotaLedger::with_clock(store.clone(), clock, policy());
        let fresh = ledger.provision("user-1").await.unwrap();
        assert_eq!(fresh.used, 0);
        assert_eq!(fresh.limit, 10_000);

        for expected in 1..=10_000u32 {
            assert_eq!(
                ledger.admit("user-1", true).await.unwrap(),
                Admission::Admitted,
                "call {} should be admitted",
                expected
            );
            if expected % 2_500 == 0 {
                assert_eq!(ledger.record("user-1").await.unwrap().used, expected);
            }
        }

        assert_eq!(ledger.admit("user-1", true).await.unwrap(), Admission::Denied);
        assert_eq!(ledger.record("user-1").await.unwrap().used, 10_000);
    })
    .await;
}

async fn run_concurrent(store: Arc<dyn QuotaStore>, callers: usize, headroom: u32) {
    let limit = 25;
    seed(&store, limit - headroom, limit, start()).await;
    let clock = Arc::new(ManualClock::new(start() + Duration::days(2)));
    let ledger = QuotaLedger::with_clock(store.clone(), clock, policy());

    let mut handles = Vec::with_capacity(callers);
    for _ in 0..callers {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger.admit("user-1", true).await.unwrap()
        }));
    }

    let mut admitted = 0;
    let mut denied = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Admission::Admitted => admitted += 1,
            Admission::Denied => denied += 1,
        }
    }

    assert_eq!(admitted, headroom as usize);
    assert_eq!(denied, callers - headroom as usize);
    assert_eq!(ledger.record("user-1").await.unwrap().used, limit);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_admissions_memory_store() {
    let store: Arc<dyn QuotaStore> = Arc::new(MemoryQuotaStore::new());
    run_concurrent(store, 64, 10).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_admissions_sqlite_store() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("quota.db").display());
    let store: Arc<dyn QuotaStore> = sqlite_store(&url, 8).await;
    run_concurrent(store, 40, 7).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_provisioning_yields_one_record() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("quota.db").display());
    let store = sqlite_store(&url, 4).await;
    let ledger = QuotaLedger::new(store, policy());

    let mut handles = Vec::new();
    for _ in 0..16 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger.provision("user-1").await.unwrap().secret
        }));
    }

    let mut secrets = Vec::new();
    for handle in handles {
        secrets.push(handle.await.unwrap());
    }
    secrets.dedup();
    assert_eq!(secrets.len(), 1);
    assert_eq!(ledger.list().await.unwrap().len(), 1);
}
