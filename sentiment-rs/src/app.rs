//! Wiring of stores and collaborators from configuration

use std::sync::Arc;
use tracing::info;

use crate::api::auth::JwtConfig;
use crate::api::AppState;
use crate::config::Config;
use crate::db;
use crate::error::Result;
use crate::files::SqliteFileStore;
use crate::inference::HttpInferenceClient;
use crate::quota::{QuotaLedger, QuotaPolicy, SqliteQuotaStore, SystemClock};
use crate::storage::HmacUploadSigner;

/// Open the database, create the schema and build the application state
pub async fn build_state(config: &Config) -> Result<AppState> {
    config.validate()?;

    let pool = db::connect(&config.database.url, config.database.max_connections).await?;
    let quotas = SqliteQuotaStore::new(pool.clone()).await?;
    let files = SqliteFileStore::new(pool).await?;

    let policy = QuotaPolicy::from(&config.quota);
    info!(
        "Quota policy: {} requests per {} days",
        policy.default_limit, config.quota.reset_period_days
    );

    let clock = Arc::new(SystemClock);
    Ok(AppState {
        ledger: QuotaLedger::with_clock(Arc::new(quotas), clock.clone(), policy),
        files: Arc::new(files),
        signer: Arc::new(HmacUploadSigner::from_config(&config.storage)?),
        inference: Arc::new(HttpInferenceClient::from_config(&config.inference)?),
        jwt_config: JwtConfig::new(
            config.auth.jwt_secret.clone(),
            config.auth.token_lifetime_hours,
        ),
        clock,
    })
}
