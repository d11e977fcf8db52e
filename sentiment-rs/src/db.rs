//! SQLite connection pool setup

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

use crate::error::Result;

/// Open a pool for `url`, creating the database file if needed.
pub async fn connect(url: &str, max_connections: u32) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool_options = pool_options(url, max_connections);
    let max_connections = pool_options.get_max_connections();

    let pool = pool_options.connect_with(options).await?;

    info!("Connected to {} ({} connections max)", url, max_connections);
    Ok(pool)
}

/// Every connection to `sqlite::memory:` is a separate database, so
/// in-memory URLs get a single connection that is never recycled.
fn pool_options(url: &str, max_connections: u32) -> SqlitePoolOptions {
    if url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(max_connections)
    }
}
