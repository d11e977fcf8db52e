//! sentiment-rs: Video sentiment analysis API
//!
//! Accepts video uploads through signed object-storage URLs, forwards them
//! to a hosted inference endpoint and meters usage per API key.
//!
//! # Features
//!
//! - **Quota ledger**: per-identity monthly request cap with a rolling
//!   30-day window, enforced with a single atomic store update
//! - **API keys**: `sa_live_` bearer keys provisioned on first access
//! - **Uploads**: signed, expiring upload URLs for `.mp4`, `.mov`, `.avi`
//! - **Inference**: pluggable endpoint client (HTTP or mock)
//!
//! # Example
//!
//! ```no_run
//! use sentiment_rs::quota::{QuotaLedger, QuotaPolicy, SqliteQuotaStore};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = sentiment_rs::db::connect("sqlite://sentiment.db", 8).await?;
//! let store = SqliteQuotaStore::new(pool).await?;
//! let ledger = QuotaLedger::new(Arc::new(store), QuotaPolicy::default());
//!
//! ledger.provision("user-1").await?;
//! if ledger.admit("user-1", true).await?.is_admitted() {
//!     println!("Request allowed");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`quota`]: Quota ledger and its stores
//! - [`files`]: Uploaded video records
//! - [`storage`]: Upload URL signing
//! - [`inference`]: Inference endpoint clients
//! - [`api`]: HTTP routes and authentication
//! - [`config`]: Configuration management
//! - [`error`]: Error types and handling

pub mod api;
pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod files;
pub mod inference;
pub mod quota;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, SentimentError};
