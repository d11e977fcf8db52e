//! CLI tool for managing API quotas
//!
//! # Usage
//!
//! ```bash
//! # Create (or show) the API key for an identity
//! sentiment-admin provision user-123 --db sqlite://sentiment.db
//!
//! # Show usage for an identity
//! sentiment-admin show user-123 --db sqlite://sentiment.db
//!
//! # List all quotas
//! sentiment-admin list --db sqlite://sentiment.db
//!
//! # Issue a dashboard session token
//! sentiment-admin token user-123 --jwt-secret change-me-in-production
//! ```

use clap::{Parser, Subcommand};
use sentiment_rs::api::auth::JwtConfig;
use sentiment_rs::config::QuotaConfig;
use sentiment_rs::quota::{QuotaLedger, QuotaPolicy, SqliteQuotaStore};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "sentiment-admin")]
#[command(about = "Manage API quotas and session tokens", long_about = None)]
struct Cli {
    /// Database URL (e.g., sqlite://sentiment.db)
    #[arg(short, long, default_value = "sqlite://sentiment.db")]
    db: String,

    /// Requests per window for newly provisioned keys
    #[arg(long, default_value_t = 10_000)]
    default_limit: u32,

    /// Window length in days
    #[arg(long, default_value_t = 30)]
    reset_period_days: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the quota record for an identity (no-op if it exists)
    Provision {
        /// Identity
        owner: String,
    },
    /// Show quota usage for an identity
    Show {
        /// Identity
        owner: String,
    },
    /// List all quota records
    List,
    /// Issue a session token for an identity
    Token {
        /// Identity
        owner: String,
        /// JWT signing secret
        #[arg(long, env = "SENTIMENT_JWT_SECRET")]
        jwt_secret: String,
        /// Token lifetime in hours
        #[arg(long, default_value_t = 24)]
        hours: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Commands::Token {
        owner,
        jwt_secret,
        hours,
    } = &cli.command
    {
        let token = JwtConfig::new(jwt_secret.clone(), *hours).create_token(owner)?;
        println!("{}", token);
        return Ok(());
    }

    let quota_config = QuotaConfig {
        default_limit: cli.default_limit,
        reset_period_days: cli.reset_period_days,
    };
    let policy = QuotaPolicy::from(&quota_config);

    let pool = sentiment_rs::db::connect(&cli.db, 1).await?;
    let store = SqliteQuotaStore::new(pool).await?;
    let ledger = QuotaLedger::new(Arc::new(store), policy);

    match cli.command {
        Commands::Provision { owner } => {
            let record = ledger.provision(&owner).await?;
            println!("✓ Quota ready for {}", record.owner);
            println!("  API key: {}", record.secret);
            println!("  Limit:   {} requests", record.limit);
        }
        Commands::Show { owner } => {
            let record = ledger.record(&owner).await?;
            println!("Owner:        {}", record.owner);
            println!("API key:      {}", record.secret);
            println!("Used:         {}/{}", record.used, record.limit);
            println!("Window start: {}", record.window_start);
            println!("Resets at:    {}", record.resets_at(policy.reset_period));
        }
        Commands::List => {
            let records = ledger.list().await?;
            if records.is_empty() {
                println!("No quota records found");
            } else {
                println!("{:<36} {:>10} {:>10}  {}", "OWNER", "USED", "LIMIT", "WINDOW START");
                for record in records {
                    println!(
                        "{:<36} {:>10} {:>10}  {}",
                        record.owner, record.used, record.limit, record.window_start
                    );
                }
            }
        }
        Commands::Token { .. } => {}
    }

    Ok(())
}
