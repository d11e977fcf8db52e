use sentiment_rs::api::ApiServer;
use sentiment_rs::app::build_state;
use sentiment_rs::config::{Config, LoggingConfig};
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sentiment_rs={0},tower_http={0}", logging.level)));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.pretty().init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let (config, source) = match std::env::args().nth(1) {
        Some(path) => (Config::from_file(&path)?, path),
        None if Path::new("config.toml").exists() => {
            (Config::from_file("config.toml")?, "config.toml".to_string())
        }
        None => (Config::default(), "defaults".to_string()),
    };

    init_logging(&config.logging);

    info!("Starting sentiment-rs v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {}", source);
    info!("  API listening on: {}", config.server.listen_addr);
    info!("  Database: {}", config.database.url);
    info!("  Upload bucket: {}", config.storage.bucket);
    info!("  Inference endpoint: {}", config.inference.endpoint_url);

    let state = build_state(&config).await?;
    let server = ApiServer::new(state, config.server.listen_addr.clone());
    server.run().await?;

    Ok(())
}
