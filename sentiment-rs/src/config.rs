use crate::error::{Result, SentimentError};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
    pub storage: StorageConfig,
    pub inference: InferenceConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub listen_addr: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuotaConfig {
    /// Requests allowed per window for newly provisioned keys
    pub default_limit: u32,
    /// Window length, counted as fixed 24h days
    pub reset_period_days: u32,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            default_limit: 10_000,
            reset_period_days: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub bucket: String,
    pub upload_base_url: String,
    pub signing_secret: String,
    #[serde(default = "default_url_expiry")]
    pub url_expiry_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InferenceConfig {
    pub endpoint_url: String,
    #[serde(default = "default_inference_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_lifetime_hours: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

fn default_max_connections() -> u32 {
    8
}

fn default_url_expiry() -> u64 {
    3600
}

fn default_inference_timeout() -> u64 {
    300
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| SentimentError::Config(e.to_string()))?;

        let config: Self =
            toml::from_str(&content).map_err(|e| SentimentError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.quota.default_limit == 0 {
            return Err(SentimentError::Config(
                "quota.default_limit must be positive".to_string(),
            ));
        }
        if self.quota.reset_period_days == 0 {
            return Err(SentimentError::Config(
                "quota.reset_period_days must be positive".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(SentimentError::Config(
                "database.max_connections must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn default() -> Self {
        Self {
            server: ServerConfig {
                listen_addr: "0.0.0.0:8080".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://sentiment.db".to_string(),
                max_connections: default_max_connections(),
            },
            quota: QuotaConfig::default(),
            storage: StorageConfig {
                bucket: "sentiment-analysis-uploads".to_string(),
                upload_base_url: "http://localhost:9000".to_string(),
                signing_secret: "change-me-in-production".to_string(),
                url_expiry_secs: default_url_expiry(),
            },
            inference: InferenceConfig {
                endpoint_url: "http://localhost:8081/invocations".to_string(),
                timeout_secs: default_inference_timeout(),
            },
            auth: AuthConfig {
                jwt_secret: "change-me-in-production".to_string(),
                token_lifetime_hours: 24,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.quota.default_limit, 10_000);
        assert_eq!(config.quota.reset_period_days, 30);
    }

    #[test]
    fn test_from_file_uses_quota_defaults_when_section_missing() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[server]
listen_addr = "127.0.0.1:9999"

[database]
url = "sqlite::memory:"

[storage]
bucket = "uploads"
upload_base_url = "https://objects.example.com"
signing_secret = "s3cret"

[inference]
endpoint_url = "https://inference.example.com/invocations"

[auth]
jwt_secret = "jwt"
token_lifetime_hours = 1

[logging]
level = "debug"
format = "json"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.listen_addr, "127.0.0.1:9999");
        assert_eq!(config.quota.default_limit, 10_000);
        assert_eq!(config.storage.url_expiry_secs, 3600);
        assert_eq!(config.database.max_connections, 8);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_zero_limit_rejected() {
        let mut config = Config::default();
        config.quota.default_limit = 0;
        assert!(matches!(config.validate(), Err(SentimentError::Config(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = Config::from_file("/nonexistent/sentiment.toml");
        assert!(matches!(result, Err(SentimentError::Config(_))));
    }
}
