//! HTTP client for a hosted inference endpoint

use async_trait::async_trait;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use super::InferenceClient;
use crate::config::InferenceConfig;
use crate::error::{Result, SentimentError};

#[derive(Debug, Serialize)]
struct InvocationRequest<'a> {
    video_path: &'a str,
}

/// Posts `{"video_path": ...}` to the endpoint and returns its JSON body
pub struct HttpInferenceClient {
    client: reqwest::Client,
    endpoint_url: String,
}

impl HttpInferenceClient {
    pub fn new(endpoint_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SentimentError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint_url: endpoint_url.to_string(),
        })
    }

    pub fn from_config(config: &InferenceConfig) -> Result<Self> {
        Self::new(&config.endpoint_url, Duration::from_secs(config.timeout_secs))
    }
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
    async fn analyze(&self, video_uri: &str) -> Result<serde_json::Value> {
        debug!("Invoking {} for {}", self.endpoint_url, video_uri);
        let started = Instant::now();

        let response = self
            .client
            .post(&self.endpoint_url)
            .json(&InvocationRequest {
                video_path: video_uri,
            })
            .send()
            .await
            .map_err(|e| {
                error!("Inference request failed: {}", e);
                SentimentError::Inference(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Inference endpoint returned {}: {}", status, body);
            return Err(SentimentError::Inference(format!(
                "endpoint returned {}",
                status
            )));
        }

        let analysis = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| SentimentError::Inference(format!("invalid response body: {}", e)))?;

        info!(
            "Analyzed {} in {} ms",
            video_uri,
            started.elapsed().as_millis()
        );
        Ok(analysis)
    }

    fn endpoint_name(&self) -> &str {
        &self.endpoint_url
    }
}
