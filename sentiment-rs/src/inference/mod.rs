//! Sentiment inference endpoint abstraction

use async_trait::async_trait;

use crate::error::Result;

pub mod http;
pub mod mock;

pub use http::HttpInferenceClient;
pub use mock::MockInference;

/// Runs sentiment analysis on a stored video
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Analyze the video at `video_uri` and return the endpoint's JSON output
    async fn analyze(&self, video_uri: &str) -> Result<serde_json::Value>;

    /// Endpoint name for logs
    fn endpoint_name(&self) -> &str;
}
