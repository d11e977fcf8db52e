//! Mock inference endpoint for testing

use async_trait::async_trait;
use std::sync::Mutex;
use tracing::debug;

use super::InferenceClient;
use crate::error::{Result, SentimentError};

/// Returns a canned analysis and records every video it was asked about
pub struct MockInference {
    response: serde_json::Value,
    failure: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl MockInference {
    pub fn new() -> Self {
        Self::with_response(serde_json::json!({
            "utterances": [{
                "start_time": 0.0,
                "end_time": 2.5,
                "text": "mock utterance",
                "emotions": [{ "label": "joy", "confidence": 0.91 }],
                "sentiments": [{ "label": "positive", "confidence": 0.88 }]
            }]
        }))
    }

    pub fn with_response(response: serde_json::Value) -> Self {
        Self {
            response,
            failure: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A mock whose every call fails with `message`
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::new()
        }
    }

    /// Video URIs passed to `analyze`, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Default for MockInference {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InferenceClient for MockInference {
    async fn analyze(&self, video_uri: &str) -> Result<serde_json::Value> {
        debug!("Mock inference for {}", video_uri);
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(video_uri.to_string());

        match &self.failure {
            Some(message) => Err(SentimentError::Inference(message.clone())),
            None => Ok(self.response.clone()),
        }
    }

    fn endpoint_name(&self) -> &str {
        "mock-inference"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_calls() {
        let mock = MockInference::new();
        let result = mock.analyze("s3://bucket/a.mp4").await.unwrap();
        assert!(result["utterances"].is_array());
        assert_eq!(mock.calls(), vec!["s3://bucket/a.mp4".to_string()]);
    }

    #[tokio::test]
    async fn test_failing() {
        let mock = MockInference::failing("endpoint down");
        let result = mock.analyze("s3://bucket/a.mp4").await;
        assert!(matches!(result, Err(SentimentError::Inference(msg)) if msg == "endpoint down"));
        assert_eq!(mock.calls().len(), 1);
    }
}
