//! API request handlers

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::api::auth::{ApiCaller, Claims, JwtConfig};
use crate::api::server::ApiJson;
use crate::error::SentimentError;
use crate::files::FileStore;
use crate::inference::InferenceClient;
use crate::quota::{Clock, QuotaLedger};
use crate::storage::{plan_upload, UploadSigner};

/// Shared application state
pub struct AppState {
    pub ledger: QuotaLedger,
    pub files: Arc<dyn FileStore>,
    pub signer: Arc<dyn UploadSigner>,
    pub inference: Arc<dyn InferenceClient>,
    pub jwt_config: JwtConfig,
    pub clock: Arc<dyn Clock>,
}

/// API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    pub fn new(msg: &str) -> Self {
        Self {
            error: msg.to_string(),
        }
    }
}

impl IntoResponse for SentimentError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            SentimentError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            SentimentError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            SentimentError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            SentimentError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            SentimentError::AlreadyAnalyzed(_) => {
                (StatusCode::BAD_REQUEST, "File already analyzed".to_string())
            }
            SentimentError::QuotaExceeded => {
                (StatusCode::TOO_MANY_REQUESTS, "Monthly quota exceeded".to_string())
            }
            SentimentError::Inference(_) => {
                error!("{}", self);
                (StatusCode::BAD_GATEWAY, "Inference failed".to_string())
            }
            _ if self.is_transient() => {
                error!("{}", self);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service temporarily unavailable".to_string(),
                )
            }
            _ => {
                error!("{}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(ApiError { error: message })).into_response()
    }
}

/// Health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Dashboard view of the caller's API key and usage
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaResponse {
    pub secret_key: String,
    pub requests_used: u32,
    pub max_requests: u32,
    pub remaining: u32,
    pub window_start: DateTime<Utc>,
    pub resets_at: DateTime<Utc>,
}

/// Upload URL request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlRequest {
    pub file_type: Option<String>,
}

/// Upload URL response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlResponse {
    pub url: String,
    pub file_id: String,
    pub file_type: String,
    pub key: String,
    pub expires_at: DateTime<Utc>,
}

/// Inference request body
#[derive(Debug, Deserialize)]
pub struct InferenceRequest {
    pub key: Option<String>,
}

/// Inference response
#[derive(Debug, Serialize, Deserialize)]
pub struct InferenceResponse {
    pub analysis: serde_json::Value,
}

/// GET /api/health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// GET /api/quota - API key and usage for the session identity
///
/// Provisions the quota record on first access.
pub async fn get_quota(
    State(state): State<Arc<AppState>>,
    claims: Claims,
) -> Result<Json<QuotaResponse>, SentimentError> {
    let record = state.ledger.provision(&claims.sub).await?;
    let period = state.ledger.policy().reset_period;

    Ok(Json(QuotaResponse {
        remaining: record.remaining(),
        resets_at: record.resets_at(period),
        secret_key: record.secret,
        requests_used: record.used,
        max_requests: record.limit,
        window_start: record.window_start,
    }))
}

/// POST /api/upload-url - Issue a signed upload URL for a video
pub async fn create_upload_url(
    State(state): State<Arc<AppState>>,
    caller: ApiCaller,
    ApiJson(req): ApiJson<UploadUrlRequest>,
) -> Result<Json<UploadUrlResponse>, SentimentError> {
    let file_type = req
        .file_type
        .ok_or_else(|| SentimentError::InvalidRequest("Invalid file type".to_string()))?;
    let target = plan_upload(&file_type)?;

    let now = state.clock.now();
    let upload = state
        .signer
        .sign_upload(&target.key, &target.content_type, now)?;
    state.files.create(&target.key, &caller.owner, now).await?;

    info!("Issued upload URL for {} to {}", target.key, caller.owner);
    Ok(Json(UploadUrlResponse {
        url: upload.url,
        file_id: target.file_id.to_string(),
        file_type: target.extension,
        key: target.key,
        expires_at: upload.expires_at,
    }))
}

/// POST /api/sentiment-inference - Analyze an uploaded video
///
/// Counts against the caller's monthly quota once the file checks pass.
pub async fn sentiment_inference(
    State(state): State<Arc<AppState>>,
    caller: ApiCaller,
    ApiJson(req): ApiJson<InferenceRequest>,
) -> Result<Json<InferenceResponse>, SentimentError> {
    let key = req
        .key
        .filter(|key| !key.is_empty())
        .ok_or_else(|| SentimentError::InvalidRequest("Key is required".to_string()))?;

    let file = state
        .files
        .find(&key)
        .await?
        .ok_or_else(|| SentimentError::NotFound("File not found".to_string()))?;

    if file.owner != caller.owner {
        warn!("{} attempted to analyze {} owned by {}", caller.owner, key, file.owner);
        return Err(SentimentError::Forbidden("File belongs to another account".to_string()));
    }

    if file.analyzed {
        return Err(SentimentError::AlreadyAnalyzed(key));
    }

    if !state.ledger.admit(&caller.owner, true).await?.is_admitted() {
        return Err(SentimentError::QuotaExceeded);
    }

    let analysis = state
        .inference
        .analyze(&state.signer.storage_uri(&key))
        .await?;

    if !state.files.mark_analyzed(&key).await? {
        warn!("{} was marked analyzed by a concurrent request", key);
    }

    info!(
        "Analyzed {} for {} via {}",
        key,
        caller.owner,
        state.inference.endpoint_name()
    );
    Ok(Json(InferenceResponse { analysis }))
}
