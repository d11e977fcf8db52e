//! API Server - HTTP server for REST API

use axum::{
    extract::{FromRequest, FromRequestParts, Request, State},
    http::{request::Parts, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::api::auth::{bearer_token, ApiCaller, Claims};
use crate::api::handlers::{self, ApiError, AppState};
use crate::error::SentimentError;

/// API Server configuration
pub struct ApiServer {
    state: Arc<AppState>,
    addr: String,
}

impl ApiServer {
    pub fn new(state: AppState, addr: String) -> Self {
        Self {
            state: Arc::new(state),
            addr,
        }
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Start the API server
    pub async fn run(&self) -> std::io::Result<()> {
        let router = self.router();

        info!("Starting API server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}

/// Build the full router over `state`
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public_routes = Router::new().route("/health", get(handlers::health));

    // Dashboard routes (session token)
    let session_routes = Router::new()
        .route("/quota", get(handlers::get_quota))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session_middleware,
        ));

    // Billable routes (API key)
    let api_key_routes = Router::new()
        .route("/upload-url", post(handlers::create_upload_url))
        .route("/sentiment-inference", post(handlers::sentiment_inference))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api_key_middleware,
        ));

    Router::new()
        .nest(
            "/api",
            public_routes.merge(session_routes).merge(api_key_routes),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn unauthorized(msg: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(ApiError::new(msg))).into_response()
}

/// Session middleware - validates the dashboard JWT
async fn session_middleware(
    State(state): State<Arc<AppState>>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(req.headers()) else {
        warn!("Missing or invalid Authorization header");
        return unauthorized("Not authenticated");
    };

    match state.jwt_config.validate_token(token) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(e) => {
            warn!("Invalid JWT token: {}", e);
            unauthorized("Invalid or expired token")
        }
    }
}

/// API key middleware - resolves the bearer key to its owner
async fn api_key_middleware(
    State(state): State<Arc<AppState>>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let Some(secret) = bearer_token(req.headers()) else {
        return unauthorized("API key is required");
    };

    match state.ledger.identify(secret).await {
        Ok(Some(record)) => {
            req.extensions_mut().insert(ApiCaller {
                owner: record.owner,
            });
            next.run(req).await
        }
        Ok(None) => {
            warn!("Rejected unknown API key");
            unauthorized("Invalid API key")
        }
        Err(e) => e.into_response(),
    }
}

/// Extract Claims from request (for handlers)
#[axum::async_trait]
impl<S> FromRequestParts<S> for Claims
where
    S: Send + Sync,
{
    type Rejection = SentimentError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .ok_or_else(|| SentimentError::Unauthorized("Not authenticated".to_string()))
    }
}

/// Extract the API key owner from request (for handlers)
#[axum::async_trait]
impl<S> FromRequestParts<S> for ApiCaller
where
    S: Send + Sync,
{
    type Rejection = SentimentError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ApiCaller>()
            .cloned()
            .ok_or_else(|| SentimentError::Unauthorized("Invalid API key".to_string()))
    }
}

/// JSON body extractor whose rejections use the API error format
pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = SentimentError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| SentimentError::InvalidRequest(rejection.body_text()))?;
        Ok(Self(value))
    }
}
