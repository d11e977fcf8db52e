//! REST API module for sentiment-rs
//!
//! Provides HTTP API endpoints for uploads, inference and quota lookup

pub mod auth;
pub mod handlers;
pub mod server;

pub use handlers::AppState;
pub use server::{router, ApiServer};
