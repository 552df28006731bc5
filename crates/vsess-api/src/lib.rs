//! Axum HTTP API server for the video session service.
//!
//! This crate provides:
//! - Upload, frame preview, crop transform and download endpoints
//! - The session service composing storage, registry and FFmpeg
//! - Rate limiting and security headers
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use config::{ApiConfig, SessionConfig};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::{SessionError, SessionResult, SessionService};
pub use state::AppState;
