//! Axum RPC server for image categorization.
//!
//! This crate provides:
//! - The `categorize_image` RPC: fetch, classify, GradCAM, register overlay
//! - Health, readiness and Prometheus endpoints
//! - Request ID, logging, CORS and body-limit middleware

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use config::{ApiConfig, StoreBackend};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::CategorizeService;
pub use state::AppState;
