//! API configuration.

use std::str::FromStr;
use std::time::Duration;

use crate::error::ApiError;

/// Which image store the server talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    /// Process-local store, empty at startup
    Memory,
    /// Viewer store bridge at `STORE_URL`
    #[default]
    Http,
}

impl FromStr for StoreBackend {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "http" => Ok(StoreBackend::Http),
            other => Err(ApiError::internal(format!("unknown store backend '{}'", other))),
        }
    }
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Request timeout
    pub request_timeout: Duration,
    /// Max request body size
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Image store backend
    pub store_backend: StoreBackend,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            // GradCAM on CPU takes a while for the full-size network
            request_timeout: Duration::from_secs(300),
            max_body_size: 64 * 1024, // 64KB
            environment: "development".to_string(),
            store_backend: StoreBackend::Http,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Result<Self, ApiError> {
        let defaults = Self::default();
        let store_backend = match std::env::var("STORE_BACKEND") {
            Ok(backend) => backend.parse()?,
            Err(_) => defaults.store_backend,
        };

        Ok(Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            request_timeout: std::env::var("REQUEST_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_body_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            store_backend,
        })
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_store_backend() {
        assert_eq!("memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!(" HTTP ".parse::<StoreBackend>().unwrap(), StoreBackend::Http);
        assert!("s3".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_default_store_is_http() {
        assert_eq!(ApiConfig::default().store_backend, StoreBackend::Http);
        assert_eq!(StoreBackend::default(), StoreBackend::Http);
    }

    #[test]
    fn test_production_flag() {
        let config = ApiConfig {
            environment: "Production".to_string(),
            ..ApiConfig::default()
        };
        assert!(config.is_production());
        assert!(!ApiConfig::default().is_production());
    }
}
