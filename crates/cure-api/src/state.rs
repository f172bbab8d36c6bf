//! Application state.

use std::sync::Arc;

use cure_store::{HttpImageStore, ImageStore, InMemoryImageStore};
use cure_vision::ImageAnalyzer;
use tracing::{info, warn};

use crate::config::{ApiConfig, StoreBackend};
use crate::error::ApiResult;
use crate::services::CategorizeService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: Arc<dyn ImageStore>,
    pub analyzer: Arc<ImageAnalyzer>,
    pub categorize: CategorizeService,
}

impl AppState {
    /// Create state from the environment: store backend, model config and
    /// (for the shared load policy) the model itself.
    pub fn new(config: ApiConfig) -> ApiResult<Self> {
        let store: Arc<dyn ImageStore> = match config.store_backend {
            StoreBackend::Memory => {
                warn!("Using the in-memory image store; it starts empty and every lookup will 404");
                Arc::new(InMemoryImageStore::new())
            }
            StoreBackend::Http => Arc::new(HttpImageStore::from_env()?),
        };
        info!(backend = ?config.store_backend, "Image store ready");

        let analyzer = Arc::new(ImageAnalyzer::from_env()?);
        analyzer.provider().init()?;

        Ok(Self::from_parts(config, store, analyzer))
    }

    /// Assemble state from already-built parts.
    pub fn from_parts(
        config: ApiConfig,
        store: Arc<dyn ImageStore>,
        analyzer: Arc<ImageAnalyzer>,
    ) -> Self {
        let categorize = CategorizeService::new(Arc::clone(&store), Arc::clone(&analyzer));
        Self {
            config,
            store,
            analyzer,
            categorize,
        }
    }
}
