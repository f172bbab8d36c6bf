//! HTTP client for the viewer's store bridge.

use std::time::Duration;

use async_trait::async_trait;
use cure_models::{Image, ImageId, LayerId};
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::store::ImageStore;
use crate::types::{AddImageRequest, AddLayerRequest, CreatedResponse, ImagePayload};

/// Configuration for [`HttpImageStore`].
#[derive(Debug, Clone)]
pub struct HttpStoreConfig {
    /// Base URL of the store bridge, without a trailing slash
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl HttpStoreConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> StoreResult<Self> {
        let base_url = std::env::var("STORE_URL")
            .map_err(|_| StoreError::config_error("STORE_URL not set"))?;
        let mut config = Self::new(base_url);
        if let Some(secs) = std::env::var("STORE_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

/// Image store reached over HTTP. Requests are not retried.
#[derive(Clone)]
pub struct HttpImageStore {
    client: Client,
    base_url: String,
}

impl HttpImageStore {
    pub fn new(config: HttpStoreConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::config_error(format!("failed to build HTTP client: {}", e)))?;
        info!(base_url = %config.base_url, "HTTP image store configured");
        Ok(Self {
            client,
            base_url: config.base_url,
        })
    }

    pub fn from_env() -> StoreResult<Self> {
        Self::new(HttpStoreConfig::from_env()?)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// `{base}/images/{id}` with the ID percent-encoded as one path segment.
    fn image_url(&self, id: &ImageId) -> StoreResult<Url> {
        let mut url = Url::parse(&self.url("images"))
            .map_err(|e| StoreError::config_error(format!("invalid store URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::config_error("store URL cannot be a base"))?
            .push(id.as_str());
        Ok(url)
    }

    /// Map the status to an error, or decode the JSON body.
    async fn decode<T: DeserializeOwned>(response: Response, what: &str) -> StoreResult<T> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::not_found(what));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::request_failed(format!(
                "{} returned {}: {}",
                what, status, body
            )));
        }
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl ImageStore for HttpImageStore {
    async fn fetch_image(&self, id: &ImageId) -> StoreResult<Image> {
        debug!(image_id = %id, "Fetching image");
        let response = self
            .client
            .get(self.image_url(id)?)
            .send()
            .await?;
        let payload: ImagePayload = Self::decode(response, id.as_str()).await?;
        payload.into_image()
    }

    async fn add_image(&self, name: &str, image: Image) -> StoreResult<ImageId> {
        let request = AddImageRequest {
            name: name.to_string(),
            image: ImagePayload::from(&image),
        };
        let response = self
            .client
            .post(self.url("images"))
            .json(&request)
            .send()
            .await?;
        let created: CreatedResponse = Self::decode(response, "POST images").await?;
        let id = created.image_id();
        info!(image_id = %id, name, "Registered image");
        Ok(id)
    }

    async fn add_layer(&self, base: &ImageId, overlay: &ImageId) -> StoreResult<LayerId> {
        let request = AddLayerRequest {
            base: base.clone(),
            overlay: overlay.clone(),
        };
        let response = self
            .client
            .post(self.url("layers"))
            .json(&request)
            .send()
            .await?;
        let created: CreatedResponse = Self::decode(response, "POST layers").await?;
        let layer = created.layer_id();
        info!(layer_id = %layer, base = %base, overlay = %overlay, "Added layer");
        Ok(layer)
    }

    async fn health_check(&self) -> bool {
        match self.client.get(self.url("health")).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!(error = %e, "Image store health check failed");
                false
            }
        }
    }
}
