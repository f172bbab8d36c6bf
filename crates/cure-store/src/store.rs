//! The image store abstraction.

use async_trait::async_trait;
use cure_models::{Image, ImageId, LayerId};

use crate::error::StoreResult;

/// Storage of images and overlay layers, keyed by opaque IDs.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Fetch the image registered under `id`.
    async fn fetch_image(&self, id: &ImageId) -> StoreResult<Image>;

    /// Register `image` under a display name and return its new ID.
    async fn add_image(&self, name: &str, image: Image) -> StoreResult<ImageId>;

    /// Layer `overlay` on top of `base`.
    async fn add_layer(&self, base: &ImageId, overlay: &ImageId) -> StoreResult<LayerId>;

    /// Whether the store is reachable.
    async fn health_check(&self) -> bool;
}
