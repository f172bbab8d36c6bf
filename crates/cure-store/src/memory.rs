//! In-process image store.

use std::collections::HashMap;

use async_trait::async_trait;
use cure_models::{Image, ImageId, LayerId};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::store::ImageStore;

#[derive(Debug, Default)]
struct Inner {
    images: HashMap<ImageId, Image>,
    /// Images registered through [`ImageStore::add_image`], in order.
    registered: Vec<(ImageId, String)>,
    layers: Vec<(LayerId, ImageId, ImageId)>,
}

/// Image store held in memory, for local runs and tests.
#[derive(Debug, Default)]
pub struct InMemoryImageStore {
    inner: RwLock<Inner>,
}

impl InMemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an image under a known ID.
    pub async fn insert(&self, id: ImageId, image: Image) {
        self.inner.write().await.images.insert(id, image);
    }

    /// `(id, name)` of every image added through the store API.
    pub async fn registered_images(&self) -> Vec<(ImageId, String)> {
        self.inner.read().await.registered.clone()
    }

    /// `(layer, base, overlay)` of every layer request.
    pub async fn layers(&self) -> Vec<(LayerId, ImageId, ImageId)> {
        self.inner.read().await.layers.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.images.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.images.is_empty()
    }
}

#[async_trait]
impl ImageStore for InMemoryImageStore {
    async fn fetch_image(&self, id: &ImageId) -> StoreResult<Image> {
        self.inner
            .read()
            .await
            .images
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(id.as_str()))
    }

    async fn add_image(&self, name: &str, image: Image) -> StoreResult<ImageId> {
        let id = ImageId::new();
        let mut inner = self.inner.write().await;
        inner.images.insert(id.clone(), image);
        inner.registered.push((id.clone(), name.to_string()));
        debug!(image_id = %id, name, "Registered image");
        Ok(id)
    }

    async fn add_layer(&self, base: &ImageId, overlay: &ImageId) -> StoreResult<LayerId> {
        let mut inner = self.inner.write().await;
        for id in [base, overlay] {
            if !inner.images.contains_key(id) {
                return Err(StoreError::not_found(id.as_str()));
            }
        }
        let layer = LayerId::new();
        inner
            .layers
            .push((layer.clone(), base.clone(), overlay.clone()));
        debug!(layer_id = %layer, base = %base, overlay = %overlay, "Added layer");
        Ok(layer)
    }

    async fn health_check(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cure_models::SpatialMetadata;

    fn image() -> Image {
        Image::from_shape_vec(&[2, 2], vec![0.0, 1.0, 2.0, 3.0], SpatialMetadata::identity())
            .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_seeded_image() {
        let store = InMemoryImageStore::new();
        let id = ImageId::from("img-1");
        store.insert(id.clone(), image()).await;

        assert_eq!(store.fetch_image(&id).await.unwrap(), image());
        assert!(matches!(
            store.fetch_image(&ImageId::from("missing")).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_add_image_and_layer() {
        let store = InMemoryImageStore::new();
        let base = ImageId::from("base");
        store.insert(base.clone(), image()).await;

        let overlay = store.add_image("Gradcam image", image()).await.unwrap();
        let layer = store.add_layer(&base, &overlay).await.unwrap();

        assert_eq!(store.len().await, 2);
        assert_eq!(
            store.registered_images().await,
            vec![(overlay.clone(), "Gradcam image".to_string())]
        );
        assert_eq!(store.layers().await, vec![(layer, base, overlay)]);
    }

    #[tokio::test]
    async fn test_layer_requires_known_images() {
        let store = InMemoryImageStore::new();
        let base = ImageId::from("base");
        store.insert(base.clone(), image()).await;

        let err = store
            .add_layer(&base, &ImageId::from("ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(store.layers().await.is_empty());
    }
}
