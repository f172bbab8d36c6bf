//! The `categorize_image` operation.

use std::sync::Arc;
use std::time::Instant;

use cure_models::{Category, Image, ImageId};
use cure_store::ImageStore;
use cure_vision::{ImageAnalyzer, VisionResult};
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::metrics;

/// Display name of the registered saliency overlay.
pub const GRADCAM_IMAGE_NAME: &str = "Gradcam image";

/// Longest accepted image ID.
pub const MAX_IMAGE_ID_LEN: usize = 256;

/// Classifies a stored image and overlays its GradCAM map in the viewer.
#[derive(Clone)]
pub struct CategorizeService {
    store: Arc<dyn ImageStore>,
    analyzer: Arc<ImageAnalyzer>,
}

impl CategorizeService {
    pub fn new(store: Arc<dyn ImageStore>, analyzer: Arc<ImageAnalyzer>) -> Self {
        Self { store, analyzer }
    }

    /// Fetch `image_id`, categorize it, register its saliency map as a new
    /// image and layer that over the original.
    ///
    /// Steps run strictly in order. A failure at any step ends the call; the
    /// store is only written to after inference has succeeded.
    pub async fn categorize_image(&self, image_id: &ImageId) -> ApiResult<Category> {
        let result = self.run(image_id).await;
        match &result {
            Ok(category) => metrics::record_category(*category),
            Err(e) => {
                warn!(image_id = %image_id, error = %e, "categorize_image failed");
                metrics::record_categorize_failure(e.kind());
            }
        }
        result
    }

    async fn run(&self, image_id: &ImageId) -> ApiResult<Category> {
        validate_image_id(image_id)?;
        let total = Instant::now();

        let start = Instant::now();
        let image = self.store.fetch_image(image_id).await?;
        metrics::record_stage_duration("fetch", start.elapsed().as_secs_f64());

        let start = Instant::now();
        let (category, saliency) = self.analyze(image).await?;
        metrics::record_stage_duration("inference", start.elapsed().as_secs_f64());

        let start = Instant::now();
        let overlay = self.store.add_image(GRADCAM_IMAGE_NAME, saliency).await?;
        metrics::record_stage_duration("register", start.elapsed().as_secs_f64());

        let start = Instant::now();
        let layer = self.store.add_layer(image_id, &overlay).await?;
        metrics::record_stage_duration("layer", start.elapsed().as_secs_f64());

        info!(
            image_id = %image_id,
            category = %category,
            overlay_id = %overlay,
            layer_id = %layer,
            elapsed_ms = total.elapsed().as_millis() as u64,
            "Image categorized"
        );
        Ok(category)
    }

    /// Classification then GradCAM, off the async runtime.
    async fn analyze(&self, image: Image) -> ApiResult<(Category, Image)> {
        let analyzer = Arc::clone(&self.analyzer);
        let outcome = tokio::task::spawn_blocking(move || -> VisionResult<(Category, Image)> {
            let category = analyzer.categorize(&image)?;
            let saliency = analyzer.compute_gradcam(&image, category)?;
            Ok((category, saliency))
        })
        .await
        .map_err(|e| ApiError::internal(format!("inference task failed: {}", e)))?;
        Ok(outcome?)
    }
}

fn validate_image_id(image_id: &ImageId) -> ApiResult<()> {
    let id = image_id.as_str();
    if id.trim().is_empty() {
        return Err(ApiError::bad_request("img_id must not be empty"));
    }
    if id.chars().count() > MAX_IMAGE_ID_LEN {
        return Err(ApiError::bad_request(format!(
            "img_id longer than {} characters",
            MAX_IMAGE_ID_LEN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_image_id() {
        assert!(validate_image_id(&ImageId::from("1.2.840.113619")).is_ok());
        assert!(validate_image_id(&ImageId::from("  ")).is_err());
        assert!(validate_image_id(&ImageId::from("x".repeat(MAX_IMAGE_ID_LEN))).is_ok());
        assert!(validate_image_id(&ImageId::from("x".repeat(MAX_IMAGE_ID_LEN + 1))).is_err());
    }
}
