//! Classification and saliency entry points.

use std::path::PathBuf;
use std::time::Instant;

use cure_models::{Category, Image};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::classifier::classify;
use crate::config::ModelConfig;
use crate::error::{VisionError, VisionResult};
use crate::gradcam::GradCam;
use crate::model::ModelProvider;
use crate::preprocess::Preprocessor;
use crate::saliency::SaliencyMap;

/// Runs the preprocessing pipeline and the network on single images.
///
/// Each call preprocesses its input on its own and asks the provider for a
/// model, so [`ImageAnalyzer::categorize`] and
/// [`ImageAnalyzer::compute_gradcam`] can be used independently.
pub struct ImageAnalyzer {
    provider: ModelProvider,
    preprocessor: Preprocessor,
    gradcam: GradCam,
}

impl ImageAnalyzer {
    pub fn new(config: ModelConfig) -> VisionResult<Self> {
        let preprocessor = Preprocessor::new(config.img_size);
        let gradcam = GradCam::new(config.target_layer);
        let provider = ModelProvider::new(config)?;
        Ok(Self {
            provider,
            preprocessor,
            gradcam,
        })
    }

    pub fn from_env() -> VisionResult<Self> {
        Self::new(ModelConfig::from_env()?)
    }

    pub fn provider(&self) -> &ModelProvider {
        &self.provider
    }

    /// Predict the category of `image`.
    pub fn categorize(&self, image: &Image) -> VisionResult<Category> {
        let start = Instant::now();
        let prepared = self.preprocessor.run(image)?;
        let model = self.provider.acquire()?;
        let input = prepared.to_tensor(self.provider.device())?;

        let prediction = classify(&model, &input)?;
        info!(
            category = %prediction.category,
            scores = ?prediction.scores,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Image categorized"
        );
        Ok(prediction.category)
    }

    /// Saliency map of `category` for `image`, in preprocessed space.
    ///
    /// The returned image is `(1, S, S)` with metadata mapping the
    /// preprocessed grid back onto the source image's physical space.
    pub fn compute_gradcam(&self, image: &Image, category: Category) -> VisionResult<Image> {
        let start = Instant::now();
        let prepared = self.preprocessor.run(image)?;
        let model = self.provider.acquire()?;
        let input = prepared.to_tensor(self.provider.device())?;

        let values = self.gradcam.compute(&model, &input, category)?;
        let saliency = SaliencyMap::new(values, *prepared.affine());
        self.write_debug_preview(&saliency);

        let result = saliency.into_image()?;
        info!(
            category = %category,
            layer = %self.gradcam.layer(),
            shape = ?result.shape(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Saliency map computed"
        );
        Ok(result)
    }

    fn write_debug_preview(&self, saliency: &SaliencyMap) {
        let Some(dir) = &self.provider.config().debug_dir else {
            return;
        };
        let path: PathBuf = dir.join(format!("gradcam-{}.png", Uuid::new_v4()));
        let written = std::fs::create_dir_all(dir)
            .map_err(VisionError::from)
            .and_then(|_| saliency.write_png(&path));
        match written {
            Ok(()) => debug!(path = %path.display(), "Wrote saliency preview"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to write saliency preview"),
        }
    }
}
