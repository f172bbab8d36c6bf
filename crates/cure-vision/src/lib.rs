//! Image preprocessing, ConvNeXt classification and GradCAM saliency.
//!
//! This crate provides:
//! - The fixed resize-to-longest-side + symmetric pad pipeline, with affine
//!   tracking so outputs stay registered in physical space
//! - A timm-compatible ConvNeXt network on candle
//! - Argmax classification and gradient-weighted class activation maps
//! - A model provider that reloads weights per request or keeps one shared handle

pub mod analyzer;
pub mod classifier;
pub mod config;
pub mod convnext;
pub mod error;
pub mod gradcam;
pub mod interpolate;
pub mod model;
pub mod preprocess;
pub mod saliency;

pub use analyzer::ImageAnalyzer;
pub use classifier::{classify, Prediction};
pub use config::{
    DevicePreference, LoadPolicy, ModelConfig, DEFAULT_TARGET_LAYER, DEFAULT_WEIGHTS_PATH,
    IMG_SIZE,
};
pub use convnext::{ConvNeXt, ConvNextConfig, LayerPath};
pub use error::{VisionError, VisionResult};
pub use gradcam::GradCam;
pub use model::{load_convnext, ModelProvider};
pub use preprocess::{PreprocessedTensor, Preprocessor};
pub use saliency::SaliencyMap;
