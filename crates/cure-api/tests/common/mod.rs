#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use candle_core::{DType, Device};
use candle_nn::{VarBuilder, VarMap};
use cure_models::{Image, SpatialMetadata};
use cure_vision::{
    ConvNeXt, ConvNextConfig, DevicePreference, ImageAnalyzer, LayerPath, LoadPolicy, ModelConfig,
};

pub fn micro_arch() -> ConvNextConfig {
    ConvNextConfig {
        in_channels: 1,
        depths: vec![1, 2],
        dims: vec![4, 8],
    }
}

/// Save randomly initialised two-class weights under `dir`.
pub fn write_weights(dir: &Path) -> PathBuf {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    ConvNeXt::load(&micro_arch(), 2, vb).unwrap();
    let path = dir.join("weights.safetensors");
    varmap.save(&path).unwrap();
    path
}

pub fn model_config(weights_path: PathBuf) -> ModelConfig {
    ModelConfig {
        weights_path,
        arch: micro_arch(),
        num_classes: 2,
        target_layer: LayerPath { stage: 1, block: 1 },
        img_size: 32,
        load_policy: LoadPolicy::PerRequest,
        device: DevicePreference::Cpu,
        debug_dir: None,
    }
}

pub fn analyzer(weights_path: PathBuf) -> Arc<ImageAnalyzer> {
    Arc::new(ImageAnalyzer::new(model_config(weights_path)).unwrap())
}

/// 100 x 200 image at the origin with unit spacing and identity direction.
pub fn synthetic_image() -> Image {
    let values = (0..100 * 200)
        .map(|i| {
            let (y, x) = (i / 200, i % 200);
            ((x as f32 - 100.0).powi(2) + (y as f32 - 50.0).powi(2)).sqrt() / 112.0
        })
        .collect();
    Image::from_shape_vec(&[100, 200], values, SpatialMetadata::identity()).unwrap()
}
