//! Model configuration.

use std::path::PathBuf;
use std::str::FromStr;

use candle_core::Device;
use cure_models::DEFAULT_NUM_CLASSES;

use crate::convnext::{ConvNextConfig, LayerPath};
use crate::error::{VisionError, VisionResult};

/// Side length of the square network input (same as training).
pub const IMG_SIZE: usize = 256;

/// Layer whose activations feed the saliency map.
pub const DEFAULT_TARGET_LAYER: &str = "stages.3.blocks.2.conv_dw";

/// Default location of the trained weights.
pub const DEFAULT_WEIGHTS_PATH: &str = "./custom/CE_seed_42.pth";

/// When the network weights are read from disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPolicy {
    /// Reload the weights file on every call.
    #[default]
    PerRequest,
    /// Load once into a process-wide handle (explicit init/teardown).
    Shared,
}

impl FromStr for LoadPolicy {
    type Err = VisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "per_request" | "per-request" => Ok(LoadPolicy::PerRequest),
            "shared" => Ok(LoadPolicy::Shared),
            other => Err(VisionError::invalid_config(format!(
                "unknown load policy '{}'",
                other
            ))),
        }
    }
}

/// Compute device selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePreference {
    /// First CUDA device when available, otherwise CPU.
    #[default]
    Auto,
    Cpu,
    Cuda(usize),
}

impl DevicePreference {
    pub fn resolve(&self) -> VisionResult<Device> {
        match self {
            DevicePreference::Auto => Ok(Device::cuda_if_available(0)?),
            DevicePreference::Cpu => Ok(Device::Cpu),
            DevicePreference::Cuda(ordinal) => Ok(Device::new_cuda(*ordinal)?),
        }
    }
}

impl FromStr for DevicePreference {
    type Err = VisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "auto" => Ok(DevicePreference::Auto),
            "cpu" => Ok(DevicePreference::Cpu),
            "cuda" => Ok(DevicePreference::Cuda(0)),
            _ => s
                .strip_prefix("cuda:")
                .and_then(|n| n.parse().ok())
                .map(DevicePreference::Cuda)
                .ok_or_else(|| VisionError::invalid_config(format!("unknown device '{}'", s))),
        }
    }
}

/// Classifier and saliency configuration.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Serialized weights (`.safetensors` or PyTorch `.pth`)
    pub weights_path: PathBuf,
    /// Network architecture
    pub arch: ConvNextConfig,
    /// Size of the label set
    pub num_classes: usize,
    /// Layer used for GradCAM
    pub target_layer: LayerPath,
    /// Network input side length
    pub img_size: usize,
    /// Weight loading policy
    pub load_policy: LoadPolicy,
    /// Compute device
    pub device: DevicePreference,
    /// Optional directory receiving PNG previews of every saliency map
    pub debug_dir: Option<PathBuf>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            weights_path: PathBuf::from(DEFAULT_WEIGHTS_PATH),
            arch: ConvNextConfig::small(),
            num_classes: DEFAULT_NUM_CLASSES,
            target_layer: LayerPath { stage: 3, block: 2 },
            img_size: IMG_SIZE,
            load_policy: LoadPolicy::PerRequest,
            device: DevicePreference::Auto,
            debug_dir: None,
        }
    }
}

impl ModelConfig {
    /// Create config from environment variables.
    pub fn from_env() -> VisionResult<Self> {
        let defaults = Self::default();

        let arch = match std::env::var("MODEL_ARCH") {
            Ok(name) => ConvNextConfig::from_name(&name)
                .ok_or_else(|| VisionError::invalid_config(format!("unknown arch '{}'", name)))?,
            Err(_) => defaults.arch,
        };

        let target_layer = match std::env::var("MODEL_TARGET_LAYER") {
            Ok(path) => path.parse()?,
            Err(_) => defaults.target_layer,
        };

        let load_policy = match std::env::var("MODEL_LOAD_POLICY") {
            Ok(policy) => policy.parse()?,
            Err(_) => defaults.load_policy,
        };

        let device = match std::env::var("MODEL_DEVICE") {
            Ok(device) => device.parse()?,
            Err(_) => defaults.device,
        };

        let config = Self {
            weights_path: std::env::var("MODEL_WEIGHTS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.weights_path),
            arch,
            num_classes: std::env::var("MODEL_NUM_CLASSES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.num_classes),
            target_layer,
            img_size: std::env::var("MODEL_IMG_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.img_size),
            load_policy,
            device,
            debug_dir: std::env::var("SALIENCY_DEBUG_DIR").ok().map(PathBuf::from),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the settings are mutually consistent.
    pub fn validate(&self) -> VisionResult<()> {
        if self.num_classes == 0 {
            return Err(VisionError::invalid_config("num_classes must be positive"));
        }
        if self.img_size == 0 {
            return Err(VisionError::invalid_config("img_size must be positive"));
        }
        self.arch.validate()?;
        self.arch.check_layer(self.target_layer)?;
        Ok(())
    }
}
