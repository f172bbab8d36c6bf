//! Weight loading and the model handle.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use tracing::{debug, info};

use crate::config::{LoadPolicy, ModelConfig};
use crate::convnext::{ConvNeXt, ConvNextConfig};
use crate::error::{VisionError, VisionResult};

/// Load a ConvNeXt from `.safetensors` or a PyTorch `.pth`/`.pt` state dict.
pub fn load_convnext(
    weights_path: &Path,
    arch: &ConvNextConfig,
    num_classes: usize,
    device: &Device,
) -> VisionResult<ConvNeXt> {
    if !weights_path.is_file() {
        return Err(VisionError::ModelNotFound(weights_path.to_path_buf()));
    }

    let extension = weights_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    let vb = match extension.as_str() {
        // SAFETY: the weights file is treated as read-only for the lifetime of the mapping.
        "safetensors" => unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, device)?
        },
        "pth" | "pt" | "bin" => VarBuilder::from_pth(weights_path, DType::F32, device)?,
        other => {
            return Err(VisionError::UnsupportedWeights(format!(
                "'{}' ({})",
                other,
                weights_path.display()
            )))
        }
    };

    ConvNeXt::load(arch, num_classes, vb)
}

/// Hands out the network for each request.
///
/// With [`LoadPolicy::PerRequest`] every call reads the weights file again.
/// With [`LoadPolicy::Shared`] the first call (or [`ModelProvider::init`])
/// loads it once and later calls reuse it until [`ModelProvider::teardown`].
pub struct ModelProvider {
    config: ModelConfig,
    device: Device,
    shared: Mutex<Option<Arc<ConvNeXt>>>,
}

impl ModelProvider {
    pub fn new(config: ModelConfig) -> VisionResult<Self> {
        config.validate()?;
        let device = config.device.resolve()?;
        info!(
            weights = %config.weights_path.display(),
            policy = ?config.load_policy,
            device = ?device,
            "Model provider configured"
        );
        Ok(Self {
            config,
            device,
            shared: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Eagerly load the shared handle. No-op for per-request loading.
    pub fn init(&self) -> VisionResult<()> {
        if self.config.load_policy == LoadPolicy::Shared {
            self.acquire()?;
        }
        Ok(())
    }

    /// Drop the shared handle; the next call reloads from disk.
    pub fn teardown(&self) -> VisionResult<()> {
        let mut shared = self.lock_shared()?;
        if shared.take().is_some() {
            info!("Shared model released");
        }
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.shared.lock().map(|s| s.is_some()).unwrap_or(false)
    }

    /// Get a model according to the load policy.
    pub fn acquire(&self) -> VisionResult<Arc<ConvNeXt>> {
        match self.config.load_policy {
            LoadPolicy::PerRequest => Ok(Arc::new(self.load()?)),
            LoadPolicy::Shared => {
                let mut shared = self.lock_shared()?;
                if let Some(model) = shared.as_ref() {
                    return Ok(Arc::clone(model));
                }
                let model = Arc::new(self.load()?);
                *shared = Some(Arc::clone(&model));
                Ok(model)
            }
        }
    }

    fn load(&self) -> VisionResult<ConvNeXt> {
        let start = Instant::now();
        let model = load_convnext(
            &self.config.weights_path,
            &self.config.arch,
            self.config.num_classes,
            &self.device,
        )?;
        debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded model weights"
        );
        Ok(model)
    }

    fn lock_shared(&self) -> VisionResult<std::sync::MutexGuard<'_, Option<Arc<ConvNeXt>>>> {
        self.shared
            .lock()
            .map_err(|_| VisionError::internal("model handle lock poisoned"))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::DevicePreference;
    use crate::convnext::tests::micro_config;
    use crate::convnext::LayerPath;
    use candle_nn::VarMap;
    use std::path::PathBuf;

    /// Write randomly initialised micro-network weights into `dir`.
    pub(crate) fn write_micro_weights(dir: &Path) -> PathBuf {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        ConvNeXt::load(&micro_config(), 2, vb).unwrap();
        let path = dir.join("weights.safetensors");
        varmap.save(&path).unwrap();
        path
    }

    pub(crate) fn micro_model_config(weights_path: PathBuf, load_policy: LoadPolicy) -> ModelConfig {
        ModelConfig {
            weights_path,
            arch: micro_config(),
            num_classes: 2,
            target_layer: LayerPath { stage: 1, block: 1 },
            img_size: 32,
            load_policy,
            device: DevicePreference::Cpu,
            debug_dir: None,
        }
    }

    #[test]
    fn test_missing_weights_file() {
        let err = load_convnext(
            Path::new("/nonexistent/CE_seed_42.pth"),
            &micro_config(),
            2,
            &Device::Cpu,
        )
        .unwrap_err();
        assert!(matches!(err, VisionError::ModelNotFound(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.onnx");
        std::fs::write(&path, b"not a model").unwrap();
        let err = load_convnext(&path, &micro_config(), 2, &Device::Cpu).unwrap_err();
        assert!(matches!(err, VisionError::UnsupportedWeights(_)));
    }

    #[test]
    fn test_architecture_mismatch_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_micro_weights(dir.path());
        let wider = ConvNextConfig {
            in_channels: 1,
            depths: vec![1, 2],
            dims: vec![8, 16],
        };
        assert!(load_convnext(&path, &wider, 2, &Device::Cpu).is_err());
    }

    #[test]
    fn test_shared_policy_reuses_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_micro_weights(dir.path());
        let provider = ModelProvider::new(micro_model_config(path, LoadPolicy::Shared)).unwrap();

        assert!(!provider.is_loaded());
        provider.init().unwrap();
        assert!(provider.is_loaded());

        let a = provider.acquire().unwrap();
        let b = provider.acquire().unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        provider.teardown().unwrap();
        assert!(!provider.is_loaded());
        let c = provider.acquire().unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_per_request_policy_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_micro_weights(dir.path());
        let provider =
            ModelProvider::new(micro_model_config(path, LoadPolicy::PerRequest)).unwrap();

        provider.init().unwrap();
        assert!(!provider.is_loaded());
        let a = provider.acquire().unwrap();
        let b = provider.acquire().unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
