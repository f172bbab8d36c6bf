//! Gradient-weighted class activation maps.
//!
//! For the target layer activation `A` (channels `k`) and the class score `y`:
//! `w_k = mean(dy/dA_k)`, `map = relu(sum_k w_k * A_k)`. The map is upsampled
//! to the input size and rescaled so the strongest response is 0 and the
//! weakest is 1.

use candle_core::{Tensor, Var};
use cure_models::{Category, ModelError};
use ndarray::{Array2, Array3, ArrayView3, Axis, Zip};
use tracing::debug;

use crate::convnext::{ConvNeXt, LayerPath};
use crate::error::{VisionError, VisionResult};
use crate::interpolate::bilinear_resize;

/// GradCAM bound to one layer of the network.
#[derive(Debug, Clone, Copy)]
pub struct GradCam {
    layer: LayerPath,
}

impl GradCam {
    pub fn new(layer: LayerPath) -> Self {
        Self { layer }
    }

    pub fn layer(&self) -> LayerPath {
        self.layer
    }

    /// Saliency of `category` for a `(1, 1, H, W)` input, shaped `(H, W)`.
    pub fn compute(
        &self,
        model: &ConvNeXt,
        input: &Tensor,
        category: Category,
    ) -> VisionResult<Array2<f32>> {
        let (batch, _, height, width) = input.dims4()?;
        if batch != 1 {
            return Err(VisionError::invalid_shape(format!(
                "GradCAM expects a single image, got a batch of {}",
                batch
            )));
        }
        if category.index() >= model.num_classes() {
            return Err(ModelError::CategoryOutOfRange {
                index: category.index(),
                num_classes: model.num_classes(),
            }
            .into());
        }

        let (acti, shortcut) = model.forward_to(&input.detach(), self.layer)?;
        // Gradients are only kept for variables, so the activation becomes one.
        let acti = Var::from_tensor(&acti.detach())?;
        let logits = model.forward_from(self.layer, acti.as_tensor(), &shortcut.detach())?;

        let score = logits.narrow(1, category.index(), 1)?.sum_all()?;
        let grads = score.backward()?;
        let grad = grads
            .get(acti.as_tensor())
            .ok_or_else(|| VisionError::internal(format!("no gradient reached {}", self.layer)))?;

        let acti = to_array3(acti.as_tensor())?;
        let grad = to_array3(grad)?;
        let map = weighted_activation_map(acti.view(), grad.view());
        debug!(
            layer = %self.layer,
            map_shape = ?map.dim(),
            "Computed class activation map"
        );

        Ok(normalize_flipped(bilinear_resize(map.view(), height, width)))
    }
}

/// `(1, C, h, w)` tensor to a `(C, h, w)` array.
fn to_array3(tensor: &Tensor) -> VisionResult<Array3<f32>> {
    let (_, channels, height, width) = tensor.dims4()?;
    let values: Vec<f32> = tensor.flatten_all()?.to_vec1()?;
    Array3::from_shape_vec((channels, height, width), values)
        .map_err(|e| VisionError::internal(e.to_string()))
}

/// `relu(sum_k mean(grad_k) * acti_k)` over `(C, h, w)` arrays.
pub fn weighted_activation_map(acti: ArrayView3<'_, f32>, grad: ArrayView3<'_, f32>) -> Array2<f32> {
    let (_, height, width) = acti.dim();
    let mut map = Array2::<f32>::zeros((height, width));
    for (a, g) in acti.axis_iter(Axis(0)).zip(grad.axis_iter(Axis(0))) {
        let weight = g.mean().unwrap_or(0.0);
        map.scaled_add(weight, &a);
    }
    map.mapv_inplace(|v| v.max(0.0));
    map
}

/// Rescale to `[0, 1]` with min -> 1 and max -> 0. Constant maps are unchanged.
pub fn normalize_flipped(mut map: Array2<f32>) -> Array2<f32> {
    let (min, max) = map
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    if max <= min {
        return map;
    }
    let range = max - min;
    Zip::from(&mut map).for_each(|v| *v = 1.0 - (*v - min) / range);
    map
}
