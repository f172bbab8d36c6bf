//! Image-to-tensor preprocessing.
//!
//! Fixed pipeline, in order:
//! 1. ensure a leading channel axis
//! 2. keep the first channel
//! 3. resize (area) so the longest side equals the input size
//! 4. zero-pad symmetrically to a square
//! 5. add a batch axis
//!
//! Every geometric step is folded into an index-to-physical affine so results
//! computed on the tensor can be placed back into the source image's space.

use candle_core::{Device, Tensor};
use cure_models::{Affine, Image};
use ndarray::{s, Array2, Array4, ArrayView2, Axis, Ix3};
use tracing::debug;

use crate::error::{VisionError, VisionResult};
use crate::interpolate::area_resize;

/// Batched single-channel network input plus its derived affine.
#[derive(Debug, Clone)]
pub struct PreprocessedTensor {
    data: Array4<f32>,
    affine: Affine,
}

impl PreprocessedTensor {
    /// `(batch, channel, height, width)` array.
    pub fn data(&self) -> &Array4<f32> {
        &self.data
    }

    /// Maps `(i, j, k)` of the tensor's spatial grid to physical space.
    pub fn affine(&self) -> &Affine {
        &self.affine
    }

    /// `(height, width)`.
    pub fn spatial_shape(&self) -> (usize, usize) {
        let (_, _, h, w) = self.data.dim();
        (h, w)
    }

    /// Copy into a candle tensor on `device`.
    pub fn to_tensor(&self, device: &Device) -> VisionResult<Tensor> {
        let values: Vec<f32> = self.data.iter().copied().collect();
        Ok(Tensor::from_vec(values, self.data.dim(), device)?)
    }
}

/// Resize-to-longest-side + symmetric pad pipeline.
#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
    size: usize,
}

impl Preprocessor {
    pub fn new(size: usize) -> Self {
        Self { size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn run(&self, image: &Image) -> VisionResult<PreprocessedTensor> {
        let data = image.data().view();
        if data.shape().iter().any(|d| *d == 0) {
            return Err(VisionError::invalid_shape(format!(
                "image has an empty axis: {:?}",
                data.shape()
            )));
        }

        let channel_first = match data.ndim() {
            2 => data.insert_axis(Axis(0)),
            3 => data,
            n => {
                return Err(VisionError::invalid_shape(format!(
                    "expected a 2D image or channel-first 3D array, got {} dimensions {:?}",
                    n,
                    image.shape()
                )))
            }
        };
        let channel_first = channel_first
            .into_dimensionality::<Ix3>()
            .map_err(|e| VisionError::invalid_shape(e.to_string()))?;
        let plane = channel_first.index_axis(Axis(0), 0);

        let mut affine = image.metadata().to_affine();
        let (resized, resize_affine) = self.resize_longest(plane);
        affine = affine.compose(&resize_affine);
        let (padded, pad_affine) = self.pad_symmetric(resized);
        affine = affine.compose(&pad_affine);

        debug!(
            input_shape = ?image.shape(),
            size = self.size,
            "Preprocessed image"
        );

        Ok(PreprocessedTensor {
            data: padded.insert_axis(Axis(0)).insert_axis(Axis(0)),
            affine,
        })
    }

    /// Target `(height, width)` keeping the aspect ratio, longest side = size.
    pub fn resized_shape(&self, height: usize, width: usize) -> (usize, usize) {
        let scale = self.size as f64 / height.max(width) as f64;
        let fit = |n: usize| {
            ((n as f64 * scale).round_ties_even() as usize).clamp(1, self.size)
        };
        (fit(height), fit(width))
    }

    fn resize_longest(&self, plane: ArrayView2<'_, f32>) -> (Array2<f32>, Affine) {
        let (h, w) = plane.dim();
        let (new_h, new_w) = self.resized_shape(h, w);
        if (new_h, new_w) == (h, w) {
            return (plane.to_owned(), Affine::identity());
        }

        let scales = [w as f64 / new_w as f64, h as f64 / new_h as f64, 1.0];
        (area_resize(plane, new_h, new_w), Affine::centered_scale(scales))
    }

    fn pad_symmetric(&self, plane: Array2<f32>) -> (Array2<f32>, Affine) {
        let (h, w) = plane.dim();
        if (h, w) == (self.size, self.size) {
            return (plane, Affine::identity());
        }

        let top = (self.size - h) / 2;
        let left = (self.size - w) / 2;
        let mut padded = Array2::<f32>::zeros((self.size, self.size));
        padded
            .slice_mut(s![top..top + h, left..left + w])
            .assign(&plane);
        (padded, Affine::translation([-(left as f64), -(top as f64), 0.0]))
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(crate::config::IMG_SIZE)
    }
}
