//! Saliency maps placed in physical space.

use std::path::Path;

use cure_models::{Affine, Image};
use image::GrayImage;
use ndarray::{Array2, Axis};

use crate::error::{VisionError, VisionResult};

/// A 2D saliency map on the preprocessed grid, plus that grid's affine.
#[derive(Debug, Clone)]
pub struct SaliencyMap {
    values: Array2<f32>,
    affine: Affine,
}

impl SaliencyMap {
    pub fn new(values: Array2<f32>, affine: Affine) -> Self {
        Self { values, affine }
    }

    pub fn values(&self) -> &Array2<f32> {
        &self.values
    }

    pub fn affine(&self) -> &Affine {
        &self.affine
    }

    /// Convert to a `(1, H, W)` image whose metadata is decomposed from the affine.
    pub fn into_image(self) -> VisionResult<Image> {
        let metadata = self.affine.decompose()?;
        let data = self.values.insert_axis(Axis(0)).into_dyn();
        Ok(Image::new(data, metadata))
    }

    /// Write an 8-bit grayscale preview, values clamped to `[0, 1]`.
    pub fn write_png(&self, path: &Path) -> VisionResult<()> {
        let (height, width) = self.values.dim();
        let pixels: Vec<u8> = self
            .values
            .iter()
            .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect();
        let preview = GrayImage::from_raw(width as u32, height as u32, pixels)
            .ok_or_else(|| VisionError::internal("saliency preview buffer size mismatch"))?;
        preview.save(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cure_models::SpatialMetadata;
    use ndarray::array;

    #[test]
    fn test_into_image_recovers_metadata() {
        let metadata = SpatialMetadata::new(
            [1.0, 2.0, 3.0],
            [0.5, 0.5, 1.0],
            [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        )
        .unwrap();
        let map = SaliencyMap::new(Array2::zeros((4, 6)), metadata.to_affine());
        let image = map.into_image().unwrap();

        assert_eq!(image.shape(), &[1, 4, 6]);
        assert_eq!(image.metadata(), &metadata);
    }

    #[test]
    fn test_degenerate_affine_is_rejected() {
        let mut rows = *Affine::identity().rows();
        rows[0][0] = 0.0;
        rows[1][0] = 0.0;
        rows[2][0] = 0.0;
        let map = SaliencyMap::new(Array2::zeros((2, 2)), Affine::from_rows(rows));
        assert!(matches!(map.into_image(), Err(VisionError::Model(_))));
    }

    #[test]
    fn test_write_png_preview() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saliency.png");
        let map = SaliencyMap::new(array![[0.0f32, 0.5], [1.0, 2.0]], Affine::identity());
        map.write_png(&path).unwrap();

        let preview = image::open(&path).unwrap().into_luma8();
        assert_eq!(preview.dimensions(), (2, 2));
        assert_eq!(preview.as_raw(), &vec![0u8, 128, 255, 255]);
    }
}
