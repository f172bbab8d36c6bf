//! JSON wire types of the store bridge.

use cure_models::{Image, ImageId, LayerId, SpatialMetadata};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Image as exchanged with the store: a flat row-major value buffer plus
/// ITK-style spatial metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePayload {
    pub shape: Vec<usize>,
    pub values: Vec<f32>,
    pub origin: [f64; 3],
    pub spacing: [f64; 3],
    /// Direction matrix, row-major
    pub direction: [f64; 9],
}

impl ImagePayload {
    pub fn into_image(self) -> StoreResult<Image> {
        if self.shape.is_empty() {
            return Err(StoreError::invalid_payload("shape must have at least one axis"));
        }
        let d = self.direction;
        let direction = [[d[0], d[1], d[2]], [d[3], d[4], d[5]], [d[6], d[7], d[8]]];
        let metadata = SpatialMetadata::new(self.origin, self.spacing, direction)?;
        Ok(Image::from_shape_vec(&self.shape, self.values, metadata)?)
    }
}

impl TryFrom<ImagePayload> for Image {
    type Error = StoreError;

    fn try_from(payload: ImagePayload) -> Result<Self, Self::Error> {
        payload.into_image()
    }
}

impl From<&Image> for ImagePayload {
    fn from(image: &Image) -> Self {
        let metadata = image.metadata();
        let [r0, r1, r2] = metadata.direction();
        Self {
            shape: image.shape().to_vec(),
            values: image.data().iter().copied().collect(),
            origin: metadata.origin(),
            spacing: metadata.spacing(),
            direction: [
                r0[0], r0[1], r0[2], r1[0], r1[1], r1[2], r2[0], r2[1], r2[2],
            ],
        }
    }
}

/// Body of `POST /images`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddImageRequest {
    pub name: String,
    pub image: ImagePayload,
}

/// Body of `POST /layers`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddLayerRequest {
    pub base: ImageId,
    pub overlay: ImageId,
}

/// Response of both create endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: String,
}

impl CreatedResponse {
    pub fn image_id(self) -> ImageId {
        ImageId(self.id)
    }

    pub fn layer_id(self) -> LayerId {
        LayerId(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cure_models::ModelError;
    use serde_json::json;

    #[test]
    fn test_payload_to_image() {
        let payload: ImagePayload = serde_json::from_value(json!({
            "shape": [2, 3],
            "values": [0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
            "origin": [1.0, 2.0, 3.0],
            "spacing": [0.5, 0.5, 1.0],
            "direction": [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]
        }))
        .unwrap();

        let image = payload.into_image().unwrap();
        assert_eq!(image.shape(), &[2, 3]);
        assert_eq!(image.data()[[1, 0]], 3.0);
        assert_eq!(image.metadata().origin(), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_direction_is_row_major() {
        // 90 degree rotation about z: columns (0, 1, 0) and (-1, 0, 0)
        let payload = ImagePayload {
            shape: vec![1],
            values: vec![0.0],
            origin: [0.0; 3],
            spacing: [1.0; 3],
            direction: [0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0],
        };
        let image = payload.clone().into_image().unwrap();
        assert_eq!(image.metadata().direction_column(0), [0.0, 1.0, 0.0]);
        assert_eq!(ImagePayload::from(&image), payload);
    }

    #[test]
    fn test_value_count_must_match_shape() {
        let payload = ImagePayload {
            shape: vec![2, 2],
            values: vec![0.0; 3],
            origin: [0.0; 3],
            spacing: [1.0; 3],
            direction: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        };
        assert!(matches!(
            payload.into_image(),
            Err(StoreError::Model(ModelError::ShapeMismatch { expected: 4, actual: 3, .. }))
        ));
    }

    #[test]
    fn test_invalid_spacing_rejected() {
        let payload = ImagePayload {
            shape: vec![1],
            values: vec![0.0],
            origin: [0.0; 3],
            spacing: [1.0, 0.0, 1.0],
            direction: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        };
        assert!(matches!(
            payload.into_image(),
            Err(StoreError::Model(ModelError::InvalidSpacing(_)))
        ));
    }
}
