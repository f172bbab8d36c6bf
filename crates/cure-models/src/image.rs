//! Images and store identifiers.

use std::fmt;

use ndarray::{ArrayD, IxDyn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ModelError, ModelResult};
use crate::spatial::SpatialMetadata;

/// Identifier of an image held by the viewer's data store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ImageId(pub String);

impl ImageId {
    /// Generate a new random image ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ImageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ImageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ImageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of a base+overlay layer composition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct LayerId(pub String);

impl LayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Intensity array plus the spatial metadata that places it in physical space.
///
/// Array axes are in reverse physical order (`(z, y, x)` for a volume,
/// `(y, x)` for a plain 2D array).
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    data: ArrayD<f32>,
    metadata: SpatialMetadata,
}

impl Image {
    pub fn new(data: ArrayD<f32>, metadata: SpatialMetadata) -> Self {
        Self { data, metadata }
    }

    /// Build from a flat, row-major value buffer.
    pub fn from_shape_vec(
        shape: &[usize],
        values: Vec<f32>,
        metadata: SpatialMetadata,
    ) -> ModelResult<Self> {
        let expected: usize = shape.iter().product();
        let actual = values.len();
        let data = ArrayD::from_shape_vec(IxDyn(shape), values).map_err(|_| {
            ModelError::ShapeMismatch {
                shape: shape.to_vec(),
                expected,
                actual,
            }
        })?;
        Ok(Self { data, metadata })
    }

    pub fn data(&self) -> &ArrayD<f32> {
        &self.data
    }

    pub fn metadata(&self) -> &SpatialMetadata {
        &self.metadata
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    pub fn into_parts(self) -> (ArrayD<f32>, SpatialMetadata) {
        (self.data, self.metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_shape_vec_checks_length() {
        let err = Image::from_shape_vec(&[2, 3], vec![0.0; 5], SpatialMetadata::identity())
            .unwrap_err();
        assert_eq!(
            err,
            ModelError::ShapeMismatch {
                shape: vec![2, 3],
                expected: 6,
                actual: 5
            }
        );
    }

    #[test]
    fn test_from_shape_vec_row_major() {
        let image = Image::from_shape_vec(
            &[2, 3],
            vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
            SpatialMetadata::identity(),
        )
        .unwrap();
        assert_eq!(image.shape(), &[2, 3]);
        assert_eq!(image.data()[[1, 0]], 3.0);
    }

    #[test]
    fn test_image_id_display() {
        let id = ImageId::from("abc");
        assert_eq!(id.to_string(), "abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }
}
