//! Physical-space metadata and index-to-physical affines.
//!
//! Conventions follow ITK: vectors are ordered `(x, y, z)`, the direction
//! matrix is stored row-major and its *columns* are the physical directions of
//! the index axes. Index `i` runs along the fastest array axis, so for a NumPy
//! style `(z, y, x)` array the continuous index is `(x, y, z)`.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Tolerance for unit-norm and orthogonality checks on direction columns.
pub const ORTHONORMAL_TOLERANCE: f64 = 1e-4;

/// Origin, spacing and direction of an image.
///
/// Only constructible through [`SpatialMetadata::new`], which enforces
/// strictly positive spacing and an orthonormal direction matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSpatialMetadata")]
pub struct SpatialMetadata {
    origin: [f64; 3],
    spacing: [f64; 3],
    direction: [[f64; 3]; 3],
}

#[derive(Deserialize)]
struct RawSpatialMetadata {
    origin: [f64; 3],
    spacing: [f64; 3],
    direction: [[f64; 3]; 3],
}

impl TryFrom<RawSpatialMetadata> for SpatialMetadata {
    type Error = ModelError;

    fn try_from(raw: RawSpatialMetadata) -> Result<Self, Self::Error> {
        Self::new(raw.origin, raw.spacing, raw.direction)
    }
}

impl SpatialMetadata {
    /// Validate and build metadata.
    pub fn new(
        origin: [f64; 3],
        spacing: [f64; 3],
        direction: [[f64; 3]; 3],
    ) -> ModelResult<Self> {
        if origin.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::InvalidOrigin(format!(
                "components must be finite, got {:?}",
                origin
            )));
        }

        if let Some(s) = spacing.iter().find(|s| !s.is_finite() || **s <= 0.0) {
            return Err(ModelError::InvalidSpacing(format!(
                "components must be finite and strictly positive, got {} in {:?}",
                s, spacing
            )));
        }

        if direction.iter().flatten().any(|v| !v.is_finite()) {
            return Err(ModelError::InvalidDirection(
                "components must be finite".to_string(),
            ));
        }

        let columns = columns_of(&direction);
        for (c, column) in columns.iter().enumerate() {
            let norm = norm(column);
            if (norm - 1.0).abs() > ORTHONORMAL_TOLERANCE {
                return Err(ModelError::InvalidDirection(format!(
                    "column {} has norm {:.6}, expected 1",
                    c, norm
                )));
            }
        }
        for a in 0..3 {
            for b in (a + 1)..3 {
                let d = dot(&columns[a], &columns[b]);
                if d.abs() > ORTHONORMAL_TOLERANCE {
                    return Err(ModelError::InvalidDirection(format!(
                        "columns {} and {} are not orthogonal (dot = {:.6})",
                        a, b, d
                    )));
                }
            }
        }

        Ok(Self {
            origin,
            spacing,
            direction,
        })
    }

    /// Origin at zero, unit spacing, identity direction.
    pub fn identity() -> Self {
        Self {
            origin: [0.0; 3],
            spacing: [1.0; 3],
            direction: IDENTITY3,
        }
    }

    pub fn origin(&self) -> [f64; 3] {
        self.origin
    }

    pub fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    /// Direction matrix, row-major.
    pub fn direction(&self) -> [[f64; 3]; 3] {
        self.direction
    }

    /// Physical direction of index axis `axis`.
    pub fn direction_column(&self, axis: usize) -> [f64; 3] {
        [
            self.direction[0][axis],
            self.direction[1][axis],
            self.direction[2][axis],
        ]
    }

    /// Index-to-physical affine for this metadata.
    pub fn to_affine(&self) -> Affine {
        Affine::from_metadata(self)
    }
}

impl Default for SpatialMetadata {
    fn default() -> Self {
        Self::identity()
    }
}

const IDENTITY3: [[f64; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// Homogeneous 4x4 transform from continuous index `(i, j, k)` to physical space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine([[f64; 4]; 4]);

impl Affine {
    pub fn identity() -> Self {
        let mut m = [[0.0; 4]; 4];
        for (d, row) in m.iter_mut().enumerate() {
            row[d] = 1.0;
        }
        Self(m)
    }

    /// Build from a row-major matrix.
    pub fn from_rows(rows: [[f64; 4]; 4]) -> Self {
        Self(rows)
    }

    /// Column `c` is `direction[:, c] * spacing[c]`, the translation is the origin.
    pub fn from_metadata(metadata: &SpatialMetadata) -> Self {
        let mut m = Self::identity().0;
        let spacing = metadata.spacing();
        let direction = metadata.direction();
        let origin = metadata.origin();
        for r in 0..3 {
            for c in 0..3 {
                m[r][c] = direction[r][c] * spacing[c];
            }
            m[r][3] = origin[r];
        }
        Self(m)
    }

    /// Pure translation in index space.
    pub fn translation(offset: [f64; 3]) -> Self {
        let mut m = Self::identity().0;
        for (r, v) in offset.iter().enumerate() {
            m[r][3] = *v;
        }
        Self(m)
    }

    /// Index-space transform of a resampling by `scales` (input/output size
    /// ratio per axis) that keeps pixel centers aligned.
    ///
    /// Output index `n` maps to input index `s * n + (s - 1) / 2`.
    pub fn centered_scale(scales: [f64; 3]) -> Self {
        let mut m = Self::identity().0;
        for (d, s) in scales.iter().enumerate() {
            m[d][d] = *s;
            m[d][3] = (s - 1.0) / 2.0;
        }
        Self(m)
    }

    /// Row-major matrix.
    pub fn rows(&self) -> &[[f64; 4]; 4] {
        &self.0
    }

    /// `self * rhs`: apply `rhs` first, then `self`.
    pub fn compose(&self, rhs: &Affine) -> Affine {
        let mut m = [[0.0; 4]; 4];
        for (r, row) in m.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = (0..4).map(|k| self.0[r][k] * rhs.0[k][c]).sum();
            }
        }
        Affine(m)
    }

    /// Physical position of a continuous index.
    pub fn transform_index(&self, index: [f64; 3]) -> [f64; 3] {
        let mut out = [0.0; 3];
        for (r, v) in out.iter_mut().enumerate() {
            *v = self.0[r][0] * index[0] + self.0[r][1] * index[1] + self.0[r][2] * index[2]
                + self.0[r][3];
        }
        out
    }

    /// Recover origin, spacing and direction.
    ///
    /// origin is the translation column, `spacing[c]` the norm of column `c`
    /// and `direction[:, c]` column `c` divided by `spacing[c]`.
    pub fn decompose(&self) -> ModelResult<SpatialMetadata> {
        let origin = [self.0[0][3], self.0[1][3], self.0[2][3]];

        let mut spacing = [0.0; 3];
        for (c, s) in spacing.iter_mut().enumerate() {
            *s = norm(&[self.0[0][c], self.0[1][c], self.0[2][c]]);
            if *s <= f64::EPSILON {
                return Err(ModelError::DegenerateAffine(c));
            }
        }

        let mut direction = [[0.0; 3]; 3];
        for (r, row) in direction.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = self.0[r][c] / spacing[c];
            }
        }

        SpatialMetadata::new(origin, spacing, direction)
    }
}

impl Default for Affine {
    fn default() -> Self {
        Self::identity()
    }
}

fn columns_of(m: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    let mut cols = [[0.0; 3]; 3];
    for (c, col) in cols.iter_mut().enumerate() {
        for (r, v) in col.iter_mut().enumerate() {
            *v = m[r][c];
        }
    }
    cols
}

fn dot(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn norm(v: &[f64; 3]) -> f64 {
    dot(v, v).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: [f64; 3], b: [f64; 3]) {
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-9, "{:?} != {:?}", a, b);
        }
    }

    #[test]
    fn test_rejects_non_positive_spacing() {
        let err = SpatialMetadata::new([0.0; 3], [1.0, 0.0, 1.0], IDENTITY3).unwrap_err();
        assert!(matches!(err, ModelError::InvalidSpacing(_)));

        let err = SpatialMetadata::new([0.0; 3], [1.0, -2.0, 1.0], IDENTITY3).unwrap_err();
        assert!(matches!(err, ModelError::InvalidSpacing(_)));
    }

    #[test]
    fn test_rejects_non_unit_direction() {
        let direction = [[2.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        let err = SpatialMetadata::new([0.0; 3], [1.0; 3], direction).unwrap_err();
        assert!(matches!(err, ModelError::InvalidDirection(_)));
    }

    #[test]
    fn test_rejects_sheared_direction() {
        let h = std::f64::consts::FRAC_1_SQRT_2;
        let direction = [[1.0, h, 0.0], [0.0, h, 0.0], [0.0, 0.0, 1.0]];
        let err = SpatialMetadata::new([0.0; 3], [1.0; 3], direction).unwrap_err();
        assert!(matches!(err, ModelError::InvalidDirection(_)));
    }

    #[test]
    fn test_decompose_round_trip() {
        let metadata =
            SpatialMetadata::new([1.0, 2.0, 3.0], [0.5, 0.5, 1.0], IDENTITY3).unwrap();
        let recovered = metadata.to_affine().decompose().unwrap();

        assert_close(recovered.origin(), [1.0, 2.0, 3.0]);
        assert_close(recovered.spacing(), [0.5, 0.5, 1.0]);
        for r in 0..3 {
            assert_close(recovered.direction()[r], IDENTITY3[r]);
        }
    }

    #[test]
    fn test_decompose_divides_columns_by_their_own_spacing() {
        // 90 degree rotation about z with anisotropic spacing: a row-wise
        // division would scramble the columns and fail validation.
        let direction = [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
        let metadata = SpatialMetadata::new([5.0, -4.0, 0.5], [0.25, 2.0, 3.0], direction).unwrap();
        let recovered = metadata.to_affine().decompose().unwrap();

        assert_close(recovered.spacing(), [0.25, 2.0, 3.0]);
        assert_eq!(recovered.direction_column(0), [0.0, 1.0, 0.0]);
        assert_eq!(recovered.direction_column(1), [-1.0, 0.0, 0.0]);
        assert_close(recovered.origin(), [5.0, -4.0, 0.5]);
    }

    #[test]
    fn test_decompose_degenerate_column() {
        let mut rows = Affine::identity().rows().to_owned();
        rows[0][1] = 0.0;
        rows[1][1] = 0.0;
        let err = Affine::from_rows(rows).decompose().unwrap_err();
        assert_eq!(err, ModelError::DegenerateAffine(1));
    }

    #[test]
    fn test_centered_scale_maps_pixel_centers() {
        // Downsampling 4 -> 2: output pixel 0 covers input 0..2, center 0.5.
        let scale = Affine::centered_scale([2.0, 2.0, 1.0]);
        assert_close(scale.transform_index([0.0, 0.0, 0.0]), [0.5, 0.5, 0.0]);
        assert_close(scale.transform_index([1.0, 1.0, 0.0]), [2.5, 2.5, 0.0]);
    }

    #[test]
    fn test_compose_applies_rhs_first() {
        let metadata = SpatialMetadata::new([10.0, 0.0, 0.0], [2.0, 1.0, 1.0], IDENTITY3).unwrap();
        let affine = metadata.to_affine().compose(&Affine::translation([-3.0, 0.0, 0.0]));
        // index 3 in the padded grid is index 0 in the source grid
        assert_close(affine.transform_index([3.0, 0.0, 0.0]), [10.0, 0.0, 0.0]);
    }

    #[test]
    fn test_deserialize_validates() {
        let json = r#"{"origin":[0,0,0],"spacing":[1,0,1],"direction":[[1,0,0],[0,1,0],[0,0,1]]}"#;
        assert!(serde_json::from_str::<SpatialMetadata>(json).is_err());

        let json = r#"{"origin":[0,0,0],"spacing":[1,1,1],"direction":[[1,0,0],[0,1,0],[0,0,1]]}"#;
        let metadata: SpatialMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(metadata, SpatialMetadata::identity());
    }
}
