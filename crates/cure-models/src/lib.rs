//! Shared data models for the cure saliency service.
//!
//! This crate provides:
//! - Spatial metadata (origin/spacing/direction) with validated invariants
//! - 4x4 index-to-physical affines and their decomposition
//! - Images carrying intensities plus spatial metadata
//! - Category labels and store identifiers

pub mod category;
pub mod error;
pub mod image;
pub mod spatial;

// Re-export common types
pub use category::{Category, DEFAULT_NUM_CLASSES};
pub use error::{ModelError, ModelResult};
pub use image::{Image, ImageId, LayerId};
pub use spatial::{Affine, SpatialMetadata, ORTHONORMAL_TOLERANCE};
