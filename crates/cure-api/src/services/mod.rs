//! Business logic services.

pub mod categorize;

pub use categorize::{CategorizeService, GRADCAM_IMAGE_NAME, MAX_IMAGE_ID_LEN};
