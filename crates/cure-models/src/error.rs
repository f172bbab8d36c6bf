//! Model validation errors.

use thiserror::Error;

/// Result type for model construction.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised when a model value violates its invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("Invalid origin: {0}")]
    InvalidOrigin(String),

    #[error("Invalid spacing: {0}")]
    InvalidSpacing(String),

    #[error("Invalid direction: {0}")]
    InvalidDirection(String),

    #[error("Degenerate affine: column {0} has zero length")]
    DegenerateAffine(usize),

    #[error("Shape {shape:?} needs {expected} values, got {actual}")]
    ShapeMismatch {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    #[error("Category {index} out of range for {num_classes} classes")]
    CategoryOutOfRange { index: usize, num_classes: usize },
}
