//! Classifier category labels.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Number of categories of the shipped classifier.
pub const DEFAULT_NUM_CLASSES: usize = 2;

/// Discrete class label assigned to an image. Serialized as a bare integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Category(u32);

impl Category {
    /// Create a category, checking it belongs to a label set of `num_classes`.
    pub fn new(index: usize, num_classes: usize) -> ModelResult<Self> {
        if index >= num_classes {
            return Err(ModelError::CategoryOutOfRange { index, num_classes });
        }
        Ok(Self(index as u32))
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
