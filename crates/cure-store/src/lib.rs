//! Clients for the viewer's image store.
//!
//! This crate provides:
//! - The `ImageStore` trait: fetch an image, register a new one, layer two images
//! - An in-memory store for local runs and tests
//! - An HTTP client for a store bridge exposed by the viewer
//! - The JSON wire format for images and their spatial metadata

pub mod error;
pub mod http;
pub mod memory;
pub mod store;
pub mod types;

pub use error::{StoreError, StoreResult};
pub use http::{HttpImageStore, HttpStoreConfig};
pub use memory::InMemoryImageStore;
pub use store::ImageStore;
pub use types::{AddImageRequest, AddLayerRequest, CreatedResponse, ImagePayload};
