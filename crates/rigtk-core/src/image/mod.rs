//! Image types and operations.

pub mod image;
pub mod metadata;
pub mod grid;

pub use image::{tensor_values, Image};
pub use metadata::ImageMetadata;
pub use grid::generate_grid;
