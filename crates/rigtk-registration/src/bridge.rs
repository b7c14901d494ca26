//! Conversions between an image's world placement and its physical frame.
//!
//! Registration results live in the images' physical frames (origin,
//! spacing, direction); placements map voxel indices to world space. The
//! bridge sandwiches one between the other.

use burn::tensor::backend::Backend;
use rigtk_core::{Image, Placement};
use crate::error::Result;

/// Index-to-physical map of `image` as a placement.
pub fn index_to_physical<B: Backend, const D: usize>(image: &Image<B, D>) -> Result<Placement> {
    Ok(Placement::from_metadata(image.metadata())?)
}

/// World-to-physical map for `image` placed in the world by `placement`.
pub fn world_to_physical<B: Backend, const D: usize>(image: &Image<B, D>, placement: &Placement) -> Result<Placement> {
    Ok(index_to_physical(image)?.compose(&placement.inverse()?))
}

/// Physical-to-world map for `image` placed in the world by `placement`.
pub fn physical_to_world<B: Backend, const D: usize>(image: &Image<B, D>, placement: &Placement) -> Result<Placement> {
    Ok(placement.compose(&index_to_physical(image)?.inverse()?))
}
