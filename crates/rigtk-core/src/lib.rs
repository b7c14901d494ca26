//! Core imaging primitives for rigid and affine registration.
//!
//! Images are burn tensors with physical metadata; placements, transforms and
//! parameter math use nalgebra in `f64`.

pub mod error;
pub mod spatial;
pub mod image;
pub mod geometry;
pub mod interpolation;
pub mod filter;
pub mod transform;

pub use error::{CoreError, Result};
pub use image::{Image, ImageMetadata};
pub use spatial::{Direction, Point, Spacing, Vector};
pub use geometry::Placement;
pub use interpolation::InterpolatorKind;
pub use filter::PyramidSchedule;
pub use transform::{AffineMap, TransformFamily};
