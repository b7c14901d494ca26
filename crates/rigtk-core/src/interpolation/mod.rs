//! Interpolation of image values at continuous indices.

pub mod trait_;
pub mod linear;
pub mod nearest;
pub mod kind;

pub use trait_::Interpolator;
pub use linear::LinearInterpolator;
pub use nearest::NearestNeighborInterpolator;
pub use kind::InterpolatorKind;
