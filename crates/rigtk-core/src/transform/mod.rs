//! Spatial transforms.
//!
//! [`TransformFamily`] enumerates the parametric families a registration can
//! search over; each resolves to an [`AffineMap`] for a parameter vector.

pub mod trait_;
pub mod affine;
pub mod rotation;
pub mod family;

pub use trait_::Transform;
pub use affine::AffineMap;
pub use family::TransformFamily;
