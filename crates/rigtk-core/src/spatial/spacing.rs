//! Physical distance between adjacent pixels along each axis.

use super::Vector;

/// Spacing between adjacent pixels/voxels along each axis (x, y, z order).
pub type Spacing<const D: usize> = Vector<D>;

impl<const D: usize> Spacing<D> {
    /// Same spacing along every axis.
    pub fn uniform(value: f64) -> Self {
        Vector::new([value; D])
    }

    /// Whether every component is finite and strictly positive.
    pub fn is_valid(&self) -> bool {
        self.0.iter().all(|s| s.is_finite() && *s > 0.0)
    }
}
