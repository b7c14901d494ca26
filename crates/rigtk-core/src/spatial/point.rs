//! Point type for physical coordinates.

use nalgebra::Point as NaPoint;
use serde::{Deserialize, Serialize};
use super::Vector;

/// A point in D-dimensional physical space (component order x, y, z).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point<const D: usize>(pub NaPoint<f64, D>);

impl<const D: usize> Point<D> {
    /// Create a new point from coordinates.
    pub fn new(coords: [f64; D]) -> Self {
        Self(NaPoint::from(coords))
    }

    /// The point with all coordinates zero.
    pub fn origin() -> Self {
        Self(NaPoint::origin())
    }

    /// Create a point from a slice, or `None` when the length differs from `D`.
    pub fn from_slice(coords: &[f64]) -> Option<Self> {
        if coords.len() != D {
            return None;
        }
        let mut point = Self::origin();
        for (i, value) in coords.iter().enumerate() {
            point.0.coords[i] = *value;
        }
        Some(point)
    }

    /// Coordinates as a vector.
    pub fn to_vec(&self) -> Vec<f64> {
        self.0.coords.iter().copied().collect()
    }

    /// Position vector from the origin to this point.
    pub fn coords(&self) -> Vector<D> {
        Vector(self.0.coords)
    }

    pub fn inner(&self) -> &NaPoint<f64, D> {
        &self.0
    }
}

impl<const D: usize> std::ops::Index<usize> for Point<D> {
    type Output = f64;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0.coords[index]
    }
}

impl<const D: usize> std::ops::IndexMut<usize> for Point<D> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0.coords[index]
    }
}

impl<const D: usize> std::ops::Sub for Point<D> {
    type Output = Vector<D>;

    fn sub(self, other: Self) -> Self::Output {
        Vector(self.0.coords - other.0.coords)
    }
}

impl<const D: usize> std::ops::Add<Vector<D>> for Point<D> {
    type Output = Self;

    fn add(self, vector: Vector<D>) -> Self::Output {
        Self(self.0 + vector.0)
    }
}
