//! Physical metadata of an image: origin, spacing and direction.
//!
//! The metadata fixes the image's physical frame:
//! `p = origin + Direction * (index ⊙ spacing)`.

use nalgebra::{SMatrix, SVector};
use crate::error::{CoreError, Result};
use crate::spatial::{Direction, Point, Spacing, Vector};

/// Image metadata with a cached inverse direction.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageMetadata<const D: usize> {
    origin: Point<D>,
    spacing: Spacing<D>,
    direction: Direction<D>,
    inverse_direction: Direction<D>,
}

impl<const D: usize> ImageMetadata<D> {
    /// Create metadata, rejecting non-positive spacing and singular directions.
    pub fn new(origin: Point<D>, spacing: Spacing<D>, direction: Direction<D>) -> Result<Self> {
        if !spacing.is_valid() {
            return Err(CoreError::invalid_metadata(format!(
                "spacing must be finite and positive, got {:?}",
                spacing.to_vec()
            )));
        }
        let inverse_direction = direction
            .try_inverse()
            .ok_or_else(|| CoreError::singular("image direction matrix"))?;
        Ok(Self {
            origin,
            spacing,
            direction,
            inverse_direction,
        })
    }

    pub fn origin(&self) -> &Point<D> {
        &self.origin
    }

    pub fn spacing(&self) -> &Spacing<D> {
        &self.spacing
    }

    pub fn direction(&self) -> &Direction<D> {
        &self.direction
    }

    pub fn inverse_direction(&self) -> &Direction<D> {
        &self.inverse_direction
    }

    /// Same origin and direction with a new spacing.
    pub fn with_spacing(&self, spacing: Spacing<D>) -> Result<Self> {
        Self::new(self.origin, spacing, self.direction)
    }

    /// Linear part and offset of the index-to-physical map.
    ///
    /// Returns `(Direction * diag(spacing), origin)`.
    pub fn index_to_physical_affine(&self) -> (SMatrix<f64, D, D>, SVector<f64, D>) {
        let scale = SMatrix::<f64, D, D>::from_diagonal(&self.spacing.0);
        (self.direction.0 * scale, self.origin.0.coords)
    }

    pub fn index_to_physical(&self, index: &Point<D>) -> Point<D> {
        let mut scaled = Vector::<D>::zeros();
        for i in 0..D {
            scaled[i] = index[i] * self.spacing[i];
        }
        self.origin + self.direction * scaled
    }

    pub fn physical_to_index(&self, point: &Point<D>) -> Point<D> {
        let rotated = self.inverse_direction * (*point - self.origin);
        let mut index = Point::<D>::origin();
        for i in 0..D {
            index[i] = rotated[i] / self.spacing[i];
        }
        index
    }
}

impl<const D: usize> Default for ImageMetadata<D> {
    fn default() -> Self {
        Self {
            origin: Point::origin(),
            spacing: Spacing::uniform(1.0),
            direction: Direction::identity(),
            inverse_direction: Direction::identity(),
        }
    }
}
