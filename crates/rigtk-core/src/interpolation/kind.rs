//! Interpolator selection by integer code.

use burn::tensor::Tensor;
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use crate::error::Result;
use super::{Interpolator, LinearInterpolator, NearestNeighborInterpolator};

/// The two supported interpolators; `0` = linear, `1` = nearest neighbor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InterpolatorKind {
    #[default]
    Linear,
    NearestNeighbor,
}

impl InterpolatorKind {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Linear),
            1 => Some(Self::NearestNeighbor),
            _ => None,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Linear => 0,
            Self::NearestNeighbor => 1,
        }
    }

    pub fn interpolate<B: Backend, const D: usize>(
        &self,
        data: &Tensor<B, D>,
        indices: Tensor<B, 2>,
    ) -> Result<Tensor<B, 1>> {
        match self {
            Self::Linear => LinearInterpolator::new().interpolate(data, indices),
            Self::NearestNeighbor => NearestNeighborInterpolator::new().interpolate(data, indices),
        }
    }
}
