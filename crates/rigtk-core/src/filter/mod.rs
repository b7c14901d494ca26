pub mod gaussian;
pub mod downsample;
pub mod pyramid;
pub mod resample;
pub mod histogram_matching;

pub use gaussian::GaussianFilter;
pub use downsample::DownsampleFilter;
pub use pyramid::{MultiResolutionPyramid, PyramidSchedule};
pub use resample::{sample_physical_points, ResampleImageFilter, SampledValues};
pub use histogram_matching::HistogramMatchingFilter;
