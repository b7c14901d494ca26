//! Similarity metrics.
//!
//! Every metric evaluates a [`MetricSamples`] batch of fixed/moving intensity
//! pairs produced by the registration cost function.

pub mod trait_;
pub mod mean_squares;
pub mod correlation;
pub mod gradient_difference;
pub mod histogram;
pub mod mattes;
pub mod viola_wells;
pub mod cardinality;

pub use trait_::{IntensityStats, Metric, MetricSamples};
pub use mean_squares::{MeanReciprocalSquareDifference, MeanSquaresMetric};
pub use correlation::NormalizedCorrelationMetric;
pub use gradient_difference::GradientDifferenceMetric;
pub use histogram::{HistogramMeasure, HistogramMetric, JointHistogram};
pub use mattes::MattesMutualInformation;
pub use viola_wells::ViolaWellsMutualInformation;
pub use cardinality::{KappaStatistic, MatchCardinality};
