//! Metric configuration.

use serde::{Deserialize, Serialize};
use crate::error::{RegistrationError, Result};
use crate::metric::{
    GradientDifferenceMetric, HistogramMeasure, HistogramMetric, KappaStatistic, MatchCardinality,
    MattesMutualInformation, MeanReciprocalSquareDifference, MeanSquaresMetric, Metric,
    NormalizedCorrelationMetric, ViolaWellsMutualInformation,
};
use crate::validation::{validate_histogram_bins, validate_positive};

pub const DEFAULT_HISTOGRAM_BINS: usize = 30;
pub const DEFAULT_MATTES_BINS: usize = 50;
pub const DEFAULT_MATTES_SAMPLES: usize = 10_000;
pub const DEFAULT_VIOLA_WELLS_SAMPLES: usize = 100;

/// The similarity measure families, each carrying only its own knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetricFamily {
    MeanSquares,
    NormalizedCorrelation,
    GradientDifference,
    KullbackLeiblerHistogram {
        bins: usize,
    },
    CorrelationCoefficientHistogram {
        bins: usize,
    },
    MeanSquaresHistogram {
        bins: usize,
    },
    MutualInformationHistogram {
        bins: usize,
    },
    NormalizedMutualInformationHistogram {
        bins: usize,
    },
    MattesMutualInformation {
        bins: usize,
        spatial_samples: usize,
        use_sampling: bool,
    },
    MeanReciprocalSquareDifference {
        lambda: f64,
    },
    /// Viola-Wells mutual information.
    MutualInformation {
        spatial_samples: usize,
        fixed_standard_deviation: f64,
        moving_standard_deviation: f64,
        use_normalizer_and_smoother: bool,
        fixed_smoother_variance: f64,
        moving_smoother_variance: f64,
    },
    MatchCardinality,
    KappaStatistic {
        foreground_value: f64,
    },
}

impl MetricFamily {
    pub fn mattes() -> Self {
        Self::MattesMutualInformation {
            bins: DEFAULT_MATTES_BINS,
            spatial_samples: DEFAULT_MATTES_SAMPLES,
            use_sampling: true,
        }
    }

    pub fn viola_wells() -> Self {
        Self::MutualInformation {
            spatial_samples: DEFAULT_VIOLA_WELLS_SAMPLES,
            fixed_standard_deviation: 0.4,
            moving_standard_deviation: 0.4,
            use_normalizer_and_smoother: false,
            fixed_smoother_variance: 2.0,
            moving_smoother_variance: 2.0,
        }
    }

    pub fn mutual_information_histogram() -> Self {
        Self::MutualInformationHistogram {
            bins: DEFAULT_HISTOGRAM_BINS,
        }
    }

    pub fn mean_reciprocal_square_difference() -> Self {
        Self::MeanReciprocalSquareDifference { lambda: 1.0 }
    }

    pub fn kappa() -> Self {
        Self::KappaStatistic {
            foreground_value: 255.0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::MeanSquares => "MeanSquares",
            Self::NormalizedCorrelation => "NormalizedCorrelation",
            Self::GradientDifference => "GradientDifference",
            Self::KullbackLeiblerHistogram { .. } => "KullbackLeiblerCompareHistogram",
            Self::CorrelationCoefficientHistogram { .. } => "CorrelationCoefficientHistogram",
            Self::MeanSquaresHistogram { .. } => "MeanSquaresHistogram",
            Self::MutualInformationHistogram { .. } => "MutualInformationHistogram",
            Self::NormalizedMutualInformationHistogram { .. } => "NormalizedMutualInformationHistogram",
            Self::MattesMutualInformation { .. } => "MattesMutualInformation",
            Self::MeanReciprocalSquareDifference { .. } => "MeanReciprocalSquareDifference",
            Self::MutualInformation { .. } => "MutualInformation",
            Self::MatchCardinality => "MatchCardinality",
            Self::KappaStatistic { .. } => "KappaStatistic",
        }
    }

    /// Whether larger values mean better alignment.
    pub fn prefers_maximize(&self) -> bool {
        matches!(
            self,
            Self::GradientDifference
                | Self::MutualInformationHistogram { .. }
                | Self::NormalizedMutualInformationHistogram { .. }
                | Self::MeanReciprocalSquareDifference { .. }
                | Self::MutualInformation { .. }
                | Self::MatchCardinality
                | Self::KappaStatistic { .. }
        )
    }
}

/// Which fixed-image points a cost evaluation samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleSelection {
    /// Every fixed voxel, in grid order.
    Dense,
    /// A fixed random subset of at most `count` voxels.
    Random { count: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricParameters {
    pub family: MetricFamily,
    pub compute_gradient: bool,
}

impl Default for MetricParameters {
    fn default() -> Self {
        Self::new(MetricFamily::MeanSquares)
    }
}

impl MetricParameters {
    pub fn new(family: MetricFamily) -> Self {
        Self {
            family,
            compute_gradient: true,
        }
    }

    pub fn with_compute_gradient(mut self, compute_gradient: bool) -> Self {
        self.compute_gradient = compute_gradient;
        self
    }

    pub fn prefers_maximize(&self) -> bool {
        self.family.prefers_maximize()
    }

    pub fn validate(&self) -> Result<()> {
        match &self.family {
            MetricFamily::KullbackLeiblerHistogram { bins }
            | MetricFamily::CorrelationCoefficientHistogram { bins }
            | MetricFamily::MeanSquaresHistogram { bins }
            | MetricFamily::MutualInformationHistogram { bins }
            | MetricFamily::NormalizedMutualInformationHistogram { bins } => validate_histogram_bins(*bins),
            MetricFamily::MattesMutualInformation { bins, spatial_samples, .. } => {
                validate_histogram_bins(*bins)?;
                if *bins <= 4 {
                    return Err(RegistrationError::invalid_configuration(format!(
                        "Mattes mutual information needs more than 4 bins, got {bins}"
                    )));
                }
                validate_samples(*spatial_samples)
            }
            MetricFamily::MeanReciprocalSquareDifference { lambda } => validate_positive("lambda", *lambda),
            MetricFamily::MutualInformation {
                spatial_samples,
                fixed_standard_deviation,
                moving_standard_deviation,
                use_normalizer_and_smoother,
                fixed_smoother_variance,
                moving_smoother_variance,
            } => {
                validate_samples(*spatial_samples)?;
                validate_positive("fixed standard deviation", *fixed_standard_deviation)?;
                validate_positive("moving standard deviation", *moving_standard_deviation)?;
                if *use_normalizer_and_smoother {
                    validate_positive("fixed smoother variance", *fixed_smoother_variance)?;
                    validate_positive("moving smoother variance", *moving_smoother_variance)?;
                }
                Ok(())
            }
            MetricFamily::KappaStatistic { foreground_value } if !foreground_value.is_finite() => Err(
                RegistrationError::invalid_configuration("kappa foreground value must be finite"),
            ),
            _ => Ok(()),
        }
    }

    /// Instantiate the metric.
    pub fn build(&self) -> Result<Box<dyn Metric>> {
        self.validate()?;
        let metric: Box<dyn Metric> = match &self.family {
            MetricFamily::MeanSquares => Box::new(MeanSquaresMetric),
            MetricFamily::NormalizedCorrelation => Box::new(NormalizedCorrelationMetric),
            MetricFamily::GradientDifference => Box::new(GradientDifferenceMetric),
            MetricFamily::KullbackLeiblerHistogram { bins } => {
                Box::new(HistogramMetric::new(HistogramMeasure::KullbackLeibler, *bins)?)
            }
            MetricFamily::CorrelationCoefficientHistogram { bins } => {
                Box::new(HistogramMetric::new(HistogramMeasure::CorrelationCoefficient, *bins)?)
            }
            MetricFamily::MeanSquaresHistogram { bins } => {
                Box::new(HistogramMetric::new(HistogramMeasure::MeanSquares, *bins)?)
            }
            MetricFamily::MutualInformationHistogram { bins } => {
                Box::new(HistogramMetric::new(HistogramMeasure::MutualInformation, *bins)?)
            }
            MetricFamily::NormalizedMutualInformationHistogram { bins } => {
                Box::new(HistogramMetric::new(HistogramMeasure::NormalizedMutualInformation, *bins)?)
            }
            MetricFamily::MattesMutualInformation { bins, .. } => Box::new(MattesMutualInformation::new(*bins)?),
            MetricFamily::MeanReciprocalSquareDifference { lambda } => {
                Box::new(MeanReciprocalSquareDifference::new(*lambda)?)
            }
            MetricFamily::MutualInformation {
                fixed_standard_deviation,
                moving_standard_deviation,
                use_normalizer_and_smoother,
                ..
            } => Box::new(
                ViolaWellsMutualInformation::new(*fixed_standard_deviation, *moving_standard_deviation)?
                    .with_normalization(*use_normalizer_and_smoother),
            ),
            MetricFamily::MatchCardinality => Box::new(MatchCardinality),
            MetricFamily::KappaStatistic { foreground_value } => Box::new(KappaStatistic::new(*foreground_value)),
        };
        Ok(metric)
    }

    /// How many fixed points one evaluation samples.
    pub fn sample_selection(&self) -> SampleSelection {
        match &self.family {
            MetricFamily::MattesMutualInformation {
                spatial_samples,
                use_sampling: true,
                ..
            } => SampleSelection::Random { count: *spatial_samples },
            // Viola-Wells splits its samples into two equal halves.
            MetricFamily::MutualInformation { spatial_samples, .. } => SampleSelection::Random {
                count: spatial_samples * 2,
            },
            _ => SampleSelection::Dense,
        }
    }

    /// Gaussian variances `(fixed, moving)` applied to the images before a
    /// normalized Viola-Wells run.
    pub fn smoothing_variances(&self) -> Option<(f64, f64)> {
        match &self.family {
            MetricFamily::MutualInformation {
                use_normalizer_and_smoother: true,
                fixed_smoother_variance,
                moving_smoother_variance,
                ..
            } => Some((*fixed_smoother_variance, *moving_smoother_variance)),
            _ => None,
        }
    }
}

fn validate_samples(samples: usize) -> Result<()> {
    if samples == 0 {
        return Err(RegistrationError::invalid_configuration(
            "number of spatial samples must be at least 1",
        ));
    }
    Ok(())
}
