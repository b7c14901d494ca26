//! Named registration presets persisted as JSON.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use burn::tensor::backend::Backend;
use rigtk_core::{InterpolatorKind, TransformFamily};
use serde::{Deserialize, Serialize};
use crate::error::{RegistrationError, Result};
use crate::multires::PyramidalRegistrationMethod;
use crate::optimizer::RegularStepSettings;
use crate::parameters::{MetricFamily, MetricParameters, OptimizerFamily, OptimizerParameters, TransformParameters};
use crate::registration::ImageRegistrationMethod;

/// A complete transform / metric / optimizer / interpolator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationPreset {
    pub transform: TransformParameters,
    pub metric: MetricParameters,
    pub optimizer: OptimizerParameters,
    #[serde(default)]
    pub interpolator: InterpolatorKind,
}

impl RegistrationPreset {
    pub fn new(transform: TransformParameters, metric: MetricParameters, optimizer: OptimizerParameters) -> Self {
        Self {
            transform,
            metric,
            optimizer,
            interpolator: InterpolatorKind::Linear,
        }
    }

    pub fn with_interpolator(mut self, interpolator: InterpolatorKind) -> Self {
        self.interpolator = interpolator;
        self
    }
}

/// Ordered collection of presets keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresetLibrary {
    presets: BTreeMap<String, RegistrationPreset>,
}

impl PresetLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Presets for the common rigid and affine set-ups.
    pub fn with_defaults() -> Self {
        let rsgd = || {
            OptimizerParameters::new(OptimizerFamily::RegularStepGradientDescent(RegularStepSettings::default()))
        };
        let mattes = || MetricParameters::new(MetricFamily::mattes());

        let mut library = Self::new();
        library.insert(
            "Translation2D MeanSquares",
            RegistrationPreset::new(
                TransformParameters::new(TransformFamily::Translation),
                MetricParameters::default(),
                rsgd(),
            ),
        );
        library.insert(
            "Rigid2D MeanSquares",
            RegistrationPreset::new(TransformParameters::new(TransformFamily::Rigid2D), MetricParameters::default(), rsgd()),
        );
        library.insert(
            "VersorRigid3D MattesMI",
            RegistrationPreset::new(
                TransformParameters::new(TransformFamily::VersorRigid3D),
                mattes(),
                OptimizerParameters::new(OptimizerFamily::VersorRigid3DTransform(RegularStepSettings::default())),
            ),
        );
        library.insert(
            "Affine3D MattesMI",
            RegistrationPreset::new(TransformParameters::new(TransformFamily::Affine), mattes(), rsgd()),
        );
        library
    }

    /// Insert or replace a preset, returning the previous one.
    pub fn insert(&mut self, name: impl Into<String>, preset: RegistrationPreset) -> Option<RegistrationPreset> {
        self.presets.insert(name.into(), preset)
    }

    pub fn get(&self, name: &str) -> Option<&RegistrationPreset> {
        self.presets.get(name)
    }

    /// Like [`get`](Self::get), but a missing name is an error.
    pub fn require(&self, name: &str) -> Result<&RegistrationPreset> {
        self.get(name)
            .ok_or_else(|| RegistrationError::preset(format!("no preset named {name:?}")))
    }

    pub fn remove(&mut self, name: &str) -> Option<RegistrationPreset> {
        self.presets.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|e| RegistrationError::preset(format!("cannot read {}: {e}", path.display())))?;
        let library = Self::from_json(&json)?;
        tracing::debug!(path = %path.display(), presets = library.len(), "loaded presets");
        Ok(library)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?)
            .map_err(|e| RegistrationError::preset(format!("cannot write {}: {e}", path.display())))
    }
}

impl<'a, B: Backend, const D: usize> ImageRegistrationMethod<'a, B, D> {
    pub fn with_preset(self, preset: &RegistrationPreset) -> Self {
        self.with_transform_parameters(preset.transform.clone())
            .with_metric_parameters(preset.metric.clone())
            .with_optimizer_parameters(preset.optimizer.clone())
            .with_interpolator(preset.interpolator)
    }
}

impl<'a, B: Backend, const D: usize> PyramidalRegistrationMethod<'a, B, D> {
    pub fn with_preset(self, preset: &RegistrationPreset) -> Self {
        self.with_transform_parameters(preset.transform.clone())
            .with_metric_parameters(preset.metric.clone())
            .with_optimizer_parameters(preset.optimizer.clone())
            .with_interpolator(preset.interpolator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let library = PresetLibrary::with_defaults();
        assert_eq!(library.len(), 4);
        for name in library.names() {
            let preset = library.get(name).unwrap();
            let dimension = if name.contains("3D") { 3 } else { 2 };
            crate::parameters::validate_configuration(dimension, &preset.transform, &preset.metric, &preset.optimizer)
                .unwrap();
        }
    }

    #[test]
    fn test_missing_preset() {
        let library = PresetLibrary::new();
        assert!(library.is_empty());
        assert!(matches!(library.require("nope"), Err(RegistrationError::Preset(_))));
    }

    #[test]
    fn test_malformed_json_is_a_preset_error() {
        assert!(matches!(PresetLibrary::from_json("{ not json"), Err(RegistrationError::Preset(_))));
    }

    #[test]
    fn test_interpolator_defaults_when_absent() {
        let library = PresetLibrary::with_defaults();
        let mut value: serde_json::Value = serde_json::from_str(&library.to_json().unwrap()).unwrap();
        for preset in value.as_object_mut().unwrap().values_mut() {
            preset.as_object_mut().unwrap().remove("interpolator");
        }
        let reloaded = PresetLibrary::from_json(&value.to_string()).unwrap();
        assert_eq!(reloaded, library);
    }
}
