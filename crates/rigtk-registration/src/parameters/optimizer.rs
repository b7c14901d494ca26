//! Optimizer configuration.
//!
//! Each [`OptimizerFamily`] variant wraps the settings struct of its
//! optimizer. [`OptimizerParameters::build`] turns the record into a boxed
//! [`Optimizer`] for a given parameter count and scale vector.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use crate::error::{RegistrationError, Result};
use crate::optimizer::exhaustive::MAX_GRID_POINTS;
use crate::optimizer::{
    AmoebaOptimizer, AmoebaSettings, ConjugateGradientOptimizer, ConjugateGradientSettings,
    ExhaustiveOptimizer, ExhaustiveSettings, FrprOptimizer, FrprSettings, GradientDescentOptimizer,
    GradientDescentSettings, LbfgsOptimizer, LbfgsSettings, LbfgsbOptimizer, LbfgsbSettings,
    OnePlusOneEvolutionary, OnePlusOneSettings, Optimizer, PowellOptimizer, PowellSettings,
    RegularStepGradientDescent, RegularStepSettings, SpsaOptimizer, SpsaSettings, StepRule,
};
use crate::validation::{validate_iterations, validate_lbfgs_memory, validate_positive, validate_unit_interval};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OptimizerFamily {
    Exhaustive(ExhaustiveSettings),
    GradientDescent(GradientDescentSettings),
    QuaternionRigidGradientDescent(GradientDescentSettings),
    Lbfgsb(LbfgsbSettings),
    OnePlusOneEvolutionary(OnePlusOneSettings),
    Powell(PowellSettings),
    Frpr(FrprSettings),
    RegularStepGradientDescent(RegularStepSettings),
    VersorTransform(RegularStepSettings),
    Amoeba(AmoebaSettings),
    ConjugateGradient(ConjugateGradientSettings),
    Lbfgs(LbfgsSettings),
    Spsa(SpsaSettings),
    VersorRigid3DTransform(RegularStepSettings),
}

impl OptimizerFamily {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Exhaustive(_) => "Exhaustive",
            Self::GradientDescent(_) => "GradientDescent",
            Self::QuaternionRigidGradientDescent(_) => "QuaternionRigidGradientDescent",
            Self::Lbfgsb(_) => "LBFGSB",
            Self::OnePlusOneEvolutionary(_) => "OnePlusOneEvolutionary",
            Self::Powell(_) => "Powell",
            Self::Frpr(_) => "FRPR",
            Self::RegularStepGradientDescent(_) => "RegularStepGradientDescent",
            Self::VersorTransform(_) => "VersorTransform",
            Self::Amoeba(_) => "Amoeba",
            Self::ConjugateGradient(_) => "ConjugateGradient",
            Self::Lbfgs(_) => "LBFGS",
            Self::Spsa(_) => "SPSA",
            Self::VersorRigid3DTransform(_) => "VersorRigid3DTransform",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerParameters {
    pub family: OptimizerFamily,
    pub maximize: bool,
}

impl Default for OptimizerParameters {
    fn default() -> Self {
        Self::new(OptimizerFamily::RegularStepGradientDescent(RegularStepSettings::default()))
    }
}

impl OptimizerParameters {
    pub fn new(family: OptimizerFamily) -> Self {
        Self { family, maximize: false }
    }

    pub fn with_maximize(mut self, maximize: bool) -> Self {
        self.maximize = maximize;
        self
    }

    pub fn name(&self) -> &'static str {
        self.family.name()
    }

    /// Whether the family needs metric derivatives.
    pub fn is_gradient_based(&self) -> bool {
        matches!(
            self.family,
            OptimizerFamily::GradientDescent(_)
                | OptimizerFamily::QuaternionRigidGradientDescent(_)
                | OptimizerFamily::Lbfgsb(_)
                | OptimizerFamily::Frpr(_)
                | OptimizerFamily::RegularStepGradientDescent(_)
                | OptimizerFamily::VersorTransform(_)
                | OptimizerFamily::ConjugateGradient(_)
                | OptimizerFamily::Lbfgs(_)
                | OptimizerFamily::VersorRigid3DTransform(_)
        )
    }

    /// Whether the family honours cooperative stop requests.
    pub fn supports_stop(&self) -> bool {
        !matches!(
            self.family,
            OptimizerFamily::Exhaustive(_)
                | OptimizerFamily::Lbfgsb(_)
                | OptimizerFamily::Amoeba(_)
                | OptimizerFamily::ConjugateGradient(_)
                | OptimizerFamily::Lbfgs(_)
        )
    }

    /// Expected number of iteration callbacks for `parameter_count` parameters.
    pub fn iteration_budget(&self, parameter_count: usize) -> usize {
        match &self.family {
            OptimizerFamily::Exhaustive(s) => {
                let per_axis = 2 * s.number_of_steps + 1;
                (0..parameter_count).fold(1usize, |total, _| total.saturating_mul(per_axis))
            }
            OptimizerFamily::GradientDescent(s) | OptimizerFamily::QuaternionRigidGradientDescent(s) => {
                s.number_of_iterations
            }
            OptimizerFamily::Lbfgsb(s) => s.max_iterations,
            OptimizerFamily::OnePlusOneEvolutionary(s) => s.number_of_iterations,
            OptimizerFamily::Powell(s) => s.number_of_iterations,
            OptimizerFamily::Frpr(s) => s.number_of_iterations,
            OptimizerFamily::RegularStepGradientDescent(s)
            | OptimizerFamily::VersorTransform(s)
            | OptimizerFamily::VersorRigid3DTransform(s) => s.number_of_iterations,
            OptimizerFamily::Amoeba(s) => s.number_of_iterations,
            OptimizerFamily::ConjugateGradient(s) => s.max_iterations,
            OptimizerFamily::Lbfgs(s) => s.number_of_iterations,
            OptimizerFamily::Spsa(s) => s.number_of_iterations,
        }
    }

    /// Settings for the next finer pyramid level, for the step-length families.
    pub fn adapted_for_next_level(&self) -> Option<OptimizerParameters> {
        let family = match &self.family {
            OptimizerFamily::RegularStepGradientDescent(s) => OptimizerFamily::RegularStepGradientDescent(s.refined()),
            OptimizerFamily::VersorTransform(s) => OptimizerFamily::VersorTransform(s.refined()),
            OptimizerFamily::VersorRigid3DTransform(s) => OptimizerFamily::VersorRigid3DTransform(s.refined()),
            _ => return None,
        };
        Some(Self {
            family,
            maximize: self.maximize,
        })
    }

    /// Check every knob against `parameter_count` parameters.
    pub fn validate(&self, parameter_count: usize) -> Result<()> {
        match &self.family {
            OptimizerFamily::Exhaustive(s) => {
                validate_positive("exhaustive step length", s.step_length)?;
                if self.iteration_budget(parameter_count) > MAX_GRID_POINTS {
                    return Err(RegistrationError::invalid_configuration(format!(
                        "exhaustive grid over {parameter_count} parameters with {} steps exceeds {MAX_GRID_POINTS} points",
                        s.number_of_steps
                    )));
                }
                Ok(())
            }
            OptimizerFamily::GradientDescent(s) => {
                validate_positive("learning rate", s.learning_rate)?;
                validate_iterations(s.number_of_iterations)
            }
            OptimizerFamily::QuaternionRigidGradientDescent(s) => {
                require_parameter_count(self.name(), parameter_count, 7)?;
                validate_positive("learning rate", s.learning_rate)?;
                validate_iterations(s.number_of_iterations)
            }
            OptimizerFamily::Lbfgsb(s) => {
                s.validate(parameter_count)?;
                validate_lbfgs_memory(s.memory)?;
                validate_positive("projected gradient tolerance", s.projected_gradient_tolerance)?;
                validate_iterations(s.max_iterations)
            }
            OptimizerFamily::OnePlusOneEvolutionary(s) => {
                validate_unit_interval("shrink factor", s.shrink_factor)?;
                if !(s.growth_factor > 1.0 && s.growth_factor.is_finite()) {
                    return Err(RegistrationError::invalid_configuration(format!(
                        "growth factor must exceed 1, got {}",
                        s.growth_factor
                    )));
                }
                validate_positive("epsilon", s.epsilon)?;
                validate_positive("initial radius", s.initial_radius)?;
                validate_iterations(s.number_of_iterations)
            }
            OptimizerFamily::Powell(s) => {
                validate_positive("Powell step length", s.step_length)?;
                validate_positive("Powell step tolerance", s.step_tolerance)?;
                validate_positive("Powell value tolerance", s.value_tolerance)?;
                validate_iterations(s.number_of_iterations)
            }
            OptimizerFamily::Frpr(s) => {
                validate_positive("FRPR step length", s.step_length)?;
                validate_iterations(s.number_of_iterations)
            }
            OptimizerFamily::RegularStepGradientDescent(s) => validate_regular_step(s),
            OptimizerFamily::VersorTransform(s) => {
                require_parameter_count(self.name(), parameter_count, 3)?;
                validate_regular_step(s)
            }
            OptimizerFamily::VersorRigid3DTransform(s) => {
                require_parameter_count(self.name(), parameter_count, 6)?;
                validate_regular_step(s)
            }
            OptimizerFamily::Amoeba(s) => {
                if let Some(delta) = &s.simplex_delta {
                    if delta.len() != parameter_count {
                        return Err(RegistrationError::invalid_configuration(format!(
                            "simplex delta has {} entries, expected {parameter_count}",
                            delta.len()
                        )));
                    }
                    for d in delta {
                        validate_positive("simplex delta", *d)?;
                    }
                }
                validate_positive("parameters convergence tolerance", s.parameters_convergence_tolerance)?;
                validate_positive("function convergence tolerance", s.function_convergence_tolerance)?;
                validate_iterations(s.number_of_iterations)
            }
            OptimizerFamily::ConjugateGradient(s) => {
                validate_positive("gradient tolerance", s.gradient_tolerance)?;
                validate_iterations(s.max_iterations)
            }
            OptimizerFamily::Lbfgs(s) => {
                validate_positive("gradient convergence tolerance", s.gradient_convergence_tolerance)?;
                validate_unit_interval("line search accuracy", s.line_search_accuracy)?;
                validate_positive("default step length", s.default_step_length)?;
                validate_iterations(s.number_of_iterations)
            }
            OptimizerFamily::Spsa(s) => {
                validate_positive("SPSA a", s.a)?;
                validate_positive("SPSA c", s.c)?;
                validate_positive("SPSA alpha", s.alpha)?;
                validate_positive("SPSA gamma", s.gamma)?;
                if !(s.big_a >= 0.0 && s.big_a.is_finite()) || !(s.tolerance >= 0.0) {
                    return Err(RegistrationError::invalid_configuration(
                        "SPSA A and tolerance must be non-negative",
                    ));
                }
                if !(s.decay_rate > 0.0 && s.decay_rate <= 1.0) {
                    return Err(RegistrationError::invalid_configuration(format!(
                        "SPSA decay rate must lie in (0, 1], got {}",
                        s.decay_rate
                    )));
                }
                if s.number_of_perturbations == 0 {
                    return Err(RegistrationError::invalid_configuration(
                        "SPSA needs at least one perturbation per gradient estimate",
                    ));
                }
                validate_iterations(s.number_of_iterations)
            }
        }
    }

    /// Instantiate the optimizer for `parameter_count` parameters.
    pub fn build(&self, parameter_count: usize, scales: DVector<f64>) -> Result<Box<dyn Optimizer>> {
        if scales.len() != parameter_count {
            return Err(RegistrationError::invalid_configuration(format!(
                "{} scales for {parameter_count} parameters",
                scales.len()
            )));
        }
        self.validate(parameter_count)?;
        let maximize = self.maximize;
        let optimizer: Box<dyn Optimizer> = match &self.family {
            OptimizerFamily::Exhaustive(s) => Box::new(ExhaustiveOptimizer::new(s.clone(), scales, maximize)),
            OptimizerFamily::GradientDescent(s) => Box::new(GradientDescentOptimizer::new(s.clone(), scales, maximize)),
            OptimizerFamily::QuaternionRigidGradientDescent(s) => {
                Box::new(GradientDescentOptimizer::quaternion(s.clone(), scales, maximize))
            }
            OptimizerFamily::Lbfgsb(s) => Box::new(LbfgsbOptimizer::new(s.clone(), scales, maximize)),
            OptimizerFamily::OnePlusOneEvolutionary(s) => {
                Box::new(OnePlusOneEvolutionary::new(s.clone(), scales, maximize))
            }
            OptimizerFamily::Powell(s) => Box::new(PowellOptimizer::new(s.clone(), scales, maximize)),
            OptimizerFamily::Frpr(s) => Box::new(FrprOptimizer::new(s.clone(), scales, maximize)),
            OptimizerFamily::RegularStepGradientDescent(s) => Box::new(RegularStepGradientDescent::new(
                s.clone(),
                scales,
                maximize,
                StepRule::Additive,
            )),
            OptimizerFamily::VersorTransform(s) => {
                Box::new(RegularStepGradientDescent::new(s.clone(), scales, maximize, StepRule::Versor))
            }
            OptimizerFamily::VersorRigid3DTransform(s) => Box::new(RegularStepGradientDescent::new(
                s.clone(),
                scales,
                maximize,
                StepRule::VersorRigid,
            )),
            OptimizerFamily::Amoeba(s) => Box::new(AmoebaOptimizer::new(s.clone(), scales, maximize)),
            OptimizerFamily::ConjugateGradient(s) => {
                Box::new(ConjugateGradientOptimizer::new(s.clone(), scales, maximize))
            }
            OptimizerFamily::Lbfgs(s) => Box::new(LbfgsOptimizer::new(s.clone(), scales, maximize)),
            OptimizerFamily::Spsa(s) => Box::new(SpsaOptimizer::new(s.clone(), scales, maximize)),
        };
        Ok(optimizer)
    }
}

fn validate_regular_step(s: &RegularStepSettings) -> Result<()> {
    validate_positive("gradient magnitude tolerance", s.gradient_magnitude_tolerance)?;
    validate_positive("minimum step length", s.min_step_length)?;
    validate_positive("maximum step length", s.max_step_length)?;
    if s.min_step_length > s.max_step_length {
        return Err(RegistrationError::invalid_configuration(format!(
            "minimum step length {} exceeds maximum {}",
            s.min_step_length, s.max_step_length
        )));
    }
    validate_unit_interval("relaxation factor", s.relaxation_factor)?;
    validate_iterations(s.number_of_iterations)
}

fn require_parameter_count(name: &str, actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(RegistrationError::invalid_configuration(format!(
            "{name} optimizer needs a transform with {expected} parameters, got {actual}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn every_family() -> Vec<OptimizerFamily> {
        vec![
            OptimizerFamily::Exhaustive(ExhaustiveSettings::default()),
            OptimizerFamily::GradientDescent(GradientDescentSettings::default()),
            OptimizerFamily::QuaternionRigidGradientDescent(GradientDescentSettings::default()),
            OptimizerFamily::Lbfgsb(LbfgsbSettings::default()),
            OptimizerFamily::OnePlusOneEvolutionary(OnePlusOneSettings::default()),
            OptimizerFamily::Powell(PowellSettings::default()),
            OptimizerFamily::Frpr(FrprSettings::default()),
            OptimizerFamily::RegularStepGradientDescent(RegularStepSettings::default()),
            OptimizerFamily::VersorTransform(RegularStepSettings::default()),
            OptimizerFamily::Amoeba(AmoebaSettings::default()),
            OptimizerFamily::ConjugateGradient(ConjugateGradientSettings::default()),
            OptimizerFamily::Lbfgs(LbfgsSettings::default()),
            OptimizerFamily::Spsa(SpsaSettings::default()),
            OptimizerFamily::VersorRigid3DTransform(RegularStepSettings::default()),
        ]
    }

    fn parameter_count_for(family: &OptimizerFamily) -> usize {
        match family {
            OptimizerFamily::QuaternionRigidGradientDescent(_) => 7,
            OptimizerFamily::VersorTransform(_) => 3,
            OptimizerFamily::VersorRigid3DTransform(_) => 6,
            _ => 3,
        }
    }

    #[test]
    fn test_build_every_family_with_matching_stop_support() {
        for family in every_family() {
            let params = OptimizerParameters::new(family.clone());
            let n = parameter_count_for(&family);
            let optimizer = params.build(n, DVector::from_element(n, 1.0)).unwrap();
            assert_eq!(optimizer.supports_stop(), params.supports_stop(), "{}", family.name());
        }
    }

    #[test]
    fn test_step_adaptation_only_for_step_families() {
        let rsgd = OptimizerParameters::default().with_maximize(true);
        let next = rsgd.adapted_for_next_level().unwrap();
        assert!(next.maximize);
        let OptimizerFamily::RegularStepGradientDescent(s) = next.family else {
            panic!("family changed");
        };
        assert!((s.max_step_length - 0.25).abs() < 1e-12);
        assert!((s.min_step_length - 1e-4).abs() < 1e-15);
        assert!((s.gradient_magnitude_tolerance - 1e-5).abs() < 1e-15);
        assert_eq!(s.number_of_iterations, 150);

        let amoeba = OptimizerParameters::new(OptimizerFamily::Amoeba(AmoebaSettings::default()));
        assert!(amoeba.adapted_for_next_level().is_none());
    }

    #[test]
    fn test_versor_families_check_parameter_count() {
        let versor = OptimizerParameters::new(OptimizerFamily::VersorTransform(RegularStepSettings::default()));
        assert!(versor.validate(6).is_err());
        assert!(versor.validate(3).is_ok());
    }

    #[test]
    fn test_invalid_knobs() {
        let bad = OptimizerParameters::new(OptimizerFamily::RegularStepGradientDescent(RegularStepSettings {
            min_step_length: 2.0,
            ..RegularStepSettings::default()
        }));
        assert!(bad.validate(2).is_err());
        let bad = OptimizerParameters::new(OptimizerFamily::GradientDescent(GradientDescentSettings {
            number_of_iterations: 0,
            ..GradientDescentSettings::default()
        }));
        assert!(bad.validate(2).is_err());
        let huge = OptimizerParameters::new(OptimizerFamily::Exhaustive(ExhaustiveSettings {
            step_length: 1.0,
            number_of_steps: 50,
        }));
        assert!(huge.validate(6).is_err());
    }

    #[test]
    fn test_iteration_budget() {
        let exhaustive = OptimizerParameters::new(OptimizerFamily::Exhaustive(ExhaustiveSettings {
            step_length: 1.0,
            number_of_steps: 2,
        }));
        assert_eq!(exhaustive.iteration_budget(2), 25);
        assert_eq!(OptimizerParameters::default().iteration_budget(2), 100);
    }
}
