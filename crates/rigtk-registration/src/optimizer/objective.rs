//! Cost functions driven by the optimizers.

use nalgebra::DVector;
use crate::error::{RegistrationError, Result};

/// Default step for central finite differences.
pub const DEFAULT_GRADIENT_STEP: f64 = 1e-2;

/// A scalar function of a parameter vector.
pub trait CostFunction {
    fn parameter_count(&self) -> usize;

    fn value(&mut self, parameters: &DVector<f64>) -> Result<f64>;

    /// Central finite-difference gradient.
    fn gradient(&mut self, parameters: &DVector<f64>) -> Result<DVector<f64>> {
        central_difference(self, parameters, DEFAULT_GRADIENT_STEP)
    }

    fn value_and_gradient(&mut self, parameters: &DVector<f64>) -> Result<(f64, DVector<f64>)> {
        let value = self.value(parameters)?;
        let gradient = self.gradient(parameters)?;
        Ok((value, gradient))
    }
}

/// Central differences with step `step` on every parameter.
pub fn central_difference<C: CostFunction + ?Sized>(
    cost: &mut C,
    parameters: &DVector<f64>,
    step: f64,
) -> Result<DVector<f64>> {
    let mut gradient = DVector::zeros(parameters.len());
    let mut shifted = parameters.clone();
    for i in 0..parameters.len() {
        let original = shifted[i];
        shifted[i] = original + step;
        let forward = cost.value(&shifted)?;
        shifted[i] = original - step;
        let backward = cost.value(&shifted)?;
        shifted[i] = original;
        gradient[i] = (forward - backward) / (2.0 * step);
    }
    Ok(gradient)
}

/// Adapts a closure into a [`CostFunction`].
pub struct FnCost<F> {
    parameter_count: usize,
    function: F,
    gradient_step: f64,
}

impl<F> FnCost<F>
where
    F: FnMut(&DVector<f64>) -> Result<f64>,
{
    pub fn new(parameter_count: usize, function: F) -> Self {
        Self {
            parameter_count,
            function,
            gradient_step: 1e-5,
        }
    }

    pub fn with_gradient_step(mut self, step: f64) -> Self {
        self.gradient_step = step;
        self
    }
}

impl<F> CostFunction for FnCost<F>
where
    F: FnMut(&DVector<f64>) -> Result<f64>,
{
    fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    fn value(&mut self, parameters: &DVector<f64>) -> Result<f64> {
        (self.function)(parameters)
    }

    fn gradient(&mut self, parameters: &DVector<f64>) -> Result<DVector<f64>> {
        let step = self.gradient_step;
        central_difference(self, parameters, step)
    }
}

/// The function an optimizer actually minimizes: `±cost`.
///
/// Non-finite values become [`RegistrationError::NumericalInstability`].
pub(crate) struct Objective<'a> {
    cost: &'a mut dyn CostFunction,
    sign: f64,
    evaluations: usize,
}

impl<'a> Objective<'a> {
    pub fn new(cost: &'a mut dyn CostFunction, maximize: bool) -> Self {
        Self {
            cost,
            sign: if maximize { -1.0 } else { 1.0 },
            evaluations: 0,
        }
    }

    /// Convert a minimized value back to the raw cost value.
    pub fn raw(&self, minimized: f64) -> f64 {
        self.sign * minimized
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    pub fn value(&mut self, parameters: &DVector<f64>) -> Result<f64> {
        self.evaluations += 1;
        let value = self.cost.value(parameters)?;
        check_finite(value)?;
        Ok(self.sign * value)
    }

    pub fn gradient(&mut self, parameters: &DVector<f64>) -> Result<DVector<f64>> {
        let gradient = self.cost.gradient(parameters)?;
        if gradient.iter().any(|g| !g.is_finite()) {
            return Err(RegistrationError::numerical_instability(
                "metric gradient is not finite",
            ));
        }
        Ok(gradient * self.sign)
    }

    pub fn value_and_gradient(&mut self, parameters: &DVector<f64>) -> Result<(f64, DVector<f64>)> {
        let value = self.value(parameters)?;
        let gradient = self.gradient(parameters)?;
        Ok((value, gradient))
    }
}

fn check_finite(value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(RegistrationError::numerical_instability(format!(
            "metric value is {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bowl() -> FnCost<impl FnMut(&DVector<f64>) -> Result<f64>> {
        FnCost::new(2, |x: &DVector<f64>| Ok((x[0] - 1.0).powi(2) + 3.0 * (x[1] + 2.0).powi(2)))
    }

    #[test]
    fn test_finite_difference_gradient() {
        let mut cost = bowl();
        let g = cost.gradient(&DVector::from_vec(vec![0.0, 0.0])).unwrap();
        assert!((g[0] + 2.0).abs() < 1e-6);
        assert!((g[1] - 12.0).abs() < 1e-6);
    }

    #[test]
    fn test_objective_flips_sign_when_maximizing() {
        let mut cost = bowl();
        let mut objective = Objective::new(&mut cost, true);
        let x = DVector::from_vec(vec![0.0, 0.0]);
        let v = objective.value(&x).unwrap();
        assert!((v + 13.0).abs() < 1e-12);
        assert!((objective.raw(v) - 13.0).abs() < 1e-12);
        let g = objective.gradient(&x).unwrap();
        assert!((g[1] + 12.0).abs() < 1e-6);
    }

    #[test]
    fn test_nan_is_numerical_instability() {
        let mut cost = FnCost::new(1, |_: &DVector<f64>| Ok(f64::NAN));
        let mut objective = Objective::new(&mut cost, false);
        let err = objective.value(&DVector::zeros(1)).unwrap_err();
        assert!(matches!(err, RegistrationError::NumericalInstability(_)));
    }
}
