//! Optimizers driving the transform parameters.
//!
//! Every family implements [`Optimizer`] over a [`CostFunction`] of an
//! `nalgebra::DVector` parameter vector and notifies an
//! [`IterationObserver`] once per accepted iteration.
//!
//! # Examples
//!
//! ```rust,ignore
//! use nalgebra::DVector;
//! use rigtk_registration::optimizer::{FnCost, NoopObserver, Optimizer, RegularStepGradientDescent, RegularStepSettings, StepRule};
//!
//! let mut optimizer = RegularStepGradientDescent::new(
//!     RegularStepSettings::default(),
//!     DVector::from_element(2, 1.0),
//!     false,
//!     StepRule::Additive,
//! );
//! let mut cost = FnCost::new(2, |x: &DVector<f64>| Ok(x.norm_squared()));
//! let outcome = optimizer.optimize(&mut cost, DVector::from_element(2, 3.0), &mut NoopObserver)?;
//! ```

pub mod trait_;
pub mod objective;
pub mod line_search;
pub mod exhaustive;
pub mod gradient_descent;
pub mod regular_step;
pub mod lbfgs;
pub mod lbfgsb;
pub mod one_plus_one;
pub mod powell;
pub mod frpr;
pub mod conjugate_gradient;
pub mod amoeba;
pub mod spsa;

pub use trait_::{IterationObserver, IterationState, NoopObserver, OptimizationOutcome, Optimizer, StopCondition};
pub use objective::{CostFunction, FnCost};
pub use exhaustive::{ExhaustiveOptimizer, ExhaustiveSettings};
pub use gradient_descent::{GradientDescentOptimizer, GradientDescentSettings};
pub use regular_step::{RegularStepGradientDescent, RegularStepSettings, StepRule};
pub use lbfgs::{LbfgsOptimizer, LbfgsSettings};
pub use lbfgsb::{LbfgsbOptimizer, LbfgsbSettings};
pub use one_plus_one::{OnePlusOneEvolutionary, OnePlusOneSettings};
pub use powell::{PowellOptimizer, PowellSettings};
pub use frpr::{FrprOptimizer, FrprSettings};
pub use conjugate_gradient::{ConjugateGradientOptimizer, ConjugateGradientSettings};
pub use amoeba::{AmoebaOptimizer, AmoebaSettings};
pub use spsa::{SpsaOptimizer, SpsaSettings};
