//! Cooperative stop across every optimizer family.

use std::sync::Arc;
use nalgebra::DVector;
use rigtk_registration::optimizer::{
    AmoebaSettings, ConjugateGradientSettings, ExhaustiveSettings, FnCost, FrprSettings, GradientDescentSettings,
    LbfgsSettings, LbfgsbSettings, OnePlusOneSettings, PowellSettings, RegularStepSettings, SpsaSettings,
};
use rigtk_registration::{
    OptimizerFamily, OptimizerParameters, ProgressCallback, ProgressInfo, ProgressTracker, RegistrationObserver,
    StopCondition, StopHandle,
};

/// Sets the stop flag once the given iteration has been reported.
struct StopAt {
    iteration: usize,
    stop: StopHandle,
}

impl ProgressCallback for StopAt {
    fn on_progress(&self, info: &ProgressInfo) {
        if info.record.iteration == self.iteration {
            self.stop.set(true);
        }
    }
}

fn families() -> Vec<(OptimizerFamily, usize)> {
    vec![
        (OptimizerFamily::Exhaustive(ExhaustiveSettings { step_length: 0.5, number_of_steps: 1 }), 2),
        (OptimizerFamily::GradientDescent(GradientDescentSettings::default()), 2),
        (OptimizerFamily::QuaternionRigidGradientDescent(GradientDescentSettings { learning_rate: 0.1, number_of_iterations: 50 }), 7),
        (OptimizerFamily::Lbfgsb(LbfgsbSettings::default()), 2),
        (OptimizerFamily::OnePlusOneEvolutionary(OnePlusOneSettings::default()), 2),
        (OptimizerFamily::Powell(PowellSettings::default()), 2),
        (OptimizerFamily::Frpr(FrprSettings::default()), 2),
        (OptimizerFamily::RegularStepGradientDescent(RegularStepSettings::default()), 2),
        (OptimizerFamily::VersorTransform(RegularStepSettings::default()), 3),
        (OptimizerFamily::VersorRigid3DTransform(RegularStepSettings::default()), 6),
        (OptimizerFamily::Amoeba(AmoebaSettings::default()), 2),
        (OptimizerFamily::ConjugateGradient(ConjugateGradientSettings::default()), 2),
        (OptimizerFamily::Lbfgs(LbfgsSettings::default()), 2),
        (OptimizerFamily::Spsa(SpsaSettings::default()), 2),
    ]
}

#[test]
fn test_stop_is_honoured_exactly_where_supported() {
    for (family, n) in families() {
        let parameters = OptimizerParameters::new(family);
        parameters.validate(n).unwrap();

        let stop = StopHandle::new();
        let progress = ProgressTracker::new().with_callback(Arc::new(StopAt { iteration: 1, stop: stop.clone() }));
        let mut observer = RegistrationObserver::new().with_progress(progress).with_stop_handle(stop);

        let target = DVector::from_element(n, 0.2);
        let mut cost = FnCost::new(n, move |x: &DVector<f64>| Ok((x - &target).norm_squared()));
        let mut optimizer = parameters.build(n, DVector::from_element(n, 1.0)).unwrap();
        let outcome = optimizer.optimize(&mut cost, DVector::zeros(n), &mut observer).unwrap();

        let name = parameters.name();
        if parameters.supports_stop() {
            assert_eq!(outcome.stop_condition, StopCondition::UserRequested, "{name}");
            assert_eq!(outcome.iterations, 1, "{name}");
            assert_eq!(observer.iterations(), 1, "{name}");
        } else {
            assert_ne!(outcome.stop_condition, StopCondition::UserRequested, "{name}");
        }
    }
}

#[test]
fn test_exhaustive_search_runs_past_a_stop_request() {
    let stop = StopHandle::new();
    let progress = ProgressTracker::new().with_callback(Arc::new(StopAt { iteration: 2, stop: stop.clone() }));
    let mut observer = RegistrationObserver::new().with_progress(progress).with_stop_handle(stop);

    let parameters =
        OptimizerParameters::new(OptimizerFamily::Exhaustive(ExhaustiveSettings { step_length: 1.0, number_of_steps: 1 }));
    let mut optimizer = parameters.build(2, DVector::from_element(2, 1.0)).unwrap();
    let mut cost = FnCost::new(2, |x: &DVector<f64>| Ok(x.norm_squared()));
    let outcome = optimizer.optimize(&mut cost, DVector::zeros(2), &mut observer).unwrap();

    assert_eq!(outcome.stop_condition, StopCondition::SearchComplete);
    assert_eq!(observer.iterations(), parameters.iteration_budget(2));
    assert_eq!(observer.iterations(), 9);
}

#[test]
fn test_support_flag_matches_documented_families() {
    let supporting = [
        "GradientDescent",
        "RegularStepGradientDescent",
        "OnePlusOneEvolutionary",
        "Powell",
        "FRPR",
        "VersorTransform",
        "VersorRigid3DTransform",
        "SPSA",
    ];
    for (family, _) in families() {
        let parameters = OptimizerParameters::new(family);
        if supporting.contains(&parameters.name()) {
            assert!(parameters.supports_stop(), "{}", parameters.name());
        }
    }
    for name in ["Exhaustive", "LBFGSB", "Amoeba", "ConjugateGradient", "LBFGS"] {
        let parameters = families()
            .into_iter()
            .map(|(family, _)| OptimizerParameters::new(family))
            .find(|p| p.name() == name)
            .unwrap_or_else(|| panic!("no family named {name}"));
        assert!(!parameters.supports_stop(), "{name}");
    }
}
