use std::sync::Arc;
use burn_ndarray::NdArray;
use rigtk_core::image::Image;
use rigtk_core::spatial::{Direction, Point, Spacing};
use rigtk_core::{ImageMetadata, PyramidSchedule, TransformFamily};
use rigtk_registration::optimizer::{PowellSettings, RegularStepSettings};
use rigtk_registration::{
    HistoryCallback, OptimizerFamily, OptimizerParameters, ProgressTracker, PyramidalRegistrationMethod,
    RegistrationObserver, StopCondition, TransformParameters,
};

type B = NdArray<f32>;

fn hill(cx: f64, cy: f64) -> Image<B, 2> {
    let device = Default::default();
    let d = 64;
    let mut data = Vec::with_capacity(d * d);
    for y in 0..d {
        for x in 0..d {
            let r2 = (x as f64 - cx).powi(2) + (y as f64 - cy).powi(2);
            data.push((100.0 * (-r2 / 200.0).exp()) as f32);
        }
    }
    let metadata = ImageMetadata::new(Point::new([0.0, 0.0]), Spacing::uniform(1.0), Direction::identity()).unwrap();
    Image::from_values(data, [d, d], metadata, &device).unwrap()
}

fn error(parameters: &[f64]) -> f64 {
    ((parameters[0] - 3.0).powi(2) + (parameters[1] + 2.0).powi(2)).sqrt()
}

#[test]
fn test_two_level_pyramid_refines_translation() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let fixed = hill(32.0, 32.0);
    let moving = hill(35.0, 30.0);

    let history = Arc::new(HistoryCallback::new());
    let progress = ProgressTracker::new().with_callback(history.clone());
    let mut observer = RegistrationObserver::new().with_progress(progress.clone());

    let method = PyramidalRegistrationMethod::new(&fixed, &moving)
        .with_schedule(PyramidSchedule::new(vec![vec![4, 4], vec![1, 1]]))
        .with_transform_parameters(TransformParameters::new(TransformFamily::Translation))
        .with_optimizer_parameters(OptimizerParameters::new(OptimizerFamily::RegularStepGradientDescent(
            RegularStepSettings::default(),
        )));
    let result = method.update(&mut observer).unwrap();

    assert_eq!(result.levels.len(), 2);
    let coarse = error(&result.levels[0].parameters);
    let fine = error(&result.levels[1].parameters);
    println!("coarse error {coarse}, fine error {fine}");
    assert!(fine < 0.5);
    assert!(coarse > fine, "coarse {coarse} should exceed fine {fine}");
    assert_eq!(result.parameters, result.levels[1].parameters);

    // Every iteration of both levels reached the progress tracker.
    assert_eq!(result.iterations, result.levels.iter().map(|l| l.iterations).sum::<usize>());
    assert_eq!(history.get_history().len(), result.iterations);
    assert_eq!(progress.steps_to_do(), 100 + 150);
    assert!(progress.steps_done() <= progress.steps_to_do());
}

#[test]
fn test_stop_ends_the_cascade_early() {
    let fixed = hill(32.0, 32.0);
    let moving = hill(35.0, 30.0);
    let mut observer = RegistrationObserver::new();
    observer.set_stop_optimization(true);

    let method = PyramidalRegistrationMethod::new(&fixed, &moving)
        .with_schedule(PyramidSchedule::new(vec![vec![4, 4], vec![2, 2], vec![1, 1]]))
        .with_transform_parameters(TransformParameters::new(TransformFamily::Translation));
    let result = method.update(&mut observer).unwrap();

    assert_eq!(result.stop_condition, StopCondition::UserRequested);
    assert_eq!(result.levels.len(), 1);
    assert_eq!(result.iterations, 1);
}

#[test]
fn test_families_without_step_settings_run_every_level() {
    let fixed = hill(32.0, 32.0);
    let moving = hill(33.0, 31.0);
    let method = PyramidalRegistrationMethod::new(&fixed, &moving)
        .with_schedule(PyramidSchedule::new(vec![vec![2, 2], vec![1, 1]]))
        .with_transform_parameters(TransformParameters::new(TransformFamily::Translation))
        .with_metric_parameters(Default::default())
        .with_optimizer_parameters(OptimizerParameters::new(OptimizerFamily::Powell(PowellSettings::default())));
    let result = method.update(&mut RegistrationObserver::new()).unwrap();
    assert_eq!(result.levels.len(), 2);
    assert!((result.parameters[0] - 1.0).abs() < 0.5);
    assert!((result.parameters[1] + 1.0).abs() < 0.5);
}

#[test]
fn test_histogram_matching_handles_intensity_offset() {
    let fixed = hill(32.0, 32.0);
    let device = Default::default();
    let d = 64;
    let brighter: Vec<f32> = (0..d * d)
        .map(|i| {
            let (x, y) = ((i % d) as f64, (i / d) as f64);
            let r2 = (x - 34.0).powi(2) + (y - 33.0).powi(2);
            (20.0 + 150.0 * (-r2 / 200.0).exp()) as f32
        })
        .collect();
    let moving = Image::<B, 2>::from_values(brighter, [d, d], ImageMetadata::default(), &device).unwrap();

    let method = PyramidalRegistrationMethod::new(&fixed, &moving)
        .with_schedule(PyramidSchedule::new(vec![vec![2, 2], vec![1, 1]]))
        .with_match_histograms(true)
        .with_transform_parameters(TransformParameters::new(TransformFamily::Translation));
    let result = method.update(&mut RegistrationObserver::new()).unwrap();
    assert!((result.parameters[0] - 2.0).abs() < 1.0);
    assert!((result.parameters[1] - 1.0).abs() < 1.0);
}
