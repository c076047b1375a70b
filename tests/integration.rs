//! Integration tests for the adaptive random forest.
//!
//! These tests run whole streams through the public API.

use adaforest::online::LearnerState;
use adaforest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Three uniform features in [-1, 1]; the label is decided by the first
/// feature, inverted when `flipped`.
fn concept(rng: &mut StdRng, n: usize, flipped: bool) -> (Matrix<f64>, Vec<usize>) {
    let mut data = Vec::with_capacity(n * 3);
    let mut labels = Vec::with_capacity(n);
    for _ in 0..n {
        let row: [f64; 3] = [
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        ];
        let positive = row[0] > 0.0;
        labels.push(usize::from(positive != flipped));
        data.extend_from_slice(&row);
    }
    (
        Matrix::from_vec(n, 3, data).expect("n rows of 3 features"),
        labels,
    )
}

/// Test-then-train over the batch; returns the number of correct predictions.
fn prequential(forest: &mut AdaptiveRandomForest<SubspaceNaiveBayesFactory>, x: &Matrix<f64>, y: &[usize]) -> usize {
    let mut correct = 0;
    for (row, &label) in x.rows().zip(y) {
        if forest.predict_instance(row) == label {
            correct += 1;
        }
        forest.partial_fit_instance(row, label, 1.0).expect("valid row");
    }
    correct
}

fn forest(builder: ArfBuilder) -> AdaptiveRandomForest<SubspaceNaiveBayesFactory> {
    builder
        .n_estimators(5)
        .max_features(MaxFeatures::All)
        .random_state(2024)
        .build()
        .expect("valid configuration")
}

#[test]
fn test_recovers_from_abrupt_drift() {
    let mut rng = StdRng::seed_from_u64(1);
    let (before_x, before_y) = concept(&mut rng, 2000, false);
    let (after_x, after_y) = concept(&mut rng, 2000, true);
    let (tail_x, tail_y) = concept(&mut rng, 1000, true);

    let mut adaptive = forest(ArfBuilder::new());
    let mut fixed = forest(ArfBuilder::new().drift_detector(None).warning_detector(None));

    for model in [&mut adaptive, &mut fixed] {
        let correct = prequential(model, &before_x, &before_y);
        assert!(correct as f64 / 2000.0 > 0.85, "first concept accuracy");
        prequential(model, &after_x, &after_y);
    }

    let adaptive_tail = prequential(&mut adaptive, &tail_x, &tail_y) as f64 / 1000.0;
    let fixed_tail = prequential(&mut fixed, &tail_x, &tail_y) as f64 / 1000.0;

    assert!(adaptive_tail > 0.85, "adaptive accuracy after drift: {adaptive_tail}");
    assert!(adaptive_tail > fixed_tail, "{adaptive_tail} vs {fixed_tail}");
    assert!(adaptive.learners().iter().all(|l| l.drift_count() >= 1));
    assert!(adaptive.total_warnings() >= 1);
    assert_eq!(fixed.total_drifts(), 0);
    assert_eq!(adaptive.instances_seen(), 5000);
}

#[test]
fn test_drift_updates_created_on_and_evaluator() {
    let mut rng = StdRng::seed_from_u64(5);
    let (before_x, before_y) = concept(&mut rng, 1000, false);
    let (after_x, after_y) = concept(&mut rng, 1000, true);

    let mut model = forest(ArfBuilder::new().warning_detector(None));
    model.partial_fit(&before_x, &before_y, None).expect("valid batch");
    assert!(model.learners().iter().all(|l| l.created_on() == 1));

    model.partial_fit(&after_x, &after_y, None).expect("valid batch");
    for learner in model.learners() {
        assert!(learner.drift_count() >= 1);
        assert!(learner.created_on() > 1000);
        assert_eq!(learner.created_on(), learner.last_drift_on());
        // The evaluator restarted at the drift
        assert!(learner.evaluator().weight_seen() <= (2000 - learner.created_on() + 1) as f64);
        assert_eq!(learner.state(), LearnerState::Active);
    }
}

#[test]
fn test_reset_then_retrain_is_reproducible() {
    let mut rng = StdRng::seed_from_u64(9);
    let (x, y) = concept(&mut rng, 600, false);
    let (drift_x, drift_y) = concept(&mut rng, 600, true);

    let train = |model: &mut AdaptiveRandomForest<SubspaceNaiveBayesFactory>| {
        model.partial_fit(&x, &y, None).expect("valid batch");
        model.partial_fit(&drift_x, &drift_y, None).expect("valid batch");
    };

    let mut model = forest(ArfBuilder::new());
    train(&mut model);
    let first = model.predict(&x);
    let first_votes = model.predict_proba(&drift_x);
    let first_drifts = model.total_drifts();

    model.reset();
    train(&mut model);
    assert_eq!(model.predict(&x), first);
    assert_eq!(model.predict_proba(&drift_x), first_votes);
    assert_eq!(model.total_drifts(), first_drifts);

    let mut fresh = forest(ArfBuilder::new());
    train(&mut fresh);
    assert_eq!(fresh.predict(&x), first);
}

#[test]
fn test_parallel_matches_sequential() {
    let mut rng = StdRng::seed_from_u64(13);
    let (x, y) = concept(&mut rng, 800, false);
    let (drift_x, drift_y) = concept(&mut rng, 800, true);

    let mut sequential = forest(ArfBuilder::new());
    let mut parallel = forest(ArfBuilder::new().parallel(true));
    for model in [&mut sequential, &mut parallel] {
        model.partial_fit(&x, &y, None).expect("valid batch");
        model.partial_fit(&drift_x, &drift_y, None).expect("valid batch");
    }

    assert_eq!(sequential.predict(&drift_x), parallel.predict(&drift_x));
    assert_eq!(sequential.predict_proba(&x), parallel.predict_proba(&x));
    for (a, b) in sequential.learners().iter().zip(parallel.learners()) {
        assert_eq!(a.drift_count(), b.drift_count());
        assert_eq!(a.warning_count(), b.warning_count());
        assert_eq!(a.created_on(), b.created_on());
        assert_eq!(a.evaluator().aggregation(), b.evaluator().aggregation());
    }
}

#[test]
fn test_max_features_resolution_table() {
    let cases = [
        (MaxFeatures::Auto, 3),
        (MaxFeatures::Log2, 3),
        (MaxFeatures::Fraction(0.4), 4),
        (MaxFeatures::Count(-3), 7),
        (MaxFeatures::Count(15), 10),
        (MaxFeatures::All, 10),
    ];
    let x = Matrix::from_vec(1, 10, vec![0.5; 10]).expect("1x10");
    for (policy, expected) in cases {
        let mut model = ArfBuilder::new()
            .n_estimators(2)
            .max_features(policy)
            .random_state(3)
            .build()
            .expect("valid configuration");
        model.partial_fit(&x, &[1], None).expect("valid batch");
        assert_eq!(model.max_features(), Some(expected), "{policy:?}");
        for learner in model.learners() {
            assert_eq!(learner.classifier().subspace().len(), expected);
        }
    }
}

#[test]
fn test_unknown_max_features_string_falls_back_to_sqrt() {
    let policy: MaxFeatures = "quarter".parse().unwrap_or_default();
    let mut model = ArfBuilder::new()
        .max_features(policy)
        .random_state(3)
        .build()
        .expect("valid configuration");
    let x = Matrix::from_vec(1, 16, vec![0.0; 16]).expect("1x16");
    model.partial_fit(&x, &[0], None).expect("valid batch");
    assert_eq!(model.max_features(), Some(4));
}

#[test]
fn test_default_label_before_training() {
    let model = ArfBuilder::new().build().expect("valid configuration");
    let x = Matrix::from_vec(2, 2, vec![1.0, 2.0, 3.0, 4.0]).expect("2x2");
    assert_eq!(model.predict(&x), vec![DEFAULT_LABEL, DEFAULT_LABEL]);
    assert!(model.learners().is_empty());
}

#[test]
fn test_forest_from_json_config() {
    let config = ArfConfig::from_json(
        r#"{
            "n_estimators": 4,
            "max_features": "all",
            "lambda": 3.0,
            "drift_detector": {"kind": "ddm", "min_samples": 30, "warning_level": 2.0, "drift_level": 3.0},
            "warning_detector": null,
            "random_state": 11
        }"#,
    )
    .expect("valid configuration");
    let mut model = AdaptiveRandomForest::new(config).expect("valid configuration");

    let mut rng = StdRng::seed_from_u64(21);
    let (x, y) = concept(&mut rng, 300, false);
    model.partial_fit(&x, &y, None).expect("valid batch");
    assert_eq!(model.learners().len(), 4);
    assert_eq!(model.max_features(), Some(3));
    assert!(model.learners().iter().all(|l| !l.has_warning_detector()));
    assert!(model.score(&x, &y).expect("non-empty batch") > 0.8);
}

#[test]
fn test_seed_from_generator_is_reproducible() {
    let mut rng = StdRng::seed_from_u64(4);
    let (x, y) = concept(&mut rng, 200, false);

    let build = || {
        ArfBuilder::new()
            .n_estimators(3)
            .random_state_from_rng(&mut StdRng::seed_from_u64(77))
            .build()
            .expect("valid configuration")
    };
    let mut a = build();
    let mut b = build();
    assert_eq!(a.root_seed(), b.root_seed());
    a.partial_fit(&x, &y, None).expect("valid batch");
    b.partial_fit(&x, &y, None).expect("valid batch");
    assert_eq!(a.predict_proba(&x), b.predict_proba(&x));
}

#[test]
fn test_custom_factory_closure() {
    let mut model = ArfBuilder::new()
        .n_estimators(3)
        .random_state(8)
        .build_with_factory(|ctx: &LearnerContext| {
            SubspaceNaiveBayes::new(ctx.n_features, ctx.n_features, ctx.seed)
        })
        .expect("valid configuration");

    let mut rng = StdRng::seed_from_u64(30);
    let (x, y) = concept(&mut rng, 400, false);
    model.partial_fit(&x, &y, Some(&[2.0])).expect("valid batch");
    assert!((model.train_weight_seen() - 800.0).abs() < 1e-9);
    assert!(model
        .learners()
        .iter()
        .all(|l| l.classifier().subspace() == [0, 1, 2]));
    assert!(model.score(&x, &y).expect("non-empty batch") > 0.85);
}
