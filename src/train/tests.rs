// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::io::Write;

use approx::assert_abs_diff_eq;
use indoc::indoc;
use ndarray::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tempfile::Builder;

use super::*;
use crate::{
    coords::GridCoords,
    gridding::{Gridder, VisData},
    images::PixelMapping,
    losses::{Entropy, GriddedLikelihood, Sparsity, TotalSquaredVariation},
};

fn gridded_likelihood(nchan: usize, seed: u64) -> GriddedLikelihood {
    let coords = GridCoords::new(0.5, 8).unwrap();
    let mut rng = StdRng::seed_from_u64(seed);
    let nvis = 40;
    let max = 0.9 * coords.max_grid();
    let uu = Array1::from_shape_simple_fn(nvis, || rng.gen_range(-max..max));
    let vv = Array1::from_shape_simple_fn(nvis, || rng.gen_range(-max..max));
    let uu = uu.broadcast((nchan, nvis)).unwrap().to_owned();
    let vv = vv.broadcast((nchan, nvis)).unwrap().to_owned();
    let re = Array2::from_shape_simple_fn((nchan, nvis), || rng.gen_range(-1.0..1.0));
    let im = Array2::from_shape_simple_fn((nchan, nvis), || rng.gen_range(-1.0..1.0));
    let weight = Array2::from_shape_simple_fn((nchan, nvis), || rng.gen_range(0.5..2.0));
    let vis = VisData::new(uu, vv, re, im, weight).unwrap();
    GriddedLikelihood::new(Gridder::new(coords, &vis).unwrap().to_dataset())
}

fn sgd_config(learning_rate: f64, max_iterations: usize) -> TrainConfig {
    TrainConfig {
        max_iterations,
        optimizer: OptimizerKind::Sgd,
        learning_rate,
        ..Default::default()
    }
}

/// A learning rate that gradient descent is guaranteed to decrease the
/// gridded loss with (half the inverse of a bound on its curvature).
fn safe_learning_rate(likelihood: &GriddedLikelihood, lambda_tsv: f64) -> f64 {
    let coords = likelihood.coords();
    let max_weight = likelihood
        .dataset()
        .weight()
        .fold(0.0_f64, |acc, &w| acc.max(w));
    let npix = coords.npix() as f64;
    let curvature = coords.cell_size().powi(4) * npix * npix * max_weight + 16.0 * lambda_tsv;
    0.5 / curvature
}

/// A scaled L1 norm, to control the size of a regularizer relative to the
/// data term.
#[derive(Debug)]
struct ScaledSparsity(f64);

impl Regularizer for ScaledSparsity {
    fn name(&self) -> &'static str {
        "scaled sparsity"
    }

    fn value(&self, cube: ArrayView3<f64>) -> f64 {
        self.0 * Sparsity.value(cube)
    }

    fn gradient(&self, cube: ArrayView3<f64>) -> Array3<f64> {
        Sparsity.gradient(cube) * self.0
    }
}

#[test]
fn test_convex_loss_decreases_and_converges() {
    let likelihood = gridded_likelihood(1, 30);
    let lambda_tsv = 0.1;
    let config = TrainConfig {
        convergence_tol: 1e-6,
        lambda_tsv: Some(lambda_tsv),
        ..sgd_config(safe_learning_rate(&likelihood, lambda_tsv), 5000)
    };
    let trainer = Trainer::new(config).unwrap();
    let mut model =
        BaseCube::with_fill(likelihood.coords().clone(), 1, PixelMapping::Identity, 0.0).unwrap();
    let mut optimizer = Sgd::new(trainer.config().learning_rate);
    optimizer.bind(model.dim());

    let result = trainer
        .train(&mut model, &likelihood, &mut optimizer)
        .unwrap();
    assert_eq!(result.stop_reason, StopReason::Converged);
    assert!(result.iterations < 5000);
    assert_eq!(result.iterations, result.loss_history.len());
    assert_eq!(result.lambdas, vec![lambda_tsv]);
    assert_abs_diff_eq!(result.loss, *result.loss_history.last());
    for pair in result.loss_history.windows(2) {
        assert!(
            pair[1] <= pair[0] + 1e-12 * pair[0].abs(),
            "{} > {}",
            pair[1],
            pair[0]
        );
    }
    assert!(result.loss < *result.loss_history.first());
}

#[test]
fn test_max_iterations() {
    let likelihood = gridded_likelihood(2, 31);
    let trainer = Trainer::new(TrainConfig {
        convergence_tol: 0.0,
        ..sgd_config(safe_learning_rate(&likelihood, 0.0), 5)
    })
    .unwrap();
    let mut model =
        BaseCube::new(likelihood.coords().clone(), 2, PixelMapping::Softplus).unwrap();
    let mut optimizer = trainer.config().optimizer();
    optimizer.bind(model.dim());

    let result = trainer
        .train(&mut model, &likelihood, optimizer.as_mut())
        .unwrap();
    assert_eq!(result.stop_reason, StopReason::MaxIterations);
    assert_eq!(result.iterations, 5);
    assert!(result.lambdas.is_empty());
}

#[test]
fn test_lambda_guess_balances_terms() {
    let likelihood = gridded_likelihood(1, 32);
    let model = BaseCube::new(likelihood.coords().clone(), 1, PixelMapping::Softplus).unwrap();
    let cube = model.cube();
    let nll = likelihood.loss(cube.view()).unwrap();
    assert!(nll > 0.0);

    // Make the regularizer a million times bigger than the data term.
    let scale = 1e6 * nll / Sparsity.value(cube.view());
    let regularizer = ScaledSparsity(scale);
    assert_abs_diff_eq!(regularizer.value(cube.view()) / nll, 1e6, epsilon = 1e-3);

    let trainer = Trainer::new(TrainConfig::default())
        .unwrap()
        .with_regularizer(Box::new(regularizer), None);
    let lambdas = trainer.guess_lambdas(&likelihood, cube.view()).unwrap();
    assert_eq!(lambdas.len(), 1);
    let weighted = lambdas[0] * trainer.regularizers()[0].regularizer.value(cube.view());
    let ratio = weighted / nll;
    assert!((0.1..=10.0).contains(&ratio), "ratio = {ratio}");

    // Explicit strengths are untouched.
    let trainer = Trainer::new(TrainConfig::default())
        .unwrap()
        .with_regularizer(Box::new(ScaledSparsity(scale)), Some(0.25));
    assert_eq!(
        trainer.guess_lambdas(&likelihood, cube.view()).unwrap(),
        vec![0.25]
    );
}

#[test]
fn test_lambda_guess_of_zero_regularizer() {
    let likelihood = gridded_likelihood(1, 33);
    let cube = Array3::zeros((1, 8, 8));
    let trainer = Trainer::new(TrainConfig {
        lambda_guess: vec![RegularizerKind::Sparsity],
        ..Default::default()
    })
    .unwrap();
    assert_eq!(
        trainer.guess_lambdas(&likelihood, cube.view()).unwrap(),
        vec![0.0]
    );
}

#[test]
fn test_optimizer_not_bound() {
    let likelihood = gridded_likelihood(1, 34);
    let trainer = Trainer::new(TrainConfig::default()).unwrap();
    let mut model =
        BaseCube::new(likelihood.coords().clone(), 1, PixelMapping::Softplus).unwrap();

    let mut optimizer = Adam::new(0.1);
    assert_eq!(
        trainer
            .train(&mut model, &likelihood, &mut optimizer)
            .unwrap_err(),
        TrainError::OptimizerNotBound {
            expected: (1, 8, 8),
            bound: None
        }
    );

    optimizer.bind((2, 8, 8));
    assert_eq!(
        trainer
            .train(&mut model, &likelihood, &mut optimizer)
            .unwrap_err(),
        TrainError::OptimizerNotBound {
            expected: (1, 8, 8),
            bound: Some((2, 8, 8))
        }
    );
}

#[test]
fn test_model_shape_mismatch() {
    let likelihood = gridded_likelihood(2, 35);
    let trainer = Trainer::new(TrainConfig::default()).unwrap();
    let mut model =
        BaseCube::new(likelihood.coords().clone(), 1, PixelMapping::Softplus).unwrap();
    let mut optimizer = Adam::new(0.1);
    optimizer.bind(model.dim());
    assert_eq!(
        trainer
            .train(&mut model, &likelihood, &mut optimizer)
            .unwrap_err(),
        TrainError::Shape {
            model: (1, 8, 8),
            likelihood: (2, 8, 8)
        }
    );
}

#[test]
fn test_non_finite_loss() {
    let likelihood = gridded_likelihood(1, 36);
    // Negative pixels make the entropy NaN.
    let trainer = Trainer::new(TrainConfig {
        lambda_entropy: Some(1.0),
        ..Default::default()
    })
    .unwrap();
    let mut model =
        BaseCube::with_fill(likelihood.coords().clone(), 1, PixelMapping::Identity, -1.0)
            .unwrap();
    let mut optimizer = Adam::new(0.1);
    optimizer.bind(model.dim());
    assert_eq!(
        trainer
            .train(&mut model, &likelihood, &mut optimizer)
            .unwrap_err(),
        TrainError::NonFiniteLoss {
            iteration: 0,
            last_finite_loss: None
        }
    );
}

#[test]
fn test_non_finite_gradient() {
    let likelihood = gridded_likelihood(1, 37);
    // A single zero pixel keeps the entropy finite, but not its gradient.
    let mut base = Array3::from_elem((1, 8, 8), 0.5);
    base[(0, 3, 3)] = 0.0;
    let mut model =
        BaseCube::from_base(likelihood.coords().clone(), base, PixelMapping::Identity).unwrap();
    let trainer = Trainer::new(TrainConfig::default())
        .unwrap()
        .with_regularizer(Box::new(Entropy::default()), Some(1.0));
    let mut optimizer = Adam::new(0.1);
    optimizer.bind(model.dim());
    let expected_loss = likelihood.loss(model.cube().view()).unwrap()
        + Entropy::default().value(model.cube().view());
    assert!(expected_loss.is_finite());
    match trainer
        .train(&mut model, &likelihood, &mut optimizer)
        .unwrap_err()
    {
        TrainError::NonFiniteGradient {
            iteration,
            last_finite_loss,
        } => {
            assert_eq!(iteration, 0);
            let last_finite_loss = last_finite_loss.unwrap();
            assert_abs_diff_eq!(last_finite_loss, expected_loss, epsilon = 1e-10 * expected_loss.abs());
        }
        e => panic!("Unexpected error: {e}"),
    }
}

#[test]
fn test_cancellation() {
    let likelihood = gridded_likelihood(1, 38);
    let cancel = Arc::new(AtomicCell::new(true));
    let trainer = Trainer::new(TrainConfig::default())
        .unwrap()
        .with_regularizer(Box::new(TotalSquaredVariation), None)
        .with_cancel_flag(cancel.clone());
    let mut model =
        BaseCube::new(likelihood.coords().clone(), 1, PixelMapping::Softplus).unwrap();
    let mut optimizer = Adam::new(0.1);
    optimizer.bind(model.dim());

    let result = trainer
        .train(&mut model, &likelihood, &mut optimizer)
        .unwrap();
    assert_eq!(result.stop_reason, StopReason::Cancelled);
    assert_eq!(result.iterations, 1);
    assert!(cancel.load());
}

#[test]
fn test_sgd_momentum() {
    let mut params = Array3::from_elem((1, 2, 2), 1.0);
    let grad = Array3::from_elem((1, 2, 2), 2.0);
    let mut sgd = Sgd::with_momentum(0.1, 0.5);
    assert!(sgd.step(params.view_mut(), grad.view()).is_err());

    sgd.bind(params.dim());
    sgd.step(params.view_mut(), grad.view()).unwrap();
    // v = 2
    assert_abs_diff_eq!(params[(0, 0, 0)], 0.8, epsilon = 1e-12);
    sgd.step(params.view_mut(), grad.view()).unwrap();
    // v = 0.5 * 2 + 2
    assert_abs_diff_eq!(params[(0, 1, 1)], 0.5, epsilon = 1e-12);
}

#[test]
fn test_adam_first_step() {
    let mut params = Array3::zeros((1, 2, 2));
    let grad = array![[[3.0, -0.01], [1e3, 0.0]]];
    let mut adam = Adam::new(0.1);
    adam.bind(params.dim());
    adam.step(params.view_mut(), grad.view()).unwrap();
    // The first bias-corrected step has size lr in the direction of -g.
    assert_abs_diff_eq!(
        params,
        array![[[-0.1, 0.1], [-0.1, 0.0]]],
        epsilon = 1e-6
    );
}

#[test]
fn test_config_validation() {
    assert!(TrainConfig::default().validate().is_ok());
    for config in [
        TrainConfig {
            max_iterations: 0,
            ..Default::default()
        },
        TrainConfig {
            patience: 0,
            ..Default::default()
        },
        TrainConfig {
            learning_rate: -0.1,
            ..Default::default()
        },
        TrainConfig {
            convergence_tol: f64::NAN,
            ..Default::default()
        },
        TrainConfig {
            lambda_tv: Some(-1.0),
            ..Default::default()
        },
        TrainConfig {
            momentum: 1.0,
            ..Default::default()
        },
        TrainConfig {
            momentum: f64::NAN,
            ..Default::default()
        },
        TrainConfig {
            entropy_prior_intensity: 0.0,
            ..Default::default()
        },
        TrainConfig {
            entropy_prior_intensity: f64::INFINITY,
            ..Default::default()
        },
        TrainConfig {
            tv_epsilon: -1e-10,
            ..Default::default()
        },
    ] {
        assert!(matches!(
            Trainer::new(config),
            Err(TrainError::InvalidConfig(_))
        ));
    }
}

#[test]
fn test_config_regularizers() {
    let config = TrainConfig {
        lambda_guess: vec![RegularizerKind::TotalVariation, RegularizerKind::Entropy],
        lambda_tsv: Some(2.0),
        lambda_entropy: Some(0.5),
        ..Default::default()
    };
    let terms = config.regularizers();
    let names: Vec<_> = terms.iter().map(|t| t.regularizer.name()).collect();
    assert_eq!(names, vec!["entropy", "TV", "TSV"]);
    let lambdas: Vec<_> = terms.iter().map(|t| t.lambda).collect();
    assert_eq!(lambdas, vec![Some(0.5), None, Some(2.0)]);
}

#[test]
fn test_config_from_toml() {
    let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(
        indoc! {r#"
            max_iterations = 200
            optimizer = "sgd"
            learning_rate = 0.01
            momentum = 0.9
            lambda_guess = ["tv", "entropy"]
            lambda_sparsity = 1e-4
        "#}
        .as_bytes(),
    )
    .unwrap();

    let config = TrainConfig::from_file(file.path()).unwrap();
    assert_eq!(config.max_iterations, 200);
    assert_eq!(config.optimizer, OptimizerKind::Sgd);
    assert_abs_diff_eq!(config.learning_rate, 0.01);
    assert_abs_diff_eq!(config.momentum, 0.9);
    assert_eq!(
        config.lambda_guess,
        vec![RegularizerKind::TotalVariation, RegularizerKind::Entropy]
    );
    assert_eq!(config.lambda_sparsity, Some(1e-4));
    // Unset fields take their defaults.
    assert_eq!(config.patience, crate::constants::DEFAULT_PATIENCE);
    assert_eq!(config.lambda_tsv, None);
}

#[test]
fn test_config_from_json() {
    let mut file = Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(
        indoc! {r#"
            {
                "convergence_tol": 1e-8,
                "lambda_tsv": 0.5,
                "lambda_guess": ["sparsity"]
            }
        "#}
        .as_bytes(),
    )
    .unwrap();

    let config = TrainConfig::from_file(file.path()).unwrap();
    assert_abs_diff_eq!(config.convergence_tol, 1e-8);
    assert_eq!(config.lambda_tsv, Some(0.5));
    assert_eq!(config.lambda_guess, vec![RegularizerKind::Sparsity]);
    assert_eq!(config.optimizer, OptimizerKind::Adam);
}

#[test]
fn test_config_file_errors() {
    let mut file = Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(b"max_iterations: 10\n").unwrap();
    assert!(matches!(
        TrainConfig::from_file(file.path()),
        Err(ConfigFileError::UnrecognisedExtension { .. })
    ));

    let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(b"max_iterations = \"many\"\n").unwrap();
    assert!(matches!(
        TrainConfig::from_file(file.path()),
        Err(ConfigFileError::Toml { .. })
    ));

    let mut file = Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(br#"{"not_a_field": 1}"#).unwrap();
    assert!(matches!(
        TrainConfig::from_file(file.path()),
        Err(ConfigFileError::Json { .. })
    ));

    assert!(matches!(
        TrainConfig::from_file("/this/does/not/exist.toml"),
        Err(ConfigFileError::IO(_))
    ));
}
