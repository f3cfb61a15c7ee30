// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Recover a known image from synthetic visibilities.

use crate::*;
use rml_imager::{
    fourier_gaussian_klambda_arcsec, ground_cube_to_packed_cube, sky_gaussian_arcsec, BaseCube,
    GriddedLikelihood, Gridder, Likelihood, OptimizerKind, PixelMapping, StopReason, TrainConfig,
    Trainer,
};

const AMPLITUDE: f64 = 1.0;
const SIGMA_L: f64 = 0.15;
const SIGMA_M: f64 = 0.1;
const OMEGA: f64 = 0.5;

fn pearson(a: ArrayView3<f64>, b: ArrayView3<f64>) -> f64 {
    let n = a.len() as f64;
    let mean_a = a.sum() / n;
    let mean_b = b.sum() / n;
    let (mut ab, mut aa, mut bb) = (0.0, 0.0, 0.0);
    for (&x, &y) in a.iter().zip(b.iter()) {
        ab += (x - mean_a) * (y - mean_b);
        aa += (x - mean_a).powi(2);
        bb += (y - mean_b).powi(2);
    }
    ab / (aa * bb).sqrt()
}

#[test]
fn test_train_recovers_gaussian() {
    init_logging();
    let coords = GridCoords::new(0.05, 32).unwrap();
    let npix = coords.npix();
    let half = (npix / 2) as f64;
    let cell = coords.cell_size();

    // The true image, centred on the origin, in ground layout and then
    // packed.
    let ground = Array3::from_shape_fn((1, npix, npix), |(_, r, c)| {
        let l = (c as f64 - half) * cell;
        let m = (r as f64 - half) * cell;
        sky_gaussian_arcsec(l, m, AMPLITUDE, 0.0, 0.0, SIGMA_L, SIGMA_M, OMEGA)
    });
    let truth = ground_cube_to_packed_cube(ground.view());

    let mut rng = seeded_rng(200);
    let (uu, vv) = random_uv(&coords, 5000, &mut rng);
    let vis = make_vis(uu, vv, |u, v| {
        fourier_gaussian_klambda_arcsec(u, v, AMPLITUDE, 0.0, 0.0, SIGMA_L, SIGMA_M, OMEGA)
    });
    let likelihood = GriddedLikelihood::new(Gridder::new(coords.clone(), &vis).unwrap().to_dataset());

    // Plain gradient descent with a step that cannot overshoot.
    let max_weight = likelihood
        .dataset()
        .weight()
        .fold(0.0_f64, |acc, &w| acc.max(w));
    let curvature = cell.powi(4) * (npix * npix) as f64 * max_weight;
    let config = TrainConfig {
        max_iterations: 50,
        convergence_tol: 0.0,
        optimizer: OptimizerKind::Sgd,
        learning_rate: 0.5 / curvature,
        ..Default::default()
    };
    let trainer = Trainer::new(config).unwrap();
    let mut model = BaseCube::with_fill(coords, 1, PixelMapping::Identity, 0.0).unwrap();
    let mut optimizer = trainer.config().optimizer();
    optimizer.bind(model.dim());

    let initial_loss = likelihood.loss(model.cube().view()).unwrap();
    let result = trainer
        .train(&mut model, &likelihood, optimizer.as_mut())
        .unwrap();
    assert_eq!(result.stop_reason, StopReason::MaxIterations);
    assert_eq!(result.iterations, 50);
    assert_eq!(*result.loss_history.first(), initial_loss);

    let final_loss = likelihood.loss(model.cube().view()).unwrap();
    assert!(final_loss < initial_loss);
    assert!(final_loss < result.loss);

    let r = pearson(model.cube().view(), truth.view());
    assert!(r > 0.9, "correlation with the true image is only {r}");
}
