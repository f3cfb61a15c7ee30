// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Integration tests.
//!
//! Some help for laying out these tests was taken from:
//! https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html

mod gridding;
mod training;

use ndarray::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;

use rml_imager::{GridCoords, VisData};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// `n` single-channel (u,v) samples [kilolambda], normally distributed with a
/// standard deviation of a third of the grid extent and truncated to fit on
/// the grid.
fn random_uv(coords: &GridCoords, n: usize, rng: &mut StdRng) -> (Array1<f64>, Array1<f64>) {
    let max = 0.95 * coords.max_grid();
    let sigma = coords.max_grid() / 3.0;
    let mut draw = || loop {
        let x: f64 = rng.sample(StandardNormal);
        let x = x * sigma;
        if x.abs() < max {
            break x;
        }
    };
    let uu = Array1::from_shape_simple_fn(n, &mut draw);
    let vv = Array1::from_shape_simple_fn(n, &mut draw);
    (uu, vv)
}

/// Single-channel visibilities of `sky` at the given (u,v), with unit
/// weights.
fn make_vis<F>(uu: Array1<f64>, vv: Array1<f64>, sky: F) -> VisData
where
    F: Fn(f64, f64) -> rml_imager::c64,
{
    let data = Array1::from_shape_fn(uu.len(), |i| sky(uu[i], vv[i]));
    let weight = Array1::ones(uu.len());
    VisData::from_complex(uu, vv, data, weight).unwrap()
}

fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}
