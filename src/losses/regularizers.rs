// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Image-plane penalties.

use ndarray::prelude::*;

use crate::{
    constants::{DEFAULT_ENTROPY_PRIOR_INTENSITY, DEFAULT_TV_EPSILON},
    math::{packed_cube_to_sky_cube, sky_cube_to_packed_cube},
};

/// A penalty on the image. Both methods take a packed (nchan, npix, npix)
/// cube; the gradient is also packed.
pub trait Regularizer: std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn value(&self, cube: ArrayView3<f64>) -> f64;

    fn gradient(&self, cube: ArrayView3<f64>) -> Array3<f64>;
}

/// L1 norm of the image, Σ |I|. Promotes sparsity.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sparsity;

impl Regularizer for Sparsity {
    fn name(&self) -> &'static str {
        "sparsity"
    }

    fn value(&self, cube: ArrayView3<f64>) -> f64 {
        cube.iter().map(|v| v.abs()).sum()
    }

    fn gradient(&self, cube: ArrayView3<f64>) -> Array3<f64> {
        cube.mapv(|v| if v == 0.0 { 0.0 } else { v.signum() })
    }
}

/// Image entropy relative to a flat prior:
/// (1 / Σ I) Σ I ln(I / prior_intensity).
///
/// The image must be non-negative.
#[derive(Debug, Clone, Copy)]
pub struct Entropy {
    pub prior_intensity: f64,
}

impl Default for Entropy {
    fn default() -> Self {
        Entropy {
            prior_intensity: DEFAULT_ENTROPY_PRIOR_INTENSITY,
        }
    }
}

impl Entropy {
    /// Σ I ln(I / p), with 0 ln 0 = 0.
    fn weighted_sum(&self, cube: &ArrayView3<f64>) -> f64 {
        let p = self.prior_intensity;
        cube.iter()
            .map(|&v| if v == 0.0 { 0.0 } else { v * (v / p).ln() })
            .sum()
    }
}

impl Regularizer for Entropy {
    fn name(&self) -> &'static str {
        "entropy"
    }

    fn value(&self, cube: ArrayView3<f64>) -> f64 {
        self.weighted_sum(&cube) / cube.sum()
    }

    fn gradient(&self, cube: ArrayView3<f64>) -> Array3<f64> {
        let total = cube.sum();
        let s = self.weighted_sum(&cube) / total;
        let p = self.prior_intensity;
        cube.mapv(|v| ((v / p).ln() + 1.0 - s) / total)
    }
}

/// Sum a penalty of the differences between neighbouring pixels of each
/// channel in sky orientation. `penalty(dl, dm)` returns the penalty and its
/// partial derivatives with respect to dl and dm.
///
/// For pixel (i, j) of the first npix - 1 rows and columns, dl = I\[i, j+1\] -
/// I\[i, j\] and dm = I\[i+1, j\] - I\[i, j\].
fn neighbour_penalty<F>(cube: ArrayView3<f64>, penalty: F) -> (f64, Array3<f64>)
where
    F: Fn(f64, f64) -> (f64, f64, f64),
{
    let sky = packed_cube_to_sky_cube(cube);
    let (nchan, nr, nc) = sky.dim();
    let mut total = 0.0;
    let mut grad = Array3::zeros((nchan, nr, nc));

    for chan in 0..nchan {
        for i in 0..nr.saturating_sub(1) {
            for j in 0..nc.saturating_sub(1) {
                let here = sky[(chan, i, j)];
                let dl = sky[(chan, i, j + 1)] - here;
                let dm = sky[(chan, i + 1, j)] - here;
                let (value, d_dl, d_dm) = penalty(dl, dm);
                total += value;
                grad[(chan, i, j + 1)] += d_dl;
                grad[(chan, i + 1, j)] += d_dm;
                grad[(chan, i, j)] -= d_dl + d_dm;
            }
        }
    }

    // The sky conversion is a permutation, so its inverse maps the gradient
    // back.
    (total, sky_cube_to_packed_cube(grad.view()))
}

/// Total variation, Σ sqrt(dl² + dm² + ε). Promotes piecewise-smooth images
/// with sharp edges.
#[derive(Debug, Clone, Copy)]
pub struct TotalVariation {
    /// Keeps the gradient finite where the image is flat.
    pub epsilon: f64,
}

impl Default for TotalVariation {
    fn default() -> Self {
        TotalVariation {
            epsilon: DEFAULT_TV_EPSILON,
        }
    }
}

impl TotalVariation {
    fn penalty(&self) -> impl Fn(f64, f64) -> (f64, f64, f64) {
        let epsilon = self.epsilon;
        move |dl, dm| {
            let s = (dl * dl + dm * dm + epsilon).sqrt();
            (s, dl / s, dm / s)
        }
    }
}

impl Regularizer for TotalVariation {
    fn name(&self) -> &'static str {
        "TV"
    }

    fn value(&self, cube: ArrayView3<f64>) -> f64 {
        neighbour_penalty(cube, self.penalty()).0
    }

    fn gradient(&self, cube: ArrayView3<f64>) -> Array3<f64> {
        neighbour_penalty(cube, self.penalty()).1
    }
}

/// Total squared variation, Σ (dl² + dm²). Promotes smooth images.
#[derive(Debug, Clone, Copy, Default)]
pub struct TotalSquaredVariation;

fn tsv_penalty(dl: f64, dm: f64) -> (f64, f64, f64) {
    (dl * dl + dm * dm, 2.0 * dl, 2.0 * dm)
}

impl Regularizer for TotalSquaredVariation {
    fn name(&self) -> &'static str {
        "TSV"
    }

    fn value(&self, cube: ArrayView3<f64>) -> f64 {
        neighbour_penalty(cube, tsv_penalty).0
    }

    fn gradient(&self, cube: ArrayView3<f64>) -> Array3<f64> {
        neighbour_penalty(cube, tsv_penalty).1
    }
}
