// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Some helper mathematics: array packing, 2D FFTs and analytic functions
//! useful for making synthetic data.
//!
//! Three layouts of a square cube are used throughout:
//!
//! * "packed": FFT-native; the zero frequency (or the image origin) is at
//!   index 0 of each spatial axis.
//! * "ground": fftshifted; the zero frequency is at index `npix / 2`.
//! * "sky": ground layout with the l (RA) axis flipped, so that east is to
//!   the left when plotted with the origin in the lower-left.


use std::sync::Arc;

use ndarray::prelude::*;
use num_traits::Zero;
use rustfft::{Fft, FftPlanner};

use crate::{
    c64,
    constants::{ARCSEC, KLAMBDA, PI, TAU},
};

/// Complex exponential. The argument is assumed to be purely imaginary.
///
/// This function doesn't actually use complex numbers; it just returns the real
/// and imag components from Euler's formula (i.e. e^{ix} = cos{x} + i sin{x}).
#[inline]
pub(crate) fn cexp(x: f64) -> c64 {
    let (im, re) = x.sin_cos();
    c64::new(re, im)
}

/// ln(1 + e^x), without overflowing for large x.
#[inline]
pub(crate) fn softplus(x: f64) -> f64 {
    if x > 30.0 {
        x
    } else {
        x.exp().ln_1p()
    }
}

/// The derivative of [`softplus`].
#[inline]
pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Copy `a` with every axis rolled; `out[r, c] = a[(r + sr) % nr, (c + sc) % nc]`.
fn roll_2d<T: Clone>(a: ArrayView2<T>, sr: usize, sc: usize) -> Array2<T> {
    let (nr, nc) = a.dim();
    Array2::from_shape_fn((nr, nc), |(r, c)| a[((r + sr) % nr, (c + sc) % nc)].clone())
}

/// Copy `a` with both spatial axes rolled.
fn roll_cube<T: Clone>(a: ArrayView3<T>, sr: usize, sc: usize) -> Array3<T> {
    let (nchan, nr, nc) = a.dim();
    Array3::from_shape_fn((nchan, nr, nc), |(i, r, c)| {
        a[(i, (r + sr) % nr, (c + sc) % nc)].clone()
    })
}

/// Move the zero frequency from index 0 to the middle of both axes.
pub(crate) fn fftshift_2d<T: Clone>(a: ArrayView2<T>) -> Array2<T> {
    let (nr, nc) = a.dim();
    roll_2d(a, nr - nr / 2, nc - nc / 2)
}

/// The inverse of [`fftshift_2d`].
pub(crate) fn ifftshift_2d<T: Clone>(a: ArrayView2<T>) -> Array2<T> {
    let (nr, nc) = a.dim();
    roll_2d(a, nr / 2, nc / 2)
}

/// Convert a packed cube (nchan, npix, npix) to ground layout by fftshifting
/// each channel.
pub fn packed_cube_to_ground_cube<T: Clone>(cube: ArrayView3<T>) -> Array3<T> {
    let (_, nr, nc) = cube.dim();
    roll_cube(cube, nr - nr / 2, nc - nc / 2)
}

/// Convert a ground cube (nchan, npix, npix) to packed layout by
/// ifftshifting each channel.
pub fn ground_cube_to_packed_cube<T: Clone>(cube: ArrayView3<T>) -> Array3<T> {
    let (_, nr, nc) = cube.dim();
    roll_cube(cube, nr / 2, nc / 2)
}

/// Convert a packed image cube to sky orientation: shift the origin to the
/// middle and flip the l axis so that RA increases to the left.
pub fn packed_cube_to_sky_cube<T: Clone>(cube: ArrayView3<T>) -> Array3<T> {
    let mut ground = packed_cube_to_ground_cube(cube);
    ground.invert_axis(Axis(2));
    ground.as_standard_layout().into_owned()
}

/// The inverse of [`packed_cube_to_sky_cube`].
pub fn sky_cube_to_packed_cube<T: Clone>(cube: ArrayView3<T>) -> Array3<T> {
    let mut flipped = cube;
    flipped.invert_axis(Axis(2));
    ground_cube_to_packed_cube(flipped)
}

/// Planned forward and inverse FFTs for square `n` × `n` arrays.
///
/// The forward transform is unnormalised; the inverse transform is normalised
/// by `1 / n²`, so that `inverse(forward(a)) == a`. This matches the
/// "backward" normalisation convention of most array libraries.
#[derive(Clone)]
pub(crate) struct Fft2 {
    n: usize,
    fwd: Arc<dyn Fft<f64>>,
    inv: Arc<dyn Fft<f64>>,
}

impl std::fmt::Debug for Fft2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fft2").field("n", &self.n).finish()
    }
}

impl Fft2 {
    pub(crate) fn new(n: usize) -> Fft2 {
        let mut planner = FftPlanner::new();
        Fft2 {
            n,
            fwd: planner.plan_fft_forward(n),
            inv: planner.plan_fft_inverse(n),
        }
    }

    /// Forward-transform `a` in place.
    pub(crate) fn forward(&self, a: ArrayViewMut2<c64>) {
        self.process(a, &self.fwd);
    }

    /// Inverse-transform `a` in place, including the `1 / n²` normalisation.
    pub(crate) fn inverse(&self, mut a: ArrayViewMut2<c64>) {
        self.process(a.view_mut(), &self.inv);
        let norm = 1.0 / (self.n * self.n) as f64;
        a.mapv_inplace(|v| v * norm);
    }

    fn process(&self, mut a: ArrayViewMut2<c64>, fft: &Arc<dyn Fft<f64>>) {
        assert_eq!(a.dim(), (self.n, self.n));
        let mut buffer = vec![c64::zero(); self.n];
        let mut scratch = vec![c64::zero(); fft.get_inplace_scratch_len()];

        // Rows, then columns. Lanes are copied through a buffer because
        // columns aren't contiguous.
        for axis in [Axis(1), Axis(0)] {
            for mut lane in a.lanes_mut(axis) {
                buffer
                    .iter_mut()
                    .zip(lane.iter())
                    .for_each(|(b, &l)| *b = l);
                fft.process_with_scratch(&mut buffer, &mut scratch);
                lane.iter_mut()
                    .zip(buffer.iter())
                    .for_each(|(l, &b)| *l = b);
            }
        }
    }
}

/// An elliptical Gaussian in the image plane \[Jy/arcsec²\].
///
/// * `l`, `m` are sky offsets \[arcsec\].
/// * `a` is the peak intensity \[Jy/arcsec²\].
/// * `delta_l`, `delta_m` are the offsets of the centre \[arcsec\].
/// * `sigma_l`, `sigma_m` are the widths \[arcsec\].
/// * `omega` is the rotation of the Gaussian \[radians\].
#[allow(clippy::too_many_arguments)]
pub fn sky_gaussian_arcsec(
    l: f64,
    m: f64,
    a: f64,
    delta_l: f64,
    delta_m: f64,
    sigma_l: f64,
    sigma_m: f64,
    omega: f64,
) -> f64 {
    let lp = l - delta_l;
    let mp = m - delta_m;
    let (s, c) = omega.sin_cos();
    let lpp = lp * c - mp * s;
    let mpp = lp * s + mp * c;
    a * (-0.5 * (lpp / sigma_l).powi(2) - 0.5 * (mpp / sigma_m).powi(2)).exp()
}

/// The analytic Fourier transform of [`sky_gaussian_arcsec`] at the spatial
/// frequency (`u`, `v`) \[kilolambda\]. The result is in Jy.
#[allow(clippy::too_many_arguments)]
pub fn fourier_gaussian_klambda_arcsec(
    u: f64,
    v: f64,
    a: f64,
    delta_l: f64,
    delta_m: f64,
    sigma_l: f64,
    sigma_m: f64,
    omega: f64,
) -> c64 {
    // Work in radians and lambda.
    let u = u * KLAMBDA;
    let v = v * KLAMBDA;
    let delta_l = delta_l * ARCSEC;
    let delta_m = delta_m * ARCSEC;
    let sigma_l_rad = sigma_l * ARCSEC;
    let sigma_m_rad = sigma_m * ARCSEC;

    let (s, c) = omega.sin_cos();
    let up = u * c - v * s;
    let vp = u * s + v * c;

    // a is per arcsec², so the amplitude uses the widths in arcsec.
    let amp = TAU
        * a
        * sigma_l
        * sigma_m
        * (-2.0 * PI * PI * (sigma_l_rad.powi(2) * up.powi(2) + sigma_m_rad.powi(2) * vp.powi(2)))
            .exp();
    amp * cexp(-TAU * (u * delta_l + v * delta_m))
}
