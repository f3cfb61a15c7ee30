// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Visibilities at arbitrary (u,v) locations.

use std::borrow::Cow;

use log::debug;
use ndarray::prelude::*;
use num_traits::Zero;
use rayon::prelude::*;

use super::NuFftError;
use crate::{
    c64,
    constants::{KLAMBDA, TAU},
    coords::{CoordsError, GridCoords},
    math::{cexp, ground_cube_to_packed_cube, packed_cube_to_ground_cube},
};

/// A non-uniform discrete Fourier transform of a single centred image.
///
/// Image pixel (r, c) sits at offset (r - npix/2, c - npix/2) from the origin.
/// The `ktraj` argument has shape (2, nk): row 0 holds the v coordinates and
/// row 1 holds the u coordinates, both in radians per pixel.
pub trait NufftPrimitive {
    /// y_k = Σ_{r,c} image\[r,c\] exp(-i (kv_k (r - npix/2) + ku_k (c - npix/2)))
    fn forward(&self, image: ArrayView2<c64>, ktraj: ArrayView2<f64>) -> Array1<c64>;

    /// The adjoint of [`NufftPrimitive::forward`]; returns an (npix, npix)
    /// centred image.
    fn adjoint(&self, samples: ArrayView1<c64>, ktraj: ArrayView2<f64>, npix: usize)
        -> Array2<c64>;
}

/// An exact (and slow) [`NufftPrimitive`]; every output sample is a sum over
/// every pixel.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectNudft;

/// exp(-i k (n - npix/2)) for every k in `ks` (rows) and every pixel index n
/// (columns).
fn phase_table(ks: ArrayView1<f64>, npix: usize) -> Array2<c64> {
    let half = (npix / 2) as f64;
    Array2::from_shape_fn((ks.len(), npix), |(k, n)| cexp(-ks[k] * (n as f64 - half)))
}

impl NufftPrimitive for DirectNudft {
    fn forward(&self, image: ArrayView2<c64>, ktraj: ArrayView2<f64>) -> Array1<c64> {
        let npix = image.len_of(Axis(0));
        let row_phases = phase_table(ktraj.row(0), npix);
        let col_phases = phase_table(ktraj.row(1), npix);

        // The phase is separable, so sum along each row first.
        let samples: Vec<c64> = (0..ktraj.len_of(Axis(1)))
            .into_par_iter()
            .map(|k| {
                let col_phase = col_phases.row(k);
                image
                    .outer_iter()
                    .zip(row_phases.row(k))
                    .fold(c64::zero(), |acc, (row, &rp)| {
                        let row_sum = row
                            .iter()
                            .zip(col_phase)
                            .fold(c64::zero(), |s, (&p, &cp)| s + p * cp);
                        acc + rp * row_sum
                    })
            })
            .collect();
        Array1::from(samples)
    }

    fn adjoint(
        &self,
        samples: ArrayView1<c64>,
        ktraj: ArrayView2<f64>,
        npix: usize,
    ) -> Array2<c64> {
        // Conjugated phases.
        let row_phases = phase_table(ktraj.row(0), npix).mapv(|c| c.conj());
        let col_phases = phase_table(ktraj.row(1), npix).mapv(|c| c.conj());

        let mut image = Array2::zeros((npix, npix));
        image
            .outer_iter_mut()
            .into_par_iter()
            .enumerate()
            .for_each(|(r, mut out_row)| {
                for ((&y, &rp), col_phase) in samples
                    .iter()
                    .zip(row_phases.column(r))
                    .zip(col_phases.outer_iter())
                {
                    let weight = y * rp;
                    out_row
                        .iter_mut()
                        .zip(col_phase)
                        .for_each(|(o, &cp)| *o += weight * cp);
                }
            });
        image
    }
}

/// A layer translating a packed image cube into visibilities at a set of
/// (u,v) locations.
///
/// A trajectory can be cached at construction time with [`NuFft::with_uv`];
/// (u,v) supplied at call time take precedence over the cached trajectory.
/// The same (u,v) are used for every channel.
#[derive(Debug, Clone)]
pub struct NuFft<P: NufftPrimitive = DirectNudft> {
    coords: GridCoords,
    primitive: P,

    /// The cached (2, nvis) trajectory, if any.
    k_traj: Option<Array2<f64>>,
}

impl NuFft<DirectNudft> {
    pub fn new(coords: GridCoords) -> NuFft<DirectNudft> {
        NuFft::with_primitive(coords, DirectNudft)
    }

    pub fn from_cell_size(cell_size: f64, npix: usize) -> Result<NuFft<DirectNudft>, CoordsError> {
        Ok(NuFft::new(GridCoords::new(cell_size, npix)?))
    }
}

impl<P: NufftPrimitive> NuFft<P> {
    pub fn with_primitive(coords: GridCoords, primitive: P) -> NuFft<P> {
        NuFft {
            coords,
            primitive,
            k_traj: None,
        }
    }

    /// Cache the trajectory for the baselines `uu` and `vv` \[kilolambda\].
    pub fn with_uv(mut self, uu: &[f64], vv: &[f64]) -> Result<NuFft<P>, NuFftError> {
        let k_traj = self.assemble_ktraj(uu, vv)?;
        debug!("Cached a NuFFT trajectory with {} points", k_traj.len_of(Axis(1)));
        self.k_traj = Some(k_traj);
        Ok(self)
    }

    pub fn coords(&self) -> &GridCoords {
        &self.coords
    }

    /// Convert a spatial frequency \[kilolambda\] to radians per pixel.
    pub fn klambda_to_radpix(&self, klambda: f64) -> f64 {
        klambda * KLAMBDA * TAU * self.coords.dl()
    }

    /// Stack (v, u) into a (2, nvis) trajectory in radians per pixel.
    pub fn assemble_ktraj(&self, uu: &[f64], vv: &[f64]) -> Result<Array2<f64>, NuFftError> {
        if uu.len() != vv.len() {
            return Err(NuFftError::UvLengthMismatch {
                u: uu.len(),
                v: vv.len(),
            });
        }
        let mut k_traj = Array2::zeros((2, uu.len()));
        k_traj
            .row_mut(0)
            .iter_mut()
            .zip(vv)
            .for_each(|(k, &v)| *k = self.klambda_to_radpix(v));
        k_traj
            .row_mut(1)
            .iter_mut()
            .zip(uu)
            .for_each(|(k, &u)| *k = self.klambda_to_radpix(u));
        Ok(k_traj)
    }

    fn k_traj(&self, uv: Option<(&[f64], &[f64])>) -> Result<Cow<'_, Array2<f64>>, NuFftError> {
        match (uv, &self.k_traj) {
            (Some((uu, vv)), _) => Ok(Cow::Owned(self.assemble_ktraj(uu, vv)?)),
            (None, Some(k)) => Ok(Cow::Borrowed(k)),
            (None, None) => Err(NuFftError::MissingTrajectory),
        }
    }

    /// Predict visibilities for each channel of a packed image cube. The
    /// result has shape (nchan, nvis) and is in Jy when the cube is in
    /// Jy/arcsec².
    pub fn forward<D: Dimension>(
        &self,
        cube: ArrayView<f64, D>,
        uv: Option<(&[f64], &[f64])>,
    ) -> Result<Array2<c64>, NuFftError> {
        let npix = self.coords.npix();
        let got = cube.shape().to_vec();
        let cube = match cube.into_dimensionality::<Ix3>() {
            Ok(c) if c.dim().1 == npix && c.dim().2 == npix => c,
            _ => return Err(NuFftError::Shape { npix, got }),
        };
        let k_traj = self.k_traj(uv)?;
        let nchan = cube.len_of(Axis(0));
        let nvis = k_traj.len_of(Axis(1));

        let prefactor = self.coords.pixel_area_arcsec2();
        // The primitive expects the origin in the middle of the image.
        let centred = packed_cube_to_ground_cube(cube).mapv(|v| c64::new(v * prefactor, 0.0));
        let mut vis = Array2::zeros((nchan, nvis));
        for (image, mut out) in centred.outer_iter().zip(vis.outer_iter_mut()) {
            out.assign(&self.primitive.forward(image, k_traj.view()));
        }
        Ok(vis)
    }

    /// Apply the adjoint of [`NuFft::forward`] to (nchan, nvis) visibilities,
    /// keeping the real part. The result is a packed (nchan, npix, npix) cube.
    pub fn adjoint(
        &self,
        vis: ArrayView2<c64>,
        uv: Option<(&[f64], &[f64])>,
    ) -> Result<Array3<f64>, NuFftError> {
        let k_traj = self.k_traj(uv)?;
        let nvis = k_traj.len_of(Axis(1));
        let nchan = vis.len_of(Axis(0));
        if vis.dim() != (nchan, nvis) {
            return Err(NuFftError::VisShape {
                expected: (nchan, nvis),
                got: vis.dim(),
            });
        }

        let npix = self.coords.npix();
        let prefactor = self.coords.pixel_area_arcsec2();
        let mut centred = Array3::zeros((nchan, npix, npix));
        for (samples, mut out) in vis.outer_iter().zip(centred.outer_iter_mut()) {
            out.assign(&self.primitive.adjoint(samples, k_traj.view(), npix));
        }
        Ok(ground_cube_to_packed_cube(centred.view()).mapv(|v| v.re * prefactor))
    }
}
