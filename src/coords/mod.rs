// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Image-plane and Fourier-plane grid geometry.
//!
//! Everything that touches the regular grid (the FFT layer, the NuFFT
//! k-trajectory conversion and the gridder) derives its geometry from a single
//! [`GridCoords`]. The image plane is `npix` × `npix` pixels of `cell_size`
//! arcseconds; the Fourier plane has the same number of cells, each `du`
//! kilolambda wide.
//!
//! Ground-layout cell `k` (zero frequency in the middle) covers the half-open
//! interval `[du (k - npix/2 - 1/2), du (k - npix/2 + 1/2))`.

mod error;

pub use error::CoordsError;

use log::debug;
use ndarray::prelude::*;

use crate::{
    constants::{ARCSEC, KLAMBDA},
    math::ifftshift_2d,
};

/// The geometry of a square image and its Fourier-plane grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GridCoords {
    /// The width of an image-plane pixel \[arcseconds\].
    cell_size: f64,

    /// The number of pixels per image side.
    npix: usize,

    /// The width of an image-plane pixel \[radians\].
    dl: f64,

    /// The width of a Fourier-plane cell \[kilolambda\].
    du: f64,

    /// Fourier-plane cell edges in ground layout \[kilolambda\]. There are
    /// `npix + 1` of them.
    u_edges: Array1<f64>,

    /// Fourier-plane cell centres in ground layout \[kilolambda\].
    u_centers: Array1<f64>,
}

impl GridCoords {
    /// Create a new [`GridCoords`].
    ///
    /// * `cell_size` is the width of a pixel \[arcseconds\]. Must be positive
    ///   and finite.
    /// * `npix` is the number of pixels per image side. Must be positive and
    ///   even; the packed layout relies on the zero frequency being at index
    ///   `npix / 2` after shifting.
    pub fn new(cell_size: f64, npix: usize) -> Result<GridCoords, CoordsError> {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(CoordsError::InvalidCellSize(cell_size));
        }
        if npix == 0 || npix % 2 != 0 {
            return Err(CoordsError::InvalidNpix(npix));
        }

        let dl = cell_size * ARCSEC;
        let du = 1.0 / (npix as f64 * dl) / KLAMBDA;
        let half = (npix / 2) as f64;
        let u_edges = Array1::from_shape_fn(npix + 1, |k| du * (k as f64 - half - 0.5));
        let u_centers = Array1::from_shape_fn(npix, |k| du * (k as f64 - half));
        debug!("Created grid coordinates: {npix}x{npix} pixels, {cell_size}\" cells, {du:.4} kλ Fourier cells");

        Ok(GridCoords {
            cell_size,
            npix,
            dl,
            du,
            u_edges,
            u_centers,
        })
    }

    /// The width of a pixel \[arcseconds\].
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// The number of pixels per image side.
    pub fn npix(&self) -> usize {
        self.npix
    }

    /// The width of a pixel in the l direction \[radians\].
    pub fn dl(&self) -> f64 {
        self.dl
    }

    /// The width of a pixel in the m direction \[radians\]. Pixels are square.
    pub fn dm(&self) -> f64 {
        self.dl
    }

    /// The solid angle of a pixel \[steradians\].
    pub fn pixel_solid_angle(&self) -> f64 {
        self.dl * self.dl
    }

    /// The area of a pixel \[arcseconds²\].
    pub fn pixel_area_arcsec2(&self) -> f64 {
        self.cell_size * self.cell_size
    }

    /// The width of a Fourier-plane cell in u \[kilolambda\].
    pub fn du(&self) -> f64 {
        self.du
    }

    /// The width of a Fourier-plane cell in v \[kilolambda\].
    pub fn dv(&self) -> f64 {
        self.du
    }

    /// Ground-layout cell edges in u \[kilolambda\].
    pub fn u_edges(&self) -> ArrayView1<f64> {
        self.u_edges.view()
    }

    /// Ground-layout cell edges in v \[kilolambda\].
    pub fn v_edges(&self) -> ArrayView1<f64> {
        self.u_edges.view()
    }

    /// Ground-layout cell centres in u \[kilolambda\].
    pub fn u_centers(&self) -> ArrayView1<f64> {
        self.u_centers.view()
    }

    /// Ground-layout cell centres in v \[kilolambda\].
    pub fn v_centers(&self) -> ArrayView1<f64> {
        self.u_centers.view()
    }

    /// The largest |u| or |v| that can be gridded \[kilolambda\]. Both a
    /// sample and its Hermitian conjugate must land in a cell, so this is the
    /// upper edge of the last ground-layout cell. Samples must be strictly
    /// below it.
    pub fn max_grid(&self) -> f64 {
        self.u_edges[self.npix]
    }

    /// The image extent \[arcseconds\] in sky orientation, as (left, right,
    /// bottom, top) edges. Right ascension increases to the left.
    pub fn img_ext(&self) -> [f64; 4] {
        let half = (self.npix / 2) as f64;
        [
            self.cell_size * (half - 0.5),
            -self.cell_size * (half + 0.5),
            -self.cell_size * (half + 0.5),
            self.cell_size * (half - 0.5),
        ]
    }

    /// The Fourier-plane extent \[kilolambda\] in ground layout, as (left,
    /// right, bottom, top) edges.
    pub fn vis_ext(&self) -> [f64; 4] {
        let lo = self.u_edges[0];
        let hi = self.u_edges[self.npix];
        [lo, hi, lo, hi]
    }

    /// The (row, column) of the sky-oriented pixel containing l = m = 0.
    pub fn sky_origin_pixel(&self) -> (usize, usize) {
        (self.npix / 2, self.npix / 2 - 1)
    }

    /// The ground-layout cell index containing the spatial frequency `uv`
    /// \[kilolambda\], if it is on the grid.
    pub fn ground_index(&self, uv: f64) -> Option<usize> {
        let k = (uv / self.du + (self.npix / 2) as f64 + 0.5).floor();
        if k >= 0.0 && k < self.npix as f64 {
            Some(k as usize)
        } else {
            None
        }
    }

    /// The packed-layout (zero frequency first) cell index containing the
    /// spatial frequency `uv` \[kilolambda\], if it is on the grid.
    pub fn packed_index(&self, uv: f64) -> Option<usize> {
        self.ground_index(uv)
            .map(|k| (k + self.npix / 2) % self.npix)
    }

    /// Ensure that all of the supplied spatial frequencies \[kilolambda\] can be
    /// placed on this grid.
    pub fn check_data_fit(&self, uu: ArrayView2<f64>, vv: ArrayView2<f64>) -> Result<(), CoordsError> {
        // f64::max ignores NaN, so non-finite values are propagated here.
        let max_uv = uu.iter().chain(vv.iter()).fold(0.0_f64, |acc, &x| {
            if x.is_finite() {
                acc.max(x.abs())
            } else {
                f64::INFINITY
            }
        });
        let max_grid = self.max_grid();
        if max_uv >= max_grid {
            return Err(CoordsError::VisibilitiesOutsideGrid { max_uv, max_grid });
        }
        Ok(())
    }

    /// The u coordinate of every Fourier-plane cell centre, in ground layout
    /// \[kilolambda\]. Rows are v, columns are u.
    pub fn ground_u_centers_2d(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.npix, self.npix), |(_, c)| self.u_centers[c])
    }

    /// The v coordinate of every Fourier-plane cell centre, in ground layout
    /// \[kilolambda\].
    pub fn ground_v_centers_2d(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.npix, self.npix), |(r, _)| self.u_centers[r])
    }

    /// The radial distance q = sqrt(u² + v²) of every cell centre, in ground
    /// layout \[kilolambda\].
    pub fn ground_q_centers_2d(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.npix, self.npix), |(r, c)| {
            self.u_centers[c].hypot(self.u_centers[r])
        })
    }

    /// The radial distance of every cell centre, in packed layout
    /// \[kilolambda\].
    pub fn packed_q_centers_2d(&self) -> Array2<f64> {
        ifftshift_2d(self.ground_q_centers_2d().view())
    }

    /// The azimuthal angle atan2(v, u) of every cell centre, in packed layout
    /// \[radians\].
    pub fn packed_phi_centers_2d(&self) -> Array2<f64> {
        let ground = Array2::from_shape_fn((self.npix, self.npix), |(r, c)| {
            self.u_centers[r].atan2(self.u_centers[c])
        });
        ifftshift_2d(ground.view())
    }
}

/// How grid coordinates are supplied to a layer: either an existing
/// [`GridCoords`], or the two numbers to build one with.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordsSpec {
    Coords(GridCoords),
    CellSize { cell_size: f64, npix: usize },
}

impl CoordsSpec {
    /// Consolidate loosely-specified arguments (e.g. from a config file).
    /// Exactly one of `coords` or (`cell_size`, `npix`) must be supplied.
    pub fn from_options(
        coords: Option<GridCoords>,
        cell_size: Option<f64>,
        npix: Option<usize>,
    ) -> Result<CoordsSpec, CoordsError> {
        match (coords, cell_size, npix) {
            (Some(coords), None, None) => Ok(CoordsSpec::Coords(coords)),
            (None, Some(cell_size), Some(npix)) => Ok(CoordsSpec::CellSize { cell_size, npix }),
            (Some(_), _, _) => Err(CoordsError::Configuration(
                "cell_size and npix must be empty if precomputed GridCoords are supplied",
            )),
            (None, None, None) => Err(CoordsError::Configuration(
                "either GridCoords or both cell_size and npix must be supplied",
            )),
            (None, _, _) => Err(CoordsError::Configuration(
                "cell_size and npix must be supplied together",
            )),
        }
    }

    /// Get the [`GridCoords`] described by this spec, validating the numbers
    /// if necessary.
    pub fn into_coords(self) -> Result<GridCoords, CoordsError> {
        match self {
            CoordsSpec::Coords(c) => Ok(c),
            CoordsSpec::CellSize { cell_size, npix } => GridCoords::new(cell_size, npix),
        }
    }
}

impl From<GridCoords> for CoordsSpec {
    fn from(c: GridCoords) -> Self {
        CoordsSpec::Coords(c)
    }
}
