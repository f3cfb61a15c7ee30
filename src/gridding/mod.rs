// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Gridding loose visibilities onto the Fourier grid of [`GridCoords`], and
//! making diagnostic dirty images.
//!
//! Every sample is paired with its Hermitian conjugate (-u, -v, re, -im, w)
//! before gridding, so that the gridded cube corresponds to a real image.

mod dataset;
mod error;
mod vis_data;

pub use dataset::GriddedDataset;
pub use error::GriddingError;
pub use vis_data::VisData;

use std::{collections::VecDeque, str::FromStr};

use itertools::Itertools;
use log::{debug, warn};
use ndarray::{concatenate, prelude::*};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, IntoStaticStr};

use crate::{
    c64,
    constants::{ROBUST_MAX, ROBUST_MIN},
    coords::{CoordsError, GridCoords},
    math::{packed_cube_to_sky_cube, Fft2},
};

lazy_static::lazy_static! {
    static ref WEIGHTING_TYPES_COMMA_SEPARATED: String = WeightingType::iter().join(", ");

    static ref IMAGE_UNITS_COMMA_SEPARATED: String = ImageUnit::iter().join(", ");
}

/// The names of the supported weighting schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum WeightingType {
    Natural,
    Uniform,
    Briggs,
}

/// How visibilities are weighted when making a dirty image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Weighting {
    /// Every sample keeps its own weight.
    Natural,

    /// Every occupied grid cell contributes equally.
    Uniform,

    /// Briggs (robust) weighting, as defined by CASA. `robust` = -2 is close to
    /// uniform weighting and `robust` = 2 is close to natural weighting.
    Briggs { robust: f64 },
}

impl Weighting {
    /// Briggs weighting with a checked `robust` value.
    pub fn briggs(robust: f64) -> Result<Weighting, GriddingError> {
        let w = Weighting::Briggs { robust };
        w.validate()?;
        Ok(w)
    }

    pub fn weighting_type(&self) -> WeightingType {
        match self {
            Weighting::Natural => WeightingType::Natural,
            Weighting::Uniform => WeightingType::Uniform,
            Weighting::Briggs { .. } => WeightingType::Briggs,
        }
    }

    fn validate(&self) -> Result<(), GriddingError> {
        match *self {
            Weighting::Briggs { robust } if !(ROBUST_MIN..=ROBUST_MAX).contains(&robust) => {
                Err(GriddingError::RobustOutOfRange(robust))
            }
            _ => Ok(()),
        }
    }
}

impl FromStr for Weighting {
    type Err = GriddingError;

    /// Parse "natural", "uniform" or "briggs". A robust value may be given as
    /// "briggs=<robust>"; a bare "briggs" uses robust = 0.
    fn from_str(s: &str) -> Result<Weighting, GriddingError> {
        let (name, robust) = match s.trim().split_once('=') {
            Some((name, robust)) => (name.trim(), Some(robust.trim())),
            None => (s.trim(), None),
        };
        let invalid = || GriddingError::InvalidWeighting {
            got: s.to_string(),
            expected: WEIGHTING_TYPES_COMMA_SEPARATED.as_str(),
        };

        let weighting_type = WeightingType::iter()
            .find(|wt| {
                let wt_str: &'static str = wt.into();
                wt_str.eq_ignore_ascii_case(name)
            })
            .ok_or_else(invalid)?;
        match (weighting_type, robust) {
            (WeightingType::Natural, None) => Ok(Weighting::Natural),
            (WeightingType::Uniform, None) => Ok(Weighting::Uniform),
            (WeightingType::Briggs, None) => Weighting::briggs(0.0),
            (WeightingType::Briggs, Some(r)) => {
                Weighting::briggs(r.parse().map_err(|_| invalid())?)
            }
            _ => Err(invalid()),
        }
    }
}

/// The unit of a dirty image.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Display,
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
pub enum ImageUnit {
    #[default]
    #[strum(serialize = "Jy/beam")]
    #[serde(rename = "Jy/beam")]
    JyBeam,

    /// Surface brightness; the Jy/beam image divided by the dirty-beam area.
    #[strum(serialize = "Jy/arcsec^2")]
    #[serde(rename = "Jy/arcsec^2")]
    JyArcsec2,

    /// The Jy/arcsec² image multiplied by the pixel area.
    #[strum(serialize = "Jy/pixel")]
    #[serde(rename = "Jy/pixel")]
    JyPixel,
}

impl FromStr for ImageUnit {
    type Err = GriddingError;

    fn from_str(s: &str) -> Result<ImageUnit, GriddingError> {
        ImageUnit::iter()
            .find(|unit| {
                let unit_str: &'static str = unit.into();
                unit_str.eq_ignore_ascii_case(s.trim())
            })
            .ok_or_else(|| GriddingError::InvalidUnit {
                got: s.to_string(),
                expected: IMAGE_UNITS_COMMA_SEPARATED.as_str(),
            })
    }
}

/// A dirty image and its dirty beam, both (nchan, npix, npix) in sky
/// orientation.
#[derive(Debug, Clone)]
pub struct DirtyImage {
    pub image: Array3<f64>,

    /// The dirty beam; its peak is 1 at [`GridCoords::sky_origin_pixel`].
    pub beam: Array3<f64>,

    pub unit: ImageUnit,
}

/// Grids visibilities. The samples are validated and indexed once, at
/// construction.
#[derive(Debug, Clone)]
pub struct Gridder {
    coords: GridCoords,
    fft: Fft2,

    /// Hermitian-augmented samples; every array is (nchan, 2 * nvis).
    uu: Array2<f64>,
    vv: Array2<f64>,
    data: Array2<c64>,
    weight: Array2<f64>,

    /// The packed (row, column) cell of every augmented sample.
    cell_index: Array2<(usize, usize)>,
}

impl Gridder {
    pub fn new(coords: GridCoords, vis: &VisData) -> Result<Gridder, GriddingError> {
        coords.check_data_fit(vis.uu(), vis.vv())?;

        let uu = concatenate![Axis(1), vis.uu(), vis.uu().mapv(|u| -u)];
        let vv = concatenate![Axis(1), vis.vv(), vis.vv().mapv(|v| -v)];
        let data = vis.data();
        let data = concatenate![Axis(1), data, data.mapv(|d| d.conj())];
        let weight = concatenate![Axis(1), vis.weight(), vis.weight()];

        let npix = coords.npix();
        let mut cell_index = Array2::from_elem(uu.dim(), (0, 0));
        for ((index, &u), &v) in cell_index.iter_mut().zip(uu.iter()).zip(vv.iter()) {
            match (coords.packed_index(v), coords.packed_index(u)) {
                (Some(row), Some(col)) => *index = (row, col),
                _ => {
                    return Err(CoordsError::VisibilitiesOutsideGrid {
                        max_uv: u.abs().max(v.abs()),
                        max_grid: coords.max_grid(),
                    }
                    .into())
                }
            }
        }

        debug!(
            "Gridder: {} channels, {} samples (with Hermitian pairs) on a {npix}x{npix} grid",
            uu.len_of(Axis(0)),
            uu.len_of(Axis(1))
        );
        Ok(Gridder {
            fft: Fft2::new(npix),
            coords,
            uu,
            vv,
            data,
            weight,
            cell_index,
        })
    }

    pub fn coords(&self) -> &GridCoords {
        &self.coords
    }

    pub fn nchan(&self) -> usize {
        self.uu.len_of(Axis(0))
    }

    /// Sum `values` (one per augmented sample) into their cells on a packed
    /// (npix, npix) grid for channel `chan`.
    fn scatter<T>(&self, chan: usize, values: impl Iterator<Item = T>) -> Array2<T>
    where
        T: Clone + num_traits::Zero + std::ops::AddAssign,
    {
        let npix = self.coords.npix();
        let mut grid = Array2::zeros((npix, npix));
        for (&index, value) in self.cell_index.row(chan).iter().zip(values) {
            grid[index] += value;
        }
        grid
    }

    /// The number of samples (including Hermitian pairs) in every cell; a
    /// packed (nchan, npix, npix) cube.
    pub fn ncell_vis(&self) -> Array3<usize> {
        let npix = self.coords.npix();
        let mut cube = Array3::zeros((self.nchan(), npix, npix));
        for (chan, mut out) in cube.outer_iter_mut().enumerate() {
            out.assign(&self.scatter(chan, std::iter::repeat(1_usize)));
        }
        cube
    }

    /// The summed weight W_k of every cell for a channel (packed).
    fn cell_weights(&self, chan: usize) -> Array2<f64> {
        self.scatter(chan, self.weight.row(chan).iter().copied())
    }

    /// The density weight of every sample in a channel.
    fn density_weights(&self, chan: usize, weighting: Weighting) -> Array1<f64> {
        let nsamples = self.weight.len_of(Axis(1));
        let cell_index = self.cell_index.row(chan);
        match weighting {
            Weighting::Natural => Array1::ones(nsamples),

            Weighting::Uniform => {
                let cell_weights = self.cell_weights(chan);
                // Every sample's cell has a positive weight; at least the
                // sample itself is in it.
                cell_index.mapv(|k| 1.0 / cell_weights[k])
            }

            Weighting::Briggs { robust } => {
                let cell_weights = self.cell_weights(chan);
                let sum_weights: f64 = self.weight.row(chan).sum();
                let sum_cell_weights_sq: f64 = cell_weights.iter().map(|w| w * w).sum();
                let f_sq = (5.0 * 10_f64.powf(-robust)).powi(2) / (sum_cell_weights_sq / sum_weights);
                cell_index.mapv(|k| 1.0 / (1.0 + f_sq * cell_weights[k]))
            }
        }
    }

    /// Image the gridded values of every channel. With `use_data` false, unit
    /// visibilities are used (i.e. the dirty beam is made). The result is in
    /// Jy/beam and is in sky orientation.
    fn image(
        &self,
        weighting: Weighting,
        taper: &dyn Fn(f64, f64) -> f64,
        use_data: bool,
    ) -> Array3<f64> {
        let npix = self.coords.npix();
        let mut packed = Array3::zeros((self.nchan(), npix, npix));
        for (chan, mut out) in packed.outer_iter_mut().enumerate() {
            let density = self.density_weights(chan, weighting);
            let imaging_weights: Array1<f64> = self
                .weight
                .row(chan)
                .iter()
                .zip(self.uu.row(chan))
                .zip(self.vv.row(chan))
                .zip(density.iter())
                .map(|(((&w, &u), &v), &d)| w * taper(u, v) * d)
                .collect();
            let total: f64 = imaging_weights.sum();
            if total <= 0.0 || !total.is_finite() {
                warn!("Channel {chan} has no usable imaging weight; its dirty image is empty");
                continue;
            }
            let c = 1.0 / total;

            let mut grid = if use_data {
                self.scatter(
                    chan,
                    imaging_weights
                        .iter()
                        .zip(self.data.row(chan))
                        .map(|(&w, &d)| d * w * c),
                )
            } else {
                self.scatter(chan, imaging_weights.iter().map(|&w| c64::new(w * c, 0.0)))
            };

            // The inverse FFT is normalised by 1/npix²; undo that so that the
            // beam peaks at 1.
            self.fft.inverse(grid.view_mut());
            let scale = (npix * npix) as f64;
            out.iter_mut()
                .zip(grid.iter())
                .for_each(|(o, g)| *o = g.re * scale);
        }
        packed_cube_to_sky_cube(packed.view())
    }

    /// Make the dirty image and dirty beam with a given weighting.
    pub fn get_dirty_image(
        &self,
        weighting: Weighting,
        unit: ImageUnit,
    ) -> Result<DirtyImage, GriddingError> {
        self.get_dirty_image_with_taper(weighting, unit, |_, _| 1.0)
    }

    /// As [`Gridder::get_dirty_image`], but the imaging weight of each sample
    /// is multiplied by `taper(u, v)` (u and v in kilolambda).
    pub fn get_dirty_image_with_taper<F>(
        &self,
        weighting: Weighting,
        unit: ImageUnit,
        taper: F,
    ) -> Result<DirtyImage, GriddingError>
    where
        F: Fn(f64, f64) -> f64,
    {
        weighting.validate()?;
        debug!("Making a dirty image with {weighting:?} weighting in {unit}");

        let beam = self.image(weighting, &taper, false);
        let mut image = self.image(weighting, &taper, true);

        if unit != ImageUnit::JyBeam {
            let areas = dirty_beam_areas(&beam, &self.coords);
            let pixel_area = self.coords.pixel_area_arcsec2();
            for (mut chan, area) in image.outer_iter_mut().zip(areas) {
                let scale = match unit {
                    // Only an empty channel has no main lobe.
                    _ if area <= 0.0 => 0.0,
                    ImageUnit::JyArcsec2 => 1.0 / area,
                    ImageUnit::JyPixel => pixel_area / area,
                    ImageUnit::JyBeam => 1.0,
                };
                chan.mapv_inplace(|v| v * scale);
            }
        }

        Ok(DirtyImage { image, beam, unit })
    }

    /// The area of the main lobe of the dirty beam for each channel
    /// \[arcsec²\].
    pub fn get_dirty_beam_area(&self, weighting: Weighting) -> Result<Vec<f64>, GriddingError> {
        weighting.validate()?;
        let beam = self.image(weighting, &|_, _| 1.0, false);
        Ok(dirty_beam_areas(&beam, &self.coords))
    }

    /// Average the visibilities in each cell (with their natural weights),
    /// for use with [`crate::losses::GriddedLikelihood`].
    pub fn to_dataset(&self) -> GriddedDataset {
        let npix = self.coords.npix();
        let nchan = self.nchan();
        let mut vis = Array3::zeros((nchan, npix, npix));
        let mut weight = Array3::zeros((nchan, npix, npix));

        for (chan, (mut vis_out, mut weight_out)) in vis
            .outer_iter_mut()
            .zip(weight.outer_iter_mut())
            .enumerate()
        {
            let cell_weights = self.cell_weights(chan);
            let weighted_sum = self.scatter(
                chan,
                self.data
                    .row(chan)
                    .iter()
                    .zip(self.weight.row(chan))
                    .map(|(&d, &w)| d * w),
            );
            for (((v, w), &sum), &cw) in vis_out
                .iter_mut()
                .zip(weight_out.iter_mut())
                .zip(weighted_sum.iter())
                .zip(cell_weights.iter())
            {
                if cw > 0.0 {
                    *v = sum / cw;
                    *w = cw;
                }
            }
        }

        GriddedDataset::new(self.coords.clone(), vis, weight)
    }
}

/// The integral of the main lobe of each channel of a (sky-oriented) dirty
/// beam \[arcsec²\]. The main lobe is the positive region connected to the
/// beam's peak.
fn dirty_beam_areas(beam: &Array3<f64>, coords: &GridCoords) -> Vec<f64> {
    let npix = coords.npix();
    let origin = coords.sky_origin_pixel();
    beam.outer_iter()
        .map(|chan| {
            let mut visited = Array2::from_elem((npix, npix), false);
            let mut queue = VecDeque::from([origin]);
            let mut sum = 0.0;
            while let Some((r, c)) = queue.pop_front() {
                if visited[(r, c)] || chan[(r, c)] <= 0.0 {
                    continue;
                }
                visited[(r, c)] = true;
                sum += chan[(r, c)];
                if r > 0 {
                    queue.push_back((r - 1, c));
                }
                if r + 1 < npix {
                    queue.push_back((r + 1, c));
                }
                if c > 0 {
                    queue.push_back((r, c - 1));
                }
                if c + 1 < npix {
                    queue.push_back((r, c + 1));
                }
            }
            sum * coords.pixel_area_arcsec2()
        })
        .collect()
}
