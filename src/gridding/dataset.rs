// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use ndarray::prelude::*;

use crate::{c64, coords::GridCoords, math::fftshift_2d};

/// Visibilities averaged onto the grid, in packed layout. Each of the cubes is
/// (nchan, npix, npix). Unoccupied cells have zero visibility and weight, and
/// are excluded by the mask.
#[derive(Debug, Clone)]
pub struct GriddedDataset {
    coords: GridCoords,
    vis: Array3<c64>,
    weight: Array3<f64>,
    mask: Array3<bool>,
}

impl GriddedDataset {
    /// `weight` holds the summed weight of each cell; a cell is occupied if
    /// its weight is positive.
    pub fn new(coords: GridCoords, vis: Array3<c64>, weight: Array3<f64>) -> GriddedDataset {
        let mask = weight.mapv(|w| w > 0.0);
        GriddedDataset {
            coords,
            vis,
            weight,
            mask,
        }
    }

    pub fn coords(&self) -> &GridCoords {
        &self.coords
    }

    pub fn nchan(&self) -> usize {
        self.vis.len_of(Axis(0))
    }

    pub fn vis(&self) -> ArrayView3<c64> {
        self.vis.view()
    }

    pub fn weight(&self) -> ArrayView3<f64> {
        self.weight.view()
    }

    pub fn mask(&self) -> ArrayView3<bool> {
        self.mask.view()
    }

    /// The number of occupied cells across all channels.
    pub fn num_occupied(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }

    /// The mask of a channel with the zero spacing in the middle, e.g. for
    /// plotting the (u,v) coverage.
    pub fn ground_mask(&self, chan: usize) -> Array2<bool> {
        fftshift_2d(self.mask.index_axis(Axis(0), chan))
    }
}
