// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for grid-coordinate errors.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoordsError {
    #[error("Invalid grid configuration: {0}")]
    Configuration(&'static str),

    #[error("cell_size must be a positive, finite number of arcseconds; got {0}")]
    InvalidCellSize(f64),

    #[error("npix must be a positive, even number; got {0}")]
    InvalidNpix(usize),

    #[error("Dataset contains spatial frequencies up to {max_uv:.3} kλ, but the grid only supports up to {max_grid:.3} kλ. Decrease cell_size to fit the data on the grid")]
    VisibilitiesOutsideGrid { max_uv: f64, max_grid: f64 },
}
