// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for gridding and weighting.

use thiserror::Error;

use crate::coords::CoordsError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GriddingError {
    #[error("{name} has shape {got:?}, but it must be {expected}")]
    Shape {
        name: &'static str,
        expected: String,
        got: Vec<usize>,
    },

    #[error("No visibilities were supplied")]
    NoVisibilities,

    #[error("Unknown weighting '{got}'; supported weightings are: {expected}")]
    InvalidWeighting { got: String, expected: &'static str },

    #[error("Briggs robust parameter must be within [-2, 2]; got {0}")]
    RobustOutOfRange(f64),

    #[error("Unknown image unit '{got}'; supported units are: {expected}")]
    InvalidUnit { got: String, expected: &'static str },

    #[error("Visibility weights must be positive and finite; channel {chan} sample {index} has weight {value}")]
    InvalidWeight {
        chan: usize,
        index: usize,
        value: f64,
    },

    #[error(transparent)]
    Coords(#[from] CoordsError),
}
