// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error types for the Fourier layers.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FourierError {
    #[error("Expected a cube of shape (nchan, {npix}, {npix}), but got shape {got:?}")]
    Shape { npix: usize, got: Vec<usize> },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NuFftError {
    #[error("Expected a cube of shape (nchan, {npix}, {npix}), but got shape {got:?}")]
    Shape { npix: usize, got: Vec<usize> },

    #[error("Visibilities have shape {got:?}, but (nchan, nvis) = {expected:?} were expected")]
    VisShape {
        expected: (usize, usize),
        got: (usize, usize),
    },

    #[error("u and v must have the same length; got {u} and {v}")]
    UvLengthMismatch { u: usize, v: usize },

    #[error("No (u,v) coordinates were supplied at construction or at call time")]
    MissingTrajectory,
}
