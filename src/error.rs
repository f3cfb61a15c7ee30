// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all errors in this crate. Each module has its own, more
//! specific error type; this enum wraps all of them so that callers can use a
//! single type with `?`.

use thiserror::Error;

use crate::{
    coords::CoordsError,
    fourier::{FourierError, NuFftError},
    gridding::GriddingError,
    images::ImageError,
    losses::LossError,
    train::{ConfigFileError, TrainError},
};

#[derive(Error, Debug)]
pub enum RmlError {
    #[error(transparent)]
    Coords(#[from] CoordsError),

    #[error(transparent)]
    Fourier(#[from] FourierError),

    #[error(transparent)]
    NuFft(#[from] NuFftError),

    #[error(transparent)]
    Gridding(#[from] GriddingError),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Loss(#[from] LossError),

    #[error(transparent)]
    Train(#[from] TrainError),

    #[error(transparent)]
    ConfigFile(#[from] ConfigFileError),
}
