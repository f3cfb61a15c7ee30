// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::fourier::{FourierError, NuFftError};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LossError {
    #[error("The model has {model} channels, but the data have {data}")]
    ChannelMismatch { model: usize, data: usize },

    #[error("The (u,v) coordinates differ between channels; a NuFFT likelihood needs the same (u,v) for every channel")]
    ChannelDependentUv,

    #[error(transparent)]
    Fourier(#[from] FourierError),

    #[error(transparent)]
    NuFft(#[from] NuFftError),
}
