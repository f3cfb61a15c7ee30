// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImageError {
    #[error("Expected a cube of shape (nchan, {npix}, {npix}), but got shape {got:?}")]
    Shape { npix: usize, got: Vec<usize> },

    #[error("A cube must have at least one channel")]
    NoChannels,
}
