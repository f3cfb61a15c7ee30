// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Regularized maximum likelihood (RML) imaging of radio-interferometric
visibilities.

A pixelated image cube is forward-modelled into visibilities (either on the
regular Fourier grid with [`FourierCube`] or at the exact (u,v) locations of the
data with [`NuFft`]), compared against the data with a likelihood, and
regularized with image-plane penalties. [`Trainer`] drives the gradient descent.
[`Gridder`] produces the diagnostic dirty image and the gridded dataset.
 */

pub mod constants;
pub mod coords;
mod error;
pub mod fourier;
pub mod gridding;
pub mod images;
pub mod losses;
pub(crate) mod math;
pub mod train;

// Re-exports.
pub use coords::{CoordsError, CoordsSpec, GridCoords};
pub use error::RmlError;
pub use fourier::{DirectNudft, FourierCube, FourierError, NuFft, NuFftError, NufftPrimitive};
pub use gridding::{
    DirtyImage, GriddedDataset, Gridder, GriddingError, ImageUnit, VisData, Weighting,
};
pub use images::{BaseCube, ImageCube, ImageError, PixelMapping};
pub use losses::{
    Entropy, GriddedLikelihood, Likelihood, LooseLikelihood, LossError, Regularizer, Sparsity,
    TotalSquaredVariation, TotalVariation,
};
pub use math::{
    fourier_gaussian_klambda_arcsec, ground_cube_to_packed_cube,
    packed_cube_to_ground_cube, packed_cube_to_sky_cube, sky_cube_to_packed_cube,
    sky_gaussian_arcsec,
};
pub use train::{
    Adam, ConfigFileError, Optimizer, OptimizerKind, RegularizerKind, RegularizerTerm, Sgd,
    StopReason, TrainConfig, TrainError, TrainResult, Trainer,
};

use crossbeam_utils::atomic::AtomicCell;

/// Double-precision complex numbers. All Fourier-domain quantities use this
/// type.
#[allow(non_camel_case_types)]
pub type c64 = num_complex::Complex<f64>;

/// Should progress bars be drawn during training? Callers that want progress
/// bars (e.g. an interactive front-end) should set this to `true`.
pub static PROGRESS_BARS: AtomicCell<bool> = AtomicCell::new(false);
