// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Useful constants.

All constants *must* be double precision. As many calculations as possible are
done in double precision.
 */

pub use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// Radians per arcsecond.
pub const ARCSEC: f64 = PI / (180.0 * 3600.0);

/// Wavelengths per kilolambda.
pub const KLAMBDA: f64 = 1e3;

/// The most negative robust parameter allowed for Briggs weighting. At this
/// value Briggs weighting is (almost) uniform weighting.
pub const ROBUST_MIN: f64 = -2.0;

/// The most positive robust parameter allowed for Briggs weighting. At this
/// value Briggs weighting is (almost) natural weighting.
pub const ROBUST_MAX: f64 = 2.0;

/// The maximum number of times to iterate during training.
pub const DEFAULT_MAX_ITERATIONS: usize = 10_000;

/// The relative loss improvement below which an iteration counts towards
/// convergence.
pub const DEFAULT_CONVERGENCE_TOL: f64 = 1e-5;

/// The number of consecutive iterations that must be below the convergence
/// tolerance before training stops.
pub const DEFAULT_PATIENCE: usize = 3;

/// The ratio of a regularizer's weighted value to the data term when its
/// strength is guessed.
pub const DEFAULT_LAMBDA_BALANCE: f64 = 1.0;

/// Prior intensity used by the entropy regularizer [Jy/arcsec²].
pub const DEFAULT_ENTROPY_PRIOR_INTENSITY: f64 = 1e-10;

/// Softening parameter of the total-variation regularizer.
pub const DEFAULT_TV_EPSILON: f64 = 1e-10;

/// The default learning rate of optimizers.
pub const DEFAULT_LEARNING_RATE: f64 = 0.3;

/// The value that base-cube parameters are initialised with, before the pixel
/// mapping is applied.
pub const DEFAULT_BASE_CUBE_FILL: f64 = 0.05;
