// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error types for training.

use std::path::PathBuf;

use thiserror::Error;

use crate::{images::ImageError, losses::LossError};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrainError {
    #[error("The optimizer must be bound to parameters of shape {expected:?} before training, but it is bound to {bound:?}")]
    OptimizerNotBound {
        expected: (usize, usize, usize),
        bound: Option<(usize, usize, usize)>,
    },

    #[error("The loss became non-finite at iteration {iteration}; the last finite loss was {last_finite_loss:?}")]
    NonFiniteLoss {
        iteration: usize,
        last_finite_loss: Option<f64>,
    },

    #[error("The gradient became non-finite at iteration {iteration}; the last finite loss was {last_finite_loss:?}")]
    NonFiniteGradient {
        iteration: usize,
        last_finite_loss: Option<f64>,
    },

    #[error("The model has shape {model:?}, but the likelihood expects {likelihood:?}")]
    Shape {
        model: (usize, usize, usize),
        likelihood: (usize, usize, usize),
    },

    #[error("Invalid training configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Loss(#[from] LossError),

    #[error(transparent)]
    Image(#[from] ImageError),
}

#[derive(Error, Debug)]
pub enum ConfigFileError {
    #[error("Config file {file:?} doesn't have a recognised file extension! Valid extensions are: {valid}")]
    UnrecognisedExtension { file: PathBuf, valid: &'static str },

    #[error("Couldn't decode toml structure from {file:?}:\n{err}")]
    Toml { file: PathBuf, err: String },

    #[error("Couldn't decode json structure from {file:?}:\n{err}")]
    Json { file: PathBuf, err: String },

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
