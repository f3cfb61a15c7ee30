// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Training parameters, optionally read from a toml or json file.

use std::{fs::File, io::Read, path::Path, str::FromStr};

use itertools::Itertools;
use lazy_static::lazy_static;
use log::debug;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use super::{Adam, ConfigFileError, Optimizer, RegularizerTerm, Sgd, TrainError};
use crate::{
    constants::*,
    losses::{Entropy, Sparsity, TotalSquaredVariation, TotalVariation},
};

lazy_static! {
    pub(crate) static ref ARG_FILE_TYPES_COMMA_SEPARATED: String = ArgFileTypes::iter().join(", ");
}

#[derive(Debug, Display, EnumIter, EnumString)]
enum ArgFileTypes {
    #[strum(serialize = "toml")]
    Toml,
    #[strum(serialize = "json")]
    Json,
}

/// The regularizers that can be named in a config.
#[derive(
    Debug, Display, EnumIter, EnumString, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RegularizerKind {
    Sparsity,
    Entropy,
    #[serde(rename = "tv")]
    #[strum(serialize = "tv")]
    TotalVariation,
    #[serde(rename = "tsv")]
    #[strum(serialize = "tsv")]
    TotalSquaredVariation,
}

#[derive(
    Debug, Display, EnumIter, EnumString, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OptimizerKind {
    #[default]
    Adam,
    Sgd,
}

/// Parameters for [`super::Trainer`]. Every field may be left out of a config
/// file, in which case the default from [`crate::constants`] is used.
///
/// A regularizer is used when it has an explicit lambda or when it is listed
/// in `lambda_guess`; in the latter case, its strength is guessed from the
/// initial model (see [`super::Trainer::guess_lambdas`]). An explicit lambda
/// wins over a guess.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainConfig {
    pub max_iterations: usize,
    pub convergence_tol: f64,
    pub patience: usize,

    pub optimizer: OptimizerKind,
    pub learning_rate: f64,
    /// Only used by SGD.
    pub momentum: f64,

    pub lambda_guess: Vec<RegularizerKind>,
    pub lambda_balance: f64,
    pub lambda_sparsity: Option<f64>,
    pub lambda_entropy: Option<f64>,
    pub lambda_tv: Option<f64>,
    pub lambda_tsv: Option<f64>,

    pub entropy_prior_intensity: f64,
    pub tv_epsilon: f64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            convergence_tol: DEFAULT_CONVERGENCE_TOL,
            patience: DEFAULT_PATIENCE,
            optimizer: OptimizerKind::default(),
            learning_rate: DEFAULT_LEARNING_RATE,
            momentum: 0.0,
            lambda_guess: vec![],
            lambda_balance: DEFAULT_LAMBDA_BALANCE,
            lambda_sparsity: None,
            lambda_entropy: None,
            lambda_tv: None,
            lambda_tsv: None,
            entropy_prior_intensity: DEFAULT_ENTROPY_PRIOR_INTENSITY,
            tv_epsilon: DEFAULT_TV_EPSILON,
        }
    }
}

impl TrainConfig {
    /// Read a config from a toml or json file. The format is picked from the
    /// file extension.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<TrainConfig, ConfigFileError> {
        let file = file.as_ref();
        debug!("Attempting to parse config file {}", file.display());

        let file_type = file
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .and_then(|e| ArgFileTypes::from_str(&e).ok());
        let file_type = match file_type {
            Some(t) => t,
            None => {
                return Err(ConfigFileError::UnrecognisedExtension {
                    file: file.to_path_buf(),
                    valid: ARG_FILE_TYPES_COMMA_SEPARATED.as_str(),
                })
            }
        };

        let mut contents = String::new();
        let mut fh = File::open(file)?;
        fh.read_to_string(&mut contents)?;

        match file_type {
            ArgFileTypes::Toml => {
                debug!("Parsing toml file...");
                toml::from_str(&contents).map_err(|err| ConfigFileError::Toml {
                    file: file.to_path_buf(),
                    err: err.to_string(),
                })
            }
            ArgFileTypes::Json => {
                debug!("Parsing json file...");
                serde_json::from_str(&contents).map_err(|err| ConfigFileError::Json {
                    file: file.to_path_buf(),
                    err: err.to_string(),
                })
            }
        }
    }

    pub(crate) fn validate(&self) -> Result<(), TrainError> {
        if self.max_iterations == 0 {
            return Err(TrainError::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if self.patience == 0 {
            return Err(TrainError::InvalidConfig(
                "patience must be at least 1".to_string(),
            ));
        }
        if !(self.convergence_tol >= 0.0) {
            return Err(TrainError::InvalidConfig(format!(
                "convergence_tol must be non-negative, got {}",
                self.convergence_tol
            )));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(TrainError::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.lambda_balance > 0.0 && self.lambda_balance.is_finite()) {
            return Err(TrainError::InvalidConfig(format!(
                "lambda_balance must be positive, got {}",
                self.lambda_balance
            )));
        }
        let lambdas = [
            self.lambda_sparsity,
            self.lambda_entropy,
            self.lambda_tv,
            self.lambda_tsv,
        ];
        if let Some(l) = lambdas
            .into_iter()
            .flatten()
            .find(|l| !(*l >= 0.0 && l.is_finite()))
        {
            return Err(TrainError::InvalidConfig(format!(
                "regularizer strengths must be non-negative, got {l}"
            )));
        }
        if !(self.momentum >= 0.0 && self.momentum < 1.0) {
            return Err(TrainError::InvalidConfig(format!(
                "momentum must be in [0, 1), got {}",
                self.momentum
            )));
        }
        if !(self.entropy_prior_intensity > 0.0 && self.entropy_prior_intensity.is_finite()) {
            return Err(TrainError::InvalidConfig(format!(
                "entropy_prior_intensity must be positive, got {}",
                self.entropy_prior_intensity
            )));
        }
        if !(self.tv_epsilon > 0.0 && self.tv_epsilon.is_finite()) {
            return Err(TrainError::InvalidConfig(format!(
                "tv_epsilon must be positive, got {}",
                self.tv_epsilon
            )));
        }
        Ok(())
    }

    /// The optimizer named by this config. It still needs to be bound.
    pub fn optimizer(&self) -> Box<dyn Optimizer> {
        match self.optimizer {
            OptimizerKind::Adam => Box::new(Adam::new(self.learning_rate)),
            OptimizerKind::Sgd => Box::new(Sgd::with_momentum(self.learning_rate, self.momentum)),
        }
    }

    /// The regularizers enabled by this config, in a fixed order. A lambda of
    /// `None` is to be guessed.
    pub fn regularizers(&self) -> Vec<RegularizerTerm> {
        RegularizerKind::iter()
            .filter_map(|kind| {
                let lambda = match kind {
                    RegularizerKind::Sparsity => self.lambda_sparsity,
                    RegularizerKind::Entropy => self.lambda_entropy,
                    RegularizerKind::TotalVariation => self.lambda_tv,
                    RegularizerKind::TotalSquaredVariation => self.lambda_tsv,
                };
                if lambda.is_none() && !self.lambda_guess.contains(&kind) {
                    return None;
                }

                let term = match kind {
                    RegularizerKind::Sparsity => RegularizerTerm::new(Box::new(Sparsity), lambda),
                    RegularizerKind::Entropy => RegularizerTerm::new(
                        Box::new(Entropy {
                            prior_intensity: self.entropy_prior_intensity,
                        }),
                        lambda,
                    ),
                    RegularizerKind::TotalVariation => RegularizerTerm::new(
                        Box::new(TotalVariation {
                            epsilon: self.tv_epsilon,
                        }),
                        lambda,
                    ),
                    RegularizerKind::TotalSquaredVariation => {
                        RegularizerTerm::new(Box::new(TotalSquaredVariation), lambda)
                    }
                };
                Some(term)
            })
            .collect()
    }
}
