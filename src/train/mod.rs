// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Gradient-descent training of a [`BaseCube`] against a likelihood plus
//! weighted regularizers.

mod config;
mod error;
mod optimizer;
#[cfg(test)]
mod tests;

pub use config::{OptimizerKind, RegularizerKind, TrainConfig};
pub use error::{ConfigFileError, TrainError};
pub use optimizer::{Adam, Optimizer, Sgd};

use std::sync::Arc;

use crossbeam_utils::atomic::AtomicCell;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, info, trace, warn};
use ndarray::prelude::*;
use strum_macros::Display;
use vec1::Vec1;

use crate::{
    images::BaseCube,
    losses::{Likelihood, Regularizer},
    PROGRESS_BARS,
};

/// A regularizer and its strength. A strength of `None` is guessed when
/// training starts.
#[derive(Debug)]
pub struct RegularizerTerm {
    pub regularizer: Box<dyn Regularizer>,
    pub lambda: Option<f64>,
}

impl RegularizerTerm {
    pub fn new(regularizer: Box<dyn Regularizer>, lambda: Option<f64>) -> RegularizerTerm {
        RegularizerTerm {
            regularizer,
            lambda,
        }
    }
}

/// Why training stopped.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    #[strum(serialize = "converged")]
    Converged,

    #[strum(serialize = "reached the maximum number of iterations")]
    MaxIterations,

    #[strum(serialize = "cancelled")]
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct TrainResult {
    /// The loss of the last completed iteration.
    pub loss: f64,

    /// The loss at every completed iteration, evaluated before that
    /// iteration's parameter update.
    pub loss_history: Vec1<f64>,

    pub stop_reason: StopReason,

    pub iterations: usize,

    /// The regularizer strengths used, in the order of the trainer's
    /// regularizers.
    pub lambdas: Vec<f64>,
}

#[derive(Debug)]
pub struct Trainer {
    config: TrainConfig,
    regularizers: Vec<RegularizerTerm>,
    cancel: Option<Arc<AtomicCell<bool>>>,
}

impl Trainer {
    /// A trainer with the regularizers the config enables.
    pub fn new(config: TrainConfig) -> Result<Trainer, TrainError> {
        config.validate()?;
        let regularizers = config.regularizers();
        Ok(Trainer {
            config,
            regularizers,
            cancel: None,
        })
    }

    /// Add another regularizer. A `lambda` of `None` is guessed.
    pub fn with_regularizer(mut self, regularizer: Box<dyn Regularizer>, lambda: Option<f64>) -> Trainer {
        self.regularizers
            .push(RegularizerTerm::new(regularizer, lambda));
        self
    }

    /// Training stops after the current iteration once this flag is set.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicCell<bool>>) -> Trainer {
        self.cancel = Some(cancel);
        self
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn regularizers(&self) -> &[RegularizerTerm] {
        &self.regularizers
    }

    /// The strength of every regularizer. Explicit strengths are used as is;
    /// the others are set so that λ |R(cube)| = balance |NLL(cube)|. If a
    /// regularizer's value is zero or non-finite, its guessed strength is 0.
    pub fn guess_lambdas<L: Likelihood + ?Sized>(
        &self,
        likelihood: &L,
        cube: ArrayView3<f64>,
    ) -> Result<Vec<f64>, TrainError> {
        let mut initial_nll = None;
        let mut lambdas = Vec::with_capacity(self.regularizers.len());
        for term in &self.regularizers {
            if let Some(lambda) = term.lambda {
                lambdas.push(lambda);
                continue;
            }

            let nll = match initial_nll {
                Some(nll) => nll,
                None => *initial_nll.insert(likelihood.loss(cube.view())?),
            };
            let name = term.regularizer.name();
            let value = term.regularizer.value(cube.view());
            if value == 0.0 || !value.is_finite() {
                warn!("The {name} regularizer is {value} for the initial image; its strength is set to 0");
                lambdas.push(0.0);
            } else {
                let lambda = self.config.lambda_balance * nll.abs() / value.abs();
                debug!("Guessed lambda for the {name} regularizer: {lambda:e}");
                lambdas.push(lambda);
            }
        }
        Ok(lambdas)
    }

    /// Minimise the likelihood plus the weighted regularizers with respect to
    /// the parameters of `model`. `optimizer` must already be bound to the
    /// shape of the model.
    pub fn train<L, O>(
        &self,
        model: &mut BaseCube,
        likelihood: &L,
        optimizer: &mut O,
    ) -> Result<TrainResult, TrainError>
    where
        L: Likelihood + ?Sized,
        O: Optimizer + ?Sized,
    {
        let shape = model.dim();
        if optimizer.bound_shape() != Some(shape) {
            return Err(TrainError::OptimizerNotBound {
                expected: shape,
                bound: optimizer.bound_shape(),
            });
        }
        let npix = likelihood.coords().npix();
        let expected = (likelihood.nchan(), npix, npix);
        if shape != expected {
            return Err(TrainError::Shape {
                model: shape,
                likelihood: expected,
            });
        }

        let lambdas = self.guess_lambdas(likelihood, model.cube().view())?;
        let max_iterations = self.config.max_iterations;
        info!(
            "Training {} channel(s) of {npix}x{npix} pixels for at most {max_iterations} iterations",
            shape.0
        );
        for (term, lambda) in self.regularizers.iter().zip(lambdas.iter()) {
            info!("  {} regularizer, lambda = {lambda:e}", term.regularizer.name());
        }

        let progress = make_training_progress_bar(max_iterations);
        let mut history: Vec<f64> = Vec::with_capacity(max_iterations.min(10_000));
        let mut stalled = 0;
        let mut stop_reason = StopReason::MaxIterations;

        for iteration in 0..max_iterations {
            model.zero_grad();
            let cube = model.cube();
            let (nll, mut cube_grad) = likelihood.loss_and_grad(cube.view())?;
            let mut loss = nll;
            for (term, &lambda) in self.regularizers.iter().zip(lambdas.iter()) {
                if lambda == 0.0 {
                    continue;
                }
                loss += lambda * term.regularizer.value(cube.view());
                cube_grad.scaled_add(lambda, &term.regularizer.gradient(cube.view()));
            }

            if !loss.is_finite() {
                progress.abandon_with_message("Training failed");
                return Err(TrainError::NonFiniteLoss {
                    iteration,
                    last_finite_loss: history.last().copied(),
                });
            }
            model.accumulate_grad(cube_grad.view())?;
            if model.grad().iter().any(|g| !g.is_finite()) {
                progress.abandon_with_message("Training failed");
                return Err(TrainError::NonFiniteGradient {
                    iteration,
                    last_finite_loss: Some(loss),
                });
            }

            let (params, grad) = model.params_and_grad();
            optimizer.step(params, grad)?;
            trace!("Iteration {iteration}: loss = {loss:e} (nll = {nll:e})");

            if let Some(&previous) = history.last() {
                let improvement = if previous == 0.0 {
                    0.0
                } else {
                    (previous - loss) / previous.abs()
                };
                if improvement < self.config.convergence_tol {
                    stalled += 1;
                } else {
                    stalled = 0;
                }
            }
            history.push(loss);
            progress.inc(1);

            if stalled >= self.config.patience {
                stop_reason = StopReason::Converged;
                break;
            }
            if self.cancel.as_ref().map(|c| c.load()).unwrap_or(false) {
                stop_reason = StopReason::Cancelled;
                break;
            }
        }
        progress.abandon_with_message(format!("Training {stop_reason}"));

        let iterations = history.len();
        let loss_history = Vec1::try_from_vec(history)
            .map_err(|_| TrainError::InvalidConfig("no iterations were run".to_string()))?;
        let loss = *loss_history.last();
        info!("Training {stop_reason} after {iterations} iterations; final loss {loss:e}");

        Ok(TrainResult {
            loss,
            loss_history,
            stop_reason,
            iterations,
            lambdas,
        })
    }
}

fn make_training_progress_bar(max_iterations: usize) -> ProgressBar {
    let style = ProgressStyle::default_bar()
        .template("{msg}: [{wide_bar:.blue}] {pos:5}/{len:5} ({elapsed_precise}<{eta_precise})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    ProgressBar::with_draw_target(
        Some(max_iterations as u64),
        if PROGRESS_BARS.load() {
            ProgressDrawTarget::stdout()
        } else {
            ProgressDrawTarget::hidden()
        },
    )
    .with_style(style)
    .with_position(0)
    .with_message("Training")
}
