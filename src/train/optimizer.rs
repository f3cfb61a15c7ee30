// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! First-order optimizers.
//!
//! An optimizer keeps per-parameter state, so it has to be bound to the shape
//! of the parameters it will update before its first step.

use ndarray::{prelude::*, Zip};

use super::TrainError;

pub trait Optimizer: std::fmt::Debug {
    /// The shape this optimizer's state was allocated for, if any.
    fn bound_shape(&self) -> Option<(usize, usize, usize)>;

    /// Allocate (or reset) the optimizer state for parameters of this shape.
    fn bind(&mut self, shape: (usize, usize, usize));

    /// Update `params` in place given their gradient.
    fn step(&mut self, params: ArrayViewMut3<f64>, grad: ArrayView3<f64>) -> Result<(), TrainError>;
}

fn check_bound(
    bound: Option<(usize, usize, usize)>,
    params: &ArrayViewMut3<f64>,
    grad: &ArrayView3<f64>,
) -> Result<(), TrainError> {
    match bound {
        Some(shape) if shape == params.dim() && shape == grad.dim() => Ok(()),
        _ => Err(TrainError::OptimizerNotBound {
            expected: params.dim(),
            bound,
        }),
    }
}

/// Stochastic gradient descent, optionally with momentum. With momentum μ,
/// v ← μ v + g and θ ← θ - lr v.
#[derive(Debug, Clone)]
pub struct Sgd {
    learning_rate: f64,
    momentum: f64,
    velocity: Option<Array3<f64>>,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd::with_momentum(learning_rate, 0.0)
    }

    pub fn with_momentum(learning_rate: f64, momentum: f64) -> Sgd {
        Sgd {
            learning_rate,
            momentum,
            velocity: None,
        }
    }
}

impl Optimizer for Sgd {
    fn bound_shape(&self) -> Option<(usize, usize, usize)> {
        self.velocity.as_ref().map(|v| v.dim())
    }

    fn bind(&mut self, shape: (usize, usize, usize)) {
        self.velocity = Some(Array3::zeros(shape));
    }

    fn step(&mut self, mut params: ArrayViewMut3<f64>, grad: ArrayView3<f64>) -> Result<(), TrainError> {
        check_bound(self.bound_shape(), &params, &grad)?;
        let lr = self.learning_rate;
        let momentum = self.momentum;
        match self.velocity.as_mut() {
            Some(velocity) if momentum != 0.0 => {
                Zip::from(&mut params)
                    .and(velocity)
                    .and(&grad)
                    .for_each(|p, v, &g| {
                        *v = momentum * *v + g;
                        *p -= lr * *v;
                    });
            }
            _ => params.scaled_add(-lr, &grad),
        }
        Ok(())
    }
}

/// The Adam optimizer (Kingma & Ba 2015).
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,

    /// The number of steps taken since binding.
    t: i32,
    m: Option<Array3<f64>>,
    v: Option<Array3<f64>>,
}

impl Adam {
    /// Adam with the usual β1 = 0.9, β2 = 0.999, ε = 1e-8.
    pub fn new(learning_rate: f64) -> Adam {
        Adam::with_betas(learning_rate, 0.9, 0.999)
    }

    pub fn with_betas(learning_rate: f64, beta1: f64, beta2: f64) -> Adam {
        Adam {
            learning_rate,
            beta1,
            beta2,
            epsilon: 1e-8,
            t: 0,
            m: None,
            v: None,
        }
    }
}

impl Optimizer for Adam {
    fn bound_shape(&self) -> Option<(usize, usize, usize)> {
        self.m.as_ref().map(|m| m.dim())
    }

    fn bind(&mut self, shape: (usize, usize, usize)) {
        self.t = 0;
        self.m = Some(Array3::zeros(shape));
        self.v = Some(Array3::zeros(shape));
    }

    fn step(&mut self, mut params: ArrayViewMut3<f64>, grad: ArrayView3<f64>) -> Result<(), TrainError> {
        check_bound(self.bound_shape(), &params, &grad)?;
        let (m, v) = match (self.m.as_mut(), self.v.as_mut()) {
            (Some(m), Some(v)) => (m, v),
            _ => {
                return Err(TrainError::OptimizerNotBound {
                    expected: params.dim(),
                    bound: None,
                })
            }
        };

        self.t += 1;
        let (b1, b2, eps, lr) = (self.beta1, self.beta2, self.epsilon, self.learning_rate);
        let bias1 = 1.0 - b1.powi(self.t);
        let bias2 = 1.0 - b2.powi(self.t);
        Zip::from(&mut params)
            .and(m)
            .and(v)
            .and(&grad)
            .for_each(|p, m, v, &g| {
                *m = b1 * *m + (1.0 - b1) * g;
                *v = b2 * *v + (1.0 - b2) * g * g;
                let m_hat = *m / bias1;
                let v_hat = *v / bias2;
                *p -= lr * m_hat / (v_hat.sqrt() + eps);
            });
        Ok(())
    }
}
