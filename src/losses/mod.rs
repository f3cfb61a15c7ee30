// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Loss functions: the data likelihood and image-plane regularizers.
//!
//! Every loss provides its value and its gradient with respect to the packed
//! image cube. For the likelihoods, the gradient is the adjoint of the Fourier
//! layer applied to w (m - d).

mod error;
mod regularizers;

pub use error::LossError;
pub use regularizers::{Entropy, Regularizer, Sparsity, TotalSquaredVariation, TotalVariation};

use ndarray::{prelude::*, Zip};

use crate::{
    c64,
    coords::GridCoords,
    fourier::{FourierCube, NuFft},
    gridding::{GriddedDataset, VisData},
};

/// The negative log likelihood of `data` given `model`, up to a constant:
/// ½ Σ w |d - m|². The arrays must have the same shape.
pub fn nll<D: Dimension>(
    model: ArrayView<c64, D>,
    data: ArrayView<c64, D>,
    weight: ArrayView<f64, D>,
) -> f64 {
    0.5 * Zip::from(&model)
        .and(&data)
        .and(&weight)
        .fold(0.0, |acc, &m, &d, &w| acc + w * (d - m).norm_sqr())
}

/// The gradient of [`nll`] with respect to the real and imaginary parts of the
/// model, packed as a complex number: w (m - d).
pub fn nll_grad<D: Dimension>(
    model: ArrayView<c64, D>,
    data: ArrayView<c64, D>,
    weight: ArrayView<f64, D>,
) -> Array<c64, D> {
    Zip::from(&model)
        .and(&data)
        .and(&weight)
        .map_collect(|&m, &d, &w| (m - d) * w)
}

/// A data-fit term.
pub trait Likelihood {
    fn coords(&self) -> &GridCoords;

    fn nchan(&self) -> usize;

    /// The negative log likelihood of a packed image cube.
    fn loss(&self, cube: ArrayView3<f64>) -> Result<f64, LossError>;

    /// The negative log likelihood of a packed image cube and its gradient
    /// with respect to the cube.
    fn loss_and_grad(&self, cube: ArrayView3<f64>) -> Result<(f64, Array3<f64>), LossError>;
}

fn check_nchan(cube: &ArrayView3<f64>, nchan: usize) -> Result<(), LossError> {
    let model = cube.len_of(Axis(0));
    if model != nchan {
        return Err(LossError::ChannelMismatch {
            model,
            data: nchan,
        });
    }
    Ok(())
}

/// The likelihood of gridded (cell-averaged) visibilities. Fast, because the
/// model is a single FFT per channel.
#[derive(Debug, Clone)]
pub struct GriddedLikelihood {
    fourier: FourierCube,
    dataset: GriddedDataset,
}

impl GriddedLikelihood {
    pub fn new(dataset: GriddedDataset) -> GriddedLikelihood {
        GriddedLikelihood {
            fourier: FourierCube::new(dataset.coords().clone()),
            dataset,
        }
    }

    pub fn dataset(&self) -> &GriddedDataset {
        &self.dataset
    }
}

impl Likelihood for GriddedLikelihood {
    fn coords(&self) -> &GridCoords {
        self.dataset.coords()
    }

    fn nchan(&self) -> usize {
        self.dataset.nchan()
    }

    fn loss(&self, cube: ArrayView3<f64>) -> Result<f64, LossError> {
        check_nchan(&cube, self.nchan())?;
        let model = self.fourier.transform(cube)?;
        // Unoccupied cells have zero weight.
        Ok(nll(
            model.view(),
            self.dataset.vis(),
            self.dataset.weight(),
        ))
    }

    fn loss_and_grad(&self, cube: ArrayView3<f64>) -> Result<(f64, Array3<f64>), LossError> {
        check_nchan(&cube, self.nchan())?;
        let model = self.fourier.transform(cube)?;
        let loss = nll(model.view(), self.dataset.vis(), self.dataset.weight());
        let vis_grad = nll_grad(model.view(), self.dataset.vis(), self.dataset.weight());
        let grad = self.fourier.adjoint(vis_grad.view())?;
        Ok((loss, grad))
    }
}

/// The likelihood of the visibilities at their exact (u,v) locations.
#[derive(Debug, Clone)]
pub struct LooseLikelihood {
    nufft: NuFft,
    data: Array2<c64>,
    weight: Array2<f64>,
}

impl LooseLikelihood {
    /// The (u,v) coordinates of `vis` must be the same for every channel.
    pub fn new(coords: GridCoords, vis: &VisData) -> Result<LooseLikelihood, LossError> {
        if !vis.shared_uv() {
            return Err(LossError::ChannelDependentUv);
        }
        let uu = vis.uu().row(0).to_vec();
        let vv = vis.vv().row(0).to_vec();
        let nufft = NuFft::new(coords).with_uv(&uu, &vv)?;
        Ok(LooseLikelihood {
            nufft,
            data: vis.data(),
            weight: vis.weight().to_owned(),
        })
    }
}

impl Likelihood for LooseLikelihood {
    fn coords(&self) -> &GridCoords {
        self.nufft.coords()
    }

    fn nchan(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    fn loss(&self, cube: ArrayView3<f64>) -> Result<f64, LossError> {
        check_nchan(&cube, self.nchan())?;
        let model = self.nufft.forward(cube, None)?;
        Ok(nll(model.view(), self.data.view(), self.weight.view()))
    }

    fn loss_and_grad(&self, cube: ArrayView3<f64>) -> Result<(f64, Array3<f64>), LossError> {
        check_nchan(&cube, self.nchan())?;
        let model = self.nufft.forward(cube, None)?;
        let loss = nll(model.view(), self.data.view(), self.weight.view());
        let vis_grad = nll_grad(model.view(), self.data.view(), self.weight.view());
        let grad = self.nufft.adjoint(vis_grad.view(), None)?;
        Ok((loss, grad))
    }
}
