// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The learnable image.
//!
//! [`BaseCube`] holds the free parameters and their gradient; its pixel mapping
//! turns the parameters into a (typically non-negative) packed image cube.
//! [`ImageCube`] wraps such a cube for inspection in sky orientation.

mod error;

pub use error::ImageError;

use log::debug;
use ndarray::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::{
    constants::DEFAULT_BASE_CUBE_FILL,
    coords::GridCoords,
    math::{packed_cube_to_sky_cube, sigmoid, softplus},
};

/// The function applied to each base-cube parameter to get a pixel value.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PixelMapping {
    /// ln(1 + e^x); keeps every pixel positive.
    #[default]
    Softplus,

    /// The parameters are the pixels.
    Identity,
}

impl PixelMapping {
    #[inline]
    fn apply(self, x: f64) -> f64 {
        match self {
            PixelMapping::Softplus => softplus(x),
            PixelMapping::Identity => x,
        }
    }

    #[inline]
    fn derivative(self, x: f64) -> f64 {
        match self {
            PixelMapping::Softplus => sigmoid(x),
            PixelMapping::Identity => 1.0,
        }
    }
}

fn check_shape(coords: &GridCoords, shape: &[usize]) -> Result<(), ImageError> {
    let npix = coords.npix();
    match shape {
        [0, _, _] => Err(ImageError::NoChannels),
        [_, r, c] if *r == npix && *c == npix => Ok(()),
        _ => Err(ImageError::Shape {
            npix,
            got: shape.to_vec(),
        }),
    }
}

/// The free parameters of an image cube, in packed layout, with a gradient
/// buffer of the same shape.
#[derive(Debug, Clone)]
pub struct BaseCube {
    coords: GridCoords,
    mapping: PixelMapping,
    base: Array3<f64>,
    grad: Array3<f64>,
}

impl BaseCube {
    /// Every parameter is set to [`DEFAULT_BASE_CUBE_FILL`].
    pub fn new(coords: GridCoords, nchan: usize, mapping: PixelMapping) -> Result<BaseCube, ImageError> {
        BaseCube::with_fill(coords, nchan, mapping, DEFAULT_BASE_CUBE_FILL)
    }

    pub fn with_fill(
        coords: GridCoords,
        nchan: usize,
        mapping: PixelMapping,
        fill: f64,
    ) -> Result<BaseCube, ImageError> {
        let npix = coords.npix();
        BaseCube::from_base(coords, Array3::from_elem((nchan, npix, npix), fill), mapping)
    }

    /// Parameters drawn uniformly from [fill / 2, 3 fill / 2).
    pub fn random(
        coords: GridCoords,
        nchan: usize,
        mapping: PixelMapping,
        rng: &mut impl Rng,
    ) -> Result<BaseCube, ImageError> {
        let npix = coords.npix();
        let base = Array3::from_shape_simple_fn((nchan, npix, npix), || {
            DEFAULT_BASE_CUBE_FILL * (0.5 + rng.gen::<f64>())
        });
        BaseCube::from_base(coords, base, mapping)
    }

    /// Use existing parameters.
    pub fn from_base(
        coords: GridCoords,
        base: Array3<f64>,
        mapping: PixelMapping,
    ) -> Result<BaseCube, ImageError> {
        check_shape(&coords, base.shape())?;
        debug!(
            "BaseCube: {} channels of {}x{} pixels, {mapping} pixel mapping",
            base.len_of(Axis(0)),
            coords.npix(),
            coords.npix()
        );
        Ok(BaseCube {
            grad: Array3::zeros(base.dim()),
            coords,
            mapping,
            base,
        })
    }

    pub fn coords(&self) -> &GridCoords {
        &self.coords
    }

    pub fn mapping(&self) -> PixelMapping {
        self.mapping
    }

    pub fn nchan(&self) -> usize {
        self.base.len_of(Axis(0))
    }

    /// (nchan, npix, npix)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.base.dim()
    }

    pub fn base(&self) -> ArrayView3<f64> {
        self.base.view()
    }

    pub fn grad(&self) -> ArrayView3<f64> {
        self.grad.view()
    }

    /// The parameters (to be updated) and their gradient, for an optimizer
    /// step.
    pub fn params_and_grad(&mut self) -> (ArrayViewMut3<f64>, ArrayView3<f64>) {
        (self.base.view_mut(), self.grad.view())
    }

    pub fn zero_grad(&mut self) {
        self.grad.fill(0.0);
    }

    /// The packed image cube \[Jy/arcsec²\].
    pub fn cube(&self) -> Array3<f64> {
        let mapping = self.mapping;
        self.base.mapv(|x| mapping.apply(x))
    }

    /// Add the gradient of a loss with respect to the image cube (as returned
    /// by [`BaseCube::cube`]) to the parameters' gradient.
    pub fn accumulate_grad(&mut self, cube_grad: ArrayView3<f64>) -> Result<(), ImageError> {
        if cube_grad.dim() != self.base.dim() {
            return Err(ImageError::Shape {
                npix: self.coords.npix(),
                got: cube_grad.shape().to_vec(),
            });
        }
        let mapping = self.mapping;
        azip!((g in &mut self.grad, &cg in &cube_grad, &x in &self.base) *g += cg * mapping.derivative(x));
        Ok(())
    }
}

/// A packed image cube with its coordinates.
#[derive(Debug, Clone)]
pub struct ImageCube {
    coords: GridCoords,
    cube: Array3<f64>,
}

impl ImageCube {
    pub fn new(coords: GridCoords, cube: Array3<f64>) -> Result<ImageCube, ImageError> {
        check_shape(&coords, cube.shape())?;
        Ok(ImageCube { coords, cube })
    }

    /// The current image of a [`BaseCube`].
    pub fn from_base_cube(base: &BaseCube) -> ImageCube {
        ImageCube {
            coords: base.coords().clone(),
            cube: base.cube(),
        }
    }

    pub fn coords(&self) -> &GridCoords {
        &self.coords
    }

    /// The packed cube.
    pub fn cube(&self) -> ArrayView3<f64> {
        self.cube.view()
    }

    /// The cube in sky orientation, for display with extent
    /// [`GridCoords::img_ext`].
    pub fn sky_cube(&self) -> Array3<f64> {
        packed_cube_to_sky_cube(self.cube.view())
    }

    /// The total flux density of each channel \[Jy\].
    pub fn flux(&self) -> Vec<f64> {
        let pixel_area = self.coords.pixel_area_arcsec2();
        self.cube
            .outer_iter()
            .map(|chan| chan.sum() * pixel_area)
            .collect()
    }
}
