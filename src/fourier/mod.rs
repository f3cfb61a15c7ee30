// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Layers that translate a packed image cube into visibilities.
//!
//! [`FourierCube`] produces the visibilities on the regular grid described by
//! [`GridCoords`]; [`NuFft`] produces visibilities at arbitrary (u,v)
//! locations. Both layers are linear, so their gradients are provided by
//! their adjoint operators.
//!
//! The cell_size² prefactor (in arcsec²) gives visibilities in Jy when the
//! image is in Jy/arcsec²; it corrects for the spacing of the input grid (see
//! TMS Eqn A8.18).

mod error;
mod nufft;

pub use error::{FourierError, NuFftError};
pub use nufft::{DirectNudft, NuFft, NufftPrimitive};

use log::trace;
use ndarray::prelude::*;

use crate::{
    c64,
    coords::{CoordsError, CoordsSpec, GridCoords},
    math::{packed_cube_to_ground_cube, Fft2},
};

/// A layer holding the cube corresponding to the FFT of an image cube.
#[derive(Debug, Clone)]
pub struct FourierCube {
    coords: GridCoords,
    fft: Fft2,

    /// The packed visibilities of the last forward pass.
    vis: Option<Array3<c64>>,
}

impl FourierCube {
    pub fn new(coords: GridCoords) -> FourierCube {
        let fft = Fft2::new(coords.npix());
        FourierCube {
            coords,
            fft,
            vis: None,
        }
    }

    /// Create a [`FourierCube`] from a pixel size \[arcseconds\] and the number
    /// of pixels per image side.
    pub fn from_cell_size(cell_size: f64, npix: usize) -> Result<FourierCube, CoordsError> {
        Ok(FourierCube::new(GridCoords::new(cell_size, npix)?))
    }

    pub fn from_spec(spec: CoordsSpec) -> Result<FourierCube, CoordsError> {
        Ok(FourierCube::new(spec.into_coords()?))
    }

    pub fn coords(&self) -> &GridCoords {
        &self.coords
    }

    /// Ensure that `cube` is (nchan, npix, npix).
    fn check_cube<'a, T, D: Dimension>(
        &self,
        cube: ArrayView<'a, T, D>,
    ) -> Result<ArrayView3<'a, T>, FourierError> {
        let npix = self.coords.npix();
        let got = cube.shape().to_vec();
        match cube.into_dimensionality::<Ix3>() {
            Ok(c) if c.dim().1 == npix && c.dim().2 == npix => Ok(c),
            _ => Err(FourierError::Shape { npix, got }),
        }
    }

    /// FFT each channel of a packed image cube. This doesn't alter `self`;
    /// see [`FourierCube::forward`] for the stateful version.
    ///
    /// `cube` must have shape (nchan, npix, npix) and be in packed format, for
    /// example from [`crate::BaseCube::cube`]. The returned cube is also
    /// packed.
    pub fn transform<D: Dimension>(
        &self,
        cube: ArrayView<f64, D>,
    ) -> Result<Array3<c64>, FourierError> {
        let cube = self.check_cube(cube)?;
        let prefactor = self.coords.pixel_area_arcsec2();
        let mut vis = cube.mapv(|v| c64::new(v * prefactor, 0.0));
        for chan in vis.outer_iter_mut() {
            self.fft.forward(chan);
        }
        trace!("FFTed a cube with {} channels", vis.len_of(Axis(0)));
        Ok(vis)
    }

    /// Perform the FFT of the image cube for each channel, keeping the result
    /// for the `ground_*` accessors.
    pub fn forward<D: Dimension>(
        &mut self,
        cube: ArrayView<f64, D>,
    ) -> Result<ArrayView3<c64>, FourierError> {
        let vis = self.transform(cube)?;
        Ok(self.vis.insert(vis).view())
    }

    /// The packed visibilities of the last forward pass, if there was one.
    pub fn vis(&self) -> Option<ArrayView3<c64>> {
        self.vis.as_ref().map(|v| v.view())
    }

    /// The visibility cube of the last forward pass, fftshifted so the zero
    /// frequency is in the middle (for plotting with extent
    /// [`GridCoords::vis_ext`]).
    pub fn ground_vis(&self) -> Option<Array3<c64>> {
        self.vis.as_ref().map(|v| packed_cube_to_ground_cube(v.view()))
    }

    /// The amplitude of [`FourierCube::ground_vis`].
    pub fn ground_amp(&self) -> Option<Array3<f64>> {
        self.ground_vis().map(|v| v.mapv(|c| c.norm()))
    }

    /// The phase of [`FourierCube::ground_vis`] \[radians\].
    pub fn ground_phase(&self) -> Option<Array3<f64>> {
        self.ground_vis().map(|v| v.mapv(|c| c.arg()))
    }

    /// The exact inverse of [`FourierCube::transform`]. The result is complex;
    /// for visibilities of a real image, the imaginary part is round-off.
    pub fn inverse<D: Dimension>(
        &self,
        vis: ArrayView<c64, D>,
    ) -> Result<Array3<c64>, FourierError> {
        let vis = self.check_cube(vis)?;
        let prefactor = 1.0 / self.coords.pixel_area_arcsec2();
        let mut cube = vis.mapv(|v| v * prefactor);
        for chan in cube.outer_iter_mut() {
            self.fft.inverse(chan);
        }
        Ok(cube)
    }

    /// Apply the adjoint of [`FourierCube::transform`] to packed visibilities
    /// and keep the real part. This is the gradient of a real-valued function
    /// of the visibilities with respect to the (real) image, given the
    /// function's gradient with respect to the visibilities.
    pub fn adjoint<D: Dimension>(&self, vis: ArrayView<c64, D>) -> Result<Array3<f64>, FourierError> {
        let vis = self.check_cube(vis)?;
        let npix = self.coords.npix();
        // The inverse FFT includes a 1/npix² factor that the adjoint doesn't
        // have.
        let prefactor = self.coords.pixel_area_arcsec2() * (npix * npix) as f64;
        let mut cube = vis.to_owned();
        for chan in cube.outer_iter_mut() {
            self.fft.inverse(chan);
        }
        Ok(cube.mapv(|v| v.re * prefactor))
    }
}
