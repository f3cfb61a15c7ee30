// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Loose (ungridded) visibilities.

use log::debug;
use ndarray::prelude::*;

use super::GriddingError;
use crate::c64;

/// A set of visibility samples. Every array has shape (nchan, nvis); the
/// (u,v) coordinates are in kilolambda and the data are in Jy.
#[derive(Debug, Clone, PartialEq)]
pub struct VisData {
    uu: Array2<f64>,
    vv: Array2<f64>,
    data_re: Array2<f64>,
    data_im: Array2<f64>,
    weight: Array2<f64>,
}

/// Promote a 1D array to (1, nvis); leave a 2D array alone.
fn promote<D: Dimension>(a: Array<f64, D>, name: &'static str) -> Result<Array2<f64>, GriddingError> {
    let got = a.shape().to_vec();
    let promoted = match a.ndim() {
        1 => a
            .into_dimensionality::<Ix1>()
            .ok()
            .map(|a| a.insert_axis(Axis(0))),
        2 => a.into_dimensionality::<Ix2>().ok(),
        _ => None,
    };
    promoted.ok_or_else(|| GriddingError::Shape {
        name,
        expected: "1D (nvis) or 2D (nchan, nvis)".to_string(),
        got,
    })
}

impl VisData {
    /// Validate and collect visibility samples. 1D inputs are treated as a
    /// single channel.
    pub fn new<D: Dimension>(
        uu: Array<f64, D>,
        vv: Array<f64, D>,
        data_re: Array<f64, D>,
        data_im: Array<f64, D>,
        weight: Array<f64, D>,
    ) -> Result<VisData, GriddingError> {
        let uu = promote(uu, "uu")?;
        let vv = promote(vv, "vv")?;
        let data_re = promote(data_re, "data_re")?;
        let data_im = promote(data_im, "data_im")?;
        let weight = promote(weight, "weight")?;

        let expected = uu.shape().to_vec();
        for (name, a) in [
            ("vv", &vv),
            ("data_re", &data_re),
            ("data_im", &data_im),
            ("weight", &weight),
        ] {
            if a.shape() != expected.as_slice() {
                return Err(GriddingError::Shape {
                    name,
                    expected: format!("{expected:?} (the shape of uu)"),
                    got: a.shape().to_vec(),
                });
            }
        }
        if uu.is_empty() {
            return Err(GriddingError::NoVisibilities);
        }

        for ((chan, index), &value) in weight.indexed_iter() {
            if !(value.is_finite() && value > 0.0) {
                return Err(GriddingError::InvalidWeight { chan, index, value });
            }
        }

        debug!(
            "Visibility data: {} channels, {} samples per channel",
            uu.len_of(Axis(0)),
            uu.len_of(Axis(1))
        );
        Ok(VisData {
            uu,
            vv,
            data_re,
            data_im,
            weight,
        })
    }

    /// Build from complex visibilities.
    pub fn from_complex<D: Dimension>(
        uu: Array<f64, D>,
        vv: Array<f64, D>,
        data: Array<c64, D>,
        weight: Array<f64, D>,
    ) -> Result<VisData, GriddingError> {
        let data_re = data.mapv(|d| d.re);
        let data_im = data.mapv(|d| d.im);
        VisData::new(uu, vv, data_re, data_im, weight)
    }

    pub fn nchan(&self) -> usize {
        self.uu.len_of(Axis(0))
    }

    pub fn nvis(&self) -> usize {
        self.uu.len_of(Axis(1))
    }

    pub fn uu(&self) -> ArrayView2<f64> {
        self.uu.view()
    }

    pub fn vv(&self) -> ArrayView2<f64> {
        self.vv.view()
    }

    pub fn data_re(&self) -> ArrayView2<f64> {
        self.data_re.view()
    }

    pub fn data_im(&self) -> ArrayView2<f64> {
        self.data_im.view()
    }

    pub fn weight(&self) -> ArrayView2<f64> {
        self.weight.view()
    }

    /// The data as complex numbers.
    pub fn data(&self) -> Array2<c64> {
        let mut data = Array2::zeros(self.data_re.dim());
        azip!((d in &mut data, &re in &self.data_re, &im in &self.data_im) *d = c64::new(re, im));
        data
    }

    /// Are the (u,v) coordinates the same for every channel? A
    /// [`crate::NuFft`] uses one set of coordinates for all channels.
    pub fn shared_uv(&self) -> bool {
        let (uu0, vv0) = (self.uu.row(0), self.vv.row(0));
        self.uu.outer_iter().all(|u| u == uu0) && self.vv.outer_iter().all(|v| v == vv0)
    }
}
