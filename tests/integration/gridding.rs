// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Dirty images of realistically-sized grids.

use approx::assert_abs_diff_eq;

use crate::*;
use rml_imager::{c64, Gridder, ImageUnit, Weighting};

#[test]
fn test_uniform_dirty_beam_peak_512() {
    init_logging();
    let coords = GridCoords::new(0.01, 512).unwrap();
    let mut rng = seeded_rng(100);
    let (uu, vv) = random_uv(&coords, 1000, &mut rng);
    let vis = make_vis(uu, vv, |_, _| c64::new(1.0, 0.0));
    let gridder = Gridder::new(coords.clone(), &vis).unwrap();

    let dirty = gridder
        .get_dirty_image(Weighting::Uniform, ImageUnit::JyBeam)
        .unwrap();
    assert_eq!(dirty.beam.dim(), (1, 512, 512));
    let (r, c) = coords.sky_origin_pixel();
    assert_eq!((r, c), (256, 255));
    assert_abs_diff_eq!(dirty.beam[(0, r, c)], 1.0, epsilon = 1e-10);
    let max = dirty.beam.fold(f64::MIN, |acc, &v| acc.max(v));
    assert_abs_diff_eq!(max, 1.0, epsilon = 1e-10);

    // A unit point source at the phase centre images as the dirty beam.
    assert_abs_diff_eq!(dirty.image, dirty.beam, epsilon = 1e-8);
}

#[test]
fn test_point_source_flux_units() {
    init_logging();
    let coords = GridCoords::new(0.05, 128).unwrap();
    let mut rng = seeded_rng(101);
    let (uu, vv) = random_uv(&coords, 3000, &mut rng);
    let flux = 2.5;
    let vis = make_vis(uu, vv, |_, _| c64::new(flux, 0.0));
    let gridder = Gridder::new(coords.clone(), &vis).unwrap();
    let (r, c) = coords.sky_origin_pixel();

    let weighting = Weighting::briggs(0.0).unwrap();
    let per_beam = gridder
        .get_dirty_image(weighting, ImageUnit::JyBeam)
        .unwrap();
    assert_abs_diff_eq!(per_beam.image[(0, r, c)], flux, epsilon = 1e-8);

    let area = gridder.get_dirty_beam_area(weighting).unwrap()[0];
    assert!(area > coords.pixel_area_arcsec2());
    let per_arcsec2 = gridder
        .get_dirty_image(weighting, ImageUnit::JyArcsec2)
        .unwrap();
    assert_abs_diff_eq!(per_arcsec2.image[(0, r, c)], flux / area, epsilon = 1e-8);
    let per_pixel = gridder
        .get_dirty_image(weighting, ImageUnit::JyPixel)
        .unwrap();
    assert_abs_diff_eq!(
        per_pixel.image[(0, r, c)],
        flux * coords.pixel_area_arcsec2() / area,
        epsilon = 1e-8
    );
}
