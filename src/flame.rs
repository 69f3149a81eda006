// Copyright (c) the Flame Core Contributors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! The complete description of one frame: xforms, palette, camera framing,
//! and filter parameters. `Flame` owns nothing about how it's rendered;
//! `render::Renderer` consumes one.

use crate::camera::CarToRas;
use crate::error::{Error, Result};
use crate::palette::{Palette, PaletteMode};
use crate::xform::{FinalXform, Xform};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterpolationType {
    Linear,
    Smooth,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub center_x: f64,
    pub center_y: f64,
    /// `2^zoom`: narrows the cartesian window (like `pixels_per_unit`) and
    /// also raises the iteration budget (`render::scaled_sample_total`
    /// multiplies total samples by `scale^2`) so a zoomed-in render doesn't
    /// come out noisier per unit area than the unzoomed one it's cropped
    /// from.
    pub scale: f64,
    pub rotate_degrees: f64,
    /// Output raster dimensions, pre-gutter, pre-supersample.
    pub width: usize,
    pub height: usize,
    pub spatial_supersample: u32,
    pub pixels_per_unit: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            center_x: 0.0,
            center_y: 0.0,
            scale: 1.0,
            rotate_degrees: 0.0,
            width: 512,
            height: 512,
            spatial_supersample: 1,
            pixels_per_unit: 50.0,
        }
    }
}

impl Camera {
    /// Derived quantities used to size buffers and build the `CarToRas`
    /// bijection: super-sampled raster size, cartesian half-extents, and
    /// gutter width. `gutter_super_px` is already expressed in super-sampled
    /// pixels (the caller combines the spatial and density-estimation filter
    /// half-widths, both of which are already supersample-scaled, before
    /// calling this).
    pub fn derive(&self, gutter_super_px: f64) -> Result<CameraDerived> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidImageSize(self.width, self.height));
        }
        let ss = self.spatial_supersample.max(1) as usize;
        let super_w = self
            .width
            .checked_mul(ss)
            .ok_or(Error::ArithmeticOverflow("camera: width * supersample"))?;
        let super_h = self
            .height
            .checked_mul(ss)
            .ok_or(Error::ArithmeticOverflow("camera: height * supersample"))?;

        let gutter = gutter_super_px.max(0.0).ceil() as usize;
        let full_w = super_w
            .checked_add(2 * gutter)
            .ok_or(Error::ArithmeticOverflow("camera: width + gutter"))?;
        let full_h = super_h
            .checked_add(2 * gutter)
            .ok_or(Error::ArithmeticOverflow("camera: height + gutter"))?;

        if full_w.checked_mul(full_h).is_none() {
            return Err(Error::ImageSizeTooLarge(full_w, full_h));
        }

        let scaled_ppu = self.pixels_per_unit * self.scale * ss as f64;
        let half_w = super_w as f64 / (2.0 * scaled_ppu);
        let half_h = super_h as f64 / (2.0 * scaled_ppu);
        let gutter_units = gutter as f64 / scaled_ppu;

        Ok(CameraDerived {
            super_w,
            super_h,
            full_w,
            full_h,
            gutter,
            ll_x: self.center_x - half_w - gutter_units,
            ll_y: self.center_y - half_h - gutter_units,
            ur_x: self.center_x + half_w + gutter_units,
            ur_y: self.center_y + half_h + gutter_units,
            pixels_per_unit: scaled_ppu,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraDerived {
    pub super_w: usize,
    pub super_h: usize,
    pub full_w: usize,
    pub full_h: usize,
    pub gutter: usize,
    pub ll_x: f64,
    pub ll_y: f64,
    pub ur_x: f64,
    pub ur_y: f64,
    pub pixels_per_unit: f64,
}

impl CameraDerived {
    pub fn car_to_ras(&self) -> CarToRas {
        CarToRas::new(self.ll_x, self.ll_y, self.ur_x, self.ur_y, self.full_w, self.full_h, 1.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterKind {
    Log,
    Gaussian,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FilterParams {
    pub kind: FilterKind,
    pub filter_radius: f64,
    pub de_filter_min_radius: f64,
    pub de_filter_max_radius: f64,
    pub de_filter_curve: f64,
    pub gamma: f64,
    pub gamma_threshold: f64,
    pub vibrancy: f64,
    pub highlight_power: f64,
    pub background: (f64, f64, f64),
    pub early_clip: bool,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            kind: FilterKind::Log,
            filter_radius: 0.5,
            de_filter_min_radius: 0.0,
            de_filter_max_radius: 9.0,
            de_filter_curve: 0.6,
            gamma: 4.0,
            gamma_threshold: 0.01,
            vibrancy: 1.0,
            highlight_power: -1.0,
            background: (0.0, 0.0, 0.0),
            early_clip: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Flame {
    pub name: String,
    pub camera: Camera,
    pub filter: FilterParams,
    pub palette: Palette,
    pub palette_mode: PaletteMode,
    pub xforms: Vec<Xform>,
    pub final_xform: Option<FinalXform>,
    pub interpolation: InterpolationType,
    pub quality: f64,
    pub supersample: u32,
    /// Overall exposure multiplier feeding the log-density filter's `k1`
    /// term (`brightness * 268 / 256`). `4.0` matches the reference
    /// renderer's default.
    pub brightness: f64,
    /// Number of motion-blur sub-frames iterated and blended by
    /// `filter::TemporalFilter`. `1` disables temporal blending entirely.
    pub temporal_samples: u32,
}

impl Flame {
    /// Structural checks that must pass before any rendering work starts.
    pub fn validate(&self) -> Result<()> {
        if self.xforms.is_empty() {
            return Err(Error::NoXforms);
        }
        for x in &self.xforms {
            if !x.xaos.is_empty() && x.xaos.len() != self.xforms.len() {
                return Err(Error::XaosRowLengthMismatch(x.xaos.len(), self.xforms.len()));
            }
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(Error::InvalidImageSize(self.camera.width, self.camera.height));
        }
        if self.quality <= 0.0 {
            return Err(Error::ZeroIterations);
        }
        Ok(())
    }

    /// Whether any xform carries a per-row selection bias, switching
    /// iteration from uniform weighted selection to a Markov chain keyed by
    /// the previously-selected xform.
    pub fn xaos_enabled(&self) -> bool {
        self.xforms.iter().any(|x| !x.xaos.is_empty())
    }

    pub fn total_weight(&self) -> f64 {
        self.xforms.iter().map(|x| x.weight).sum()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::affine::Affine2D;
    use crate::variation::{Variation, WeightedVariation};

    fn flame_with(xforms: Vec<Xform>) -> Flame {
        Flame {
            name: "test".into(),
            camera: Camera::default(),
            filter: FilterParams::default(),
            palette: Palette::default(),
            palette_mode: PaletteMode::Linear,
            xforms,
            final_xform: None,
            interpolation: InterpolationType::Linear,
            quality: 10.0,
            supersample: 1,
            brightness: 4.0,
            temporal_samples: 1,
        }
    }

    fn identity_xform() -> Xform {
        Xform::new(
            Affine2D::identity(),
            Affine2D::identity(),
            vec![WeightedVariation { variation: Variation::Linear, weight: 1.0 }],
        )
    }

    #[test]
    fn empty_xform_list_is_rejected() {
        let flame = flame_with(vec![]);
        assert!(matches!(flame.validate(), Err(Error::NoXforms)));
    }

    #[test]
    fn mismatched_xaos_row_is_rejected() {
        let mut x1 = identity_xform();
        x1.xaos = vec![1.0];
        let flame = flame_with(vec![x1, identity_xform()]);
        assert!(matches!(flame.validate(), Err(Error::XaosRowLengthMismatch(1, 2))));
    }

    #[test]
    fn valid_flame_passes() {
        let flame = flame_with(vec![identity_xform()]);
        assert!(flame.validate().is_ok());
    }

    #[test]
    fn camera_derive_rejects_zero_dimensions() {
        let mut camera = Camera::default();
        camera.width = 0;
        assert!(matches!(camera.derive(1.0), Err(Error::InvalidImageSize(0, _))));
    }

    #[test]
    fn camera_derive_adds_symmetric_gutter() {
        let camera = Camera {
            width: 100,
            height: 100,
            spatial_supersample: 1,
            ..Camera::default()
        };
        let derived = camera.derive(4.0).unwrap();
        assert_eq!(derived.full_w, 108);
        assert_eq!(derived.full_h, 108);
        assert_eq!(derived.gutter, 4);
    }

    #[test]
    fn xaos_enabled_reflects_any_nonempty_row() {
        let mut x1 = identity_xform();
        let x2 = identity_xform();
        assert!(!flame_with(vec![x1.clone(), x2.clone()]).xaos_enabled());
        x1.xaos = vec![1.0, 1.0];
        assert!(flame_with(vec![x1, x2]).xaos_enabled());
    }
}
