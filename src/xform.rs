// Copyright (c) the Flame Core Contributors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! A single iterated function: pre-affine, weighted variation blend,
//! post-affine, plus the color and selection metadata the Markov chain in
//! `iterate` consults.

use crate::affine::Affine2D;
use crate::util::Xorshift128Plus;
use crate::variation::{apply_blend, WeightedVariation};

#[derive(Clone, Debug, PartialEq)]
pub struct Xform {
    /// Relative selection weight among sibling xforms (ignored when the
    /// parent flame uses xaos for this row).
    pub weight: f64,
    pub color_x: f64,
    pub color_speed: f64,
    pub opacity: f64,
    pub direct_color: f64,
    pub pre: Affine2D<f64>,
    pub post: Affine2D<f64>,
    pub variations: Vec<WeightedVariation>,
    /// Per-destination-xform selection bias; empty means uniform selection
    /// applies instead (see `flame::Flame::xaos_enabled`).
    pub xaos: Vec<f64>,
}

impl Xform {
    pub fn new(pre: Affine2D<f64>, post: Affine2D<f64>, variations: Vec<WeightedVariation>) -> Self {
        Self {
            weight: 1.0,
            color_x: 0.0,
            color_speed: 0.5,
            opacity: 1.0,
            direct_color: 0.0,
            pre,
            post,
            variations,
            xaos: Vec::new(),
        }
    }

    /// Applies `post(blend(pre(p)))` and returns the warped point together
    /// with the new running color coordinate, blended by `color_speed`
    /// toward this xform's `color_x` as the reference renderer does.
    #[inline]
    pub fn apply(&self, p: (f64, f64), color_x: f64, rng: &mut Xorshift128Plus) -> ((f64, f64), f64) {
        let pre_p = self.pre.transform_vector(p);
        let blended = apply_blend(&self.variations, pre_p, rng);
        let out = self.post.transform_vector(blended);
        let new_color_x = color_x + (self.color_x - color_x) * color_blend(self.color_speed);
        (out, new_color_x)
    }
}

/// The blend fraction toward an xform's `color_x`: `color_speed` in
/// `[-1, 1]` maps to a blend in `[1, 0]`, so a speed of `-1` fully adopts
/// the xform's color in one step and `1` leaves the running color alone.
#[inline]
fn color_blend(color_speed: f64) -> f64 {
    (1.0 - color_speed) / 2.0
}

/// The terminal xform applied once per sample after the chain of regular
/// xforms, if the flame defines one. Has no selection weight or xaos row
/// because it is never a Markov-chain destination.
#[derive(Clone, Debug, PartialEq)]
pub struct FinalXform {
    pub color_x: f64,
    pub color_speed: f64,
    pub opacity: f64,
    pub direct_color: f64,
    pub pre: Affine2D<f64>,
    pub post: Affine2D<f64>,
    pub variations: Vec<WeightedVariation>,
}

impl FinalXform {
    #[inline]
    pub fn apply(&self, p: (f64, f64), color_x: f64, rng: &mut Xorshift128Plus) -> ((f64, f64), f64) {
        let pre_p = self.pre.transform_vector(p);
        let blended = apply_blend(&self.variations, pre_p, rng);
        let out = self.post.transform_vector(blended);
        let new_color_x = color_x + (self.color_x - color_x) * color_blend(self.color_speed);
        (out, new_color_x)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::variation::Variation;

    fn rng() -> Xorshift128Plus {
        Xorshift128Plus::new_with_seeds(5, 6, 7, 8)
    }

    #[test]
    fn identity_xform_is_identity() {
        let x = Xform::new(
            Affine2D::identity(),
            Affine2D::identity(),
            vec![WeightedVariation { variation: Variation::Linear, weight: 1.0 }],
        );
        let (p, _) = x.apply((0.3, -0.6), 0.0, &mut rng());
        assert_eq!(p, (0.3, -0.6));
    }

    #[test]
    fn color_blends_toward_xform_color_x() {
        let mut x = Xform::new(
            Affine2D::identity(),
            Affine2D::identity(),
            vec![WeightedVariation { variation: Variation::Linear, weight: 1.0 }],
        );
        x.color_x = 1.0;
        x.color_speed = 0.0;
        let (_, c) = x.apply((0.0, 0.0), 0.0, &mut rng());
        assert!((c - 0.5).abs() < 1e-12);
    }

    #[test]
    fn color_speed_one_leaves_color_unchanged() {
        let mut x = Xform::new(
            Affine2D::identity(),
            Affine2D::identity(),
            vec![WeightedVariation { variation: Variation::Linear, weight: 1.0 }],
        );
        x.color_x = 1.0;
        x.color_speed = 1.0;
        let (_, c) = x.apply((0.0, 0.0), 0.25, &mut rng());
        assert!((c - 0.25).abs() < 1e-12);
    }

    #[test]
    fn color_speed_negative_one_fully_adopts_xform_color() {
        let mut x = Xform::new(
            Affine2D::identity(),
            Affine2D::identity(),
            vec![WeightedVariation { variation: Variation::Linear, weight: 1.0 }],
        );
        x.color_x = 1.0;
        x.color_speed = -1.0;
        let (_, c) = x.apply((0.0, 0.0), 0.25, &mut rng());
        assert!((c - 1.0).abs() < 1e-12);
    }
}
