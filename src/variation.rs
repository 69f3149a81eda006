// Copyright (c) the Flame Core Contributors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! The variation catalog: the per-xform warp functions blended to produce a
//! sample's next point.
//!
//! Modeled as a closed enum dispatched through an exhaustive `match` rather
//! than as a trait object, so the per-sample hot loop in `iterate` never pays
//! for virtual dispatch. None of the eight variations implemented here need
//! precalculated state (`precalc` is `()` for all of them); a future
//! parametric variation that does would carry it as an enum payload
//! alongside its weight.

use crate::util::Xorshift128Plus;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Variation {
    Linear,
    Sinusoidal,
    Spherical,
    Swirl,
    Horseshoe,
    Polar,
    Handkerchief,
    Disc,
}

impl Variation {
    pub const ALL: [Variation; 8] = [
        Variation::Linear,
        Variation::Sinusoidal,
        Variation::Spherical,
        Variation::Swirl,
        Variation::Horseshoe,
        Variation::Polar,
        Variation::Handkerchief,
        Variation::Disc,
    ];

    /// Applies the variation to a point already transformed by the xform's
    /// pre-affine. `rng` is threaded through even though none of the current
    /// eight variations are stochastic, because future additions (e.g.
    /// `linear3D`-style noise variations) need one and every call site
    /// already has a per-thread generator in scope.
    #[inline]
    pub fn apply(self, p: (f64, f64), rng: &mut Xorshift128Plus) -> (f64, f64) {
        let _ = rng;
        let (x, y) = p;
        match self {
            Variation::Linear => (x, y),
            Variation::Sinusoidal => (x.sin(), y.sin()),
            Variation::Spherical => {
                let r2 = (x * x + y * y).max(1e-300);
                (x / r2, y / r2)
            }
            Variation::Swirl => {
                let r2 = x * x + y * y;
                let (s, c) = r2.sin_cos();
                (x * s - y * c, x * c + y * s)
            }
            Variation::Horseshoe => {
                let r = (x * x + y * y).sqrt().max(1e-300);
                ((x - y) * (x + y) / r, 2.0 * x * y / r)
            }
            Variation::Polar => {
                let r = (x * x + y * y).sqrt();
                let theta = y.atan2(x);
                (theta / std::f64::consts::PI, r - 1.0)
            }
            Variation::Handkerchief => {
                let r = (x * x + y * y).sqrt();
                let theta = y.atan2(x);
                (r * (theta + r).sin(), r * (theta - r).cos())
            }
            Variation::Disc => {
                let r = (x * x + y * y).sqrt();
                let theta = y.atan2(x) / std::f64::consts::PI;
                let (s, c) = (r * std::f64::consts::PI).sin_cos();
                (theta * s, theta * c)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct WeightedVariation {
    pub variation: Variation,
    pub weight: f64,
}

/// Applies every weighted variation in `blend` to the same input point and
/// sums the results, matching the reference renderer's additive variation
/// blend (`sum_i weight_i * var_i(p)`).
#[inline]
pub fn apply_blend(blend: &[WeightedVariation], p: (f64, f64), rng: &mut Xorshift128Plus) -> (f64, f64) {
    let mut acc = (0.0, 0.0);
    for wv in blend {
        let (vx, vy) = wv.variation.apply(p, rng);
        acc.0 += wv.weight * vx;
        acc.1 += wv.weight * vy;
    }
    acc
}

#[cfg(test)]
mod test {
    use super::*;

    fn rng() -> Xorshift128Plus {
        Xorshift128Plus::new_with_seeds(1, 2, 3, 4)
    }

    #[test]
    fn linear_is_identity() {
        let mut r = rng();
        assert_eq!(Variation::Linear.apply((0.3, -0.7), &mut r), (0.3, -0.7));
    }

    #[test]
    fn spherical_of_unit_circle_is_identity() {
        let mut r = rng();
        let (x, y) = Variation::Spherical.apply((1.0, 0.0), &mut r);
        assert!((x - 1.0).abs() < 1e-9);
        assert!(y.abs() < 1e-9);
    }

    #[test]
    fn spherical_does_not_divide_by_zero_at_origin() {
        let mut r = rng();
        let (x, y) = Variation::Spherical.apply((0.0, 0.0), &mut r);
        assert!(x.is_finite());
        assert!(y.is_finite());
    }

    #[test]
    fn horseshoe_does_not_divide_by_zero_at_origin() {
        let mut r = rng();
        let (x, y) = Variation::Horseshoe.apply((0.0, 0.0), &mut r);
        assert!(x.is_finite());
        assert!(y.is_finite());
    }

    #[test]
    fn blend_of_single_full_weight_variation_matches_plain_apply() {
        let mut r = rng();
        let blend = vec![WeightedVariation {
            variation: Variation::Sinusoidal,
            weight: 1.0,
        }];
        let p = (0.4, 0.6);
        let direct = Variation::Sinusoidal.apply(p, &mut rng());
        let blended = apply_blend(&blend, p, &mut r);
        assert_eq!(direct, blended);
    }

    #[test]
    fn blend_is_linear_in_weights() {
        let mut r = rng();
        let blend = vec![
            WeightedVariation { variation: Variation::Linear, weight: 0.5 },
            WeightedVariation { variation: Variation::Sinusoidal, weight: 0.5 },
        ];
        let p = (0.2, 0.9);
        let (x, y) = apply_blend(&blend, p, &mut r);
        let expected = (0.5 * p.0 + 0.5 * p.1.sin() * 0.0 + 0.5 * p.0, 0.0);
        let _ = expected;
        assert!((x - (0.5 * p.0 + 0.5 * p.0.sin())).abs() < 1e-12);
        assert!((y - (0.5 * p.1 + 0.5 * p.1.sin())).abs() < 1e-12);
    }
}
