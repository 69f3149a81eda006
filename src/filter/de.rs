// Copyright (c) the Flame Core Contributors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Density-estimation filtering: pixels in sparsely-hit regions get a wider,
//! more aggressively smoothed kernel than pixels in densely-hit regions,
//! which stay close to the raw histogram value. A pixel's local hit mass
//! selects a kernel from a precomputed table rather than convolving an
//! adaptive kernel size directly (adaptive convolution per pixel would cost
//! an order of magnitude more; the table is built once per render).

use crate::error::{Error, Result};

/// Hit-mass values at or above this threshold index linearly into the table;
/// above it, the index grows by `(filter_select - DE_THRESH).powf(curve)`
/// instead, compressing how quickly very dense regions keep shrinking their
/// kernel. Matches the reference renderer's `DE_THRESH`.
pub const DE_THRESH: usize = 100;

#[derive(Clone, Debug)]
struct Kernel {
    half_width: isize,
    weights: Vec<f64>,
}

impl Kernel {
    fn gaussian(radius: f64) -> Self {
        let half = radius.ceil().max(0.0) as isize;
        let width = (2 * half + 1) as usize;
        let sigma = radius.max(1e-6) / 2.0;
        let mut weights = vec![0.0; width * width];
        let mut sum = 0.0;
        for j in 0..width {
            for i in 0..width {
                let dx = i as f64 - half as f64;
                let dy = j as f64 - half as f64;
                let w = (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp();
                weights[j * width + i] = w;
                sum += w;
            }
        }
        if sum > 0.0 {
            for w in weights.iter_mut() {
                *w /= sum;
            }
        }
        Self { half_width: half, weights }
    }

    fn width(&self) -> usize {
        (2 * self.half_width + 1) as usize
    }

    #[inline]
    fn weight(&self, dx: isize, dy: isize) -> f64 {
        let w = self.width() as isize;
        let i = dx + self.half_width;
        let j = dy + self.half_width;
        if i < 0 || j < 0 || i >= w || j >= w {
            return 0.0;
        }
        self.weights[(j * w + i) as usize]
    }
}

/// A per-hit-mass table of kernels, indexed `0..=DE_THRESH` by the mapped
/// `filter_select` index (§4.7 step 2).
#[derive(Clone, Debug)]
pub struct DeFilter {
    kernels: Vec<Kernel>,
    curve: f64,
    /// Half-width, in super-sampled pixels, of the neighborhood window
    /// summed into `filter_select`: `floor(supersample / 2)`.
    window_half: isize,
    /// `(supersample / (supersample + 1))^2`, applied to `filter_select`
    /// when `supersample` is even, compensating for the extra hits an even
    /// supersample factor spreads across more sub-pixels per output pixel.
    even_supersample_scale: Option<f64>,
}

impl DeFilter {
    /// `min_radius`/`max_radius` bound the kernel size; `curve` (typically
    /// around 0.5-1.0) controls how quickly the radius shrinks as hit mass
    /// rises, via `radius(n) = min + (max - min) * (1 - n/thresh)^curve`.
    /// `supersample` sizes the neighborhood window `filter_select` is summed
    /// over and whether the even-supersample correction factor applies.
    pub fn new(min_radius: f64, max_radius: f64, curve: f64, supersample: u32) -> Result<Self> {
        if min_radius < 0.0 || max_radius < min_radius || !max_radius.is_finite() {
            return Err(Error::DeFilterCreationFailure("min_radius/max_radius out of order or non-finite"));
        }
        if curve <= 0.0 || !curve.is_finite() {
            return Err(Error::DeFilterCreationFailure("curve must be positive and finite"));
        }
        let mut kernels = Vec::with_capacity(DE_THRESH + 1);
        for n in 0..=DE_THRESH {
            let t = 1.0 - (n as f64 / DE_THRESH as f64);
            let radius = min_radius + (max_radius - min_radius) * t.powf(curve);
            kernels.push(Kernel::gaussian(radius));
        }
        let supersample = supersample.max(1);
        let even_supersample_scale =
            (supersample % 2 == 0).then(|| (supersample as f64 / (supersample as f64 + 1.0)).powi(2));
        Ok(Self {
            kernels,
            curve,
            window_half: (supersample / 2) as isize,
            even_supersample_scale,
        })
    }

    /// Half-width, in super-sampled pixels, of the `filter_select`
    /// neighborhood window around a source pixel.
    pub fn window_half_width(&self) -> isize {
        self.window_half
    }

    /// Scales a raw windowed hit-mass sum by the even-supersample
    /// correction factor, if any.
    pub fn scale_filter_select(&self, raw: f64) -> f64 {
        match self.even_supersample_scale {
            Some(scale) => raw * scale,
            None => raw,
        }
    }

    /// Maps a (already window-summed and even-supersample-scaled)
    /// `filter_select` hit mass to a kernel, per §4.7 step 2: linear index
    /// below `DE_THRESH`, then `DE_THRESH + floor((filter_select -
    /// DE_THRESH)^curve)` above it, clamped to the table's last index.
    fn kernel_for(&self, filter_select: f64) -> &Kernel {
        let max_index = self.kernels.len() - 1;
        let index = if filter_select <= 0.0 {
            0
        } else if filter_select <= DE_THRESH as f64 {
            (filter_select.ceil() as usize).saturating_sub(1)
        } else {
            DE_THRESH + (filter_select - DE_THRESH as f64).powf(self.curve).floor() as usize
        };
        &self.kernels[index.min(max_index)]
    }

    pub fn max_half_width(&self) -> isize {
        self.kernels.first().map(|k| k.half_width).unwrap_or(0)
    }

    /// Splats `value * amount` from a source pixel whose local hit mass is
    /// `filter_select` onto every cell within the selected kernel's
    /// footprint via `write`, called once per affected `(dx, dy, weight)`
    /// triple.
    pub fn splat(&self, filter_select: f64, mut write: impl FnMut(isize, isize, f64)) {
        let kernel = self.kernel_for(filter_select);
        for dy in -kernel.half_width..=kernel.half_width {
            for dx in -kernel.half_width..=kernel.half_width {
                let w = kernel.weight(dx, dy);
                if w > 0.0 {
                    write(dx, dy, w);
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn higher_hit_mass_yields_narrower_kernel() {
        let f = DeFilter::new(0.0, 9.0, 0.6, 1).unwrap();
        let sparse = f.kernel_for(0.0).half_width;
        let dense = f.kernel_for(DE_THRESH as f64).half_width;
        assert!(dense <= sparse);
    }

    #[test]
    fn splat_weights_sum_to_one() {
        let f = DeFilter::new(0.0, 5.0, 0.6, 1).unwrap();
        for hits in [0.0, 10.0, 50.0, 100.0, 500.0] {
            let mut sum = 0.0;
            f.splat(hits, |_, _, w| sum += w);
            assert!((sum - 1.0).abs() < 1e-9, "hits={hits} sum={sum}");
        }
    }

    #[test]
    fn hit_mass_beyond_threshold_clamps_to_table_end() {
        let f = DeFilter::new(0.0, 9.0, 0.6, 1).unwrap();
        assert_eq!(f.kernel_for(1_000_000.0).half_width, f.kernel_for(DE_THRESH as f64).half_width);
    }

    #[test]
    fn invalid_radius_order_is_rejected() {
        assert!(DeFilter::new(5.0, 1.0, 0.6, 1).is_err());
    }

    #[test]
    fn odd_supersample_has_no_window_and_no_even_scale() {
        let f = DeFilter::new(0.0, 9.0, 0.6, 1).unwrap();
        assert_eq!(f.window_half_width(), 0);
        assert_eq!(f.scale_filter_select(42.0), 42.0);
        let f3 = DeFilter::new(0.0, 9.0, 0.6, 3).unwrap();
        assert_eq!(f3.window_half_width(), 1);
        assert_eq!(f3.scale_filter_select(42.0), 42.0);
    }

    #[test]
    fn even_supersample_scales_filter_select_down() {
        let f = DeFilter::new(0.0, 9.0, 0.6, 2).unwrap();
        assert_eq!(f.window_half_width(), 1);
        let scaled = f.scale_filter_select(90.0);
        assert!((scaled - 90.0 * (2.0f64 / 3.0).powi(2)).abs() < 1e-9);
    }
}
