// Copyright (c) the Flame Core Contributors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! The fixed-radius spatial anti-alias filter applied to every pixel
//! uniformly, independent of local hit density. Used in interactive mode and
//! whenever density estimation is disabled.

use crate::error::{Error, Result};

/// A precomputed, normalized `fw x fw` Gaussian kernel, where
/// `fw = 2 * ceil(radius * supersample) + 1`.
#[derive(Clone, Debug)]
pub struct SpatialFilter {
    width: usize,
    weights: Vec<f64>,
}

impl SpatialFilter {
    pub fn new(radius: f64, supersample: u32) -> Result<Self> {
        if radius < 0.0 || !radius.is_finite() {
            return Err(Error::FilterCreationFailure("spatial filter radius must be finite and non-negative"));
        }
        let ss = supersample.max(1) as f64;
        let half = (radius * ss).ceil() as isize;
        let width = (2 * half + 1) as usize;
        if width == 0 {
            return Err(Error::FilterCreationFailure("spatial filter width computed as zero"));
        }

        let sigma = (radius * ss).max(1e-6) / 2.0;
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
        if sum <= 0.0 {
            return Err(Error::FilterCreationFailure("spatial filter kernel summed to zero"));
        }
        for w in weights.iter_mut() {
            *w /= sum;
        }

        Ok(Self { width, weights })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn half_width(&self) -> isize {
        (self.width / 2) as isize
    }

    #[inline]
    pub fn weight(&self, i: usize, j: usize) -> f64 {
        self.weights[j * self.width + i]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn kernel_sums_to_one() {
        let f = SpatialFilter::new(1.5, 2).unwrap();
        let sum: f64 = (0..f.width())
            .flat_map(|j| (0..f.width()).map(move |i| (i, j)))
            .map(|(i, j)| f.weight(i, j))
            .sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn kernel_is_symmetric() {
        let f = SpatialFilter::new(2.0, 1).unwrap();
        let half = f.half_width() as usize;
        assert!((f.weight(0, half) - f.weight(f.width() - 1, half)).abs() < 1e-12);
    }

    #[test]
    fn negative_radius_is_rejected() {
        assert!(SpatialFilter::new(-1.0, 1).is_err());
    }

    #[test]
    fn width_grows_with_supersample() {
        let low = SpatialFilter::new(1.0, 1).unwrap();
        let high = SpatialFilter::new(1.0, 4).unwrap();
        assert!(high.width() > low.width());
    }
}
