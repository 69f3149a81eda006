// Copyright (c) the Flame Core Contributors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Per-temporal-sample weighting for motion-blurred renders: `temporal_samples`
//! sub-frames are each iterated with a small time offset and blended with
//! coefficients that fall off toward the edges of the exposure window.

#[derive(Clone, Debug)]
pub struct TemporalFilter {
    /// Exposure-time offset, in `[-0.5, 0.5]` sub-frame units, for each
    /// temporal sample.
    deltas: Vec<f64>,
    /// Normalized (sums to 1) blend coefficient for each temporal sample.
    coefficients: Vec<f64>,
}

impl TemporalFilter {
    /// Builds a filter for `samples` sub-frames using a triangular
    /// (exposure-weighted) falloff, matching the reference renderer's
    /// default temporal filter shape.
    pub fn new(samples: usize) -> Self {
        let samples = samples.max(1);
        let mut deltas = Vec::with_capacity(samples);
        let mut coefficients = Vec::with_capacity(samples);
        let mut sum = 0.0;
        for i in 0..samples {
            let t = if samples == 1 {
                0.0
            } else {
                -0.5 + i as f64 / (samples - 1) as f64
            };
            let w = 1.0 - 2.0 * t.abs();
            deltas.push(t);
            coefficients.push(w.max(1e-9));
            sum += w.max(1e-9);
        }
        for c in coefficients.iter_mut() {
            *c /= sum;
        }
        Self { deltas, coefficients }
    }

    pub fn samples(&self) -> usize {
        self.deltas.len()
    }

    pub fn delta(&self, index: usize) -> f64 {
        self.deltas[index]
    }

    pub fn coefficient(&self, index: usize) -> f64 {
        self.coefficients[index]
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::util::is_close;

    #[test]
    fn coefficients_sum_to_one() {
        for n in 1..8 {
            let f = TemporalFilter::new(n);
            let sum: f64 = (0..f.samples()).map(|i| f.coefficient(i)).sum();
            assert!(is_close(sum, 1.0), "n={n} sum={sum}");
        }
    }

    #[test]
    fn single_sample_has_zero_delta() {
        let f = TemporalFilter::new(1);
        assert_eq!(f.delta(0), 0.0);
    }

    #[test]
    fn deltas_span_the_exposure_window_symmetrically() {
        let f = TemporalFilter::new(5);
        assert!((f.delta(0) + f.delta(4)).abs() < 1e-12);
    }
}
