// Copyright (c) the Flame Core Contributors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! The per-sample chaos-game loop: xform selection (uniform or xaos-biased),
//! warp application, bad-value recovery, and fuse/skip handling.

use crate::flame::Flame;
use crate::log::warn;
use crate::util::Xorshift128Plus;
use crate::xform::Xform;

/// Number of leading iterations discarded before a freshly (re)seeded point
/// is considered to have converged onto the attractor.
pub const DEFAULT_FUSE: u32 = 15;

/// A sample's coordinates blow up to this magnitude or NaN/infinite when an
/// xform chain diverges; such samples are discarded and the point reseeded
/// rather than plotted.
const BAD_VALUE_THRESHOLD: f64 = 1e10;

#[inline]
fn is_bad(p: (f64, f64)) -> bool {
    !p.0.is_finite() || !p.1.is_finite() || p.0.abs() > BAD_VALUE_THRESHOLD || p.1.abs() > BAD_VALUE_THRESHOLD
}

/// Precomputed cumulative weight tables for xform selection: one global
/// table for uniform selection, or one table per source xform when xaos is
/// in effect. Building these once per render avoids re-summing weights on
/// every single sample.
pub struct SelectionTables {
    uniform: Vec<f64>,
    per_source: Option<Vec<Vec<f64>>>,
}

impl SelectionTables {
    pub fn build(flame: &Flame) -> Self {
        let uniform = cumulative(flame.xforms.iter().map(|x| x.weight));
        let per_source = if flame.xaos_enabled() {
            Some(
                flame
                    .xforms
                    .iter()
                    .map(|src| {
                        if src.xaos.is_empty() {
                            cumulative(flame.xforms.iter().map(|x| x.weight))
                        } else {
                            cumulative(
                                flame
                                    .xforms
                                    .iter()
                                    .zip(src.xaos.iter())
                                    .map(|(x, bias)| x.weight * bias),
                            )
                        }
                    })
                    .collect(),
            )
        } else {
            None
        };
        Self { uniform, per_source }
    }

    /// Selects the next xform index given the previously selected one
    /// (ignored under uniform selection).
    #[inline]
    pub fn select(&self, prev_index: Option<usize>, u: f64) -> usize {
        let table = match (&self.per_source, prev_index) {
            (Some(rows), Some(prev)) => &rows[prev],
            (Some(rows), None) => &rows[0],
            (None, _) => &self.uniform,
        };
        let target = u * table.last().copied().unwrap_or(0.0);
        table.partition_point(|&cum| cum <= target).min(table.len() - 1)
    }
}

fn cumulative(weights: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut out = Vec::new();
    let mut sum = 0.0;
    for w in weights {
        sum += w.max(0.0);
        out.push(sum);
    }
    out
}

/// Mutable per-worker iteration state, carried across sub-batches so a
/// strip's RNG stream and current point stay continuous between scheduler
/// callbacks (see `schedule`).
pub struct IterState {
    pub rng: Xorshift128Plus,
    point: (f64, f64),
    color_x: f64,
    last_xform: Option<usize>,
    fused: bool,
}

impl IterState {
    pub fn new(rng: Xorshift128Plus) -> Self {
        Self {
            rng,
            point: (0.0, 0.0),
            color_x: 0.0,
            last_xform: None,
            fused: false,
        }
    }

    fn reseed(&mut self) {
        self.point = (self.rng.next_f64_range(-1.0, 1.0), self.rng.next_f64_range(-1.0, 1.0));
        self.color_x = self.rng.next_f64_unit();
        self.last_xform = None;
        self.fused = false;
    }
}

/// One accumulable sample: the warped point, color coordinate, and opacity
/// to weight the histogram contribution by.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub point: (f64, f64),
    pub color_x: f64,
    pub opacity: f64,
}

/// Runs `count` chaos-game steps against `flame`, applying `fuse` discarded
/// warm-up iterations whenever the point is reseeded (on the first call, and
/// after any bad-value recovery), and calls `emit` for every sample that
/// survives fuse and bad-value filtering.
///
/// A final xform, if present, is applied once per surviving sample without
/// participating in selection, matching the reference renderer's "always
/// apply last" contract.
pub fn run_batch(flame: &Flame, tables: &SelectionTables, state: &mut IterState, fuse: u32, count: usize, mut emit: impl FnMut(Sample)) {
    if !state.fused {
        for _ in 0..fuse {
            step(flame, tables, state);
        }
        state.fused = true;
    }

    for _ in 0..count {
        let Some(sample) = step(flame, tables, state) else {
            continue;
        };
        emit(sample);
    }
}

#[inline]
fn step(flame: &Flame, tables: &SelectionTables, state: &mut IterState) -> Option<Sample> {
    let u = state.rng.next_f64_unit();
    let idx = tables.select(state.last_xform, u);
    let xform: &Xform = &flame.xforms[idx];

    let (mut p, mut color_x) = xform.apply(state.point, state.color_x, &mut state.rng);

    if is_bad(p) {
        warn!(x = p.0, y = p.1, xform = idx, "bad value from xform, reseeding point");
        state.reseed();
        return None;
    }

    state.point = p;
    state.color_x = color_x;
    state.last_xform = Some(idx);

    if xform.opacity <= 0.0 {
        return None;
    }

    if let Some(fin) = &flame.final_xform {
        let (fp, fc) = fin.apply(p, color_x, &mut state.rng);
        if is_bad(fp) {
            warn!(x = fp.0, y = fp.1, "bad value from final xform, dropping sample");
            return None;
        }
        p = fp;
        color_x = fc;
        return Some(Sample { point: p, color_x, opacity: xform.opacity.min(fin.opacity) });
    }

    Some(Sample { point: p, color_x, opacity: xform.opacity })
}
