// Copyright (c) the Flame Core Contributors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! The render orchestrator: drives iteration across workers into a shared
//! histogram, applies the density-estimation or log-scale filter, convolves
//! the spatial anti-alias kernel, runs gamma/vibrancy/highlight color
//! correction, and writes the cropped, channel-packed output buffer.
//!
//! `Renderer` is resumable: it remembers the histogram and density-filtered
//! accumulator from its last run, so a caller that only tweaked, say,
//! `brightness` can submit `Action::AccumOnly` and skip re-iterating
//! entirely (see `advance`).

use std::sync::atomic::Ordering;
use std::sync::Mutex;

use crate::camera::CarToRas;
use crate::config::{Callbacks, RendererConfig};
use crate::error::{Error, Result};
use crate::filter::{DeFilter, SpatialFilter, TemporalFilter};
use crate::flame::{CameraDerived, FilterKind, Flame};
use crate::image::{AccumPixel, Accumulator, Histogram};
use crate::iterate::Sample;
use crate::log::{debug, trace};
use crate::palette::Color;
use crate::schedule::{self, WorkerPlan};
use crate::util::fast_powf;

/// Tracks how much of the pipeline is valid so an interactive caller that
/// only tweaks, say, gamma doesn't pay for re-iterating; mirrors the
/// reference renderer's "what changed" dirty-state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderState {
    None,
    IterStarted,
    IterDone,
    FilterDone,
    AccumDone,
}

/// The unit of work a given state transition requires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Nothing,
    AccumOnly,
    FilterAndAccum,
    KeepIterating,
    FullRender,
}

impl RenderState {
    /// What must run to reach `AccumDone` from the current state, given
    /// whether the flame itself changed since the last render.
    pub fn next_action(self, flame_changed: bool) -> Action {
        if flame_changed {
            return Action::FullRender;
        }
        match self {
            RenderState::None => Action::FullRender,
            RenderState::IterStarted => Action::KeepIterating,
            RenderState::IterDone => Action::FilterAndAccum,
            RenderState::FilterDone => Action::AccumOnly,
            RenderState::AccumDone => Action::Nothing,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EmberStats {
    pub samples_iterated: u64,
    pub samples_discarded_bad_value: u64,
    pub samples_out_of_bounds: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    Complete,
    Aborted,
}

/// Everything carried between successive `advance` calls against the same
/// flame so `FilterAndAccum`/`AccumOnly`/`KeepIterating` can skip stages
/// that didn't need to rerun. Rebuilt wholesale on `FullRender`.
struct RenderCache {
    derived: CameraDerived,
    car_to_ras: CarToRas,
    de_filter: DeFilter,
    spatial_filter: SpatialFilter,
    histogram: Histogram,
    /// Post density-filter, pre spatial-filter buffer, same shape as the
    /// histogram. Reused by `AccumOnly` so it doesn't have to rerun the
    /// density estimation pass just because `brightness` changed.
    filtered: Vec<AccumPixel>,
    total_samples: usize,
    samples_done: usize,
    last_buffer: Vec<u8>,
}

pub struct Renderer {
    config: RendererConfig,
    state: RenderState,
    cache: Option<RenderCache>,
    stats: EmberStats,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config, state: RenderState::None, cache: None, stats: EmberStats::default() }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    pub fn stats(&self) -> EmberStats {
        self.stats
    }

    /// Resets the state machine so the next `advance`/`run` call performs a
    /// full render regardless of the action it's given. Callers invoke this
    /// whenever the flame itself changed (camera, xforms, filter widths,
    /// palette mode, size) per the specification's per-parameter impact
    /// table.
    pub fn invalidate(&mut self) {
        self.state = RenderState::None;
        self.cache = None;
    }

    /// Runs a complete render of `flame`: iterate, filter, color-correct,
    /// and pack into an output buffer. Returns `RunOutcome::Aborted` if
    /// `callbacks` signals abort mid-run rather than treating cancellation
    /// as an error. Equivalent to `advance(flame, Action::FullRender, ..)`.
    pub fn run(&mut self, flame: &Flame, callbacks: &Callbacks) -> Result<(RunOutcome, Vec<u8>, usize, usize)> {
        self.advance(flame, Action::FullRender, callbacks)
    }

    /// Advances the render state machine by one action, reusing whatever
    /// cached histogram/filtered buffer it can. `Action::Nothing` returns
    /// the last-produced buffer unchanged. `Action::KeepIterating` requires
    /// a prior `AccumDone` run with a lower `quality`.
    pub fn run_action(&mut self, flame: &Flame, action: Action, callbacks: &Callbacks) -> Result<(RunOutcome, Vec<u8>, usize, usize)> {
        self.advance(flame, action, callbacks)
    }

    fn advance(&mut self, flame: &Flame, action: Action, callbacks: &Callbacks) -> Result<(RunOutcome, Vec<u8>, usize, usize)> {
        flame.validate()?;

        let action = if self.cache.is_none() { Action::FullRender } else { action };

        match action {
            Action::Nothing => {
                let cache = self.cache.as_ref().expect("Nothing requires a prior render");
                Ok((RunOutcome::Complete, cache.last_buffer.clone(), flame.camera.width, flame.camera.height))
            }
            Action::FullRender => self.full_render(flame, callbacks),
            Action::KeepIterating => self.keep_iterating(flame, callbacks),
            Action::FilterAndAccum => self.filter_and_accum(flame),
            Action::AccumOnly => self.accum_only(flame),
        }
    }

    fn build_cache(&self, flame: &Flame) -> Result<(CameraDerived, CarToRas, DeFilter, SpatialFilter)> {
        let de_filter = DeFilter::new(
            flame.filter.de_filter_min_radius,
            flame.filter.de_filter_max_radius,
            flame.filter.de_filter_curve,
            flame.camera.spatial_supersample,
        )?;
        let spatial_filter = SpatialFilter::new(flame.filter.filter_radius, flame.camera.spatial_supersample)?;

        let gutter_super_px = spatial_filter.half_width() as f64 + de_filter.max_half_width() as f64;

        let derived = flame.camera.derive(gutter_super_px)?;
        let car_to_ras = derived.car_to_ras();
        Ok((derived, car_to_ras, de_filter, spatial_filter))
    }

    /// Resets the histogram and density-filtered accumulator, then runs
    /// every stage from scratch.
    fn full_render(&mut self, flame: &Flame, callbacks: &Callbacks) -> Result<(RunOutcome, Vec<u8>, usize, usize)> {
        let (derived, car_to_ras, de_filter, spatial_filter) = self.build_cache(flame)?;
        let histogram = Histogram::new(derived.full_w, derived.full_h)?;
        let total_samples = scaled_sample_total(flame, &derived);
        debug!(total_samples, super_w = derived.super_w, super_h = derived.super_h, "starting full render");

        self.cache = Some(RenderCache {
            derived,
            car_to_ras,
            de_filter,
            spatial_filter,
            histogram,
            filtered: Vec::new(),
            total_samples,
            samples_done: 0,
            last_buffer: Vec::new(),
        });
        self.state = RenderState::IterStarted;
        self.stats = EmberStats::default();

        self.iterate_and_finish(flame, callbacks, total_samples)
    }

    /// Only valid after a prior run reached `AccumDone` with a lower
    /// `quality`: continues iterating from where the histogram left off
    /// instead of resetting it, then reruns filter + accum.
    fn keep_iterating(&mut self, flame: &Flame, callbacks: &Callbacks) -> Result<(RunOutcome, Vec<u8>, usize, usize)> {
        if self.state != RenderState::AccumDone {
            return Err(Error::KeepIteratingWithoutPriorRender);
        }
        let new_total = {
            let cache = self.cache.as_ref().unwrap();
            scaled_sample_total(flame, &cache.derived)
        };
        let already_done = self.cache.as_ref().unwrap().samples_done;
        if new_total <= already_done {
            return Err(Error::KeepIteratingWithoutPriorRender);
        }
        let additional = new_total - already_done;
        self.cache.as_mut().unwrap().total_samples = new_total;
        self.state = RenderState::IterStarted;
        self.iterate_and_finish(flame, callbacks, additional)
    }

    /// Runs `sample_count` more samples into the cached histogram (which
    /// for `FullRender` is freshly zeroed and for `KeepIterating` already
    /// holds prior hits), then proceeds through filter + accum.
    fn iterate_and_finish(&mut self, flame: &Flame, callbacks: &Callbacks, sample_count: usize) -> Result<(RunOutcome, Vec<u8>, usize, usize)> {
        let temporal = TemporalFilter::new(flame.temporal_samples.max(1) as usize);
        let cache = self.cache.as_mut().unwrap();
        let (full_w, full_h) = (cache.derived.full_w, cache.derived.full_h);
        let histogram = Mutex::new(std::mem::replace(&mut cache.histogram, Histogram::new(1, 1)?));
        let car_to_ras = cache.car_to_ras;
        let rotate_radians = flame.camera.rotate_degrees.to_radians();
        let (center_x, center_y) = (flame.camera.center_x, flame.camera.center_y);

        let abort = callbacks.abort_flag();
        let mut samples_iterated = 0u64;
        let mut out_of_bounds = 0u64;

        for t in 0..temporal.samples() {
            if abort.load(Ordering::Relaxed) {
                break;
            }
            let budget = (sample_count as f64 / temporal.samples() as f64).round() as usize;
            let opacity_scale = temporal.coefficient(t) * temporal.samples() as f64;
            let plans: Vec<WorkerPlan> = schedule::plan_workers(budget.max(1), self.config.thread_count, car_to_ras.ras_h(), false, temporal.samples())?;

            let oob = std::sync::atomic::AtomicU64::new(0);
            let iterated = std::sync::atomic::AtomicU64::new(0);

            let record = |hist: &mut Histogram, sample: &Sample| {
                iterated.fetch_add(1, Ordering::Relaxed);
                let point = rotate_point(sample.point, center_x, center_y, rotate_radians);
                if !car_to_ras.in_bounds(point) {
                    oob.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                let index = car_to_ras.convert(point);
                if index < 0 || index as usize >= hist.len() {
                    oob.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                let color = flame.palette.sample(sample.color_x, flame.palette_mode);
                hist.accumulate(index, color.r, color.g, color.b, sample.opacity * opacity_scale);
            };

            if self.config.lock_accum {
                // Each worker owns a private histogram nobody else ever touches, so
                // no cross-thread synchronization happens during iteration itself.
                // Folding them into the shared histogram afterward in a fixed,
                // worker-index order (rather than whatever order threads finish in)
                // is what makes the result reproducible bit-for-bit across runs.
                let locals: Vec<Mutex<Histogram>> = plans
                    .iter()
                    .map(|_| Histogram::new(full_w, full_h).map(Mutex::new))
                    .collect::<Result<_>>()?;

                schedule::run_workers(
                    flame,
                    &self.config,
                    &plans,
                    &abort,
                    |worker, _strip, samples| {
                        let mut hist = locals[worker].lock().unwrap();
                        for sample in samples {
                            record(&mut hist, sample);
                        }
                    },
                    |done, total| trace!(done, total, temporal_sample = t, "iterate progress"),
                );

                let mut hist = histogram.lock().unwrap();
                for local in locals {
                    hist.merge(&local.into_inner().unwrap());
                }
            } else {
                // Default, non-reproducible path: every worker locks the one
                // shared histogram per sub-batch, so the order sub-batches from
                // different workers interleave (and thus float summation order)
                // depends on real OS thread scheduling.
                schedule::run_workers(
                    flame,
                    &self.config,
                    &plans,
                    &abort,
                    |_worker, _strip, samples| {
                        let mut hist = histogram.lock().unwrap();
                        for sample in samples {
                            record(&mut hist, sample);
                        }
                    },
                    |done, total| trace!(done, total, temporal_sample = t, "iterate progress"),
                );
            }

            samples_iterated += iterated.load(Ordering::Relaxed);
            out_of_bounds += oob.load(Ordering::Relaxed);
        }

        let aborted = abort.load(Ordering::Relaxed);
        let cache = self.cache.as_mut().unwrap();
        cache.histogram = histogram.into_inner().unwrap();
        cache.samples_done += sample_count;
        self.stats.samples_iterated += samples_iterated;
        self.stats.samples_out_of_bounds += out_of_bounds;
        self.state = RenderState::IterDone;
        debug!(samples_iterated, out_of_bounds, aborted, "iteration finished");

        if aborted {
            let buffer = self.config.background_buffer(flame);
            return Ok((RunOutcome::Aborted, buffer, flame.camera.width, flame.camera.height));
        }

        self.run_filter_and_accum(flame)
    }

    fn filter_and_accum(&mut self, flame: &Flame) -> Result<(RunOutcome, Vec<u8>, usize, usize)> {
        if self.cache.is_none() {
            return self.full_render(flame, &Callbacks::new());
        }
        self.run_filter_and_accum(flame)
    }

    fn run_filter_and_accum(&mut self, flame: &Flame) -> Result<(RunOutcome, Vec<u8>, usize, usize)> {
        let cache = self.cache.as_mut().unwrap();
        cache.filtered = density_filter(flame, &cache.histogram, &cache.derived, &cache.de_filter, cache.samples_done);
        self.state = RenderState::FilterDone;
        self.run_accum_only(flame)
    }

    fn accum_only(&mut self, flame: &Flame) -> Result<(RunOutcome, Vec<u8>, usize, usize)> {
        if self.cache.as_ref().map(|c| c.filtered.is_empty()).unwrap_or(true) {
            return self.filter_and_accum(flame);
        }
        self.run_accum_only(flame)
    }

    fn run_accum_only(&mut self, flame: &Flame) -> Result<(RunOutcome, Vec<u8>, usize, usize)> {
        let accum = {
            let cache = self.cache.as_ref().unwrap();
            spatial_filter_and_correct(flame, &cache.filtered, &cache.derived, &cache.spatial_filter)?
        };
        let buffer = self.pack(&accum);
        let cache = self.cache.as_mut().unwrap();
        cache.last_buffer = buffer.clone();
        self.state = RenderState::AccumDone;
        Ok((RunOutcome::Complete, buffer, flame.camera.width, flame.camera.height))
    }

    /// Packs an [`Accumulator`] into an R,G,B[,A] interleaved buffer at the
    /// configured bit depth, flipping rows if `y_axis_up` is set.
    fn pack(&self, accum: &Accumulator) -> Vec<u8> {
        let channels = if self.config.transparency { self.config.num_channels.max(4) } else { self.config.num_channels.min(3) } as usize;
        let bytes_per_channel = self.config.bytes_per_channel.max(1) as usize;
        let mut out = Vec::with_capacity(accum.width() * accum.height() * channels * bytes_per_channel);

        for row in 0..accum.height() {
            let y = if self.config.y_axis_up { accum.height() - 1 - row } else { row };
            for x in 0..accum.width() {
                let p = accum.get(x, y);
                let values = [p.r, p.g, p.b, p.a];
                for &v in values.iter().take(channels) {
                    write_channel(&mut out, v, bytes_per_channel);
                }
            }
        }
        out
    }
}

impl RendererConfig {
    /// A buffer of pure background color, used when an aborted render has
    /// no iterated samples to show yet.
    fn background_buffer(&self, flame: &Flame) -> Vec<u8> {
        let channels = if self.transparency { self.num_channels.max(4) } else { self.num_channels.min(3) } as usize;
        let bytes_per_channel = self.bytes_per_channel.max(1) as usize;
        let bg = flame.filter.background;
        let values = [bg.0, bg.1, bg.2, 1.0];
        let mut out = Vec::with_capacity(flame.camera.width * flame.camera.height * channels * bytes_per_channel);
        for _ in 0..(flame.camera.width * flame.camera.height) {
            for &v in values.iter().take(channels) {
                write_channel(&mut out, v, bytes_per_channel);
            }
        }
        out
    }
}

/// Rotates `p` around `(cx, cy)` by `radians`, matching the accumulation
/// pipeline's per-sample rotation step (applied before the cartesian window
/// test, not baked into any xform).
#[inline]
fn rotate_point(p: (f64, f64), cx: f64, cy: f64, radians: f64) -> (f64, f64) {
    if radians == 0.0 {
        return p;
    }
    let (sin, cos) = radians.sin_cos();
    let (dx, dy) = (p.0 - cx, p.1 - cy);
    (cx + dx * cos - dy * sin, cy + dx * sin + dy * cos)
}

/// Histogram -> density-filtered accumulator: log-scale (cheap, uniform) or
/// Gaussian density estimation (variable kernel keyed by local hit count).
///
/// `samples_done` is the super-sampled hit count actually accumulated so far
/// (not necessarily `flame.quality * area`, since `KeepIterating` calls this
/// with a partial histogram) and is converted back to final-pixel-relative
/// "quality used" the same way the reference renderer's `forceOutput` path
/// recomputes quality from `m_Stats.m_Iters` for an early/interactive flush.
fn density_filter(flame: &Flame, histogram: &Histogram, derived: &CameraDerived, de_filter: &DeFilter, samples_done: usize) -> Vec<AccumPixel> {
    let mut filtered = vec![AccumPixel::default(); histogram.len()];
    let (k1, k2) = filter_constants(flame, derived, samples_done);

    match flame.filter.kind {
        FilterKind::Log => {
            for (i, bucket) in histogram.buckets().iter().enumerate() {
                if bucket.a <= 0.0 {
                    continue;
                }
                let log_scale = (k1 * (1.0 + bucket.a * k2).ln()) / bucket.a;
                filtered[i] = AccumPixel {
                    r: bucket.r * log_scale,
                    g: bucket.g * log_scale,
                    b: bucket.b * log_scale,
                    a: bucket.a * log_scale,
                };
            }
        }
        FilterKind::Gaussian => {
            let width = histogram.width() as isize;
            let height = histogram.height() as isize;
            let window_half = de_filter.window_half_width();
            for y in 0..height {
                for x in 0..width {
                    let idx = (y * width + x) as usize;
                    let bucket = match histogram.get(idx) {
                        Some(b) if b.a > 0.0 => *b,
                        _ => continue,
                    };
                    let log_scale = (k1 * (1.0 + bucket.a * k2).ln()) / bucket.a;

                    // filter_select: local hit mass over the (2*window_half+1)^2
                    // neighborhood, bounds-clamped rather than padded, per §4.7
                    // step 1.
                    let filter_select = if window_half == 0 {
                        bucket.a
                    } else {
                        let x0 = (x - window_half).max(0);
                        let x1 = (x + window_half).min(width - 1);
                        let y0 = (y - window_half).max(0);
                        let y1 = (y + window_half).min(height - 1);
                        let mut sum = 0.0;
                        for ny in y0..=y1 {
                            let row = ny * width;
                            for nx in x0..=x1 {
                                sum += histogram.get((row + nx) as usize).map(|b| b.a).unwrap_or(0.0);
                            }
                        }
                        sum
                    };
                    let filter_select = de_filter.scale_filter_select(filter_select);

                    de_filter.splat(filter_select, |dx, dy, w| {
                        let sx = x + dx;
                        let sy = y + dy;
                        if sx < 0 || sy < 0 || sx >= width || sy >= height {
                            return;
                        }
                        let out_idx = (sy * width + sx) as usize;
                        filtered[out_idx].r += bucket.r * log_scale * w;
                        filtered[out_idx].g += bucket.g * log_scale * w;
                        filtered[out_idx].b += bucket.b * log_scale * w;
                        filtered[out_idx].a += bucket.a * log_scale * w;
                    });
                }
            }
        }
    }
    filtered
}

/// Density-filtered accumulator -> final frame: convolves the fixed spatial
/// filter kernel over each output pixel's `fw x fw` window, then applies
/// gamma/vibrancy/highlight color correction. `early_clip` runs correction
/// once per super-sampled source pixel before the convolution instead of
/// once per output pixel after, per the specification's early/late clip
/// modes.
fn spatial_filter_and_correct(flame: &Flame, filtered: &[AccumPixel], derived: &CameraDerived, spatial_filter: &SpatialFilter) -> Result<Accumulator> {
    let src_width = derived.full_w as isize;
    let src_height = derived.full_h as isize;
    let half = spatial_filter.half_width();

    let corrected_source: Option<Vec<Color>> = if flame.filter.early_clip {
        Some(filtered.iter().map(|p| color_correct(flame, Color::new(p.r, p.g, p.b, p.a))).collect())
    } else {
        None
    };

    let mut accum = Accumulator::new(flame.camera.width, flame.camera.height)?;
    for out_y in 0..flame.camera.height {
        for out_x in 0..flame.camera.width {
            let cx = derived.gutter as isize + (out_x * flame.camera.spatial_supersample.max(1) as usize) as isize;
            let cy = derived.gutter as isize + (out_y * flame.camera.spatial_supersample.max(1) as usize) as isize;

            if let Some(corrected) = &corrected_source {
                let mut sum = (0.0, 0.0, 0.0, 0.0);
                for jj in -half..=half {
                    for ii in -half..=half {
                        let sx = cx + ii;
                        let sy = cy + jj;
                        if sx < 0 || sy < 0 || sx >= src_width || sy >= src_height {
                            continue;
                        }
                        let w = spatial_filter.weight((ii + half) as usize, (jj + half) as usize);
                        let c = corrected[(sy * src_width + sx) as usize];
                        sum.0 += c.r * w;
                        sum.1 += c.g * w;
                        sum.2 += c.b * w;
                        sum.3 += c.a * w;
                    }
                }
                accum.set(out_x, out_y, AccumPixel { r: sum.0, g: sum.1, b: sum.2, a: sum.3 });
            } else {
                let mut sum = AccumPixel::default();
                for jj in -half..=half {
                    for ii in -half..=half {
                        let sx = cx + ii;
                        let sy = cy + jj;
                        if sx < 0 || sy < 0 || sx >= src_width || sy >= src_height {
                            continue;
                        }
                        let w = spatial_filter.weight((ii + half) as usize, (jj + half) as usize);
                        let p = filtered[(sy * src_width + sx) as usize];
                        sum.r += p.r * w;
                        sum.g += p.g * w;
                        sum.b += p.b * w;
                        sum.a += p.a * w;
                    }
                }
                let c = color_correct(flame, Color::new(sum.r, sum.g, sum.b, sum.a));
                accum.set(out_x, out_y, AccumPixel { r: c.r, g: c.g, b: c.b, a: c.a });
            }
        }
    }
    Ok(accum)
}

/// Applies gamma, vibrancy, highlight-power tone mapping, and background
/// compositing to one filtered pixel.
///
/// `c.r/g/b` are premultiplied by `c.a` (the local density, not yet
/// gamma-mapped). Rescaling by the ratio `alpha / c.a` rather than
/// multiplying by `alpha` directly keeps the whole expression affine in
/// `c` when `gamma == 1.0` (`alpha == c.a`, so the ratio is the constant
/// `1.0`), which is what makes early-clip and late-clip renders agree on a
/// linear scene: averaging commutes with an affine map.
fn color_correct(flame: &Flame, c: Color) -> Color {
    let f = &flame.filter;
    if c.a <= 0.0 {
        return Color::new(f.background.0, f.background.1, f.background.2, 0.0);
    }

    let alpha = if c.a <= f.gamma_threshold {
        let linrange = f.gamma_threshold.max(1e-12);
        let frac = c.a / linrange;
        frac * linrange.powf(1.0 / f.gamma - 1.0)
    } else {
        c.a.powf(1.0 / f.gamma)
    };

    let ls = alpha / c.a;
    let (mut r, mut g, mut b) = (c.r * ls, c.g * ls, c.b * ls);

    if f.vibrancy < 1.0 {
        let gray = (r + g + b) / 3.0;
        r = f.vibrancy * r + (1.0 - f.vibrancy) * gray;
        g = f.vibrancy * g + (1.0 - f.vibrancy) * gray;
        b = f.vibrancy * b + (1.0 - f.vibrancy) * gray;
    }

    if f.highlight_power >= 0.0 {
        let max_c = r.max(g).max(b);
        if max_c > 1.0 {
            let scaled = fast_powf((1.0 / max_c) as f32, f.highlight_power as f32) as f64;
            r *= scaled;
            g *= scaled;
            b *= scaled;
        }
    }

    let r = r.clamp(0.0, 1.0) + f.background.0 * (1.0 - alpha);
    let g = g.clamp(0.0, 1.0) + f.background.1 * (1.0 - alpha);
    let b = b.clamp(0.0, 1.0) + f.background.2 * (1.0 - alpha);

    Color::new(r, g, b, alpha)
}

/// Total super-sampled iteration budget for a full render, per §4.5's
/// `scaled_quality = quality * scale^2`: zooming in increases the iteration
/// budget exponentially with zoom level so the per-unit-area sample density
/// stays roughly constant, whereas `supersample` scales the budget only
/// through `super_w * super_h` (linearly in sample count, not exponentially
/// in zoom). Grounded on `Renderer.cpp`'s `m_ScaledQuality` field.
fn scaled_sample_total(flame: &Flame, derived: &CameraDerived) -> usize {
    let scaled_quality = flame.quality * flame.camera.scale * flame.camera.scale;
    (scaled_quality * derived.super_w as f64 * derived.super_h as f64) as usize
}

/// `(k1, k2)` for the log-density formula `accum = hist * k1 * ln(1 + hist.a
/// * k2) / hist.a`, matching the reference renderer's `Renderer::FilterAndAccum`
/// (`m_K1 = brightness * 268 / 256`, `m_K2 = supersample^2 / (area *
/// quality_used)`). `area` is the cartesian area of the final (unsupersampled)
/// frame; `super_w/pixels_per_unit` already equals `width / (pixels_per_unit *
/// scale)` since both carry the same supersample factor, which is why no
/// separate descale is needed here. Per-temporal-sample normalization is
/// folded into `Renderer::iterate_and_finish`'s opacity scaling instead of a
/// `SumFilt` divisor here, since this crate's `TemporalFilter` coefficients
/// are pre-normalized to sum to one.
fn filter_constants(flame: &Flame, derived: &CameraDerived, samples_done: usize) -> (f64, f64) {
    let area = (derived.super_w as f64 / derived.pixels_per_unit) * (derived.super_h as f64 / derived.pixels_per_unit);
    let k1 = flame.brightness * 268.0 / 256.0;
    let super_px = (derived.super_w as f64 * derived.super_h as f64).max(1.0);
    let quality_used = (samples_done as f64 / super_px).max(1.0 / super_px);
    let supersample = flame.camera.spatial_supersample.max(1) as f64;
    let k2 = (supersample * supersample) / (area.max(1e-12) * quality_used);
    (k1, k2)
}

fn write_channel(out: &mut Vec<u8>, value: f64, bytes_per_channel: usize) {
    let clamped = value.clamp(0.0, 1.0);
    if bytes_per_channel <= 1 {
        out.push((clamped * 255.0 + 0.5) as u8);
    } else {
        let v = (clamped * 65535.0 + 0.5) as u16;
        out.extend_from_slice(&v.to_ne_bytes());
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::affine::Affine2D;
    use crate::flame::{Camera, FilterParams, InterpolationType};
    use crate::palette::{Palette, PaletteMode};
    use crate::variation::{Variation, WeightedVariation};
    use crate::xform::Xform;

    fn tiny_flame() -> Flame {
        let x1 = Xform::new(
            Affine2D::new(0.5, 0.0, 0.25, 0.0, 0.5, 0.0),
            Affine2D::identity(),
            vec![WeightedVariation { variation: Variation::Linear, weight: 1.0 }],
        );
        let x2 = Xform::new(
            Affine2D::new(0.5, 0.0, -0.25, 0.0, 0.5, 0.25),
            Affine2D::identity(),
            vec![WeightedVariation { variation: Variation::Linear, weight: 1.0 }],
        );
        Flame {
            name: "tiny".into(),
            camera: Camera { width: 16, height: 16, spatial_supersample: 1, ..Camera::default() },
            filter: FilterParams::default(),
            palette: Palette::from_entries([Color::new(1.0, 1.0, 1.0, 1.0); 256]),
            palette_mode: PaletteMode::Linear,
            xforms: vec![x1, x2],
            final_xform: None,
            interpolation: InterpolationType::Linear,
            quality: 5.0,
            supersample: 1,
            brightness: 4.0,
            temporal_samples: 1,
        }
    }

    #[test]
    fn run_produces_correctly_sized_buffer() {
        let mut renderer = Renderer::new(RendererConfig { thread_count: 2, ..RendererConfig::default() });
        let flame = tiny_flame();
        let callbacks = Callbacks::new();
        let (outcome, buffer, w, h) = renderer.run(&flame, &callbacks).unwrap();
        assert_eq!(outcome, RunOutcome::Complete);
        assert_eq!(w, 16);
        assert_eq!(h, 16);
        assert_eq!(buffer.len(), 16 * 16 * 3);
    }

    #[test]
    fn empty_xforms_is_rejected_before_any_work() {
        let mut flame = tiny_flame();
        flame.xforms.clear();
        let mut renderer = Renderer::new(RendererConfig::default());
        let callbacks = Callbacks::new();
        assert!(matches!(renderer.run(&flame, &callbacks), Err(Error::NoXforms)));
    }

    #[test]
    fn pre_aborted_callbacks_still_produce_a_buffer_marked_aborted() {
        let mut renderer = Renderer::new(RendererConfig { thread_count: 1, ..RendererConfig::default() });
        let flame = tiny_flame();
        let callbacks = Callbacks::new();
        callbacks.request_abort();
        let (outcome, buffer, ..) = renderer.run(&flame, &callbacks).unwrap();
        assert_eq!(outcome, RunOutcome::Aborted);
        assert_eq!(buffer.len(), 16 * 16 * 3);
    }

    #[test]
    fn state_machine_escalates_to_full_render_when_flame_changed() {
        assert_eq!(RenderState::AccumDone.next_action(true), Action::FullRender);
        assert_eq!(RenderState::AccumDone.next_action(false), Action::Nothing);
        assert_eq!(RenderState::FilterDone.next_action(false), Action::AccumOnly);
        assert_eq!(RenderState::IterDone.next_action(false), Action::FilterAndAccum);
        assert_eq!(RenderState::IterStarted.next_action(false), Action::KeepIterating);
    }

    #[test]
    fn accum_only_skips_reiterating() {
        let mut renderer = Renderer::new(RendererConfig { thread_count: 1, lock_accum: true, ..RendererConfig::default() });
        let flame = tiny_flame();
        let callbacks = Callbacks::new();
        renderer.run(&flame, &callbacks).unwrap();
        let iters_before = renderer.stats().samples_iterated;

        let mut dimmer = flame.clone();
        dimmer.filter.vibrancy = 0.5;
        let (outcome, _buf, ..) = renderer.run_action(&dimmer, Action::AccumOnly, &callbacks).unwrap();
        assert_eq!(outcome, RunOutcome::Complete);
        assert_eq!(renderer.stats().samples_iterated, iters_before);
        assert_eq!(renderer.state(), RenderState::AccumDone);
    }

    #[test]
    fn keep_iterating_adds_samples_without_resetting_histogram() {
        let mut renderer = Renderer::new(RendererConfig { thread_count: 1, ..RendererConfig::default() });
        let flame = tiny_flame();
        let callbacks = Callbacks::new();
        renderer.run(&flame, &callbacks).unwrap();
        let iters_before = renderer.stats().samples_iterated;

        let mut more = flame.clone();
        more.quality *= 2.0;
        let (outcome, ..) = renderer.run_action(&more, Action::KeepIterating, &callbacks).unwrap();
        assert_eq!(outcome, RunOutcome::Complete);
        assert!(renderer.stats().samples_iterated > iters_before);
    }

    #[test]
    fn higher_brightness_needs_filter_and_accum_not_accum_only() {
        let mut renderer = Renderer::new(RendererConfig { thread_count: 1, lock_accum: true, ..RendererConfig::default() });
        let flame = tiny_flame();
        let callbacks = Callbacks::new();
        let (_, dim_buf, ..) = renderer.run(&flame, &callbacks).unwrap();
        let dim_total: u64 = dim_buf.iter().map(|&b| b as u64).sum();

        let mut bright = flame.clone();
        bright.brightness *= 4.0;
        let (outcome, bright_buf, ..) = renderer.run_action(&bright, Action::FilterAndAccum, &callbacks).unwrap();
        assert_eq!(outcome, RunOutcome::Complete);
        let bright_total: u64 = bright_buf.iter().map(|&b| b as u64).sum();
        assert!(bright_total > dim_total, "brightness increase should lighten the frame: {bright_total} <= {dim_total}");

        // AccumOnly reuses the stale density-filtered buffer from the first
        // run and never re-derives k1/k2, so it must NOT pick up the
        // brightness change (see DESIGN.md's Open Question on this).
        let mut renderer2 = Renderer::new(RendererConfig { thread_count: 1, lock_accum: true, ..RendererConfig::default() });
        renderer2.run(&flame, &callbacks).unwrap();
        let (_, stale_buf, ..) = renderer2.run_action(&bright, Action::AccumOnly, &callbacks).unwrap();
        assert_eq!(stale_buf, dim_buf, "AccumOnly must not reflect a brightness-only change");
    }

    #[test]
    fn lock_accum_gives_bit_identical_output_across_many_workers() {
        let flame = tiny_flame();
        let callbacks = Callbacks::new();

        let mut a = Renderer::new(RendererConfig { thread_count: 8, lock_accum: true, ..RendererConfig::default() });
        let (_, buf_a, ..) = a.run(&flame, &callbacks).unwrap();

        let mut b = Renderer::new(RendererConfig { thread_count: 8, lock_accum: true, ..RendererConfig::default() });
        let (_, buf_b, ..) = b.run(&flame, &callbacks).unwrap();

        assert_eq!(buf_a, buf_b, "lock_accum=true must reproduce bit-for-bit regardless of real thread scheduling");
    }

    #[test]
    fn keep_iterating_without_a_prior_render_is_rejected() {
        let mut renderer = Renderer::new(RendererConfig::default());
        let flame = tiny_flame();
        let callbacks = Callbacks::new();
        assert!(matches!(renderer.run_action(&flame, Action::KeepIterating, &callbacks), Err(Error::KeepIteratingWithoutPriorRender)));
    }
}
