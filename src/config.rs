// Copyright (c) the Flame Core Contributors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Renderer-wide knobs that apply across every flame rendered with a given
//! `Renderer`, plus the abort/progress callback contract.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Which density filter a caller wants applied to interactive, not-yet-final
/// previews (`§6`); independent of `FilterParams::kind`, which governs the
/// filter used for a completed, full-quality render.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InteractiveFilter {
    Log,
    De,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RendererConfig {
    pub y_axis_up: bool,
    pub transparency: bool,
    pub num_channels: u8,
    pub bytes_per_channel: u8,
    pub thread_count: usize,
    pub sub_batch_size: usize,
    pub interactive_filter: InteractiveFilter,
    /// Forces histogram accumulation to go through a deterministic merge
    /// instead of the default racy one (`§5`/`§6`): each worker accumulates
    /// into its own private histogram during iteration (so iteration itself
    /// is never synchronized across threads), and `Renderer` folds those
    /// local histograms into the shared one in a fixed, worker-index order
    /// once every worker is done, rather than whatever order threads happen
    /// to finish in. That fixed merge order is what makes renders with
    /// identical parameters reproduce bit-for-bit. Leaving this `false`
    /// accumulates straight into one shared, per-sub-batch-locked histogram,
    /// whose interleaving (and thus float summation order) depends on real
    /// thread scheduling and isn't reproducible.
    pub lock_accum: bool,
    pub reclaim_on_resize: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            y_axis_up: false,
            transparency: false,
            num_channels: 3,
            bytes_per_channel: 1,
            thread_count: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            sub_batch_size: 10_240,
            interactive_filter: InteractiveFilter::Log,
            lock_accum: false,
            reclaim_on_resize: false,
        }
    }
}

/// Progress reporting and cooperative cancellation, passed per-call rather
/// than stored globally so one `Renderer` can serve multiple concurrent
/// callers with independent abort flags.
#[derive(Clone, Default)]
pub struct Callbacks {
    abort: Arc<AtomicBool>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort_flag(&self) -> Arc<AtomicBool> {
        self.abort.clone()
    }

    pub fn request_abort(&self) {
        self.abort.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_pick_up_available_parallelism() {
        let cfg = RendererConfig::default();
        assert!(cfg.thread_count >= 1);
        assert_eq!(cfg.num_channels, 3);
    }

    #[test]
    fn abort_flag_is_shared_with_clones() {
        let callbacks = Callbacks::new();
        let flag = callbacks.abort_flag();
        assert!(!callbacks.is_aborted());
        callbacks.request_abort();
        assert!(callbacks.is_aborted());
        assert!(flag.load(Ordering::Relaxed));
    }
}
