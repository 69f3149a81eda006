// Copyright (c) the Flame Core Contributors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Splits the total iteration count across worker threads, optionally by
//! horizontal raster strip, and drives `iterate::run_batch` for each worker
//! in `sub_batch_size` chunks so progress and abort checks happen regularly
//! without locking the shared histogram on every single sample.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::RendererConfig;
use crate::error::{Error, Result};
use crate::flame::Flame;
use crate::iterate::{self, IterState, Sample, SelectionTables};
use crate::util::Xorshift128Plus;

/// One worker's share of the total sample budget, optionally restricted to
/// a horizontal slice of the output raster.
#[derive(Clone, Copy, Debug)]
pub struct WorkerPlan {
    pub worker_index: usize,
    pub sample_budget: usize,
    pub strip: Option<(usize, usize)>,
}

/// Divides `total_samples` as evenly as possible across `thread_count`
/// workers. `strips`, when `Some`, assigns each worker a disjoint
/// `[row_start, row_end)` band of the raster instead of letting every
/// worker's samples land anywhere; this is incompatible with
/// `temporal_samples > 1` because a strip boundary would otherwise cut a
/// moving point's trajectory across sub-frames inconsistently.
pub fn plan_workers(total_samples: usize, thread_count: usize, raster_height: usize, strips: bool, temporal_samples: usize) -> Result<Vec<WorkerPlan>> {
    if strips && temporal_samples > 1 {
        return Err(Error::StripsIncompatibleWithTemporalSamples);
    }
    let thread_count = thread_count.max(1);
    let base = total_samples / thread_count;
    let remainder = total_samples % thread_count;

    let strip_bounds: Vec<Option<(usize, usize)>> = if strips {
        let rows_per = raster_height / thread_count;
        let rem = raster_height % thread_count;
        let mut bounds = Vec::with_capacity(thread_count);
        let mut start = 0;
        for i in 0..thread_count {
            let extra = if i < rem { 1 } else { 0 };
            let end = start + rows_per + extra;
            bounds.push(Some((start, end)));
            start = end;
        }
        bounds
    } else {
        vec![None; thread_count]
    };

    Ok((0..thread_count)
        .map(|i| WorkerPlan {
            worker_index: i,
            sample_budget: base + if i < remainder { 1 } else { 0 },
            strip: strip_bounds[i],
        })
        .collect())
}

/// Runs every worker's plan to completion, handing each sub-batch of
/// surviving samples to `accumulate` (typically a histogram write guarded by
/// its own lock, see `render::Renderer`) and reporting progress after each
/// sub-batch. Stops early once `abort` is set.
///
/// With the `parallel` feature enabled, workers run on rayon's global pool
/// via `rayon::scope`, which load-balances workers with uneven sample
/// budgets (e.g. uneven strips) across however many threads are actually
/// configured in that pool. Without it, `std::thread::scope` spawns one OS
/// thread per worker directly, so a caller built without `rayon` still gets
/// real concurrency.
pub fn run_workers(
    flame: &Flame,
    config: &RendererConfig,
    plans: &[WorkerPlan],
    abort: &Arc<AtomicBool>,
    accumulate: impl Fn(usize, Option<(usize, usize)>, &[Sample]) + Sync,
    mut progress: impl FnMut(usize, usize) + Send,
) {
    let tables = SelectionTables::build(flame);
    let total: usize = plans.iter().map(|p| p.sample_budget).sum();
    let done = std::sync::atomic::AtomicUsize::new(0);
    let accumulate = &accumulate;
    let progress = Mutex::new(&mut progress);

    let run_one = |plan: &WorkerPlan| {
        let seed_base = plan.worker_index as u32;
        let rng = Xorshift128Plus::new_with_seeds(seed_base, seed_base.wrapping_mul(2), seed_base.wrapping_mul(3), seed_base.wrapping_mul(5));
        let mut state = IterState::new(rng);
        let mut remaining = plan.sample_budget;
        let mut batch = Vec::with_capacity(config.sub_batch_size.min(remaining.max(1)));
        while remaining > 0 && !abort.load(Ordering::Relaxed) {
            let chunk = remaining.min(config.sub_batch_size);
            batch.clear();
            iterate::run_batch(flame, &tables, &mut state, iterate::DEFAULT_FUSE, chunk, |sample| {
                batch.push(sample);
            });
            accumulate(plan.worker_index, plan.strip, &batch);
            remaining -= chunk;
            let now = done.fetch_add(chunk, Ordering::Relaxed) + chunk;
            if let Ok(mut cb) = progress.lock() {
                cb(now, total);
            }
        }
    };

    #[cfg(feature = "parallel")]
    {
        rayon::scope(|scope| {
            for plan in plans {
                let run_one = &run_one;
                scope.spawn(move |_| run_one(plan));
            }
        });
    }

    #[cfg(not(feature = "parallel"))]
    {
        std::thread::scope(|scope| {
            let run_one = &run_one;
            for plan in plans {
                scope.spawn(move || run_one(plan));
            }
        });
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn even_split_has_no_remainder_growth() {
        let plans = plan_workers(1000, 4, 100, false, 1).unwrap();
        assert_eq!(plans.iter().map(|p| p.sample_budget).sum::<usize>(), 1000);
        assert!(plans.iter().all(|p| p.sample_budget == 250));
    }

    #[test]
    fn uneven_split_distributes_remainder() {
        let plans = plan_workers(10, 3, 100, false, 1).unwrap();
        assert_eq!(plans.iter().map(|p| p.sample_budget).sum::<usize>(), 10);
    }

    #[test]
    fn strips_partition_raster_height_contiguously() {
        let plans = plan_workers(100, 4, 40, true, 1).unwrap();
        let mut rows_covered = 0;
        let mut last_end = 0;
        for p in &plans {
            let (start, end) = p.strip.unwrap();
            assert_eq!(start, last_end);
            rows_covered += end - start;
            last_end = end;
        }
        assert_eq!(rows_covered, 40);
    }

    #[test]
    fn strips_with_temporal_samples_is_rejected() {
        assert!(matches!(
            plan_workers(100, 4, 40, true, 2),
            Err(Error::StripsIncompatibleWithTemporalSamples)
        ));
    }
}
