// Copyright (c) the Flame Core Contributors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use criterion::{criterion_group, criterion_main, Criterion};

use flame_core::filter::DeFilter;

fn bench_de_filter(c: &mut Criterion) {
    let filter = DeFilter::new(0.0, 9.0, 0.6, 1).unwrap();
    c.bench_function("de_filter_splat_sparse", |b| {
        b.iter(|| {
            let mut sum = 0.0;
            filter.splat(0.0, |_, _, w| sum += w);
            sum
        });
    });
    c.bench_function("de_filter_splat_dense", |b| {
        b.iter(|| {
            let mut sum = 0.0;
            filter.splat(100.0, |_, _, w| sum += w);
            sum
        });
    });
}

criterion_group!(benches, bench_de_filter);
criterion_main!(benches);
