// Copyright (c) the Flame Core Contributors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

mod fast_math;
mod rational_poly;
mod vec_helpers;
mod xorshift;

pub use fast_math::fast_powf;
pub use rational_poly::eval_rational_poly;
pub use vec_helpers::try_with_capacity;
pub use xorshift::Xorshift128Plus;

/// Default tolerance used by `is_close` comparisons throughout the crate.
pub const CLOSE_EPSILON: f64 = 1e-6;

/// ULP-tolerant float comparison, used by the affine/palette round-trip invariants.
pub fn is_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= CLOSE_EPSILON * (1.0 + a.abs().max(b.abs()))
}
