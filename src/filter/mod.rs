// Copyright (c) the Flame Core Contributors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Spatial, temporal and density-estimation filtering applied between
//! histogram accumulation and the final color correction pass.

mod de;
mod spatial;
mod temporal;

pub use de::DeFilter;
pub use spatial::SpatialFilter;
pub use temporal::TemporalFilter;
