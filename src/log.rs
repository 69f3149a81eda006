// Copyright (c) the Flame Core Contributors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Thin re-export of the `tracing` macros used elsewhere in this crate.
//!
//! When the `tracing` feature is disabled these expand to no-ops, so the rest
//! of the crate never needs a `#[cfg(feature = "tracing")]` of its own.

#[cfg(feature = "tracing")]
pub use tracing::{debug, info, instrument, trace, warn};

#[cfg(not(feature = "tracing"))]
pub use crate::{no_op_debug as debug, no_op_info as info, no_op_trace as trace, no_op_warn as warn};

#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! no_op_info {
    ($($arg:tt)*) => {
        ()
    };
}
#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! no_op_warn {
    ($($arg:tt)*) => {
        ()
    };
}
#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! no_op_debug {
    ($($arg:tt)*) => {
        ()
    };
}
#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! no_op_trace {
    ($($arg:tt)*) => {
        ()
    };
}
