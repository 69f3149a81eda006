// Copyright (c) the Flame Core Contributors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::collections::TryReserveError;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("out of memory: {0}")]
    OutOfMemory(#[from] TryReserveError),
    #[error("image size too large: {0}x{1}")]
    ImageSizeTooLarge(usize, usize),
    #[error("invalid image size: {0}x{1}")]
    InvalidImageSize(usize, usize),
    #[error("rect out of bounds: {0}x{1}+{2}+{3} rect in {4}x{5} view")]
    RectOutOfBounds(usize, usize, usize, usize, usize, usize),
    #[error("arithmetic overflow computing {0}")]
    ArithmeticOverflow(&'static str),
    #[error("affine matrix is singular, cannot invert")]
    SingularAffine,
    #[error("flame has no non-final xforms")]
    NoXforms,
    #[error("xaos row length {0} does not match xform count {1}")]
    XaosRowLengthMismatch(usize, usize),
    #[error("spatial filter could not be built: {0}")]
    FilterCreationFailure(&'static str),
    #[error("density estimation filter could not be built: {0}")]
    DeFilterCreationFailure(&'static str),
    #[error("iterator setup failed: {0}")]
    IteratorSetupFailure(&'static str),
    #[error("iteration produced zero samples")]
    ZeroIterations,
    #[error("thread count must be at least 1")]
    InvalidThreadCount,
    #[error("strips are incompatible with temporal_samples > 1")]
    StripsIncompatibleWithTemporalSamples,
    #[error("KeepIterating requires a prior render that reached AccumDone with a higher quality")]
    KeepIteratingWithoutPriorRender,
}

pub type Result<T> = std::result::Result<T, Error>;
