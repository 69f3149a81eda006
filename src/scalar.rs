// Copyright (c) the Flame Core Contributors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! The numeric type parameterizing [`crate::affine::Affine2D`] and the camera
//! math in [`crate::camera`].
//!
//! The reference renderer templates nearly everything on `float`/`double`;
//! doing the same in Rust via a bound on `num_traits::Float` lets
//! `Affine2D<f32>` serve GUI-drag-style code that wants single precision
//! while the render core (`flame`, `iterate`, `render`) stays on `f64`, which
//! is what the per-iteration warp math actually runs in.

use num_traits::Float;

pub trait Scalar: Float + std::fmt::Debug + Default + 'static {
    fn from_f64(v: f64) -> Self;
    fn to_f64(self) -> f64;
}

impl Scalar for f32 {
    #[inline]
    fn from_f64(v: f64) -> Self {
        v as f32
    }
    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl Scalar for f64 {
    #[inline]
    fn from_f64(v: f64) -> Self {
        v
    }
    #[inline]
    fn to_f64(self) -> f64 {
        self
    }
}
