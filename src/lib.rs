// Copyright (c) the Flame Core Contributors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Core iterated-function-system fractal-flame rendering engine.
//!
//! Given a [`flame::Flame`] description, [`render::Renderer`] runs the
//! chaos-game iteration ([`iterate`]), bins samples into a histogram
//! ([`image`]), filters and color-corrects it ([`filter`], [`palette`]), and
//! packs the result into an interleaved output buffer.

pub mod affine;
pub mod camera;
pub mod config;
pub mod error;
pub mod filter;
pub mod flame;
pub mod image;
pub mod iterate;
pub mod log;
pub mod palette;
pub mod render;
pub mod scalar;
pub mod schedule;
pub mod util;
pub mod variation;
pub mod xform;

pub use config::{Callbacks, RendererConfig};
pub use error::{Error, Result};
pub use flame::Flame;
pub use render::{RunOutcome, Renderer};
