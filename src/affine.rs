// Copyright (c) the Flame Core Contributors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Column-wise 2x3 affine transform, generic over [`Scalar`].
//!
//! Layout matches the reference renderer: two columns of three rows each,
//! `x' = a*x + b*y + c`, `y' = d*x + e*y + f`. `a, d` is the X axis column,
//! `b, e` is the Y axis column, `c, f` is the translation.

use crate::error::{Error, Result};
use crate::scalar::Scalar;
use crate::util::is_close;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine2D<S: Scalar = f64> {
    pub a: S,
    pub b: S,
    pub c: S,
    pub d: S,
    pub e: S,
    pub f: S,
}

impl<S: Scalar> Default for Affine2D<S> {
    fn default() -> Self {
        Self::identity()
    }
}

impl<S: Scalar> Affine2D<S> {
    pub fn new(a: S, b: S, c: S, d: S, e: S, f: S) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn identity() -> Self {
        Self {
            a: S::one(),
            b: S::zero(),
            c: S::zero(),
            d: S::zero(),
            e: S::one(),
            f: S::zero(),
        }
    }

    pub fn is_identity(&self) -> bool {
        is_close(self.a.to_f64(), 1.0)
            && is_close(self.b.to_f64(), 0.0)
            && is_close(self.c.to_f64(), 0.0)
            && is_close(self.d.to_f64(), 0.0)
            && is_close(self.e.to_f64(), 1.0)
            && is_close(self.f.to_f64(), 0.0)
    }

    pub fn is_zero(&self) -> bool {
        is_close(self.a.to_f64(), 0.0)
            && is_close(self.b.to_f64(), 0.0)
            && is_close(self.c.to_f64(), 0.0)
            && is_close(self.d.to_f64(), 0.0)
            && is_close(self.e.to_f64(), 0.0)
            && is_close(self.f.to_f64(), 0.0)
    }

    /// X axis column `(a, d)`.
    pub fn x_axis(&self) -> (S, S) {
        (self.a, self.d)
    }

    /// Y axis column `(b, e)`.
    pub fn y_axis(&self) -> (S, S) {
        (self.b, self.e)
    }

    /// Translation column `(c, f)`.
    pub fn origin(&self) -> (S, S) {
        (self.c, self.f)
    }

    pub fn set_x_axis(&mut self, x: (S, S)) {
        self.a = x.0;
        self.d = x.1;
    }

    pub fn set_y_axis(&mut self, y: (S, S)) {
        self.b = y.0;
        self.e = y.1;
    }

    pub fn set_origin(&mut self, t: (S, S)) {
        self.c = t.0;
        self.f = t.1;
    }

    /// Applies the linear part only (no translation).
    #[inline]
    pub fn transform_normal(&self, v: (S, S)) -> (S, S) {
        (self.a * v.0 + self.b * v.1, self.d * v.0 + self.e * v.1)
    }

    /// Applies the full affine transform, including translation.
    #[inline]
    pub fn transform_vector(&self, v: (S, S)) -> (S, S) {
        (
            self.a * v.0 + self.b * v.1 + self.c,
            self.d * v.0 + self.e * v.1 + self.f,
        )
    }

    pub fn translate(&mut self, v: (S, S)) {
        self.c = self.c + v.0;
        self.f = self.f + v.1;
    }

    /// Rotates this affine around its origin by `angle_degrees`, preserving
    /// the translation column.
    pub fn rotate(&mut self, angle_degrees: S) {
        let theta = angle_degrees.to_f64().to_radians();
        let (sin, cos) = (theta.sin(), theta.cos());
        let (cos, sin) = (S::from_f64(cos), S::from_f64(sin));
        let new_a = self.a * cos + self.b * sin;
        let new_b = self.b * cos - self.a * sin;
        let new_d = self.d * cos + self.e * sin;
        let new_e = self.e * cos - self.d * sin;
        self.a = new_a;
        self.b = new_b;
        self.d = new_d;
        self.e = new_e;
    }

    pub fn determinant(&self) -> S {
        self.a * self.e - self.d * self.b
    }

    /// Inverts this affine. Fails when the linear part is singular.
    pub fn inverse(&self) -> Result<Self> {
        let det = self.determinant();
        if det.to_f64().abs() < f64::EPSILON {
            return Err(Error::SingularAffine);
        }
        Ok(Self {
            a: self.e / det,
            b: -self.b / det,
            c: (self.f * self.b - self.c * self.e) / det,
            d: -self.d / det,
            e: self.a / det,
            f: (self.c * self.d - self.f * self.a) / det,
        })
    }

    /// Computes the scalars `(a, c)` such that the 2x2 matrix `[[a, c], [-c, a]]`
    /// rotates and scales `from` onto `to`. Used by `rotate_scale_{x,y}_to`.
    fn calc_rsac(from: (S, S), to: (S, S)) -> (S, S) {
        let lsq = from.0 * from.0 + from.1 * from.1;
        let a = (from.1 * to.1 + from.0 * to.0) / lsq;
        let c = (from.0 * to.1 - from.1 * to.0) / lsq;
        (a, c)
    }

    fn calc_rotate_scale(from: (S, S), to: (S, S)) -> Self {
        let (a, c) = Self::calc_rsac(from, to);
        Self::new(a, c, S::zero(), -c, a, S::zero())
    }

    /// Rotates and scales both axes so that the current X axis lands on `target`.
    pub fn rotate_scale_x_to(&mut self, target: (S, S)) {
        let rs = Self::calc_rotate_scale(self.x_axis(), target);
        let new_x = rs.transform_normal(self.x_axis());
        let new_y = rs.transform_normal(self.y_axis());
        self.set_x_axis(new_x);
        self.set_y_axis(new_y);
    }

    /// Rotates and scales both axes so that the current Y axis lands on `target`.
    pub fn rotate_scale_y_to(&mut self, target: (S, S)) {
        let rs = Self::calc_rotate_scale(self.y_axis(), target);
        let new_x = rs.transform_normal(self.x_axis());
        let new_y = rs.transform_normal(self.y_axis());
        self.set_x_axis(new_x);
        self.set_y_axis(new_y);
    }

    pub fn is_close(&self, other: &Self) -> bool {
        is_close(self.a.to_f64(), other.a.to_f64())
            && is_close(self.b.to_f64(), other.b.to_f64())
            && is_close(self.c.to_f64(), other.c.to_f64())
            && is_close(self.d.to_f64(), other.d.to_f64())
            && is_close(self.e.to_f64(), other.e.to_f64())
            && is_close(self.f.to_f64(), other.f.to_f64())
    }
}
