//! Internal sample types
//!
//! The whole pipeline (decoders, resampler, processors, mixer) is generic over
//! [`Sample`]. Two representations are provided:
//! - `f32`: nominal range [-1.0, 1.0), clipped only when converted for the device
//! - `i32`: full-scale signed integers, saturating on overflow
//!
//! The `to_*` quantizers produce the device-side integer value for each bit depth.
//! Unsigned variants are centred (silence = half range).

use std::fmt::Debug;

/// Internal sample representation
pub trait Sample: Copy + Default + PartialEq + Debug + Send + Sync + 'static {
    /// Silence value
    const SILENCE: Self;

    /// Convert from a nominal [-1.0, 1.0] float
    fn from_f32(value: f32) -> Self;

    /// Convert to a nominal [-1.0, 1.0] float
    fn to_f32(self) -> f32;

    /// Scale by `gain`
    fn amplify(self, gain: f32) -> Self;

    /// Sum of two samples
    fn mix(self, other: Self) -> Self;

    /// `a/2 + b/2`
    fn average(a: Self, b: Self) -> Self;

    /// Linear interpolation between `a` and `b` at `frac` (0.0 to 1.0)
    fn lerp(a: Self, b: Self, frac: f64) -> Self;

    fn to_i8(self) -> i8;
    fn to_u8(self) -> u8;
    fn to_i16(self) -> i16;
    fn to_u16(self) -> u16;
    fn to_i32(self) -> i32;
}

/// Quantize a float sample into a `bits`-wide integer range.
///
/// `x >= 1.0` maps to the maximum, `x < -1.0` to the minimum, everything else
/// scales linearly (truncating toward zero). Unsigned ranges are offset by half.
fn float_to_int(x: f32, bits: u32, signed: bool) -> i64 {
    let half = (1i64 << (bits - 1)) as f64;
    let (min, max) = if signed {
        (-(1i64 << (bits - 1)), (1i64 << (bits - 1)) - 1)
    } else {
        (0, (1i64 << bits) - 1)
    };

    if x >= 1.0 {
        max
    } else if x < -1.0 {
        min
    } else {
        let scaled = x as f64 * half + (half + min as f64);
        (scaled as i64).clamp(min, max)
    }
}

impl Sample for f32 {
    const SILENCE: Self = 0.0;

    fn from_f32(value: f32) -> Self {
        value
    }

    fn to_f32(self) -> f32 {
        self
    }

    fn amplify(self, gain: f32) -> Self {
        self * gain
    }

    fn mix(self, other: Self) -> Self {
        self + other
    }

    fn average(a: Self, b: Self) -> Self {
        a / 2.0 + b / 2.0
    }

    fn lerp(a: Self, b: Self, frac: f64) -> Self {
        a + (b - a) * frac as f32
    }

    fn to_i8(self) -> i8 {
        float_to_int(self, 8, true) as i8
    }

    fn to_u8(self) -> u8 {
        float_to_int(self, 8, false) as u8
    }

    fn to_i16(self) -> i16 {
        float_to_int(self, 16, true) as i16
    }

    fn to_u16(self) -> u16 {
        float_to_int(self, 16, false) as u16
    }

    fn to_i32(self) -> i32 {
        float_to_int(self, 32, true) as i32
    }
}

const I32_SCALE: f32 = 2_147_483_648.0;

impl Sample for i32 {
    const SILENCE: Self = 0;

    fn from_f32(value: f32) -> Self {
        float_to_int(value, 32, true) as i32
    }

    fn to_f32(self) -> f32 {
        self as f32 / I32_SCALE
    }

    fn amplify(self, gain: f32) -> Self {
        // `as` saturates at the i32 bounds
        (self as f64 * gain as f64) as i32
    }

    fn mix(self, other: Self) -> Self {
        self.saturating_add(other)
    }

    fn average(a: Self, b: Self) -> Self {
        a / 2 + b / 2
    }

    fn lerp(a: Self, b: Self, frac: f64) -> Self {
        (a as f64 + (b as f64 - a as f64) * frac).round() as i32
    }

    fn to_i8(self) -> i8 {
        (self >> 24) as i8
    }

    fn to_u8(self) -> u8 {
        ((self >> 24) as i8 as u8) ^ 0x80
    }

    fn to_i16(self) -> i16 {
        (self >> 16) as i16
    }

    fn to_u16(self) -> u16 {
        ((self >> 16) as i16 as u16) ^ 0x8000
    }

    fn to_i32(self) -> i32 {
        self
    }
}
