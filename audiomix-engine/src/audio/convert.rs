//! Device sample format conversion
//!
//! Stateless converters from the internal mix buffer to the device byte layout.
//! Integer formats clip (`x >= 1.0` to max, `x < -1.0` to min) and unsigned
//! formats are centred; see [`Sample`] for the quantizers. Byte order is applied
//! to the quantized value, so big-endian floats are the byte-swapped bit pattern.

use crate::audio::Sample;
use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Device sample formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    S8,
    U8,
    S16Lsb,
    S16Msb,
    U16Lsb,
    U16Msb,
    S32Lsb,
    S32Msb,
    F32Lsb,
    F32Msb,
}

impl SampleFormat {
    /// Signed 16-bit in host byte order
    pub const S16: SampleFormat = if cfg!(target_endian = "little") {
        SampleFormat::S16Lsb
    } else {
        SampleFormat::S16Msb
    };

    /// Unsigned 16-bit in host byte order
    pub const U16: SampleFormat = if cfg!(target_endian = "little") {
        SampleFormat::U16Lsb
    } else {
        SampleFormat::U16Msb
    };

    /// Signed 32-bit in host byte order
    pub const S32: SampleFormat = if cfg!(target_endian = "little") {
        SampleFormat::S32Lsb
    } else {
        SampleFormat::S32Msb
    };

    /// 32-bit float in host byte order
    pub const F32: SampleFormat = if cfg!(target_endian = "little") {
        SampleFormat::F32Lsb
    } else {
        SampleFormat::F32Msb
    };

    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleFormat::S8 | SampleFormat::U8 => 1,
            SampleFormat::S16Lsb
            | SampleFormat::S16Msb
            | SampleFormat::U16Lsb
            | SampleFormat::U16Msb => 2,
            SampleFormat::S32Lsb
            | SampleFormat::S32Msb
            | SampleFormat::F32Lsb
            | SampleFormat::F32Msb => 4,
        }
    }

    pub fn bits(&self) -> u32 {
        self.bytes_per_sample() as u32 * 8
    }

    pub fn is_float(&self) -> bool {
        matches!(self, SampleFormat::F32Lsb | SampleFormat::F32Msb)
    }

    /// Config name
    pub fn name(&self) -> &'static str {
        match self {
            SampleFormat::S8 => "s8",
            SampleFormat::U8 => "u8",
            SampleFormat::S16Lsb => "s16lsb",
            SampleFormat::S16Msb => "s16msb",
            SampleFormat::U16Lsb => "u16lsb",
            SampleFormat::U16Msb => "u16msb",
            SampleFormat::S32Lsb => "s32lsb",
            SampleFormat::S32Msb => "s32msb",
            SampleFormat::F32Lsb => "f32lsb",
            SampleFormat::F32Msb => "f32msb",
        }
    }
}

impl FromStr for SampleFormat {
    type Err = Error;

    /// Parse a config name. Names without a byte-order suffix mean host order.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "s8" => Ok(SampleFormat::S8),
            "u8" => Ok(SampleFormat::U8),
            "s16" => Ok(SampleFormat::S16),
            "s16lsb" => Ok(SampleFormat::S16Lsb),
            "s16msb" => Ok(SampleFormat::S16Msb),
            "u16" => Ok(SampleFormat::U16),
            "u16lsb" => Ok(SampleFormat::U16Lsb),
            "u16msb" => Ok(SampleFormat::U16Msb),
            "s32" => Ok(SampleFormat::S32),
            "s32lsb" => Ok(SampleFormat::S32Lsb),
            "s32msb" => Ok(SampleFormat::S32Msb),
            "f32" => Ok(SampleFormat::F32),
            "f32lsb" => Ok(SampleFormat::F32Lsb),
            "f32msb" => Ok(SampleFormat::F32Msb),
            other => Err(Error::UnsupportedFormat(format!(
                "Unknown sample format: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Converts internal samples into device bytes.
///
/// `dst` must hold `src.len() * bytes_per_sample` bytes; excess on either side
/// is left untouched.
pub type ConverterFn<S> = fn(&mut [u8], &[S]);

/// Look up the converter for `format`.
pub fn converter_for<S: Sample>(format: SampleFormat) -> ConverterFn<S> {
    match format {
        SampleFormat::S8 => to_s8::<S>,
        SampleFormat::U8 => to_u8::<S>,
        SampleFormat::S16Lsb => to_s16_lsb::<S>,
        SampleFormat::S16Msb => to_s16_msb::<S>,
        SampleFormat::U16Lsb => to_u16_lsb::<S>,
        SampleFormat::U16Msb => to_u16_msb::<S>,
        SampleFormat::S32Lsb => to_s32_lsb::<S>,
        SampleFormat::S32Msb => to_s32_msb::<S>,
        SampleFormat::F32Lsb => to_f32_lsb::<S>,
        SampleFormat::F32Msb => to_f32_msb::<S>,
    }
}

fn write_samples<S: Sample, const N: usize>(dst: &mut [u8], src: &[S], encode: impl Fn(S) -> [u8; N]) {
    for (out, &sample) in dst.chunks_exact_mut(N).zip(src) {
        out.copy_from_slice(&encode(sample));
    }
}

fn to_s8<S: Sample>(dst: &mut [u8], src: &[S]) {
    write_samples(dst, src, |s| s.to_i8().to_ne_bytes())
}

fn to_u8<S: Sample>(dst: &mut [u8], src: &[S]) {
    write_samples(dst, src, |s| [s.to_u8()])
}

fn to_s16_lsb<S: Sample>(dst: &mut [u8], src: &[S]) {
    write_samples(dst, src, |s| s.to_i16().to_le_bytes())
}

fn to_s16_msb<S: Sample>(dst: &mut [u8], src: &[S]) {
    write_samples(dst, src, |s| s.to_i16().to_be_bytes())
}

fn to_u16_lsb<S: Sample>(dst: &mut [u8], src: &[S]) {
    write_samples(dst, src, |s| s.to_u16().to_le_bytes())
}

fn to_u16_msb<S: Sample>(dst: &mut [u8], src: &[S]) {
    write_samples(dst, src, |s| s.to_u16().to_be_bytes())
}

fn to_s32_lsb<S: Sample>(dst: &mut [u8], src: &[S]) {
    write_samples(dst, src, |s| s.to_i32().to_le_bytes())
}

fn to_s32_msb<S: Sample>(dst: &mut [u8], src: &[S]) {
    write_samples(dst, src, |s| s.to_i32().to_be_bytes())
}

fn to_f32_lsb<S: Sample>(dst: &mut [u8], src: &[S]) {
    write_samples(dst, src, |s| s.to_f32().to_le_bytes())
}

fn to_f32_msb<S: Sample>(dst: &mut [u8], src: &[S]) {
    write_samples(dst, src, |s| s.to_f32().to_be_bytes())
}
