//! PCM adaptation layer: the sample-format contract the encoder core
//! exposes to whatever supplies samples.
//!
//! The core itself never reads files or does channel remapping; a caller
//! hands it a [`ChannelBuffer`] already in A/52 channel order. This module
//! is only the pure, stateless conversion from a source numeric format into
//! the `f32` samples the DSP pipeline consumes.

use crate::error::{EncoderError, Result};

/// Exactly the number of samples per channel the core accepts per call.
pub const SAMPLES_PER_FRAME: usize = 1536;

/// Source numeric sample format, signalled once at encoder construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// Unsigned 8-bit PCM, centered on 128.
    U8,
    /// Signed 16-bit PCM.
    S16,
    /// Signed 20-bit PCM, stored in the low 20 bits of an `i32`.
    S20,
    /// Signed 24-bit PCM, stored in the low 24 bits of an `i32`.
    S24,
    /// Signed 32-bit PCM.
    S32,
    /// 32-bit float, nominal range [-1.0, 1.0].
    F32,
    /// 64-bit float, nominal range [-1.0, 1.0].
    F64,
}

impl SampleFormat {
    /// Converts one raw sample (widened to `i64`/bit pattern as needed) to
    /// `f32` in [-1.0, 1.0]. `raw` for `F32`/`F64` carries the bit pattern.
    fn convert_i32(self, raw: i32) -> f32 {
        match self {
            SampleFormat::U8 => (raw as f32 - 128.0) / 128.0,
            SampleFormat::S16 => raw as f32 / 32_768.0,
            SampleFormat::S20 => raw as f32 / 524_288.0,
            SampleFormat::S24 => raw as f32 / 8_388_608.0,
            SampleFormat::S32 => raw as f32 / 2_147_483_648.0,
            SampleFormat::F32 | SampleFormat::F64 => {
                unreachable!("float formats are converted via convert_f64")
            }
        }
    }

    fn convert_f64(self, raw: f64) -> f32 {
        raw as f32
    }
}

/// One channel's worth of samples, already converted to `f32`.
pub type ChannelBuffer = Vec<f32>;

/// Converts a single channel's raw `i32`-widened samples into a
/// [`ChannelBuffer`] of exactly [`SAMPLES_PER_FRAME`] `f32` samples.
///
/// Returns [`EncoderError::InputFormatMismatch`] if `raw.len() != SAMPLES_PER_FRAME`.
pub fn to_f32_frame(format: SampleFormat, raw: &[i32]) -> Result<ChannelBuffer> {
    if raw.len() != SAMPLES_PER_FRAME {
        return Err(EncoderError::InputFormatMismatch {
            expected: SAMPLES_PER_FRAME,
            actual: raw.len(),
        });
    }
    Ok(raw.iter().map(|&s| format.convert_i32(s)).collect())
}

/// Converts a single channel's raw `f64` samples (used for `F32`/`F64`
/// sources, which don't fit the integer path) into a [`ChannelBuffer`].
pub fn to_f32_frame_float(format: SampleFormat, raw: &[f64]) -> Result<ChannelBuffer> {
    debug_assert!(matches!(format, SampleFormat::F32 | SampleFormat::F64));
    if raw.len() != SAMPLES_PER_FRAME {
        return Err(EncoderError::InputFormatMismatch {
            expected: SAMPLES_PER_FRAME,
            actual: raw.len(),
        });
    }
    Ok(raw.iter().map(|&s| format.convert_f64(s)).collect())
}
