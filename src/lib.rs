//! A/52 (ATSC AC-3) perceptual audio encoder core.
//!
//! This crate implements the block/frame pipeline that turns PCM samples
//! into a compliant A/52 elementary bitstream: the MDCT analysis front end,
//! exponent coding, the psychoacoustic bit-allocation search, stereo
//! rematrixing, quantization, and constant/variable-rate frame packing.
//!
//! It is a core, not a full encoder binary: the PCM demultiplexer, WAVE
//! header parsing, and command-line front end are external collaborators
//! that hand this crate 1536-sample, channel-interleaved, A/52-ordered
//! frames through [`pcm`] and get back packed frames from [`Encoder`].
//!
//! ```no_run
//! use a52enc_core::{Encoder, EncoderConfig};
//!
//! let mut encoder = Encoder::new(EncoderConfig::new()).unwrap();
//! let silence = vec![vec![0.0f32; 1536]; 2];
//! let frame = encoder.encode_frame(silence).unwrap();
//! assert!(!frame.is_empty());
//! ```

pub mod bitalloc;
pub mod bitstream;
pub mod capability;
pub mod config;
pub mod drc;
pub mod dsp;
pub mod encoder;
pub mod error;
pub mod exponent;
pub mod frame;
pub mod pcm;
pub mod psychoacoustic;
pub mod quantize;
pub mod rematrix;
pub mod scheduler;
pub mod tables;

pub use capability::Capability;
pub use config::{BandwidthPolicy, ChannelMode, DrcProfile, EncoderConfig, Metadata, RateControl, SurroundMode};
pub use encoder::Encoder;
pub use error::{EncoderError, Result};
pub use pcm::{SampleFormat, SAMPLES_PER_FRAME};

/// Crate version, for diagnostics and stream-metadata logging.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initializes process-wide lazy state (lookup tables, DSP capability
/// detection) ahead of time. [`Encoder::new`] does this automatically; call
/// this directly only to pay that one-time cost before constructing the
/// first encoder, e.g. during application startup.
pub fn init() {
    tables::init();
    capability::init();
    tracing::info!(version = VERSION, "a52enc_core initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init();
        init();
    }

    #[test]
    fn version_is_non_empty() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn public_api_encodes_a_silent_stereo_frame() {
        let mut encoder = Encoder::new(EncoderConfig::new()).unwrap();
        let silence = vec![vec![0.0f32; SAMPLES_PER_FRAME]; 2];
        let frame = encoder.encode_frame(silence).unwrap();
        assert!(!frame.is_empty());
    }
}
