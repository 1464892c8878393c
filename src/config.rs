//! Encoder configuration.
//!
//! `EncoderConfig` follows the builder pattern used throughout this crate's
//! other codec configs: a `new()`/`default()` constructor with reasonable
//! defaults, a chain of `with_*` methods each returning `Self`, and a
//! `validate()` that turns out-of-range fields into [`EncoderError`]s before
//! the encoder ever touches them.

use crate::capability::Capability;
use crate::error::{EncoderError, Result};
use crate::tables::{BITRATES_KBPS, SAMPLE_RATES};

/// Channel mode (`acmod`), selecting the front/surround channel layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    /// 1+1, dual mono.
    DualMono,
    /// 1/0, mono (center only).
    Mono,
    /// 2/0, stereo.
    Stereo,
    /// 3/0, L C R.
    Mode3_0,
    /// 2/1, L R + single surround.
    Mode2_1,
    /// 3/1, L C R + single surround.
    Mode3_1,
    /// 2/2, L R + two surrounds.
    Mode2_2,
    /// 3/2, L C R + two surrounds.
    Mode3_2,
}

impl ChannelMode {
    /// The `acmod` field value (0..=7).
    pub fn acmod(self) -> u8 {
        match self {
            ChannelMode::DualMono => 0,
            ChannelMode::Mono => 1,
            ChannelMode::Stereo => 2,
            ChannelMode::Mode3_0 => 3,
            ChannelMode::Mode2_1 => 4,
            ChannelMode::Mode3_1 => 5,
            ChannelMode::Mode2_2 => 6,
            ChannelMode::Mode3_2 => 7,
        }
    }

    /// Number of full-range channels this mode carries (excludes LFE).
    pub fn full_range_channels(self) -> u8 {
        match self {
            ChannelMode::DualMono => 2,
            ChannelMode::Mono => 1,
            ChannelMode::Stereo => 2,
            ChannelMode::Mode3_0 => 3,
            ChannelMode::Mode2_1 => 3,
            ChannelMode::Mode3_1 => 4,
            ChannelMode::Mode2_2 => 4,
            ChannelMode::Mode3_2 => 5,
        }
    }

    /// Whether this mode is eligible for stereo rematrixing (acmod=2 only).
    pub fn supports_rematrix(self) -> bool {
        matches!(self, ChannelMode::Stereo)
    }
}

/// Target bitrate/quality mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateControl {
    /// Constant bitrate in kbps. Must be one of the 19 legal A/52 bitrates.
    Cbr(u16),
    /// Variable bitrate, quality 0..=1023 (higher is better).
    Vbr(u16),
}

/// Bandwidth selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandwidthPolicy {
    /// Fixed bandwidth code 0..=60.
    Fixed(u8),
    /// Re-derive a bandwidth code once per stream from signal content.
    AdaptivePerStream,
    /// Re-derive a bandwidth code every frame.
    AdaptivePerFrame,
}

/// Dynamic-range-control profile. See `crate::drc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrcProfile {
    /// Film, light compression.
    FilmLight,
    /// Film, standard compression.
    FilmStd,
    /// Music, light compression.
    MusicLight,
    /// Music, standard compression.
    MusicStd,
    /// Speech compression curve.
    Speech,
    /// No compression; `dynrng` is always signalled as 0.
    #[default]
    None,
}

/// Surround downmix mode (`dsurmod`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurroundMode {
    /// Not indicated.
    #[default]
    NotIndicated,
    /// Dolby Surround encoded.
    DolbySurround,
    /// Not Dolby Surround encoded.
    NotDolbySurround,
}

/// Bitstream metadata fields carried through to the frame header, largely
/// advisory to the decoder and not used by the core DSP pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metadata {
    /// Dialog normalization, 1..=31 (A/52 encodes 0 as "not indicated" -> 31).
    pub dialnorm: u8,
    /// Downmix mode, 0..=2.
    pub dmixmod: u8,
    /// Center mix level, 0..=2.
    pub center_mix_level: u8,
    /// Surround mix level, 0..=2.
    pub surround_mix_level: u8,
    /// Surround mode (`dsurmod`).
    pub dsurmod: SurroundMode,
    /// Extended bitstream info 1 present.
    pub xbsi1_enabled: bool,
    /// Extended bitstream info 2 present.
    pub xbsi2_enabled: bool,
    /// `dsurexmod`, 0..=2. Only meaningful when `xbsi2_enabled`.
    pub dsurexmod: u8,
    /// `dheadphon`, 0..=2. Only meaningful when `xbsi2_enabled`.
    pub dheadphon: u8,
    /// `adconvtyp`, 0..=1. Only meaningful when `xbsi2_enabled`.
    pub adconvtyp: u8,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            dialnorm: 31,
            dmixmod: 0,
            center_mix_level: 0,
            surround_mix_level: 0,
            dsurmod: SurroundMode::default(),
            xbsi1_enabled: false,
            xbsi2_enabled: false,
            dsurexmod: 0,
            dheadphon: 0,
            adconvtyp: 0,
        }
    }
}

/// Encoder configuration, immutable once handed to [`crate::encoder::Encoder::new`].
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Channel layout.
    pub channel_mode: ChannelMode,
    /// Whether an LFE channel is present.
    pub lfe: bool,
    /// Sample rate in Hz. Must be one of {48000, 44100, 32000} possibly
    /// halved or quartered (`halfratecod`); only the un-halved set is
    /// currently accepted (quarter-rate is a decoder-side concept).
    pub sample_rate: u32,
    /// Bitstream ID. 8 for the baseline A/52 format this core targets.
    pub bsid: u8,
    /// Rate control mode.
    pub rate_control: RateControl,
    /// Bandwidth selection policy.
    pub bandwidth: BandwidthPolicy,
    /// Enable stereo rematrixing (only takes effect for `ChannelMode::Stereo`).
    pub rematrix: bool,
    /// Enable block switching (transient-adaptive short blocks).
    pub block_switching: bool,
    /// Enable the DC-removal one-pole high-pass pre-filter.
    pub dc_filter: bool,
    /// Enable the bandwidth-limiting low-pass pre-filter.
    pub bandwidth_filter: bool,
    /// Enable the LFE 120 Hz low-pass pre-filter.
    pub lfe_filter: bool,
    /// Use the 6-row fast exponent-strategy search instead of all 32 rows.
    pub fast_exponent_strategy: bool,
    /// Use the fast bit-allocation search heuristic.
    pub fast_bit_allocation: bool,
    /// Dynamic-range-control profile.
    pub drc_profile: DrcProfile,
    /// Bitstream metadata.
    pub metadata: Metadata,
    /// Worker thread count. 0 selects serial (single-threaded) mode.
    pub threads: usize,
    /// Force a specific DSP capability, bypassing auto-detection. Mainly
    /// useful for testing the scalar path deterministically.
    pub capability_override: Option<Capability>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            channel_mode: ChannelMode::Stereo,
            lfe: false,
            sample_rate: 48_000,
            bsid: 8,
            rate_control: RateControl::Cbr(192),
            bandwidth: BandwidthPolicy::AdaptivePerStream,
            rematrix: true,
            block_switching: true,
            dc_filter: true,
            bandwidth_filter: true,
            lfe_filter: true,
            fast_exponent_strategy: false,
            fast_bit_allocation: false,
            drc_profile: DrcProfile::FilmStd,
            metadata: Metadata::default(),
            threads: 0,
            capability_override: None,
        }
    }
}

impl EncoderConfig {
    /// Start from the default stereo, 48 kHz, 192 kbps CBR configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the channel mode.
    pub fn with_channel_mode(mut self, mode: ChannelMode) -> Self {
        self.channel_mode = mode;
        self
    }

    /// Enable or disable the LFE channel.
    pub fn with_lfe(mut self, lfe: bool) -> Self {
        self.lfe = lfe;
        self
    }

    /// Set the sample rate in Hz.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Set constant-bitrate mode at the given kbps.
    pub fn with_cbr(mut self, kbps: u16) -> Self {
        self.rate_control = RateControl::Cbr(kbps);
        self
    }

    /// Set variable-bitrate mode at the given quality (0..=1023).
    pub fn with_vbr(mut self, quality: u16) -> Self {
        self.rate_control = RateControl::Vbr(quality);
        self
    }

    /// Set the bandwidth policy.
    pub fn with_bandwidth(mut self, policy: BandwidthPolicy) -> Self {
        self.bandwidth = policy;
        self
    }

    /// Enable or disable stereo rematrixing.
    pub fn with_rematrix(mut self, enabled: bool) -> Self {
        self.rematrix = enabled;
        self
    }

    /// Enable or disable block switching.
    pub fn with_block_switching(mut self, enabled: bool) -> Self {
        self.block_switching = enabled;
        self
    }

    /// Set the DRC profile.
    pub fn with_drc_profile(mut self, profile: DrcProfile) -> Self {
        self.drc_profile = profile;
        self
    }

    /// Set the bitstream metadata.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Set the worker thread count (0 = serial).
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Force a specific DSP capability.
    pub fn with_capability_override(mut self, capability: Capability) -> Self {
        self.capability_override = Some(capability);
        self
    }

    /// `fscod`: index into [`SAMPLE_RATES`] for this config's sample rate.
    pub fn fscod(&self) -> Result<u8> {
        SAMPLE_RATES
            .iter()
            .position(|&r| r == self.sample_rate)
            .map(|p| p as u8)
            .ok_or_else(|| {
                EncoderError::config_invalid(format!(
                    "unsupported sample rate {} Hz, expected one of {:?}",
                    self.sample_rate, SAMPLE_RATES
                ))
            })
    }

    /// Total channel count including LFE.
    pub fn total_channels(&self) -> u8 {
        self.channel_mode.full_range_channels() + u8::from(self.lfe)
    }

    /// Validate every field, returning the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        self.fscod()?;

        if self.bsid > 8 {
            return Err(EncoderError::config_invalid(format!(
                "bsid {} is out of range (expected <= 8 for this core)",
                self.bsid
            )));
        }

        match self.rate_control {
            RateControl::Cbr(kbps) => {
                if !BITRATES_KBPS.contains(&kbps) {
                    return Err(EncoderError::config_invalid(format!(
                        "bitrate {kbps} kbps is not a legal A/52 bitrate"
                    )));
                }
            }
            RateControl::Vbr(quality) => {
                if quality > 1023 {
                    return Err(EncoderError::config_invalid(format!(
                        "VBR quality {quality} exceeds the maximum of 1023"
                    )));
                }
            }
        }

        if let BandwidthPolicy::Fixed(code) = self.bandwidth {
            if code > 60 {
                return Err(EncoderError::config_invalid(format!(
                    "bandwidth code {code} exceeds the maximum of 60"
                )));
            }
        }

        if self.metadata.dialnorm == 0 || self.metadata.dialnorm > 31 {
            return Err(EncoderError::config_invalid(format!(
                "dialnorm {} must be in 1..=31",
                self.metadata.dialnorm
            )));
        }
        if self.metadata.center_mix_level > 2 || self.metadata.surround_mix_level > 2 {
            return Err(EncoderError::config_invalid(
                "center/surround mix level must be 0..=2",
            ));
        }
        if self.metadata.dmixmod > 2 {
            return Err(EncoderError::config_invalid("dmixmod must be 0..=2"));
        }

        if self.channel_mode.acmod() == 0 && self.rematrix {
            return Err(EncoderError::config_invalid(
                "rematrix requires stereo (acmod=2); dual-mono has no joint stereo pair",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(EncoderConfig::new().validate().is_ok());
    }

    #[test]
    fn rejects_unsupported_sample_rate() {
        let cfg = EncoderConfig::new().with_sample_rate(22_050);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_illegal_cbr_bitrate() {
        let cfg = EncoderConfig::new().with_cbr(100);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn accepts_legal_cbr_bitrate() {
        let cfg = EncoderConfig::new().with_cbr(192);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_vbr_quality_above_1023() {
        let cfg = EncoderConfig::new().with_vbr(2000);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn fscod_matches_sample_rate_table() {
        let cfg = EncoderConfig::new().with_sample_rate(44_100);
        assert_eq!(cfg.fscod().unwrap(), 1);
    }

    #[test]
    fn total_channels_includes_lfe() {
        let cfg = EncoderConfig::new()
            .with_channel_mode(ChannelMode::Mode3_2)
            .with_lfe(true);
        assert_eq!(cfg.total_channels(), 6);
    }

    #[test]
    fn rematrix_requires_stereo() {
        let cfg = EncoderConfig::new()
            .with_channel_mode(ChannelMode::DualMono)
            .with_rematrix(true);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn channel_mode_acmod_values_match_a52() {
        assert_eq!(ChannelMode::DualMono.acmod(), 0);
        assert_eq!(ChannelMode::Stereo.acmod(), 2);
        assert_eq!(ChannelMode::Mode3_2.acmod(), 7);
    }

    #[test]
    fn only_stereo_supports_rematrix() {
        assert!(ChannelMode::Stereo.supports_rematrix());
        assert!(!ChannelMode::Mode3_2.supports_rematrix());
    }
}
