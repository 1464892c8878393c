//! Dynamic-range control: derives the per-block 8-bit `dynrng` code from a
//! configured compression profile and the block's pre-filtered peak sample
//! magnitude.
//!
//! `dynrng` is purely a decoder-side playback hint (A/52 §7.6): it never
//! feeds back into bit allocation. Each profile other than [`DrcProfile::None`]
//! is a fixed single-knee compression curve — flat below the knee, a fixed
//! attenuation ratio above it — matching the shape (if not the exact
//! coefficients) of the profile tables a reference encoder selects from at
//! startup.

use crate::config::DrcProfile;

/// One knee-point compression curve: no attenuation below `knee_db`
/// (relative to full scale), `ratio` dB of gain reduction per dB of input
/// above the knee.
#[derive(Debug, Clone, Copy)]
struct Curve {
    knee_db: f32,
    ratio: f32,
    max_cut_db: f32,
}

fn curve_for(profile: DrcProfile) -> Option<Curve> {
    match profile {
        DrcProfile::FilmLight => Some(Curve { knee_db: -20.0, ratio: 0.25, max_cut_db: 6.0 }),
        DrcProfile::FilmStd => Some(Curve { knee_db: -20.0, ratio: 0.5, max_cut_db: 12.0 }),
        DrcProfile::MusicLight => Some(Curve { knee_db: -15.0, ratio: 0.2, max_cut_db: 6.0 }),
        DrcProfile::MusicStd => Some(Curve { knee_db: -15.0, ratio: 0.4, max_cut_db: 12.0 }),
        DrcProfile::Speech => Some(Curve { knee_db: -10.0, ratio: 0.6, max_cut_db: 18.0 }),
        DrcProfile::None => None,
    }
}

/// Converts a linear peak magnitude (0.0..=1.0) to full-scale dB, floored
/// well below audibility for silence.
fn peak_to_db(peak: f32) -> f32 {
    if peak <= 0.0 {
        -96.0
    } else {
        20.0 * peak.log10()
    }
}

/// Computes the 8-bit `dynrng` code (2's-complement, 1/4 dB steps, per A/52
/// §7.6.1) for one block from its pre-filtered peak sample magnitude.
///
/// `DrcProfile::None` always returns 0 (no compression signalled).
pub fn compute_dynrng(profile: DrcProfile, peak: f32) -> u8 {
    let Some(curve) = curve_for(profile) else {
        return 0;
    };
    let peak_db = peak_to_db(peak.abs());
    let over = peak_db - curve.knee_db;
    let gain_db = if over > 0.0 {
        -(over * curve.ratio).min(curve.max_cut_db)
    } else {
        0.0
    };
    let quarter_db = (gain_db * 4.0).round().clamp(-128.0, 127.0);
    (quarter_db as i32 as i8) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_profile_always_emits_zero() {
        assert_eq!(compute_dynrng(DrcProfile::None, 1.0), 0);
        assert_eq!(compute_dynrng(DrcProfile::None, 0.0), 0);
    }

    #[test]
    fn silence_under_knee_is_uncompressed() {
        assert_eq!(compute_dynrng(DrcProfile::FilmStd, 0.0), 0);
    }

    #[test]
    fn loud_peak_is_attenuated() {
        let code = compute_dynrng(DrcProfile::FilmStd, 1.0);
        // Negative in two's complement (attenuation, not boost).
        assert!((code as i8) < 0);
    }

    #[test]
    fn heavier_profile_cuts_more_than_lighter_at_same_peak() {
        let light = compute_dynrng(DrcProfile::FilmLight, 1.0) as i8;
        let std_ = compute_dynrng(DrcProfile::FilmStd, 1.0) as i8;
        assert!(std_ <= light);
    }

    #[test]
    fn cut_is_bounded_by_max_cut() {
        let code = compute_dynrng(DrcProfile::Speech, 1.0) as i8;
        // max_cut_db=18 -> -72 quarter-dB steps.
        assert!(code as i32 >= -72);
    }
}
