//! Transient detection: decides per-block whether a channel should use a
//! short (transform-split) block instead of a long one.

/// Detects a transient in a 512-sample high-pass-filtered buffer using a
/// three-level peak-ratio cascade (2 halves, then 4 quarters, then 8
/// eighths), coarsest first.
pub struct TransientDetector;

const PEAK_FLOOR: f64 = 100.0 / 32_768.0;
const LEVEL1_RATIO: f64 = 0.100;
const LEVEL2_RATIO: f64 = 0.075;
const LEVEL3_RATIO: f64 = 0.050;

impl TransientDetector {
    /// Returns `true` (short block / `blksw=1`) if `samples` (exactly 512
    /// high-pass-filtered samples) shows a transient.
    pub fn detect(samples: &[f64; 512]) -> bool {
        let mut level1 = [0f64; 2];
        for (i, slot) in level1.iter_mut().enumerate() {
            *slot = samples[i * 256..i * 256 + 256]
                .iter()
                .fold(0f64, |acc, &s| acc.max(s.abs()));
        }
        if level1[0] < PEAK_FLOOR {
            return false;
        }
        if level1[1] * LEVEL1_RATIO > level1[0] {
            return true;
        }

        let mut level2 = [0f64; 4];
        for i in 1..4 {
            level2[i] = samples[i * 128..i * 128 + 128]
                .iter()
                .fold(0f64, |acc, &s| acc.max(s.abs()));
            if i > 1 && level2[i] * LEVEL2_RATIO > level2[i - 1] {
                return true;
            }
        }

        let mut level3 = [0f64; 8];
        for i in 3..8 {
            level3[i] = samples[i * 64..i * 64 + 64]
                .iter()
                .fold(0f64, |acc, &s| acc.max(s.abs()));
            if i > 3 && level3[i] * LEVEL3_RATIO > level3[i - 1] {
                return true;
            }
        }

        false
    }
}
