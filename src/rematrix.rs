//! Stereo rematrixing: replaces L/R coefficients with sum/difference pairs
//! in bands where doing so concentrates more energy, improving coding
//! efficiency for mono-ish or out-of-phase stereo content. Only applies to
//! two-channel (`acmod=2`) streams.

/// The four fixed rematrix bands, as `[start, end)` transform-bin ranges.
/// Each is clipped to the channel's actual bandwidth (`ncoefs`) before use.
pub const REMATRIX_BANDS: [(usize, usize); 4] = [(13, 25), (25, 37), (37, 61), (61, 253)];

/// Per-block rematrix decision: whether each of the four bands was
/// recombined into (L+R)/2, (L-R)/2.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RematrixFlags(pub [bool; 4]);

/// Decides, for each band (clipped to `ncoefs`), whether to rematrix, and
/// applies the decision in place to `left`/`right`.
///
/// A band is rematrixed when `L^2 + R^2 >= (M^2 + S^2) / 2`, where
/// `M = (L+R)/2` and `S = (L-R)/2` — i.e. when the sum/difference
/// representation would not lose more energy to rounding than the direct
/// one.
pub fn rematrix_block(left: &mut [f64], right: &mut [f64], ncoefs: usize) -> RematrixFlags {
    let mut flags = RematrixFlags::default();
    for (band, &(start, end)) in REMATRIX_BANDS.iter().enumerate() {
        let end = end.min(ncoefs);
        if start >= end {
            continue;
        }
        let mut l2 = 0f64;
        let mut r2 = 0f64;
        let mut m2 = 0f64;
        let mut s2 = 0f64;
        for i in start..end {
            let l = left[i];
            let r = right[i];
            let m = (l + r) / 2.0;
            let s = (l - r) / 2.0;
            l2 += l * l;
            r2 += r * r;
            m2 += m * m;
            s2 += s * s;
        }
        if l2 + r2 >= (m2 + s2) / 2.0 {
            flags.0[band] = true;
            for i in start..end {
                let l = left[i];
                let r = right[i];
                left[i] = (l + r) / 2.0;
                right[i] = (l - r) / 2.0;
            }
        }
    }
    flags
}

/// `rematstr`: whether per-band flags are present in this block's header.
/// Always present for block 0; for later blocks, present only when the
/// flag set differs from the previous block's.
pub fn rematrix_strategy_present(is_first_block: bool, current: RematrixFlags, previous: RematrixFlags) -> bool {
    is_first_block || current != previous
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_l_and_r_always_rematrixes() {
        let mut left = vec![0.3f64; 253];
        let mut right = left.clone();
        let flags = rematrix_block(&mut left, &mut right, 253);
        assert!(flags.0.iter().all(|&f| f));
        // (L+R)/2 == L, (L-R)/2 == 0 when L == R.
        assert!(left[20].abs() > 0.0);
        assert!(right[20].abs() < 1e-12);
    }

    #[test]
    fn bands_are_clipped_to_ncoefs() {
        let mut left = vec![0.3f64; 253];
        let mut right = left.clone();
        let flags = rematrix_block(&mut left, &mut right, 40);
        // Only the first two bands fall (partly) within ncoefs=40.
        assert!(flags.0[2] || !flags.0[3]);
        assert!(!flags.0[3]);
    }

    #[test]
    fn out_of_phase_signal_does_not_rematrix() {
        let mut left = vec![0.3f64; 253];
        let mut right: Vec<f64> = left.iter().map(|&l| -l).collect();
        let flags = rematrix_block(&mut left, &mut right, 253);
        assert!(flags.0.iter().all(|&f| !f));
    }

    #[test]
    fn strategy_present_on_first_block() {
        let flags = RematrixFlags::default();
        assert!(rematrix_strategy_present(true, flags, flags));
    }

    #[test]
    fn strategy_present_only_on_change() {
        let a = RematrixFlags([true, false, false, false]);
        let b = RematrixFlags([true, false, false, false]);
        let c = RematrixFlags([true, true, false, false]);
        assert!(!rematrix_strategy_present(false, a, b));
        assert!(rematrix_strategy_present(false, c, b));
    }
}
