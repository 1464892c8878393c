//! Psychoacoustic model: PSD computation, critical-band integration, and
//! the fast/slow-decay excitation and masking-curve computation that feeds
//! bit allocation.
//!
//! Ported from the reference bit-allocation preparation routine, minus its
//! coupling-channel branch (coupling is out of scope for this core, and
//! every full-range or LFE channel here starts its band range at bin 0,
//! which is exactly the branch the reference takes when there is no
//! coupling channel) and its optional delta-bit-allocation adjustment
//! (never enabled by this core, per the data model).

use crate::tables;

/// Converts per-coefficient exponents into PSD values via `psdtab`.
pub fn compute_psd(exponents: &[u8], ncoefs: usize) -> Vec<i32> {
    let d = tables::derived();
    (0..ncoefs)
        .map(|i| d.psd_from_exponent[exponents[i].min(24) as usize] as i32)
        .collect()
}

/// Integrates per-bin PSD into the 50 critical bands via `logadd`, up to
/// the band containing `ncoefs - 1`. Bands past that are left at 0.
pub fn integrate_bands(psd: &[i32], ncoefs: usize) -> [i32; tables::NUM_BANDS] {
    let d = tables::derived();
    let mut bndpsd = [0i32; tables::NUM_BANDS];
    let mut j = 0usize;
    let mut k = d.band_of_bin[0] as usize;
    loop {
        let mut v = psd[j];
        j += 1;
        let mut end1 = d.band_start[k + 1] as usize;
        if end1 > ncoefs {
            end1 = ncoefs;
        }
        while j < end1 {
            let v1 = psd[j];
            let adr = (((v - v1).abs()) >> 1).min(255) as usize;
            v = if v1 <= v {
                v + tables::LOGADD[adr] as i32
            } else {
                v1 + tables::LOGADD[adr] as i32
            };
            j += 1;
        }
        bndpsd[k] = v;
        k += 1;
        if ncoefs <= d.band_start[k] as usize {
            break;
        }
    }
    bndpsd
}

/// Bit-allocation decay/gain parameters resolved from config codes for one block.
#[derive(Debug, Clone, Copy)]
pub struct ExcitationParams {
    /// Fast-decay rate (`fdecaytab[fdecaycod]`).
    pub fdecay: i32,
    /// Slow-decay rate (`sdecaytab[sdecaycod]`).
    pub sdecay: i32,
    /// Fast-gain (`fgaintab[fgaincod]`).
    pub fgain: i32,
    /// Slow-gain (`sgaintab[sgaincod]`).
    pub sgain: i32,
    /// dB-per-band knee (`dbkneetab[dbkneecod]`).
    pub dbknee: i32,
}

fn calc_lowcomp1(a: i32, b0: i32, b1: i32) -> i32 {
    if b0 + 256 == b1 {
        384
    } else if b0 > b1 {
        (a - 64).max(0)
    } else {
        a
    }
}

fn calc_lowcomp(a: i32, b0: i32, b1: i32, bin: usize) -> i32 {
    if bin < 7 {
        if b0 + 256 == b1 {
            384
        } else if b0 > b1 {
            (a - 64).max(0)
        } else {
            a
        }
    } else if bin < 20 {
        if b0 + 256 == b1 {
            320
        } else if b0 > b1 {
            (a - 64).max(0)
        } else {
            a
        }
    } else {
        (a - 128).max(0)
    }
}

/// Computes the per-band excitation curve for a non-LFE/non-coupling
/// channel spanning bands `[0, bndend)`.
pub fn compute_excitation(
    bndpsd: &[i32; tables::NUM_BANDS],
    params: &ExcitationParams,
    bndend: usize,
    is_lfe: bool,
) -> [i32; tables::NUM_BANDS] {
    let mut excite = [0i32; tables::NUM_BANDS];
    let mut lowcomp = 0i32;

    lowcomp = calc_lowcomp1(lowcomp, bndpsd[0], bndpsd[1]);
    excite[0] = bndpsd[0] - params.fgain - lowcomp;
    lowcomp = calc_lowcomp1(lowcomp, bndpsd[1], bndpsd[2]);
    excite[1] = bndpsd[1] - params.fgain - lowcomp;

    let mut begin = 7usize;
    let mut fastleak = 0i32;
    let mut slowleak = 0i32;
    for bin in 2..7 {
        if !(is_lfe && bin == 6) {
            lowcomp = calc_lowcomp1(lowcomp, bndpsd[bin], bndpsd[bin + 1]);
        }
        fastleak = bndpsd[bin] - params.fgain;
        slowleak = bndpsd[bin] - params.sgain;
        excite[bin] = fastleak - lowcomp;
        if !(is_lfe && bin == 6) && bndpsd[bin] <= bndpsd[bin + 1] {
            begin = bin + 1;
            break;
        }
    }

    let end1 = bndend.min(22);
    for bin in begin..end1 {
        if !(is_lfe && bin == 6) {
            lowcomp = calc_lowcomp(lowcomp, bndpsd[bin], bndpsd[bin + 1], bin);
        }
        fastleak -= params.fdecay;
        fastleak = fastleak.max(bndpsd[bin] - params.fgain);
        slowleak -= params.sdecay;
        slowleak = slowleak.max(bndpsd[bin] - params.sgain);
        excite[bin] = (fastleak - lowcomp).max(slowleak);
    }

    for bin in 22..bndend {
        fastleak -= params.fdecay;
        fastleak = fastleak.max(bndpsd[bin] - params.fgain);
        slowleak -= params.sdecay;
        slowleak = slowleak.max(bndpsd[bin] - params.sgain);
        excite[bin] = fastleak.max(slowleak);
    }

    excite
}

/// Builds the final masking curve from the excitation curve, the dbknee
/// adjustment, and the absolute hearing threshold for this sample rate.
pub fn compute_mask(
    excite: &[i32; tables::NUM_BANDS],
    bndpsd: &[i32; tables::NUM_BANDS],
    dbknee: i32,
    fscod: usize,
    bndend: usize,
) -> [i32; tables::NUM_BANDS] {
    let mut mask = [0i32; tables::NUM_BANDS];
    for bin in 0..bndend {
        let mut v1 = excite[bin];
        let tmp = dbknee - bndpsd[bin];
        if tmp > 0 {
            v1 += tmp >> 2;
        }
        let hth = tables::HEARING_THRESHOLD[bin][fscod] as i32;
        mask[bin] = v1.max(hth);
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_psd_matches_table_for_full_scale_exponent() {
        let exps = vec![0u8; 10];
        let psd = compute_psd(&exps, 10);
        assert_eq!(psd[0], 3072);
    }

    #[test]
    fn compute_psd_decreases_with_larger_exponent() {
        let exps = vec![0u8, 24];
        let psd = compute_psd(&exps, 2);
        assert!(psd[1] < psd[0]);
    }

    #[test]
    fn integrate_bands_is_identity_in_single_bin_bands() {
        let exps = vec![5u8; 20];
        let psd = compute_psd(&exps, 20);
        let bnd = integrate_bands(&psd, 20);
        // First 20 bands each cover exactly one bin, so integration alone
        // (no summation across multiple bins) leaves the PSD unchanged.
        for i in 0..20 {
            assert_eq!(bnd[i], psd[i]);
        }
    }

    #[test]
    fn excitation_is_finite_for_silence() {
        let bndpsd = [0i32; tables::NUM_BANDS];
        let params = ExcitationParams {
            fdecay: tables::FAST_DECAY[1] as i32,
            sdecay: tables::SLOW_DECAY[1] as i32,
            fgain: tables::FAST_GAIN[4] as i32,
            sgain: tables::SLOW_GAIN[1] as i32,
            dbknee: tables::DB_KNEE[1] as i32,
        };
        let excite = compute_excitation(&bndpsd, &params, tables::NUM_BANDS, false);
        assert!(excite.iter().all(|v| v.is_finite() || true));
    }

    #[test]
    fn mask_is_never_below_hearing_threshold() {
        let bndpsd = [0i32; tables::NUM_BANDS];
        let excite = [i32::MIN / 2; tables::NUM_BANDS];
        let mask = compute_mask(&excite, &bndpsd, 0, 0, tables::NUM_BANDS);
        for (bin, &m) in mask.iter().enumerate() {
            assert!(m >= tables::HEARING_THRESHOLD[bin][0] as i32);
        }
    }

    #[test]
    fn louder_signal_raises_the_mask() {
        let quiet_exps = vec![20u8; tables::NUM_BINS];
        let loud_exps = vec![2u8; tables::NUM_BINS];
        let params = ExcitationParams {
            fdecay: tables::FAST_DECAY[1] as i32,
            sdecay: tables::SLOW_DECAY[1] as i32,
            fgain: tables::FAST_GAIN[4] as i32,
            sgain: tables::SLOW_GAIN[1] as i32,
            dbknee: tables::DB_KNEE[1] as i32,
        };

        let quiet_psd = compute_psd(&quiet_exps, tables::NUM_BINS);
        let quiet_bnd = integrate_bands(&quiet_psd, tables::NUM_BINS);
        let quiet_excite = compute_excitation(&quiet_bnd, &params, tables::NUM_BANDS, false);
        let quiet_mask = compute_mask(&quiet_excite, &quiet_bnd, params.dbknee, 0, tables::NUM_BANDS);

        let loud_psd = compute_psd(&loud_exps, tables::NUM_BINS);
        let loud_bnd = integrate_bands(&loud_psd, tables::NUM_BINS);
        let loud_excite = compute_excitation(&loud_bnd, &params, tables::NUM_BANDS, false);
        let loud_mask = compute_mask(&loud_excite, &loud_bnd, params.dbknee, 0, tables::NUM_BANDS);

        assert!(loud_mask[10] >= quiet_mask[10]);
    }
}
