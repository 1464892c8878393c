//! Bit allocation: converts a channel's PSD and masking curve into per-bin
//! `bap` (bit-allocation pointer) values, then searches for the `snroffset`
//! that spends the frame's bit budget (CBR) or hits a target quality level
//! (VBR) as closely as possible without exceeding it.
//!
//! Mirrors the reference encoder's two-stage design: `compute_bap` is the
//! cheap, deterministic per-bin lookup (`baptab[clip((psd-mask)>>5, 0, 63)]`);
//! everything above it is the iterative search that calls it repeatedly at
//! different `snroffset` values, binary-searching on total bit cost the way
//! the reference's `snroffst` search loop does.

use crate::error::{EncoderError, Result};
use crate::exponent::{self, ExpStrategy};
use crate::quantize;
use crate::tables::{self, BAP_POINTER, NUM_BANDS};

/// Legal range of the transmitted `csnroffst` field (6 bits).
const CSNROFFST_RANGE: i32 = 64;
/// Legal range of the transmitted `fsnroffst` field (4 bits).
const FSNROFFST_RANGE: i32 = 16;

/// Smallest and largest combined `snroffset_value` the `(csnroffst,
/// fsnroffst)` domain can produce, i.e. at `(0,0)` and `(63,15)`.
const V_MIN: i32 = (0 - 15) * 16;
const V_MAX: i32 = (CSNROFFST_RANGE - 1 - 15) * 16 + (FSNROFFST_RANGE - 1);

/// Computes `snroffset = ((csnroffst - 15) * 16 + fsnroffst) * 4`, the full
/// signed adjustment applied to the masking curve before bap lookup.
fn snroffset_value(csnroffst: i32, fsnroffst: i32) -> i32 {
    ((csnroffst - 15) * 16 + fsnroffst) * 4
}

/// Decomposes a combined `snroffset` search value `v` (in `snroffset_value`'s
/// pre-`*4` domain, i.e. `v = (csnroffst-15)*16 + fsnroffst`) back into the
/// transmitted `csnroffst`/`fsnroffst` fields.
fn decompose(v: i32) -> (u8, u8) {
    let shifted = v - V_MIN;
    let csnroffst = (shifted / FSNROFFST_RANGE) as u8;
    let fsnroffst = (shifted % FSNROFFST_RANGE) as u8;
    (csnroffst, fsnroffst)
}

/// Per-bin bit-allocation pointers for one channel's block: looks up
/// `mask[band] - psd[bin]`, adjusted by `snroffset` and floored, in
/// [`BAP_POINTER`].
pub fn compute_bap(
    psd: &[i32],
    mask: &[i32; NUM_BANDS],
    band_of_bin: &[u8],
    snroffset: i32,
    floor: i32,
    ncoefs: usize,
) -> Vec<u8> {
    let mut bap = vec![0u8; ncoefs];
    for (j, slot) in bap.iter_mut().enumerate() {
        let band = band_of_bin[j] as usize;
        let masking = ((mask[band] - snroffset - floor).max(0) & 0x1FE0) + floor;
        let address = ((psd[j] - masking) / 32).clamp(0, 63) as usize;
        *slot = BAP_POINTER[address];
    }
    bap
}

/// One channel's inputs to a bit-allocation search: its per-bin PSD, its
/// masking curve, and its transmitted coefficient count.
pub struct ChannelAlloc<'a> {
    pub psd: &'a [i32],
    pub mask: &'a [i32; NUM_BANDS],
    pub ncoefs: usize,
}

/// `v` is the mixed-radix search variable `(csnroffst-15)*16 + fsnroffst`;
/// the actual `snroffset` handed to [`compute_bap`] is `v * 4`.
fn total_mantissa_bits_for(channels: &[ChannelAlloc], v: i32) -> (u32, Vec<Vec<u8>>) {
    let d = tables::derived();
    let snroffset = v * 4;
    let mut total = 0u32;
    let mut baps = Vec::with_capacity(channels.len());
    for ch in channels {
        let bap = compute_bap(ch.psd, ch.mask, &d.band_of_bin, snroffset, tables::FLOOR[6] as i32, ch.ncoefs);
        total += quantize::total_mantissa_bits(&bap, ch.ncoefs);
        baps.push(bap);
    }
    (total, baps)
}

/// Non-mantissa bits this frame will cost regardless of the bit-allocation
/// outcome: the fixed frame/block header overhead plus the exponent-coding
/// cost of every channel's chosen strategy run.
pub fn fixed_overhead_bits(
    header_bits: u32,
    strategies: &[(ExpStrategy, usize)],
) -> u32 {
    header_bits
        + strategies
            .iter()
            .map(|&(s, ncoefs)| exponent::strategy_bit_cost(s, ncoefs))
            .sum::<u32>()
}

/// Result of a CBR/VBR bit-allocation search: the chosen `snroffset`,
/// decomposed back into the transmitted `csnroffst`/`fsnroffst` header
/// fields, and the resulting per-channel `bap` arrays.
pub struct AllocResult {
    pub snroffset: i32,
    pub csnroffst: u8,
    pub fsnroffst: u8,
    pub bap: Vec<Vec<u8>>,
    pub mantissa_bits: u32,
}

fn result_at(channels: &[ChannelAlloc], v: i32) -> AllocResult {
    let (bits, bap) = total_mantissa_bits_for(channels, v);
    let (csnroffst, fsnroffst) = decompose(v);
    AllocResult { snroffset: v * 4, csnroffst, fsnroffst, bap, mantissa_bits: bits }
}

/// CBR search: finds the largest (loosest) `v` whose mantissa bit total
/// still fits within `budget_bits` after `fixed_bits` of known overhead is
/// subtracted. Lower `v` means a tighter mask (fewer bits spent); the search
/// binary-searches for the greediest offset that still fits, and reports
/// [`EncoderError::BudgetInfeasible`] if even the tightest legal offset
/// (`v = V_MIN`) doesn't fit.
pub fn search_cbr(channels: &[ChannelAlloc], fixed_bits: u32, budget_bits: u32) -> Result<AllocResult> {
    let available = budget_bits.saturating_sub(fixed_bits);

    let (tightest_bits, _) = total_mantissa_bits_for(channels, V_MIN);
    if tightest_bits > available {
        return Err(EncoderError::budget_infeasible(format!(
            "minimum-SNR allocation needs {tightest_bits} mantissa bits but only {available} are available"
        )));
    }

    let (loosest_bits, _) = total_mantissa_bits_for(channels, V_MAX);
    if loosest_bits <= available {
        return Ok(result_at(channels, V_MAX));
    }

    // Binary search for the largest v (in V_MIN..=V_MAX) whose bit cost is
    // still <= available; bit cost is monotonically non-decreasing in v.
    let mut lo = V_MIN;
    let mut hi = V_MAX;
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        let (bits, _) = total_mantissa_bits_for(channels, mid);
        if bits <= available {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }

    Ok(result_at(channels, lo))
}

/// VBR search: maps a 0..=1023 quality value onto an `snroffset` directly
/// (no bit-budget feedback), the same open-loop approach the reference
/// encoder's VBR mode uses. Quality 1023 maps to the loosest offset (most
/// bits spent everywhere allocation is legal); quality 0 maps to the
/// tightest.
pub fn search_vbr(channels: &[ChannelAlloc], quality: u16) -> AllocResult {
    let span = V_MAX - V_MIN;
    let q = i32::from(quality.min(1023));
    // Higher quality -> higher (looser) v.
    let v = V_MIN + (q * span) / 1023;
    result_at(channels, v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::NUM_BANDS;

    fn flat_mask(value: i32) -> [i32; NUM_BANDS] {
        [value; NUM_BANDS]
    }

    #[test]
    fn higher_snroffset_never_decreases_bap() {
        // A higher snroffset pushes the masking curve down toward floor,
        // which can only widen (psd - masking), never narrow it.
        let d = tables::derived();
        let psd = vec![1000i32; 50];
        let mask = flat_mask(500);
        let tight = compute_bap(&psd, &mask, &d.band_of_bin, -500, tables::FLOOR[6] as i32, 50);
        let loose = compute_bap(&psd, &mask, &d.band_of_bin, 500, tables::FLOOR[6] as i32, 50);
        let tight_sum: u32 = tight.iter().map(|&b| u32::from(b)).sum();
        let loose_sum: u32 = loose.iter().map(|&b| u32::from(b)).sum();
        assert!(loose_sum >= tight_sum);
    }

    #[test]
    fn silence_mask_well_above_psd_yields_zero_bap() {
        let d = tables::derived();
        let psd = vec![-1000i32; 50];
        let mask = flat_mask(4000);
        let bap = compute_bap(&psd, &mask, &d.band_of_bin, 0, tables::FLOOR[6] as i32, 50);
        assert!(bap.iter().all(|&b| b == 0));
    }

    #[test]
    fn cbr_search_never_exceeds_budget_when_feasible_offset_exists() {
        let psd = vec![1000i32; 60];
        let mask = flat_mask(500);
        let channels = [ChannelAlloc { psd: &psd, mask: &mask, ncoefs: 60 }];
        let result = search_cbr(&channels, 0, 200).unwrap();
        assert!(result.mantissa_bits <= 200);
    }

    #[test]
    fn vbr_higher_quality_spends_at_least_as_many_bits() {
        let psd = vec![1000i32; 60];
        let mask = flat_mask(500);
        let channels = [ChannelAlloc { psd: &psd, mask: &mask, ncoefs: 60 }];
        let low = search_vbr(&channels, 0);
        let high = search_vbr(&channels, 1023);
        assert!(high.mantissa_bits >= low.mantissa_bits);
    }

    #[test]
    fn snroffset_value_matches_formula() {
        assert_eq!(snroffset_value(15, 0), 0);
        assert_eq!(snroffset_value(15, 5), 20);
        assert_eq!(snroffset_value(16, 0), 64);
        assert_eq!(snroffset_value(0, 0), V_MIN * 4);
        assert_eq!(snroffset_value(63, 15), V_MAX * 4);
    }

    #[test]
    fn decompose_round_trips_through_snroffset_value() {
        for v in [V_MIN, V_MIN + 1, -1, 0, 1, V_MAX - 1, V_MAX] {
            let (csnroffst, fsnroffst) = decompose(v);
            assert!(csnroffst < 64);
            assert!(fsnroffst < 16);
            assert_eq!(snroffset_value(i32::from(csnroffst), i32::from(fsnroffst)), v * 4);
        }
    }

    #[test]
    fn fixed_overhead_sums_header_and_exponent_costs() {
        let strategies = [(ExpStrategy::D15, 253), (ExpStrategy::Reuse, 253)];
        let total = fixed_overhead_bits(100, &strategies);
        assert!(total >= 100);
    }
}
