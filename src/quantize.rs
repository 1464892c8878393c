//! Coefficient quantization: symmetric (3/5/7/11/15-level) and asymmetric
//! (2^q-level) quantizers, and the mantissa-grouping scheme that packs
//! three 3-level, three 5-level, or two 11-level mantissas into single
//! 5-, 7-, or 7-bit codes.
//!
//! Ported arithmetic from the reference encoder's `quantize_mantissas`:
//! coefficients are treated as 24-bit fixed-point fractions (the same
//! representation the exponent/PSD pipeline implies, since an exponent `e`
//! means "the coefficient's leading 1 bit is `e` places below the binary
//! point") and the quantizer shifts by `24 - e` to read off the mantissa at
//! the resolution `bap` affords.

/// How one coefficient's quantized value is represented in the packed
/// bitstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MantissaCode {
    /// `bap = 0`: an exact zero, no mantissa bits transmitted.
    Zero,
    /// `bits` bits of `code`, written verbatim at this coefficient's position.
    Value { bits: u8, code: u32 },
    /// Folded into a preceding grouped [`MantissaCode::Value`]; this
    /// position contributes no bits of its own.
    Grouped,
}

impl MantissaCode {
    /// Bits this position actually contributes to the packed stream.
    pub fn bit_cost(self) -> u32 {
        match self {
            MantissaCode::Zero | MantissaCode::Grouped => 0,
            MantissaCode::Value { bits, .. } => u32::from(bits),
        }
    }
}

fn group_size(bap: u8) -> usize {
    match bap {
        1 | 2 => 3,
        4 => 2,
        _ => 1,
    }
}

fn group_bits(bap: u8) -> u32 {
    match bap {
        1 => 5,
        2 | 4 => 7,
        _ => mantissa_bits(bap),
    }
}

/// Mantissa bits a single coefficient with this `bap` costs when *not*
/// grouped (`bap` 0, 3, 5, and every asymmetric code 6..=15). For the
/// grouped codes (1, 2, 4) this is the per-coefficient amortized share used
/// by bit-allocation cost estimates; [`total_mantissa_bits`] accounts for
/// actual grouping exactly.
pub fn mantissa_bits(bap: u8) -> u32 {
    match bap {
        0 => 0,
        1 => 5,
        2 => 7,
        3 => 3,
        4 => 7,
        5..=13 => u32::from(bap - 1),
        14 => 14,
        15 => 16,
        _ => 0,
    }
}

fn run_length(bap: &[u8], start: usize, end: usize, value: u8) -> usize {
    let mut j = start;
    while j < end && bap[j] == value {
        j += 1;
    }
    j - start
}

/// Exact mantissa bit total for `bap[0..ncoefs]`, accounting for grouping:
/// every full run of same-`bap` grouped coefficients is billed in whole
/// groups (a trailing partial group still costs one full group's bits,
/// zero-padded, matching [`quantize_channel`]'s behavior at run boundaries).
pub fn total_mantissa_bits(bap: &[u8], ncoefs: usize) -> u32 {
    let mut bits = 0u32;
    let mut i = 0usize;
    while i < ncoefs {
        let b = bap[i];
        let run = run_length(bap, i, ncoefs, b);
        let gsize = group_size(b);
        let per_group = group_bits(b);
        if gsize > 1 {
            let full = run / gsize;
            let remainder = run % gsize;
            bits += full as u32 * per_group;
            if remainder > 0 {
                bits += per_group;
            }
        } else {
            bits += run as u32 * per_group;
        }
        i += run;
    }
    bits
}

fn to_fixed24(c: f64) -> i64 {
    (c * f64::from(1u32 << 24)).round() as i64
}

/// Symmetric quantizer on `levels` ∈ {3, 5, 7, 11, 15}:
/// `v = ((((levels*c) >> (24-e)) + 1) >> 1) + levels/2`, clipped to
/// `[0, levels-1]`.
pub fn quantize_symmetric(coef: f64, exp: u8, levels: u32) -> u32 {
    let c = to_fixed24(coef);
    let shift = 24i32 - i32::from(exp);
    let product = i64::from(levels) * c;
    let shifted = if shift >= 0 { product >> shift } else { product << (-shift) };
    let v = ((shifted + 1) >> 1) + i64::from(levels / 2);
    v.clamp(0, i64::from(levels) - 1) as u32
}

/// Asymmetric quantizer on `2^q` levels:
/// `v = clip(c * 2^(q-1+e-24), -2^(q-1), 2^(q-1)-1) & ((1<<q)-1)`.
pub fn quantize_asymmetric(coef: f64, exp: u8, q: u32) -> u32 {
    let c = to_fixed24(coef);
    let shift = i32::try_from(q).unwrap() - 1 + i32::from(exp) - 24;
    let scaled = if shift >= 0 { c << shift } else { c >> (-shift) };
    let half = 1i64 << (q - 1);
    let clipped = scaled.clamp(-half, half - 1);
    (clipped & ((1i64 << q) - 1)) as u32
}

fn quantize_one(coef: f64, exp: u8, bap: u8) -> u32 {
    match bap {
        0 => 0,
        1 => quantize_symmetric(coef, exp, 3),
        2 => quantize_symmetric(coef, exp, 5),
        3 => quantize_symmetric(coef, exp, 7),
        4 => quantize_symmetric(coef, exp, 11),
        5 => quantize_symmetric(coef, exp, 15),
        6..=15 => quantize_asymmetric(coef, exp, mantissa_bits(bap)),
        _ => 0,
    }
}

/// Quantizes every transmitted coefficient (`0..ncoefs`) of one channel's
/// block, grouping runs of `bap=1` (three 3-level values per 5-bit code),
/// `bap=2` (three 5-level values per 7-bit code), and `bap=4` (two 11-level
/// values per 7-bit code). A trailing partial group at a run boundary is
/// padded with the quantized value of an implicit zero coefficient so the
/// group code is still well-formed; only the in-range positions receive an
/// output entry.
pub fn quantize_channel(coefs: &[f64], bap: &[u8], exponents: &[u8], ncoefs: usize) -> Vec<MantissaCode> {
    let mut out = vec![MantissaCode::Zero; ncoefs];
    let mut i = 0usize;
    while i < ncoefs {
        let b = bap[i];
        if b == 0 {
            out[i] = MantissaCode::Zero;
            i += 1;
            continue;
        }
        let gsize = group_size(b);
        if gsize == 1 {
            out[i] = MantissaCode::Value {
                bits: group_bits(b) as u8,
                code: quantize_one(coefs[i], exponents[i], b),
            };
            i += 1;
            continue;
        }

        let run = run_length(bap, i, ncoefs, b);
        let levels = match b {
            1 => 3u32,
            2 => 5,
            _ => 11,
        };
        let mut j = 0usize;
        while j < run {
            let take = gsize.min(run - j);
            let mut vals = [levels / 2; 3];
            for (k, slot) in vals.iter_mut().enumerate().take(take) {
                *slot = quantize_one(coefs[i + j + k], exponents[i + j + k], b);
            }
            let code = match b {
                1 => 9 * vals[0] + 3 * vals[1] + vals[2],
                2 => 25 * vals[0] + 5 * vals[1] + vals[2],
                _ => 11 * vals[0] + vals[1],
            };
            out[i + j] = MantissaCode::Value { bits: group_bits(b) as u8, code };
            for k in 1..gsize {
                if j + k < run {
                    out[i + j + k] = MantissaCode::Grouped;
                }
            }
            j += gsize;
        }
        i += run;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_coefficient_quantizes_to_center_level() {
        assert_eq!(quantize_symmetric(0.0, 10, 15), 7);
        assert_eq!(quantize_symmetric(0.0, 10, 3), 1);
    }

    #[test]
    fn symmetric_output_is_within_level_range() {
        for &c in &[-1.0, -0.3, 0.0, 0.3, 0.999] {
            for &levels in &[3u32, 5, 7, 11, 15] {
                let v = quantize_symmetric(c, 0, levels);
                assert!(v < levels);
            }
        }
    }

    #[test]
    fn asymmetric_output_fits_in_q_bits() {
        for &c in &[-1.0, -0.3, 0.0, 0.3, 0.999] {
            for q in 5..=16u32 {
                let v = quantize_asymmetric(c, 2, q);
                assert!(v < (1u32 << q));
            }
        }
    }

    #[test]
    fn full_scale_positive_saturates_to_top_level() {
        assert_eq!(quantize_symmetric(0.999_999, 0, 15), 14);
    }

    #[test]
    fn bap_zero_costs_no_bits() {
        let bap = [0u8; 10];
        assert_eq!(total_mantissa_bits(&bap, 10), 0);
    }

    #[test]
    fn grouped_run_of_three_bap1_costs_one_five_bit_code() {
        let bap = [1u8; 3];
        assert_eq!(total_mantissa_bits(&bap, 3), 5);
    }

    #[test]
    fn trailing_partial_group_still_bills_a_full_group() {
        let bap = [1u8; 4]; // one full group of 3, one partial group of 1
        assert_eq!(total_mantissa_bits(&bap, 4), 10);
    }

    #[test]
    fn ungrouped_bap3_costs_three_bits_each() {
        let bap = [3u8; 5];
        assert_eq!(total_mantissa_bits(&bap, 5), 15);
    }

    #[test]
    fn quantize_channel_matches_total_mantissa_bits() {
        let ncoefs = 9;
        let bap = [1u8, 1, 1, 2, 2, 2, 4, 4, 6];
        let coefs = [0.1f64, -0.2, 0.05, 0.3, -0.1, 0.2, 0.4, -0.4, 0.15];
        let exps = [5u8; 9];
        let out = quantize_channel(&coefs, &bap, &exps, ncoefs);
        let bits: u32 = out.iter().map(|m| m.bit_cost()).sum();
        assert_eq!(bits, total_mantissa_bits(&bap, ncoefs));
    }

    #[test]
    fn grouped_followers_emit_nothing() {
        let ncoefs = 3;
        let bap = [1u8; 3];
        let coefs = [0.0f64; 3];
        let exps = [0u8; 3];
        let out = quantize_channel(&coefs, &bap, &exps, ncoefs);
        assert!(matches!(out[0], MantissaCode::Value { .. }));
        assert_eq!(out[1], MantissaCode::Grouped);
        assert_eq!(out[2], MantissaCode::Grouped);
    }

    #[test]
    fn five_bit_group_code_is_in_range() {
        let ncoefs = 3;
        let bap = [1u8; 3];
        let coefs = [0.9f64, 0.9, 0.9];
        let exps = [0u8; 3];
        let out = quantize_channel(&coefs, &bap, &exps, ncoefs);
        if let MantissaCode::Value { code, bits } = out[0] {
            assert_eq!(bits, 5);
            assert!(code < 32);
        } else {
            panic!("expected grouped value");
        }
    }
}
