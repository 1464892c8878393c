//! Exponent extraction, strategy selection, grouping, and run-encoding.
//!
//! Mirrors the reference encoder's `process_exponents` pipeline: extract a
//! per-coefficient exponent for every block, pick the strategy (REUSE /
//! D15 / D25 / D45) for each six-block run that minimizes reconstruction
//! error, then group and differentially constrain the chosen exponents so
//! the decoder can losslessly reconstruct them from far fewer bits than
//! 256 raw 5-bit values.

use crate::tables;

/// Number of blocks per frame; exponent strategy runs are chosen over this window.
pub const BLOCKS_PER_FRAME: usize = 6;

/// Number of transform coefficients per channel per block.
pub const MAX_COEFS: usize = 256;

/// Per-block, per-channel exponent coding strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpStrategy {
    /// Reuse the previous block's exponents for this channel; costs no bits.
    Reuse,
    /// Full resolution: one exponent per coefficient.
    D15,
    /// Exponents shared in pairs.
    D25,
    /// Exponents shared in quads.
    D45,
}

impl ExpStrategy {
    /// Number of raw coefficients each exponent in this strategy covers.
    pub fn group_size(self) -> usize {
        match self {
            ExpStrategy::Reuse | ExpStrategy::D15 => 1,
            ExpStrategy::D25 => 2,
            ExpStrategy::D45 => 4,
        }
    }

    /// 2-bit `exps` field value written to the bitstream.
    pub fn code(self) -> u8 {
        match self {
            ExpStrategy::Reuse => 0,
            ExpStrategy::D15 => 1,
            ExpStrategy::D25 => 2,
            ExpStrategy::D45 => 3,
        }
    }

    fn derived_table_index(self) -> Option<usize> {
        match self {
            ExpStrategy::Reuse => None,
            ExpStrategy::D15 => Some(0),
            ExpStrategy::D25 => Some(1),
            ExpStrategy::D45 => Some(2),
        }
    }
}

/// Number of 7-bit group codes a non-REUSE strategy needs to cover
/// `ncoefs` coefficients, matching the derived `exp_group_bits` table's
/// underlying `ngrps` computation.
fn num_group_codes(strategy: ExpStrategy, ncoefs: usize) -> usize {
    let grpsize = if strategy == ExpStrategy::D45 { 4 } else { strategy.group_size() };
    if ncoefs == 7 {
        2
    } else {
        (ncoefs + grpsize * 3 - 4) / (3 * grpsize)
    }
}

/// Bit cost of a non-REUSE strategy over `ncoefs` coefficients (`4 + 7*ngroups`).
pub fn strategy_bit_cost(strategy: ExpStrategy, ncoefs: usize) -> u32 {
    match strategy.derived_table_index() {
        None => 0,
        Some(idx) => tables::derived().exp_group_bits[idx][ncoefs.min(255)],
    }
}

/// The 32 predefined six-block strategy-run patterns. Row `r`'s bit `k`
/// (0-indexed from the low bit, `k` in 0..5) is 1 when block `k+1` starts a
/// new run (gets a fresh, non-REUSE strategy) and 0 when it reuses the
/// previous block's strategy. Row 0 (no bits set) is therefore the
/// degenerate all-REUSE-after-block-0 pattern named in the data model
/// invariants; block 0 itself is never REUSE in any row. Runs of length 1
/// use D15 (full resolution), length 2 use D25, length 3+ use D45 — the
/// natural choice since longer-reused runs amortize coarser grouping over
/// more blocks.
pub fn strategy_table() -> [[ExpStrategy; BLOCKS_PER_FRAME]; 32] {
    let mut table = [[ExpStrategy::Reuse; BLOCKS_PER_FRAME]; 32];
    for (row, pattern) in table.iter_mut().enumerate() {
        let mut starts = vec![0usize];
        for k in 0..5 {
            if (row >> k) & 1 == 1 {
                starts.push(k + 1);
            }
        }
        starts.push(BLOCKS_PER_FRAME);
        for w in starts.windows(2) {
            let (start, end) = (w[0], w[1]);
            let len = end - start;
            let strategy = match len {
                1 => ExpStrategy::D15,
                2 => ExpStrategy::D25,
                _ => ExpStrategy::D45,
            };
            pattern[start] = strategy;
            for b in (start + 1)..end {
                pattern[b] = ExpStrategy::Reuse;
            }
        }
    }
    table
}

/// Converts one coefficient magnitude into an A/52 exponent (0..=24): the
/// number of bits of headroom before the magnitude's leading 1, clamped to
/// the range `psdtab` covers. Larger exponents mean quieter coefficients.
pub fn extract_exponent(coef: f64) -> u8 {
    let mag = coef.abs();
    if mag <= 0.0 {
        return 24;
    }
    let e = (-mag.log2()).floor();
    if e < 0.0 {
        0
    } else if e > 24.0 {
        24
    } else {
        e as u8
    }
}

/// Extracts per-coefficient exponents for one channel's block. Bins past
/// `ncoefs` are left at the maximum exponent (silence) since the MDCT
/// already zeroes those coefficients.
pub fn extract_block_exponents(coefs: &[f64], ncoefs: usize) -> [u8; MAX_COEFS] {
    let mut exp = [24u8; MAX_COEFS];
    for (i, slot) in exp.iter_mut().enumerate().take(ncoefs.min(coefs.len())) {
        *slot = extract_exponent(coefs[i]);
    }
    exp
}

/// The final, decoder-reconstructable exponent set for one run of blocks
/// sharing a single non-REUSE strategy, plus the 7-bit group codes to pack
/// into the bitstream.
#[derive(Debug, Clone)]
pub struct EncodedRun {
    /// Per-coefficient exponents after grouping and delta-constraint, shared
    /// by every block in the run.
    pub exponents: [u8; MAX_COEFS],
    /// Differential group codes (each 0..125) ready for 7-bit packing.
    pub group_codes: Vec<u16>,
}

/// Encodes one exponent run: takes the elementwise minimum of `raw` blocks'
/// exponents, groups per `strategy`, constrains adjacent slot deltas to
/// `[-2, 2]`, and expands back to per-coefficient resolution.
pub fn encode_run(raw: &[[u8; MAX_COEFS]], ncoefs: usize, strategy: ExpStrategy) -> EncodedRun {
    debug_assert_ne!(strategy, ExpStrategy::Reuse);
    let mut combined = [24u8; MAX_COEFS];
    for block in raw {
        for i in 0..ncoefs.min(MAX_COEFS) {
            combined[i] = combined[i].min(block[i]);
        }
    }
    combined[0] = combined[0].min(15);

    let grpsize = strategy.group_size();
    let num_codes = num_group_codes(strategy, ncoefs);
    let num_slots = num_codes * 3;

    // slots[0] is the DC exponent; slots[1..=num_slots] are the grouped values.
    let mut slots = vec![combined[0]; num_slots + 1];
    for (s, slot) in slots.iter_mut().enumerate().skip(1) {
        let base = 1 + (s - 1) * grpsize;
        let mut m = 24u8;
        for j in 0..grpsize {
            let idx = base + j;
            if idx < ncoefs.min(MAX_COEFS) {
                m = m.min(combined[idx]);
            }
        }
        *slot = m;
    }

    for i in 1..=num_slots {
        slots[i] = slots[i].min(slots[i - 1].saturating_add(2));
    }
    for i in (0..num_slots).rev() {
        slots[i] = slots[i].min(slots[i + 1].saturating_add(2));
    }

    let mut exponents = [24u8; MAX_COEFS];
    exponents[0] = slots[0];
    for s in 1..=num_slots {
        let base = 1 + (s - 1) * grpsize;
        for j in 0..grpsize {
            let idx = base + j;
            if idx < MAX_COEFS {
                exponents[idx] = slots[s];
            }
        }
    }
    for idx in ncoefs.min(MAX_COEFS)..MAX_COEFS {
        exponents[idx] = 24;
    }

    let mut group_codes = Vec::with_capacity(num_codes);
    for c in 0..num_codes {
        let e0 = slots[c * 3] as i32;
        let e1 = slots[c * 3 + 1] as i32;
        let e2 = slots[c * 3 + 2] as i32;
        let e3 = slots[c * 3 + 3] as i32;
        let d1 = (e1 - e0 + 2).clamp(0, 4);
        let d2 = (e2 - e0 + 2).clamp(0, 4);
        let d3 = (e3 - e0 + 2).clamp(0, 4);
        group_codes.push((d1 * 25 + d2 * 5 + d3) as u16);
    }

    EncodedRun {
        exponents,
        group_codes,
    }
}

fn sum_squared_error(encoded: &[u8; MAX_COEFS], raw: &[u8; MAX_COEFS], ncoefs: usize) -> u64 {
    let mut err = 0u64;
    for i in 0..ncoefs.min(MAX_COEFS) {
        let d = encoded[i] as i64 - raw[i] as i64;
        err += (d * d) as u64;
    }
    err
}

/// Same 32 run-length patterns as [`strategy_table`], but with every
/// non-REUSE entry forced to D15: the LFE channel's `lfeexpstr` field is a
/// single bit (reuse or not), so D25/D45 are never legal choices for it.
pub fn lfe_strategy_table() -> [[ExpStrategy; BLOCKS_PER_FRAME]; 32] {
    let mut table = strategy_table();
    for pattern in table.iter_mut() {
        for s in pattern.iter_mut() {
            if *s != ExpStrategy::Reuse {
                *s = ExpStrategy::D15;
            }
        }
    }
    table
}

fn select_strategy_row_from(
    table: &[[ExpStrategy; BLOCKS_PER_FRAME]; 32],
    raw: &[[u8; MAX_COEFS]; BLOCKS_PER_FRAME],
    ncoefs: usize,
    fast: bool,
) -> (usize, [ExpStrategy; BLOCKS_PER_FRAME]) {
    let candidate_rows: Box<dyn Iterator<Item = usize>> =
        if fast { Box::new(1..7) } else { Box::new(1..32) };

    let mut best_row = 1;
    let mut best_cost = u64::MAX;

    for row in candidate_rows {
        let pattern = table[row];
        let mut cost = 0u64;
        let mut run_start = 0usize;
        for b in 1..=BLOCKS_PER_FRAME {
            if b == BLOCKS_PER_FRAME || pattern[b] != ExpStrategy::Reuse {
                let run_blocks = &raw[run_start..b];
                let strategy = pattern[run_start];
                let encoded = encode_run(run_blocks, ncoefs, strategy);
                for blk in run_blocks {
                    cost += sum_squared_error(&encoded.exponents, blk, ncoefs);
                }
                run_start = b;
            }
        }
        if cost < best_cost {
            best_cost = cost;
            best_row = row;
        }
    }

    (best_row, table[best_row])
}

/// Picks the best strategy row for a channel across its 6-block window,
/// minimizing total reconstruction squared error. Searches all 32 rows
/// (excluding the degenerate all-REUSE row 0) when `fast` is false, or only
/// the first 6 rows when `fast` is true.
pub fn select_strategy_row(
    raw: &[[u8; MAX_COEFS]; BLOCKS_PER_FRAME],
    ncoefs: usize,
    fast: bool,
) -> (usize, [ExpStrategy; BLOCKS_PER_FRAME]) {
    select_strategy_row_from(&strategy_table(), raw, ncoefs, fast)
}

/// Same search as [`select_strategy_row`], restricted to [`lfe_strategy_table`]
/// so the returned pattern only ever uses REUSE or D15.
pub fn select_lfe_strategy_row(
    raw: &[[u8; MAX_COEFS]; BLOCKS_PER_FRAME],
    ncoefs: usize,
    fast: bool,
) -> (usize, [ExpStrategy; BLOCKS_PER_FRAME]) {
    select_strategy_row_from(&lfe_strategy_table(), raw, ncoefs, fast)
}
