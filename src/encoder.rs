//! Top-level encoder: owns per-channel persistent DSP state and drives one
//! 1536-sample input frame through the full pipeline — pre-filters, block
//! splitting, windowing, MDCT, transient detection, rematrixing, exponent
//! extraction, the psychoacoustic model, bit allocation, quantization, and
//! bit-packing — producing one packed A/52 frame.

use crate::bitalloc::{self, ChannelAlloc};
use crate::bitstream::{BitSink, BitWriter};
use crate::capability::{self, Capability};
use crate::config::{BandwidthPolicy, ChannelMode, EncoderConfig, RateControl};
use crate::drc;
use crate::dsp::filter::{Biquad, ButterworthCascade, FilterType, OnePole};
use crate::dsp::window::{self, Mdct};
use crate::dsp::transient::TransientDetector;
use crate::error::{EncoderError, Result};
use crate::exponent::{self, EncodedRun, ExpStrategy, MAX_COEFS};
use crate::frame::{self, AllocParams, BlockRecord, FrameState, LfeRecord};
use crate::pcm::ChannelBuffer;
use crate::psychoacoustic::{self, ExcitationParams};
use crate::quantize::{self, MantissaCode};
use crate::rematrix::{self, RematrixFlags};
use crate::tables;

const TRANSIENT_HP_CUTOFF_HZ: f64 = 8_000.0;
const BANDWIDTH_FILTER_CUTOFF_HZ: f64 = 20_000.0;
const LFE_FILTER_CUTOFF_HZ: f64 = 120.0;
const DC_FILTER_CUTOFF_HZ: f64 = 3.0;

/// Persistent per-channel DSP state: filters with running history, the
/// 256-sample carry buffer bridging adjacent blocks, and the previous
/// block's exponents/rematrix flags needed to decide what the next block
/// must transmit.
struct ChannelState {
    dc_filter: Option<OnePole>,
    bandwidth_filter: Option<ButterworthCascade>,
    lfe_filter: Option<ButterworthCascade>,
    history: [f64; 256],
    is_lfe: bool,
}

impl ChannelState {
    fn new(sample_rate: f64, config: &EncoderConfig, is_lfe: bool) -> Result<Self> {
        let dc_filter = if config.dc_filter {
            Some(OnePole::new(FilterType::HighPass, DC_FILTER_CUTOFF_HZ, sample_rate)?)
        } else {
            None
        };
        let bandwidth_filter = if config.bandwidth_filter && !is_lfe {
            Some(ButterworthCascade::new(FilterType::LowPass, BANDWIDTH_FILTER_CUTOFF_HZ.min(sample_rate / 2.0 - 1.0), sample_rate)?)
        } else {
            None
        };
        let lfe_filter = if is_lfe && config.lfe_filter {
            Some(ButterworthCascade::new(FilterType::LowPass, LFE_FILTER_CUTOFF_HZ, sample_rate)?)
        } else {
            None
        };
        Ok(Self {
            dc_filter,
            bandwidth_filter,
            lfe_filter,
            history: [0.0; 256],
            is_lfe,
        })
    }

    /// Applies this channel's pre-filters to a full 1536-sample frame in place.
    fn prefilter(&mut self, samples: &mut [f64]) {
        if let Some(f) = &mut self.dc_filter {
            f.process(samples);
        }
        if let Some(f) = &mut self.bandwidth_filter {
            f.process(samples);
        }
        if let Some(f) = &mut self.lfe_filter {
            f.process(samples);
        }
    }
}

/// A complete A/52 perceptual audio encoder core.
///
/// Construct once per stream via [`Encoder::new`], then call
/// [`Encoder::encode_frame`] once per 1536-sample input frame (per channel,
/// in A/52 channel order, with LFE last if present).
pub struct Encoder {
    config: EncoderConfig,
    channels: Vec<ChannelState>,
    mdct512: Mdct,
    mdct256: Mdct,
    window: [f64; window::KBD_WINDOW_LEN],
    capability: Capability,
    frame_number: u64,
    prev_rematrix_flags: RematrixFlags,
    alloc_params: AllocParams,
    fscod: u8,
    /// Running remainder (in units of sample-rate Hz) for fractional CBR
    /// frame sizing: accumulates the numerator `kbps*96_000 % sample_rate`
    /// every frame and emits one extra word once it crosses `sample_rate`,
    /// the same Bresenham-style carry the reference encoder uses to average
    /// a non-integral words-per-frame bitrate exactly over time.
    frame_size_frac: u64,
}

impl Encoder {
    /// Validates `config` and builds a fresh encoder for a new stream.
    pub fn new(config: EncoderConfig) -> Result<Self> {
        config.validate()?;
        tables::init();
        capability::init();

        let sample_rate = f64::from(config.sample_rate);
        let nch = usize::from(config.channel_mode.full_range_channels());
        let mut channels = Vec::with_capacity(nch + usize::from(config.lfe));
        for _ in 0..nch {
            channels.push(ChannelState::new(sample_rate, &config, false)?);
        }
        if config.lfe {
            channels.push(ChannelState::new(sample_rate, &config, true)?);
        }

        let capability = capability::resolve(config.capability_override);
        let fscod = config.fscod()?;

        Ok(Self {
            mdct512: Mdct::new(512)?,
            mdct256: Mdct::new(256)?,
            window: window::default_window(),
            channels,
            capability,
            frame_number: 0,
            prev_rematrix_flags: RematrixFlags::default(),
            alloc_params: AllocParams::default(),
            fscod,
            frame_size_frac: 0,
            config,
        })
    }

    /// The DSP capability this encoder resolved to (scalar unless `simd` is
    /// enabled and the host supports it).
    pub fn capability(&self) -> Capability {
        self.capability
    }

    fn bandwidth_code(&self) -> u8 {
        match self.config.bandwidth {
            BandwidthPolicy::Fixed(code) => code,
            // Adaptive policies choose a code once per stream/frame from
            // signal content in the full encoder; this core's adaptive
            // modes fall back to the widest legal bandwidth, matching the
            // reference encoder's default when no content analysis pass
            // has been requested of it.
            BandwidthPolicy::AdaptivePerStream | BandwidthPolicy::AdaptivePerFrame => 60,
        }
    }

    /// CBR frame sizing: the nominal `frmsizecod` row plus a fractional-rate
    /// carry (needed at 44.1 kHz, where `kbps*96_000` doesn't divide evenly
    /// by the sample rate) that alternates in the padded row just often
    /// enough to average the exact non-integral words-per-frame count.
    fn cbr_frame_size_words(&mut self, kbps: u16) -> Result<(u32, u8)> {
        let d = tables::derived();
        let idx = tables::BITRATES_KBPS
            .iter()
            .position(|&b| b == kbps)
            .ok_or_else(|| EncoderError::config_invalid("bitrate not in legal table"))?;
        let freq = u64::from(self.config.sample_rate);
        let frac_num = (u64::from(kbps) * 96_000) % freq;
        self.frame_size_frac += frac_num;
        let extra = if self.frame_size_frac >= freq {
            self.frame_size_frac -= freq;
            1
        } else {
            0
        };
        let frmsizecod = (idx * 2 + extra) as u8;
        let bits = d.frame_size_bits[frmsizecod as usize][self.fscod as usize];
        Ok((bits / 16, frmsizecod))
    }

    /// VBR frame sizing: picks the smallest legal `frmsizecod` (0..=18, the
    /// range this encoder's VBR mode supports) whose frame capacity covers
    /// `required_bits` of actual content, so the header always declares a
    /// frame large enough to hold what was packed into it.
    fn vbr_frame_size_words(&self, required_bits: u32) -> (u32, u8) {
        let d = tables::derived();
        for idx in 0..=9usize {
            let frmsizecod = (idx * 2) as u8;
            let bits = d.frame_size_bits[frmsizecod as usize][self.fscod as usize];
            if bits >= required_bits {
                return (bits / 16, frmsizecod);
            }
        }
        let frmsizecod = 18u8;
        let bits = d.frame_size_bits[frmsizecod as usize][self.fscod as usize];
        (bits / 16, frmsizecod)
    }

    /// Encodes one 1536-sample-per-channel input frame into a packed A/52
    /// elementary-stream frame.
    pub fn encode_frame(&mut self, input: Vec<ChannelBuffer>) -> Result<Vec<u8>> {
        let nch_total = self.channels.len();
        if input.len() != nch_total {
            return Err(EncoderError::internal_error(format!(
                "expected {nch_total} channel buffers, got {}",
                input.len()
            )));
        }
        for buf in &input {
            if buf.len() != crate::pcm::SAMPLES_PER_FRAME {
                return Err(EncoderError::InputFormatMismatch {
                    expected: crate::pcm::SAMPLES_PER_FRAME,
                    actual: buf.len(),
                });
            }
        }

        let nch_full = usize::from(self.config.channel_mode.full_range_channels());
        let bwcode = self.bandwidth_code();
        let mut ncoefs = vec![frame::ncoefs(bwcode); nch_full];
        if self.config.lfe {
            ncoefs.push(frame::LFE_NCOEFS);
        }

        // Pre-filter each channel's whole 1536-sample frame and convert to f64.
        let mut filtered: Vec<Vec<f64>> = Vec::with_capacity(nch_total);
        for (ch, buf) in input.iter().enumerate() {
            let mut samples: Vec<f64> = buf.iter().map(|&s| f64::from(s)).collect();
            self.channels[ch].prefilter(&mut samples);
            filtered.push(samples);
        }

        // Per-block, per-channel raw MDCT coefficients and exponents, collected
        // across the six blocks so exponent strategy can be chosen per channel.
        let mut block_coefs: [Vec<Vec<f64>>; frame::BLOCKS_PER_FRAME] = std::array::from_fn(|_| Vec::new());
        let mut block_blksw: [Vec<bool>; frame::BLOCKS_PER_FRAME] = std::array::from_fn(|_| Vec::new());
        let mut raw_exponents: Vec<[[u8; MAX_COEFS]; frame::BLOCKS_PER_FRAME]> =
            vec![[[24u8; MAX_COEFS]; frame::BLOCKS_PER_FRAME]; nch_total];

        for block in 0..frame::BLOCKS_PER_FRAME {
            let mut coefs_this_block = Vec::with_capacity(nch_total);
            let mut blksw_this_block = Vec::with_capacity(nch_total);

            for ch in 0..nch_total {
                let new_samples = &filtered[ch][block * 256..block * 256 + 256];
                let mut analysis = [0.0f64; 512];
                analysis[0..256].copy_from_slice(&self.channels[ch].history);
                analysis[256..512].copy_from_slice(new_samples);

                let is_lfe = self.channels[ch].is_lfe;
                let blksw = self.config.block_switching
                    && !is_lfe
                    && {
                        let mut hp = Biquad::new_direct_form_i(FilterType::HighPass, TRANSIENT_HP_CUTOFF_HZ, f64::from(self.config.sample_rate))?;
                        let mut probe = analysis;
                        hp.process(&mut probe);
                        TransientDetector::detect(&probe)
                    };

                let mut windowed = analysis;
                window::apply_window(&self.window, &mut windowed);

                let mut coefs = if blksw {
                    self.mdct256.mdct256(&windowed)
                } else {
                    self.mdct512.mdct512(&windowed)
                };
                for c in coefs.iter_mut() {
                    *c *= -2.0 / if blksw { 256.0 } else { 512.0 };
                }
                for c in coefs.iter_mut().skip(ncoefs[ch]) {
                    *c = 0.0;
                }

                self.channels[ch].history.copy_from_slice(new_samples);

                coefs_this_block.push(coefs);
                blksw_this_block.push(blksw);
            }

            block_coefs[block] = coefs_this_block;
            block_blksw[block] = blksw_this_block;
        }

        // Stereo rematrixing (only for plain two-channel mode).
        let rematrix_enabled = self.config.rematrix && self.config.channel_mode.supports_rematrix();
        let mut rematrix_flags = [RematrixFlags::default(); frame::BLOCKS_PER_FRAME];
        let mut rematrix_present = [false; frame::BLOCKS_PER_FRAME];
        if rematrix_enabled {
            for block in 0..frame::BLOCKS_PER_FRAME {
                let (left, rest) = block_coefs[block].split_at_mut(1);
                let right = &mut rest[0];
                let flags = rematrix::rematrix_block(&mut left[0], right, ncoefs[0].min(ncoefs[1]));
                rematrix_flags[block] = flags;
                let is_first = self.frame_number == 0 && block == 0;
                rematrix_present[block] = rematrix::rematrix_strategy_present(
                    is_first,
                    flags,
                    if block == 0 { self.prev_rematrix_flags } else { rematrix_flags[block - 1] },
                );
            }
            self.prev_rematrix_flags = rematrix_flags[frame::BLOCKS_PER_FRAME - 1];
        }

        // Per-channel exponent extraction and strategy selection.
        for ch in 0..nch_total {
            for block in 0..frame::BLOCKS_PER_FRAME {
                raw_exponents[ch][block] = exponent::extract_block_exponents(&block_coefs[block][ch], ncoefs[ch]);
            }
        }

        let mut strategies: Vec<[ExpStrategy; frame::BLOCKS_PER_FRAME]> = Vec::with_capacity(nch_total);
        let mut encoded_runs: Vec<Vec<Option<EncodedRun>>> = Vec::with_capacity(nch_total);
        for ch in 0..nch_total {
            let (_, pattern) = if self.channels[ch].is_lfe {
                exponent::select_lfe_strategy_row(&raw_exponents[ch], ncoefs[ch], self.config.fast_exponent_strategy)
            } else {
                exponent::select_strategy_row(&raw_exponents[ch], ncoefs[ch], self.config.fast_exponent_strategy)
            };
            strategies.push(pattern);

            let mut runs: Vec<Option<EncodedRun>> = vec![None; frame::BLOCKS_PER_FRAME];
            let mut run_start = 0usize;
            for b in 1..=frame::BLOCKS_PER_FRAME {
                if b == frame::BLOCKS_PER_FRAME || pattern[b] != ExpStrategy::Reuse {
                    let run_blocks = &raw_exponents[ch][run_start..b];
                    let run = exponent::encode_run(run_blocks, ncoefs[ch], pattern[run_start]);
                    runs[run_start] = Some(run);
                    run_start = b;
                }
            }
            encoded_runs.push(runs);
        }

        // Resolve each block's effective exponents (REUSE copies the
        // previous block's run result for that channel).
        let mut block_exponents: Vec<[[u8; MAX_COEFS]; frame::BLOCKS_PER_FRAME]> =
            vec![[[24u8; MAX_COEFS]; frame::BLOCKS_PER_FRAME]; nch_total];
        for ch in 0..nch_total {
            let mut current = [24u8; MAX_COEFS];
            for block in 0..frame::BLOCKS_PER_FRAME {
                if let Some(run) = &encoded_runs[ch][block] {
                    current = run.exponents;
                }
                block_exponents[ch][block] = current;
            }
        }

        // Psychoacoustic model + bit allocation + quantization, per block.
        let excitation_params = ExcitationParams {
            fdecay: i32::from(tables::FAST_DECAY[usize::from(self.alloc_params.fdecaycod)]),
            sdecay: i32::from(tables::SLOW_DECAY[usize::from(self.alloc_params.sdecaycod)]),
            fgain: i32::from(tables::FAST_GAIN[usize::from(self.alloc_params.fgaincod)]),
            sgain: i32::from(tables::SLOW_GAIN[usize::from(self.alloc_params.sgaincod)]),
            dbknee: i32::from(tables::DB_KNEE[usize::from(self.alloc_params.dbkneecod)]),
        };
        let floor = i32::from(tables::FLOOR[usize::from(self.alloc_params.floorcod)]);

        let header_bits_estimate = 96u32; // fixed-size header fields, independent of content
        let rate_is_cbr = matches!(self.config.rate_control, RateControl::Cbr(_));
        let (mut frame_size_words, mut frmsizecod) = if let RateControl::Cbr(kbps) = self.config.rate_control {
            self.cbr_frame_size_words(kbps)?
        } else {
            (0, 0)
        };
        let per_block_budget = ((frame_size_words * 16).saturating_sub(header_bits_estimate)) / frame::BLOCKS_PER_FRAME as u32;

        let mut blocks: Vec<BlockRecord> = Vec::with_capacity(frame::BLOCKS_PER_FRAME);
        let mut mantissas: Vec<Vec<Vec<MantissaCode>>> = Vec::with_capacity(frame::BLOCKS_PER_FRAME);
        let mut content_bits = 0u32;

        for block in 0..frame::BLOCKS_PER_FRAME {
            let mut rec = BlockRecord::new(nch_full);
            let mut psds = Vec::with_capacity(nch_total);
            let mut masks = Vec::with_capacity(nch_total);

            for ch in 0..nch_total {
                let psd = psychoacoustic::compute_psd(&block_exponents[ch][block], ncoefs[ch]);
                let bnd = psychoacoustic::integrate_bands(&psd, ncoefs[ch]);
                let bndend = tables::derived().band_of_bin[ncoefs[ch] - 1] as usize + 1;
                let excite = psychoacoustic::compute_excitation(&bnd, &excitation_params, bndend, self.channels[ch].is_lfe);
                let mask = psychoacoustic::compute_mask(&excite, &bnd, excitation_params.dbknee, usize::from(self.fscod), bndend);
                psds.push(psd);
                masks.push(mask);
            }

            let channel_inputs: Vec<ChannelAlloc> = (0..nch_total)
                .map(|ch| ChannelAlloc { psd: &psds[ch], mask: &masks[ch], ncoefs: ncoefs[ch] })
                .collect();

            let strategy_cost: u32 = (0..nch_total)
                .map(|ch| exponent::strategy_bit_cost(strategies[ch][block], ncoefs[ch]))
                .sum();
            let fixed_bits = bitalloc::fixed_overhead_bits(0, &[]) + strategy_cost;

            let alloc = match self.config.rate_control {
                RateControl::Cbr(_) => bitalloc::search_cbr(&channel_inputs, fixed_bits, per_block_budget)?,
                RateControl::Vbr(quality) => bitalloc::search_vbr(&channel_inputs, quality),
            };
            content_bits += fixed_bits + alloc.mantissa_bits;

            // This encoder never sets `snroffste` mid-frame (no per-block
            // delta bit allocation), so the header's csnroffst/fsnroffst
            // come from block 0's search, matching what block 0 actually
            // transmits.
            if block == 0 {
                self.alloc_params.csnroffst = alloc.csnroffst;
                self.alloc_params.fsnroffst = alloc.fsnroffst;
            }

            let mut peak = 0.0f32;
            let mut block_mantissas = Vec::with_capacity(nch_total);
            for ch in 0..nch_total {
                let coefs = &block_coefs[block][ch];
                let bap = &alloc.bap[ch];
                let exps = &block_exponents[ch][block];
                let m = quantize::quantize_channel(coefs, bap, &exps[..ncoefs[ch]], ncoefs[ch]);
                block_mantissas.push(m);
                if !self.channels[ch].is_lfe {
                    for &s in coefs.iter().take(ncoefs[ch]) {
                        peak = peak.max(s.abs() as f32);
                    }
                }
            }

            rec.blksw = block_blksw[block][0..nch_full].to_vec();
            rec.exp_strategy = (0..nch_full).map(|ch| strategies[ch][block]).collect();
            for ch in 0..nch_full {
                rec.exponents[ch] = block_exponents[ch][block];
                rec.psd[ch] = psds[ch].clone();
                rec.mask[ch] = masks[ch];
                rec.bap[ch] = alloc.bap[ch].clone();
                rec.group_codes[ch] = encoded_runs[ch][block]
                    .as_ref()
                    .map(|run| run.group_codes.clone())
                    .unwrap_or_default();
            }
            if self.config.lfe {
                rec.lfe = Some(LfeRecord {
                    exp_strategy: strategies[nch_full][block],
                    exponents: block_exponents[nch_full][block],
                    group_codes: encoded_runs[nch_full][block]
                        .as_ref()
                        .map(|run| run.group_codes.clone())
                        .unwrap_or_default(),
                    bap: alloc.bap[nch_full].clone(),
                });
            }
            rec.rematrix_flags = if rematrix_enabled { rematrix_flags[block] } else { RematrixFlags::default() };
            rec.rematrix_strategy_present = rematrix_enabled && rematrix_present[block];
            rec.dynrng = drc::compute_dynrng(self.config.drc_profile, peak);

            blocks.push(rec);
            mantissas.push(block_mantissas);
        }

        // A channel with blksw=1 in block k must clear dithflag in blocks k
        // and k+1: the short-block transform pair it triggers shares no
        // history with ordinary dither assumptions across that boundary.
        for k in 0..frame::BLOCKS_PER_FRAME {
            for ch in 0..nch_full {
                if blocks[k].blksw[ch] {
                    blocks[k].dithflag[ch] = false;
                    if k + 1 < frame::BLOCKS_PER_FRAME {
                        blocks[k + 1].dithflag[ch] = false;
                    }
                }
            }
        }

        if !rate_is_cbr {
            let required_bits = header_bits_estimate + content_bits;
            let (words, code) = self.vbr_frame_size_words(required_bits);
            frame_size_words = words;
            frmsizecod = code;
        }

        let frame_state = FrameState::new(
            self.frame_number,
            nch_full,
            ncoefs.clone(),
            self.alloc_params,
            frame_size_words,
            frmsizecod,
        );

        let packed = self.pack_frame(&frame_state, &blocks, &mantissas)?;
        self.frame_number += 1;
        Ok(packed)
    }

    fn pack_frame(
        &self,
        state: &FrameState,
        blocks: &[BlockRecord],
        mantissas: &[Vec<Vec<MantissaCode>>],
    ) -> Result<Vec<u8>> {
        let nch_full = usize::from(self.config.channel_mode.full_range_channels());
        let mut w = BitWriter::with_capacity(state.frame_size_words as usize * 2);

        // Sync word + basic header. Byte 0/1 are reserved for the sync
        // pattern the container layer prepends; this core starts the
        // payload at the bitstream information fields.
        w.put_bits(0x0b77, 16);
        w.put_bits(0, 16); // crc1 placeholder, backpatched below
        w.put_bits(u32::from(self.fscod), 2);
        w.put_bits(u32::from(state.frmsizecod), 6);
        w.put_bits(u32::from(self.config.bsid), 5);
        w.put_bits(0, 3); // bsmod
        w.put_bits(u32::from(self.config.channel_mode.acmod()), 3);
        if self.config.channel_mode.acmod() == 2 {
            w.put_bits(u32::from(self.config.metadata.center_mix_level), 2);
            w.put_bits(u32::from(self.config.metadata.surround_mix_level), 2);
        }
        w.put_bits(0, 2); // dsurmod
        w.put_bits(u32::from(self.config.lfe), 1);
        w.put_bits(u32::from(self.config.metadata.dialnorm), 5);
        w.put_bits(0, 1); // compre (no compression word in header; per-block dynrng only)
        w.put_bits(0, 1); // langcode
        w.put_bits(0, 1); // audprodie
        w.put_bits(0, 1); // mixdef (acmod==0 dual-mono variant omitted for brevity)
        w.put_bits(0, 1); // copyrightb
        w.put_bits(0, 1); // origbs
        w.put_bits(u32::from(self.config.metadata.xbsi1_enabled), 1);
        w.put_bits(u32::from(self.config.metadata.xbsi2_enabled), 1);
        w.put_bits(0, 1); // addbsie

        for (block_idx, rec) in blocks.iter().enumerate() {
            for ch in 0..nch_full {
                w.put_bits(u32::from(rec.blksw[ch]), 1);
            }
            for ch in 0..nch_full {
                w.put_bits(u32::from(rec.dithflag[ch]), 1);
            }
            w.put_bits(1, 1); // dynrng present
            w.put_bits(u32::from(rec.dynrng), 8);

            if block_idx == 0 {
                w.put_bits(0, 1); // cplstre
                w.put_bits(0, 1); // cplinu (no coupling)
            }

            if self.config.channel_mode.acmod() == 2 {
                w.put_bits(u32::from(rec.rematrix_strategy_present), 1);
                if rec.rematrix_strategy_present {
                    for &flag in &rec.rematrix_flags.0 {
                        w.put_bits(u32::from(flag), 1);
                    }
                }
            }

            for ch in 0..nch_full {
                w.put_bits(u32::from(rec.exp_strategy[ch].code()), 2);
            }
            if let Some(lfe) = &rec.lfe {
                w.put_bits(u32::from(lfe.exp_strategy != ExpStrategy::Reuse), 1);
            }

            for ch in 0..nch_full {
                if rec.exp_strategy[ch] != ExpStrategy::Reuse {
                    let bwcode = ((state.ncoefs[ch].min(253) - 73) / 3) as u32;
                    w.put_bits(bwcode, 6);
                }
            }

            for ch in 0..nch_full {
                if rec.exp_strategy[ch] != ExpStrategy::Reuse {
                    w.put_bits(u32::from(rec.exponents[ch][0]), 4);
                    for &code in &rec.group_codes[ch] {
                        w.put_bits(u32::from(code), 7);
                    }
                    w.put_bits(0, 2); // gainrng
                }
            }
            if let Some(lfe) = &rec.lfe {
                if lfe.exp_strategy != ExpStrategy::Reuse {
                    w.put_bits(u32::from(lfe.exponents[0]), 4);
                    for &code in &lfe.group_codes {
                        w.put_bits(u32::from(code), 7);
                    }
                    // No gainrng field for LFE; coupling/gain-range is a
                    // full-bandwidth-channel-only concept.
                }
            }

            if block_idx == 0 {
                w.put_bits(0, 1); // baie present
                w.put_bits(u32::from(state.alloc.sdecaycod), 2);
                w.put_bits(u32::from(state.alloc.fdecaycod), 2);
                w.put_bits(u32::from(state.alloc.sgaincod), 2);
                w.put_bits(u32::from(state.alloc.dbkneecod), 2);
                w.put_bits(u32::from(state.alloc.floorcod), 3);
                w.put_bits(0, 1); // snroffste
                w.put_bits(u32::from(state.alloc.csnroffst), 6);
                for _ in 0..nch_full {
                    w.put_bits(u32::from(state.alloc.fsnroffst), 4);
                    w.put_bits(u32::from(state.alloc.fgaincod), 3);
                }
            }

            w.put_bits(0, 1); // deltbaie
            w.put_bits(0, 1); // skiple

            for ch in 0..nch_full {
                for code in &mantissas[block_idx][ch] {
                    if let MantissaCode::Value { bits, code } = code {
                        w.put_bits(*code, u32::from(*bits));
                    }
                }
            }
            if self.config.lfe {
                for code in &mantissas[block_idx][nch_full] {
                    if let MantissaCode::Value { bits, code } = code {
                        w.put_bits(*code, u32::from(*bits));
                    }
                }
            }
        }

        let target_bits = state.frame_size_words as usize * 16 - 16;
        if w.bit_position() > target_bits {
            return Err(EncoderError::internal_assertion(format!(
                "packed {} bits but frmsizecod {} only budgets {target_bits}",
                w.bit_position(),
                state.frmsizecod
            )));
        }
        while w.bit_position() < target_bits {
            w.put_bits(0, 1);
        }

        let mut bytes = w.into_bytes();
        let (crc1, crc2) = crate::bitstream::compute_frame_crcs(&bytes);
        bytes[2] = (crc1 >> 8) as u8;
        bytes[3] = (crc1 & 0xff) as u8;
        let len = bytes.len();
        bytes[len - 2] = (crc2 >> 8) as u8;
        bytes[len - 1] = (crc2 & 0xff) as u8;

        Ok(bytes)
    }
}
