//! Pre-filters: one-pole DC blocker, direct-form biquads, and cascaded
//! Butterworth second-order sections.
//!
//! The one-pole DC blocker is a small enough kernel to hand-roll directly;
//! the direct-form-I/II biquad sections and their RBJ/Butterworth
//! coefficient derivation are built on the `biquad` crate, the same one the
//! reference filter bank's own dependents reach for rather than
//! re-deriving the bilinear-transform algebra by hand.

use crate::error::{EncoderError, Result};
use biquad::{Biquad as BiquadOps, Coefficients, DirectForm1, DirectForm2Transposed, ToHertz, Type};

/// Q for a single Butterworth section within a cascade, and the Q this
/// module otherwise uses for its direct-form biquads (a maximally-flat
/// single-section response).
const Q_BUTTERWORTH: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Low-pass or high-pass response selection shared by every filter kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    /// Low-pass.
    LowPass,
    /// High-pass.
    HighPass,
}

fn normalized_cutoff(cutoff_hz: f64, sample_rate: f64) -> Result<f64> {
    if sample_rate <= 0.0 {
        return Err(EncoderError::internal_error("sample rate must be positive"));
    }
    if cutoff_hz < 0.0 || cutoff_hz > sample_rate / 2.0 {
        return Err(EncoderError::internal_error(format!(
            "cutoff {cutoff_hz} Hz out of range for sample rate {sample_rate} Hz"
        )));
    }
    Ok(cutoff_hz / sample_rate)
}

/// A one-pole low-pass or high-pass filter (used for 3 Hz DC removal).
#[derive(Debug, Clone, Copy)]
pub struct OnePole {
    p: f64,
    last: f64,
    kind: FilterType,
}

impl OnePole {
    /// Builds a one-pole filter with the given cutoff at the given sample rate.
    pub fn new(kind: FilterType, cutoff_hz: f64, sample_rate: f64) -> Result<Self> {
        let fc = normalized_cutoff(cutoff_hz, sample_rate)?;
        let omega = 2.0 * std::f64::consts::PI * fc;
        let cs = match kind {
            FilterType::LowPass => 2.0 - omega.cos(),
            FilterType::HighPass => 2.0 + omega.cos(),
        };
        let p = cs - (cs * cs - 1.0).sqrt();
        Ok(Self { p, last: 0.0, kind })
    }

    /// Filters `samples` in place, saturating each output to [-1.0, 1.0].
    pub fn process(&mut self, samples: &mut [f64]) {
        let p1 = match self.kind {
            FilterType::LowPass => 1.0 - self.p,
            FilterType::HighPass => self.p - 1.0,
        };
        for sample in samples.iter_mut() {
            let v = (p1 * *sample + self.p * self.last).clamp(-1.0, 1.0);
            self.last = v;
            *sample = v;
        }
    }
}

/// Which of the `biquad` crate's two direct forms backs a [`Biquad`]. Form I
/// keeps separate input/output history (what the transient-detect high-pass
/// wants to match the reference filter exactly); Form II Transposed carries
/// less state and is what a cascade's individual sections use.
#[derive(Clone)]
enum Form {
    DirectFormI(DirectForm1<f64>),
    DirectFormIiTransposed(DirectForm2Transposed<f64>),
}

impl Form {
    fn run(&mut self, x: f64) -> f64 {
        match self {
            Form::DirectFormI(f) => f.run(x),
            Form::DirectFormIiTransposed(f) => f.run(x),
        }
    }
}

/// Direct-form-I or -II biquad section with persistent state across calls.
#[derive(Clone)]
pub struct Biquad {
    form: Form,
}

impl Biquad {
    /// Builds a direct-form-I biquad (used for the 8 kHz transient-detect
    /// high-pass).
    pub fn new_direct_form_i(
        kind: FilterType,
        cutoff_hz: f64,
        sample_rate: f64,
    ) -> Result<Self> {
        Self::new(kind, cutoff_hz, sample_rate, Q_BUTTERWORTH, false)
    }

    /// Builds a direct-form-II biquad.
    pub fn new_direct_form_ii(
        kind: FilterType,
        cutoff_hz: f64,
        sample_rate: f64,
    ) -> Result<Self> {
        Self::new(kind, cutoff_hz, sample_rate, Q_BUTTERWORTH, true)
    }

    fn new(kind: FilterType, cutoff_hz: f64, sample_rate: f64, q: f64, direct_form_ii: bool) -> Result<Self> {
        normalized_cutoff(cutoff_hz, sample_rate)?;
        let filter_type = match kind {
            FilterType::LowPass => Type::LowPass,
            FilterType::HighPass => Type::HighPass,
        };
        let coefficients = Coefficients::<f64>::from_params(filter_type, sample_rate.hz(), cutoff_hz.hz(), q)
            .map_err(|e| EncoderError::internal_error(format!("biquad coefficient derivation failed: {e:?}")))?;
        let form = if direct_form_ii {
            Form::DirectFormIiTransposed(DirectForm2Transposed::<f64>::new(coefficients))
        } else {
            Form::DirectFormI(DirectForm1::<f64>::new(coefficients))
        };
        Ok(Self { form })
    }

    fn new_butterworth(kind: FilterType, cutoff_hz: f64, sample_rate: f64, direct_form_ii: bool) -> Result<Self> {
        Self::new(kind, cutoff_hz, sample_rate, Q_BUTTERWORTH, direct_form_ii)
    }

    /// Filters `samples` in place, saturating each output to [-1.0, 1.0]
    /// (the `biquad` crate's direct forms don't saturate on their own).
    pub fn process(&mut self, samples: &mut [f64]) {
        for sample in samples.iter_mut() {
            *sample = self.form.run(*sample).clamp(-1.0, 1.0);
        }
    }
}

/// Two cascaded Butterworth second-order sections (used for bandwidth
/// limiting and the LFE 120 Hz low-pass), both direct-form-I.
#[derive(Clone)]
pub struct ButterworthCascade {
    stages: [Biquad; 2],
}

impl ButterworthCascade {
    /// Builds a cascade of two identical Butterworth sections at `cutoff_hz`.
    pub fn new(kind: FilterType, cutoff_hz: f64, sample_rate: f64) -> Result<Self> {
        let a = Biquad::new_butterworth(kind, cutoff_hz, sample_rate, false)?;
        let b = Biquad::new_butterworth(kind, cutoff_hz, sample_rate, false)?;
        Ok(Self { stages: [a, b] })
    }

    /// Filters `samples` in place through both cascaded sections in order.
    pub fn process(&mut self, samples: &mut [f64]) {
        self.stages[0].process(samples);
        self.stages[1].process(samples);
    }
}
