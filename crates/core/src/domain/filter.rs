//! IIR building blocks for the crossover network
//!
//! - [`BiquadFilter`]: Direct Form I second-order section
//! - [`BiquadCoeffs`]: second-order Butterworth low-pass / high-pass design
//! - [`CrossoverFilter`]: two identical Butterworth sections in series, giving a
//!   fourth-order Linkwitz-Riley low-pass or high-pass
//!
//! Filter math runs in `f64`: at 8x oversampling a 20 Hz cutoff sits very
//! close to DC and single precision coefficients lose the pole placement.
//! All per-sample methods are branch-free and allocation-free.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, SQRT_2};
use tracing::trace;

// ============================================================================
// BIQUAD FILTER
// ============================================================================

/// Biquad filter coefficients
///
/// Coefficients are pre-computed to avoid per-sample calculations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiquadCoeffs {
    /// Numerator coefficients
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    /// Denominator coefficients (a0 is normalized to 1.0)
    pub a1: f64,
    pub a2: f64,
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        // Unity gain (no filtering)
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }
}

impl BiquadCoeffs {
    /// Second-order Butterworth low-pass (bilinear transform, prewarped)
    ///
    /// `cutoff` must lie strictly between 0 and `sample_rate / 2`.
    #[must_use]
    pub fn butterworth_lowpass(cutoff: f64, sample_rate: f64) -> Self {
        let c = 1.0 / (PI * cutoff / sample_rate).tan();
        let c2 = c * c;

        let b0 = 1.0 / (1.0 + SQRT_2 * c + c2);
        Self {
            b0,
            b1: 2.0 * b0,
            b2: b0,
            a1: 2.0 * b0 * (1.0 - c2),
            a2: b0 * (1.0 - SQRT_2 * c + c2),
        }
    }

    /// Second-order Butterworth high-pass (bilinear transform, prewarped)
    #[must_use]
    pub fn butterworth_highpass(cutoff: f64, sample_rate: f64) -> Self {
        let c = (PI * cutoff / sample_rate).tan();
        let c2 = c * c;

        let b0 = 1.0 / (1.0 + SQRT_2 * c + c2);
        Self {
            b0,
            b1: -2.0 * b0,
            b2: b0,
            a1: 2.0 * b0 * (c2 - 1.0),
            a2: b0 * (1.0 - SQRT_2 * c + c2),
        }
    }

    /// Complex response H(e^jw) at `freq` Hz
    pub fn frequency_response(&self, freq: f64, sample_rate: f64) -> Complex64 {
        let w = 2.0 * PI * freq / sample_rate;
        let z1 = Complex64::from_polar(1.0, -w);
        let z2 = z1 * z1;

        let num = self.b0 + z1 * self.b1 + z2 * self.b2;
        let den = 1.0 + z1 * self.a1 + z2 * self.a2;
        num / den
    }
}

/// History of a Direct Form I section: last two inputs and outputs
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    pub x1: f64,
    pub x2: f64,
    pub y1: f64,
    pub y2: f64,
}

/// Stateful biquad filter using Direct Form I
///
/// Direct Form I keeps coefficient updates free of artifacts: the history
/// holds plain signal values, so swapping coefficients between blocks never
/// rescales stored state.
#[derive(Debug, Clone, PartialEq)]
pub struct BiquadFilter {
    coeffs: BiquadCoeffs,
    state: FilterState,
}

impl BiquadFilter {
    /// Create a new biquad filter with given coefficients
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            state: FilterState::default(),
        }
    }

    /// Create a bypass filter (unity gain)
    pub fn bypass() -> Self {
        Self::new(BiquadCoeffs::default())
    }

    /// Replace coefficients; history is kept
    pub fn set_coeffs(&mut self, coeffs: BiquadCoeffs) {
        self.coeffs = coeffs;
    }

    pub fn coeffs(&self) -> &BiquadCoeffs {
        &self.coeffs
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    /// Process a single sample
    #[inline]
    pub fn process_sample(&mut self, x: f64) -> f64 {
        let c = &self.coeffs;
        let s = &mut self.state;

        // y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]
        let y = c.b0 * x + c.b1 * s.x1 + c.b2 * s.x2 - c.a1 * s.y1 - c.a2 * s.y2;

        s.x2 = s.x1;
        s.x1 = x;
        s.y2 = s.y1;
        s.y1 = y;

        y
    }

    /// Process a buffer of samples in place
    pub fn process(&mut self, buffer: &mut [f64]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    /// Zero the history; coefficients are untouched
    pub fn reset(&mut self) {
        self.state = FilterState::default();
    }
}

// ============================================================================
// LINKWITZ-RILEY CROSSOVER FILTER
// ============================================================================

/// Closed set of Butterworth designs a crossover section can use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterKind {
    ButterworthLowPass,
    ButterworthHighPass,
}

impl FilterKind {
    #[must_use]
    pub fn coefficients(self, cutoff: f64, sample_rate: f64) -> BiquadCoeffs {
        match self {
            FilterKind::ButterworthLowPass => BiquadCoeffs::butterworth_lowpass(cutoff, sample_rate),
            FilterKind::ButterworthHighPass => {
                BiquadCoeffs::butterworth_highpass(cutoff, sample_rate)
            }
        }
    }
}

/// Fourth-order Linkwitz-Riley section (24 dB/octave)
///
/// A low-pass and a high-pass built at the same cutoff are in phase at every
/// frequency and their sum is allpass, which is what keeps a crossover
/// free of a notch or bump at the split point.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossoverFilter {
    kind: FilterKind,
    cutoff: f64,
    sample_rate: f64,
    stages: [BiquadFilter; 2],
}

impl CrossoverFilter {
    pub fn new(kind: FilterKind, cutoff: f64, sample_rate: f64) -> Self {
        let coeffs = kind.coefficients(cutoff, sample_rate);
        Self {
            kind,
            cutoff,
            sample_rate,
            stages: [BiquadFilter::new(coeffs), BiquadFilter::new(coeffs)],
        }
    }

    pub fn lowpass(cutoff: f64, sample_rate: f64) -> Self {
        Self::new(FilterKind::ButterworthLowPass, cutoff, sample_rate)
    }

    pub fn highpass(cutoff: f64, sample_rate: f64) -> Self {
        Self::new(FilterKind::ButterworthHighPass, cutoff, sample_rate)
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn set_cutoff(&mut self, cutoff: f64) {
        self.cutoff = cutoff;
        self.update_coefficients();
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.update_coefficients();
    }

    fn update_coefficients(&mut self) {
        let coeffs = self.kind.coefficients(self.cutoff, self.sample_rate);
        for stage in &mut self.stages {
            stage.set_coeffs(coeffs);
        }

        trace!(
            "{:?} updated: fc={:.1}Hz fs={:.0}Hz",
            self.kind,
            self.cutoff,
            self.sample_rate
        );
    }

    #[inline]
    pub fn process_sample(&mut self, x: f64) -> f64 {
        let y = self.stages[0].process_sample(x);
        self.stages[1].process_sample(y)
    }

    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
    }

    /// Complex response of the cascade at `freq` Hz
    pub fn frequency_response(&self, freq: f64) -> Complex64 {
        self.stages
            .iter()
            .map(|stage| stage.coeffs().frequency_response(freq, self.sample_rate))
            .product()
    }

    pub fn stage_states(&self) -> [FilterState; 2] {
        [*self.stages[0].state(), *self.stages[1].state()]
    }
}
