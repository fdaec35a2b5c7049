//! 1x / 2x / 4x / 8x oversampling around the nonlinear stage
//!
//! Each 2x step is a polyphase IIR half-band filter: two parallel branches of
//! three first-order allpass sections (Regalia-Mitra decomposition). Higher
//! factors cascade 2 or 3 steps. All buffers are sized for 8x when the
//! oversampler is created, so a factor change only resets state.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::domain::audio::AudioError;

/// Even-phase branch coefficients of the half-band filter
const BRANCH_A_COEFFS: [f64; 3] = [
    0.036_681_502_163_648,
    0.248_030_921_580_110,
    0.643_184_620_136_480,
];

/// Odd-phase branch coefficients of the half-band filter
const BRANCH_B_COEFFS: [f64; 3] = [
    0.110_377_634_768_680,
    0.420_399_304_190_880,
    0.854_640_112_701_920,
];

/// Number of 2x stages needed for the largest factor
const MAX_STAGES: usize = 3;

/// Supported oversampling factors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum OversamplingFactor {
    #[default]
    X1,
    X2,
    X4,
    X8,
}

impl OversamplingFactor {
    pub const ALL: [OversamplingFactor; 4] = [
        OversamplingFactor::X1,
        OversamplingFactor::X2,
        OversamplingFactor::X4,
        OversamplingFactor::X8,
    ];

    /// Rate multiplier
    pub fn factor(self) -> usize {
        1 << self.stages()
    }

    /// Number of cascaded 2x stages
    pub fn stages(self) -> usize {
        match self {
            OversamplingFactor::X1 => 0,
            OversamplingFactor::X2 => 1,
            OversamplingFactor::X4 => 2,
            OversamplingFactor::X8 => 3,
        }
    }

    pub fn from_factor(factor: u32) -> Option<Self> {
        match factor {
            1 => Some(OversamplingFactor::X1),
            2 => Some(OversamplingFactor::X2),
            4 => Some(OversamplingFactor::X4),
            8 => Some(OversamplingFactor::X8),
            _ => None,
        }
    }
}

impl TryFrom<u32> for OversamplingFactor {
    type Error = AudioError;

    fn try_from(factor: u32) -> Result<Self, Self::Error> {
        Self::from_factor(factor).ok_or_else(|| {
            AudioError::InvalidConfiguration(format!(
                "oversampling factor must be 1, 2, 4 or 8, got {}",
                factor
            ))
        })
    }
}

impl From<OversamplingFactor> for u32 {
    fn from(factor: OversamplingFactor) -> u32 {
        factor.factor() as u32
    }
}

impl fmt::Display for OversamplingFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.factor())
    }
}

/// First-order allpass section: y = (a + z^-1) / (1 + a*z^-1)
#[derive(Debug, Clone, Copy)]
struct AllpassSection {
    a: f64,
    state: f64,
}

impl AllpassSection {
    fn new(a: f64) -> Self {
        Self { a, state: 0.0 }
    }

    #[inline]
    fn process(&mut self, x: f64) -> f64 {
        let y = self.a * x + self.state;
        self.state = x - self.a * y;
        y
    }
}

#[derive(Debug, Clone, Copy)]
struct AllpassBranch {
    sections: [AllpassSection; 3],
}

impl AllpassBranch {
    fn new(coeffs: [f64; 3]) -> Self {
        Self {
            sections: coeffs.map(AllpassSection::new),
        }
    }

    #[inline]
    fn process(&mut self, x: f64) -> f64 {
        self.sections.iter_mut().fold(x, |y, section| section.process(y))
    }

    fn reset(&mut self) {
        for section in &mut self.sections {
            section.state = 0.0;
        }
    }
}

/// One 2x step: an upsampling and a downsampling half-band filter
#[derive(Debug, Clone)]
struct HalfBandStage {
    up_a: AllpassBranch,
    up_b: AllpassBranch,
    down_a: AllpassBranch,
    down_b: AllpassBranch,
    down_delay: f64,
}

impl HalfBandStage {
    fn new() -> Self {
        Self {
            up_a: AllpassBranch::new(BRANCH_A_COEFFS),
            up_b: AllpassBranch::new(BRANCH_B_COEFFS),
            down_a: AllpassBranch::new(BRANCH_A_COEFFS),
            down_b: AllpassBranch::new(BRANCH_B_COEFFS),
            down_delay: 0.0,
        }
    }

    /// `output` holds exactly twice as many samples as `input`
    fn upsample(&mut self, input: &[f64], output: &mut [f64]) {
        for (&x, pair) in input.iter().zip(output.chunks_exact_mut(2)) {
            pair[0] = self.up_a.process(x);
            pair[1] = self.up_b.process(x);
        }
    }

    /// `input` holds exactly twice as many samples as `output`
    fn downsample(&mut self, input: &[f64], output: &mut [f64]) {
        for (pair, out) in input.chunks_exact(2).zip(output.iter_mut()) {
            let a = self.down_a.process(pair[0]);
            let b = self.down_b.process(pair[1]);
            *out = (a + self.down_delay) * 0.5;
            self.down_delay = b;
        }
    }

    fn reset(&mut self) {
        self.up_a.reset();
        self.up_b.reset();
        self.down_a.reset();
        self.down_b.reset();
        self.down_delay = 0.0;
    }
}

/// Per-channel up/down sampler
///
/// `process_samples_up` fills an internal buffer at the oversampled rate and
/// hands it out for in-place processing; `process_samples_down` decimates that
/// same buffer back into the host block.
#[derive(Debug, Clone)]
pub struct Oversampler {
    factor: OversamplingFactor,
    max_block_size: usize,
    stages: Vec<HalfBandStage>,
    /// `buffers[k]` holds a block at 2^k times the host rate
    buffers: Vec<Vec<f64>>,
}

impl Oversampler {
    /// Allocate stages and buffers for blocks of up to `max_block_size` at 8x
    pub fn new(max_block_size: usize) -> Self {
        Self {
            factor: OversamplingFactor::X1,
            max_block_size,
            stages: (0..MAX_STAGES).map(|_| HalfBandStage::new()).collect(),
            buffers: (0..=MAX_STAGES)
                .map(|k| vec![0.0; max_block_size << k])
                .collect(),
        }
    }

    pub fn factor(&self) -> OversamplingFactor {
        self.factor
    }

    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    /// Switch factor; any change clears all filter memory
    pub fn set_factor(&mut self, factor: OversamplingFactor) {
        if factor == self.factor {
            return;
        }
        debug!("Oversampler factor {} -> {}", self.factor, factor);
        self.factor = factor;
        self.reset();
    }

    /// Upsample one host block, returning `factor * input.len()` samples
    ///
    /// `input.len()` must not exceed the size given to [`Oversampler::new`].
    pub fn process_samples_up(&mut self, input: &[f32]) -> &mut [f64] {
        let n = input.len().min(self.max_block_size);

        for (dst, &src) in self.buffers[0].iter_mut().zip(&input[..n]) {
            *dst = f64::from(src);
        }

        for k in 0..self.factor.stages() {
            let (lower, upper) = self.buffers.split_at_mut(k + 1);
            self.stages[k].upsample(&lower[k][..n << k], &mut upper[0][..n << (k + 1)]);
        }

        let top = self.factor.stages();
        &mut self.buffers[top][..n << top]
    }

    /// Decimate the buffer returned by the last upsample into `output`
    pub fn process_samples_down(&mut self, output: &mut [f32]) {
        let n = output.len().min(self.max_block_size);

        for k in (0..self.factor.stages()).rev() {
            let (lower, upper) = self.buffers.split_at_mut(k + 1);
            self.stages[k].downsample(&upper[0][..n << (k + 1)], &mut lower[k][..n << k]);
        }

        for (dst, &src) in output[..n].iter_mut().zip(&self.buffers[0]) {
            *dst = src as f32;
        }
    }

    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
    }
}
