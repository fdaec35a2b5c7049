//! Shared signal helpers for the end-to-end tests

use banddrive_core::domain::audio::StreamConfig;
use banddrive_core::domain::controls::ControlSnapshot;
use banddrive_core::domain::distortion::ShaperConstants;
use banddrive_core::domain::engine::MultibandDistortion;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use std::f64::consts::PI;

pub const SAMPLE_RATE: u32 = 48_000;
pub const BLOCK_SIZE: u32 = 512;

/// Mono engine at [`SAMPLE_RATE`] with host blocks of [`BLOCK_SIZE`]
pub fn mono_engine(constants: ShaperConstants) -> MultibandDistortion {
    let mut engine = MultibandDistortion::new(constants).expect("valid constants");
    engine
        .prepare(&StreamConfig::new(SAMPLE_RATE, 1, BLOCK_SIZE))
        .expect("valid stream");
    engine
}

pub fn generate_sine_wave(frequency: f64, amplitude: f64, num_samples: usize) -> Vec<f32> {
    let step = 2.0 * PI * frequency / f64::from(SAMPLE_RATE);
    (0..num_samples)
        .map(|i| (amplitude * (step * i as f64).sin()) as f32)
        .collect()
}

/// Run `samples` through `engine` block by block with fixed controls
pub fn process_mono(
    engine: &mut MultibandDistortion,
    samples: &[f32],
    controls: &ControlSnapshot,
) -> Vec<f32> {
    let mut output = samples.to_vec();
    for chunk in output.chunks_mut(BLOCK_SIZE as usize) {
        engine
            .process_block(&mut [chunk], controls)
            .expect("block within limits");
    }
    output
}

pub fn rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    (sum / samples.len() as f64).sqrt()
}

pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
}

/// Single-sided amplitude spectrum; bin `k` sits at `k * SAMPLE_RATE / len`
pub fn amplitude_spectrum(samples: &[f32]) -> Vec<f64> {
    let len = samples.len();
    let mut buffer: Vec<Complex<f64>> = samples
        .iter()
        .map(|&s| Complex::new(f64::from(s), 0.0))
        .collect();

    FftPlanner::new().plan_fft_forward(len).process(&mut buffer);

    buffer[..len / 2]
        .iter()
        .map(|bin| 2.0 * bin.norm() / len as f64)
        .collect()
}
