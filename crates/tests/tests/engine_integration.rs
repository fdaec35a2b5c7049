//! End-to-end tests of the multiband distortion engine
//!
//! These drive the complete pipeline (oversampling, band split, shapers,
//! mixing) through the public block API, the way a host would.

use banddrive_core::domain::audio::StreamConfig;
use banddrive_core::domain::controls::ControlSnapshot;
use banddrive_core::domain::crossover::{Band, CrossoverFrequencies};
use banddrive_core::domain::distortion::{DistortionKind, ShaperConstants};
use banddrive_core::domain::engine::MultibandDistortion;
use banddrive_core::domain::oversampling::OversamplingFactor;
use banddrive_tests::{
    amplitude_spectrum, generate_sine_wave, mono_engine, peak, process_mono, rms, BLOCK_SIZE,
    SAMPLE_RATE,
};

fn all_bands(kind: DistortionKind, drive_db: f64) -> ControlSnapshot {
    let mut controls = ControlSnapshot::default();
    for band in controls.bands.iter_mut() {
        band.distortion = kind;
        band.drive_db = drive_db;
    }
    controls
}

// ============================================================================
// RECONSTRUCTION
// ============================================================================

#[test]
fn test_low_tone_passes_through_at_unity() {
    let mut engine = mono_engine(ShaperConstants::default());
    let input = generate_sine_wave(100.0, 1.0, SAMPLE_RATE as usize);

    let output = process_mono(&mut engine, &input, &ControlSnapshot::default());

    let half = input.len() / 2;
    let ratio = rms(&output[half..]) / rms(&input[half..]);
    assert!((ratio - 1.0).abs() < 0.01, "RMS ratio {}", ratio);
}

#[test]
fn test_reconstruction_is_roughly_flat() {
    let settings = [
        CrossoverFrequencies::new(200.0, 1000.0, 5000.0),
        CrossoverFrequencies::new(100.0, 400.0, 2000.0),
        CrossoverFrequencies::new(300.0, 1500.0, 8000.0),
    ];
    let probes = [
        30.0, 100.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0, 6000.0, 10000.0, 15000.0,
    ];

    for crossovers in settings {
        let controls = ControlSnapshot {
            crossovers,
            ..ControlSnapshot::default()
        };

        for freq in probes {
            let mut engine = mono_engine(ShaperConstants::default());
            let input = generate_sine_wave(freq, 0.5, SAMPLE_RATE as usize);
            let output = process_mono(&mut engine, &input, &controls);

            let half = input.len() / 2;
            let gain_db = 20.0 * (rms(&output[half..]) / rms(&input[half..])).log10();
            assert!(
                gain_db.abs() < 2.0,
                "{:?} at {} Hz: {:.2} dB",
                crossovers.as_array(),
                freq,
                gain_db
            );
        }
    }
}

#[test]
fn test_dry_mix_returns_input() {
    let mut engine = mono_engine(ShaperConstants::default());
    let mut controls = all_bands(DistortionKind::HardClip, 24.0);
    controls.globals.mix = 0.0;

    let input = generate_sine_wave(440.0, 0.7, 4096);
    let output = process_mono(&mut engine, &input, &controls);

    assert_eq!(output, input);
}

#[test]
fn test_bypass_is_identity_without_oversampling() {
    let mut engine = mono_engine(ShaperConstants::default());
    let mut controls = all_bands(DistortionKind::FullRectify, 12.0);
    controls.globals.bypass = true;

    let input = generate_sine_wave(1234.0, 0.9, 4096);
    let output = process_mono(&mut engine, &input, &controls);

    assert_eq!(output, input);
}

// ============================================================================
// DISTORTION
// ============================================================================

#[test]
fn test_soloed_hard_clip_band_saturates_at_threshold() {
    let constants = ShaperConstants {
        hard_clip_threshold: 0.5,
        ..ShaperConstants::default()
    };
    let mut engine = mono_engine(constants);

    let mut controls = ControlSnapshot::default();
    let low = controls.band_mut(Band::Low);
    low.distortion = DistortionKind::HardClip;
    low.drive_db = 6.0;
    low.solo = true;

    let input = generate_sine_wave(100.0, 1.0, SAMPLE_RATE as usize / 2);
    let output = process_mono(&mut engine, &input, &controls);

    let max = peak(&output);
    assert!(max <= 0.5 + 1e-6, "peak {}", max);
    assert!(max >= 0.49, "peak {}", max);

    // A saturated sine spends most of its time on the rails
    let settled = &output[output.len() / 2..];
    let clipped = settled.iter().filter(|s| s.abs() > 0.499).count();
    assert!(clipped > settled.len() / 2, "{} of {}", clipped, settled.len());
}

#[test]
fn test_every_kind_stays_finite_at_full_drive() {
    let input = generate_sine_wave(220.0, 1.0, 8192);

    for kind in DistortionKind::ALL {
        let mut engine = mono_engine(ShaperConstants::default());
        let mut controls = all_bands(kind, 24.0);
        controls.globals.oversampling = OversamplingFactor::X2;

        let output = process_mono(&mut engine, &input, &controls);
        assert!(output.iter().all(|s| s.is_finite()), "{} produced NaN/inf", kind);
    }
}

#[test]
fn test_rectifier_output_has_no_lasting_dc() {
    let mut engine = mono_engine(ShaperConstants::default());
    let controls = all_bands(DistortionKind::HalfRectify, 0.0);

    let input = generate_sine_wave(1000.0, 0.8, SAMPLE_RATE as usize * 2);
    let output = process_mono(&mut engine, &input, &controls);

    // 4800 samples = 100 whole cycles
    let tail = &output[output.len() - 4800..];
    let mean = tail.iter().map(|&s| f64::from(s)).sum::<f64>() / tail.len() as f64;
    assert!(mean.abs() < 0.01, "residual DC {}", mean);
}

// ============================================================================
// MUTE / SOLO
// ============================================================================

#[test]
fn test_muted_solo_band_is_silent() {
    let mut engine = mono_engine(ShaperConstants::default());
    let mut controls = ControlSnapshot::default();
    let low = controls.band_mut(Band::Low);
    low.solo = true;
    low.mute = true;

    let input = generate_sine_wave(100.0, 1.0, 4096);
    let output = process_mono(&mut engine, &input, &controls);

    assert!(output.iter().all(|&s| s == 0.0));
}

#[test]
fn test_solo_matches_muting_the_others() {
    let input = generate_sine_wave(700.0, 0.8, 8192);

    let mut soloed = all_bands(DistortionKind::SoftClip, 9.0);
    soloed.band_mut(Band::LowMid).solo = true;

    let mut muted = all_bands(DistortionKind::SoftClip, 9.0);
    for band in [Band::Low, Band::HighMid, Band::High] {
        muted.band_mut(band).mute = true;
    }

    let a = process_mono(&mut mono_engine(ShaperConstants::default()), &input, &soloed);
    let b = process_mono(&mut mono_engine(ShaperConstants::default()), &input, &muted);

    assert_eq!(a, b);
    assert!(rms(&a) > 0.1);
}

#[test]
fn test_multiple_solos_sum() {
    let input = generate_sine_wave(2500.0, 0.5, 8192);

    let mut two = ControlSnapshot::default();
    two.band_mut(Band::LowMid).solo = true;
    two.band_mut(Band::HighMid).solo = true;

    let mut one = ControlSnapshot::default();
    one.band_mut(Band::LowMid).solo = true;

    let both = process_mono(&mut mono_engine(ShaperConstants::default()), &input, &two);
    let single = process_mono(&mut mono_engine(ShaperConstants::default()), &input, &one);

    // 2.5 kHz sits in HighMid, so adding that solo must add energy
    assert!(rms(&both) > 2.0 * rms(&single));
}

// ============================================================================
// OVERSAMPLING
// ============================================================================

#[test]
fn test_factor_round_trip_converges_to_unswitched_engine() {
    let blocks = 160;
    let input = generate_sine_wave(440.0, 0.8, blocks * BLOCK_SIZE as usize);
    let base = all_bands(DistortionKind::SoftClip, 6.0);

    let mut steady = mono_engine(ShaperConstants::default());
    let reference = process_mono(&mut steady, &input, &base);

    let mut switched = mono_engine(ShaperConstants::default());
    let mut output = input.clone();
    for (index, chunk) in output.chunks_mut(BLOCK_SIZE as usize).enumerate() {
        let mut controls = base;
        if (20..40).contains(&index) {
            controls.globals.oversampling = OversamplingFactor::X4;
        }
        switched.process_block(&mut [chunk], &controls).unwrap();
    }

    assert_eq!(switched.oversampling(), OversamplingFactor::X1);
    let tail = output.len() - 10 * BLOCK_SIZE as usize;
    for (i, (a, b)) in output[tail..].iter().zip(&reference[tail..]).enumerate() {
        assert!((a - b).abs() < 1e-4, "sample {}: {} vs {}", tail + i, a, b);
    }
}

#[test]
fn test_oversampling_reduces_aliasing() {
    // 5th harmonic of 7 kHz (35 kHz) folds to 13 kHz at 48 kHz
    let alias_at = |factor: OversamplingFactor| {
        let mut engine = mono_engine(ShaperConstants::default());
        let mut controls = all_bands(DistortionKind::HardClip, 12.0);
        controls.globals.oversampling = factor;

        let input = generate_sine_wave(7000.0, 0.8, 9600);
        let output = process_mono(&mut engine, &input, &controls);

        let spectrum = amplitude_spectrum(&output[4800..]);
        assert!(spectrum[700] > 0.1, "fundamental missing at {}", factor);
        spectrum[1300]
    };

    let plain = alias_at(OversamplingFactor::X1);
    let oversampled = alias_at(OversamplingFactor::X4);

    assert!(plain > 0.01, "expected audible alias without oversampling, got {}", plain);
    assert!(
        oversampled < 0.25 * plain,
        "alias {} at 4x vs {} at 1x",
        oversampled,
        plain
    );
}

// ============================================================================
// CHANNELS
// ============================================================================

#[test]
fn test_channels_are_processed_independently() {
    let mut stereo = MultibandDistortion::new(ShaperConstants::default()).unwrap();
    stereo
        .prepare(&StreamConfig::new(SAMPLE_RATE, 2, BLOCK_SIZE))
        .unwrap();
    let controls = all_bands(DistortionKind::Arctangent, 6.0);

    let input = generate_sine_wave(330.0, 0.6, 4096);
    let mut left = input.clone();
    let mut right = vec![0.0f32; input.len()];
    for (l, r) in left
        .chunks_mut(BLOCK_SIZE as usize)
        .zip(right.chunks_mut(BLOCK_SIZE as usize))
    {
        stereo.process_block(&mut [l, r], &controls).unwrap();
    }

    let mono = process_mono(&mut mono_engine(ShaperConstants::default()), &input, &controls);
    assert_eq!(left, mono);
    assert!(right.iter().all(|&s| s == 0.0));
}
