//! Integration tests for settings, offline rendering, live controls and the scope

use banddrive_core::domain::config::EngineSettings;
use banddrive_core::domain::controls::{ControlSnapshot, SharedControls};
use banddrive_core::domain::crossover::{Band, CrossoverFrequencies};
use banddrive_core::domain::distortion::DistortionKind;
use banddrive_core::domain::engine::MultibandDistortion;
use banddrive_core::domain::oversampling::OversamplingFactor;
use banddrive_core::domain::scope::scope_queue;
use banddrive_infra::audio::{OfflineRenderer, ScopeDisplay};
use banddrive_tests::{generate_sine_wave, peak, SAMPLE_RATE};
use proptest::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn renderer_for(settings: &EngineSettings) -> OfflineRenderer {
    let engine = MultibandDistortion::new(settings.shaper).unwrap();
    let controls = Arc::new(SharedControls::new(&settings.controls));
    OfflineRenderer::new(engine, settings.stream.stream_config(), controls).unwrap()
}

fn interleave(left: &[f32], right: &[f32]) -> Vec<f32> {
    left.iter().zip(right).flat_map(|(&l, &r)| [l, r]).collect()
}

// ============================================================================
// SETTINGS
// ============================================================================

#[tokio::test]
async fn test_settings_file_reproduces_render() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("preset.toml");

    let mut settings = EngineSettings::default();
    settings.stream.channels = 2;
    settings.stream.max_block_size = 256;
    settings.shaper.hard_clip_threshold = 0.3;
    settings.controls.crossovers = CrossoverFrequencies::new(150.0, 900.0, 4000.0);
    settings.controls.globals.oversampling = OversamplingFactor::X2;
    settings.controls.globals.mix = 0.75;
    {
        let high = settings.controls.band_mut(Band::High);
        high.distortion = DistortionKind::HardClip;
        high.drive_db = 12.0;
    }
    settings.controls.band_mut(Band::Low).distortion = DistortionKind::Asymmetric;

    settings.save_to_file(&path).await.unwrap();
    let loaded = EngineSettings::load_from_file(&path).await.unwrap();
    assert_eq!(loaded, settings);

    let tone = generate_sine_wave(3000.0, 0.8, 4000);
    let mut from_file = interleave(&tone, &tone);
    let mut direct = from_file.clone();

    let stats = renderer_for(&loaded).render_interleaved(&mut from_file).unwrap();
    renderer_for(&settings).render_interleaved(&mut direct).unwrap();

    assert_eq!(stats.frames, 4000);
    assert_eq!(stats.blocks, 16);
    assert_eq!(from_file, direct);
    assert_ne!(from_file, interleave(&tone, &tone));
}

#[tokio::test]
async fn test_hand_written_preset_loads() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("hand.toml");
    tokio::fs::write(
        &path,
        r#"
[stream]
sample_rate = 44100
channels = 1

[controls.crossovers]
low = 120.0
mid = 800.0
high = 6000.0

[[controls.bands]]
distortion = "SoftClip"
drive_db = 9.0

[[controls.bands]]

[[controls.bands]]
mute = true

[[controls.bands]]
distortion = "Arctangent"
"#,
    )
    .await
    .unwrap();

    let settings = EngineSettings::load_from_file(&path).await.unwrap();
    assert_eq!(settings.stream.sample_rate, 44100);
    assert_eq!(settings.controls.bands[0].distortion, DistortionKind::SoftClip);
    assert_eq!(settings.controls.bands[0].drive_db, 9.0);
    assert!(settings.controls.bands[2].mute);
    assert_eq!(settings.controls.bands[3].distortion, DistortionKind::Arctangent);

    let mut samples = generate_sine_wave(500.0, 0.5, 2048);
    let stats = renderer_for(&settings).render_interleaved(&mut samples).unwrap();
    assert!(stats.output_peak > 0.0);
}

// ============================================================================
// LIVE CONTROLS
// ============================================================================

#[test]
fn test_mute_automation_takes_effect_at_block_boundary() {
    let mut settings = EngineSettings::default();
    settings.stream.channels = 1;
    let block = settings.stream.max_block_size as usize;
    let mut renderer = renderer_for(&settings);

    let mut samples = generate_sine_wave(440.0, 0.5, block * 20);
    renderer
        .render_interleaved_with(&mut samples, |index, controls| {
            if index == 10 {
                for band in Band::ALL {
                    controls.set_band_mute(band, true);
                }
            }
        })
        .unwrap();

    assert!(peak(&samples[..block * 10]) > 0.1);
    assert!(samples[block * 10..].iter().all(|&s| s == 0.0));
}

#[test]
fn test_concurrent_ui_edits_while_rendering() {
    let mut settings = EngineSettings::default();
    settings.stream.channels = 1;
    settings.stream.max_block_size = 128;
    let mut renderer = renderer_for(&settings);

    let controls = Arc::clone(renderer.controls());
    let stop = Arc::new(AtomicBool::new(false));
    let ui = {
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut step = 0usize;
            while !stop.load(Ordering::Relaxed) {
                let band = Band::ALL[step % 4];
                let kind = DistortionKind::ALL[step % DistortionKind::ALL.len()];
                controls.set_band_distortion(band, kind);
                controls.set_band_drive(band, (step % 25) as f64);
                controls.set_crossovers(CrossoverFrequencies::new(
                    100.0 + (step % 300) as f64,
                    1000.0,
                    4000.0 + (step % 7000) as f64,
                ));
                controls.set_oversampling(OversamplingFactor::ALL[(step / 64) % 4]);
                step += 1;
            }
        })
    };

    let mut samples = generate_sine_wave(880.0, 0.9, SAMPLE_RATE as usize);
    let result = renderer.render_interleaved(&mut samples);

    stop.store(true, Ordering::Relaxed);
    ui.join().unwrap();

    let stats = result.unwrap();
    assert_eq!(stats.frames, SAMPLE_RATE as usize);
    assert!(samples.iter().all(|s| s.is_finite()));
}

// ============================================================================
// SCOPE
// ============================================================================

#[test]
fn test_scope_mirrors_latest_output() {
    let mut settings = EngineSettings::default();
    settings.stream.channels = 1;
    let mut renderer = renderer_for(&settings);
    renderer.controls().set_band_distortion(Band::Low, DistortionKind::CubicClip);

    let capacity = settings.scope.capacity(settings.stream.sample_rate);
    let (producer, consumer) = scope_queue(capacity);
    let ring = producer.capacity();
    renderer.engine_mut().attach_scope(producer);
    let mut display = ScopeDisplay::new(consumer, capacity);

    let mut samples = generate_sine_wave(100.0, 0.8, SAMPLE_RATE as usize);
    renderer.render_interleaved(&mut samples).unwrap();

    assert!(display.poll());
    assert_eq!(display.frames_completed(), 1);
    assert_eq!(display.dropped(), (samples.len() - ring) as u64);

    let oldest = samples.len() - ring;
    assert_eq!(display.frame(), &samples[oldest..oldest + capacity]);
}

#[test]
fn test_scope_without_display_never_blocks() {
    let mut settings = EngineSettings::default();
    settings.stream.channels = 1;
    let mut renderer = renderer_for(&settings);

    let (producer, consumer) = scope_queue(64);
    renderer.engine_mut().attach_scope(producer);

    let mut samples = generate_sine_wave(60.0, 0.5, SAMPLE_RATE as usize);
    renderer.render_interleaved(&mut samples).unwrap();

    assert_eq!(consumer.available(), 64);
    assert!(renderer.engine_mut().detach_scope().is_some());
}

// ============================================================================
// ROBUSTNESS
// ============================================================================

fn arbitrary_controls() -> impl Strategy<Value = ControlSnapshot> {
    let band = (-50.0f64..50.0, -50.0f64..50.0, 0usize..9, any::<bool>(), any::<bool>());
    (
        prop::array::uniform4(band),
        (0.0f64..30000.0, 0.0f64..30000.0, 0.0f64..30000.0),
        (-50.0f64..50.0, -50.0f64..50.0, -1.0f64..2.0, 0usize..4),
    )
        .prop_map(|(bands, (low, mid, high), (input, output, mix, factor))| {
            let mut controls = ControlSnapshot::default();
            for (target, (drive, level, kind, mute, solo)) in controls.bands.iter_mut().zip(bands) {
                target.drive_db = drive;
                target.level_db = level;
                target.distortion = DistortionKind::ALL[kind];
                target.mute = mute;
                target.solo = solo;
            }
            controls.crossovers = CrossoverFrequencies::new(low, mid, high);
            controls.globals.input_gain_db = input;
            controls.globals.output_gain_db = output;
            controls.globals.mix = mix;
            controls.globals.oversampling = OversamplingFactor::ALL[factor];
            controls
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_any_controls_give_finite_output(controls in arbitrary_controls()) {
        let mut settings = EngineSettings::default();
        settings.stream.channels = 1;
        let mut renderer = renderer_for(&settings);
        renderer.controls().store(&controls);

        let mut samples = generate_sine_wave(1500.0, 1.0, 2048);
        renderer.render_interleaved(&mut samples).unwrap();

        prop_assert!(samples.iter().all(|s| s.is_finite()));
        prop_assert!(renderer.engine().crossovers().is_ordered());
    }
}
