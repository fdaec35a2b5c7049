//! Banddrive CLI Application

use anyhow::{bail, Context};
use banddrive_core::domain::config::EngineSettings;
use banddrive_core::domain::controls::SharedControls;
use banddrive_core::domain::distortion::{transfer_curve, DistortionKind};
use banddrive_core::domain::engine::MultibandDistortion;
use banddrive_core::domain::oversampling::OversamplingFactor;
use banddrive_infra::audio::OfflineRenderer;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "banddrive")]
#[command(about = "Four-band multiband distortion", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process raw 32-bit float little-endian audio (interleaved)
    Render {
        /// Input file; omit to render a generated tone
        #[arg(short, long, conflicts_with = "tone")]
        input: Option<PathBuf>,

        /// Generate a sine at this frequency (Hz) instead of reading a file
        #[arg(long)]
        tone: Option<f64>,

        /// Tone length in seconds
        #[arg(long, default_value_t = 2.0)]
        seconds: f64,

        /// Tone peak amplitude
        #[arg(long, default_value_t = 0.8)]
        amplitude: f64,

        /// Output file (raw f32 little-endian, interleaved)
        #[arg(short, long)]
        output: PathBuf,

        /// Settings file (TOML)
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Override the oversampling factor (1, 2, 4 or 8)
        #[arg(long, value_parser = parse_oversampling)]
        oversampling: Option<OversamplingFactor>,
    },

    /// Print the static transfer curve of a distortion type
    Curve {
        /// Distortion type, e.g. "hard-clip" or "asymmetric"
        #[arg(short, long, value_parser = parse_kind)]
        kind: DistortionKind,

        /// Drive in dB applied before the shaper
        #[arg(short, long, default_value_t = 0.0)]
        drive: f64,

        /// Number of points over [-1, 1]
        #[arg(short, long, default_value_t = 21)]
        points: usize,

        /// Print JSON instead of two columns
        #[arg(long)]
        json: bool,
    },

    /// Print the default settings as TOML
    Defaults,
}

fn parse_oversampling(s: &str) -> Result<OversamplingFactor, String> {
    let factor: u32 = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    OversamplingFactor::try_from(factor).map_err(|e| e.to_string())
}

fn parse_kind(s: &str) -> Result<DistortionKind, String> {
    s.parse().map_err(|e: banddrive_core::domain::AudioError| {
        let names: Vec<&str> = DistortionKind::ALL.iter().map(|k| k.name()).collect();
        format!("{} (expected one of: {})", e, names.join(", "))
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Command::Render {
            input,
            tone,
            seconds,
            amplitude,
            output,
            settings,
            oversampling,
        } => {
            let source = match (input, tone) {
                (Some(path), _) => Source::File(path),
                (None, Some(freq)) => Source::Tone {
                    freq,
                    seconds,
                    amplitude,
                },
                (None, None) => bail!("either --input or --tone is required"),
            };
            render(source, &output, settings.as_deref(), oversampling).await
        }
        Command::Curve {
            kind,
            drive,
            points,
            json,
        } => print_curve(kind, drive, points, json),
        Command::Defaults => {
            print!("{}", EngineSettings::default().to_toml()?);
            Ok(())
        }
    }
}

enum Source {
    File(PathBuf),
    Tone {
        freq: f64,
        seconds: f64,
        amplitude: f64,
    },
}

async fn render(
    source: Source,
    output: &Path,
    settings_path: Option<&Path>,
    oversampling: Option<OversamplingFactor>,
) -> anyhow::Result<()> {
    let mut settings = match settings_path {
        Some(path) => EngineSettings::load_from_file(path)
            .await
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => EngineSettings::default(),
    };
    if let Some(factor) = oversampling {
        settings.controls.globals.oversampling = factor;
    }

    let stream = settings.stream.stream_config();
    let channels = usize::from(stream.channels.count());

    let mut samples = match source {
        Source::File(path) => read_f32le(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?,
        Source::Tone {
            freq,
            seconds,
            amplitude,
        } => {
            if seconds.is_nan() || seconds <= 0.0 {
                bail!("--seconds must be positive");
            }
            tone(freq, seconds, amplitude, stream.sample_rate.hz(), channels)
        }
    };

    info!(
        "Rendering {} frames at {} Hz, {} channels, oversampling {}",
        samples.len() / channels.max(1),
        stream.sample_rate.hz(),
        channels,
        settings.controls.globals.oversampling
    );

    let engine = MultibandDistortion::new(settings.shaper).context("creating engine")?;
    let controls = Arc::new(SharedControls::new(&settings.controls));
    let mut renderer = OfflineRenderer::new(engine, stream, controls).context("preparing engine")?;

    let stats = renderer
        .render_interleaved(&mut samples)
        .context("processing audio")?;

    write_f32le(output, &samples)
        .await
        .with_context(|| format!("writing {}", output.display()))?;

    info!(
        "Wrote {}: {} frames, {} blocks, peak {:.3} -> {:.3}",
        output.display(),
        stats.frames,
        stats.blocks,
        stats.input_peak,
        stats.output_peak
    );
    Ok(())
}

fn print_curve(kind: DistortionKind, drive_db: f64, points: usize, json: bool) -> anyhow::Result<()> {
    let settings = EngineSettings::default();
    let curve = transfer_curve(kind, settings.shaper, drive_db, points);

    if json {
        let doc = serde_json::json!({
            "kind": kind.name(),
            "drive_db": drive_db,
            "points": curve,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
    } else {
        for (x, y) in curve {
            println!("{:>8.4} {:>8.4}", x, y);
        }
    }
    Ok(())
}

fn tone(freq: f64, seconds: f64, amplitude: f64, sample_rate: u32, channels: usize) -> Vec<f32> {
    let frames = (seconds * f64::from(sample_rate)) as usize;
    let step = 2.0 * std::f64::consts::PI * freq / f64::from(sample_rate);

    (0..frames)
        .flat_map(|i| {
            let sample = (amplitude * (step * i as f64).sin()) as f32;
            std::iter::repeat(sample).take(channels)
        })
        .collect()
}

async fn read_f32le(path: &Path) -> anyhow::Result<Vec<f32>> {
    let bytes = tokio::fs::read(path).await?;
    if bytes.len() % 4 != 0 {
        bail!("{} bytes is not a whole number of f32 samples", bytes.len());
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

async fn write_f32le(path: &Path, samples: &[f32]) -> anyhow::Result<()> {
    let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    tokio::fs::write(path, bytes).await?;
    Ok(())
}
