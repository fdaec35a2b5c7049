//! Engine settings for Banddrive
//!
//! This module provides:
//! - The [`EngineSettings`] document (stream, shaper constants, initial
//!   controls, scope window) with TOML serialization
//! - Async load/save through `tokio::fs`
//! - Validation of every constant and control range

use crate::domain::audio::StreamConfig;
use crate::domain::controls::{params, ControlSnapshot};
use crate::domain::distortion::ShaperConstants;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, instrument};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// `[stream]` section
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    pub sample_rate: u32,
    pub channels: u16,
    pub max_block_size: u32,
}

impl Default for StreamSettings {
    fn default() -> Self {
        let config = StreamConfig::default();
        Self {
            sample_rate: config.sample_rate.hz(),
            channels: config.channels.count(),
            max_block_size: config.max_block_size,
        }
    }
}

impl StreamSettings {
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig::new(self.sample_rate, self.channels, self.max_block_size)
    }
}

/// `[scope]` section
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeSettings {
    /// Length of audio history kept for display
    pub window_ms: u32,
}

impl Default for ScopeSettings {
    fn default() -> Self {
        Self { window_ms: 100 }
    }
}

impl ScopeSettings {
    pub const MAX_WINDOW_MS: u32 = 10_000;

    /// Samples needed to hold the window at `sample_rate`
    pub fn capacity(&self, sample_rate: u32) -> usize {
        (u64::from(sample_rate) * u64::from(self.window_ms) / 1000) as usize
    }
}

/// Complete settings document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub stream: StreamSettings,
    pub shaper: ShaperConstants,
    pub controls: ControlSnapshot,
    pub scope: ScopeSettings,
}

impl EngineSettings {
    /// Load settings from a TOML file
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading settings");

        let contents = fs::read_to_string(path).await?;
        let settings: Self = toml::from_str(&contents)?;
        settings.validate()?;

        debug!("Settings loaded successfully");
        Ok(settings)
    }

    /// Save settings to a TOML file
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving settings");

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let toml_str = self.to_toml()?;
        fs::write(path, toml_str).await?;

        debug!("Settings saved successfully");
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every constant and control range
    pub fn validate(&self) -> Result<()> {
        self.stream
            .stream_config()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        self.shaper
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        for (i, band) in self.controls.bands.iter().enumerate() {
            check_range(&format!("band {} drive_db", i + 1), band.drive_db, params::DRIVE_DB)?;
            check_range(&format!("band {} level_db", i + 1), band.level_db, params::LEVEL_DB)?;
        }

        let xo = &self.controls.crossovers;
        for (name, value) in [("low", xo.low), ("mid", xo.mid), ("high", xo.high)] {
            check_range(&format!("crossover {}", name), value, params::CROSSOVER_HZ)?;
        }
        if !xo.is_ordered() {
            return Err(ConfigError::Invalid(format!(
                "crossovers must ascend, got {} / {} / {} Hz",
                xo.low, xo.mid, xo.high
            )));
        }

        let g = &self.controls.globals;
        check_range("input_gain_db", g.input_gain_db, params::INPUT_GAIN_DB)?;
        check_range("output_gain_db", g.output_gain_db, params::OUTPUT_GAIN_DB)?;
        check_range("mix", g.mix, params::MIX)?;

        if self.scope.window_ms == 0 || self.scope.window_ms > ScopeSettings::MAX_WINDOW_MS {
            return Err(ConfigError::Invalid(format!(
                "scope window must be 1..={} ms, got {}",
                ScopeSettings::MAX_WINDOW_MS,
                self.scope.window_ms
            )));
        }

        Ok(())
    }
}

fn check_range(name: &str, value: f64, range: std::ops::RangeInclusive<f64>) -> Result<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{} = {} outside {}..={}",
            name,
            value,
            range.start(),
            range.end()
        )))
    }
}
