//! Stream-level audio types and the error type of the processing core
//!
//! The host (plugin wrapper, offline renderer, test harness) describes the
//! stream it is about to run with a [`StreamConfig`]. Everything that has to
//! be allocated is sized from it at preparation time, never inside a block.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur in the audio subsystem
#[derive(Debug, Error, PartialEq)]
pub enum AudioError {
    /// Stream parameters outside what the engine supports
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// `process_block` called before `prepare`
    #[error("Engine is not prepared for a stream")]
    NotPrepared,

    /// Buffer channel count differs from the prepared stream
    #[error("Channel mismatch: prepared for {expected}, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },

    /// Block longer than the prepared maximum block size
    #[error("Block of {len} samples exceeds prepared maximum of {max}")]
    BlockTooLarge { len: usize, max: usize },

    /// Channels of one block have different lengths
    #[error("Channels in one block have different lengths")]
    RaggedBlock,
}

pub type Result<T> = std::result::Result<T, AudioError>;

/// Audio sample rate in Hz
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleRate {
    Hz44100,
    Hz48000,
    Hz88200,
    Hz96000,
    Hz192000,
    Custom(u32),
}

impl SampleRate {
    /// Lowest host rate the crossover network is tuned for
    pub const MIN_HZ: u32 = 8_000;
    /// Highest host rate accepted (before oversampling)
    pub const MAX_HZ: u32 = 384_000;

    pub fn hz(&self) -> u32 {
        match self {
            SampleRate::Hz44100 => 44100,
            SampleRate::Hz48000 => 48000,
            SampleRate::Hz88200 => 88200,
            SampleRate::Hz96000 => 96000,
            SampleRate::Hz192000 => 192000,
            SampleRate::Custom(hz) => *hz,
        }
    }

    pub fn from_hz(hz: u32) -> Self {
        match hz {
            44100 => SampleRate::Hz44100,
            48000 => SampleRate::Hz48000,
            88200 => SampleRate::Hz88200,
            96000 => SampleRate::Hz96000,
            192000 => SampleRate::Hz192000,
            hz => SampleRate::Custom(hz),
        }
    }
}

/// Number of audio channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelCount {
    Mono,
    Stereo,
    Multi(u16),
}

impl ChannelCount {
    /// Upper bound on channels the engine allocates state for
    pub const MAX: u16 = 8;

    pub fn count(&self) -> u16 {
        match self {
            ChannelCount::Mono => 1,
            ChannelCount::Stereo => 2,
            ChannelCount::Multi(n) => *n,
        }
    }

    pub fn from_count(n: u16) -> Self {
        match n {
            1 => ChannelCount::Mono,
            2 => ChannelCount::Stereo,
            n => ChannelCount::Multi(n),
        }
    }
}

/// Configuration for an audio stream
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    pub sample_rate: SampleRate,
    pub channels: ChannelCount,
    /// Largest block the host will ever pass to `process_block`
    pub max_block_size: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: SampleRate::Hz48000,
            channels: ChannelCount::Stereo,
            max_block_size: 512,
        }
    }
}

impl StreamConfig {
    pub fn new(sample_rate: u32, channels: u16, max_block_size: u32) -> Self {
        Self {
            sample_rate: SampleRate::from_hz(sample_rate),
            channels: ChannelCount::from_count(channels),
            max_block_size,
        }
    }

    /// Check the configuration against what the engine can run
    pub fn validate(&self) -> Result<()> {
        let hz = self.sample_rate.hz();
        if !(SampleRate::MIN_HZ..=SampleRate::MAX_HZ).contains(&hz) {
            return Err(AudioError::InvalidConfiguration(format!(
                "sample rate {} Hz outside {}..={} Hz",
                hz,
                SampleRate::MIN_HZ,
                SampleRate::MAX_HZ
            )));
        }

        let channels = self.channels.count();
        if channels == 0 || channels > ChannelCount::MAX {
            return Err(AudioError::InvalidConfiguration(format!(
                "{} channels outside 1..={}",
                channels,
                ChannelCount::MAX
            )));
        }

        if self.max_block_size == 0 {
            return Err(AudioError::InvalidConfiguration(
                "max block size must be at least one sample".to_string(),
            ));
        }

        Ok(())
    }
}
