//! Domain entities and DSP building blocks

pub mod audio;
pub mod config;
pub mod controls;
pub mod crossover;
pub mod distortion;
pub mod engine;
pub mod filter;
pub mod mixer;
pub mod oversampling;
pub mod scope;

// Re-export specific items to avoid ambiguous glob imports
pub use audio::{AudioError, ChannelCount, SampleRate, StreamConfig};
pub use config::{ConfigError, EngineSettings, ScopeSettings, StreamSettings};
pub use controls::{ControlSnapshot, SharedControls};
pub use crossover::{Band, BandSplitter, CrossoverFrequencies, BAND_COUNT};
pub use distortion::{
    transfer_curve, DcBlocker, DistortionKind, DistortionProcessor, ShaperConstants,
};
pub use engine::MultibandDistortion;
pub use filter::{BiquadCoeffs, BiquadFilter, CrossoverFilter, FilterKind, FilterState};
pub use mixer::{db_to_gain, gain_to_db, BandControls, GlobalControls, MixPlan};
pub use oversampling::{Oversampler, OversamplingFactor};
pub use scope::{scope_queue, ScopeConsumer, ScopeProducer};
