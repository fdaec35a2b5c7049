//! Offline block renderer
//!
//! Plays the role of a host audio callback for files and tests: the
//! interleaved input is cut into host-sized blocks, one control snapshot is
//! taken per block, and each block is de-interleaved into planar scratch
//! buffers allocated once up front.

use banddrive_core::domain::audio::{AudioError, Result, StreamConfig};
use banddrive_core::domain::controls::SharedControls;
use banddrive_core::domain::engine::MultibandDistortion;
use std::sync::Arc;
use tracing::{debug, info};

/// Summary of one render pass
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RenderStats {
    /// Frames (samples per channel) processed
    pub frames: usize,
    /// Host blocks the input was split into
    pub blocks: usize,
    pub input_peak: f32,
    pub output_peak: f32,
}

/// Drives a [`MultibandDistortion`] over interleaved audio
pub struct OfflineRenderer {
    engine: MultibandDistortion,
    controls: Arc<SharedControls>,
    config: StreamConfig,
    planar: Vec<Vec<f32>>,
}

impl OfflineRenderer {
    /// Prepare `engine` for `config` and allocate scratch buffers
    pub fn new(
        mut engine: MultibandDistortion,
        config: StreamConfig,
        controls: Arc<SharedControls>,
    ) -> Result<Self> {
        engine.prepare(&config)?;

        let channels = usize::from(config.channels.count());
        let max_block = config.max_block_size as usize;
        Ok(Self {
            engine,
            controls,
            config,
            planar: (0..channels).map(|_| Vec::with_capacity(max_block)).collect(),
        })
    }

    /// Handle the UI side writes to
    pub fn controls(&self) -> &Arc<SharedControls> {
        &self.controls
    }

    pub fn engine(&self) -> &MultibandDistortion {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut MultibandDistortion {
        &mut self.engine
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Process interleaved samples in place
    pub fn render_interleaved(&mut self, samples: &mut [f32]) -> Result<RenderStats> {
        self.render_interleaved_with(samples, |_, _| {})
    }

    /// Process interleaved samples in place, calling `before_block` with the
    /// block index and the shared controls before each snapshot is taken
    ///
    /// This is how automation (a UI thread moving a knob mid-stream) is
    /// reproduced deterministically.
    pub fn render_interleaved_with<F>(
        &mut self,
        samples: &mut [f32],
        mut before_block: F,
    ) -> Result<RenderStats>
    where
        F: FnMut(usize, &SharedControls),
    {
        let channels = self.planar.len();
        if samples.len() % channels != 0 {
            return Err(AudioError::InvalidConfiguration(format!(
                "{} interleaved samples do not divide into {} channels",
                samples.len(),
                channels
            )));
        }

        let mut stats = RenderStats::default();
        let block_len = self.config.max_block_size as usize * channels;

        for (index, chunk) in samples.chunks_mut(block_len).enumerate() {
            let frames = chunk.len() / channels;

            for (c, lane) in self.planar.iter_mut().enumerate() {
                lane.clear();
                lane.extend(chunk.iter().skip(c).step_by(channels));
            }
            stats.input_peak = stats.input_peak.max(peak(chunk));

            before_block(index, &self.controls);
            let snapshot = self.controls.snapshot();
            self.engine.process_block(&mut self.planar, &snapshot)?;

            for (c, lane) in self.planar.iter().enumerate() {
                for (dst, &src) in chunk.iter_mut().skip(c).step_by(channels).zip(lane) {
                    *dst = src;
                }
            }
            stats.output_peak = stats.output_peak.max(peak(chunk));

            stats.frames += frames;
            stats.blocks += 1;
        }

        debug!(
            "Rendered {} frames in {} blocks, peak {:.3} -> {:.3}",
            stats.frames, stats.blocks, stats.input_peak, stats.output_peak
        );
        Ok(stats)
    }

    /// Process planar channels of any length in host-sized blocks
    pub fn render_planar(&mut self, channels: &mut [Vec<f32>]) -> Result<RenderStats> {
        let expected = self.planar.len();
        if channels.len() != expected {
            return Err(AudioError::ChannelMismatch {
                expected,
                actual: channels.len(),
            });
        }

        let frames = channels.first().map_or(0, Vec::len);
        if channels.iter().any(|lane| lane.len() != frames) {
            return Err(AudioError::RaggedBlock);
        }

        let mut interleaved = vec![0.0f32; frames * expected];
        for (c, lane) in channels.iter().enumerate() {
            for (dst, &src) in interleaved.iter_mut().skip(c).step_by(expected).zip(lane) {
                *dst = src;
            }
        }

        let stats = self.render_interleaved(&mut interleaved)?;

        for (c, lane) in channels.iter_mut().enumerate() {
            for (dst, &src) in lane.iter_mut().zip(interleaved.iter().skip(c).step_by(expected)) {
                *dst = src;
            }
        }

        info!("Rendered {} frames x {} channels", stats.frames, expected);
        Ok(stats)
    }
}

fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
}
