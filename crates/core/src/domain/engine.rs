//! Multiband distortion engine
//!
//! Owns all per-channel real-time state and runs one host block at a time:
//!
//! ```text
//! input -> upsample -> input gain -> 4-band split -> per band:
//!   drive -> waveshaper -> level -> mute/solo gate
//! -> sum -> output gain -> dry/wet -> downsample -> output
//! ```
//!
//! Everything that allocates happens in [`MultibandDistortion::prepare`].
//! Control changes (crossovers, waveshapers, oversampling factor) are applied
//! at block boundaries, before the first sample of the block.

use crate::domain::audio::{AudioError, Result, StreamConfig};
use crate::domain::controls::ControlSnapshot;
use crate::domain::crossover::{BandSplitter, CrossoverFrequencies, BAND_COUNT};
use crate::domain::distortion::{DistortionKind, DistortionProcessor, ShaperConstants};
use crate::domain::mixer::MixPlan;
use crate::domain::oversampling::{Oversampler, OversamplingFactor};
use crate::domain::scope::ScopeProducer;
use tracing::{debug, info};

/// Real-time state of one audio channel
#[derive(Debug, Clone)]
struct ChannelProcessor {
    oversampler: Oversampler,
    splitter: BandSplitter,
    shapers: [DistortionProcessor; BAND_COUNT],
}

impl ChannelProcessor {
    fn process(&mut self, buffer: &mut [f32], plan: &MixPlan) {
        let Self {
            oversampler,
            splitter,
            shapers,
        } = self;

        let samples = oversampler.process_samples_up(buffer);

        if plan.bypass {
            // Up/down filters still run so toggling bypass keeps their memory
            for sample in samples.iter_mut() {
                *sample *= plan.input_gain;
            }
        } else {
            for sample in samples.iter_mut() {
                *sample = render_sample(*sample, splitter, shapers, plan);
            }
        }

        oversampler.process_samples_down(buffer);
    }

    fn reset(&mut self) {
        self.oversampler.reset();
        self.splitter.reset();
        for shaper in &mut self.shapers {
            shaper.reset();
        }
    }
}

#[inline]
fn render_sample(
    x: f64,
    splitter: &mut BandSplitter,
    shapers: &mut [DistortionProcessor; BAND_COUNT],
    plan: &MixPlan,
) -> f64 {
    let dry = x * plan.input_gain;
    let bands = splitter.split(dry);

    let mut outputs = [0.0; BAND_COUNT];
    for (i, out) in outputs.iter_mut().enumerate() {
        let gains = &plan.bands[i];
        *out = shapers[i].process_sample(bands[i] * gains.drive) * gains.level;
    }

    plan.blend(dry, plan.sum_bands(outputs))
}

/// The four-band distortion processor
#[derive(Debug)]
pub struct MultibandDistortion {
    constants: ShaperConstants,
    stream: Option<StreamConfig>,
    oversampling: OversamplingFactor,
    /// Crossovers currently applied to the filters (already clamped)
    crossovers: CrossoverFrequencies,
    kinds: [DistortionKind; BAND_COUNT],
    channels: Vec<ChannelProcessor>,
    scope: Option<ScopeProducer>,
}

impl MultibandDistortion {
    /// Create an engine with fixed waveshaper constants
    pub fn new(constants: ShaperConstants) -> Result<Self> {
        constants.validate()?;

        Ok(Self {
            constants,
            stream: None,
            oversampling: OversamplingFactor::X1,
            crossovers: CrossoverFrequencies::default(),
            kinds: [DistortionKind::None; BAND_COUNT],
            channels: Vec::new(),
            scope: None,
        })
    }

    /// (Re)allocate all channel state for a stream
    ///
    /// Filter, oversampler and DC state start from zero.
    pub fn prepare(&mut self, config: &StreamConfig) -> Result<()> {
        config.validate()?;

        let channel_count = usize::from(config.channels.count());
        let max_block_size = config.max_block_size as usize;
        let effective_rate = f64::from(config.sample_rate.hz()) * self.oversampling.factor() as f64;
        self.crossovers = self.crossovers.clamped(effective_rate);

        self.channels = (0..channel_count)
            .map(|_| {
                let mut oversampler = Oversampler::new(max_block_size);
                oversampler.set_factor(self.oversampling);
                ChannelProcessor {
                    oversampler,
                    splitter: BandSplitter::new(self.crossovers, effective_rate),
                    shapers: self
                        .kinds
                        .map(|kind| DistortionProcessor::new(kind, self.constants)),
                }
            })
            .collect();
        self.stream = Some(*config);

        info!(
            "Engine prepared: {} Hz, {} channels, max block {}, oversampling {}",
            config.sample_rate.hz(),
            channel_count,
            max_block_size,
            self.oversampling
        );
        Ok(())
    }

    pub fn is_prepared(&self) -> bool {
        self.stream.is_some()
    }

    pub fn stream_config(&self) -> Option<&StreamConfig> {
        self.stream.as_ref()
    }

    pub fn constants(&self) -> &ShaperConstants {
        &self.constants
    }

    pub fn oversampling(&self) -> OversamplingFactor {
        self.oversampling
    }

    /// Crossovers currently in effect, after clamping
    pub fn crossovers(&self) -> CrossoverFrequencies {
        self.crossovers
    }

    pub fn distortion_kinds(&self) -> [DistortionKind; BAND_COUNT] {
        self.kinds
    }

    /// Host rate times the oversampling factor (0 before `prepare`)
    pub fn effective_sample_rate(&self) -> f64 {
        self.stream.map_or(0.0, |stream| {
            f64::from(stream.sample_rate.hz()) * self.oversampling.factor() as f64
        })
    }

    /// Mirror channel 0 of every processed block into `producer`
    pub fn attach_scope(&mut self, producer: ScopeProducer) {
        self.scope = Some(producer);
    }

    pub fn detach_scope(&mut self) -> Option<ScopeProducer> {
        self.scope.take()
    }

    /// Zero every filter, oversampler and DC state
    pub fn reset(&mut self) {
        for channel in &mut self.channels {
            channel.reset();
        }
        debug!("Engine state reset");
    }

    /// Process one block in place
    ///
    /// `channels` must hold exactly the prepared number of channels, all of
    /// the same length, no longer than the prepared maximum block size.
    pub fn process_block<C: AsMut<[f32]>>(
        &mut self,
        channels: &mut [C],
        controls: &ControlSnapshot,
    ) -> Result<()> {
        let stream = self.stream.ok_or(AudioError::NotPrepared)?;

        if channels.len() != self.channels.len() {
            return Err(AudioError::ChannelMismatch {
                expected: self.channels.len(),
                actual: channels.len(),
            });
        }

        let len = channels.first_mut().map_or(0, |c| c.as_mut().len());
        if channels.iter_mut().any(|c| c.as_mut().len() != len) {
            return Err(AudioError::RaggedBlock);
        }

        let max = stream.max_block_size as usize;
        if len > max {
            return Err(AudioError::BlockTooLarge { len, max });
        }

        let controls = controls.sanitized();
        self.apply_controls(&controls);
        let plan = MixPlan::new(&controls.bands, &controls.globals);

        for (buffer, channel) in channels.iter_mut().zip(&mut self.channels) {
            channel.process(buffer.as_mut(), &plan);
        }

        if let (Some(scope), Some(first)) = (self.scope.as_mut(), channels.first_mut()) {
            scope.push(first.as_mut());
        }

        Ok(())
    }

    /// Bring oversampling, crossovers and waveshapers in line with `controls`
    fn apply_controls(&mut self, controls: &ControlSnapshot) {
        let factor = controls.globals.oversampling;
        if factor != self.oversampling {
            self.set_oversampling(factor);
        }

        let requested = controls.crossovers;
        let clamped = requested.clamped(self.effective_sample_rate());
        if clamped != requested {
            debug!(
                "Crossovers {:?} clamped to {:?}",
                requested.as_array(),
                clamped.as_array()
            );
        }
        if clamped != self.crossovers {
            for channel in &mut self.channels {
                channel.splitter.set_frequencies(clamped);
            }
            self.crossovers = clamped;
        }

        for (i, band) in controls.bands.iter().enumerate() {
            if band.distortion != self.kinds[i] {
                debug!(
                    "Band {} distortion: {} -> {}",
                    i + 1,
                    self.kinds[i],
                    band.distortion
                );
                for channel in &mut self.channels {
                    channel.shapers[i].set_kind(band.distortion);
                }
                self.kinds[i] = band.distortion;
            }
        }
    }

    /// Full rebuild for a new oversampling factor: new filter rate, zeroed state
    fn set_oversampling(&mut self, factor: OversamplingFactor) {
        info!("Oversampling changed: {} -> {}", self.oversampling, factor);
        self.oversampling = factor;

        let effective_rate = self.effective_sample_rate();
        for channel in &mut self.channels {
            channel.oversampler.set_factor(factor);
            channel.splitter.set_sample_rate(effective_rate);
            for shaper in &mut channel.shapers {
                shaper.reset();
            }
        }
    }
}
