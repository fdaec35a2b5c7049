//! Band mixer and gain staging
//!
//! This module resolves the user-facing band and global controls (decibels,
//! mute/solo flags) into the linear gains the per-sample loop applies, and
//! implements the band summing and dry/wet blend.

use crate::domain::crossover::BAND_COUNT;
use crate::domain::distortion::DistortionKind;
use crate::domain::oversampling::OversamplingFactor;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Convert decibels to linear amplitude factor
#[inline]
pub fn db_to_gain(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// Convert linear amplitude factor to decibels
pub fn gain_to_db(gain: f64) -> f64 {
    if gain <= 0.0 {
        f64::NEG_INFINITY
    } else {
        20.0 * gain.log10()
    }
}

/// Controls of one band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandControls {
    /// Pre-distortion gain in dB
    pub drive_db: f64,
    /// Post-distortion gain in dB
    pub level_db: f64,
    pub distortion: DistortionKind,
    pub mute: bool,
    pub solo: bool,
}

impl Default for BandControls {
    fn default() -> Self {
        Self {
            drive_db: 0.0,
            level_db: 0.0,
            distortion: DistortionKind::None,
            mute: false,
            solo: false,
        }
    }
}

impl BandControls {
    /// Check if band is audible (not muted and not isolated by another band's solo)
    pub fn is_audible(&self, any_solo: bool) -> bool {
        if self.mute {
            return false;
        }
        if any_solo && !self.solo {
            return false;
        }
        true
    }
}

/// Controls that act on the whole signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalControls {
    pub input_gain_db: f64,
    pub output_gain_db: f64,
    /// Dry/wet fraction, 0 = dry only, 1 = wet only
    pub mix: f64,
    pub bypass: bool,
    pub oversampling: OversamplingFactor,
}

impl Default for GlobalControls {
    fn default() -> Self {
        Self {
            input_gain_db: 0.0,
            output_gain_db: 0.0,
            mix: 1.0,
            bypass: false,
            oversampling: OversamplingFactor::X1,
        }
    }
}

/// Linear gains of one band for the current block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandGains {
    pub drive: f64,
    pub level: f64,
    pub audible: bool,
}

/// Everything the sample loop needs, resolved once per block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixPlan {
    pub bands: [BandGains; BAND_COUNT],
    pub input_gain: f64,
    pub output_gain: f64,
    pub mix: f64,
    pub bypass: bool,
}

impl MixPlan {
    pub fn new(bands: &[BandControls; BAND_COUNT], globals: &GlobalControls) -> Self {
        let any_solo = bands.iter().any(|band| band.solo);

        let plan = Self {
            bands: bands.map(|band| BandGains {
                drive: db_to_gain(band.drive_db),
                level: db_to_gain(band.level_db),
                audible: band.is_audible(any_solo),
            }),
            input_gain: db_to_gain(globals.input_gain_db),
            output_gain: db_to_gain(globals.output_gain_db),
            mix: globals.mix,
            bypass: globals.bypass,
        };

        trace!(
            "Mix plan: audible={:?} out={:.3} mix={:.2}",
            plan.bands.map(|band| band.audible),
            plan.output_gain,
            plan.mix
        );
        plan
    }

    /// Sum of the gated band outputs (already leveled)
    #[inline]
    pub fn sum_bands(&self, outputs: [f64; BAND_COUNT]) -> f64 {
        let mut sum = 0.0;
        for (gains, y) in self.bands.iter().zip(outputs) {
            if gains.audible {
                sum += y;
            }
        }
        sum
    }

    /// Apply output gain to the band sum and blend with the dry signal
    #[inline]
    pub fn blend(&self, dry: f64, band_sum: f64) -> f64 {
        let wet = band_sum * self.output_gain;
        dry * (1.0 - self.mix) + wet * self.mix
    }
}
