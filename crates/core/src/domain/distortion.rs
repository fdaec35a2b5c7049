//! Waveshaping distortion with DC removal
//!
//! Each band owns one [`DistortionProcessor`] per channel. The processor is a
//! pure function of the selected [`DistortionKind`] except for the asymmetric
//! and rectifying shapes, which pass their output through a slow one-pole
//! [`DcBlocker`] to remove the bias they create.

use crate::domain::audio::{AudioError, Result};
use crate::domain::mixer::db_to_gain;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Selectable waveshaper
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DistortionKind {
    #[default]
    None,
    HardClip,
    SoftClip,
    Exponential,
    CubicClip,
    Arctangent,
    Asymmetric,
    FullRectify,
    HalfRectify,
}

impl DistortionKind {
    /// Every kind, in choice-list order
    pub const ALL: [DistortionKind; 9] = [
        DistortionKind::None,
        DistortionKind::HardClip,
        DistortionKind::SoftClip,
        DistortionKind::Exponential,
        DistortionKind::CubicClip,
        DistortionKind::Arctangent,
        DistortionKind::Asymmetric,
        DistortionKind::FullRectify,
        DistortionKind::HalfRectify,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DistortionKind::None => "None",
            DistortionKind::HardClip => "Hard Clip",
            DistortionKind::SoftClip => "Soft Clip",
            DistortionKind::Exponential => "Exponential",
            DistortionKind::CubicClip => "Cubic Clip",
            DistortionKind::Arctangent => "Arctangent",
            DistortionKind::Asymmetric => "Asymmetric",
            DistortionKind::FullRectify => "Full Rectify",
            DistortionKind::HalfRectify => "Half Rectify",
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Whether the shape biases its output and runs through the DC blocker
    pub fn needs_dc_removal(self) -> bool {
        matches!(
            self,
            DistortionKind::Asymmetric | DistortionKind::FullRectify | DistortionKind::HalfRectify
        )
    }
}

impl fmt::Display for DistortionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DistortionKind {
    type Err = AudioError;

    /// Accepts display names and their compact forms ("Hard Clip", "hard-clip", "hardclip")
    fn from_str(s: &str) -> Result<Self> {
        let wanted: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();

        Self::ALL
            .iter()
            .copied()
            .find(|kind| {
                let name: String = kind
                    .name()
                    .chars()
                    .filter(|c| c.is_ascii_alphanumeric())
                    .map(|c| c.to_ascii_lowercase())
                    .collect();
                name == wanted
            })
            .ok_or_else(|| AudioError::InvalidConfiguration(format!("unknown distortion type '{}'", s)))
    }
}

/// Fixed constants of the waveshapers
///
/// Chosen once per engine instance so output stays deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaperConstants {
    /// Clip level of `HardClip`
    pub hard_clip_threshold: f64,
    /// G of the exponential shaper
    pub exponential_gain: f64,
    /// G of the arctangent and asymmetric shapers
    pub arctangent_gain: f64,
    /// H, extra gain applied to the negative half in `Asymmetric`
    pub asymmetry: f64,
    /// Smoothing coefficient of the DC estimate
    pub dc_alpha: f64,
}

impl Default for ShaperConstants {
    fn default() -> Self {
        Self {
            hard_clip_threshold: 1.0,
            exponential_gain: 5.0,
            arctangent_gain: 5.0,
            asymmetry: 2.0,
            dc_alpha: 0.999,
        }
    }
}

impl ShaperConstants {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("hard_clip_threshold", self.hard_clip_threshold),
            ("exponential_gain", self.exponential_gain),
            ("arctangent_gain", self.arctangent_gain),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(AudioError::InvalidConfiguration(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }

        if !self.asymmetry.is_finite() || self.asymmetry < 1.0 {
            return Err(AudioError::InvalidConfiguration(format!(
                "asymmetry must be at least 1.0, got {}",
                self.asymmetry
            )));
        }

        if !(self.dc_alpha > 0.0 && self.dc_alpha < 1.0) {
            return Err(AudioError::InvalidConfiguration(format!(
                "dc_alpha must lie in (0, 1), got {}",
                self.dc_alpha
            )));
        }

        Ok(())
    }
}

/// One-pole DC estimator: `estimate = a*estimate + (1-a)*x`, output `x - estimate`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DcBlocker {
    estimate: f64,
    alpha: f64,
}

impl DcBlocker {
    pub fn new(alpha: f64) -> Self {
        Self {
            estimate: 0.0,
            alpha,
        }
    }

    #[inline]
    pub fn process_sample(&mut self, x: f64) -> f64 {
        self.estimate = self.alpha * self.estimate + (1.0 - self.alpha) * x;
        x - self.estimate
    }

    pub fn estimate(&self) -> f64 {
        self.estimate
    }

    pub fn reset(&mut self) {
        self.estimate = 0.0;
    }
}

/// Per-band, per-channel waveshaper
#[derive(Debug, Clone)]
pub struct DistortionProcessor {
    kind: DistortionKind,
    constants: ShaperConstants,
    /// 1/atan(G)
    atan_norm: f64,
    /// 1/atan(G*H)
    atan_norm_negative: f64,
    dc: DcBlocker,
}

impl DistortionProcessor {
    pub fn new(kind: DistortionKind, constants: ShaperConstants) -> Self {
        let g = constants.arctangent_gain;
        Self {
            kind,
            constants,
            atan_norm: 1.0 / g.atan(),
            atan_norm_negative: 1.0 / (g * constants.asymmetry).atan(),
            dc: DcBlocker::new(constants.dc_alpha),
        }
    }

    pub fn kind(&self) -> DistortionKind {
        self.kind
    }

    pub fn constants(&self) -> &ShaperConstants {
        &self.constants
    }

    /// Switch the shape; the DC estimate is cleared on an actual change
    pub fn set_kind(&mut self, kind: DistortionKind) {
        if kind == self.kind {
            return;
        }
        self.kind = kind;
        self.dc.reset();
    }

    /// The static transfer function, without DC removal
    #[inline]
    pub fn shape(&self, x: f64) -> f64 {
        let c = &self.constants;
        match self.kind {
            DistortionKind::None => x,
            DistortionKind::HardClip => x.clamp(-c.hard_clip_threshold, c.hard_clip_threshold),
            DistortionKind::SoftClip => x / (1.0 + x.abs()),
            DistortionKind::Exponential => (1.0 - (-c.exponential_gain * x.abs()).exp()).copysign(x),
            DistortionKind::CubicClip => (1.5 * x - 0.5 * x * x * x).clamp(-1.0, 1.0),
            DistortionKind::Arctangent => (c.arctangent_gain * x).atan() * self.atan_norm,
            DistortionKind::Asymmetric => {
                if x >= 0.0 {
                    (c.arctangent_gain * x).atan() * self.atan_norm
                } else {
                    (c.arctangent_gain * c.asymmetry * x).atan() * self.atan_norm_negative
                }
            }
            DistortionKind::FullRectify => x.abs(),
            DistortionKind::HalfRectify => x.max(0.0),
        }
    }

    #[inline]
    pub fn process_sample(&mut self, x: f64) -> f64 {
        let y = self.shape(x);
        if self.kind.needs_dc_removal() {
            self.dc.process_sample(y)
        } else {
            y
        }
    }

    pub fn dc_estimate(&self) -> f64 {
        self.dc.estimate()
    }

    pub fn reset(&mut self) {
        self.dc.reset();
    }
}

/// Static curve of `kind` over x in [-1, 1] with `drive_db` applied, for display
pub fn transfer_curve(
    kind: DistortionKind,
    constants: ShaperConstants,
    drive_db: f64,
    points: usize,
) -> Vec<(f64, f64)> {
    let shaper = DistortionProcessor::new(kind, constants);
    let drive = db_to_gain(drive_db);
    let points = points.max(2);
    let step = 2.0 / (points - 1) as f64;

    (0..points)
        .map(|i| {
            let x = -1.0 + step * i as f64;
            (x, shaper.shape(x * drive))
        })
        .collect()
}
