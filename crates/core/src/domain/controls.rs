//! Control values shared between the UI thread and the audio thread
//!
//! The UI (or host) writes individual values into [`SharedControls`]; the
//! audio thread takes one [`ControlSnapshot`] per block with plain atomic
//! loads. No lock is ever shared between the two threads.

use crate::domain::crossover::{Band, CrossoverFrequencies, BAND_COUNT};
use crate::domain::distortion::DistortionKind;
use crate::domain::mixer::{BandControls, GlobalControls};
use crate::domain::oversampling::OversamplingFactor;
use crossbeam::atomic::AtomicCell;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Accepted ranges of the continuous controls
pub mod params {
    use std::ops::RangeInclusive;

    pub const DRIVE_DB: RangeInclusive<f64> = 0.0..=24.0;
    pub const LEVEL_DB: RangeInclusive<f64> = -24.0..=24.0;
    pub const INPUT_GAIN_DB: RangeInclusive<f64> = -24.0..=24.0;
    pub const OUTPUT_GAIN_DB: RangeInclusive<f64> = -24.0..=24.0;
    pub const MIX: RangeInclusive<f64> = 0.0..=1.0;
    /// Applied before the ordering clamp of the crossover network
    pub const CROSSOVER_HZ: RangeInclusive<f64> = 20.0..=20000.0;
}

/// Clamp into `range`; NaN falls back to `fallback`
fn sanitize(value: f64, range: RangeInclusive<f64>, fallback: f64) -> f64 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(*range.start(), *range.end())
    }
}

/// Every control value the engine reads for one block
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSnapshot {
    pub bands: [BandControls; BAND_COUNT],
    pub crossovers: CrossoverFrequencies,
    pub globals: GlobalControls,
}

impl ControlSnapshot {
    pub fn band(&self, band: Band) -> &BandControls {
        &self.bands[band.index()]
    }

    pub fn band_mut(&mut self, band: Band) -> &mut BandControls {
        &mut self.bands[band.index()]
    }

    /// Copy with every continuous value forced into its documented range
    ///
    /// Crossover ordering is not enforced here; that depends on the
    /// effective sample rate and is done by the engine.
    #[must_use]
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        let mut out = *self;

        for (band, default) in out.bands.iter_mut().zip(defaults.bands) {
            band.drive_db = sanitize(band.drive_db, params::DRIVE_DB, default.drive_db);
            band.level_db = sanitize(band.level_db, params::LEVEL_DB, default.level_db);
        }

        let xo = &mut out.crossovers;
        xo.low = sanitize(xo.low, params::CROSSOVER_HZ, defaults.crossovers.low);
        xo.mid = sanitize(xo.mid, params::CROSSOVER_HZ, defaults.crossovers.mid);
        xo.high = sanitize(xo.high, params::CROSSOVER_HZ, defaults.crossovers.high);

        let g = &mut out.globals;
        g.input_gain_db = sanitize(
            g.input_gain_db,
            params::INPUT_GAIN_DB,
            defaults.globals.input_gain_db,
        );
        g.output_gain_db = sanitize(
            g.output_gain_db,
            params::OUTPUT_GAIN_DB,
            defaults.globals.output_gain_db,
        );
        g.mix = sanitize(g.mix, params::MIX, defaults.globals.mix);

        out
    }
}

#[derive(Debug, Default)]
struct SharedBand {
    drive_db: AtomicCell<f64>,
    level_db: AtomicCell<f64>,
    distortion: AtomicCell<DistortionKind>,
    mute: AtomicCell<bool>,
    solo: AtomicCell<bool>,
}

impl SharedBand {
    fn store(&self, band: &BandControls) {
        self.drive_db.store(band.drive_db);
        self.level_db.store(band.level_db);
        self.distortion.store(band.distortion);
        self.mute.store(band.mute);
        self.solo.store(band.solo);
    }

    fn load(&self) -> BandControls {
        BandControls {
            drive_db: self.drive_db.load(),
            level_db: self.level_db.load(),
            distortion: self.distortion.load(),
            mute: self.mute.load(),
            solo: self.solo.load(),
        }
    }
}

/// Wait-free control surface
///
/// Every value is its own [`AtomicCell`], so a snapshot may mix values from
/// before and after a concurrent UI edit; each individual value is always
/// whole.
#[derive(Debug)]
pub struct SharedControls {
    bands: [SharedBand; BAND_COUNT],
    crossover_low: AtomicCell<f64>,
    crossover_mid: AtomicCell<f64>,
    crossover_high: AtomicCell<f64>,
    input_gain_db: AtomicCell<f64>,
    output_gain_db: AtomicCell<f64>,
    mix: AtomicCell<f64>,
    bypass: AtomicCell<bool>,
    oversampling: AtomicCell<OversamplingFactor>,
}

impl Default for SharedControls {
    fn default() -> Self {
        Self::new(&ControlSnapshot::default())
    }
}

impl SharedControls {
    pub fn new(initial: &ControlSnapshot) -> Self {
        let controls = Self {
            bands: Default::default(),
            crossover_low: AtomicCell::new(0.0),
            crossover_mid: AtomicCell::new(0.0),
            crossover_high: AtomicCell::new(0.0),
            input_gain_db: AtomicCell::new(0.0),
            output_gain_db: AtomicCell::new(0.0),
            mix: AtomicCell::new(0.0),
            bypass: AtomicCell::new(false),
            oversampling: AtomicCell::new(OversamplingFactor::X1),
        };
        controls.store(initial);
        controls
    }

    /// Publish a whole snapshot (value by value)
    pub fn store(&self, snapshot: &ControlSnapshot) {
        for (shared, band) in self.bands.iter().zip(&snapshot.bands) {
            shared.store(band);
        }
        self.set_crossovers(snapshot.crossovers);

        let g = &snapshot.globals;
        self.input_gain_db.store(g.input_gain_db);
        self.output_gain_db.store(g.output_gain_db);
        self.mix.store(g.mix);
        self.bypass.store(g.bypass);
        self.oversampling.store(g.oversampling);
    }

    /// Audio-thread read: one atomic load per value
    pub fn snapshot(&self) -> ControlSnapshot {
        ControlSnapshot {
            bands: [
                self.bands[0].load(),
                self.bands[1].load(),
                self.bands[2].load(),
                self.bands[3].load(),
            ],
            crossovers: CrossoverFrequencies {
                low: self.crossover_low.load(),
                mid: self.crossover_mid.load(),
                high: self.crossover_high.load(),
            },
            globals: GlobalControls {
                input_gain_db: self.input_gain_db.load(),
                output_gain_db: self.output_gain_db.load(),
                mix: self.mix.load(),
                bypass: self.bypass.load(),
                oversampling: self.oversampling.load(),
            },
        }
    }

    pub fn set_band_drive(&self, band: Band, drive_db: f64) {
        self.bands[band.index()].drive_db.store(drive_db);
    }

    pub fn set_band_level(&self, band: Band, level_db: f64) {
        self.bands[band.index()].level_db.store(level_db);
    }

    /// Select a band's waveshaper
    ///
    /// Takes effect at the next block boundary of the audio thread; filter
    /// and DC state owned by the engine are not touched from here.
    pub fn set_band_distortion(&self, band: Band, kind: DistortionKind) {
        self.bands[band.index()].distortion.store(kind);
    }

    pub fn set_band_mute(&self, band: Band, mute: bool) {
        self.bands[band.index()].mute.store(mute);
    }

    pub fn set_band_solo(&self, band: Band, solo: bool) {
        self.bands[band.index()].solo.store(solo);
    }

    pub fn set_crossovers(&self, crossovers: CrossoverFrequencies) {
        self.crossover_low.store(crossovers.low);
        self.crossover_mid.store(crossovers.mid);
        self.crossover_high.store(crossovers.high);
    }

    pub fn set_input_gain(&self, db: f64) {
        self.input_gain_db.store(db);
    }

    pub fn set_output_gain(&self, db: f64) {
        self.output_gain_db.store(db);
    }

    pub fn set_mix(&self, mix: f64) {
        self.mix.store(mix);
    }

    pub fn set_bypass(&self, bypass: bool) {
        self.bypass.store(bypass);
    }

    pub fn set_oversampling(&self, factor: OversamplingFactor) {
        self.oversampling.store(factor);
    }
}
