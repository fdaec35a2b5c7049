//! Four-band crossover network
//!
//! Six Linkwitz-Riley sections per channel, every one fed from the same input:
//!
//! ```text
//! Low     = LP(f1)
//! LowMid  = LP(f2) <- HP(f1)
//! HighMid = LP(f3) <- HP(f2)
//! High    = HP(f3)
//! ```

use crate::domain::filter::CrossoverFilter;
use serde::{Deserialize, Serialize};

/// Number of bands produced by the splitter
pub const BAND_COUNT: usize = 4;

/// One of the four frequency ranges of the crossover network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Band {
    Low,
    LowMid,
    HighMid,
    High,
}

impl Band {
    pub const ALL: [Band; BAND_COUNT] = [Band::Low, Band::LowMid, Band::HighMid, Band::High];

    pub fn index(self) -> usize {
        match self {
            Band::Low => 0,
            Band::LowMid => 1,
            Band::HighMid => 2,
            Band::High => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Band::Low => "Low",
            Band::LowMid => "Low Mid",
            Band::HighMid => "High Mid",
            Band::High => "High",
        }
    }
}

/// The three split points of the network, in Hz
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrossoverFrequencies {
    pub low: f64,
    pub mid: f64,
    pub high: f64,
}

impl Default for CrossoverFrequencies {
    fn default() -> Self {
        Self {
            low: 200.0,
            mid: 1000.0,
            high: 5000.0,
        }
    }
}

impl CrossoverFrequencies {
    /// Lowest crossover the network will accept
    pub const FLOOR_HZ: f64 = 20.0;
    /// Minimum distance between two adjacent crossovers
    pub const MIN_SEPARATION_HZ: f64 = 50.0;
    /// Fraction of the effective Nyquist frequency the top crossover may reach
    pub const NYQUIST_MARGIN: f64 = 0.95;

    pub fn new(low: f64, mid: f64, high: f64) -> Self {
        Self { low, mid, high }
    }

    /// Highest crossover allowed at `effective_rate`
    pub fn ceiling(effective_rate: f64) -> f64 {
        effective_rate / 2.0 * Self::NYQUIST_MARGIN
    }

    /// Enforce ordering, separation and the Nyquist ceiling
    ///
    /// Upward pass from the floor first, then a downward pass from the
    /// ceiling of `effective_rate` (host rate times oversampling factor).
    #[must_use]
    pub fn clamped(&self, effective_rate: f64) -> Self {
        let sep = Self::MIN_SEPARATION_HZ;

        let mut low = self.low.max(Self::FLOOR_HZ);
        let mut mid = self.mid.max(low + sep);
        let mut high = self.high.max(mid + sep);

        high = high.min(Self::ceiling(effective_rate));
        mid = mid.min(high - sep);
        low = low.min(mid - sep);

        Self { low, mid, high }
    }

    pub fn is_ordered(&self) -> bool {
        self.low < self.mid && self.mid < self.high
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.low, self.mid, self.high]
    }
}

/// Per-channel four-band splitter
#[derive(Debug, Clone)]
pub struct BandSplitter {
    frequencies: CrossoverFrequencies,
    sample_rate: f64,
    low_lp: CrossoverFilter,
    low_mid_hp: CrossoverFilter,
    low_mid_lp: CrossoverFilter,
    high_mid_hp: CrossoverFilter,
    high_mid_lp: CrossoverFilter,
    high_hp: CrossoverFilter,
}

impl BandSplitter {
    /// Build a splitter; `frequencies` should already be clamped for `sample_rate`
    pub fn new(frequencies: CrossoverFrequencies, sample_rate: f64) -> Self {
        let CrossoverFrequencies { low, mid, high } = frequencies;
        Self {
            frequencies,
            sample_rate,
            low_lp: CrossoverFilter::lowpass(low, sample_rate),
            low_mid_hp: CrossoverFilter::highpass(low, sample_rate),
            low_mid_lp: CrossoverFilter::lowpass(mid, sample_rate),
            high_mid_hp: CrossoverFilter::highpass(mid, sample_rate),
            high_mid_lp: CrossoverFilter::lowpass(high, sample_rate),
            high_hp: CrossoverFilter::highpass(high, sample_rate),
        }
    }

    pub fn frequencies(&self) -> CrossoverFrequencies {
        self.frequencies
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Retune the network; filter history is kept
    ///
    /// Only the crossovers that actually moved have their coefficients
    /// recomputed.
    pub fn set_frequencies(&mut self, frequencies: CrossoverFrequencies) {
        if frequencies == self.frequencies {
            return;
        }

        if frequencies.low != self.frequencies.low {
            self.low_lp.set_cutoff(frequencies.low);
            self.low_mid_hp.set_cutoff(frequencies.low);
        }
        if frequencies.mid != self.frequencies.mid {
            self.low_mid_lp.set_cutoff(frequencies.mid);
            self.high_mid_hp.set_cutoff(frequencies.mid);
        }
        if frequencies.high != self.frequencies.high {
            self.high_mid_lp.set_cutoff(frequencies.high);
            self.high_hp.set_cutoff(frequencies.high);
        }

        self.frequencies = frequencies;
    }

    /// Move to a new sample rate and zero every filter's history
    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        for filter in self.filters_mut() {
            filter.set_sample_rate(sample_rate);
            filter.reset();
        }
    }

    /// Split one input sample into its four bands, lowest first
    #[inline]
    pub fn split(&mut self, x: f64) -> [f64; BAND_COUNT] {
        let low = self.low_lp.process_sample(x);
        let low_mid = self.low_mid_lp.process_sample(self.low_mid_hp.process_sample(x));
        let high_mid = self
            .high_mid_lp
            .process_sample(self.high_mid_hp.process_sample(x));
        let high = self.high_hp.process_sample(x);
        [low, low_mid, high_mid, high]
    }

    pub fn reset(&mut self) {
        for filter in self.filters_mut() {
            filter.reset();
        }
    }

    fn filters_mut(&mut self) -> [&mut CrossoverFilter; 6] {
        [
            &mut self.low_lp,
            &mut self.low_mid_hp,
            &mut self.low_mid_lp,
            &mut self.high_mid_hp,
            &mut self.high_mid_lp,
            &mut self.high_hp,
        ]
    }
}
