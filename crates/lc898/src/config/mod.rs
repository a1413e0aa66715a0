//! Configuration for the LC898 engine.

pub(crate) mod profile;

pub use profile::{Chip, ChipProfile, PollBudget, Timing};

use crate::calibration::{GYROFFSET_H, MeasureMode};
use crate::error::Error;

/// Default number of samples accumulated per measurement.
pub const DEFAULT_SAMPLE_COUNT: u16 = 2048;

/// Calibration and measurement settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Samples accumulated per measurement window.
    pub sample_count: u16,
    /// Maximum accepted |offset| (upper 16 bits of the ADC word).
    pub offset_threshold: i16,
    /// Use the partial accumulation when the sample counter does not drain.
    pub accept_partial_measurement: bool,
    /// Filter set used for offset measurements.
    pub measure_mode: MeasureMode,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Creates a default configuration.
    pub const fn new() -> Self {
        Self {
            sample_count: DEFAULT_SAMPLE_COUNT,
            offset_threshold: GYROFFSET_H,
            accept_partial_measurement: false,
            measure_mode: MeasureMode::OffsetCalibration,
        }
    }

    /// Sets the sample count.
    #[must_use]
    pub const fn with_sample_count(mut self, sample_count: u16) -> Self {
        self.sample_count = sample_count;
        self
    }

    /// Sets the offset classification threshold.
    #[must_use]
    pub const fn with_offset_threshold(mut self, threshold: i16) -> Self {
        self.offset_threshold = threshold;
        self
    }

    /// Accepts or rejects partial measurements.
    #[must_use]
    pub const fn with_partial_measurement(mut self, accept: bool) -> Self {
        self.accept_partial_measurement = accept;
        self
    }

    /// Sets the measurement filter mode.
    #[must_use]
    pub const fn with_measure_mode(mut self, mode: MeasureMode) -> Self {
        self.measure_mode = mode;
        self
    }

    /// Validates the configuration.
    pub(crate) const fn validate(&self) -> Result<(), Error> {
        if self.sample_count == 0 || self.offset_threshold <= 0 {
            return Err(Error::InvalidData);
        }
        Ok(())
    }
}
