//! Error type for the LC898 flash and calibration engine.

/// Error type for LC898 operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Bus communication error (I2C or host transport).
    Bus,
    /// Invalid data, length, or configuration.
    InvalidData,
    /// Unknown flash mat selector.
    InvalidMat,
    /// Angle outside [-180, 180] degrees.
    InvalidAngle,
    /// Arrangement index outside the supported table.
    InvalidArrangement,
    /// Actuator type outside the supported table.
    InvalidActuator,
    /// Operation not supported by this chip profile.
    Unsupported,
    /// Flash unlock flag was not observed.
    Unlock,
    /// Additional (info/trim mat) unlock sequence was rejected.
    AdditionalUnlock,
    /// Flash did not return to the protected state.
    Protect,
    /// Block erase did not complete within the poll budget.
    EraseTimeout,
    /// Page load or page program did not complete within the poll budget.
    ProgramTimeout,
    /// Device checksum unit did not complete within the poll budget.
    ChecksumTimeout,
    /// Boot ROM did not report normal operation after remap.
    RemapTimeout,
    /// Measurement sample counter did not reach zero within the poll budget.
    MeasureTimeout,
    /// Oscillator measurement window did not complete.
    OscTimeout,
    /// Computed checksum differs from the golden value.
    ChecksumMismatch,
    /// Flash read-back differs from the data written.
    VerifyMismatch,
    /// Core reset left the boot ROM in an unexpected state.
    CoreReset,
}
