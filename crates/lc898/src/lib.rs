//! Async `#![no_std]` flash and calibration engine for the LC898128 and
//! LC898129 optical image stabilization controllers.
//!
//! The crate drives the controller's on-chip flash (unlock, erase, program,
//! verify, protect), runs the full firmware update, measures and commits
//! gyro/accelerometer offsets, builds the angle-correction matrix, and
//! adjusts the LC898129 oscillator trim. It is generic over a 32-bit
//! register transport ([`Interface`]) and an `embedded-hal-async` delay.
//!
//! # Quick start (I2C)
//!
//! ```rust,no_run
//! use ph_lc898::{Chip, FirmwareImage, Lc898I2c};
//! # use embedded_hal_async::delay::DelayNs;
//! # use embedded_hal_async::i2c::I2c;
//! #
//! # async fn example<I2C: I2c, D: DelayNs>(
//! #     i2c: I2C,
//! #     delay: &mut D,
//! #     update_code: &[u8],
//! #     from_code: &[u8],
//! # ) -> Result<(), ph_lc898::Error> {
//! let mut ois: Lc898I2c<I2C> = Lc898I2c::new_i2c(i2c, Chip::Lc898128);
//! let image = FirmwareImage::with_computed_checksums(update_code, from_code)?;
//! ois.flash_update(delay, &image).await?;
//!
//! let report = ois.gyro_offset_calibration(delay).await?;
//! if report.committed {
//!     ois.write_offsets_to_flash(delay, &report.result).await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Flash safety
//!
//! Operations that unlock flash re-protect it before returning, including on
//! error paths. Dropping a future between register transactions leaves the
//! chip in whatever state the last transaction put it in; an erase in
//! progress cannot be aborted.
//!
//! # Fixed-point conversions
//!
//! Enable the `fixed` feature for `I1F31` views of the Q31 coefficients and
//! gains.

#![no_std]
#![deny(missing_docs)]
#![deny(unsafe_code)]
// Clippy lint levels live here.
#![deny(clippy::correctness)]
#![warn(
    clippy::suspicious,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::cloned_instead_of_copied,
    clippy::explicit_iter_loop,
    clippy::implicit_clone,
    clippy::inconsistent_struct_constructor,
    clippy::manual_assert,
    clippy::manual_let_else,
    clippy::match_same_arms,
    clippy::needless_pass_by_value,
    clippy::semicolon_if_nothing_returned,
    clippy::uninlined_format_args,
    clippy::unnested_or_patterns,
    clippy::std_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::alloc_instead_of_core
)]
#![allow(
    clippy::mod_module_files,
    clippy::self_named_module_files,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_lossless,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::module_name_repetitions,
    clippy::wildcard_imports,
    clippy::items_after_statements,
    clippy::let_underscore_future
)]

#[cfg(feature = "fixed")]
extern crate fixed as fixed_crate;

mod angle;
mod calibration;
mod checksum;
mod config;
mod device;
mod driver;
mod error;
mod flash;
mod interface;
mod macros;
mod osc;
mod register;

#[cfg(feature = "fixed")]
mod fixed;

#[cfg(test)]
mod testing;

// Interface layer
pub use interface::Interface;
pub use interface::{DEFAULT_ADDRESS, I2cConfig, I2cInterface};

// Configuration
pub use config::{Chip, ChipProfile, PollBudget, Timing};
pub use config::{Config, DEFAULT_SAMPLE_COUNT};

// Driver
pub use driver::{Lc898, Lc898I2c};
pub use error::Error;

// Flash
pub use flash::{FirmwareImage, FlashMat, Mat2Status};

// Checksums
pub use checksum::{
    CRC16_INIT,
    CRC16_POLY,
    ChecksumKind,
    Crc16,
    byte_sum16,
    byte_sum_checksum16,
    crc16,
    nibble_sum,
};

// Calibration
pub use calibration::{
    AxisPair,
    CalibrationReport,
    CalibrationResult,
    CalibrationStatus,
    GYROFFSET_H,
    GyroGain,
    MeasureMode,
    classify,
};

// Angle correction
pub use angle::{
    ARRANGEMENTS,
    AngleCorrectionMatrix,
    AxisConversion,
    Q31_NEGATIVE,
    Q31_POSITIVE,
    Q31_ZERO,
    angle_correction_matrix,
};

// Oscillator trim
pub use osc::{DEFAULT_ADJUST_DIVIDER, OscAdjOutcome, OscConfig, OscCounter, TRIM_MASK, trim_adj};

// Fixed-point conversions (feature-gated)
#[cfg(feature = "fixed")]
pub use fixed::{
    AxisConversionFixed, GyroGainFixed, Q31, axis_conversion_fixed, gyro_gain_fixed,
    q31_from_word, q31_to_word, rotation_fixed,
};
