//! Gyro and accelerometer offset calibration, gyro gain read-back, and
//! persistence of both to the info mats.

use embedded_hal_async::delay::DelayNs;

use crate::checksum::{byte_sum_checksum16, with_checksum_high};
use crate::device::DeviceCore;
use crate::error::Error;
use crate::flash::FlashMat;
use crate::interface::Interface;
use crate::macros::{debug, info, log_warn};
use crate::register::{layout, meas, ram};

/// Largest accepted |offset| in the upper 16 bits of the ADC word.
pub const GYROFFSET_H: i16 = 0x06D6;

/// Q31 unity.
const Q31_ONE: u32 = 0x7FFF_FFFF;

/// Filter coefficient set used by the measurement block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MeasureMode {
    /// Pass-through, for DC offset measurement.
    OffsetCalibration,
    /// Band-pass around the loop crossover.
    LoopGain,
    /// High-pass, for noise measurement.
    NoiseTest,
    /// Low-pass, for self-test response.
    SelfTest,
}

impl MeasureMode {
    /// Coefficients written to filter A and filter B.
    pub const fn coefficients(self) -> [u32; 6] {
        match self {
            Self::OffsetCalibration => [Q31_ONE, 0, 0, 0, 0, 0],
            Self::LoopGain => [
                0x0AF5_A0B5, 0x0000_0000, 0xF50A_5F4B, 0x6A14_BE96, 0x0000_0000, 0x0000_0000,
            ],
            Self::NoiseTest => [
                0x7FE1_2C00, 0x801E_D400, 0x0000_0000, 0x7FC2_5800, 0x0000_0000, 0x0000_0000,
            ],
            Self::SelfTest => [
                0x0067_D800, 0x0067_D800, 0x0000_0000, 0x7F30_5000, 0x0000_0000, 0x0000_0000,
            ],
        }
    }
}

/// Channel pairing for one measurement run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AxisPair {
    /// Channel A = gyro X, channel B = gyro Y.
    GyroXY,
    /// Channel A = gyro Z, channel B = accel Z.
    GyroZAccelZ,
    /// Channel A = accel X, channel B = accel Y.
    AccelXY,
}

impl AxisPair {
    /// Source registers routed to channels A and B.
    pub const fn sources(self) -> (u32, u32) {
        match self {
            Self::GyroXY => (meas::SRC_GYRO_X, meas::SRC_GYRO_Y),
            Self::GyroZAccelZ => (meas::SRC_GYRO_Z, meas::SRC_ACCEL_Z),
            Self::AccelXY => (meas::SRC_ACCEL_X, meas::SRC_ACCEL_Y),
        }
    }
}

/// Calibration classification bitmask. `EXE_END` is always set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationStatus(u32);

impl CalibrationStatus {
    /// Measurement finished, no axis out of tolerance.
    pub const EXE_END: u32 = 0x0000_0002;
    /// Gyro X out of tolerance.
    pub const EXE_GXADJ: u32 = 0x0000_0042;
    /// Gyro Y out of tolerance.
    pub const EXE_GYADJ: u32 = 0x0000_0082;
    /// Gyro Z out of tolerance.
    pub const EXE_GZADJ: u32 = 0x0040_0002;
    /// Accel Z out of tolerance.
    pub const EXE_AZADJ: u32 = 0x0020_0002;
    /// Accel Y out of tolerance.
    pub const EXE_AYADJ: u32 = 0x0010_0002;
    /// Accel X out of tolerance.
    pub const EXE_AXADJ: u32 = 0x0008_0002;

    /// Wraps a raw bitmask.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits | Self::EXE_END)
    }

    /// Raw bitmask.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// `true` when no axis is flagged.
    pub const fn is_clean(self) -> bool {
        self.0 == Self::EXE_END
    }

    /// `true` when every bit of `flag` is set.
    pub const fn contains(self, flag: u32) -> bool {
        self.0 & flag == flag
    }
}

/// Measured offsets, upper 16 bits of the averaged ADC word.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationResult {
    /// Gyro X offset.
    pub gyro_x: i16,
    /// Gyro Y offset.
    pub gyro_y: i16,
    /// Gyro Z offset.
    pub gyro_z: i16,
    /// Accel X offset.
    pub accel_x: i16,
    /// Accel Y offset.
    pub accel_y: i16,
    /// Accel Z offset.
    pub accel_z: i16,
}

impl CalibrationResult {
    /// Packs the offsets as (gx, gy) (gz, ax) (ay, az), first value in the high half.
    pub const fn to_words(&self) -> [u32; 3] {
        [
            pack(self.gyro_x, self.gyro_y),
            pack(self.gyro_z, self.accel_x),
            pack(self.accel_y, self.accel_z),
        ]
    }

    /// Inverse of [`CalibrationResult::to_words`].
    pub const fn from_words(words: [u32; 3]) -> Self {
        Self {
            gyro_x: (words[0] >> 16) as i16,
            gyro_y: words[0] as i16,
            gyro_z: (words[1] >> 16) as i16,
            accel_x: words[1] as i16,
            accel_y: (words[2] >> 16) as i16,
            accel_z: words[2] as i16,
        }
    }
}

const fn pack(high: i16, low: i16) -> u32 {
    ((high as u16 as u32) << 16) | (low as u16 as u32)
}

/// Gyro gain, Q31 fixed point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GyroGain {
    /// X axis gain.
    pub x: u32,
    /// Y axis gain.
    pub y: u32,
}

/// Outcome of an offset calibration run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationReport {
    /// Classification bitmask.
    pub status: CalibrationStatus,
    /// Measured offsets.
    pub result: CalibrationResult,
    /// Offsets were written to the live registers.
    pub committed: bool,
}

/// Flags every axis whose |offset| exceeds `threshold`.
pub fn classify(result: &CalibrationResult, threshold: i16) -> CalibrationStatus {
    let limit = i32::from(threshold);
    let checks = [
        (result.gyro_x, CalibrationStatus::EXE_GXADJ),
        (result.gyro_y, CalibrationStatus::EXE_GYADJ),
        (result.gyro_z, CalibrationStatus::EXE_GZADJ),
        (result.accel_x, CalibrationStatus::EXE_AXADJ),
        (result.accel_y, CalibrationStatus::EXE_AYADJ),
        (result.accel_z, CalibrationStatus::EXE_AZADJ),
    ];
    let bits = checks
        .iter()
        .filter(|(offset, _)| i32::from(*offset).abs() > limit)
        .fold(CalibrationStatus::EXE_END, |bits, (_, flag)| bits | flag);
    CalibrationStatus::from_bits(bits)
}

impl<I> DeviceCore<I>
where
    I: Interface,
{
    /// Measures the average of one channel pair.
    ///
    /// Returns the upper 16 bits of the channel A and B averages.
    pub(crate) async fn measure<D: DelayNs>(
        &mut self,
        delay: &mut D,
        pair: AxisPair,
    ) -> Result<(i16, i16), Error> {
        let config = self.config();
        config.validate()?;
        let budget = self.profile().timing.measure;

        let coefficients = config.measure_mode.coefficients();
        self.write_words(meas::FILTER_A_COEFF, &coefficients).await?;
        self.write_words(meas::FILTER_B_COEFF, &coefficients).await?;
        self.write_words(meas::FILTER_A_DELAY, &[0; 4]).await?;
        self.write_words(meas::FILTER_B_DELAY, &[0; 4]).await?;

        let (source_a, source_b) = pair.sources();
        self.write_reg32(meas::INPUT_A, source_a).await?;
        self.write_reg32(meas::INPUT_B, source_b).await?;

        self.write_words(meas::INTEGRAL_A, &[0; 2]).await?;
        self.write_words(meas::INTEGRAL_B, &[0; 2]).await?;
        self.write_reg32(meas::MAX_A, 0).await?;
        self.write_reg32(meas::MAX_B, 0).await?;

        let requested = u32::from(config.sample_count);
        self.write_reg32(meas::SAMPLE_NUM, requested).await?;
        let mut collected = requested;
        match self
            .poll_until(delay, meas::SAMPLE_NUM, u32::MAX, 0, budget, Error::MeasureTimeout)
            .await
        {
            Ok(()) => {}
            Err(Error::MeasureTimeout) if config.accept_partial_measurement => {
                let remaining = self.read_reg32(meas::SAMPLE_NUM).await?;
                collected = requested.saturating_sub(remaining);
                if collected == 0 {
                    return Err(Error::MeasureTimeout);
                }
                log_warn!(
                    "measurement did not drain, averaging {=u32} of {=u32} samples",
                    collected,
                    requested
                );
            }
            Err(err) => return Err(err),
        }

        let count = i64::from(collected);
        let a = average_high(self.read_i64(meas::INTEGRAL_A).await? / count);
        let b = average_high(self.read_i64(meas::INTEGRAL_B).await? / count);
        debug!("measure {=u32:#x}/{=u32:#x}: {=i16} {=i16}", source_a, source_b, a, b);
        Ok((a, b))
    }

    /// Measures all six axes.
    pub(crate) async fn measure_offsets<D: DelayNs>(
        &mut self,
        delay: &mut D,
    ) -> Result<CalibrationResult, Error> {
        let (gyro_x, gyro_y) = self.measure(delay, AxisPair::GyroXY).await?;
        let (gyro_z, accel_z) = self.measure(delay, AxisPair::GyroZAccelZ).await?;
        let (accel_x, accel_y) = self.measure(delay, AxisPair::AccelXY).await?;
        Ok(CalibrationResult {
            gyro_x,
            gyro_y,
            gyro_z,
            accel_x,
            accel_y,
            accel_z,
        })
    }

    /// Writes offsets to the live offset registers and clears the filter
    /// delay lines fed by them.
    pub(crate) async fn commit_offsets(&mut self, result: &CalibrationResult) -> Result<(), Error> {
        let live = [
            (ram::GYRO_OFFSET_X, result.gyro_x),
            (ram::GYRO_OFFSET_Y, result.gyro_y),
            (ram::GYRO_OFFSET_Z, result.gyro_z),
            (ram::ACCEL_OFFSET_X, result.accel_x),
            (ram::ACCEL_OFFSET_Y, result.accel_y),
            (ram::ACCEL_OFFSET_Z, result.accel_z),
        ];
        for (addr, offset) in live {
            self.write_reg32(addr, (i32::from(offset) << 16) as u32)
                .await?;
        }
        for addr in ram::OFFSET_FILTER_DELAYS {
            self.write_reg32(addr, 0).await?;
        }
        Ok(())
    }

    /// Measures, classifies, and commits only a clean result.
    pub(crate) async fn gyro_offset_calibration<D: DelayNs>(
        &mut self,
        delay: &mut D,
    ) -> Result<CalibrationReport, Error> {
        let result = self.measure_offsets(delay).await?;
        let status = classify(&result, self.config().offset_threshold);
        let committed = status.is_clean();
        if committed {
            self.commit_offsets(&result).await?;
        }
        info!("offset calibration status {=u32:#x}", status.bits());
        Ok(CalibrationReport {
            status,
            result,
            committed,
        })
    }

    /// Reads the gyro gain registers and optionally stores them in InfoMat0.
    pub(crate) async fn read_gyro_gain<D: DelayNs>(
        &mut self,
        delay: &mut D,
        persist: bool,
    ) -> Result<GyroGain, Error> {
        let gain = GyroGain {
            x: self.read_reg32(ram::GYRO_GAIN_X).await?,
            y: self.read_reg32(ram::GYRO_GAIN_Y).await?,
        };
        if !persist {
            return Ok(gain);
        }

        let mut words = [0u32; layout::INFO_MAT_WORDS];
        self.read_mat(FlashMat::InfoMat0, 0, &mut words).await?;
        words[layout::INFO0_GYRO_GAIN_X] = gain.x;
        words[layout::INFO0_GYRO_GAIN_Y] = gain.y;
        words[layout::INFO0_FLAG_WORD] &= !layout::INFO0_GYRO_GAIN_FLAG;
        let checksum = byte_sum_checksum16(&words[..layout::INFO0_CHECKSUM_WORD]);
        words[layout::INFO0_CHECKSUM_WORD] =
            with_checksum_high(words[layout::INFO0_CHECKSUM_WORD], checksum);
        self.rewrite_info_mat(delay, FlashMat::InfoMat0, &words).await?;
        info!("gyro gain stored: {=u32:#x} {=u32:#x}", gain.x, gain.y);
        Ok(gain)
    }

    /// Stores offsets in InfoMat1 words 0..=2 with the word-12 checksum.
    pub(crate) async fn write_offsets_to_flash<D: DelayNs>(
        &mut self,
        delay: &mut D,
        result: &CalibrationResult,
    ) -> Result<(), Error> {
        let mut words = [0u32; layout::INFO_MAT_WORDS];
        self.read_mat(FlashMat::InfoMat1, 0, &mut words).await?;
        let offsets = layout::INFO1_OFFSET_WORD..layout::INFO1_OFFSET_WORD + 3;
        words[offsets].copy_from_slice(&result.to_words());
        let checksum = byte_sum_checksum16(&words[..layout::INFO1_CHECKSUM_WORD]);
        words[layout::INFO1_CHECKSUM_WORD] =
            with_checksum_high(words[layout::INFO1_CHECKSUM_WORD], checksum);
        self.rewrite_info_mat(delay, FlashMat::InfoMat1, &words).await
    }

    /// Reads the offsets stored in InfoMat1.
    pub(crate) async fn read_calibration_from_flash(&mut self) -> Result<CalibrationResult, Error> {
        let mut words = [0u32; layout::INFO1_CHECKSUM_WORD + 1];
        self.read_mat(FlashMat::InfoMat1, 0, &mut words).await?;
        let stored = (words[layout::INFO1_CHECKSUM_WORD] >> 16) as u16;
        if stored != byte_sum_checksum16(&words[..layout::INFO1_CHECKSUM_WORD]) {
            return Err(Error::ChecksumMismatch);
        }
        let base = layout::INFO1_OFFSET_WORD;
        Ok(CalibrationResult::from_words([
            words[base],
            words[base + 1],
            words[base + 2],
        ]))
    }
}

fn average_high(average: i64) -> i16 {
    ((average as i32) >> 16) as i16
}
