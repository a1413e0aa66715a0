//! LC898 driver implementation.
//!
//! [`Lc898`] owns the register transport, the chip profile and the
//! calibration settings. Every operation takes `&mut self`, so one handle
//! serializes all traffic to one chip.

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

use crate::angle::AngleCorrectionMatrix;
use crate::calibration::{AxisPair, CalibrationReport, CalibrationResult, GyroGain};
use crate::config::{Chip, ChipProfile, Config};
use crate::device::DeviceCore;
use crate::error::Error;
use crate::flash::{FirmwareImage, FlashMat, Mat2Status};
use crate::interface::Interface;
use crate::interface::{I2cConfig, I2cInterface};
use crate::osc::{OscAdjOutcome, OscConfig};

/// LC898128 / LC898129 OIS controller driver.
pub struct Lc898<I> {
    core: DeviceCore<I>,
}

/// I2C type alias for the LC898 driver.
pub type Lc898I2c<I2C> = Lc898<I2cInterface<I2C>>;

impl<I2C> Lc898<I2cInterface<I2C>>
where
    I2C: I2c,
{
    /// Creates a new I2C-based driver for `chip` with default settings.
    pub fn new_i2c(i2c: I2C, chip: Chip) -> Self {
        Self::with_i2c_config(
            i2c,
            ChipProfile::for_chip(chip),
            Config::default(),
            I2cConfig::default(),
        )
    }

    /// Creates a new I2C-based driver with a custom profile and configuration.
    pub fn with_i2c_config(
        i2c: I2C,
        profile: ChipProfile,
        config: Config,
        i2c_config: I2cConfig,
    ) -> Self {
        let interface = I2cInterface::new(i2c, i2c_config);
        Self::new(interface, profile, config)
    }

    /// Updates the I2C address used by the interface.
    pub fn set_i2c_address(&mut self, address: u8) {
        self.core.interface_mut().set_address(address);
    }

    /// Releases the I2C bus, consuming the driver.
    pub fn release_i2c(self) -> I2C {
        self.core.release().into_inner()
    }
}

impl<I> Lc898<I> {
    /// Creates a driver over any register transport.
    pub const fn new(interface: I, profile: ChipProfile, config: Config) -> Self {
        Self {
            core: DeviceCore::new(interface, profile, config),
        }
    }

    /// Returns the chip profile.
    pub const fn profile(&self) -> &ChipProfile {
        self.core.profile()
    }

    /// Returns the current calibration configuration.
    pub const fn config(&self) -> Config {
        self.core.config()
    }

    /// Updates the calibration configuration.
    pub fn set_config(&mut self, config: Config) {
        self.core.set_config(config);
    }

    /// Releases the transport, consuming the driver.
    pub fn release(self) -> I {
        self.core.release()
    }
}

impl<I> Lc898<I>
where
    I: Interface,
{
    /// Reads one 32-bit register.
    pub async fn read_reg32(&mut self, addr: u32) -> Result<u32, Error> {
        self.core.read_reg32(addr).await
    }

    /// Writes one 32-bit register.
    pub async fn write_reg32(&mut self, addr: u32, value: u32) -> Result<(), Error> {
        self.core.write_reg32(addr, value).await
    }

    /// Reads from a burst window.
    pub async fn burst_read(&mut self, addr: u32, buffer: &mut [u8]) -> Result<(), Error> {
        self.core.burst_read(addr, buffer).await
    }

    /// Unlocks flash for erase and program.
    pub async fn unlock_code_set<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error> {
        self.core.unlock_code_set(delay).await
    }

    /// Re-protects flash.
    pub async fn unlock_code_clear<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error> {
        self.core.unlock_code_clear(delay).await
    }

    /// Alias of [`Lc898::unlock_code_clear`].
    pub async fn protect<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error> {
        self.core.unlock_code_clear(delay).await
    }

    /// Enables writes to an info or trim mat. Flash must be unlocked.
    pub async fn additional_unlock_code_set<D: DelayNs>(
        &mut self,
        delay: &mut D,
        mat: FlashMat,
    ) -> Result<(), Error> {
        self.core.additional_unlock_code_set(delay, mat).await
    }

    /// Erases one block of `mat`. Flash must be unlocked.
    pub async fn erase_block<D: DelayNs>(
        &mut self,
        delay: &mut D,
        mat: FlashMat,
        block: u8,
    ) -> Result<(), Error> {
        self.core.erase_block(delay, mat, block).await
    }

    /// Erases blocks `start..end` of `mat`. Flash must be unlocked.
    pub async fn erase_blocks<D: DelayNs>(
        &mut self,
        delay: &mut D,
        mat: FlashMat,
        start: u8,
        end: u8,
    ) -> Result<(), Error> {
        self.core.erase_blocks(delay, mat, start, end).await
    }

    /// Programs one page. Flash must be unlocked.
    pub async fn page_write<D: DelayNs>(
        &mut self,
        delay: &mut D,
        mat: FlashMat,
        address: u32,
        words: &[u32],
    ) -> Result<(), Error> {
        self.core.page_write(delay, mat, address, words).await
    }

    /// Reads words from a flash mat.
    pub async fn read_mat(
        &mut self,
        mat: FlashMat,
        address: u32,
        buffer: &mut [u32],
    ) -> Result<(), Error> {
        self.core.read_mat(mat, address, buffer).await
    }

    /// Compares flash contents with `expected`.
    pub async fn verify_read(
        &mut self,
        mat: FlashMat,
        address: u32,
        expected: &[u32],
    ) -> Result<(), Error> {
        self.core.verify_read(mat, address, expected).await
    }

    /// Replaces the contents of an info or trim mat, re-protecting flash on
    /// every path.
    pub async fn rewrite_info_mat<D: DelayNs>(
        &mut self,
        delay: &mut D,
        mat: FlashMat,
        words: &[u32],
    ) -> Result<(), Error> {
        self.core.rewrite_info_mat(delay, mat, words).await
    }

    /// Runs the device checksum unit over `words` words of `mat`.
    pub async fn flash_checksum<D: DelayNs>(
        &mut self,
        delay: &mut D,
        mat: FlashMat,
        address: u32,
        words: usize,
    ) -> Result<u32, Error> {
        self.core.flash_checksum(delay, mat, address, words).await
    }

    /// Resets the DSP core with the microcontroller held.
    pub async fn core_reset_without_mcu<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error> {
        self.core.core_reset_without_mcu(delay).await
    }

    /// Marks InfoMat2 as user-written unless already marked.
    pub async fn mat2_rewrite<D: DelayNs>(&mut self, delay: &mut D) -> Result<Mat2Status, Error> {
        self.core.mat2_rewrite(delay).await
    }

    /// Loads update code into program RAM and checks it.
    pub async fn pmem_update<D: DelayNs>(
        &mut self,
        delay: &mut D,
        code: &[u8],
        checksum: u16,
    ) -> Result<(), Error> {
        self.core.pmem_update(delay, code, checksum).await
    }

    /// Remaps to flash and waits for normal boot.
    pub async fn remap<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error> {
        self.core.remap(delay).await
    }

    /// Runs the full firmware update.
    ///
    /// Any failure aborts the sequence; call again from the start.
    pub async fn flash_update<D: DelayNs>(
        &mut self,
        delay: &mut D,
        image: &FirmwareImage<'_>,
    ) -> Result<(), Error> {
        self.core.flash_update(delay, image).await
    }

    /// Measures one channel pair.
    pub async fn measure<D: DelayNs>(
        &mut self,
        delay: &mut D,
        pair: AxisPair,
    ) -> Result<(i16, i16), Error> {
        self.core.measure(delay, pair).await
    }

    /// Measures all six offsets without classifying or committing them.
    pub async fn measure_offsets<D: DelayNs>(
        &mut self,
        delay: &mut D,
    ) -> Result<CalibrationResult, Error> {
        self.core.measure_offsets(delay).await
    }

    /// Runs offset calibration; offsets are committed only when every axis
    /// is within the configured threshold.
    pub async fn gyro_offset_calibration<D: DelayNs>(
        &mut self,
        delay: &mut D,
    ) -> Result<CalibrationReport, Error> {
        self.core.gyro_offset_calibration(delay).await
    }

    /// Writes offsets to the live offset registers.
    pub async fn commit_offsets(&mut self, result: &CalibrationResult) -> Result<(), Error> {
        self.core.commit_offsets(result).await
    }

    /// Reads the gyro gain; with `persist` it is also stored in InfoMat0.
    pub async fn read_gyro_gain<D: DelayNs>(
        &mut self,
        delay: &mut D,
        persist: bool,
    ) -> Result<GyroGain, Error> {
        self.core.read_gyro_gain(delay, persist).await
    }

    /// Stores offsets in InfoMat1.
    pub async fn write_offsets_to_flash<D: DelayNs>(
        &mut self,
        delay: &mut D,
        result: &CalibrationResult,
    ) -> Result<(), Error> {
        self.core.write_offsets_to_flash(delay, result).await
    }

    /// Reads and checks the offsets stored in InfoMat1.
    pub async fn read_calibration_from_flash(&mut self) -> Result<CalibrationResult, Error> {
        self.core.read_calibration_from_flash().await
    }

    /// Writes the angle-correction coefficients for a mounting.
    ///
    /// Inputs are validated before any register is written.
    pub async fn set_angle_correction(
        &mut self,
        degree_gap: i16,
        actuator: u8,
        arrangement: u8,
    ) -> Result<AngleCorrectionMatrix, Error> {
        self.core
            .set_angle_correction(degree_gap, actuator, arrangement)
            .await
    }

    /// Returns the stored trim when the oscillator was already adjusted.
    pub async fn check_checkcode(&mut self) -> Result<Option<u16>, Error> {
        self.core.check_checkcode().await
    }

    /// Adjusts and persists the oscillator trim (LC898129 only).
    pub async fn osc_adjust<D: DelayNs>(
        &mut self,
        delay: &mut D,
        osc: &OscConfig,
    ) -> Result<OscAdjOutcome, Error> {
        self.core.osc_adjust(delay, osc).await
    }
}
