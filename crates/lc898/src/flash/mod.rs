//! Flash unlock / erase / program / protect engine.

pub(crate) mod update;

pub use update::{FirmwareImage, Mat2Status};

use embedded_hal_async::delay::DelayNs;

use crate::config::{ChipProfile, PollBudget};
use crate::device::DeviceCore;
use crate::error::Error;
use crate::interface::Interface;
use crate::macros::debug;
use crate::register::{flaint, flash, flash_cmd, flawp, unlock};

/// Largest page size across supported chips, in words.
pub(crate) const MAX_PAGE_WORDS: usize = 32;

/// On-chip flash region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashMat {
    /// Firmware region.
    UserMat,
    /// Information mat 0 (gyro gain, calibration flags).
    InfoMat0,
    /// Information mat 1 (gyro / accel offsets).
    InfoMat1,
    /// Information mat 2 (re-program marker, check codes).
    InfoMat2,
    /// Oscillator trim mat.
    TrimMat,
}

impl FlashMat {
    /// Mat selector placed in bits 16.. of the flash address.
    pub const fn selector(self) -> u32 {
        match self {
            Self::UserMat => 0x00,
            Self::InfoMat0 => 0x01,
            Self::InfoMat1 => 0x02,
            Self::InfoMat2 => 0x04,
            Self::TrimMat => 0x10,
        }
    }

    /// Decodes a raw mat selector.
    pub const fn from_selector(selector: u32) -> Result<Self, Error> {
        match selector {
            0x00 => Ok(Self::UserMat),
            0x01 => Ok(Self::InfoMat0),
            0x02 => Ok(Self::InfoMat1),
            0x04 => Ok(Self::InfoMat2),
            0x10 => Ok(Self::TrimMat),
            _ => Err(Error::InvalidMat),
        }
    }

    /// Mat-encoded flash address of `word`.
    pub const fn address(self, word: u32) -> u32 {
        (self.selector() << 16) | (word & 0xFFFF)
    }

    /// Codes written before the common code during the additional unlock.
    pub(crate) const fn additional_codes(self, profile: &ChipProfile) -> &'static [u32] {
        match self {
            Self::UserMat => &[],
            Self::InfoMat0 | Self::InfoMat1 => &[unlock::INFO_MAT],
            Self::InfoMat2 => {
                if profile.info_mat2_code == unlock::INFO_MAT2_128 {
                    &[unlock::INFO_MAT2_128]
                } else {
                    &[unlock::INFO_MAT]
                }
            }
            Self::TrimMat => &[unlock::INFO_MAT, unlock::TRIM_MAT],
        }
    }
}

impl<I> DeviceCore<I>
where
    I: Interface,
{
    /// Writes the two unlock codes and waits for the unlock flag.
    pub(crate) async fn unlock_code_set<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error> {
        let budget = self.profile().timing.unlock;
        self.write_reg32(flash::UNLK_CODE1, unlock::CODE1).await?;
        self.write_reg32(flash::UNLK_CODE2, unlock::CODE2).await?;
        self.poll_until(
            delay,
            flash::FLAWP,
            flawp::UNLOCKED,
            flawp::UNLOCKED,
            budget,
            Error::Unlock,
        )
        .await
    }

    /// Re-protects flash and waits for the unlock flag to clear.
    pub(crate) async fn unlock_code_clear<D: DelayNs>(
        &mut self,
        delay: &mut D,
    ) -> Result<(), Error> {
        let budget = self.profile().timing.unlock;
        self.write_reg32(flash::FLAWP, flawp::PROTECT).await?;
        self.poll_until(
            delay,
            flash::FLAWP,
            flawp::UNLOCKED,
            0,
            budget,
            Error::Protect,
        )
        .await
    }

    /// Unlocks write access to an info or trim mat.
    pub(crate) async fn additional_unlock_code_set<D: DelayNs>(
        &mut self,
        delay: &mut D,
        mat: FlashMat,
    ) -> Result<(), Error> {
        let codes = mat.additional_codes(self.profile());
        if codes.is_empty() {
            return Ok(());
        }
        let budget = self.profile().timing.unlock;
        for code in codes.iter().copied().chain([unlock::COMMON]) {
            self.write_reg32(flash::UNLK_CODE3, code).await?;
            self.poll_until(
                delay,
                flash::FLAWP,
                flawp::UNLOCKED,
                flawp::UNLOCKED,
                budget,
                Error::AdditionalUnlock,
            )
            .await?;
        }
        Ok(())
    }

    async fn wait_flash_idle<D: DelayNs>(
        &mut self,
        delay: &mut D,
        budget: PollBudget,
        timeout: Error,
    ) -> Result<(), Error> {
        self.poll_until(delay, flash::FLAINT, flaint::BUSY, 0, budget, timeout)
            .await
    }

    /// Erases one block of `mat`. Info and trim mats have a single block.
    pub(crate) async fn erase_block<D: DelayNs>(
        &mut self,
        delay: &mut D,
        mat: FlashMat,
        block: u8,
    ) -> Result<(), Error> {
        if mat != FlashMat::UserMat && block != 0 {
            return Err(Error::InvalidData);
        }
        let profile = *self.profile();
        let word = u32::from(block) * profile.block_words;
        if word > 0xFFFF {
            return Err(Error::InvalidData);
        }
        self.write_reg32(flash::FLA_ADR, mat.address(word)).await?;
        self.write_reg32(flash::CMD, profile.erase_cmd).await?;
        self.wait_flash_idle(delay, profile.timing.erase, Error::EraseTimeout)
            .await
    }

    /// Erases blocks `start..end` of `mat`.
    pub(crate) async fn erase_blocks<D: DelayNs>(
        &mut self,
        delay: &mut D,
        mat: FlashMat,
        start: u8,
        end: u8,
    ) -> Result<(), Error> {
        for block in start..end {
            self.erase_block(delay, mat, block).await?;
        }
        debug!("erased blocks {=u8}..{=u8} of mat {=u32:#x}", start, end, mat.selector());
        Ok(())
    }

    /// Programs one page through the page buffer.
    ///
    /// `words` must hold exactly one page and `address` must be page aligned.
    pub(crate) async fn page_write<D: DelayNs>(
        &mut self,
        delay: &mut D,
        mat: FlashMat,
        address: u32,
        words: &[u32],
    ) -> Result<(), Error> {
        let profile = *self.profile();
        profile.validate()?;
        if words.len() != profile.page_words || address as usize % profile.page_words != 0 {
            return Err(Error::InvalidData);
        }
        self.write_reg32(flash::FLA_ADR, mat.address(address)).await?;
        self.write_reg32(flash::CMD, flash_cmd::PAGE_LOAD).await?;
        for word in words {
            self.write_reg32(flash::FLA_WDAT, *word).await?;
        }
        self.wait_flash_idle(delay, profile.timing.program, Error::ProgramTimeout)
            .await?;
        self.write_reg32(flash::CMD, flash_cmd::PAGE_PROGRAM).await?;
        self.wait_flash_idle(delay, profile.timing.program, Error::ProgramTimeout)
            .await
    }

    /// Reads `buffer.len()` words of `mat` starting at `address`.
    pub(crate) async fn read_mat(
        &mut self,
        mat: FlashMat,
        address: u32,
        buffer: &mut [u32],
    ) -> Result<(), Error> {
        if buffer.is_empty() {
            return Ok(());
        }
        self.write_reg32(flash::FLA_ADR, mat.address(address)).await?;
        self.write_reg32(flash::ACSCNT, buffer.len() as u32 - 1)
            .await?;
        self.write_reg32(flash::CMD, flash_cmd::READ).await?;
        for slot in buffer.iter_mut() {
            *slot = self.read_reg32(flash::FLA_RDAT).await?;
        }
        Ok(())
    }

    /// Reads back `expected.len()` words and compares them exactly.
    pub(crate) async fn verify_read(
        &mut self,
        mat: FlashMat,
        address: u32,
        expected: &[u32],
    ) -> Result<(), Error> {
        let mut buffer = [0u32; MAX_PAGE_WORDS];
        for (index, chunk) in expected.chunks(MAX_PAGE_WORDS).enumerate() {
            let readback = &mut buffer[..chunk.len()];
            let offset = (index * MAX_PAGE_WORDS) as u32;
            self.read_mat(mat, address + offset, readback).await?;
            if readback != chunk {
                debug!(
                    "verify mismatch in mat {=u32:#x} near word {=u32}",
                    mat.selector(),
                    address + offset
                );
                return Err(Error::VerifyMismatch);
            }
        }
        Ok(())
    }

    /// Programs whole pages starting at `address`.
    pub(crate) async fn write_pages<D: DelayNs>(
        &mut self,
        delay: &mut D,
        mat: FlashMat,
        address: u32,
        words: &[u32],
    ) -> Result<(), Error> {
        self.profile().validate()?;
        let page_words = self.profile().page_words;
        if words.len() % page_words != 0 {
            return Err(Error::InvalidData);
        }
        for (index, page) in words.chunks(page_words).enumerate() {
            let page_address = address + (index * page_words) as u32;
            self.page_write(delay, mat, page_address, page).await?;
        }
        Ok(())
    }

    /// Erases a single-block mat and programs `words` from its start, then verifies.
    ///
    /// Flash must already be unlocked.
    pub(crate) async fn rewrite_unlocked<D: DelayNs>(
        &mut self,
        delay: &mut D,
        mat: FlashMat,
        words: &[u32],
    ) -> Result<(), Error> {
        self.additional_unlock_code_set(delay, mat).await?;
        self.erase_block(delay, mat, 0).await?;
        self.write_pages(delay, mat, 0, words).await?;
        self.verify_read(mat, 0, words).await
    }

    /// Full unlock, erase, program, verify, protect cycle for an info or
    /// trim mat.
    pub(crate) async fn rewrite_info_mat<D: DelayNs>(
        &mut self,
        delay: &mut D,
        mat: FlashMat,
        words: &[u32],
    ) -> Result<(), Error> {
        if mat == FlashMat::UserMat {
            return Err(Error::InvalidMat);
        }
        self.unlock_code_set(delay).await?;
        let result = self.rewrite_unlocked(delay, mat, words).await;
        self.protect_after(delay, result).await
    }

    /// Re-protects flash after an unlocked section; the section's error wins.
    pub(crate) async fn protect_after<D: DelayNs, T>(
        &mut self,
        delay: &mut D,
        result: Result<T, Error>,
    ) -> Result<T, Error> {
        let protect = self.unlock_code_clear(delay).await;
        let value = result?;
        protect?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Timing};
    use crate::register::layout;
    use crate::testing::{MockDelay, MockInterface};
    use futures::executor::block_on;

    fn core_with(mock: MockInterface, profile: ChipProfile) -> DeviceCore<MockInterface> {
        DeviceCore::new(mock, profile, Config::new())
    }

    fn core(mock: MockInterface) -> DeviceCore<MockInterface> {
        core_with(mock, ChipProfile::LC898128)
    }

    fn page(seed: u32) -> [u32; 16] {
        core::array::from_fn(|i| seed.wrapping_mul(0x0101_0101) ^ i as u32)
    }

    #[test]
    fn selectors_round_trip_and_reject_unknown() {
        for mat in [
            FlashMat::UserMat,
            FlashMat::InfoMat0,
            FlashMat::InfoMat1,
            FlashMat::InfoMat2,
            FlashMat::TrimMat,
        ] {
            assert_eq!(FlashMat::from_selector(mat.selector()), Ok(mat));
        }
        assert_eq!(FlashMat::from_selector(0x08), Err(Error::InvalidMat));
    }

    #[test]
    fn mat_address_encodes_selector() {
        assert_eq!(FlashMat::TrimMat.address(0x20), 0x0010_0020);
        assert_eq!(FlashMat::UserMat.address(0x2000), 0x2000);
    }

    #[test]
    fn additional_codes_depend_on_mat_and_chip() {
        let p128 = ChipProfile::LC898128;
        let p129 = ChipProfile::LC898129;
        assert!(FlashMat::UserMat.additional_codes(&p128).is_empty());
        assert_eq!(
            FlashMat::InfoMat2.additional_codes(&p128),
            [unlock::INFO_MAT2_128]
        );
        assert_eq!(FlashMat::InfoMat2.additional_codes(&p129), [unlock::INFO_MAT]);
        assert_eq!(
            FlashMat::TrimMat.additional_codes(&p129),
            [unlock::INFO_MAT, unlock::TRIM_MAT]
        );
    }

    #[test]
    fn unlock_sets_flag_and_clear_protects() {
        let mut core = core(MockInterface::default());
        let mut delay = MockDelay::default();
        block_on(core.unlock_code_set(&mut delay)).expect("unlock");
        assert!(core.interface().is_unlocked());
        block_on(core.unlock_code_clear(&mut delay)).expect("protect");
        assert!(!core.interface().is_unlocked());
    }

    #[test]
    fn unlock_propagates_bus_error() {
        let mut core = core(MockInterface::default().with_bus_error_on(flash::UNLK_CODE2));
        let mut delay = MockDelay::default();
        assert_eq!(block_on(core.unlock_code_set(&mut delay)), Err(Error::Bus));
    }

    #[test]
    fn additional_unlock_for_user_mat_writes_nothing() {
        let mut core = core(MockInterface::default());
        let mut delay = MockDelay::default();
        block_on(core.additional_unlock_code_set(&mut delay, FlashMat::UserMat)).expect("noop");
        assert!(core.interface().writes().is_empty());
    }

    #[test]
    fn additional_unlock_trim_writes_two_codes_then_common() {
        let mut core = core(MockInterface::default());
        let mut delay = MockDelay::default();
        block_on(core.unlock_code_set(&mut delay)).expect("unlock");
        block_on(core.additional_unlock_code_set(&mut delay, FlashMat::TrimMat))
            .expect("additional unlock");
        assert_eq!(
            core.interface().writes_to(flash::UNLK_CODE3),
            [unlock::INFO_MAT, unlock::TRIM_MAT, unlock::COMMON]
        );
    }

    #[test]
    fn additional_unlock_requires_main_unlock() {
        let mut core = core(MockInterface::default());
        let mut delay = MockDelay::default();
        assert_eq!(
            block_on(core.additional_unlock_code_set(&mut delay, FlashMat::InfoMat0)),
            Err(Error::AdditionalUnlock)
        );
    }

    #[test]
    fn erase_uses_profile_command() {
        let mut core = core_with(MockInterface::default(), ChipProfile::LC898129);
        let mut delay = MockDelay::default();
        block_on(core.erase_block(&mut delay, FlashMat::UserMat, 2)).expect("erase");
        assert_eq!(core.interface().writes_to(flash::FLA_ADR), [0x800]);
        assert_eq!(
            core.interface().writes_to(flash::CMD),
            [flash_cmd::ABS_BLOCK_ERASE]
        );
    }

    #[test]
    fn erase_rejects_second_block_of_info_mat() {
        let mut core = core(MockInterface::default());
        let mut delay = MockDelay::default();
        assert_eq!(
            block_on(core.erase_block(&mut delay, FlashMat::InfoMat1, 1)),
            Err(Error::InvalidData)
        );
        assert!(core.interface().writes().is_empty());
    }

    #[test]
    fn erase_times_out_when_busy() {
        let mut core = core(MockInterface::default().with_stuck_busy());
        let mut delay = MockDelay::default();
        assert_eq!(
            block_on(core.erase_block(&mut delay, FlashMat::UserMat, 0)),
            Err(Error::EraseTimeout)
        );
        assert_eq!(delay.calls, u32::from(Timing::LC898128.erase.retries));
    }

    #[test]
    fn page_write_programs_and_verifies() {
        let mut core = core(MockInterface::default());
        let mut delay = MockDelay::default();
        let data = page(3);
        block_on(core.unlock_code_set(&mut delay)).expect("unlock");
        block_on(core.page_write(&mut delay, FlashMat::UserMat, 0x40, &data)).expect("write");
        assert_eq!(&core.interface().mat(FlashMat::UserMat)[0x40..0x50], &data);
        block_on(core.verify_read(FlashMat::UserMat, 0x40, &data)).expect("verify");
    }

    #[test]
    fn page_write_rejects_wrong_length_and_alignment() {
        let mut core = core(MockInterface::default());
        let mut delay = MockDelay::default();
        let data = page(1);
        assert_eq!(
            block_on(core.page_write(&mut delay, FlashMat::UserMat, 0, &data[..8])),
            Err(Error::InvalidData)
        );
        assert_eq!(
            block_on(core.page_write(&mut delay, FlashMat::UserMat, 4, &data)),
            Err(Error::InvalidData)
        );
        assert!(core.interface().writes().is_empty());
    }

    #[test]
    fn page_writes_reject_zero_page_size() {
        let profile = ChipProfile {
            page_words: 0,
            ..ChipProfile::LC898128
        };
        let mut core = core_with(MockInterface::default(), profile);
        let mut delay = MockDelay::default();
        assert_eq!(
            block_on(core.page_write(&mut delay, FlashMat::UserMat, 0, &[])),
            Err(Error::InvalidData)
        );
        assert_eq!(
            block_on(core.write_pages(&mut delay, FlashMat::InfoMat1, 0, &[0; 4])),
            Err(Error::InvalidData)
        );
        assert!(core.interface().writes().is_empty());
    }

    #[test]
    fn stuck_busy_page_write_leaves_page_unchanged() {
        let mut core = core(MockInterface::default());
        let mut delay = MockDelay::default();
        block_on(core.unlock_code_set(&mut delay)).expect("unlock");
        core.interface_mut().set_stuck_busy(true);

        let data = page(7);
        assert_eq!(
            block_on(core.page_write(&mut delay, FlashMat::UserMat, 0, &data)),
            Err(Error::ProgramTimeout)
        );
        assert!(
            !core
                .interface()
                .writes_to(flash::CMD)
                .contains(&flash_cmd::PAGE_PROGRAM)
        );

        core.interface_mut().set_stuck_busy(false);
        let erased = [layout::ERASED; 16];
        block_on(core.verify_read(FlashMat::UserMat, 0, &erased)).expect("page untouched");
    }

    #[test]
    fn verify_read_detects_mismatch() {
        let mut core = core(MockInterface::default());
        let mut expected = [layout::ERASED; 16];
        expected[5] = 0;
        assert_eq!(
            block_on(core.verify_read(FlashMat::InfoMat0, 0, &expected)),
            Err(Error::VerifyMismatch)
        );
    }

    #[test]
    fn rewrite_info_mat_programs_and_protects() {
        let mut core = core(MockInterface::default());
        let mut delay = MockDelay::default();
        let words: [u32; 32] = core::array::from_fn(|i| i as u32 * 3);
        block_on(core.rewrite_info_mat(&mut delay, FlashMat::InfoMat1, &words)).expect("rewrite");
        assert_eq!(core.interface().mat(FlashMat::InfoMat1), &words);
        assert_eq!(core.interface().erases(), [(FlashMat::InfoMat1.selector(), 0)]);
        assert!(!core.interface().is_unlocked());
    }

    #[test]
    fn rewrite_info_mat_reprotects_after_failure() {
        let mut core = core(MockInterface::default().with_stuck_busy());
        let mut delay = MockDelay::default();
        let words = [0u32; 32];
        assert_eq!(
            block_on(core.rewrite_info_mat(&mut delay, FlashMat::InfoMat0, &words)),
            Err(Error::EraseTimeout)
        );
        assert!(!core.interface().is_unlocked());
    }

    #[test]
    fn rewrite_info_mat_rejects_user_mat() {
        let mut core = core(MockInterface::default());
        let mut delay = MockDelay::default();
        assert_eq!(
            block_on(core.rewrite_info_mat(&mut delay, FlashMat::UserMat, &[0; 16])),
            Err(Error::InvalidMat)
        );
        assert!(core.interface().writes().is_empty());
    }
}
