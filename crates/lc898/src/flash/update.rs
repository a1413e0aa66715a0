//! Firmware update sequence (program RAM load, user mat reprogramming, remap).

use embedded_hal_async::delay::DelayNs;

use super::{FlashMat, MAX_PAGE_WORDS};
use crate::checksum::byte_sum16;
use crate::device::DeviceCore;
use crate::error::Error;
use crate::interface::Interface;
use crate::macros::{debug, info};
use crate::register::{flaint, flash, flash_cmd, layout, ram};

/// Firmware image to be flashed.
///
/// `update_code` is loaded into program RAM and drives the update;
/// `from_code` is the user mat payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FirmwareImage<'a> {
    update_code: &'a [u8],
    update_code_checksum: u16,
    from_code: &'a [u8],
    from_code_checksum: u16,
}

impl<'a> FirmwareImage<'a> {
    /// Creates an image with golden checksums supplied by the vendor package.
    pub fn new(
        update_code: &'a [u8],
        update_code_checksum: u16,
        from_code: &'a [u8],
        from_code_checksum: u16,
    ) -> Result<Self, Error> {
        if update_code.is_empty()
            || update_code.len() > usize::from(u16::MAX)
            || from_code.is_empty()
            || from_code.len() % 4 != 0
        {
            return Err(Error::InvalidData);
        }
        Ok(Self {
            update_code,
            update_code_checksum,
            from_code,
            from_code_checksum,
        })
    }

    /// Creates an image whose golden checksums are computed with the
    /// device's byte-sum algorithm.
    pub fn with_computed_checksums(
        update_code: &'a [u8],
        from_code: &'a [u8],
    ) -> Result<Self, Error> {
        Self::new(
            update_code,
            byte_sum16(update_code),
            from_code,
            byte_sum16(from_code),
        )
    }

    /// Update code loaded into program RAM.
    pub const fn update_code(&self) -> &'a [u8] {
        self.update_code
    }

    /// Golden checksum of the update code.
    pub const fn update_code_checksum(&self) -> u16 {
        self.update_code_checksum
    }

    /// User mat payload.
    pub const fn from_code(&self) -> &'a [u8] {
        self.from_code
    }

    /// Golden checksum of the user mat payload.
    pub const fn from_code_checksum(&self) -> u16 {
        self.from_code_checksum
    }

    /// User mat payload length in words.
    pub const fn from_code_words(&self) -> usize {
        self.from_code.len() / 4
    }
}

/// Outcome of the InfoMat2 re-program gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mat2Status {
    /// Marker already set; nothing was written.
    AlreadyMarked,
    /// Marker was written.
    Rewritten,
}

impl<I> DeviceCore<I>
where
    I: Interface,
{
    /// Marks InfoMat2 as user-written unless it already carries a marker.
    pub(crate) async fn mat2_rewrite<D: DelayNs>(
        &mut self,
        delay: &mut D,
    ) -> Result<Mat2Status, Error> {
        let mut words = [0u32; layout::INFO_MAT_WORDS];
        self.read_mat(FlashMat::InfoMat2, 0, &mut words).await?;
        let marker = words[layout::INFO2_MARKER_WORD];
        if marker == layout::PRDCT_WR || marker == layout::USER_WR {
            return Ok(Mat2Status::AlreadyMarked);
        }

        info!("InfoMat2 marker {=u32:#x}, rewriting", marker);
        let kind = self.profile().mtp_checksum;
        words[layout::INFO2_MARKER_WORD] = layout::USER_WR;
        words[layout::INFO2_MTP_CHECKSUM_WORD] =
            u32::from(kind.compute(&words[..layout::INFO2_MTP_CHECKSUM_WORD]));
        self.rewrite_info_mat(delay, FlashMat::InfoMat2, &words).await?;

        let mut mtp = [0u32; layout::INFO2_MTP_CHECKSUM_WORD + 1];
        self.read_mat(FlashMat::InfoMat2, 0, &mut mtp).await?;
        let stored = mtp[layout::INFO2_MTP_CHECKSUM_WORD];
        if stored != u32::from(kind.compute(&mtp[..layout::INFO2_MTP_CHECKSUM_WORD])) {
            return Err(Error::ChecksumMismatch);
        }
        Ok(Mat2Status::Rewritten)
    }

    /// Loads update code into program RAM and checks the device checksum.
    pub(crate) async fn pmem_update<D: DelayNs>(
        &mut self,
        delay: &mut D,
        code: &[u8],
        checksum: u16,
    ) -> Result<(), Error> {
        let profile = *self.profile();
        profile.validate()?;
        for chunk in code.chunks(profile.burst_length_uc) {
            self.burst_write(ram::PMEM_WRITE, chunk).await?;
        }
        self.write_reg32(ram::PMEM_CHECKSUM_CMD, code.len() as u32)
            .await?;
        self.poll_until(
            delay,
            ram::PMEM_CHECKSUM_STATUS,
            u32::MAX,
            0,
            profile.timing.checksum,
            Error::ChecksumTimeout,
        )
        .await?;
        let device = self.read_reg32(ram::PMEM_CHECKSUM_VALUE).await?;
        if device != u32::from(checksum) {
            debug!("pmem checksum {=u32:#x} != {=u16:#x}", device, checksum);
            return Err(Error::ChecksumMismatch);
        }
        Ok(())
    }

    /// Programs `data` into the user mat from offset 0 through the two host
    /// program buffers, loading one while the other programs.
    ///
    /// The last page is padded with `0xFF`. Flash must be unlocked.
    pub(crate) async fn program_user_mat<D: DelayNs>(
        &mut self,
        delay: &mut D,
        data: &[u8],
    ) -> Result<(), Error> {
        let profile = *self.profile();
        profile.validate()?;
        let page_bytes = profile.page_bytes();
        let budget = profile.timing.program;
        let mut padded = [0xFFu8; MAX_PAGE_WORDS * 4];
        let mut in_flight = false;

        for (index, page) in data.chunks(page_bytes).enumerate() {
            let (buffer, cmd) = if index % 2 == 0 {
                (ram::FLASH_BUFFER_A, flash_cmd::PROGRAM_BUFFER_A)
            } else {
                (ram::FLASH_BUFFER_B, flash_cmd::PROGRAM_BUFFER_B)
            };
            padded.fill(0xFF);
            padded[..page.len()].copy_from_slice(page);
            for (chunk_index, chunk) in padded[..page_bytes]
                .chunks(profile.burst_length_fc)
                .enumerate()
            {
                let word_offset = (chunk_index * profile.burst_length_fc / 4) as u32;
                self.burst_write(buffer + word_offset, chunk).await?;
            }

            if in_flight {
                self.poll_until(
                    delay,
                    flash::FLAINT,
                    flaint::BUSY,
                    0,
                    budget,
                    Error::ProgramTimeout,
                )
                .await?;
            }
            let word = (index * profile.page_words) as u32;
            self.write_reg32(flash::FLA_ADR, FlashMat::UserMat.address(word))
                .await?;
            self.write_reg32(flash::CMD, cmd).await?;
            in_flight = true;
        }

        if in_flight {
            self.poll_until(delay, flash::FLAINT, flaint::BUSY, 0, budget, Error::ProgramTimeout)
                .await?;
        }
        Ok(())
    }

    /// Runs the device checksum unit over `words` words of `mat`.
    pub(crate) async fn flash_checksum<D: DelayNs>(
        &mut self,
        delay: &mut D,
        mat: FlashMat,
        address: u32,
        words: usize,
    ) -> Result<u32, Error> {
        if words == 0 {
            return Err(Error::InvalidData);
        }
        let budget = self.profile().timing.checksum;
        self.write_reg32(flash::FLA_ADR, mat.address(address)).await?;
        self.write_reg32(flash::ACSCNT, words as u32 - 1).await?;
        self.write_reg32(flash::CMD, flash_cmd::CHECKSUM).await?;
        self.poll_until(delay, flash::FLAINT, flaint::BUSY, 0, budget, Error::ChecksumTimeout)
            .await?;
        self.read_reg32(flash::FLA_SUM).await
    }

    async fn erase_and_program<D: DelayNs>(
        &mut self,
        delay: &mut D,
        image: &FirmwareImage<'_>,
    ) -> Result<(), Error> {
        let blocks = self.profile().user_erase_blocks;
        self.erase_blocks(delay, FlashMat::UserMat, 0, blocks).await?;
        self.program_user_mat(delay, image.from_code()).await
    }

    /// Full firmware update. Any failure aborts; rerun from the top.
    pub(crate) async fn flash_update<D: DelayNs>(
        &mut self,
        delay: &mut D,
        image: &FirmwareImage<'_>,
    ) -> Result<(), Error> {
        self.profile().validate()?;
        if image.from_code_words() > self.profile().user_capacity_words() {
            return Err(Error::InvalidData);
        }
        info!(
            "flash update: {=usize} update bytes, {=usize} flash bytes",
            image.update_code().len(),
            image.from_code().len()
        );

        self.core_reset_without_mcu(delay).await?;
        self.mat2_rewrite(delay).await?;
        self.pmem_update(delay, image.update_code(), image.update_code_checksum())
            .await?;

        self.unlock_code_set(delay).await?;
        let programmed = self.erase_and_program(delay, image).await;
        self.protect_after(delay, programmed).await?;

        let sum = self
            .flash_checksum(delay, FlashMat::UserMat, 0, image.from_code_words())
            .await?;
        if sum != u32::from(image.from_code_checksum()) {
            debug!(
                "user mat checksum {=u32:#x} != {=u16:#x}",
                sum,
                image.from_code_checksum()
            );
            return Err(Error::ChecksumMismatch);
        }

        self.remap(delay).await?;
        info!("flash update complete");
        Ok(())
    }
}
