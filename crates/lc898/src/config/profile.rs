//! Per-chip constants for the LC898128 and LC898129.

use crate::checksum::ChecksumKind;
use crate::error::Error;
use crate::flash::MAX_PAGE_WORDS;
use crate::register::{flash_cmd, unlock};

/// Supported controller generations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Chip {
    /// LC898128.
    Lc898128,
    /// LC898129.
    Lc898129,
}

/// Bounded poll loop: up to `retries` reads, `interval_us` apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollBudget {
    /// Maximum number of status reads.
    pub retries: u16,
    /// Delay between reads in microseconds.
    pub interval_us: u32,
}

impl PollBudget {
    /// Creates a poll budget.
    pub const fn new(retries: u16, interval_us: u32) -> Self {
        Self {
            retries,
            interval_us,
        }
    }

    /// Worst-case wait in microseconds.
    pub const fn max_wait_us(self) -> u32 {
        (self.retries as u32).saturating_mul(self.interval_us)
    }
}

/// Poll budgets and fixed waits used by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timing {
    /// Unlock / additional unlock / protect flag polling.
    pub unlock: PollBudget,
    /// Block erase busy polling.
    pub erase: PollBudget,
    /// Page load / page program busy polling.
    pub program: PollBudget,
    /// Checksum unit polling (program RAM and flash).
    pub checksum: PollBudget,
    /// ROMINFO polling after remap.
    pub remap: PollBudget,
    /// Measurement sample counter polling.
    pub measure: PollBudget,
    /// Oscillator timer window completion polling.
    pub osc_window: PollBudget,
    /// Wait after core reset / remap in microseconds.
    pub reset_wait_us: u32,
}

impl Timing {
    /// LC898128 timing.
    pub const LC898128: Self = Self {
        unlock: PollBudget::new(10, 1_000),
        erase: PollBudget::new(10, 5_000),
        program: PollBudget::new(10, 1_000),
        checksum: PollBudget::new(100, 1_000),
        remap: PollBudget::new(10, 1_000),
        measure: PollBudget::new(2_000, 100),
        osc_window: PollBudget::new(10, 1_000),
        reset_wait_us: 15_000,
    };

    /// LC898129 timing.
    pub const LC898129: Self = Self {
        erase: PollBudget::new(100, 1_000),
        ..Self::LC898128
    };
}

/// Register-map and flash geometry differences between generations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChipProfile {
    /// Controller generation.
    pub chip: Chip,
    /// Flash page size in 32-bit words.
    pub page_words: usize,
    /// Flash block size in 32-bit words.
    pub block_words: u32,
    /// User mat blocks erased by a firmware update (reserved blocks excluded).
    pub user_erase_blocks: u8,
    /// Program RAM burst chunk in bytes.
    pub burst_length_uc: usize,
    /// Flash program buffer burst chunk in bytes.
    pub burst_length_fc: usize,
    /// Block erase command.
    pub erase_cmd: u32,
    /// Additional unlock code used for InfoMat2.
    pub info_mat2_code: u32,
    /// Algorithm protecting the InfoMat2 MTP region.
    pub mtp_checksum: ChecksumKind,
    /// Mirror rotation coefficients into the second bank.
    pub mirror_rotation: bool,
    /// Oscillator trim adjustment available.
    pub osc_trim: bool,
    /// Poll budgets and waits.
    pub timing: Timing,
}

impl ChipProfile {
    /// LC898128 profile.
    pub const LC898128: Self = Self {
        chip: Chip::Lc898128,
        page_words: 16,
        block_words: 0x400,
        user_erase_blocks: 9,
        burst_length_uc: 60,
        burst_length_fc: 64,
        erase_cmd: flash_cmd::BLOCK_ERASE,
        info_mat2_code: unlock::INFO_MAT2_128,
        mtp_checksum: ChecksumKind::Crc16,
        mirror_rotation: true,
        osc_trim: false,
        timing: Timing::LC898128,
    };

    /// LC898129 profile.
    pub const LC898129: Self = Self {
        chip: Chip::Lc898129,
        page_words: 32,
        block_words: 0x400,
        user_erase_blocks: 7,
        burst_length_uc: 120,
        burst_length_fc: 64,
        erase_cmd: flash_cmd::ABS_BLOCK_ERASE,
        info_mat2_code: unlock::INFO_MAT,
        mtp_checksum: ChecksumKind::ByteSum,
        mirror_rotation: false,
        osc_trim: true,
        timing: Timing::LC898129,
    };

    /// Returns the profile for `chip`.
    pub const fn for_chip(chip: Chip) -> Self {
        match chip {
            Chip::Lc898128 => Self::LC898128,
            Chip::Lc898129 => Self::LC898129,
        }
    }

    /// Overrides the timing table.
    #[must_use]
    pub const fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// Page size in bytes.
    pub const fn page_bytes(&self) -> usize {
        self.page_words * 4
    }

    /// User mat capacity covered by a firmware update, in words.
    pub const fn user_capacity_words(&self) -> usize {
        self.user_erase_blocks as usize * self.block_words as usize
    }

    /// Checks the page and burst geometry.
    ///
    /// Pages hold 1 to 32 words. Burst chunks are non-empty, and flash buffer
    /// chunks are whole words.
    pub const fn validate(&self) -> Result<(), Error> {
        if self.page_words == 0
            || self.page_words > MAX_PAGE_WORDS
            || self.burst_length_uc == 0
            || self.burst_length_fc == 0
            || self.burst_length_fc % 4 != 0
        {
            return Err(Error::InvalidData);
        }
        Ok(())
    }
}

impl Default for ChipProfile {
    fn default() -> Self {
        Self::LC898128
    }
}
