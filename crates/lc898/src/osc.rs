//! Oscillator trim adjustment (LC898129).
//!
//! A 9-bit trim code is found by successive approximation so the oscillator
//! tick count over a fixed window matches a target derived from the I2C bit
//! rate. The result is persisted to the trim mat, and InfoMat2 carries a
//! check code that makes later runs a no-op.

use embedded_hal_async::delay::DelayNs;

use crate::checksum::nibble_sum;
use crate::device::DeviceCore;
use crate::error::Error;
use crate::flash::{FlashMat, MAX_PAGE_WORDS};
use crate::interface::Interface;
use crate::macros::{debug, info, log_warn};
use crate::register::{layout, sys};

/// Trim code width.
pub const TRIM_BITS: u32 = 9;
/// Mask of a trim code.
pub const TRIM_MASK: u16 = (1 << TRIM_BITS) - 1;

/// Oscillator ticks per I2C bit at the nominal frequency.
pub const OSC_TICKS_PER_BIT: u32 = 96;
/// I2C bit periods counted by the timing-mode counter.
pub const I2C_COUNT_BITS: u32 = 64;
/// Timer measurement window.
pub const TIMER_WINDOW_US: u32 = 4_000;
/// Prescaler of the timer-window counter.
pub const TIMER_PRESCALE: u32 = 16;
/// Divider written to `CLK_DSPDIV` during adjustment.
pub const DEFAULT_ADJUST_DIVIDER: u32 = 0x0000_0001;

const ROUNDING_BITS: u16 = 0x3F;

/// Fixed per-axis gain and offset constants stored after the trim word.
const TRIM_GAIN_CONSTANTS: [u32; 6] = [
    0x3FFF_FFFF, 0x3FFF_FFFF, 0x3FFF_FFFF, 0x2000_0000, 0x2000_0000, 0x2000_0000,
];
const TRIM_OFFSET_CONSTANTS: [u32; 6] = [0; 6];

/// Counter used to measure the oscillator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OscCounter {
    /// I2C timing-mode counter register.
    I2cTiming,
    /// Timer-driven 4 ms measurement window.
    TimerWindow,
}

/// Oscillator adjustment settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OscConfig {
    /// Counter used for measurement.
    pub counter: OscCounter,
    /// Target tick count.
    pub target: u32,
    /// Largest accepted |count - target|.
    pub diff_threshold: u32,
    /// `CLK_DSPDIV` value while adjusting.
    pub adjust_divider: u32,
}

impl OscConfig {
    /// Creates a configuration for an explicit target count.
    pub const fn new(counter: OscCounter, target: u32) -> Self {
        Self {
            counter,
            target,
            diff_threshold: target / 256,
            adjust_divider: DEFAULT_ADJUST_DIVIDER,
        }
    }

    /// Derives the target count from the required I2C bit rate.
    pub const fn for_bit_rate(counter: OscCounter, bit_rate_hz: u32) -> Self {
        let target = match counter {
            OscCounter::I2cTiming => OSC_TICKS_PER_BIT * I2C_COUNT_BITS,
            OscCounter::TimerWindow => {
                let osc_hz = bit_rate_hz as u64 * OSC_TICKS_PER_BIT as u64;
                (osc_hz * TIMER_WINDOW_US as u64 / 1_000_000 / TIMER_PRESCALE as u64) as u32
            }
        };
        Self::new(counter, target)
    }

    /// Sets the tolerance.
    #[must_use]
    pub const fn with_diff_threshold(mut self, diff_threshold: u32) -> Self {
        self.diff_threshold = diff_threshold;
        self
    }

    /// Sets the adjustment divider.
    #[must_use]
    pub const fn with_adjust_divider(mut self, divider: u32) -> Self {
        self.adjust_divider = divider;
        self
    }
}

/// Result of an oscillator adjustment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OscAdjOutcome {
    /// Check codes and stored trim were already valid; nothing was done.
    AlreadyDone {
        /// Stored trim code.
        trim: u16,
    },
    /// Trim found and persisted.
    Adjusted {
        /// Selected trim code.
        trim: u16,
        /// Tick count at that trim.
        count: u32,
    },
    /// Best trim missed the tolerance; nothing was persisted.
    OutOfTolerance {
        /// Best trim code.
        trim: u16,
        /// Tick count at that trim.
        count: u32,
    },
}

/// Trim word as persisted: low 24 bits carry the trim, the top byte the
/// nibble sum of those bits.
pub const fn trim_adj(trim: u32) -> u32 {
    let low = trim & 0x00FF_FFFF;
    ((nibble_sum(low) as u32) << 24) | low
}

const fn distance(count: u32, target: u32) -> u32 {
    count.abs_diff(target)
}

impl<I> DeviceCore<I>
where
    I: Interface,
{
    /// Returns the stored trim when the post-trim check codes are present
    /// and the trim word is self-consistent.
    pub(crate) async fn check_checkcode(&mut self) -> Result<Option<u16>, Error> {
        let mut codes = [0u32; 2];
        self.read_mat(FlashMat::InfoMat2, layout::INFO2_CHECKCODE1_WORD as u32, &mut codes)
            .await?;
        if codes != [layout::CHECKCODE1, layout::CHECKCODE2_TRIMMED] {
            return Ok(None);
        }
        let mut stored = [0u32; 1];
        self.read_mat(FlashMat::TrimMat, layout::TRIM_WORD as u32, &mut stored)
            .await?;
        let trim = (stored[0] as u16) & TRIM_MASK;
        if stored[0] == trim_adj(u32::from(trim)) {
            Ok(Some(trim))
        } else {
            Ok(None)
        }
    }

    async fn set_osc_trim(&mut self, trim: u16) -> Result<(), Error> {
        let current = self.read_reg32(sys::OSC_TRIM).await?;
        let value = (current & !u32::from(TRIM_MASK)) | u32::from(trim);
        self.write_reg32(sys::OSC_TRIM, value).await
    }

    async fn osc_count<D: DelayNs>(
        &mut self,
        delay: &mut D,
        osc: &OscConfig,
        trim: u16,
    ) -> Result<u32, Error> {
        self.set_osc_trim(trim).await?;

        let window = self.profile().timing.osc_window;
        match osc.counter {
            OscCounter::I2cTiming => {
                self.write_reg32(sys::OSC_I2C_CNT_CTRL, 1).await?;
                delay.delay_us(window.interval_us).await;
                let count = self.read_reg32(sys::OSC_I2C_CNT).await?;
                self.write_reg32(sys::OSC_I2C_CNT_CTRL, 0).await?;
                Ok(count)
            }
            OscCounter::TimerWindow => {
                self.write_reg32(sys::OSC_TIMER_CTRL, 1).await?;
                delay.delay_us(TIMER_WINDOW_US).await;
                self.poll_until(delay, sys::OSC_TIMER_STATUS, 1, 1, window, Error::OscTimeout)
                    .await?;
                let count = self.read_reg32(sys::OSC_TIMER_CNT).await?;
                self.write_reg32(sys::OSC_TIMER_CTRL, 0).await?;
                Ok(count)
            }
        }
    }

    /// Successive approximation plus low-bit rounding. Leaves the chosen
    /// trim in `OSC_TRIM` and returns it with its count.
    async fn osc_search<D: DelayNs>(
        &mut self,
        delay: &mut D,
        osc: &OscConfig,
    ) -> Result<(u16, u32), Error> {
        let mut trim = 0u16;
        for bit in (0..TRIM_BITS).rev() {
            trim |= 1 << bit;
            let count = self.osc_count(delay, osc, trim).await?;
            if count >= osc.target {
                trim &= !(1 << bit);
            }
        }
        let mut best = (trim, self.osc_count(delay, osc, trim).await?);

        let low = trim & ROUNDING_BITS;
        if low & 1 != 0 && low != ROUNDING_BITS {
            let candidate = trim + 1;
            let count = self.osc_count(delay, osc, candidate).await?;
            if distance(count, osc.target) < distance(best.1, osc.target) {
                best = (candidate, count);
            }
        }
        self.set_osc_trim(best.0).await?;
        debug!("osc search: trim {=u16:#x} count {=u32}", best.0, best.1);
        Ok(best)
    }

    async fn persist_trim<D: DelayNs>(&mut self, delay: &mut D, trim: u16) -> Result<(), Error> {
        let mut info2 = [0u32; layout::INFO_MAT_WORDS];
        self.read_mat(FlashMat::InfoMat2, 0, &mut info2).await?;
        info2[layout::INFO2_CHECKCODE1_WORD] = layout::CHECKCODE1;
        info2[layout::INFO2_CHECKCODE2_WORD] = layout::CHECKCODE2_TRIMMED;

        let page_words = self.profile().page_words;
        let mut pages = [layout::ERASED; 2 * MAX_PAGE_WORDS];
        pages[layout::TRIM_WORD] = trim_adj(u32::from(trim));
        pages[1..=TRIM_GAIN_CONSTANTS.len()].copy_from_slice(&TRIM_GAIN_CONSTANTS);
        pages[page_words..page_words + TRIM_OFFSET_CONSTANTS.len()]
            .copy_from_slice(&TRIM_OFFSET_CONSTANTS);

        self.unlock_code_set(delay).await?;
        let written = self.write_trim_mats(delay, &info2, &pages[..2 * page_words]).await;
        self.protect_after(delay, written).await
    }

    async fn write_trim_mats<D: DelayNs>(
        &mut self,
        delay: &mut D,
        info2: &[u32],
        trim_pages: &[u32],
    ) -> Result<(), Error> {
        for mat in [
            FlashMat::InfoMat0,
            FlashMat::InfoMat1,
            FlashMat::InfoMat2,
            FlashMat::TrimMat,
        ] {
            self.additional_unlock_code_set(delay, mat).await?;
            self.erase_block(delay, mat, 0).await?;
        }

        self.additional_unlock_code_set(delay, FlashMat::InfoMat2)
            .await?;
        self.write_pages(delay, FlashMat::InfoMat2, 0, info2).await?;
        self.verify_read(FlashMat::InfoMat2, 0, info2).await?;

        self.additional_unlock_code_set(delay, FlashMat::TrimMat)
            .await?;
        let page_words = self.profile().page_words;
        for (index, page) in trim_pages.chunks(page_words).enumerate() {
            let address = (index * page_words) as u32;
            self.page_write(delay, FlashMat::TrimMat, address, page).await?;
            self.verify_read(FlashMat::TrimMat, address, page).await?;
        }
        Ok(())
    }

    /// Adjusts and persists the oscillator trim.
    pub(crate) async fn osc_adjust<D: DelayNs>(
        &mut self,
        delay: &mut D,
        osc: &OscConfig,
    ) -> Result<OscAdjOutcome, Error> {
        if !self.profile().osc_trim {
            return Err(Error::Unsupported);
        }
        if osc.target == 0 {
            return Err(Error::InvalidData);
        }
        self.profile().validate()?;
        if let Some(trim) = self.check_checkcode().await? {
            info!("osc trim already adjusted: {=u16:#x}", trim);
            return Ok(OscAdjOutcome::AlreadyDone { trim });
        }

        let divider = self.read_reg32(sys::CLK_DSPDIV).await?;
        self.write_reg32(sys::CLK_DSPDIV, osc.adjust_divider).await?;
        let searched = self.osc_search(delay, osc).await;
        let restored = self.write_reg32(sys::CLK_DSPDIV, divider).await;
        let (trim, count) = searched?;
        restored?;

        if distance(count, osc.target) > osc.diff_threshold {
            log_warn!(
                "osc trim {=u16:#x} count {=u32} outside tolerance of {=u32}",
                trim,
                count,
                osc.target
            );
            return Ok(OscAdjOutcome::OutOfTolerance { trim, count });
        }

        self.persist_trim(delay, trim).await?;
        info!("osc trim adjusted: {=u16:#x} count {=u32}", trim, count);
        Ok(OscAdjOutcome::Adjusted { trim, count })
    }
}
