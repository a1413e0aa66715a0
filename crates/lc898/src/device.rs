//! Device core operations for the LC898.

use embedded_hal_async::delay::DelayNs;

use crate::config::{ChipProfile, Config, PollBudget};
use crate::error::Error;
use crate::interface::Interface;
use crate::macros::debug;
use crate::register::{remap, rominfo, sys};

pub(crate) struct DeviceCore<I> {
    interface: I,
    profile: ChipProfile,
    config: Config,
}

impl<I> DeviceCore<I> {
    pub(crate) const fn new(interface: I, profile: ChipProfile, config: Config) -> Self {
        Self {
            interface,
            profile,
            config,
        }
    }

    pub(crate) const fn profile(&self) -> &ChipProfile {
        &self.profile
    }

    pub(crate) const fn config(&self) -> Config {
        self.config
    }

    pub(crate) fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    pub(crate) fn release(self) -> I {
        self.interface
    }

    #[cfg(test)]
    pub(crate) fn interface(&self) -> &I {
        &self.interface
    }

    pub(crate) fn interface_mut(&mut self) -> &mut I {
        &mut self.interface
    }
}

impl<I> DeviceCore<I>
where
    I: Interface,
{
    pub(crate) async fn read_reg32(&mut self, addr: u32) -> Result<u32, Error> {
        self.interface.read_reg32(addr).await
    }

    pub(crate) async fn write_reg32(&mut self, addr: u32, value: u32) -> Result<(), Error> {
        self.interface.write_reg32(addr, value).await
    }

    /// Writes a register and then waits `post_delay_us`.
    pub(crate) async fn write_reg32_delayed<D: DelayNs>(
        &mut self,
        delay: &mut D,
        addr: u32,
        value: u32,
        post_delay_us: u32,
    ) -> Result<(), Error> {
        self.interface.write_reg32(addr, value).await?;
        if post_delay_us > 0 {
            delay.delay_us(post_delay_us).await;
        }
        Ok(())
    }

    pub(crate) async fn burst_write(&mut self, addr: u32, data: &[u8]) -> Result<(), Error> {
        self.interface.burst_write(addr, data).await
    }

    pub(crate) async fn burst_read(&mut self, addr: u32, buffer: &mut [u8]) -> Result<(), Error> {
        self.interface.burst_read(addr, buffer).await
    }

    /// Writes consecutive words starting at `addr`.
    pub(crate) async fn write_words(&mut self, addr: u32, words: &[u32]) -> Result<(), Error> {
        for (index, word) in words.iter().enumerate() {
            self.write_reg32(addr + (index as u32) * 4, *word).await?;
        }
        Ok(())
    }

    /// Reads a signed 64-bit value stored as low word, high word.
    pub(crate) async fn read_i64(&mut self, addr: u32) -> Result<i64, Error> {
        let low = self.read_reg32(addr).await?;
        let high = self.read_reg32(addr + 4).await?;
        Ok((((high as u64) << 32) | low as u64) as i64)
    }

    /// Polls `addr` until `(value & mask) == expected` or the budget runs out.
    pub(crate) async fn poll_until<D: DelayNs>(
        &mut self,
        delay: &mut D,
        addr: u32,
        mask: u32,
        expected: u32,
        budget: PollBudget,
        timeout: Error,
    ) -> Result<(), Error> {
        for _ in 0..budget.retries {
            let value = self.read_reg32(addr).await?;
            if (value & mask) == expected {
                return Ok(());
            }
            delay.delay_us(budget.interval_us).await;
        }
        debug!("poll timeout at {=u32:#x}", addr);
        Err(timeout)
    }

    /// Resets the DSP core while keeping the microcontroller halted.
    ///
    /// Flash logic stays live so the update sequence can run.
    pub(crate) async fn core_reset_without_mcu<D: DelayNs>(
        &mut self,
        delay: &mut D,
    ) -> Result<(), Error> {
        let wait = self.profile.timing.reset_wait_us;
        self.write_reg32_delayed(delay, sys::SYSDSP_REMAP, remap::CORE_RESET_NO_MCU, wait)
            .await?;
        let status = self.read_reg32(sys::ROMINFO).await?;
        if status != rominfo::HALTED {
            debug!("core reset left ROMINFO={=u32:#x}", status);
            return Err(Error::CoreReset);
        }
        Ok(())
    }

    /// Remaps execution to flash, resets the core, and waits for normal boot.
    pub(crate) async fn remap<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error> {
        let wait = self.profile.timing.reset_wait_us;
        let budget = self.profile.timing.remap;
        self.write_reg32_delayed(delay, sys::SYSDSP_REMAP, remap::REMAP, wait)
            .await?;
        self.poll_until(
            delay,
            sys::ROMINFO,
            u32::MAX,
            rominfo::NORMAL,
            budget,
            Error::RemapTimeout,
        )
        .await
    }
}
