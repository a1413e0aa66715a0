//! I2C interface adapter for the LC898 family.

use embedded_hal_async::i2c::{I2c, Operation};

use super::Interface;
use crate::error::Error;
use crate::register::ram;

/// Default 7-bit I2C address of the LC898128/LC898129.
pub const DEFAULT_ADDRESS: u8 = 0x24;

/// Bus settings for [`I2cInterface`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct I2cConfig {
    /// 7-bit slave address (the OIS block answers on 0x24 unless strapped).
    pub address: u8,
}

impl I2cConfig {
    /// Factory address.
    pub const DEFAULT: Self = Self {
        address: DEFAULT_ADDRESS,
    };
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// I2C register interface.
///
/// Frames are a 16-bit big-endian register address followed by big-endian
/// data. IO registers (address above `0xFFFF`) are written by latching the
/// address into `IO_ADDR_ACCESS` and moving data through `IO_DATA_ACCESS`.
pub struct I2cInterface<I2C> {
    bus: I2C,
    config: I2cConfig,
}

impl<I2C> I2cInterface<I2C> {
    /// Wraps `bus`, talking to the device at `config.address`.
    pub const fn new(bus: I2C, config: I2cConfig) -> Self {
        Self { bus, config }
    }

    /// Current 7-bit address.
    pub const fn address(&self) -> u8 {
        self.config.address
    }

    /// Points subsequent transfers at another address.
    pub fn set_address(&mut self, address: u8) {
        self.config.address = address;
    }

    /// Returns the bus.
    pub fn into_inner(self) -> I2C {
        self.bus
    }
}

const fn is_io(addr: u32) -> bool {
    addr > 0xFFFF
}

const fn reg_bytes(addr: u32) -> [u8; 2] {
    [(addr >> 8) as u8, addr as u8]
}

impl<I2C> I2cInterface<I2C>
where
    I2C: I2c,
{
    async fn write_ram32(&mut self, addr: u32, value: u32) -> Result<(), Error> {
        let [hi, lo] = reg_bytes(addr);
        let [b3, b2, b1, b0] = value.to_be_bytes();
        self.bus
            .write(self.config.address, &[hi, lo, b3, b2, b1, b0])
            .await
            .map_err(|_| Error::Bus)
    }

    async fn read_ram32(&mut self, addr: u32) -> Result<u32, Error> {
        let mut buffer = [0u8; 4];
        self.bus
            .write_read(self.config.address, &reg_bytes(addr), &mut buffer)
            .await
            .map_err(|_| Error::Bus)?;
        Ok(u32::from_be_bytes(buffer))
    }
}

impl<I2C> Interface for I2cInterface<I2C>
where
    I2C: I2c,
{
    async fn read_reg32(&mut self, addr: u32) -> Result<u32, Error> {
        if is_io(addr) {
            self.write_ram32(ram::IO_ADDR_ACCESS, addr).await?;
            self.read_ram32(ram::IO_DATA_ACCESS).await
        } else {
            self.read_ram32(addr).await
        }
    }

    async fn write_reg32(&mut self, addr: u32, value: u32) -> Result<(), Error> {
        if is_io(addr) {
            self.write_ram32(ram::IO_ADDR_ACCESS, addr).await?;
            self.write_ram32(ram::IO_DATA_ACCESS, value).await
        } else {
            self.write_ram32(addr, value).await
        }
    }

    async fn burst_write(&mut self, addr: u32, data: &[u8]) -> Result<(), Error> {
        if is_io(addr) {
            return Err(Error::InvalidData);
        }
        if data.is_empty() {
            return Ok(());
        }
        let reg = reg_bytes(addr);
        let mut ops = [Operation::Write(&reg), Operation::Write(data)];
        self.bus
            .transaction(self.config.address, &mut ops)
            .await
            .map_err(|_| Error::Bus)
    }

    async fn burst_read(&mut self, addr: u32, buffer: &mut [u8]) -> Result<(), Error> {
        if is_io(addr) {
            return Err(Error::InvalidData);
        }
        if buffer.is_empty() {
            return Ok(());
        }
        self.bus
            .write_read(self.config.address, &reg_bytes(addr), buffer)
            .await
            .map_err(|_| Error::Bus)
    }
}
