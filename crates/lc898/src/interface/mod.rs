//! Register transport abstraction.

pub(crate) mod i2c;

pub use i2c::{DEFAULT_ADDRESS, I2cConfig, I2cInterface};

use crate::error::Error;

/// Minimal async 32-bit register I/O consumed by the device core.
///
/// Addresses up to `0xFFFF` are host command / RAM registers. Larger
/// addresses are IO registers; transports that talk to the chip over its
/// serial port must route them through the IO access window
/// (see [`I2cInterface`]).
#[allow(async_fn_in_trait)]
pub trait Interface {
    /// Reads one 32-bit register.
    async fn read_reg32(&mut self, addr: u32) -> Result<u32, Error>;
    /// Writes one 32-bit register.
    async fn write_reg32(&mut self, addr: u32, value: u32) -> Result<(), Error>;
    /// Streams `data` to the burst window starting at `addr`.
    async fn burst_write(&mut self, addr: u32, data: &[u8]) -> Result<(), Error>;
    /// Reads `buffer.len()` bytes from the burst window starting at `addr`.
    async fn burst_read(&mut self, addr: u32, buffer: &mut [u8]) -> Result<(), Error>;
}
