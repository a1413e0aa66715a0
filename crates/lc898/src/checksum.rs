//! Checksums matching the on-chip checksum unit.

/// Checksum algorithm guarding a flash region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChecksumKind {
    /// Wrapping 16-bit sum of all bytes.
    ByteSum,
    /// CRC-16, polynomial 0x1021, initial value 0xFFFF.
    Crc16,
}

impl ChecksumKind {
    /// Computes the checksum of `words` (big-endian byte order).
    pub fn compute(self, words: &[u32]) -> u16 {
        match self {
            Self::ByteSum => byte_sum_checksum16(words),
            Self::Crc16 => {
                let mut crc = Crc16::new();
                for word in words {
                    crc.update_u16((word >> 16) as u16);
                    crc.update_u16(*word as u16);
                }
                crc.finish()
            }
        }
    }
}

/// Sums the four bytes of every word into a wrapping 16-bit accumulator.
pub fn byte_sum_checksum16(words: &[u32]) -> u16 {
    words.iter().fold(0u16, |sum, word| {
        word.to_be_bytes()
            .iter()
            .fold(sum, |acc, byte| acc.wrapping_add(u16::from(*byte)))
    })
}

/// Sums `bytes` into a wrapping 16-bit accumulator.
pub fn byte_sum16(bytes: &[u8]) -> u16 {
    bytes
        .iter()
        .fold(0u16, |acc, byte| acc.wrapping_add(u16::from(*byte)))
}

/// CRC-16 polynomial.
pub const CRC16_POLY: u16 = 0x1021;
/// CRC-16 initial value.
pub const CRC16_INIT: u16 = 0xFFFF;

/// Streaming CRC-16 (poly 0x1021, init 0xFFFF, MSB first, no final xor).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Crc16 {
    crc: u16,
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new()
    }
}

impl Crc16 {
    /// Creates a CRC at the initial value.
    pub const fn new() -> Self {
        Self { crc: CRC16_INIT }
    }

    /// Feeds one byte.
    pub fn update_byte(&mut self, byte: u8) {
        self.crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            self.crc = if self.crc & 0x8000 != 0 {
                (self.crc << 1) ^ CRC16_POLY
            } else {
                self.crc << 1
            };
        }
    }

    /// Feeds a 16-bit value, high byte first.
    pub fn update_u16(&mut self, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.update_byte(hi);
        self.update_byte(lo);
    }

    /// Feeds a byte slice.
    pub fn update(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.update_byte(*byte);
        }
    }

    /// Returns the current CRC.
    pub const fn finish(&self) -> u16 {
        self.crc
    }
}

/// CRC-16 of `bytes`.
pub fn crc16(bytes: &[u8]) -> u16 {
    let mut crc = Crc16::new();
    crc.update(bytes);
    crc.finish()
}

/// Sum of the six nibbles of the low 24 bits.
pub const fn nibble_sum(value: u32) -> u8 {
    let mut sum = 0u8;
    let mut shift = 0;
    while shift < 24 {
        sum = sum.wrapping_add(((value >> shift) & 0xF) as u8);
        shift += 4;
    }
    sum
}

/// Stores a 16-bit checksum in the high half of `word`, keeping the low half.
pub(crate) const fn with_checksum_high(word: u32, checksum: u16) -> u32 {
    ((checksum as u32) << 16) | (word & 0x0000_FFFF)
}
