//! LC898128/LC898129 register map.
//!
//! Addresses up to `0xFFFF` are host command / DSP RAM registers written
//! directly over the bus. Larger addresses live in the IO space and are
//! reached through the [`ram::IO_ADDR_ACCESS`] / [`ram::IO_DATA_ACCESS`]
//! window by the transport.

#![allow(dead_code)] // Register map mirrors the datasheet; not every entry is wired.

/// Host command window and DSP RAM registers.
pub mod ram {
    /// IO space address latch.
    pub const IO_ADDR_ACCESS: u32 = 0xC000;
    /// IO space data window.
    pub const IO_DATA_ACCESS: u32 = 0xD000;

    /// Program RAM (update code) burst window.
    pub const PMEM_WRITE: u32 = 0x3000;
    /// Program RAM checksum request; write the byte count to start.
    pub const PMEM_CHECKSUM_CMD: u32 = 0xF00A;
    /// Program RAM checksum status (non-zero while busy).
    pub const PMEM_CHECKSUM_STATUS: u32 = 0xF00B;
    /// Program RAM checksum result.
    pub const PMEM_CHECKSUM_VALUE: u32 = 0xF00C;

    /// Flash program buffer A burst window.
    pub const FLASH_BUFFER_A: u32 = 0x3800;
    /// Flash program buffer B burst window.
    pub const FLASH_BUFFER_B: u32 = 0x3900;

    /// Gyro X offset (live).
    pub const GYRO_OFFSET_X: u32 = 0x8118;
    /// Gyro Y offset (live).
    pub const GYRO_OFFSET_Y: u32 = 0x811C;
    /// Gyro Z offset (live).
    pub const GYRO_OFFSET_Z: u32 = 0x8120;
    /// Accelerometer X offset (live).
    pub const ACCEL_OFFSET_X: u32 = 0x8124;
    /// Accelerometer Y offset (live).
    pub const ACCEL_OFFSET_Y: u32 = 0x8128;
    /// Accelerometer Z offset (live).
    pub const ACCEL_OFFSET_Z: u32 = 0x812C;

    /// Gyro X gain.
    pub const GYRO_GAIN_X: u32 = 0x82B8;
    /// Gyro Y gain.
    pub const GYRO_GAIN_Y: u32 = 0x8318;

    /// Filter delay elements downstream of the gyro/accel offsets.
    pub const OFFSET_FILTER_DELAYS: [u32; 8] = [
        0x8140, 0x8144, 0x8148, 0x814C, 0x8190, 0x8194, 0x8198, 0x819C,
    ];

    /// Gyro conversion coefficients (HX from X, HX from Y, HY from Y, HY from X).
    pub const GYRO_CNV_XX: u32 = 0x8270;
    /// See [`GYRO_CNV_XX`].
    pub const GYRO_CNV_XY: u32 = 0x8274;
    /// See [`GYRO_CNV_XX`].
    pub const GYRO_CNV_YY: u32 = 0x8278;
    /// See [`GYRO_CNV_XX`].
    pub const GYRO_CNV_YX: u32 = 0x827C;
    /// Gyro Z polarity.
    pub const GYRO_CNV_ZP: u32 = 0x8280;
    /// Accel conversion coefficients (AX from X, AX from Y, AY from Y, AY from X).
    pub const ACCEL_CNV_XX: u32 = 0x8284;
    /// See [`ACCEL_CNV_XX`].
    pub const ACCEL_CNV_XY: u32 = 0x8288;
    /// See [`ACCEL_CNV_XX`].
    pub const ACCEL_CNV_YY: u32 = 0x828C;
    /// See [`ACCEL_CNV_XX`].
    pub const ACCEL_CNV_YX: u32 = 0x8290;
    /// Accel Z polarity.
    pub const ACCEL_CNV_ZP: u32 = 0x8294;

    /// Gyro rotation matrix (gx45x, gx45y, gy45y, gy45x).
    pub const GYRO_ROT_BASE: u32 = 0x86E0;
    /// Accel rotation matrix (ax45x, ax45y, ay45y, ay45x).
    pub const ACCEL_ROT_BASE: u32 = 0x86F0;
    /// Offset of the mirrored rotation bank (LC898128).
    pub const ROT_MIRROR_OFFSET: u32 = 0x0040;
}

/// Measurement function block (dual channel A/B accumulator).
pub mod meas {
    /// Filter A coefficients (a1, b1, c1, a2, b2, c2).
    pub const FILTER_A_COEFF: u32 = 0x8388;
    /// Filter B coefficients (a1, b1, c1, a2, b2, c2).
    pub const FILTER_B_COEFF: u32 = 0x83A0;
    /// Filter A delay elements (four words).
    pub const FILTER_A_DELAY: u32 = 0x0560;
    /// Filter B delay elements (four words).
    pub const FILTER_B_DELAY: u32 = 0x0570;
    /// Channel A input source address.
    pub const INPUT_A: u32 = 0x0580;
    /// Channel B input source address.
    pub const INPUT_B: u32 = 0x0584;
    /// Samples remaining; write the target to start, reads zero when done.
    pub const SAMPLE_NUM: u32 = 0x0588;
    /// Channel A 64-bit integral (low word, high word at +4).
    pub const INTEGRAL_A: u32 = 0x0590;
    /// Channel B 64-bit integral (low word, high word at +4).
    pub const INTEGRAL_B: u32 = 0x0598;
    /// Channel A absolute maximum.
    pub const MAX_A: u32 = 0x05A0;
    /// Channel B absolute maximum.
    pub const MAX_B: u32 = 0x05A4;

    /// Gyro X ADC data.
    pub const SRC_GYRO_X: u32 = 0x0220;
    /// Gyro Y ADC data.
    pub const SRC_GYRO_Y: u32 = 0x0224;
    /// Gyro Z ADC data.
    pub const SRC_GYRO_Z: u32 = 0x0228;
    /// Accelerometer X ADC data.
    pub const SRC_ACCEL_X: u32 = 0x0230;
    /// Accelerometer Y ADC data.
    pub const SRC_ACCEL_Y: u32 = 0x0234;
    /// Accelerometer Z ADC data.
    pub const SRC_ACCEL_Z: u32 = 0x0238;
}

/// Flash controller IO registers.
pub mod flash {
    /// Read data.
    pub const FLA_RDAT: u32 = 0xE0_7000;
    /// Write data (page buffer input).
    pub const FLA_WDAT: u32 = 0xE0_7004;
    /// Access count (words - 1).
    pub const ACSCNT: u32 = 0xE0_7008;
    /// Mat-encoded target address.
    pub const FLA_ADR: u32 = 0xE0_700C;
    /// Command register.
    pub const CMD: u32 = 0xE0_7010;
    /// Write protect / unlock status.
    pub const FLAWP: u32 = 0xE0_7014;
    /// Busy / interrupt status.
    pub const FLAINT: u32 = 0xE0_7018;
    /// Checksum unit result.
    pub const FLA_SUM: u32 = 0xE0_701C;
    /// Unlock code 1.
    pub const UNLK_CODE1: u32 = 0xE0_7554;
    /// Unlock code 2.
    pub const UNLK_CODE2: u32 = 0xE0_7AA8;
    /// Additional (info/trim mat) unlock code.
    pub const UNLK_CODE3: u32 = 0xE0_7CCC;
}

/// Flash controller command codes.
pub mod flash_cmd {
    /// Read `ACSCNT + 1` words into `FLA_RDAT`.
    pub const READ: u32 = 0x01;
    /// Open the page buffer at `FLA_ADR`.
    pub const PAGE_LOAD: u32 = 0x02;
    /// Program the loaded page buffer.
    pub const PAGE_PROGRAM: u32 = 0x03;
    /// Absolute block erase (LC898129).
    pub const ABS_BLOCK_ERASE: u32 = 0x04;
    /// Program from host buffer A.
    pub const PROGRAM_BUFFER_A: u32 = 0x06;
    /// Program from host buffer B.
    pub const PROGRAM_BUFFER_B: u32 = 0x07;
    /// Checksum `ACSCNT + 1` words from `FLA_ADR`.
    pub const CHECKSUM: u32 = 0x08;
    /// Mat-relative block erase (LC898128).
    pub const BLOCK_ERASE: u32 = 0x20;
}

/// FLAWP bits.
pub mod flawp {
    /// Unlock flag.
    pub const UNLOCKED: u32 = 0x0000_0080;
    /// Protect request.
    pub const PROTECT: u32 = 0x0000_0010;
}

/// FLAINT bits.
pub mod flaint {
    /// Controller busy.
    pub const BUSY: u32 = 0x0000_0080;
}

/// Flash unlock magic values.
pub mod unlock {
    /// Written to `UNLK_CODE1`.
    pub const CODE1: u32 = 0xAAAA_AAAA;
    /// Written to `UNLK_CODE2`.
    pub const CODE2: u32 = 0x5555_5555;
    /// Info mat code.
    pub const INFO_MAT: u32 = 0x0000_C5AD;
    /// Second trim mat code.
    pub const TRIM_MAT: u32 = 0x0000_5B29;
    /// InfoMat2 code on the LC898128.
    pub const INFO_MAT2_128: u32 = 0x0000_6A4B;
    /// Common closing code.
    pub const COMMON: u32 = 0x0000_ACD5;
}

/// System / boot control IO registers.
pub mod sys {
    /// DSP remap and core reset control.
    pub const SYSDSP_REMAP: u32 = 0xD0_00AC;
    /// Boot ROM status.
    pub const ROMINFO: u32 = 0xE0_50D4;
    /// DSP clock divider.
    pub const CLK_DSPDIV: u32 = 0xD0_0014;
    /// Oscillator trim code.
    pub const OSC_TRIM: u32 = 0xD0_0090;
    /// I2C timing-mode counter control.
    pub const OSC_I2C_CNT_CTRL: u32 = 0xD0_0098;
    /// I2C timing-mode counter value.
    pub const OSC_I2C_CNT: u32 = 0xD0_009C;
    /// Timer window control.
    pub const OSC_TIMER_CTRL: u32 = 0xD0_0100;
    /// Timer window status (bit 0 set when the window closed).
    pub const OSC_TIMER_STATUS: u32 = 0xD0_0104;
    /// Timer window oscillator tick count.
    pub const OSC_TIMER_CNT: u32 = 0xD0_0108;
}

/// SYSDSP_REMAP values.
pub mod remap {
    /// Core reset keeping the microcontroller halted.
    pub const CORE_RESET_NO_MCU: u32 = 0x0000_1440;
    /// Remap to flash and reset the core.
    pub const REMAP: u32 = 0x0000_1000;
}

/// ROMINFO values.
pub mod rominfo {
    /// Core halted, flash logic live.
    pub const HALTED: u32 = 0x08;
    /// User code running normally.
    pub const NORMAL: u32 = 0x0A;
}

/// Persisted flash layout.
pub mod layout {
    /// Words per info mat.
    pub const INFO_MAT_WORDS: usize = 32;

    /// InfoMat0 calibration flag word.
    pub const INFO0_FLAG_WORD: usize = 0;
    /// InfoMat0 flag bit set while gyro gain is not calibrated.
    pub const INFO0_GYRO_GAIN_FLAG: u32 = 0x0000_0100;
    /// InfoMat0 gyro gain X word.
    pub const INFO0_GYRO_GAIN_X: usize = 4;
    /// InfoMat0 gyro gain Y word.
    pub const INFO0_GYRO_GAIN_Y: usize = 5;
    /// InfoMat0 checksum word.
    pub const INFO0_CHECKSUM_WORD: usize = 31;

    /// InfoMat1 first packed offset word.
    pub const INFO1_OFFSET_WORD: usize = 0;
    /// InfoMat1 checksum word.
    pub const INFO1_CHECKSUM_WORD: usize = 12;

    /// InfoMat2 re-program marker word.
    pub const INFO2_MARKER_WORD: usize = 15;
    /// InfoMat2 MTP checksum word.
    pub const INFO2_MTP_CHECKSUM_WORD: usize = 16;
    /// InfoMat2 first check code word.
    pub const INFO2_CHECKCODE1_WORD: usize = 30;
    /// InfoMat2 second check code word.
    pub const INFO2_CHECKCODE2_WORD: usize = 31;

    /// Factory-written marker.
    pub const PRDCT_WR: u32 = 0x5555_5555;
    /// User-written marker.
    pub const USER_WR: u32 = 0xAAAA_AAAA;
    /// First check code.
    pub const CHECKCODE1: u32 = 0x9975_6768;
    /// Second check code before oscillator trim.
    pub const CHECKCODE2: u32 = 0x01AC_28AC;
    /// Second check code after oscillator trim (LC898129).
    pub const CHECKCODE2_TRIMMED: u32 = 0x01AC_29AC;

    /// TrimMat word holding the adjusted trim.
    pub const TRIM_WORD: usize = 0;

    /// Erased flash word.
    pub const ERASED: u32 = 0xFFFF_FFFF;
}
