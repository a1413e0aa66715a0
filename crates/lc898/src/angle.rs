//! Angle-correction matrix: maps the physical gyro/accel axes onto the
//! control-loop axes for a given mounting.

use crate::device::DeviceCore;
use crate::error::Error;
use crate::interface::Interface;
use crate::macros::debug;
use crate::register::ram;

/// Q31 +1.0.
pub const Q31_POSITIVE: u32 = 0x7FFF_FFFF;
/// Q31 -1.0.
pub const Q31_NEGATIVE: u32 = 0x8000_0001;
/// Q31 0.0.
pub const Q31_ZERO: u32 = 0;

/// Number of supported mounting arrangements per actuator.
pub const ARRANGEMENTS: u8 = 2;

/// Conversion flags per actuator type, indexed by arrangement.
///
/// Bits 7..4: HX, HY, AX, AY polarity (set = positive). Bit 3: swap gyro X/Y.
/// Bit 2: swap accel X/Y. Bit 1: gyro Z polarity. Bit 0: accel Z polarity.
const CONVERSION_FLAGS: [[u8; ARRANGEMENTS as usize]; 3] = [
    [0xF3, 0x5F],
    [0xA3, 0xC6],
    [0x3C, 0x93],
];

const HX_POSITIVE: u8 = 0x80;
const HY_POSITIVE: u8 = 0x40;
const AX_POSITIVE: u8 = 0x20;
const AY_POSITIVE: u8 = 0x10;
const GYRO_SWAP: u8 = 0x08;
const ACCEL_SWAP: u8 = 0x04;
const GZ_POSITIVE: u8 = 0x02;
const AZ_POSITIVE: u8 = 0x01;

/// Conversion coefficients for one sensor (Q31).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AxisConversion {
    /// X output from X input.
    pub xx: u32,
    /// X output from Y input.
    pub xy: u32,
    /// Y output from Y input.
    pub yy: u32,
    /// Y output from X input.
    pub yx: u32,
    /// Z polarity.
    pub z: u32,
}

impl AxisConversion {
    const fn decode(x_positive: bool, y_positive: bool, swap: bool, z_positive: bool) -> Self {
        let x = polarity(x_positive);
        let y = polarity(y_positive);
        if swap {
            Self {
                xx: Q31_ZERO,
                xy: x,
                yy: Q31_ZERO,
                yx: y,
                z: polarity(z_positive),
            }
        } else {
            Self {
                xx: x,
                xy: Q31_ZERO,
                yy: y,
                yx: Q31_ZERO,
                z: polarity(z_positive),
            }
        }
    }

    /// Register order: XX, XY, YY, YX, Z.
    pub const fn to_words(&self) -> [u32; 5] {
        [self.xx, self.xy, self.yy, self.yx, self.z]
    }
}

const fn polarity(positive: bool) -> u32 {
    if positive { Q31_POSITIVE } else { Q31_NEGATIVE }
}

/// Coefficients written by [`angle_correction_matrix`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AngleCorrectionMatrix {
    /// Conversion flag byte the matrix was decoded from.
    pub flags: u8,
    /// Gyro axis conversion.
    pub gyro: AxisConversion,
    /// Accelerometer axis conversion.
    pub accel: AxisConversion,
    /// Rotation `[cos, -sin, sin, cos]`, shared by gyro and accel.
    pub rotation: [u32; 4],
}

/// Q31 `(cos, sin)` of a right-angle rotation.
const fn right_angle(degree_gap: i16) -> Option<(u32, u32)> {
    match degree_gap {
        0 => Some((Q31_POSITIVE, Q31_ZERO)),
        90 => Some((Q31_ZERO, Q31_POSITIVE)),
        -90 => Some((Q31_ZERO, Q31_NEGATIVE)),
        180 | -180 => Some((Q31_NEGATIVE, Q31_ZERO)),
        _ => None,
    }
}

const fn negate(value: u32) -> u32 {
    match value {
        Q31_POSITIVE => Q31_NEGATIVE,
        Q31_NEGATIVE => Q31_POSITIVE,
        other => other,
    }
}

/// Builds the correction matrix for a mounting.
///
/// Only right angles are supported; other gaps in range return
/// [`Error::Unsupported`].
pub const fn angle_correction_matrix(
    degree_gap: i16,
    actuator: u8,
    arrangement: u8,
) -> Result<AngleCorrectionMatrix, Error> {
    if arrangement >= ARRANGEMENTS {
        return Err(Error::InvalidArrangement);
    }
    if degree_gap < -180 || degree_gap > 180 {
        return Err(Error::InvalidAngle);
    }
    if actuator as usize >= CONVERSION_FLAGS.len() {
        return Err(Error::InvalidActuator);
    }
    let Some((cos, sin)) = right_angle(degree_gap) else {
        return Err(Error::Unsupported);
    };

    let flags = CONVERSION_FLAGS[actuator as usize][arrangement as usize];
    Ok(AngleCorrectionMatrix {
        flags,
        gyro: AxisConversion::decode(
            flags & HX_POSITIVE != 0,
            flags & HY_POSITIVE != 0,
            flags & GYRO_SWAP != 0,
            flags & GZ_POSITIVE != 0,
        ),
        accel: AxisConversion::decode(
            flags & AX_POSITIVE != 0,
            flags & AY_POSITIVE != 0,
            flags & ACCEL_SWAP != 0,
            flags & AZ_POSITIVE != 0,
        ),
        rotation: [cos, negate(sin), sin, cos],
    })
}

impl<I> DeviceCore<I>
where
    I: Interface,
{
    /// Validates, builds and writes the angle-correction coefficients.
    pub(crate) async fn set_angle_correction(
        &mut self,
        degree_gap: i16,
        actuator: u8,
        arrangement: u8,
    ) -> Result<AngleCorrectionMatrix, Error> {
        let matrix = angle_correction_matrix(degree_gap, actuator, arrangement)?;
        self.write_words(ram::GYRO_CNV_XX, &matrix.gyro.to_words())
            .await?;
        self.write_words(ram::ACCEL_CNV_XX, &matrix.accel.to_words())
            .await?;

        let mirror = self.profile().mirror_rotation;
        for base in [ram::GYRO_ROT_BASE, ram::ACCEL_ROT_BASE] {
            self.write_words(base, &matrix.rotation).await?;
            if mirror {
                self.write_words(base + ram::ROT_MIRROR_OFFSET, &matrix.rotation)
                    .await?;
            }
        }
        debug!("angle correction {=i16} deg, flags {=u8:#x}", degree_gap, matrix.flags);
        Ok(matrix)
    }
}
