//! Fixed-point views of Q31 coefficients.

use crate::angle::{AngleCorrectionMatrix, AxisConversion};
use crate::calibration::GyroGain;

/// Q31 number type used by the DSP coefficient registers (I1F31).
pub type Q31 = crate::fixed_crate::types::I1F31;

/// Interprets a register word as Q31.
pub const fn q31_from_word(word: u32) -> Q31 {
    Q31::from_bits(word as i32)
}

/// Encodes a Q31 value as a register word.
pub const fn q31_to_word(value: Q31) -> u32 {
    value.to_bits() as u32
}

/// Fixed-point gyro gain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GyroGainFixed {
    /// X axis gain.
    pub x: Q31,
    /// Y axis gain.
    pub y: Q31,
}

/// Converts a gyro gain to fixed point.
pub const fn gyro_gain_fixed(gain: GyroGain) -> GyroGainFixed {
    GyroGainFixed {
        x: q31_from_word(gain.x),
        y: q31_from_word(gain.y),
    }
}

/// Fixed-point axis conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AxisConversionFixed {
    /// X output from X input.
    pub xx: Q31,
    /// X output from Y input.
    pub xy: Q31,
    /// Y output from Y input.
    pub yy: Q31,
    /// Y output from X input.
    pub yx: Q31,
    /// Z polarity.
    pub z: Q31,
}

/// Converts an axis conversion to fixed point.
pub const fn axis_conversion_fixed(conversion: AxisConversion) -> AxisConversionFixed {
    AxisConversionFixed {
        xx: q31_from_word(conversion.xx),
        xy: q31_from_word(conversion.xy),
        yy: q31_from_word(conversion.yy),
        yx: q31_from_word(conversion.yx),
        z: q31_from_word(conversion.z),
    }
}

/// Rotation coefficients `[cos, -sin, sin, cos]` in fixed point.
pub const fn rotation_fixed(matrix: &AngleCorrectionMatrix) -> [Q31; 4] {
    [
        q31_from_word(matrix.rotation[0]),
        q31_from_word(matrix.rotation[1]),
        q31_from_word(matrix.rotation[2]),
        q31_from_word(matrix.rotation[3]),
    ]
}
