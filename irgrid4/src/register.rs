// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::util::is_bit_set;

/// The address of the status register.
pub(crate) const STATUS_REGISTER_ADDRESS: u16 = 0x8000;

/// The address of control register 1.
pub(crate) const CONTROL_REGISTER_ADDRESS: u16 = 0x800D;

/// The bits of the status register a controller may write. The lowest three bits are read-only.
const STATUS_WRITE_MASK: u16 = 0x0038;

const NEW_DATA_BIT: usize = 3;
const OVERWRITE_ENABLED_BIT: usize = 4;
const START_MEASUREMENT_BIT: usize = 5;

/// Identify which subpage (half of the pixels) a frame holds new samples for.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, IntoPrimitive, TryFromPrimitive)]
#[repr(usize)]
pub enum Subpage {
    Zero = 0,
    One = 1,
}

impl Subpage {
    /// Interpret the lowest bit of a word as a subpage number. All other bits are ignored.
    pub fn from_word(raw: u16) -> Self {
        if is_bit_set(raw, 0) {
            Self::One
        } else {
            Self::Zero
        }
    }
}

/// The resolution of the internal [ADC][adc].
///
/// [adc]: https://en.wikipedia.org/wiki/Analog-to-digital_converter
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Resolution {
    /// 16-bit.
    Sixteen,

    /// 17-bit.
    Seventeen,

    /// 18-bit, the default.
    Eighteen,

    /// 19-bit.
    Nineteen,
}

impl Resolution {
    /// Create a `Resolution` from the two-bit field used by both the EEPROM and the control
    /// register. Bits above the lowest two are ignored.
    pub fn from_raw(raw_value: u16) -> Self {
        match raw_value & 0x0003 {
            0 => Self::Sixteen,
            1 => Self::Seventeen,
            2 => Self::Eighteen,
            _ => Self::Nineteen,
        }
    }

    /// Extract the current resolution from control register 1 (bits 10 and 11).
    pub fn from_control_register(raw: u16) -> Self {
        Self::from_raw((raw & 0x0C00) >> 10)
    }

    /// Map a resolution variant into the two-bit representation used by the sensor.
    pub fn as_raw(&self) -> u16 {
        match self {
            Self::Sixteen => 0,
            Self::Seventeen => 1,
            Self::Eighteen => 2,
            Self::Nineteen => 3,
        }
    }

    /// The factor to convert a value sampled at `current` resolution to this (calibrated)
    /// resolution.
    pub(crate) fn correction_from(&self, current: Resolution) -> f32 {
        // Both raw values are at most 3, so the exponent is small enough to be exact.
        let exponent = self.as_raw() as i32 - current.as_raw() as i32;
        if exponent >= 0 {
            (1u32 << exponent) as f32
        } else {
            1f32 / (1u32 << -exponent) as f32
        }
    }
}

impl From<Resolution> for u8 {
    fn from(resolution: Resolution) -> Self {
        match resolution {
            Resolution::Sixteen => 16,
            Resolution::Seventeen => 17,
            Resolution::Eighteen => 18,
            Resolution::Nineteen => 19,
        }
    }
}

/// The status register (0x8000).
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub(crate) struct StatusRegister {
    /// The subpage which was last updated by the sensor. Read-only.
    pub(crate) last_updated_subpage: Subpage,

    /// Set by the sensor when there is new data available in RAM, and only reset by the
    /// controller.
    pub(crate) new_data: bool,

    /// Whether data in RAM can be overwritten.
    pub(crate) overwrite_enabled: bool,

    /// Start a measurement in step mode.
    pub(crate) start_measurement: bool,
}

impl StatusRegister {
    /// The value to write back to the sensor to acknowledge the current data.
    pub(crate) fn acknowledged(&self) -> u16 {
        let cleared = Self {
            new_data: false,
            ..*self
        };
        u16::from(cleared) & STATUS_WRITE_MASK
    }
}

impl From<u16> for StatusRegister {
    fn from(raw: u16) -> Self {
        Self {
            last_updated_subpage: Subpage::from_word(raw),
            new_data: is_bit_set(raw, NEW_DATA_BIT),
            overwrite_enabled: is_bit_set(raw, OVERWRITE_ENABLED_BIT),
            start_measurement: is_bit_set(raw, START_MEASUREMENT_BIT),
        }
    }
}

impl From<StatusRegister> for u16 {
    fn from(status: StatusRegister) -> Self {
        let subpage: usize = status.last_updated_subpage.into();
        let mut register = subpage as u16;
        register |= (status.new_data as u16) << NEW_DATA_BIT;
        register |= (status.overwrite_enabled as u16) << OVERWRITE_ENABLED_BIT;
        register |= (status.start_measurement as u16) << START_MEASUREMENT_BIT;
        register
    }
}
