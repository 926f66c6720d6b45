// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross

/// The number of words in an assembled frame.
pub const FRAME_LENGTH: usize = 242;

/// The invalid sample sentinel written by the sensor.
pub const INVALID_SAMPLE: u16 = 0x7FFF;

/// The raw value used for every pixel in [`example_frame`].
pub const EXAMPLE_PIXEL: u16 = 609;

pub const T_A_V_BE_INDEX: usize = 192;
pub const COMPENSATION_PIXEL_INDEX: usize = 200;
pub const GAIN_INDEX: usize = 202;
pub const T_A_PTAT_INDEX: usize = 224;
pub const V_DD_PIXEL_INDEX: usize = 234;
pub const CONTROL_REGISTER_INDEX: usize = 240;
pub const SUBPAGE_INDEX: usize = 241;

/// Control register 1 with the default settings: subpages enabled, 2Hz and 18-bit ADC
/// resolution.
pub const DEFAULT_CONTROL_REGISTER: u16 = 0x0901;

/// A frame matching the datasheet example EEPROM.
///
/// The auxiliary values are chosen so that V<sub>DD</sub> is 3.3V and the ambient temperature
/// comes out at roughly 30℃. The gain matches the EEPROM gain, so the gain correction is 1.
pub fn example_frame(subpage: u16) -> [u16; FRAME_LENGTH] {
    let mut frame = [0u16; FRAME_LENGTH];
    frame[..192].fill(EXAMPLE_PIXEL);
    frame[T_A_V_BE_INDEX] = 19442;
    frame[COMPENSATION_PIXEL_INDEX] = (-60i16) as u16;
    frame[GAIN_INDEX] = 9972;
    frame[T_A_PTAT_INDEX] = 1623;
    frame[V_DD_PIXEL_INDEX] = (-13568i16) as u16;
    frame[CONTROL_REGISTER_INDEX] = DEFAULT_CONTROL_REGISTER;
    frame[SUBPAGE_INDEX] = subpage & 0x0001;
    frame
}
