// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
mod eeprom_data;
mod frame_data;
mod i2c_mock;

pub use eeprom_data::{
    break_pixel, datasheet_eeprom, datasheet_eeprom_words, EEPROM_LENGTH, NUM_PIXELS,
    PIXEL_CONSTANTS_START, PIXEL_OFFSET_SUBPAGE_0_START, PIXEL_OFFSET_SUBPAGE_1_START,
    PIXEL_SENSITIVITY_START,
};
pub use frame_data::*;
pub use i2c_mock::{I2cOperation, MockCameraBus, MockError, NEW_DATA_FLAG, RAM_LENGTH};
