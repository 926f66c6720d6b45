// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross

/// The number of 16-bit words in the EEPROM.
///
/// 0x273F is the last address in the EEPROM, so add one to that to include it, while 0x2400 is
/// the first address.
pub const EEPROM_LENGTH: usize = 0x2740 - 0x2400;

/// Example EEPROM data from the datasheet (from the worked example).
///
/// The first sixteen words are not part of the example, as that data is ignored for calibration
/// purposes, with the exception of the validity flag (bit 6 of word 10), which is set here. The
/// next 48 words are the shared calibration data.
#[rustfmt::skip]
const DATASHEET_EEPROM_HEADER: [u16; 64] = [
    0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000,
    0x0000, 0x0000, 0x0040, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000,
    0x0000, 0xb7e8, 0xd016, 0x0000, 0x0000, 0xc2fd, 0x1a43, 0xca9a,
    0x5164, 0x018c, 0x018c, 0x018c, 0x9cb1, 0x956c, 0xa5cc, 0x7dd1,
    0x6d7f, 0x3cd4, 0x27b8, 0x19e6, 0xf137, 0x7814, 0x2658, 0xef9e,
    0x917f, 0xf018, 0xe156, 0x4817, 0x1c80, 0x233e, 0xc826, 0xcffc,
    0xa009, 0xbb53, 0xf194, 0xfc00, 0x7814, 0xed22, 0xed22, 0xed22,
    0xed22, 0xed22, 0x80c8, 0xed22, 0x4190, 0xed22, 0xda58, 0xed22,
];

/// The number of pixels on the sensor.
pub const NUM_PIXELS: usize = 192;

/// Word offsets of the per-pixel calibration banks, in EEPROM order.
pub const PIXEL_OFFSET_SUBPAGE_0_START: usize = 0x40;
pub const PIXEL_SENSITIVITY_START: usize = 0x100;
pub const PIXEL_CONSTANTS_START: usize = 0x1C0;
pub const PIXEL_OFFSET_SUBPAGE_1_START: usize = 0x280;

/// Example EEPROM contents, with every pixel using the worked example pixel's data.
pub fn datasheet_eeprom_words() -> [u16; EEPROM_LENGTH] {
    let offset_0 = 0xf849;
    let sensitivity = 0xffff;
    let k_ta_with_k_v = 0xb8c0;
    // Slightly different from the subpage 0 offset, so the two banks can be told apart. The
    // parity bits are correct, so it decodes without any corrections.
    let offset_1 = 0xd847;
    let mut eeprom = [0u16; EEPROM_LENGTH];
    eeprom[..DATASHEET_EEPROM_HEADER.len()].copy_from_slice(&DATASHEET_EEPROM_HEADER);
    // The header data is followed by the offsets for subpage 0 for each pixel, then the
    // sensitivity for each pixel, then a combined K_ta and K_v for each pixel, then offsets for
    // subpage 1 for each pixel.
    let banks = [
        (PIXEL_OFFSET_SUBPAGE_0_START, offset_0),
        (PIXEL_SENSITIVITY_START, sensitivity),
        (PIXEL_CONSTANTS_START, k_ta_with_k_v),
        (PIXEL_OFFSET_SUBPAGE_1_START, offset_1),
    ];
    for (start, value) in banks {
        eeprom[start..(start + NUM_PIXELS)].fill(value);
    }
    eeprom
}

/// The example EEPROM data as big-endian bytes, as it would be read off the bus.
pub fn datasheet_eeprom() -> [u8; EEPROM_LENGTH * 2] {
    let mut bytes = [0u8; EEPROM_LENGTH * 2];
    for (chunk, word) in bytes.chunks_exact_mut(2).zip(datasheet_eeprom_words()) {
        chunk.copy_from_slice(&word.to_be_bytes());
    }
    bytes
}

/// Zero out every calibration word for a pixel, marking it as broken.
pub fn break_pixel(eeprom: &mut [u16; EEPROM_LENGTH], pixel: usize) {
    for start in [
        PIXEL_OFFSET_SUBPAGE_0_START,
        PIXEL_SENSITIVITY_START,
        PIXEL_CONSTANTS_START,
        PIXEL_OFFSET_SUBPAGE_1_START,
    ] {
        eeprom[start + pixel] = 0;
    }
}
