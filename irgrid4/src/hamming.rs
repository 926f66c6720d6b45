// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross

//! EEPROM Hamming code
//!
//! Every EEPROM word past the header is protected with a (16, 11) [Hamming code] ((15, 11) with an
//! extra parity bit over the whole word), with all parity bits moved to the most significant bits.
//! Single bit errors can be corrected, and double bit errors are detected.
//!
//! [Hamming code]: https://en.wikipedia.org/wiki/Hamming_code
//!
//! | Bit  | 15 | 14 | 13 | 12 | 11 | 10 | 9 | 8 | 7 | 6 | 5 | 4 | 3 | 2 | 1 | 0 |
//! |------|----|----|----|----|----|----|---|---|---|---|---|---|---|---|---|---|
//! | Role | P4 | P3 | P2 | P1 | P0 | D10| D9| D8| D7| D6| D5| D4| D3| D2| D1| D0|
//! | P0   |    |    |    |    | x  | x  |   | x |   | x |   | x | x |   | x | x |
//! | P1   |    |    |    | x  |    | x  | x |   |   | x | x |   | x | x |   | x |
//! | P2   |    |    | x  |    |    | x  | x | x | x |   |   |   | x | x | x |   |
//! | P3   |    | x  |    |    |    | x  | x | x | x | x | x | x |   |   |   |   |
//! | P4   | x  | x  | x  | x  | x  | x  | x | x | x | x | x | x | x | x | x | x |

pub(crate) const DATA_MASK: u16 = 0x07FF;

const PARITY_BITS: usize = 5;

/// The bits checked by each parity bit, including the parity bit itself.
const PARITY_MASKS: [u16; PARITY_BITS] = [
    0b0000_1101_0101_1011,
    0b0001_0110_0110_1101,
    0b0010_0111_1000_1110,
    0b0100_0111_1111_0000,
    0b1111_1111_1111_1111,
];

/// Which bit to flip for each syndrome with the overall parity bit set (16 through 31).
///
/// The bit ordering matches the sensor's EEPROM, which does not follow the canonical Hamming
/// position numbering.
const SYNDROME_BITS: [u8; 16] = [15, 11, 12, 0, 13, 1, 2, 3, 14, 4, 5, 6, 7, 8, 9, 10];

/// The outcome of decoding a single EEPROM word.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum DecodeStatus {
    /// The word passed all parity checks.
    Valid,

    /// A single bit error was found and fixed.
    Corrected,

    /// More than one bit is in error. The payload is returned unmodified, and should not be
    /// trusted.
    Uncorrectable,
}

/// Compute the 5-bit syndrome for a code word.
///
/// Bit *n* of the syndrome is set when parity check P*n* fails.
fn syndrome(word: u16) -> u8 {
    PARITY_MASKS
        .iter()
        .enumerate()
        .fold(0u8, |check, (index, mask)| {
            let parity = ((word & mask).count_ones() % 2) as u8;
            check | (parity << index)
        })
}

/// Decode an EEPROM word, returning the 11-bit payload and the decoding status.
///
/// The returned payload is always masked to the lower eleven bits, even when the word is
/// [uncorrectable](DecodeStatus::Uncorrectable).
pub fn decode(word: u16) -> (u16, DecodeStatus) {
    match syndrome(word) {
        0 => (word & DATA_MASK, DecodeStatus::Valid),
        check @ 16..=31 => {
            let bit = SYNDROME_BITS[(check - 16) as usize];
            ((word ^ (1 << bit)) & DATA_MASK, DecodeStatus::Corrected)
        }
        _ => (word & DATA_MASK, DecodeStatus::Uncorrectable),
    }
}

/// Compute and add the Hamming code to an 11-bit payload.
///
/// Returns [`None`] if any of the bits used for the code are already set.
pub fn encode(payload: u16) -> Option<u16> {
    if payload & !DATA_MASK != 0 {
        return None;
    }
    let mut calculated_word = payload;
    for (mask_index, parity_mask) in PARITY_MASKS.iter().enumerate() {
        let parity_index = DATA_MASK.count_ones() as usize + mask_index;
        // The parity bit being computed is still zero, so it doesn't affect the count.
        let parity = ((calculated_word & parity_mask).count_ones() % 2) as u16;
        calculated_word |= parity << parity_index;
    }
    Some(calculated_word)
}
