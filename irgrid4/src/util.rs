// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross

/// The word size of the sensor in terms of 8-bit bytes.
pub(crate) const WORD_SIZE: usize = (u16::BITS / u8::BITS) as usize;

/// Generate public, read-only accessors for struct members.
#[doc(hidden)]
#[macro_export]
macro_rules! expose_member {
    ($(#[$meta:meta])* $name:ident, $typ:ty) => {
        $(#[$meta])*
        pub fn $name(&self) -> $typ {
            self.$name
        }
    };
    ($(#[$meta:meta])* &$name:ident, $typ:ty) => {
        $(#[$meta])*
        pub fn $name(&self) -> &$typ {
            &self.$name
        }
    };
}

/// Check if the n-th bit is set.
///
/// Bits are 0-indexed, from the LSB.
pub(crate) fn is_bit_set<B>(value: B, index: usize) -> bool
where
    B: num_traits::PrimInt + num_traits::Unsigned,
{
    (value & (B::one() << index)) > B::zero()
}

/// Interpret the lowest `num_bits` bits of `value` as a two's complement integer.
///
/// Any bits above `num_bits` are ignored.
pub(crate) fn sign_extend(value: u16, num_bits: u8) -> i16 {
    let shift_amount = 16 - num_bits;
    ((value << shift_amount) as i16) >> shift_amount
}

/// Sign-extend an 11-bit EEPROM payload.
pub(crate) fn i16_from_i11(value: u16) -> i16 {
    sign_extend(value, 11)
}

/// Join two 11-bit EEPROM payloads into a single 16-bit value.
///
/// The sensor can only fit eleven bits of data in each EEPROM word, so some values are split with
/// the upper word scaled by 2<sup>5</sup>.
pub(crate) fn combine_words(upper: u16, lower: u16) -> u16 {
    upper.wrapping_shl(5).wrapping_add(lower)
}

/// Split a word into two values: the upper six bits and the lower five bits.
pub(crate) fn split_6_5(word: u16) -> (u8, u8) {
    let upper = (word & 0x07E0) >> 5;
    let lower = word & 0x001F;
    (upper as u8, lower as u8)
}
