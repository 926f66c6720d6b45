// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross

//! Loading and error-correcting the calibration EEPROM
use num_enum::IntoPrimitive;

use crate::error::CalibrationError;
use crate::hamming::{self, DecodeStatus};
use crate::util::{is_bit_set, WORD_SIZE};

/// The number of 16-bit words in the EEPROM.
pub const EEPROM_LENGTH: usize = 0x2740 - 0x2400;

/// The first EEPROM address on the I²C bus.
pub(crate) const EEPROM_BASE_ADDRESS: u16 = 0x2400;

/// Words before this index are not Hamming coded, and are kept as-is.
const FIRST_CODED_WORD: usize = 16;

/// The bit in [`EepromWord::Validity`] that is set when the calibration data has been written.
const VALIDITY_BIT: usize = 6;

/// Offsets of the calibration values from the start of the EEPROM, in words.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, IntoPrimitive)]
#[repr(u16)]
pub(crate) enum EepromWord {
    Validity = 10,

    /// The bits 5 through 10 are the offset compensation scaling factor.
    OffsetScale = 16,

    /// The pixel offset average is split across two words.
    OffsetAverageStart = 17,

    KTaAverage = 21,

    KTaScale = 22,

    KVAverage = 23,

    KVScale = 24,

    /// Three words, each with two row-group sensitivity scales packed in them.
    AlphaScaleStart = 25,

    /// Six words, each the maximum sensitivity for a group of 32 pixels.
    AlphaMaxStart = 28,

    KsTa = 34,

    Emissivity = 35,

    GainStart = 36,

    VDd25 = 38,

    KVDd = 39,

    VPtat25Start = 40,

    KtPtat = 42,

    KvPtat = 43,

    AlphaPtat = 44,

    CompensationPixelAlpha = 45,

    CompensationPixelAlphaScale = 46,

    CompensationPixelOffsetStart = 47,

    CompensationPixelKTa = 49,

    CompensationPixelKV = 50,

    /// Thermal gradient coefficient in the lower nine bits, calibration resolution in bits 9 and
    /// 10.
    ResolutionWithTgc = 51,

    KsToScale = 52,

    KsTo0 = 53,

    CornerTemperature5 = 58,

    KsTo5 = 59,

    CornerTemperature6 = 60,

    KsTo6 = 61,

    CornerTemperature7 = 62,

    KsTo7 = 63,

    PixelOffsetSubpage0Start = 64,

    PixelSensitivityStart = 256,

    /// K<sub>Ta</sub> in the upper six bits, K<sub>V</sub> in the lower five bits.
    PixelConstantsStart = 448,

    PixelOffsetSubpage1Start = 640,
}

impl EepromWord {
    /// The index of this word within the EEPROM image.
    pub(crate) fn index(self) -> usize {
        let raw: u16 = self.into();
        raw as usize
    }
}

/// A summary of the error correction applied while loading an EEPROM image.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DecodeReport {
    /// The number of words with a single-bit error that was corrected.
    pub corrected: usize,

    /// The number of words with multiple bit errors. These words are masked to their payload
    /// bits, but are otherwise untouched.
    pub uncorrectable: usize,
}

impl DecodeReport {
    /// `true` if every coded word passed its parity checks.
    pub fn is_clean(&self) -> bool {
        self.corrected == 0 && self.uncorrectable == 0
    }
}

/// A decoded EEPROM image.
///
/// The first 16 words are stored as read. Every later word has been run through the
/// [Hamming decoder](crate::hamming::decode) and holds only its 11-bit payload.
#[derive(Clone, Debug, PartialEq)]
pub struct EepromImage {
    words: [u16; EEPROM_LENGTH],

    report: DecodeReport,
}

impl EepromImage {
    /// Decode a raw EEPROM dump.
    ///
    /// Uncorrectable words do not fail the load; they are logged and counted in the
    /// [`DecodeReport`]. The only failure is when the validity flag is not set.
    pub fn load(raw: [u16; EEPROM_LENGTH]) -> Result<Self, CalibrationError> {
        let mut words = raw;
        let mut report = DecodeReport::default();
        for (index, word) in words.iter_mut().enumerate().skip(FIRST_CODED_WORD) {
            let (payload, status) = hamming::decode(*word);
            match status {
                DecodeStatus::Valid => (),
                DecodeStatus::Corrected => {
                    tracing::debug!(index, raw = *word, "corrected EEPROM word");
                    report.corrected += 1;
                }
                DecodeStatus::Uncorrectable => {
                    tracing::warn!(index, raw = *word, "uncorrectable EEPROM word");
                    report.uncorrectable += 1;
                }
            }
            *word = payload;
        }
        if !is_bit_set(words[EepromWord::Validity.index()], VALIDITY_BIT) {
            return Err(CalibrationError::InvalidEeprom);
        }
        if report.uncorrectable > 0 {
            tracing::warn!(
                uncorrectable = report.uncorrectable,
                "EEPROM contains words that could not be corrected"
            );
        }
        Ok(Self { words, report })
    }

    /// Decode an EEPROM dump as read directly off the bus (big-endian words).
    pub fn from_be_bytes(
        bytes: &[u8; EEPROM_LENGTH * WORD_SIZE],
    ) -> Result<Self, CalibrationError> {
        let mut words = [0u16; EEPROM_LENGTH];
        for (word, pair) in words.iter_mut().zip(bytes.chunks_exact(WORD_SIZE)) {
            *word = u16::from_be_bytes([pair[0], pair[1]]);
        }
        Self::load(words)
    }

    /// Get a decoded word by index.
    ///
    /// # Panics
    /// If `index` is not less than [`EEPROM_LENGTH`].
    pub fn word(&self, index: usize) -> u16 {
        self.words[index]
    }

    /// All of the decoded words.
    pub fn words(&self) -> &[u16; EEPROM_LENGTH] {
        &self.words
    }

    /// How many words needed correcting (or could not be corrected) while loading.
    pub fn decode_report(&self) -> DecodeReport {
        self.report
    }

    pub(crate) fn get(&self, word: EepromWord) -> u16 {
        self.words[word.index()]
    }

    /// Get the word `offset` words after `word`.
    pub(crate) fn get_offset(&self, word: EepromWord, offset: usize) -> u16 {
        self.words[word.index() + offset]
    }
}
