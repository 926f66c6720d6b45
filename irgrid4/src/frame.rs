// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross

//! Assembled frames and their validation
use core::ops::RangeInclusive;

use crate::error::FrameError;
use crate::register::{Resolution, Subpage};
use crate::NUM_PIXELS;

/// The number of words in an assembled frame.
///
/// The first 192 words are pixel samples, then 48 auxiliary words, then a copy of control
/// register 1, then the subpage the frame holds new data for.
pub const FRAME_LENGTH: usize = 242;

/// The value the sensor writes into a slot that has no valid sample.
pub const INVALID_SAMPLE: u16 = 0x7FFF;

/// The auxiliary words that are checked for the invalid sample sentinel.
const CHECKED_AUX_WORDS: [RangeInclusive<usize>; 5] =
    [192..=192, 200..=210, 212..=215, 216..=224, 232..=239];

/// Every 16th pixel is checked for the invalid sample sentinel.
const PIXEL_PROBE_STRIDE: usize = 16;

/// Indices of the auxiliary values within a frame.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(usize)]
enum FrameWord {
    /// Labelled V<sub>BE</sub> and Ta<sub>V<sub>BE</sub></sub> in the datasheet.
    AmbientTemperatureVoltageBe = 192,

    CompensationPixel = 200,

    /// The current (in the temporal sense, not electrical) gain.
    Gain = 202,

    /// Ambient temperature voltage, labelled T<sub>a<sub>PTAT</sub></sub> in the datasheet.
    AmbientTemperatureVoltage = 224,

    VddPixel = 234,

    ControlRegister = 240,

    Subpage = 241,
}

/// One measurement cycle's worth of raw data.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame([u16; FRAME_LENGTH]);

impl Frame {
    pub fn new(words: [u16; FRAME_LENGTH]) -> Self {
        Self(words)
    }

    /// Check this frame for stale or invalid samples, returning the subpage it was captured for.
    pub fn validate(&self) -> Result<Subpage, FrameError> {
        validate(&self.0)
    }

    pub fn words(&self) -> &[u16; FRAME_LENGTH] {
        &self.0
    }

    fn signed(&self, word: FrameWord) -> i16 {
        self.0[word as usize] as i16
    }

    /// The raw (signed) sample for a pixel.
    ///
    /// # Panics
    /// If `index` is not less than [`NUM_PIXELS`].
    pub fn pixel(&self, index: usize) -> i16 {
        self.0[..NUM_PIXELS][index] as i16
    }

    /// All of the pixel samples, in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = i16> + '_ {
        self.0[..NUM_PIXELS].iter().map(|sample| *sample as i16)
    }

    pub fn t_a_v_be(&self) -> i16 {
        self.signed(FrameWord::AmbientTemperatureVoltageBe)
    }

    pub fn t_a_ptat(&self) -> i16 {
        self.signed(FrameWord::AmbientTemperatureVoltage)
    }

    pub fn compensation_pixel(&self) -> i16 {
        self.signed(FrameWord::CompensationPixel)
    }

    pub fn gain(&self) -> i16 {
        self.signed(FrameWord::Gain)
    }

    pub fn v_dd_pixel(&self) -> i16 {
        self.signed(FrameWord::VddPixel)
    }

    /// The ADC resolution the frame was sampled at.
    pub fn resolution(&self) -> Resolution {
        Resolution::from_control_register(self.0[FrameWord::ControlRegister as usize])
    }

    pub fn subpage(&self) -> Subpage {
        Subpage::from_word(self.0[FrameWord::Subpage as usize])
    }
}

impl From<[u16; FRAME_LENGTH]> for Frame {
    fn from(words: [u16; FRAME_LENGTH]) -> Self {
        Self::new(words)
    }
}

/// Check a frame for the invalid sample sentinel, returning the subpage it was captured for.
///
/// Only a selection of the pixels are checked, as the sensor invalidates all pixels at the same
/// time.
pub fn validate(frame: &[u16; FRAME_LENGTH]) -> Result<Subpage, FrameError> {
    let aux_invalid = CHECKED_AUX_WORDS
        .iter()
        .cloned()
        .flatten()
        .any(|index| frame[index] == INVALID_SAMPLE);
    if aux_invalid {
        return Err(FrameError::StaleOrInvalidAuxData);
    }
    let pixels_invalid = frame[..NUM_PIXELS]
        .iter()
        .step_by(PIXEL_PROBE_STRIDE)
        .any(|sample| *sample == INVALID_SAMPLE);
    if pixels_invalid {
        return Err(FrameError::StaleOrInvalidPixelData);
    }
    Ok(Subpage::from_word(frame[FrameWord::Subpage as usize]))
}
