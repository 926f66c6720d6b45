// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross

//! Calibration parameter extraction
//!
//! The factory calibration is scattered across the EEPROM in a mix of fixed-point formats. This
//! module pulls it all out once, into an immutable [`CalibrationParams`] that the
//! [calculations](crate::calculations) can then borrow for every frame.
use arrayvec::ArrayVec;

// Various floating point operations are not implemented in core, so we use libm to provide them as
// needed.
#[cfg_attr(feature = "std", allow(unused_imports))]
use num_traits::Float;

use crate::eeprom::{EepromImage, EepromWord};
use crate::error::CalibrationError;
use crate::expose_member;
use crate::register::{Resolution, Subpage};
use crate::util::{combine_words, i16_from_i11, sign_extend, split_6_5};
use crate::NUM_PIXELS;

/// The number of temperature ranges (and corner temperatures) the sensor is calibrated over.
pub const NUM_CORNER_TEMPERATURES: usize = 8;

/// The fixed scale applied to every pixel sensitivity.
pub(crate) const SCALE_ALPHA: f32 = 0.000001;

/// The pixel sensitivities are split into groups of 32 pixels (two rows), each with their own
/// scale and maximum.
const NUM_ALPHA_GROUPS: usize = 6;

const PIXELS_PER_ALPHA_GROUP: usize = NUM_PIXELS / NUM_ALPHA_GROUPS;

/// Each group's sensitivity scale is offset by this amount.
const ALPHA_GROUP_SCALE_OFFSET: u8 = 20;

/// The sensitivities are rescaled so the largest one is at least this large.
const ALPHA_LOWER_BOUND: f32 = 32768f32;

/// K<sub>Ta</sub> and K<sub>V</sub> are rescaled so the largest magnitude is at least this large.
const PIXEL_CONSTANT_LOWER_BOUND: f32 = 64f32;

/// The first five corner temperatures are fixed, the rest come from the EEPROM.
const FIXED_CORNER_TEMPERATURES: [i16; 5] = [-40, -20, 0, 80, 120];

/// Calibration data for a single sensor, extracted from its EEPROM.
///
/// Per-pixel arrays are in row-major order (`index = row * 16 + column`).
#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationParams {
    pub(crate) k_vdd: i16,

    pub(crate) vdd_25: i16,

    pub(crate) kv_ptat: f32,

    pub(crate) kt_ptat: f32,

    pub(crate) v_ptat_25: f32,

    pub(crate) alpha_ptat: f32,

    pub(crate) gain_ee: i16,

    pub(crate) tgc: f32,

    pub(crate) emissivity_ee: f32,

    pub(crate) resolution_ee: Resolution,

    pub(crate) ks_ta: f32,

    pub(crate) cp_alpha: f32,

    pub(crate) cp_offset: i16,

    pub(crate) cp_kv: f32,

    pub(crate) cp_kta: f32,

    pub(crate) ks_to: [f32; NUM_CORNER_TEMPERATURES],

    pub(crate) ct: [i16; NUM_CORNER_TEMPERATURES],

    pub(crate) alpha: [u16; NUM_PIXELS],

    pub(crate) alpha_scale: u8,

    pub(crate) offset: [[i16; NUM_PIXELS]; 2],

    pub(crate) kta: [i8; NUM_PIXELS],

    pub(crate) kta_scale: u8,

    pub(crate) kv: [i8; NUM_PIXELS],

    pub(crate) kv_scale: u8,

    pub(crate) broken_pixel: Option<usize>,
}

impl CalibrationParams {
    expose_member!(
        /// Supply voltage sensitivity (K<sub>V<sub>DD</sub></sub>), pre-multiplied by
        /// 2<sup>5</sup>.
        k_vdd,
        i16
    );
    expose_member!(
        /// V<sub>DD</sub> pixel value at 25℃ and 3.3V, pre-multiplied by 2<sup>5</sup>.
        vdd_25,
        i16
    );
    expose_member!(kv_ptat, f32);
    expose_member!(kt_ptat, f32);
    expose_member!(v_ptat_25, f32);
    expose_member!(alpha_ptat, f32);
    expose_member!(
        /// The gain the sensor was calibrated at.
        gain_ee,
        i16
    );
    expose_member!(
        /// Thermal gradient coefficient, how strongly the compensation pixel is applied.
        tgc,
        f32
    );
    expose_member!(emissivity_ee, f32);
    expose_member!(
        /// The ADC resolution used during calibration.
        resolution_ee,
        Resolution
    );
    expose_member!(ks_ta, f32);
    expose_member!(cp_alpha, f32);
    expose_member!(cp_offset, i16);
    expose_member!(cp_kv, f32);
    expose_member!(cp_kta, f32);
    expose_member!(
        /// Sensitivity correction slope for each temperature range.
        &ks_to,
        [f32; NUM_CORNER_TEMPERATURES]
    );
    expose_member!(
        /// The lower bound (in ℃) of each temperature range.
        &ct,
        [i16; NUM_CORNER_TEMPERATURES]
    );
    expose_member!(
        /// Pixel sensitivities, scaled by 2<sup>[`alpha_scale`](Self::alpha_scale)</sup>.
        ///
        /// The actual sensitivity is `SCALE_ALPHA * 2^alpha_scale / alpha[pixel]`, with
        /// `SCALE_ALPHA` being 10<sup>-6</sup>.
        &alpha,
        [u16; NUM_PIXELS]
    );
    expose_member!(alpha_scale, u8);
    expose_member!(&kta, [i8; NUM_PIXELS]);
    expose_member!(kta_scale, u8);
    expose_member!(&kv, [i8; NUM_PIXELS]);
    expose_member!(kv_scale, u8);
    expose_member!(
        /// The pixel with no calibration data, if there is one.
        broken_pixel,
        Option<usize>
    );

    /// Pixel offsets for the given subpage.
    pub fn offset(&self, subpage: Subpage) -> &[i16; NUM_PIXELS] {
        let index: usize = subpage.into();
        &self.offset[index]
    }
}

/// Pull all of the calibration parameters out of a decoded EEPROM image.
pub fn extract(eeprom: &EepromImage) -> Result<CalibrationParams, CalibrationError> {
    // This needs to be done first, as the sensitivity search skips over the broken pixel.
    let broken_pixel = find_broken_pixel(eeprom)?;
    let (k_vdd, vdd_25) = supply_parameters(eeprom);
    let ptat = PtatParameters::new(eeprom);
    let gain_ee = combine_words(
        eeprom.get(EepromWord::GainStart),
        eeprom.get_offset(EepromWord::GainStart, 1),
    ) as i16;
    let (resolution_ee, tgc) = resolution_with_tgc(eeprom);
    let emissivity_ee = f32::from(i16_from_i11(eeprom.get(EepromWord::Emissivity))) / 512f32;
    let ks_ta = f32::from(i16_from_i11(eeprom.get(EepromWord::KsTa))) / 15f32.exp2();
    let (ct, ks_to) = temperature_range_data(eeprom);
    let cp = CompensationPixel::new(eeprom);
    // The sensitivities are compensated by the TGC-scaled compensation pixel sensitivity, so
    // those have to be known first.
    let (alpha, alpha_scale) = pixel_alphas(eeprom, tgc, cp.alpha, broken_pixel);
    let offset = [
        pixel_offsets(eeprom, EepromWord::PixelOffsetSubpage0Start),
        pixel_offsets(eeprom, EepromWord::PixelOffsetSubpage1Start),
    ];
    let (kta, kta_scale) = pixel_constants(
        eeprom,
        EepromWord::KTaAverage,
        EepromWord::KTaScale,
        |word| sign_extend(word >> 5, 6),
    );
    let (kv, kv_scale) = pixel_constants(
        eeprom,
        EepromWord::KVAverage,
        EepromWord::KVScale,
        |word| sign_extend(word & 0x001F, 5),
    );
    tracing::debug!(alpha_scale, kta_scale, kv_scale, "extracted calibration");
    Ok(CalibrationParams {
        k_vdd,
        vdd_25,
        kv_ptat: ptat.kv_ptat,
        kt_ptat: ptat.kt_ptat,
        v_ptat_25: ptat.v_ptat_25,
        alpha_ptat: ptat.alpha_ptat,
        gain_ee,
        tgc,
        emissivity_ee,
        resolution_ee,
        ks_ta,
        cp_alpha: cp.alpha,
        cp_offset: cp.offset,
        cp_kv: cp.kv,
        cp_kta: cp.kta,
        ks_to,
        ct,
        alpha,
        alpha_scale,
        offset,
        kta,
        kta_scale,
        kv,
        kv_scale,
        broken_pixel,
    })
}

/// Find the pixel (if any) with all four calibration words zeroed.
fn find_broken_pixel(eeprom: &EepromImage) -> Result<Option<usize>, CalibrationError> {
    let banks = [
        EepromWord::PixelOffsetSubpage0Start,
        EepromWord::PixelSensitivityStart,
        EepromWord::PixelConstantsStart,
        EepromWord::PixelOffsetSubpage1Start,
    ];
    let mut broken_pixel = None;
    for pixel in 0..NUM_PIXELS {
        let is_broken = banks
            .iter()
            .all(|bank| eeprom.get_offset(*bank, pixel) == 0);
        if is_broken {
            if broken_pixel.is_some() {
                return Err(CalibrationError::TooManyBrokenPixels);
            }
            tracing::warn!(pixel, "pixel has no calibration data");
            broken_pixel = Some(pixel);
        }
    }
    Ok(broken_pixel)
}

/// Returns K<sub>V<sub>DD</sub></sub> and V<sub>DD<sub>25</sub></sub>, in that order.
fn supply_parameters(eeprom: &EepromImage) -> (i16, i16) {
    // Both are 11-bit values scaled up by 2^5, so they always fit in an i16.
    let k_vdd = i16_from_i11(eeprom.get(EepromWord::KVDd)) * 32;
    let vdd_25 = i16_from_i11(eeprom.get(EepromWord::VDd25)) * 32;
    (k_vdd, vdd_25)
}

/// The values used to calculate the ambient temperature.
struct PtatParameters {
    kv_ptat: f32,
    kt_ptat: f32,
    v_ptat_25: f32,
    alpha_ptat: f32,
}

impl PtatParameters {
    fn new(eeprom: &EepromImage) -> Self {
        // Scaled by 2^12
        let kv_ptat = f32::from(i16_from_i11(eeprom.get(EepromWord::KvPtat))) / 4096f32;
        // Scaled by 2^3
        let kt_ptat = f32::from(i16_from_i11(eeprom.get(EepromWord::KtPtat))) / 8f32;
        let v_ptat_25 = combine_words(
            eeprom.get(EepromWord::VPtat25Start),
            eeprom.get_offset(EepromWord::VPtat25Start, 1),
        );
        // Scaled by 2^7, and unsigned
        let alpha_ptat = f32::from(eeprom.get(EepromWord::AlphaPtat)) / 128f32;
        Self {
            kv_ptat,
            kt_ptat,
            v_ptat_25: v_ptat_25.into(),
            alpha_ptat,
        }
    }
}

/// Read the calibrated ADC resolution and thermal gradient coefficient.
///
/// The TGC is pre-scaled, and needs no further calculations applied.
fn resolution_with_tgc(eeprom: &EepromImage) -> (Resolution, f32) {
    let word = eeprom.get(EepromWord::ResolutionWithTgc);
    let resolution = Resolution::from_raw((word & 0x0600) >> 9);
    // Scaled by 2^6
    let tgc = f32::from(sign_extend(word & 0x01FF, 9)) / 64f32;
    (resolution, tgc)
}

/// Extract the corner temperatures and K<sub>s<sub>T<sub>o</sub></sub></sub> values.
fn temperature_range_data(
    eeprom: &EepromImage,
) -> (
    [i16; NUM_CORNER_TEMPERATURES],
    [f32; NUM_CORNER_TEMPERATURES],
) {
    let scale = f32::from(eeprom.get(EepromWord::KsToScale)).exp2();
    let mut ct = [0i16; NUM_CORNER_TEMPERATURES];
    ct[..FIXED_CORNER_TEMPERATURES.len()].copy_from_slice(&FIXED_CORNER_TEMPERATURES);
    // The first five K_s_To values are contiguous, the rest are interleaved with their corner
    // temperature.
    let k_s_to_words = [
        (EepromWord::KsTo0, 0),
        (EepromWord::KsTo0, 1),
        (EepromWord::KsTo0, 2),
        (EepromWord::KsTo0, 3),
        (EepromWord::KsTo0, 4),
        (EepromWord::KsTo5, 0),
        (EepromWord::KsTo6, 0),
        (EepromWord::KsTo7, 0),
    ];
    let mut ks_to = [0f32; NUM_CORNER_TEMPERATURES];
    for (dest, (word, offset)) in ks_to.iter_mut().zip(k_s_to_words) {
        *dest = f32::from(i16_from_i11(eeprom.get_offset(word, offset))) / scale;
    }
    let corner_words = [
        EepromWord::CornerTemperature5,
        EepromWord::CornerTemperature6,
        EepromWord::CornerTemperature7,
    ];
    for (dest, word) in ct[FIXED_CORNER_TEMPERATURES.len()..]
        .iter_mut()
        .zip(corner_words)
    {
        // Unsigned 11-bit values always fit in an i16.
        *dest = eeprom.get(word) as i16;
    }
    (ct, ks_to)
}

/// The compensation pixel calibration values.
struct CompensationPixel {
    alpha: f32,
    offset: i16,
    kta: f32,
    kv: f32,
}

impl CompensationPixel {
    fn new(eeprom: &EepromImage) -> Self {
        let alpha_scale = f32::from(eeprom.get(EepromWord::CompensationPixelAlphaScale)).exp2();
        let alpha =
            f32::from(i16_from_i11(eeprom.get(EepromWord::CompensationPixelAlpha))) / alpha_scale;
        let offset = combine_words(
            eeprom.get(EepromWord::CompensationPixelOffsetStart),
            eeprom.get_offset(EepromWord::CompensationPixelOffsetStart, 1),
        ) as i16;
        Self {
            alpha,
            offset,
            kta: scaled_cp_constant(eeprom.get(EepromWord::CompensationPixelKTa)),
            kv: scaled_cp_constant(eeprom.get(EepromWord::CompensationPixelKV)),
        }
    }
}

/// Calculate K<sub>V<sub>CP</sub></sub> or K<sub>T<sub>a<sub>CP</sub></sub></sub>.
///
/// These two values are stored in one word each, with the upper five bits being the scale, and
/// the lower six bits the signed, unscaled value.
fn scaled_cp_constant(word: u16) -> f32 {
    let scale = f32::from((word & 0x07C0) >> 6).exp2();
    f32::from(sign_extend(word & 0x003F, 6)) / scale
}

/// Find the smallest power-of-two exponent that brings the largest finite magnitude in `values`
/// up to at least `lower_bound`.
///
/// When nothing needs scaling (everything is already large enough, or zero), the exponent is 0.
fn shared_scale(values: &[f32], lower_bound: f32) -> u8 {
    let mut largest = values
        .iter()
        .filter(|value| value.is_finite())
        .fold(0f32, |largest, value| largest.max(value.abs()));
    let mut scale = 0u8;
    if largest == 0f32 {
        return scale;
    }
    while largest < lower_bound {
        largest *= 2f32;
        scale += 1;
    }
    scale
}

/// Calculate the sensitivity of every pixel, returning them with their shared scale.
fn pixel_alphas(
    eeprom: &EepromImage,
    tgc: f32,
    cp_alpha: f32,
    broken_pixel: Option<usize>,
) -> ([u16; NUM_PIXELS], u8) {
    // Each pair of groups shares a word for their scales.
    let group_scales: ArrayVec<u8, NUM_ALPHA_GROUPS> = (0..(NUM_ALPHA_GROUPS / 2))
        .map(|offset| split_6_5(eeprom.get_offset(EepromWord::AlphaScaleStart, offset)))
        .flat_map(|(upper, lower)| [upper, lower])
        .map(|scale| scale + ALPHA_GROUP_SCALE_OFFSET)
        .collect();
    let group_maximums: ArrayVec<f32, NUM_ALPHA_GROUPS> = group_scales
        .iter()
        .enumerate()
        .map(|(group, scale)| {
            let maximum = f32::from(eeprom.get_offset(EepromWord::AlphaMaxStart, group));
            maximum / f32::from(*scale).exp2() / 2047f32
        })
        .collect();
    let compensation = tgc * cp_alpha;
    let mut unscaled = [0f32; NUM_PIXELS];
    for (pixel, value) in unscaled.iter_mut().enumerate() {
        let raw = f32::from(eeprom.get_offset(EepromWord::PixelSensitivityStart, pixel));
        let normalized = raw * group_maximums[pixel / PIXELS_PER_ALPHA_GROUP] - compensation;
        *value = SCALE_ALPHA / normalized;
    }
    // The broken pixel's sensitivity is meaningless (and usually infinite), so keep it from
    // affecting the scale for everyone else.
    let scale = match broken_pixel {
        Some(broken) => {
            let mut candidates = unscaled;
            candidates[broken] = 0f32;
            shared_scale(&candidates, ALPHA_LOWER_BOUND)
        }
        None => shared_scale(&unscaled, ALPHA_LOWER_BOUND),
    };
    let factor = f32::from(scale).exp2();
    let mut alpha = [0u16; NUM_PIXELS];
    for (dest, value) in alpha.iter_mut().zip(unscaled.iter()) {
        // Float to int casts saturate, so an out-of-range value becomes 0 or u16::MAX.
        *dest = (value * factor).round() as u16;
    }
    (alpha, scale)
}

/// Calculate the offsets for every pixel from one of the two offset banks.
fn pixel_offsets(eeprom: &EepromImage, bank: EepromWord) -> [i16; NUM_PIXELS] {
    let scale = 1i32.wrapping_shl(u32::from(eeprom.get(EepromWord::OffsetScale) >> 5));
    let reference = combine_words(
        eeprom.get(EepromWord::OffsetAverageStart),
        eeprom.get_offset(EepromWord::OffsetAverageStart, 1),
    ) as i16;
    let mut offsets = [0i16; NUM_PIXELS];
    for (pixel, offset) in offsets.iter_mut().enumerate() {
        let raw = i32::from(i16_from_i11(eeprom.get_offset(bank, pixel)));
        // The result is stored as a 16-bit value on the sensor, so truncate the same way.
        *offset = raw
            .wrapping_mul(scale)
            .wrapping_add(i32::from(reference)) as i16;
    }
    offsets
}

/// Decode a per-pixel drift coefficient (K<sub>Ta</sub> or K<sub>V</sub>) for every pixel, then
/// rescale them all to share one power-of-two exponent.
///
/// `raw_value` pulls the signed, unscaled value for a single pixel out of that pixel's constants
/// word.
fn pixel_constants<F>(
    eeprom: &EepromImage,
    average: EepromWord,
    scales: EepromWord,
    raw_value: F,
) -> ([i8; NUM_PIXELS], u8)
where
    F: Fn(u16) -> i16,
{
    let average = f32::from(i16_from_i11(eeprom.get(average)));
    let (scale_1, scale_2) = split_6_5(eeprom.get(scales));
    let scale_1 = f32::from(scale_1).exp2();
    let scale_2 = f32::from(scale_2).exp2();
    let mut unscaled = [0f32; NUM_PIXELS];
    for (pixel, value) in unscaled.iter_mut().enumerate() {
        let raw = raw_value(eeprom.get_offset(EepromWord::PixelConstantsStart, pixel));
        *value = (f32::from(raw) * scale_2 + average) / scale_1;
    }
    let scale = shared_scale(&unscaled, PIXEL_CONSTANT_LOWER_BOUND);
    let factor = f32::from(scale).exp2();
    let mut constants = [0i8; NUM_PIXELS];
    for (dest, value) in constants.iter_mut().zip(unscaled.iter()) {
        // round() is half away from zero, matching the sensor's reference rounding.
        *dest = (value * factor).round() as i8;
    }
    (constants, scale)
}
