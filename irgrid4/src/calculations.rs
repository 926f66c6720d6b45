// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross

//! Raw frame to temperature conversion
//!
//! Everything in here is a pure function of a [`Frame`] and the sensor's [`CalibrationParams`].
//! [`compute`] is the usual entry point; the other functions expose the intermediate steps for
//! applications that only need part of the pipeline.

// Various floating point operations are not implemented in core, so we use libm to provide them as
// needed.
#[cfg_attr(feature = "std", allow(unused_imports))]
use num_traits::Float;

use crate::calibration::{CalibrationParams, NUM_CORNER_TEMPERATURES, SCALE_ALPHA};
use crate::frame::Frame;
use crate::{NUM_PIXELS, WIDTH};

/// Constant needed a few times for the final pixel temperature calculations.
const KELVINS_TO_CELSIUS: f32 = 273.15;

/// The reference ambient temperature the drift coefficients are relative to.
const T_A0: f32 = 25f32;

/// The reference supply voltage the drift coefficients are relative to.
const V_DD0: f32 = 3.3;

/// The temperature range the sensitivities are calibrated for.
const BASIC_TEMPERATURE_RANGE: usize = 2;

/// The sensor warms itself up, so when no reflected temperature is given the surroundings are
/// assumed to be this much cooler than T<sub>a</sub>.
pub const TA_SHIFT: f32 = 5f32;

/// Runtime settings for [`compute`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TemperatureSettings {
    /// The emissivity of the objects being measured. `None` uses the emissivity stored in the
    /// EEPROM.
    pub emissivity: Option<f32>,

    /// The reflected (room) temperature in ℃. `None` uses the ambient temperature less
    /// [`TA_SHIFT`].
    pub reflected_temperature: Option<f32>,

    /// Replace the broken pixel (if the sensor has one) with a value interpolated from its
    /// neighbors.
    pub correct_broken_pixel: bool,
}

impl Default for TemperatureSettings {
    fn default() -> Self {
        Self {
            emissivity: None,
            reflected_temperature: None,
            correct_broken_pixel: true,
        }
    }
}

/// The temperatures for a single frame.
#[derive(Clone, Debug, PartialEq)]
pub struct TemperatureResult {
    /// The temperature of the sensor itself, in ℃.
    pub ambient: f32,

    /// Object temperatures in ℃, in row-major order.
    pub image: [f32; NUM_PIXELS],
}

impl TemperatureResult {
    /// The indices of any pixels that did not come out as a finite temperature.
    pub fn invalid_pixels(&self) -> impl Iterator<Item = usize> + '_ {
        self.image
            .iter()
            .enumerate()
            .filter(|(_, temperature)| !temperature.is_finite())
            .map(|(index, _)| index)
    }
}

/// Calculate the supply voltage of the sensor.
pub fn v_dd(frame: &Frame, calibration: &CalibrationParams) -> f32 {
    let resolution_correction = calibration
        .resolution_ee
        .correction_from(frame.resolution());
    let v_dd_pixel = f32::from(frame.v_dd_pixel()) * resolution_correction;
    (v_dd_pixel - f32::from(calibration.vdd_25)) / f32::from(calibration.k_vdd) + V_DD0
}

fn v_ptat_art(calibration: &CalibrationParams, t_a_ptat: i16, t_a_v_be: i16) -> f32 {
    let t_a_ptat = f32::from(t_a_ptat);
    t_a_ptat / (t_a_ptat * calibration.alpha_ptat + f32::from(t_a_v_be)) * 18f32.exp2()
}

fn ambient_from_v_dd(frame: &Frame, calibration: &CalibrationParams, v_dd: f32) -> f32 {
    // Labelled V_PTAT in the formulas, but T_a_PTAT in the memory map.
    let v_ptat_art = v_ptat_art(calibration, frame.t_a_ptat(), frame.t_a_v_be());
    let numerator =
        v_ptat_art / (1f32 + calibration.kv_ptat * (v_dd - V_DD0)) - calibration.v_ptat_25;
    numerator / calibration.kt_ptat + T_A0
}

/// Calculate the ambient temperature (the temperature of the sensor itself) in ℃.
pub fn ambient_temperature(frame: &Frame, calibration: &CalibrationParams) -> f32 {
    let v_dd = v_dd(frame, calibration);
    ambient_from_v_dd(frame, calibration, v_dd)
}

fn t_ar(t_a: f32, t_r: f32, emissivity: f32) -> f32 {
    let t_a_k4 = (t_a + KELVINS_TO_CELSIUS).powi(4);
    let t_r_k4 = (t_r + KELVINS_TO_CELSIUS).powi(4);
    t_r_k4 - ((t_r_k4 - t_a_k4) / emissivity)
}

/// Calculate the sensitivity correction for each temperature range.
///
/// The basic range doesn't need correcting, so it's 1, with the others built up from there.
pub(crate) fn alpha_correction_coefficients(
    corner_temperatures: &[i16; NUM_CORNER_TEMPERATURES],
    k_s_to: &[f32; NUM_CORNER_TEMPERATURES],
) -> [f32; NUM_CORNER_TEMPERATURES] {
    let mut coefficients = [1f32; NUM_CORNER_TEMPERATURES];
    for (n, coefficient) in coefficients.iter_mut().enumerate() {
        *coefficient = alpha_corr_n(n, corner_temperatures, k_s_to);
    }
    coefficients
}

/// The actual calculations for [alpha_correction_coefficients] as a recursive function.
fn alpha_corr_n(n: usize, ct: &[i16], k_s_to: &[f32]) -> f32 {
    match n.cmp(&BASIC_TEMPERATURE_RANGE) {
        core::cmp::Ordering::Equal => 1f32,
        core::cmp::Ordering::Less => {
            (1f32 + k_s_to[n] * f32::from(ct[n + 1] - ct[n])).recip()
                * alpha_corr_n(n + 1, ct, k_s_to)
        }
        core::cmp::Ordering::Greater => {
            (1f32 + k_s_to[n - 1] * f32::from(ct[n] - ct[n - 1]))
                * alpha_corr_n(n - 1, ct, k_s_to)
        }
    }
}

/// Values that're common to all pixels when calculating raw IR values.
#[derive(Debug, PartialEq)]
struct CommonIrData {
    gain: f32,
    v_dd: f32,
    t_a: f32,
    emissivity: f32,
    /// The compensation pixel's offset-corrected signal, pre-multiplied by the TGC.
    compensation_pixel: f32,
    /// 1 + K<sub>s<sub>T<sub>a</sub></sub></sub> * (T<sub>a</sub> - T<sub>a<sub>0</sub></sub>)
    alpha_coefficient: f32,
}

impl CommonIrData {
    fn new(frame: &Frame, calibration: &CalibrationParams, emissivity: f32) -> Self {
        let v_dd = v_dd(frame, calibration);
        let t_a = ambient_from_v_dd(frame, calibration, v_dd);
        let gain = f32::from(calibration.gain_ee) / f32::from(frame.gain());
        let mut common = Self {
            gain,
            v_dd,
            t_a,
            emissivity,
            compensation_pixel: 0f32,
            alpha_coefficient: 1f32 + calibration.ks_ta * (t_a - T_A0),
        };
        // TODO: The datasheet suggests a moving average (length >= 16) on the compensation
        // pixel, which would need state carried between frames.
        let compensation_pixel = per_pixel_v_ir(
            frame.compensation_pixel(),
            &common,
            calibration.cp_offset,
            calibration.cp_kv,
            calibration.cp_kta,
        );
        common.compensation_pixel = calibration.tgc * compensation_pixel;
        tracing::debug!(
            subpage = ?frame.subpage(),
            t_a,
            v_dd,
            "calculated frame conditions"
        );
        common
    }
}

/// Apply gain and offset compensation to a raw sample.
fn per_pixel_v_ir(
    pixel_data: i16,
    common: &CommonIrData,
    reference_offset: i16,
    k_v: f32,
    k_ta: f32,
) -> f32 {
    let pixel_gain = f32::from(pixel_data) * common.gain;
    pixel_gain
        - f32::from(reference_offset)
            * (1f32 + k_ta * (common.t_a - T_A0))
            * (1f32 + k_v * (common.v_dd - V_DD0))
}

/// Run every pixel through the IR signal compensation steps, calling `per_pixel` with the pixel's
/// index, compensated IR signal and compensated sensitivity.
fn for_each_compensated_pixel<F>(
    frame: &Frame,
    calibration: &CalibrationParams,
    common: &CommonIrData,
    mut per_pixel: F,
) where
    F: FnMut(usize, f32, f32),
{
    let offsets = calibration.offset(frame.subpage());
    let k_ta_scale = f32::from(calibration.kta_scale).exp2();
    let k_v_scale = f32::from(calibration.kv_scale).exp2();
    let alpha_scale = SCALE_ALPHA * f32::from(calibration.alpha_scale).exp2();
    frame
        .pixels()
        .zip(offsets.iter())
        .zip(calibration.kta.iter())
        .zip(calibration.kv.iter())
        .zip(calibration.alpha.iter())
        .enumerate()
        // feeling a little lispy in here with all these parentheses
        .for_each(
            |(index, ((((pixel_data, reference_offset), k_ta), k_v), alpha))| {
                let k_ta = f32::from(*k_ta) / k_ta_scale;
                let k_v = f32::from(*k_v) / k_v_scale;
                let v_ir = per_pixel_v_ir(pixel_data, common, *reference_offset, k_v, k_ta);
                let v_ir = (v_ir - common.compensation_pixel) / common.emissivity;
                let alpha = alpha_scale / f32::from(*alpha) * common.alpha_coefficient;
                per_pixel(index, v_ir, alpha);
            },
        );
}

/// The per-pixel calculations to go from a compensated IR signal to a temperature.
fn per_pixel_temperature(
    v_ir: f32,
    alpha: f32,
    t_ar: f32,
    calibration: &CalibrationParams,
    alpha_correction: &[f32; NUM_CORNER_TEMPERATURES],
) -> f32 {
    // This function is a mess of raising floats to the third and fourth powers, doing some
    // operations, then taking the fourth root of everything.
    let k_s_to = &calibration.ks_to;
    let k_s_to_basic = k_s_to[BASIC_TEMPERATURE_RANGE];
    let s_x = k_s_to_basic * (alpha.powi(3) * (v_ir + alpha * t_ar)).powf(0.25);
    let t_o = (v_ir / (alpha * (1f32 - k_s_to_basic * KELVINS_TO_CELSIUS) + s_x) + t_ar)
        .powf(0.25)
        - KELVINS_TO_CELSIUS;
    // That's a first approximation, now refine it with the coefficients for the range it falls in.
    let ct = &calibration.ct;
    let range = (1..NUM_CORNER_TEMPERATURES)
        .find(|range| t_o < f32::from(ct[*range]))
        .map_or(NUM_CORNER_TEMPERATURES - 1, |range| range - 1);
    let range_alpha =
        alpha * alpha_correction[range] * (1f32 + k_s_to[range] * (t_o - f32::from(ct[range])));
    (v_ir / range_alpha + t_ar).powf(0.25) - KELVINS_TO_CELSIUS
}

fn fill_temperatures(
    frame: &Frame,
    calibration: &CalibrationParams,
    common: &CommonIrData,
    t_r: f32,
    destination: &mut [f32; NUM_PIXELS],
) {
    let t_ar = t_ar(common.t_a, t_r, common.emissivity);
    let alpha_correction = alpha_correction_coefficients(&calibration.ct, &calibration.ks_to);
    for_each_compensated_pixel(frame, calibration, common, |index, v_ir, alpha| {
        destination[index] =
            per_pixel_temperature(v_ir, alpha, t_ar, calibration, &alpha_correction);
    });
}

/// Calculate the object temperature of every pixel, returning the ambient temperature.
///
/// `t_r` is the reflected temperature, in ℃. The broken pixel (if any) is left as calculated;
/// see [`compute`] for a version that interpolates it.
pub fn calculate_to(
    frame: &Frame,
    calibration: &CalibrationParams,
    emissivity: f32,
    t_r: f32,
    destination: &mut [f32; NUM_PIXELS],
) -> f32 {
    let common = CommonIrData::new(frame, calibration, emissivity);
    fill_temperatures(frame, calibration, &common, t_r, destination);
    common.t_a
}

/// Generate a "raw" thermal image, returning the ambient temperature.
///
/// The values are the IR signal normalized by each pixel's sensitivity, but without the
/// conversion to temperatures. This is useful for applications where just an "image" is needed
/// but the actual temperatures are not.
pub fn ir_image(
    frame: &Frame,
    calibration: &CalibrationParams,
    emissivity: f32,
    destination: &mut [f32; NUM_PIXELS],
) -> f32 {
    let common = CommonIrData::new(frame, calibration, emissivity);
    for_each_compensated_pixel(frame, calibration, &common, |index, v_ir, alpha| {
        destination[index] = v_ir / alpha;
    });
    common.t_a
}

/// Replace a pixel with a value derived from its neighbors in the same row.
///
/// Pixels on the edges copy or average their neighbors, while other pixels extrapolate from
/// whichever side has the smaller gradient.
///
/// # Panics
/// If `pixel` is not less than [`NUM_PIXELS`].
pub fn interpolate_pixel(image: &mut [f32; NUM_PIXELS], pixel: usize) {
    let column = pixel % WIDTH;
    image[pixel] = match column {
        0 => image[pixel + 1],
        1 | 14 => (image[pixel - 1] + image[pixel + 1]) / 2f32,
        15 => image[pixel - 1],
        _ => {
            let right_gradient = image[pixel + 1] - image[pixel + 2];
            let left_gradient = image[pixel - 1] - image[pixel - 2];
            if right_gradient.abs() > left_gradient.abs() {
                image[pixel - 1] + left_gradient
            } else {
                image[pixel + 1] + right_gradient
            }
        }
    };
}

/// Calculate the ambient and object temperatures for a validated frame.
pub fn compute(
    frame: &Frame,
    calibration: &CalibrationParams,
    settings: &TemperatureSettings,
) -> TemperatureResult {
    let emissivity = settings.emissivity.unwrap_or(calibration.emissivity_ee);
    let common = CommonIrData::new(frame, calibration, emissivity);
    let t_r = settings
        .reflected_temperature
        .unwrap_or(common.t_a - TA_SHIFT);
    let mut result = TemperatureResult {
        ambient: common.t_a,
        image: [0f32; NUM_PIXELS],
    };
    fill_temperatures(frame, calibration, &common, t_r, &mut result.image);
    if settings.correct_broken_pixel {
        if let Some(broken_pixel) = calibration.broken_pixel {
            interpolate_pixel(&mut result.image, broken_pixel);
        }
    }
    let invalid_count = result.invalid_pixels().count();
    if invalid_count > 0 {
        tracing::warn!(invalid_count, "some pixels have non-finite temperatures");
    }
    result
}

#[cfg(test)]
mod test {
    use float_cmp::approx_eq;
    use irgrid4_test_data::{
        datasheet_eeprom_words, example_frame, COMPENSATION_PIXEL_INDEX, CONTROL_REGISTER_INDEX,
        DEFAULT_CONTROL_REGISTER, FRAME_LENGTH, GAIN_INDEX, T_A_PTAT_INDEX, T_A_V_BE_INDEX,
        V_DD_PIXEL_INDEX,
    };

    use crate::calibration::{extract, CalibrationParams};
    use crate::eeprom::EepromImage;
    use crate::frame::Frame;
    use crate::register::Resolution;
    use crate::NUM_PIXELS;

    use super::{
        alpha_correction_coefficients, calculate_to, compute, interpolate_pixel, ir_image,
        TemperatureResult, TemperatureSettings, TA_SHIFT,
    };

    /// The pixel used in the worked example (row 6, column 9, 1-indexed).
    const TEST_PIXEL_INDEX: usize = 5 * 16 + 8;

    fn datasheet_calibration() -> CalibrationParams {
        let eeprom = EepromImage::load(datasheet_eeprom_words()).unwrap();
        extract(&eeprom).unwrap()
    }

    /// Calibration with every correction disabled, and a uniform sensitivity of 10<sup>-9</sup>.
    fn uniform_calibration() -> CalibrationParams {
        CalibrationParams {
            k_vdd: -3200,
            vdd_25: -12800,
            kv_ptat: 0f32,
            kt_ptat: 1f32,
            v_ptat_25: 32768f32,
            alpha_ptat: 8f32,
            gain_ee: 1000,
            tgc: 0f32,
            emissivity_ee: 1f32,
            resolution_ee: Resolution::Eighteen,
            ks_ta: 0f32,
            cp_alpha: 0f32,
            cp_offset: 0,
            cp_kv: 0f32,
            cp_kta: 0f32,
            ks_to: [0f32; 8],
            ct: [-40, -20, 0, 80, 120, 200, 400, 600],
            alpha: [1000; NUM_PIXELS],
            alpha_scale: 0,
            offset: [[0; NUM_PIXELS]; 2],
            kta: [0; NUM_PIXELS],
            kta_scale: 0,
            kv: [0; NUM_PIXELS],
            kv_scale: 0,
            broken_pixel: None,
        }
    }

    /// A frame that comes out to T<sub>a</sub> = 25℃ and V<sub>DD</sub> = 3.3V with
    /// [`uniform_calibration`], with every pixel set to zero.
    fn uniform_frame() -> [u16; FRAME_LENGTH] {
        let mut frame = [0u16; FRAME_LENGTH];
        frame[T_A_V_BE_INDEX] = 0;
        frame[T_A_PTAT_INDEX] = 1024;
        frame[V_DD_PIXEL_INDEX] = (-12800i16) as u16;
        frame[GAIN_INDEX] = 1000;
        frame[COMPENSATION_PIXEL_INDEX] = 0;
        frame[CONTROL_REGISTER_INDEX] = DEFAULT_CONTROL_REGISTER;
        frame
    }

    #[test]
    fn v_dd() {
        let frame = Frame::new(uniform_frame());
        assert!(approx_eq!(
            f32,
            super::v_dd(&frame, &uniform_calibration()),
            3.3
        ));
        let frame = Frame::new(example_frame(0));
        assert!(approx_eq!(
            f32,
            super::v_dd(&frame, &datasheet_calibration()),
            3.3,
            epsilon = 0.000001
        ));
    }

    #[test]
    fn v_dd_resolution_correction() {
        let mut raw = uniform_frame();
        // 16-bit samples are a quarter of the 18-bit ones
        raw[CONTROL_REGISTER_INDEX] = 0x0101;
        raw[V_DD_PIXEL_INDEX] = (-3200i16) as u16;
        let frame = Frame::new(raw);
        assert!(approx_eq!(
            f32,
            super::v_dd(&frame, &uniform_calibration()),
            3.3
        ));
    }

    #[test]
    fn t_a() {
        let frame = Frame::new(uniform_frame());
        assert!(approx_eq!(
            f32,
            super::ambient_temperature(&frame, &uniform_calibration()),
            25f32
        ));
        let frame = Frame::new(example_frame(0));
        assert!(approx_eq!(
            f32,
            super::ambient_temperature(&frame, &datasheet_calibration()),
            30.0412,
            epsilon = 0.001
        ));
    }

    #[test]
    fn alpha_correction() {
        let params = datasheet_calibration();
        let k_s_to = params.ks_to();
        let ct = params.ct();
        let coefficients = alpha_correction_coefficients(ct, k_s_to);
        let mut expected = [1f32; 8];
        expected[1] = 1f32 / (1f32 + k_s_to[1] * 20f32);
        expected[0] = expected[1] / (1f32 + k_s_to[0] * 20f32);
        for range in 3..8 {
            let span = f32::from(ct[range] - ct[range - 1]);
            expected[range] = expected[range - 1] * (1f32 + k_s_to[range - 1] * span);
        }
        for (calculated, expected) in coefficients.iter().zip(expected.iter()) {
            assert!(approx_eq!(f32, *calculated, *expected, epsilon = 0.000001));
        }
        assert_eq!(coefficients[2], 1f32);
    }

    #[test]
    fn golden_pixel() {
        let mut raw = uniform_frame();
        raw[0] = 500;
        let frame = Frame::new(raw);
        let mut image = [0f32; NUM_PIXELS];
        let t_a = calculate_to(&frame, &uniform_calibration(), 1f32, 25f32, &mut image);
        assert!(approx_eq!(f32, t_a, 25f32));
        // (500 / 10^-9 + 298.15^4)^(1/4) - 273.15, evaluated in f32
        assert!(approx_eq!(f32, image[0], 571.0493, epsilon = 0.0001));
        // Everything else has no signal
        assert!(approx_eq!(f32, image[1], 25f32, epsilon = 0.001));
    }

    #[test]
    fn zero_signal() {
        let frame = Frame::new(uniform_frame());
        let settings = TemperatureSettings {
            reflected_temperature: Some(25f32),
            ..TemperatureSettings::default()
        };
        let result = compute(&frame, &uniform_calibration(), &settings);
        for temperature in result.image.iter() {
            assert!(approx_eq!(f32, *temperature, 25f32, epsilon = 0.001));
        }
        assert_eq!(result.invalid_pixels().count(), 0);
    }

    #[test]
    fn default_reflected_temperature() {
        let frame = Frame::new(uniform_frame());
        let mut calibration = uniform_calibration();
        calibration.emissivity_ee = 0.5;
        let result = compute(&frame, &calibration, &TemperatureSettings::default());
        // With no signal, T_o is just the (emissivity weighted) reflected temperature.
        let t_a_k4 = (25f64 + 273.15).powi(4);
        let t_r_k4 = (25f64 - f64::from(TA_SHIFT) + 273.15).powi(4);
        let expected = (t_r_k4 - (t_r_k4 - t_a_k4) / 0.5).powf(0.25) - 273.15;
        assert!(approx_eq!(
            f32,
            result.image[0],
            expected as f32,
            epsilon = 0.001
        ));
    }

    #[test]
    fn datasheet_frame() {
        let params = datasheet_calibration();
        let frame = Frame::new(example_frame(0));
        let result = compute(&frame, &params, &TemperatureSettings::default());
        assert!(approx_eq!(f32, result.ambient, 30.0412, epsilon = 0.001));
        assert!(approx_eq!(f32, result.image[0], 68.67, epsilon = 0.1));
        assert!(approx_eq!(
            f32,
            result.image[TEST_PIXEL_INDEX],
            62.19,
            epsilon = 0.1
        ));
        assert!(approx_eq!(f32, result.image[191], 67.73, epsilon = 0.1));
        // The other subpage uses the other set of offsets.
        let frame = Frame::new(example_frame(1));
        let result = compute(&frame, &params, &TemperatureSettings::default());
        assert!(approx_eq!(
            f32,
            result.image[TEST_PIXEL_INDEX],
            62.23,
            epsilon = 0.1
        ));
    }

    #[test]
    fn emissivity_override() {
        let mut raw = uniform_frame();
        raw[0] = 500;
        let frame = Frame::new(raw);
        let calibration = uniform_calibration();
        let settings = TemperatureSettings {
            emissivity: Some(0.5),
            reflected_temperature: Some(20f32),
            ..TemperatureSettings::default()
        };
        let result = compute(&frame, &calibration, &settings);
        let t_a_k4 = (25f64 + 273.15).powi(4);
        let t_r_k4 = (20f64 + 273.15).powi(4);
        let t_ar = t_r_k4 - (t_r_k4 - t_a_k4) / 0.5;
        // The signal is scaled up by 1 / emissivity as well.
        let expected = (500f64 / 0.5 / 1E-9 + t_ar).powf(0.25) - 273.15;
        assert!(approx_eq!(
            f32,
            result.image[0],
            expected as f32,
            epsilon = 0.01
        ));
        let mut image = [0f32; NUM_PIXELS];
        calculate_to(&frame, &calibration, 0.5, 20f32, &mut image);
        assert_eq!(image, result.image);
        // Without the override, the EEPROM emissivity (1.0) is used.
        let eeprom_emissivity = compute(
            &frame,
            &calibration,
            &TemperatureSettings {
                emissivity: None,
                ..settings
            },
        );
        assert!(result.image[0] - eeprom_emissivity.image[0] > 1f32);
    }

    #[test]
    fn temperature_ranges() {
        const K_S_TO: [f64; 8] = [
            -0.0020, -0.0016, -0.0012, -0.0010, -0.0008, -0.0006, -0.0004, -0.0002,
        ];
        // Pixel signal and raw sensitivity (with a scale of 2^10), picked so the first
        // approximation lands near -30, -10, 40, 100, 160, 300, 500 and 700℃, one per range.
        const PIXELS: [(i16, u16); 8] = [
            (-20000, 235),
            (-10000, 322),
            (3000, 558),
            (8000, 1305),
            (12000, 1925),
            (20000, 3558),
            (25000, 7610),
            (30000, 12060),
        ];
        let mut calibration = uniform_calibration();
        for (dest, k_s_to) in calibration.ks_to.iter_mut().zip(K_S_TO) {
            *dest = k_s_to as f32;
        }
        calibration.alpha_scale = 10;
        let mut raw = uniform_frame();
        for (pixel, (signal, alpha)) in PIXELS.iter().enumerate() {
            raw[pixel] = *signal as u16;
            calibration.alpha[pixel] = *alpha;
        }
        let frame = Frame::new(raw);
        let mut image = [0f32; NUM_PIXELS];
        calculate_to(&frame, &calibration, 1f32, 25f32, &mut image);

        let ct: [f64; 8] = [-40.0, -20.0, 0.0, 80.0, 120.0, 200.0, 400.0, 600.0];
        let mut correction = [1f64; 8];
        correction[1] = 1.0 / (1.0 + K_S_TO[1] * (ct[2] - ct[1]));
        correction[0] = correction[1] / (1.0 + K_S_TO[0] * (ct[1] - ct[0]));
        for range in 3..8 {
            correction[range] =
                correction[range - 1] * (1.0 + K_S_TO[range - 1] * (ct[range] - ct[range - 1]));
        }
        let t_ar = (25f64 + 273.15).powi(4);
        for (pixel, (signal, alpha)) in PIXELS.iter().enumerate() {
            let v_ir = f64::from(*signal);
            let alpha = 1E-6 * 1024.0 / f64::from(*alpha);
            let s_x = K_S_TO[2] * (alpha.powi(3) * (v_ir + alpha * t_ar)).powf(0.25);
            let t_o =
                (v_ir / (alpha * (1.0 - K_S_TO[2] * 273.15) + s_x) + t_ar).powf(0.25) - 273.15;
            let range = if t_o < ct[1] {
                0
            } else if t_o >= ct[7] {
                7
            } else {
                (1..7).find(|range| t_o < ct[range + 1]).unwrap()
            };
            assert_eq!(range, pixel, "pixel {} landed in range {}", pixel, range);
            let range_alpha = alpha * correction[range] * (1.0 + K_S_TO[range] * (t_o - ct[range]));
            let expected = (v_ir / range_alpha + t_ar).powf(0.25) - 273.15;
            assert!(
                approx_eq!(f32, image[pixel], expected as f32, epsilon = 0.01),
                "pixel {}: {} != {}",
                pixel,
                image[pixel],
                expected
            );
        }
    }

    #[test]
    fn compute_matches_calculate_to() {
        let params = datasheet_calibration();
        let frame = Frame::new(example_frame(0));
        let result = compute(&frame, &params, &TemperatureSettings::default());
        let mut image = [0f32; NUM_PIXELS];
        let t_a = calculate_to(
            &frame,
            &params,
            params.emissivity_ee(),
            result.ambient - TA_SHIFT,
            &mut image,
        );
        assert_eq!(t_a, result.ambient);
        assert_eq!(image, result.image);
    }

    #[test]
    fn ir_image_uniform() {
        let mut raw = uniform_frame();
        raw[5] = 500;
        let frame = Frame::new(raw);
        let mut image = [0f32; NUM_PIXELS];
        ir_image(&frame, &uniform_calibration(), 1f32, &mut image);
        assert!(approx_eq!(f32, image[5], 500f32 / 1E-9, epsilon = 1E6));
        assert_eq!(image[6], 0f32);
    }

    #[test]
    fn broken_pixel_interpolated() {
        let mut calibration = uniform_calibration();
        calibration.broken_pixel = Some(20);
        // The broken pixel has no sensitivity, so it comes out as garbage.
        calibration.alpha[20] = 0;
        let frame = Frame::new(uniform_frame());
        let settings = TemperatureSettings {
            reflected_temperature: Some(25f32),
            ..TemperatureSettings::default()
        };
        let result = compute(&frame, &calibration, &settings);
        assert!(approx_eq!(f32, result.image[20], 25f32, epsilon = 0.001));
        let uncorrected = compute(
            &frame,
            &calibration,
            &TemperatureSettings {
                correct_broken_pixel: false,
                ..settings
            },
        );
        assert!(!approx_eq!(
            f32,
            uncorrected.image[20],
            25f32,
            epsilon = 0.001
        ));
    }

    #[test]
    fn interpolation() {
        // Every row is a linear gradient, so interior pixels are reconstructed exactly
        let mut image = [0f32; NUM_PIXELS];
        for (index, value) in image.iter_mut().enumerate() {
            *value = (index % 16) as f32;
        }
        let original = image;
        for pixel in [18, 40, 77, 189] {
            image[pixel] = 1000f32;
            interpolate_pixel(&mut image, pixel);
            assert!(approx_eq!(f32, image[pixel], original[pixel]));
        }
        // Edges copy their neighbor
        interpolate_pixel(&mut image, 32);
        assert_eq!(image[32], 1f32);
        interpolate_pixel(&mut image, 47);
        assert_eq!(image[47], 14f32);
        // Next to the edges averages
        image[49] = 1000f32;
        interpolate_pixel(&mut image, 49);
        assert_eq!(image[49], 1f32);
        image[62] = 1000f32;
        interpolate_pixel(&mut image, 62);
        assert_eq!(image[62], 14f32);
    }

    #[test]
    fn invalid_pixels() {
        let mut result = TemperatureResult {
            ambient: 25f32,
            image: [25f32; NUM_PIXELS],
        };
        result.image[3] = f32::NAN;
        result.image[150] = f32::INFINITY;
        assert!(result.invalid_pixels().eq([3, 150]));
    }
}
