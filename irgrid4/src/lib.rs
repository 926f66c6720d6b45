// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross

//! Calibration decoding and temperature calculations for the IR Grid 4, a 16×12 thermopile
//! array.
//!
//! The sensor stores a large amount of factory calibration data in an error-corrected EEPROM. That
//! data must be decoded and pre-processed once, and the raw output of every frame then goes
//! through a fairly involved process to turn it into temperatures. This crate handles both, and is
//! `no_std` compatible (with a fairly large stack requirement, as everything is kept in fixed-size
//! arrays).
//!
//! # Overview
//! ```no_run
//! use irgrid4::bus::{read_frame_if_ready, FromI2C};
//! use irgrid4::calculations::{compute, TemperatureSettings};
//! use irgrid4::CalibrationParams;
//! use linux_embedded_hal::I2cdev;
//!
//! let mut i2c_bus = I2cdev::new("/dev/i2c-1").expect("/dev/i2c-1 needs to be an I2C controller");
//! // The default address for these sensors is 0x33
//! let calibration = CalibrationParams::from_i2c(&mut i2c_bus, 0x33)?;
//! if let Some(frame) = read_frame_if_ready(&mut i2c_bus, 0x33)? {
//!     let result = compute(&frame, &calibration, &TemperatureSettings::default());
//!     println!("Ambient: {}℃, first pixel: {}℃", result.ambient, result.image[0]);
//! }
//! # Ok::<(), irgrid4::Error<I2cdev>>(())
//! ```
//! The pipeline is split across a few modules, each usable on its own:
//!
//! * [`hamming`] decodes (and encodes) single EEPROM words.
//! * [`eeprom`] decodes a full EEPROM dump into an [`EepromImage`].
//! * [`calibration`] extracts the [`CalibrationParams`] from an `EepromImage`.
//! * [`frame`] validates the raw data for a single measurement.
//! * [`calculations`] turns a [`Frame`] into temperatures.
//! * [`bus`] reads the EEPROM and frames over I²C with [`embedded-hal`][embedded-hal].
//!
//! [embedded-hal]: https://docs.rs/embedded-hal/*/embedded_hal/blocking/i2c/index.html
//!
//! # Subpages
//! Each frame only updates one [subpage][Subpage] of the pixel data, with the subpages
//! alternating every 32 pixels in the sensor's RAM. Each subpage has its own set of pixel offsets,
//! so the subpage a frame was captured for is carried along with it.
//!
//! # Logging
//! Soft failures (uncorrectable EEPROM words, a pixel with no calibration data, pixels that don't
//! come out as a finite temperature) are reported through [`tracing`]. No subscriber is installed
//! by this crate.

#![no_std]
#![allow(clippy::float_cmp)]

#[cfg(not(any(feature = "std", feature = "libm")))]
compile_error!("Either the 'std' or 'libm' feature must be enabled.");

pub mod bus;
pub mod calculations;
pub mod calibration;
pub mod eeprom;
#[doc(hidden)]
pub mod error;
pub mod frame;
pub mod hamming;
pub mod register;
mod util;

pub use calibration::CalibrationParams;
pub use eeprom::{DecodeReport, EepromImage};
pub use error::{CalibrationError, Error, FrameError};
pub use frame::Frame;
pub use hamming::DecodeStatus;
pub use register::{Resolution, Subpage};

/// The number of pixel columns.
pub const WIDTH: usize = 16;

/// The number of pixel rows.
pub const HEIGHT: usize = 12;

/// The number of pixels on the sensor.
pub const NUM_PIXELS: usize = WIDTH * HEIGHT;
