// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
#[cfg(feature = "std")]
extern crate std;

use core::fmt;

use embedded_hal::blocking::i2c;

/// Failures while turning an EEPROM image into calibration parameters.
///
/// These are fatal for a sensor instance; the EEPROM needs to be loaded again from scratch.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CalibrationError {
    /// The EEPROM validity bit (bit 6 of word 10) is not set.
    InvalidEeprom,

    /// More than one pixel has all of its calibration words set to zero.
    TooManyBrokenPixels,
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalibrationError::InvalidEeprom => write!(f, "EEPROM data is not marked as valid"),
            CalibrationError::TooManyBrokenPixels => {
                write!(f, "more than one pixel has no calibration data")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CalibrationError {}

/// The sensor marked a frame as not containing a new sample.
///
/// These errors only affect a single frame. The frame should be dropped and the sensor polled
/// again.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FrameError {
    /// An auxiliary word (PTAT, gain, compensation pixel or V<sub>DD</sub>) holds the invalid
    /// sample sentinel.
    StaleOrInvalidAuxData,

    /// A sampled pixel word holds the invalid sample sentinel.
    StaleOrInvalidPixelData,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::StaleOrInvalidAuxData => {
                write!(f, "auxiliary frame data is stale or invalid")
            }
            FrameError::StaleOrInvalidPixelData => write!(f, "pixel data is stale or invalid"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FrameError {}

/// Errors from [`bus`](crate::bus) operations.
pub enum Error<I2C>
where
    I2C: i2c::WriteRead + i2c::Write,
{
    /// Errors originating from a combined write-read I²C transaction.
    I2cWriteReadError(<I2C as i2c::WriteRead>::Error),

    /// Errors originating from an I²C write.
    I2cWriteError(<I2C as i2c::Write>::Error),

    /// The calibration data read from the sensor could not be used.
    Calibration(CalibrationError),

    /// The frame read from the sensor could not be used.
    Frame(FrameError),
}

// The bus error types are projections through two different traits, so Clone and PartialEq are
// bounded on those rather than derived.
impl<I2C> Clone for Error<I2C>
where
    I2C: i2c::WriteRead + i2c::Write,
    <I2C as i2c::WriteRead>::Error: Clone,
    <I2C as i2c::Write>::Error: Clone,
{
    fn clone(&self) -> Self {
        match self {
            Error::I2cWriteReadError(err) => Error::I2cWriteReadError(err.clone()),
            Error::I2cWriteError(err) => Error::I2cWriteError(err.clone()),
            Error::Calibration(err) => Error::Calibration(*err),
            Error::Frame(err) => Error::Frame(*err),
        }
    }
}

impl<I2C> PartialEq for Error<I2C>
where
    I2C: i2c::WriteRead + i2c::Write,
    <I2C as i2c::WriteRead>::Error: PartialEq,
    <I2C as i2c::Write>::Error: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Error::I2cWriteReadError(lhs), Error::I2cWriteReadError(rhs)) => lhs == rhs,
            (Error::I2cWriteError(lhs), Error::I2cWriteError(rhs)) => lhs == rhs,
            (Error::Calibration(lhs), Error::Calibration(rhs)) => lhs == rhs,
            (Error::Frame(lhs), Error::Frame(rhs)) => lhs == rhs,
            _ => false,
        }
    }
}

// Custom Debug implementation so that I2C doesn't need to implement Debug (like the one from
// linux-embedded-hal).
impl<I2C> fmt::Debug for Error<I2C>
where
    I2C: i2c::WriteRead + i2c::Write,
    <I2C as i2c::WriteRead>::Error: fmt::Debug,
    <I2C as i2c::Write>::Error: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::I2cWriteReadError(err) => f
                .debug_tuple("Error::I2cWriteReadError")
                .field(err)
                .finish(),
            Error::I2cWriteError(err) => f.debug_tuple("Error::I2cWriteError").field(err).finish(),
            Error::Calibration(err) => f.debug_tuple("Error::Calibration").field(err).finish(),
            Error::Frame(err) => f.debug_tuple("Error::Frame").field(err).finish(),
        }
    }
}

impl<I2C> fmt::Display for Error<I2C>
where
    I2C: i2c::WriteRead + i2c::Write,
    <I2C as i2c::WriteRead>::Error: fmt::Debug,
    <I2C as i2c::Write>::Error: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::I2cWriteReadError(err) => write!(f, "I2C write-read error: {:?}", err),
            Error::I2cWriteError(err) => write!(f, "I2C write error: {:?}", err),
            Error::Calibration(err) => write!(f, "Calibration error: {}", err),
            Error::Frame(err) => write!(f, "Frame error: {}", err),
        }
    }
}

#[cfg(feature = "std")]
impl<I2C> std::error::Error for Error<I2C>
where
    I2C: i2c::WriteRead + i2c::Write,
    <I2C as i2c::WriteRead>::Error: std::error::Error + 'static,
    <I2C as i2c::Write>::Error: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::I2cWriteReadError(err) => Some(err),
            Error::I2cWriteError(err) => Some(err),
            Error::Calibration(err) => Some(err),
            Error::Frame(err) => Some(err),
        }
    }
}

impl<I2C> From<CalibrationError> for Error<I2C>
where
    I2C: i2c::WriteRead + i2c::Write,
{
    fn from(err: CalibrationError) -> Self {
        Self::Calibration(err)
    }
}

impl<I2C> From<FrameError> for Error<I2C>
where
    I2C: i2c::WriteRead + i2c::Write,
{
    fn from(err: FrameError) -> Self {
        Self::Frame(err)
    }
}
