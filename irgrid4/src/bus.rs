// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross

//! Reading calibration and frame data from a sensor over I²C
//!
//! These are thin helpers over the [`embedded-hal`][embedded-hal] blocking I²C traits. They do
//! not retry or wait; polling timing is left to the caller.
//!
//! [embedded-hal]: https://docs.rs/embedded-hal/*/embedded_hal/blocking/i2c/index.html
use embedded_hal::blocking::i2c;

use crate::calibration::{self, CalibrationParams};
use crate::eeprom::{EepromImage, EEPROM_BASE_ADDRESS, EEPROM_LENGTH};
use crate::error::Error;
use crate::frame::{Frame, FRAME_LENGTH};
use crate::register::{StatusRegister, CONTROL_REGISTER_ADDRESS, STATUS_REGISTER_ADDRESS};
use crate::util::WORD_SIZE;
use crate::NUM_PIXELS;

/// The start of RAM, and the first pixel of subpage 0.
const RAM_BASE_ADDRESS: u16 = 0x0400;

/// The start of the auxiliary (non-pixel) values in RAM.
const AUX_BASE_ADDRESS: u16 = 0x0580;

/// Pixels are stored in blocks of 32, alternating between subpages.
const PIXEL_BLOCK_LENGTH: usize = 32;

/// The number of auxiliary words copied into a frame.
const AUX_LENGTH: usize = 48;

const CONTROL_REGISTER_INDEX: usize = NUM_PIXELS + AUX_LENGTH;

const SUBPAGE_INDEX: usize = CONTROL_REGISTER_INDEX + 1;

/// The most words read in a single RAM transaction.
const MAX_RAM_READ_LENGTH: usize = AUX_LENGTH;

pub trait FromI2C<I2C> {
    type Error;
    type Ok;

    /// Create an instance of a type using data retrieved over I²C.
    fn from_i2c(bus: &mut I2C, i2c_address: u8) -> Result<Self::Ok, Self::Error>;
}

impl<I2C> FromI2C<I2C> for EepromImage
where
    I2C: i2c::WriteRead + i2c::Write,
{
    type Error = Error<I2C>;
    type Ok = Self;

    fn from_i2c(bus: &mut I2C, i2c_address: u8) -> Result<Self, Error<I2C>> {
        read_eeprom(bus, i2c_address)
    }
}

impl<I2C> FromI2C<I2C> for CalibrationParams
where
    I2C: i2c::WriteRead + i2c::Write,
{
    type Error = Error<I2C>;
    type Ok = Self;

    fn from_i2c(bus: &mut I2C, i2c_address: u8) -> Result<Self, Error<I2C>> {
        let eeprom = read_eeprom(bus, i2c_address)?;
        Ok(calibration::extract(&eeprom)?)
    }
}

/// Read a single 16-bit register.
fn read_register<I2C>(bus: &mut I2C, i2c_address: u8, address: u16) -> Result<u16, Error<I2C>>
where
    I2C: i2c::WriteRead + i2c::Write,
{
    let mut scratch = [0u8; WORD_SIZE];
    bus.write_read(i2c_address, &address.to_be_bytes(), &mut scratch)
        .map_err(Error::I2cWriteReadError)?;
    Ok(u16::from_be_bytes(scratch))
}

fn write_register<I2C>(
    bus: &mut I2C,
    i2c_address: u8,
    address: u16,
    value: u16,
) -> Result<(), Error<I2C>>
where
    I2C: i2c::WriteRead + i2c::Write,
{
    let address = address.to_be_bytes();
    let value = value.to_be_bytes();
    bus.write(i2c_address, &[address[0], address[1], value[0], value[1]])
        .map_err(Error::I2cWriteError)
}

/// Read a run of RAM words starting at `address` into `destination`.
fn read_ram<I2C>(
    bus: &mut I2C,
    i2c_address: u8,
    address: u16,
    destination: &mut [u16],
) -> Result<(), Error<I2C>>
where
    I2C: i2c::WriteRead + i2c::Write,
{
    let mut scratch = [0u8; MAX_RAM_READ_LENGTH * WORD_SIZE];
    let bytes = &mut scratch[..(destination.len() * WORD_SIZE)];
    bus.write_read(i2c_address, &address.to_be_bytes(), bytes)
        .map_err(Error::I2cWriteReadError)?;
    for (word, pair) in destination.iter_mut().zip(bytes.chunks_exact(WORD_SIZE)) {
        *word = u16::from_be_bytes([pair[0], pair[1]]);
    }
    Ok(())
}

/// Dump and decode the EEPROM.
pub fn read_eeprom<I2C>(bus: &mut I2C, i2c_address: u8) -> Result<EepromImage, Error<I2C>>
where
    I2C: i2c::WriteRead + i2c::Write,
{
    let mut eeprom_buf = [0u8; EEPROM_LENGTH * WORD_SIZE];
    bus.write_read(i2c_address, &EEPROM_BASE_ADDRESS.to_be_bytes(), &mut eeprom_buf)
        .map_err(Error::I2cWriteReadError)?;
    Ok(EepromImage::from_be_bytes(&eeprom_buf)?)
}

/// Read a new frame from the sensor, if one is available.
///
/// The status register is checked once. If the sensor has no new data, `Ok(None)` is returned
/// without reading anything else. Otherwise the new data flag is cleared, the pixels for the
/// updated subpage and the auxiliary values are read, and the assembled frame is
/// [validated](Frame::validate).
pub fn read_frame_if_ready<I2C>(
    bus: &mut I2C,
    i2c_address: u8,
) -> Result<Option<Frame>, Error<I2C>>
where
    I2C: i2c::WriteRead + i2c::Write,
{
    let status = StatusRegister::from(read_register(bus, i2c_address, STATUS_REGISTER_ADDRESS)?);
    if !status.new_data {
        return Ok(None);
    }
    // Clear the flag before reading, so the next frame isn't missed if it lands mid-read.
    write_register(bus, i2c_address, STATUS_REGISTER_ADDRESS, status.acknowledged())?;
    let subpage: usize = status.last_updated_subpage.into();
    let mut words = [0u16; FRAME_LENGTH];
    let pixel_blocks = words[..NUM_PIXELS].chunks_exact_mut(PIXEL_BLOCK_LENGTH);
    for (block_index, block) in pixel_blocks.enumerate() {
        // Each block of 32 pixels is followed by the same pixels for the other subpage.
        let block_start = (block_index * 2 + subpage) * PIXEL_BLOCK_LENGTH;
        let address = RAM_BASE_ADDRESS + block_start as u16;
        read_ram(bus, i2c_address, address, block)?;
    }
    read_ram(
        bus,
        i2c_address,
        AUX_BASE_ADDRESS,
        &mut words[NUM_PIXELS..CONTROL_REGISTER_INDEX],
    )?;
    words[CONTROL_REGISTER_INDEX] = read_register(bus, i2c_address, CONTROL_REGISTER_ADDRESS)?;
    words[SUBPAGE_INDEX] = subpage as u16;
    let frame = Frame::new(words);
    let validated_subpage = frame.validate()?;
    tracing::trace!(
        subpage = ?validated_subpage,
        resolution = u8::from(frame.resolution()),
        "read frame"
    );
    Ok(Some(frame))
}

#[cfg(test)]
mod test {
    extern crate std;
    use std::vec;

    use irgrid4_test_data::{
        datasheet_eeprom_words, example_frame, I2cOperation, MockCameraBus, MockError,
        INVALID_SAMPLE, NEW_DATA_FLAG, T_A_PTAT_INDEX,
    };

    use crate::calibration::{self, CalibrationParams};
    use crate::eeprom::EepromImage;
    use crate::error::{CalibrationError, Error, FrameError};
    use crate::register::Subpage;

    use super::{read_eeprom, read_frame_if_ready, FromI2C};

    const ADDRESS: u8 = 0x33;

    fn datasheet_bus() -> MockCameraBus {
        MockCameraBus::new(ADDRESS, datasheet_eeprom_words())
    }

    #[test]
    fn eeprom() {
        let mut bus = datasheet_bus();
        let image = read_eeprom(&mut bus, ADDRESS).unwrap();
        assert_eq!(image, EepromImage::load(datasheet_eeprom_words()).unwrap());
        assert_eq!(
            bus.recent_operations(),
            vec![I2cOperation::Read {
                address: 0x2400,
                length: 832
            }]
        );
    }

    #[test]
    fn calibration_from_i2c() {
        let mut bus = datasheet_bus();
        let from_bus = CalibrationParams::from_i2c(&mut bus, ADDRESS).unwrap();
        let image = EepromImage::load(datasheet_eeprom_words()).unwrap();
        assert_eq!(from_bus, calibration::extract(&image).unwrap());
    }

    #[test]
    fn invalid_eeprom() {
        let mut eeprom = datasheet_eeprom_words();
        eeprom[10] = 0;
        let mut bus = MockCameraBus::new(ADDRESS, eeprom);
        assert!(matches!(
            read_eeprom(&mut bus, ADDRESS),
            Err(Error::Calibration(CalibrationError::InvalidEeprom))
        ));
    }

    #[test]
    fn wrong_address() {
        let mut bus = datasheet_bus();
        assert!(matches!(
            EepromImage::from_i2c(&mut bus, 0x34),
            Err(Error::I2cWriteReadError(MockError::UnknownI2cAddress(0x34)))
        ));
    }

    #[test]
    fn no_frame_ready() {
        let mut bus = datasheet_bus();
        assert!(read_frame_if_ready(&mut bus, ADDRESS).unwrap().is_none());
        // Only the status register should have been read.
        assert_eq!(
            bus.recent_operations(),
            vec![I2cOperation::Read {
                address: 0x8000,
                length: 1
            }]
        );
    }

    #[test]
    fn frame_ready() {
        for subpage in [0, 1] {
            let mut bus = datasheet_bus();
            let mut expected = example_frame(subpage);
            // Mark some pixels so the layout is checked
            for (index, pixel) in expected[..192].iter_mut().enumerate() {
                *pixel = index as u16;
            }
            bus.update_frame(&expected);
            let frame = read_frame_if_ready(&mut bus, ADDRESS).unwrap().unwrap();
            assert_eq!(frame.words(), &expected);
            assert_eq!(frame.subpage(), Subpage::from_word(subpage));
            // The new data flag is cleared
            assert_eq!(bus.status_register() & NEW_DATA_FLAG, 0);
            assert!(read_frame_if_ready(&mut bus, ADDRESS).unwrap().is_none());
        }
    }

    #[test]
    fn new_data_flag_checked() {
        let mut bus = datasheet_bus();
        bus.update_frame(&example_frame(0));
        bus.set_data_available(false);
        assert!(read_frame_if_ready(&mut bus, ADDRESS).unwrap().is_none());
        // The RAM contents are only read once the sensor flags them as new.
        bus.set_data_available(true);
        let frame = read_frame_if_ready(&mut bus, ADDRESS).unwrap().unwrap();
        assert_eq!(frame.words(), &example_frame(0));
    }

    #[test]
    fn frame_read_pattern() {
        let mut bus = datasheet_bus();
        bus.update_frame(&example_frame(1));
        read_frame_if_ready(&mut bus, ADDRESS).unwrap();
        let mut expected = vec![
            I2cOperation::Read {
                address: 0x8000,
                length: 1,
            },
            I2cOperation::Write {
                address: 0x8000,
                value: 0x0000,
            },
        ];
        for block in 0..6 {
            expected.push(I2cOperation::Read {
                address: 0x0420 + block * 0x40,
                length: 32,
            });
        }
        expected.push(I2cOperation::Read {
            address: 0x0580,
            length: 48,
        });
        expected.push(I2cOperation::Read {
            address: 0x800D,
            length: 1,
        });
        assert_eq!(bus.recent_operations(), expected);
    }

    #[test]
    fn stale_frame() {
        let mut bus = datasheet_bus();
        let mut frame = example_frame(0);
        frame[T_A_PTAT_INDEX] = INVALID_SAMPLE;
        bus.update_frame(&frame);
        assert!(matches!(
            read_frame_if_ready(&mut bus, ADDRESS),
            Err(Error::Frame(FrameError::StaleOrInvalidAuxData))
        ));
    }
}
