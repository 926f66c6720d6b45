// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
use std::cell::RefCell;
use std::collections::VecDeque;
use std::ops::RangeInclusive;
use std::rc::Rc;

use embedded_hal::blocking::i2c;

use crate::eeprom_data::EEPROM_LENGTH;
use crate::frame_data::{CONTROL_REGISTER_INDEX, FRAME_LENGTH, SUBPAGE_INDEX};

/// The number of words of RAM.
///
/// RAM runs from 0x0400 through 0x05BF, representing 192 pixels duplicated across two subpages
/// along with 64 other addresses (half of which are reserved).
pub const RAM_LENGTH: usize = 0x05C0 - 0x0400;

const RAM_BASE: u16 = 0x0400;

const AUX_BASE: u16 = 0x0580;

const EEPROM_BASE: u16 = 0x2400;

const STATUS_REGISTER_ADDRESS: u16 = 0x8000;

const CONTROL_REGISTER_ADDRESS: u16 = 0x800D;

/// Bit 3 of the status register, set by the sensor when a new frame is in RAM.
pub const NEW_DATA_FLAG: u16 = 0x0008;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MockError {
    /// An unknown I2C address was given.
    UnknownI2cAddress(u8),

    /// The given address isn't mapped, or the access runs past the end of a region.
    IllegalAccess(u16),

    /// The given address should not be written to.
    IllegalWriteAddress(u16),

    /// A write-read with anything other than a 2-byte address, or a read of a partial word.
    IllegalOperation,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum I2cOperation {
    Write { address: u16, value: u16 },
    Read { address: u16, length: usize },
}

/// A fake sensor on an I²C bus.
///
/// The memory is shared between clones, so a test can keep a handle to update the frame or
/// inspect the operations after handing the bus off.
#[derive(Clone, Debug)]
pub struct MockCameraBus {
    i2c_address: u8,
    ram_range: RangeInclusive<u16>,
    eeprom_range: RangeInclusive<u16>,
    eeprom: Rc<RefCell<[u16; EEPROM_LENGTH]>>,
    ram: Rc<RefCell<[u16; RAM_LENGTH]>>,
    status_register: Rc<RefCell<u16>>,
    control_register: Rc<RefCell<u16>>,
    recent_operations: Rc<RefCell<VecDeque<I2cOperation>>>,
}

impl MockCameraBus {
    pub fn new(i2c_address: u8, eeprom: [u16; EEPROM_LENGTH]) -> Self {
        Self {
            i2c_address,
            ram_range: RAM_BASE..=(RAM_BASE + RAM_LENGTH as u16 - 1),
            eeprom_range: EEPROM_BASE..=(EEPROM_BASE + EEPROM_LENGTH as u16 - 1),
            eeprom: Rc::new(RefCell::new(eeprom)),
            ram: Rc::new(RefCell::new([0u16; RAM_LENGTH])),
            status_register: Rc::new(RefCell::new(0)),
            control_register: Rc::new(RefCell::new(0)),
            recent_operations: Rc::new(RefCell::new(VecDeque::new())),
        }
    }

    /// Lay out an assembled frame in RAM the way the sensor would, and flag it as new data.
    ///
    /// Pixels alternate subpages every 32 pixels: pixels 0 through 31 for subpage 0 start at
    /// 0x0400, then pixels 0 through 31 for subpage 1, then pixels 32 through 63 for subpage 0,
    /// and so on. Only the subpage given in the frame is written.
    pub fn update_frame(&self, frame: &[u16; FRAME_LENGTH]) {
        let subpage = frame[SUBPAGE_INDEX] & 0x0001;
        let mut ram = self.ram.borrow_mut();
        for (stride, pixels) in frame[..192].chunks_exact(32).enumerate() {
            let start = stride * 64 + subpage as usize * 32;
            ram[start..(start + 32)].copy_from_slice(pixels);
        }
        let aux_start = (AUX_BASE - RAM_BASE) as usize;
        ram[aux_start..(aux_start + 48)].copy_from_slice(&frame[192..240]);
        *self.control_register.borrow_mut() = frame[CONTROL_REGISTER_INDEX];
        *self.status_register.borrow_mut() = subpage | NEW_DATA_FLAG;
    }

    pub fn set_data_available(&self, available: bool) {
        let mut status = self.status_register.borrow_mut();
        if available {
            *status |= NEW_DATA_FLAG;
        } else {
            *status &= !NEW_DATA_FLAG;
        }
    }

    pub fn status_register(&self) -> u16 {
        *self.status_register.borrow()
    }

    pub fn recent_operations(&self) -> Vec<I2cOperation> {
        self.recent_operations.borrow().iter().copied().collect()
    }

    pub fn clear_recent_operations(&self) {
        self.recent_operations.borrow_mut().clear();
    }

    fn check_i2c_address(&self, address: u8) -> Result<(), MockError> {
        if address == self.i2c_address {
            Ok(())
        } else {
            Err(MockError::UnknownI2cAddress(address))
        }
    }

    fn read_words(&self, start: u16, count: usize) -> Result<Vec<u16>, MockError> {
        let end = start as usize + count - 1;
        if end > u16::MAX as usize {
            return Err(MockError::IllegalAccess(start));
        }
        let end = end as u16;
        if self.ram_range.contains(&start) && self.ram_range.contains(&end) {
            let offset = (start - RAM_BASE) as usize;
            Ok(self.ram.borrow()[offset..(offset + count)].to_vec())
        } else if self.eeprom_range.contains(&start) && self.eeprom_range.contains(&end) {
            let offset = (start - EEPROM_BASE) as usize;
            Ok(self.eeprom.borrow()[offset..(offset + count)].to_vec())
        } else if count == 1 && start == STATUS_REGISTER_ADDRESS {
            Ok(vec![*self.status_register.borrow()])
        } else if count == 1 && start == CONTROL_REGISTER_ADDRESS {
            Ok(vec![*self.control_register.borrow()])
        } else {
            Err(MockError::IllegalAccess(start))
        }
    }

    fn push_operation(&self, operation: I2cOperation) {
        let mut operations = self.recent_operations.borrow_mut();
        if operations.len() >= 64 {
            operations.pop_front();
        }
        operations.push_back(operation);
    }
}

impl i2c::WriteRead for MockCameraBus {
    type Error = MockError;

    fn write_read(
        &mut self,
        address: u8,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.check_i2c_address(address)?;
        if bytes.len() != 2 || buffer.is_empty() || buffer.len() % 2 != 0 {
            return Err(MockError::IllegalOperation);
        }
        let start = u16::from_be_bytes([bytes[0], bytes[1]]);
        let words = self.read_words(start, buffer.len() / 2)?;
        for (chunk, word) in buffer.chunks_exact_mut(2).zip(words) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        self.push_operation(I2cOperation::Read {
            address: start,
            length: buffer.len() / 2,
        });
        Ok(())
    }
}

impl i2c::Write for MockCameraBus {
    type Error = MockError;

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        self.check_i2c_address(address)?;
        if bytes.len() != 4 {
            return Err(MockError::IllegalOperation);
        }
        let register = u16::from_be_bytes([bytes[0], bytes[1]]);
        let value = u16::from_be_bytes([bytes[2], bytes[3]]);
        match register {
            STATUS_REGISTER_ADDRESS => {
                // The subpage bits are read-only
                let mut status = self.status_register.borrow_mut();
                *status = (*status & 0x0007) | (value & 0x0038);
            }
            CONTROL_REGISTER_ADDRESS => *self.control_register.borrow_mut() = value,
            _ => return Err(MockError::IllegalWriteAddress(register)),
        }
        self.push_operation(I2cOperation::Write {
            address: register,
            value,
        });
        Ok(())
    }
}
