//! Bond store: slot headers and captured dynamic-data records.
//!
//! Storage layout, starting at the configured offset:
//! ```text
//! [hdr 0][hdr 1]..[hdr N-1][slot 0 records][slot 1 records]..
//!  2 bytes each             payload_size(0) bytes
//! ```
//! Each record is a ready-to-send write-dynamic-data command frame:
//! ```text
//! [len = event len - 2][0x08][event data: len - 1 bytes]
//! ```
//! There is no offset table. A slot's records start after all headers
//! plus the payload sizes of every earlier slot, occupied or not, so
//! clearing a slot (status byte only) never moves a later one.

use heapless::Vec;

use super::slot::SlotHeader;
use crate::ble::aci::{Command, Event, ACI_MAX_LENGTH, CMD_WRITE_DYNAMIC_DATA};
use crate::config::{BondConfig, BOND_HEADER_BYTES};
use crate::error::{Error, ProtocolError, StorageError};
use crate::storage::Eeprom;

/// Addresses of one slot layout. Holds no storage state of its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BondStore {
    base: u16,
    max_bonds: u8,
}

impl BondStore {
    pub fn new(config: &BondConfig) -> Self {
        Self {
            base: config.eeprom_offset,
            max_bonds: config.max_bonds,
        }
    }

    pub fn max_bonds(&self) -> u8 {
        self.max_bonds
    }

    /// Address of `slot`'s status byte.
    pub fn header_addr(&self, slot: u8) -> u16 {
        self.base + slot as u16 * BOND_HEADER_BYTES
    }

    /// First byte after the header region.
    pub fn payload_base(&self) -> u16 {
        self.header_addr(self.max_bonds)
    }

    fn check_slot(&self, slot: u8) -> Result<(), Error> {
        if slot >= self.max_bonds {
            return Err(Error::SlotOutOfRange(slot));
        }
        Ok(())
    }

    pub fn read_header<E: Eeprom>(&self, eeprom: &mut E, slot: u8) -> Result<SlotHeader, Error> {
        self.check_slot(slot)?;
        let addr = self.header_addr(slot);
        let status = eeprom.read_byte(addr)?;
        let payload_size = eeprom.read_byte(addr + 1)?;
        Ok(SlotHeader {
            status,
            payload_size,
        })
    }

    /// Commit a header. The size byte goes first and the status byte last,
    /// so an interrupted commit leaves the slot reading as empty.
    pub fn write_header<E: Eeprom>(
        &self,
        eeprom: &mut E,
        slot: u8,
        header: SlotHeader,
    ) -> Result<(), Error> {
        self.check_slot(slot)?;
        let addr = self.header_addr(slot);
        eeprom.write_byte(addr + 1, header.payload_size)?;
        eeprom.write_byte(addr, header.status)?;
        debug!(
            "Slot {} header written: status {:x}, size {}",
            slot, header.status, header.payload_size
        );
        Ok(())
    }

    /// Mark `slot` empty. Only the status byte changes.
    pub fn clear<E: Eeprom>(&self, eeprom: &mut E, slot: u8) -> Result<(), Error> {
        self.check_slot(slot)?;
        eeprom.write_byte(self.header_addr(slot), 0x00)?;
        debug!("Slot {} cleared", slot);
        Ok(())
    }

    /// Start of `slot`'s records: payload base plus every earlier slot's size.
    pub fn payload_offset<E: Eeprom>(&self, eeprom: &mut E, slot: u8) -> Result<u16, Error> {
        self.check_slot(slot)?;
        let mut offset = self.payload_base() as u32;
        for earlier in 0..slot {
            offset += eeprom.read_byte(self.header_addr(earlier) + 1)? as u32;
        }
        let offset = u16::try_from(offset).map_err(|_| StorageError::OutOfBounds(u16::MAX))?;
        trace!("Slot {} payload offset {}", slot, offset);
        Ok(offset)
    }

    /// Whether any slot after `slot` holds a bond.
    pub fn later_slots_occupied<E: Eeprom>(
        &self,
        eeprom: &mut E,
        slot: u8,
    ) -> Result<bool, Error> {
        for later in slot.saturating_add(1)..self.max_bonds {
            if self.read_header(eeprom, later)?.is_occupied() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Read one record at `cursor` as a command frame. Records may not
    /// extend to or past `end`. Returns the frame and the next cursor.
    pub fn read_message<E: Eeprom>(
        &self,
        eeprom: &mut E,
        cursor: u16,
        end: u16,
    ) -> Result<(Command, u16), Error> {
        if cursor >= end {
            return Err(StorageError::Corrupt(cursor).into());
        }
        let len = eeprom.read_byte(cursor)?;
        let next = cursor as u32 + 1 + len as u32;
        if len == 0 || len as usize > ACI_MAX_LENGTH || next > end as u32 {
            warn!("Malformed record at {} (len {})", cursor, len);
            return Err(StorageError::Corrupt(cursor).into());
        }

        let mut frame: Vec<u8, { ACI_MAX_LENGTH + 1 }> = Vec::new();
        frame.push(len).map_err(|_| StorageError::Corrupt(cursor))?;
        for addr in cursor + 1..next as u16 {
            let byte = eeprom.read_byte(addr)?;
            frame.push(byte).map_err(|_| StorageError::Corrupt(cursor))?;
        }
        let command = Command::from_frame(&frame).ok_or(StorageError::Corrupt(cursor))?;
        trace!("Read record at {}: len {}", cursor, len);
        Ok((command, next as u16))
    }

    /// Append one captured command response at `cursor` as a replayable
    /// record. Nothing is written if the record would reach past `limit`.
    pub fn write_message<E: Eeprom>(
        &self,
        eeprom: &mut E,
        cursor: u16,
        limit: u16,
        event: &Event,
    ) -> Result<u16, Error> {
        let data = event
            .response_data()
            .ok_or(ProtocolError::MalformedEvent)?;
        let len = event.len() - 2;
        let next = cursor as u32 + 1 + len as u32;
        if next > limit as u32 {
            warn!("Record of {} bytes does not fit before {}", len + 1, limit);
            return Err(StorageError::RegionFull.into());
        }

        eeprom.write_byte(cursor, len)?;
        eeprom.write_byte(cursor + 1, CMD_WRITE_DYNAMIC_DATA)?;
        for (&byte, addr) in data.iter().zip(cursor + 2..) {
            eeprom.write_byte(addr, byte)?;
        }
        trace!("Wrote record at {}: len {}", cursor, len);
        Ok(next as u16)
    }

    /// Log every slot header.
    pub fn dump_headers<E: Eeprom>(&self, eeprom: &mut E) -> Result<(), Error> {
        for slot in 0..self.max_bonds {
            let header = self.read_header(eeprom, slot)?;
            debug!(
                "Slot {} at {}: status {:x}, size {}",
                slot,
                self.header_addr(slot),
                header.status,
                header.payload_size
            );
        }
        Ok(())
    }
}
