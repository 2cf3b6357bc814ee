//! Shared fakes for the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;

use bluecap_bond::ble::aci::{
    Command, Event, CMD_READ_DYNAMIC_DATA, CMD_WRITE_DYNAMIC_DATA, DEVICE_MODE_STANDBY,
    STATUS_ERROR_INTERNAL, STATUS_EXTENDED, STATUS_TRANSACTION_COMPLETE,
    STATUS_TRANSACTION_CONTINUE,
};
use bluecap_bond::{
    Advertising, AdvertisingMode, Eeprom, RadioGateway, RamEeprom, SessionState, StorageError,
    TransportError,
};

/// Simulated radio controller.
///
/// Hands out `bond_data` chunk by chunk on read-dynamic-data, and accepts
/// `expected_restore` write-dynamic-data messages before reporting the
/// restore complete.
#[derive(Default)]
pub struct SimRadio {
    pub bond_data: Vec<Vec<u8>>,
    read_pos: usize,
    pub expected_restore: usize,
    pub restored: Vec<Vec<u8>>,
    pub inbox: VecDeque<Event>,
    pub advertising: Vec<Advertising>,
    /// Answer restore messages with an internal error instead.
    pub reject_restore: bool,
}

impl SimRadio {
    /// Controller that just paired and holds `chunks` as dynamic data.
    pub fn paired(chunks: &[Vec<u8>]) -> Self {
        Self {
            bond_data: chunks.to_vec(),
            ..Self::default()
        }
    }

    /// Freshly powered controller waiting for `messages` restore messages.
    pub fn expecting_restore(messages: usize) -> Self {
        Self {
            expected_restore: messages,
            ..Self::default()
        }
    }

    pub fn push(&mut self, event: Event) {
        self.inbox.push_back(event);
    }

    pub fn last_advertising(&self) -> Option<Advertising> {
        self.advertising.last().copied()
    }
}

impl RadioGateway for SimRadio {
    fn send_command(&mut self, command: &Command) -> Result<(), TransportError> {
        match command.opcode() {
            CMD_READ_DYNAMIC_DATA => {
                let chunk = self.bond_data.get(self.read_pos).ok_or(TransportError)?;
                self.read_pos += 1;
                let status = if self.read_pos == self.bond_data.len() {
                    STATUS_TRANSACTION_COMPLETE
                } else {
                    STATUS_TRANSACTION_CONTINUE
                };
                let response = Event::command_response(CMD_READ_DYNAMIC_DATA, status, chunk);
                self.inbox.push_back(response);
            }
            CMD_WRITE_DYNAMIC_DATA => {
                self.restored.push(command.payload().to_vec());
                let status = if self.reject_restore {
                    STATUS_ERROR_INTERNAL
                } else if self.restored.len() < self.expected_restore {
                    STATUS_TRANSACTION_CONTINUE
                } else {
                    STATUS_TRANSACTION_COMPLETE
                };
                let response = Event::command_response(CMD_WRITE_DYNAMIC_DATA, status, &[]);
                self.inbox.push_back(response);
            }
            _ => return Err(TransportError),
        }
        Ok(())
    }

    fn poll_event(&mut self, _session: &mut SessionState) -> Option<Event> {
        self.inbox.pop_front()
    }

    fn connect(&mut self, timeout_secs: u16, interval: u16) -> Result<(), TransportError> {
        self.advertising.push(Advertising {
            mode: AdvertisingMode::Connect,
            timeout_secs,
            interval,
        });
        Ok(())
    }

    fn bond(&mut self, timeout_secs: u16, interval: u16) -> Result<(), TransportError> {
        self.advertising.push(Advertising {
            mode: AdvertisingMode::Pair,
            timeout_secs,
            interval,
        });
        Ok(())
    }
}

/// RAM storage that fails every write once `budget` writes have landed.
pub struct FlakyEeprom<const N: usize> {
    pub inner: RamEeprom<N>,
    pub budget: usize,
}

impl<const N: usize> FlakyEeprom<N> {
    pub fn new(inner: RamEeprom<N>, budget: usize) -> Self {
        Self { inner, budget }
    }
}

impl<const N: usize> Eeprom for FlakyEeprom<N> {
    fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    fn read_byte(&mut self, addr: u16) -> Result<u8, StorageError> {
        self.inner.read_byte(addr)
    }

    fn write_byte(&mut self, addr: u16, value: u8) -> Result<(), StorageError> {
        if self.budget == 0 {
            return Err(StorageError::Io);
        }
        self.budget -= 1;
        self.inner.write_byte(addr, value)
    }
}

pub fn standby() -> Event {
    Event::device_started(DEVICE_MODE_STANDBY, 0, 2)
}

/// Disconnect that asks for the bonding data to be captured.
pub fn extended_disconnect() -> Event {
    Event::disconnected(STATUS_EXTENDED, 0x13)
}

/// Stored size of `chunks`: one length byte, the opcode and the data each.
pub fn stored_size(chunks: &[Vec<u8>]) -> usize {
    chunks.iter().map(|c| c.len() + 2).sum()
}
