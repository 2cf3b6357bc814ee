//! Two-byte slot header.
//!
//! Layout:
//! ```text
//! Byte 0: status   0x00 = empty
//!                  0x80 | n = occupied, n captured messages (1..=127)
//! Byte 1: total payload bytes of the slot's stored records
//! ```

use crate::config::{BOND_MESSAGE_COUNT_MASK, BOND_OCCUPIED_FLAG, MAX_DYNAMIC_MESSAGES};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SlotHeader {
    pub status: u8,
    pub payload_size: u8,
}

impl SlotHeader {
    /// Header of a slot that has never held a bond.
    pub const EMPTY: Self = Self {
        status: 0x00,
        payload_size: 0x00,
    };

    /// Occupied header; `None` unless `message_count` is in `1..=127`.
    pub fn occupied(message_count: u8, payload_size: u8) -> Option<Self> {
        if message_count == 0 || message_count > MAX_DYNAMIC_MESSAGES {
            return None;
        }
        Some(Self {
            status: BOND_OCCUPIED_FLAG | message_count,
            payload_size,
        })
    }

    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        Self {
            status: bytes[0],
            payload_size: bytes[1],
        }
    }

    pub fn to_bytes(self) -> [u8; 2] {
        [self.status, self.payload_size]
    }

    /// Any non-zero status counts as a stored bond.
    pub fn is_occupied(&self) -> bool {
        self.status != 0x00
    }

    pub fn message_count(&self) -> u8 {
        self.status & BOND_MESSAGE_COUNT_MASK
    }
}
