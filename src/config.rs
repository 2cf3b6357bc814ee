//! Crate-wide constants and runtime bond configuration.
//!
//! Storage layout, advertising timing and wait budgets live here so
//! they can be tuned in one place.

use crate::error::Error;

// Storage layout

/// Bytes per slot header: status byte + payload size byte.
pub const BOND_HEADER_BYTES: u16 = 2;

/// Status byte flag marking a slot as occupied.
pub const BOND_OCCUPIED_FLAG: u8 = 0x80;

/// Low status bits hold the number of captured messages.
pub const BOND_MESSAGE_COUNT_MASK: u8 = 0x7F;

/// Most dynamic-data messages a single slot can describe.
pub const MAX_DYNAMIC_MESSAGES: u8 = BOND_MESSAGE_COUNT_MASK;

/// Largest payload region one slot can describe (size byte).
pub const MAX_SLOT_PAYLOAD: u16 = u8::MAX as u16;

/// Maximum number of bond slots the peripheral layer can hold.
pub const MAX_BONDS: usize = 8;

/// Default storage address of the header region.
pub const DEFAULT_EEPROM_OFFSET: u16 = 0;

/// Default number of slots (single bond).
pub const DEFAULT_MAX_BONDS: u8 = 1;

// Advertising
//
// Intervals are in 0.625 ms units, timeouts in seconds.

/// After a successful restore, or when the radio already holds a bond.
pub const RECONNECT_ADV_TIMEOUT_SECS: u16 = 100;
/// 0x0020 = 20 ms.
pub const RECONNECT_ADV_INTERVAL: u16 = 0x0020;

/// Waiting for a new central to connect and pair.
pub const PAIRING_ADV_TIMEOUT_SECS: u16 = 180;
/// 0x0050 = 50 ms.
pub const PAIRING_ADV_INTERVAL: u16 = 0x0050;

/// After a bonded peer disconnects.
pub const REBONDED_ADV_TIMEOUT_SECS: u16 = 180;
/// 0x0100 = 160 ms.
pub const REBONDED_ADV_INTERVAL: u16 = 0x0100;

// Event waits

/// Default number of empty polls tolerated while waiting for one event.
pub const DEFAULT_POLL_LIMIT: u32 = 100_000;

/// Runtime layout and wait settings for a set of bond slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BondConfig {
    /// Storage address of slot 0's header.
    pub eeprom_offset: u16,
    /// Number of slots reserved in storage.
    pub max_bonds: u8,
    /// Empty polls tolerated per event wait when using [`crate::ble::PollLimit`].
    pub poll_limit: u32,
}

impl Default for BondConfig {
    fn default() -> Self {
        Self {
            eeprom_offset: DEFAULT_EEPROM_OFFSET,
            max_bonds: DEFAULT_MAX_BONDS,
            poll_limit: DEFAULT_POLL_LIMIT,
        }
    }
}

impl BondConfig {
    /// Config for `max_bonds` slots starting at `eeprom_offset`.
    pub fn new(eeprom_offset: u16, max_bonds: u8) -> Self {
        Self {
            eeprom_offset,
            max_bonds,
            ..Self::default()
        }
    }

    /// Reject layouts the store cannot address.
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_bonds == 0 || self.max_bonds as usize > MAX_BONDS {
            return Err(Error::InvalidConfig);
        }
        let headers = self.max_bonds as u16 * BOND_HEADER_BYTES;
        if self.eeprom_offset.checked_add(headers).is_none() {
            return Err(Error::InvalidConfig);
        }
        if self.poll_limit == 0 {
            return Err(Error::InvalidConfig);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_single_bond_at_zero() {
        let config = BondConfig::default();
        assert_eq!(config.eeprom_offset, 0);
        assert_eq!(config.max_bonds, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_layouts() {
        assert_eq!(BondConfig::new(0, 0).validate(), Err(Error::InvalidConfig));
        assert_eq!(
            BondConfig::new(0, MAX_BONDS as u8 + 1).validate(),
            Err(Error::InvalidConfig)
        );
        assert_eq!(BondConfig::new(u16::MAX, 2).validate(), Err(Error::InvalidConfig));

        let mut no_wait = BondConfig::default();
        no_wait.poll_limit = 0;
        assert_eq!(no_wait.validate(), Err(Error::InvalidConfig));
    }
}
