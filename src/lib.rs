//! Bond capture, persistence and restore for nRF8001-class BLE radios.
//!
//! The radio controller forgets its bonding data at power-off. This crate
//! reads that data out after the first pairing, keeps it in a small
//! byte-addressed store and replays it into the controller on the next
//! boot, so a previously bonded central can reconnect without pairing
//! again.
//!
//! - [`storage`]: byte-addressed storage behind the [`storage::Eeprom`] trait
//! - [`bond`]: slot headers, the record store and the per-slot controller
//! - [`ble`]: controller vocabulary, the gateway trait, bounded waits and
//!   the [`ble::peripheral::BondedPeripheral`] integration layer
//!
//! Usage: `cargo test` runs everything on the host. Firmware builds enable
//! the `embedded` feature for the NVM adapter, embassy-time deadlines and
//! defmt logging.

#![cfg_attr(not(test), no_std)]

// This mod MUST go first, so that the others see its macros.
mod fmt;

pub mod ble;
pub mod bond;
pub mod config;
pub mod error;
pub mod storage;

pub use ble::peripheral::{BondedPeripheral, PeripheralEvent};
pub use ble::{
    Advertising, AdvertisingMode, BondStatus, Deadline, PollLimit, RadioGateway, SessionState,
};
pub use bond::{BondController, BondStore, DisconnectOutcome, SlotHeader};
pub use config::BondConfig;
pub use error::{Error, ProtocolError, StorageError, TransportError};
pub use storage::{Eeprom, RamEeprom};

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════
