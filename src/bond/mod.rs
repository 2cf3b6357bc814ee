//! Bond persistence: slot headers, the record store and the per-slot
//! controller that captures and restores dynamic bonding data.

pub mod controller;
pub mod slot;
pub mod store;


pub use controller::{BondController, DisconnectOutcome};
pub use slot::SlotHeader;
pub use store::BondStore;
