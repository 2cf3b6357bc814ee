//! Radio-facing side of the bond core.
//!
//! The radio controller (an nRF8001-class ACI device) is reached through
//! a [`RadioGateway`] implemented by the transport layer:
//!
//! 1. **Commands** - framed requests pushed over the serial transport.
//! 2. **Events** - polled one at a time; polling never blocks, waits are
//!    bounded by a [`Deadline`].
//! 3. **Advertising** - the two advertising requests the bond lifecycle
//!    issues: connect-only for a known peer, connect-and-pair otherwise.
//!
//! The integration layer in [`peripheral`] owns the session state and
//! turns incoming events into [`peripheral::PeripheralEvent`]s.

pub mod aci;
pub mod peripheral;
pub mod wait;

pub use wait::{Deadline, PollLimit};
#[cfg(feature = "time")]
pub use wait::TimeLimit;

use crate::config;
use crate::error::TransportError;
use aci::{Command, Event};

/// Bond indicator of the current radio session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BondStatus {
    /// No bond is active on the radio side (also: not yet known).
    #[default]
    Failed,
    /// The controller holds an active bond, from pairing or restore.
    Success,
}

/// Per-session radio state, owned by the integration layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionState {
    pub bond_status: BondStatus,
    pub connected: bool,
    /// Last mode reported by a device-started event.
    pub device_mode: Option<u8>,
}

impl SessionState {
    pub const fn new() -> Self {
        Self {
            bond_status: BondStatus::Failed,
            connected: false,
            device_mode: None,
        }
    }

    pub fn is_bonded(&self) -> bool {
        self.bond_status == BondStatus::Success
    }
}

/// What an advertising request lets a central do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdvertisingMode {
    /// Reconnect to an already bonded peer.
    Connect,
    /// Connect and pair with a new peer.
    Pair,
}

/// One advertising request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Advertising {
    pub mode: AdvertisingMode,
    /// Seconds before the controller gives up advertising.
    pub timeout_secs: u16,
    /// Advertising interval, 0.625 ms units.
    pub interval: u16,
}

impl Advertising {
    /// Right after a successful restore, or when the radio already holds a bond.
    pub const RECONNECT: Self = Self {
        mode: AdvertisingMode::Connect,
        timeout_secs: config::RECONNECT_ADV_TIMEOUT_SECS,
        interval: config::RECONNECT_ADV_INTERVAL,
    };

    /// Waiting for a new central; slower interval to save power.
    pub const PAIRING: Self = Self {
        mode: AdvertisingMode::Pair,
        timeout_secs: config::PAIRING_ADV_TIMEOUT_SECS,
        interval: config::PAIRING_ADV_INTERVAL,
    };

    /// After a bonded peer dropped the link.
    pub const REBONDED: Self = Self {
        mode: AdvertisingMode::Connect,
        timeout_secs: config::REBONDED_ADV_TIMEOUT_SECS,
        interval: config::REBONDED_ADV_INTERVAL,
    };

    /// Issue this request through `gateway`.
    pub fn start<G: RadioGateway + ?Sized>(&self, gateway: &mut G) -> Result<(), TransportError> {
        match self.mode {
            AdvertisingMode::Connect => gateway.connect(self.timeout_secs, self.interval),
            AdvertisingMode::Pair => gateway.bond(self.timeout_secs, self.interval),
        }
    }
}

/// Request/event boundary to the radio controller.
pub trait RadioGateway {
    /// Push one framed command to the controller.
    fn send_command(&mut self, command: &Command) -> Result<(), TransportError>;

    /// Return the next pending event, or `None` right away if there is none.
    fn poll_event(&mut self, session: &mut SessionState) -> Option<Event>;

    /// Advertise for connection by an already bonded central.
    fn connect(&mut self, timeout_secs: u16, interval: u16) -> Result<(), TransportError>;

    /// Advertise for connection and pairing.
    fn bond(&mut self, timeout_secs: u16, interval: u16) -> Result<(), TransportError>;

    /// Ask for the next chunk of dynamic bonding data; the answer arrives
    /// as a command response event.
    fn read_dynamic_data(&mut self) -> Result<(), TransportError> {
        let command = Command::new(aci::CMD_READ_DYNAMIC_DATA, &[]).ok_or(TransportError)?;
        self.send_command(&command)
    }
}

impl<T: RadioGateway + ?Sized> RadioGateway for &mut T {
    fn send_command(&mut self, command: &Command) -> Result<(), TransportError> {
        (**self).send_command(command)
    }

    fn poll_event(&mut self, session: &mut SessionState) -> Option<Event> {
        (**self).poll_event(session)
    }

    fn connect(&mut self, timeout_secs: u16, interval: u16) -> Result<(), TransportError> {
        (**self).connect(timeout_secs, interval)
    }

    fn bond(&mut self, timeout_secs: u16, interval: u16) -> Result<(), TransportError> {
        (**self).bond(timeout_secs, interval)
    }

    fn read_dynamic_data(&mut self) -> Result<(), TransportError> {
        (**self).read_dynamic_data()
    }
}
