//! Bonded peripheral: owns the radio, storage and one bond controller per
//! slot, and turns controller events into [`PeripheralEvent`]s.
//!
//! The application drives it by calling [`BondedPeripheral::process`] from
//! its main loop; everything the bond lifecycle needs to do in response to
//! an event happens inside that call.

use heapless::Vec;

use super::aci::{
    Event, BOND_STATUS_SUCCESS, DEVICE_MODE_STANDBY, EVT_BOND_STATUS, EVT_CONNECTED,
    EVT_DEVICE_STARTED, EVT_DISCONNECTED,
};
use super::{Advertising, BondStatus, Deadline, PollLimit, RadioGateway, SessionState};
use crate::bond::{BondController, DisconnectOutcome};
use crate::config::{BondConfig, MAX_BONDS};
use crate::error::Error;
use crate::storage::Eeprom;

/// What a processed controller event meant for the bond lifecycle.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeripheralEvent {
    /// Standby reached and advertising started for `slot`.
    Advertising { slot: u8, advertising: Advertising },
    /// Standby handling for `slot` failed; nothing is advertising.
    RestoreFailed { slot: u8, error: Error },
    Connected,
    /// Link dropped; `outcome` tells whether a capture ran. A capture
    /// into a slot below an occupied one must match that slot's existing
    /// size, so a never-used slot under a bonded one fails with
    /// `RegionFull`.
    Disconnected { slot: u8, outcome: DisconnectOutcome },
    BondStatus(BondStatus),
    /// Any event the bond lifecycle does not act on.
    Other(Event),
}

pub struct BondedPeripheral<G, E, D = PollLimit> {
    gateway: G,
    eeprom: E,
    deadline: D,
    bonds: Vec<BondController, MAX_BONDS>,
    current: u8,
    session: SessionState,
}

impl<G, E> BondedPeripheral<G, E, PollLimit>
where
    G: RadioGateway,
    E: Eeprom,
{
    /// Peripheral whose waits are bounded by `config.poll_limit` empty polls.
    pub fn with_config(gateway: G, eeprom: E, config: BondConfig) -> Result<Self, Error> {
        Self::new(gateway, eeprom, PollLimit::new(config.poll_limit), config)
    }
}

impl<G, E, D> BondedPeripheral<G, E, D>
where
    G: RadioGateway,
    E: Eeprom,
    D: Deadline,
{
    /// Build one controller per configured slot. Storage is not touched
    /// until [`initialize`](Self::initialize).
    pub fn new(gateway: G, eeprom: E, deadline: D, config: BondConfig) -> Result<Self, Error> {
        config.validate()?;
        let mut bonds = Vec::new();
        for index in 0..config.max_bonds {
            bonds
                .push(BondController::new(&config, index)?)
                .map_err(|_| Error::InvalidConfig)?;
        }
        Ok(Self {
            gateway,
            eeprom,
            deadline,
            bonds,
            current: 0,
            session: SessionState::new(),
        })
    }

    /// Select `index` and load every slot's bonded flag from storage.
    pub fn initialize(&mut self, index: u8) -> Result<(), Error> {
        self.select_bond(index)?;
        for bond in self.bonds.iter_mut() {
            bond.init(&mut self.eeprom, &mut self.session)?;
        }
        info!(
            "Peripheral initialized: {} slots, current {}",
            self.bonds.len(),
            self.current
        );
        Ok(())
    }

    /// Standby or boot: restore the current slot's bond, then advertise.
    pub fn handle_standby_or_boot(&mut self) -> Result<Advertising, Error> {
        let bond = self
            .bonds
            .get_mut(self.current as usize)
            .ok_or(Error::SlotOutOfRange(self.current))?;
        bond.restore_and_advertise(
            &mut self.eeprom,
            &mut self.gateway,
            &mut self.session,
            &mut self.deadline,
        )
    }

    pub fn handle_disconnected(&mut self, event: &Event) -> Result<DisconnectOutcome, Error> {
        let bond = self
            .bonds
            .get_mut(self.current as usize)
            .ok_or(Error::SlotOutOfRange(self.current))?;
        bond.disconnected(
            &mut self.eeprom,
            &mut self.gateway,
            &mut self.session,
            event,
            &mut self.deadline,
        )
    }

    /// Forget the current slot's bond.
    pub fn clear_bond(&mut self) -> Result<(), Error> {
        let bond = self
            .bonds
            .get_mut(self.current as usize)
            .ok_or(Error::SlotOutOfRange(self.current))?;
        bond.clear(&mut self.eeprom)
    }

    /// Make `index` the slot later calls act on.
    ///
    /// Slots are laid out back to back, so fill them in index order: a
    /// slot that has never held a bond has no room while any later slot
    /// is bonded, and capturing into it fails until those are cleared.
    pub fn select_bond(&mut self, index: u8) -> Result<(), Error> {
        if index as usize >= self.bonds.len() {
            return Err(Error::SlotOutOfRange(index));
        }
        if index != self.current {
            info!("Bond slot {} -> {}", self.current, index);
        }
        self.current = index;
        Ok(())
    }

    /// Rotate to the next slot, wrapping after the last one.
    pub fn next_bond(&mut self) -> u8 {
        let count = self.bonds.len() as u8;
        let next = if count == 0 { 0 } else { (self.current + 1) % count };
        info!("Bond slot {} -> {}", self.current, next);
        self.current = next;
        next
    }

    pub fn current_bond(&self) -> u8 {
        self.current
    }

    /// Slots whose controller currently holds a bond.
    pub fn bonded_slots(&self) -> Vec<u8, MAX_BONDS> {
        self.bonds
            .iter()
            .filter(|bond| bond.is_bonded())
            .map(|bond| bond.index())
            .collect()
    }

    pub fn bond(&self, index: u8) -> Option<&BondController> {
        self.bonds.get(index as usize)
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }

    pub fn release(self) -> (G, E) {
        (self.gateway, self.eeprom)
    }

    /// Poll one controller event and act on it. `Ok(None)` when nothing
    /// was pending.
    pub fn process(&mut self) -> Result<Option<PeripheralEvent>, Error> {
        let Some(event) = self.gateway.poll_event(&mut self.session) else {
            return Ok(None);
        };
        let slot = self.current;

        let processed = match event.opcode() {
            EVT_DEVICE_STARTED => {
                self.session.device_mode = event.device_mode();
                if event.device_mode() != Some(DEVICE_MODE_STANDBY) {
                    return Ok(Some(PeripheralEvent::Other(event)));
                }
                debug!("Device started in standby");
                match self.handle_standby_or_boot() {
                    Ok(advertising) => PeripheralEvent::Advertising { slot, advertising },
                    Err(error) => {
                        warn!("Standby handling for slot {} failed: {:?}", slot, error);
                        PeripheralEvent::RestoreFailed { slot, error }
                    }
                }
            }
            EVT_CONNECTED => {
                self.session.connected = true;
                info!("Connected");
                PeripheralEvent::Connected
            }
            EVT_DISCONNECTED => {
                self.session.connected = false;
                info!("Disconnected");
                let outcome = self.handle_disconnected(&event)?;
                PeripheralEvent::Disconnected { slot, outcome }
            }
            EVT_BOND_STATUS => {
                let status = if event.bond_status() == Some(BOND_STATUS_SUCCESS) {
                    BondStatus::Success
                } else {
                    BondStatus::Failed
                };
                self.session.bond_status = status;
                info!("Bond status: {:?}", status);
                PeripheralEvent::BondStatus(status)
            }
            _ => PeripheralEvent::Other(event),
        };
        Ok(Some(processed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::aci::{Command, DEVICE_MODE_SETUP};
    use crate::error::TransportError;
    use crate::storage::RamEeprom;

    /// Delivers queued events; ignores every request.
    #[derive(Default)]
    struct Inbox {
        events: std::collections::VecDeque<Event>,
        advertised: usize,
    }

    impl RadioGateway for Inbox {
        fn send_command(&mut self, _command: &Command) -> Result<(), TransportError> {
            Ok(())
        }

        fn poll_event(&mut self, _session: &mut SessionState) -> Option<Event> {
            self.events.pop_front()
        }

        fn connect(&mut self, _: u16, _: u16) -> Result<(), TransportError> {
            self.advertised += 1;
            Ok(())
        }

        fn bond(&mut self, _: u16, _: u16) -> Result<(), TransportError> {
            self.advertised += 1;
            Ok(())
        }
    }

    fn peripheral(max_bonds: u8) -> BondedPeripheral<Inbox, RamEeprom<128>> {
        BondedPeripheral::new(
            Inbox::default(),
            RamEeprom::new(),
            PollLimit::new(4),
            BondConfig::new(0, max_bonds),
        )
        .unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        let result = BondedPeripheral::new(
            Inbox::default(),
            RamEeprom::<16>::new(),
            PollLimit::new(4),
            BondConfig::new(0, 0),
        );
        assert!(matches!(result, Err(Error::InvalidConfig)));
    }

    #[test]
    fn with_config_uses_poll_limit() {
        let mut config = BondConfig::new(0, 2);
        config.poll_limit = 7;
        let p = BondedPeripheral::with_config(Inbox::default(), RamEeprom::<64>::new(), config)
            .unwrap();
        assert_eq!(p.deadline.limit(), 7);
        assert_eq!(p.bond(1).map(|b| b.index()), Some(1));
        assert!(p.bond(2).is_none());
    }

    #[test]
    fn next_bond_wraps() {
        let mut p = peripheral(3);
        p.initialize(1).unwrap();
        assert_eq!(p.current_bond(), 1);
        assert_eq!(p.next_bond(), 2);
        assert_eq!(p.next_bond(), 0);
        assert_eq!(p.next_bond(), 1);
    }

    #[test]
    fn single_slot_rotation_stays_put() {
        let mut p = peripheral(1);
        p.initialize(0).unwrap();
        assert_eq!(p.next_bond(), 0);
    }

    #[test]
    fn select_out_of_range() {
        let mut p = peripheral(2);
        assert_eq!(p.select_bond(2), Err(Error::SlotOutOfRange(2)));
        assert_eq!(p.initialize(5), Err(Error::SlotOutOfRange(5)));
        assert_eq!(p.current_bond(), 0);
    }

    #[test]
    fn nothing_pending_is_none() {
        let mut p = peripheral(1);
        assert_eq!(p.process(), Ok(None));
    }

    #[test]
    fn setup_mode_start_is_passed_through() {
        let mut p = peripheral(1);
        p.initialize(0).unwrap();
        let started = Event::device_started(DEVICE_MODE_SETUP, 0, 2);
        p.gateway_mut().events.push_back(started.clone());
        assert_eq!(p.process(), Ok(Some(PeripheralEvent::Other(started))));
        assert_eq!(p.session().device_mode, Some(DEVICE_MODE_SETUP));
        assert_eq!(p.gateway().advertised, 0);
    }

    #[test]
    fn connection_and_bond_status_update_session() {
        let mut p = peripheral(1);
        p.initialize(0).unwrap();
        p.gateway_mut()
            .events
            .push_back(Event::new(EVT_CONNECTED, &[0; 4]));
        p.gateway_mut()
            .events
            .push_back(Event::new(EVT_BOND_STATUS, &[BOND_STATUS_SUCCESS, 0]));
        p.gateway_mut()
            .events
            .push_back(Event::new(EVT_BOND_STATUS, &[0x81, 0]));

        assert_eq!(p.process(), Ok(Some(PeripheralEvent::Connected)));
        assert!(p.session().connected);
        assert_eq!(
            p.process(),
            Ok(Some(PeripheralEvent::BondStatus(BondStatus::Success)))
        );
        assert!(p.session().is_bonded());
        assert_eq!(
            p.process(),
            Ok(Some(PeripheralEvent::BondStatus(BondStatus::Failed)))
        );
        assert!(!p.session().is_bonded());
    }
}
