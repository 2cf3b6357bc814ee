//! Per-slot bond lifecycle.
//!
//! ```text
//!            capture ok                 restore ok
//!  Empty ───────────────▶ Bonded ◀──────────────── Bonded (on disk)
//!    ▲                      │                          │
//!    └──── clear ───────────┘          restore failed ─┘ (empty for this session,
//!                                                         storage untouched)
//! ```
//!
//! The controller never blocks on its own: every wait for a controller
//! event goes through [`next_event`] with the caller's [`Deadline`].

use super::slot::SlotHeader;
use super::store::BondStore;
use crate::ble::aci::{
    Event, STATUS_EXTENDED, STATUS_TRANSACTION_COMPLETE, STATUS_TRANSACTION_CONTINUE,
};
use crate::ble::wait::next_event;
use crate::ble::{Advertising, BondStatus, Deadline, RadioGateway, SessionState};
use crate::config::{BondConfig, MAX_DYNAMIC_MESSAGES, MAX_SLOT_PAYLOAD};
use crate::error::{Error, ProtocolError, StorageError};
use crate::storage::Eeprom;

/// Result of handling a disconnect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DisconnectOutcome {
    /// `None` when no capture was attempted.
    pub capture: Option<Result<SlotHeader, Error>>,
    pub advertising: Advertising,
}

/// Owns the bond lifecycle of one storage slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BondController {
    store: BondStore,
    index: u8,
    bonded: bool,
}

impl BondController {
    /// Controller for slot `index` of the layout in `config`. Starts out
    /// unbonded until [`init`](Self::init) reads the header.
    pub fn new(config: &BondConfig, index: u8) -> Result<Self, Error> {
        config.validate()?;
        if index >= config.max_bonds {
            return Err(Error::SlotOutOfRange(index));
        }
        Ok(Self {
            store: BondStore::new(config),
            index,
            bonded: false,
        })
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    /// In-memory view of whether this slot holds a usable bond.
    pub fn is_bonded(&self) -> bool {
        self.bonded
    }

    pub fn store(&self) -> &BondStore {
        &self.store
    }

    /// Current stored header of this slot.
    pub fn header<E: Eeprom>(&self, eeprom: &mut E) -> Result<SlotHeader, Error> {
        self.store.read_header(eeprom, self.index)
    }

    /// Load the bonded flag from storage. The session starts without an
    /// active bond since nothing is connected yet. Storage is not written.
    pub fn init<E: Eeprom>(
        &mut self,
        eeprom: &mut E,
        session: &mut SessionState,
    ) -> Result<(), Error> {
        debug!(
            "Bond {} init: offset {}, max bonds {}, header at {}",
            self.index,
            self.store.header_addr(0),
            self.store.max_bonds(),
            self.store.header_addr(self.index)
        );
        self.store.dump_headers(eeprom)?;
        self.bonded = self.header(eeprom)?.is_occupied();
        session.bond_status = BondStatus::Failed;
        info!("Bond {} init: bonded={}", self.index, self.bonded);
        Ok(())
    }

    /// Controller reached standby (boot): restore a stored bond if there
    /// is one, then advertise.
    ///
    /// A failed restore is returned without retrying and without touching
    /// storage; the slot is treated as empty for the rest of the session.
    pub fn restore_and_advertise<E, G, D>(
        &mut self,
        eeprom: &mut E,
        gateway: &mut G,
        session: &mut SessionState,
        deadline: &mut D,
    ) -> Result<Advertising, Error>
    where
        E: Eeprom,
        G: RadioGateway,
        D: Deadline,
    {
        let advertising = if self.bonded {
            info!("Bond {}: previous bond present, restoring", self.index);
            if let Err(e) = self.restore(eeprom, gateway, session, deadline) {
                error!("Bond {}: restore failed: {:?}", self.index, e);
                self.bonded = false;
                return Err(e);
            }
            info!("Bond {}: restored, waiting for connection", self.index);
            Advertising::RECONNECT
        } else if !session.is_bonded() {
            info!("Bond {}: advertising for connection and bonding", self.index);
            Advertising::PAIRING
        } else {
            info!("Bond {}: radio already bonded, advertising", self.index);
            Advertising::RECONNECT
        };
        advertising.start(gateway)?;
        Ok(advertising)
    }

    /// Link dropped. After the first pairing of the session, a disconnect
    /// with the extended status triggers a capture; either way the
    /// controller goes back to advertising.
    pub fn disconnected<E, G, D>(
        &mut self,
        eeprom: &mut E,
        gateway: &mut G,
        session: &mut SessionState,
        event: &Event,
        deadline: &mut D,
    ) -> Result<DisconnectOutcome, Error>
    where
        E: Eeprom,
        G: RadioGateway,
        D: Deadline,
    {
        if !session.is_bonded() {
            info!("Bond {}: not bonded, advertising for bonding", self.index);
            Advertising::PAIRING.start(gateway)?;
            return Ok(DisconnectOutcome {
                capture: None,
                advertising: Advertising::PAIRING,
            });
        }

        session.bond_status = BondStatus::Failed;
        let mut capture = None;
        if event.disconnect_status() == Some(STATUS_EXTENDED) && !self.bonded {
            let result = self.capture(eeprom, gateway, session, deadline);
            match &result {
                Ok(header) => info!(
                    "Bond {}: stored {} messages, {} bytes",
                    self.index,
                    header.message_count(),
                    header.payload_size
                ),
                Err(e) => error!("Bond {}: capture failed: {:?}", self.index, e),
            }
            capture = Some(result);
        }

        info!("Bond {}: advertising for bonded peer", self.index);
        Advertising::REBONDED.start(gateway)?;
        Ok(DisconnectOutcome {
            capture,
            advertising: Advertising::REBONDED,
        })
    }

    /// Replay the stored records into the controller, one command per
    /// response. Read-only towards storage. Returns the number of
    /// messages sent.
    pub fn restore<E, G, D>(
        &mut self,
        eeprom: &mut E,
        gateway: &mut G,
        session: &mut SessionState,
        deadline: &mut D,
    ) -> Result<u8, Error>
    where
        E: Eeprom,
        G: RadioGateway,
        D: Deadline,
    {
        let header = self.header(eeprom)?;
        if !header.is_occupied() {
            return Err(Error::NotBonded);
        }
        let start = self.store.payload_offset(eeprom, self.index)?;
        let end = start
            .checked_add(header.payload_size as u16)
            .ok_or(StorageError::OutOfBounds(start))?;
        let mut remaining = header.message_count();
        let mut cursor = start;
        let mut sent = 0u8;
        debug!(
            "Bond {}: restoring {} messages from {}..{}",
            self.index, remaining, start, end
        );

        loop {
            let (command, next) = self.store.read_message(eeprom, cursor, end)?;
            cursor = next;

            trace!("Bond {}: sending restore message {}", self.index, sent + 1);
            gateway.send_command(&command).map_err(|e| {
                error!("Bond {}: restore send failed", self.index);
                Error::from(e)
            })?;
            sent += 1;

            let event = next_event(gateway, session, deadline)?;
            if !event.is_command_response() {
                return Err(ProtocolError::UnexpectedEvent(event.opcode()).into());
            }
            remaining = remaining.saturating_sub(1);

            match event.command_status() {
                Some(STATUS_TRANSACTION_COMPLETE) => {
                    self.bonded = true;
                    session.bond_status = BondStatus::Success;
                    info!("Bond {}: restore complete after {} messages", self.index, sent);
                    return Ok(sent);
                }
                Some(STATUS_TRANSACTION_CONTINUE) if remaining > 0 => {
                    debug!("Bond {}: restore continue, {} left", self.index, remaining);
                }
                Some(STATUS_TRANSACTION_CONTINUE) => {
                    warn!("Bond {}: controller wants more than stored", self.index);
                    return Err(ProtocolError::TooManyMessages.into());
                }
                Some(status) => return Err(ProtocolError::UnexpectedStatus(status).into()),
                None => return Err(ProtocolError::MalformedEvent.into()),
            }
        }
    }

    /// Read the dynamic bonding data out of the controller and persist it.
    ///
    /// The header is committed only once every record is written. Any
    /// failure clears the header, so the slot is either fully stored or
    /// empty.
    pub fn capture<E, G, D>(
        &mut self,
        eeprom: &mut E,
        gateway: &mut G,
        session: &mut SessionState,
        deadline: &mut D,
    ) -> Result<SlotHeader, Error>
    where
        E: Eeprom,
        G: RadioGateway,
        D: Deadline,
    {
        let result = self.capture_records(eeprom, gateway, session, deadline);
        match result {
            Ok(header) => {
                self.bonded = true;
                Ok(header)
            }
            Err(e) => {
                if let Err(clear_err) = self.store.clear(eeprom, self.index) {
                    error!("Bond {}: rollback failed: {:?}", self.index, clear_err);
                }
                self.bonded = false;
                Err(e)
            }
        }
    }

    fn capture_records<E, G, D>(
        &mut self,
        eeprom: &mut E,
        gateway: &mut G,
        session: &mut SessionState,
        deadline: &mut D,
    ) -> Result<SlotHeader, Error>
    where
        E: Eeprom,
        G: RadioGateway,
        D: Deadline,
    {
        let current = self.header(eeprom)?;
        if current.is_occupied() {
            self.store.clear(eeprom, self.index)?;
        }

        let start = self.store.payload_offset(eeprom, self.index)?;
        let pinned = self.store.later_slots_occupied(eeprom, self.index)?;
        let limit = self.capture_limit(&*eeprom, start, current, pinned);
        debug!(
            "Bond {}: capturing into {}..{} (pinned={})",
            self.index, start, limit, pinned
        );

        gateway.read_dynamic_data()?;
        let mut count = 1u8;
        let mut cursor = start;

        loop {
            let event = next_event(gateway, session, deadline)?;
            if !event.is_command_response() {
                return Err(ProtocolError::UnexpectedEvent(event.opcode()).into());
            }
            match event.command_status() {
                Some(STATUS_TRANSACTION_COMPLETE) => {
                    cursor = self.store.write_message(eeprom, cursor, limit, &event)?;
                    let size = (cursor - start) as u8;
                    if pinned && size != current.payload_size {
                        warn!(
                            "Bond {}: {} bytes captured, {} reserved",
                            self.index, size, current.payload_size
                        );
                        return Err(StorageError::LayoutConflict.into());
                    }
                    let header =
                        SlotHeader::occupied(count, size).ok_or(ProtocolError::TooManyMessages)?;
                    self.store.write_header(eeprom, self.index, header)?;
                    return Ok(header);
                }
                Some(STATUS_TRANSACTION_CONTINUE) => {
                    cursor = self.store.write_message(eeprom, cursor, limit, &event)?;
                    if count >= MAX_DYNAMIC_MESSAGES {
                        return Err(ProtocolError::TooManyMessages.into());
                    }
                    gateway.read_dynamic_data()?;
                    count += 1;
                    debug!("Bond {}: capture continue, message {}", self.index, count);
                }
                Some(status) => return Err(ProtocolError::UnexpectedStatus(status).into()),
                None => return Err(ProtocolError::MalformedEvent.into()),
            }
        }
    }

    /// Exclusive end for captured records: the size byte's range, the
    /// device, and, while a later slot is occupied, the slot's current
    /// reservation.
    fn capture_limit<E: Eeprom>(
        &self,
        eeprom: &E,
        start: u16,
        current: SlotHeader,
        pinned: bool,
    ) -> u16 {
        let device_end = eeprom.capacity().min(u16::MAX as usize) as u32;
        let reserved = if pinned {
            current.payload_size as u32
        } else {
            MAX_SLOT_PAYLOAD as u32
        };
        (start as u32 + reserved).min(device_end) as u16
    }

    /// Forget this slot's bond. Only the status byte is written.
    pub fn clear<E: Eeprom>(&mut self, eeprom: &mut E) -> Result<(), Error> {
        self.store.clear(eeprom, self.index)?;
        self.bonded = false;
        info!("Bond {}: cleared", self.index);
        Ok(())
    }
}
