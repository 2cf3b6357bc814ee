//! Unified error type for bond storage and replay.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` for efficient on-target logging.

/// Top-level error type used across the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // Radio
    /// The transport refused a command, or a request could not be issued.
    Transport,

    /// No event arrived before the wait deadline expired.
    Timeout,

    /// The controller answered outside the expected exchange.
    Protocol(ProtocolError),

    // Storage
    /// Non-volatile storage access or layout failure.
    Storage(StorageError),

    // Bonds
    /// Restore was requested for a slot whose header is empty.
    NotBonded,

    /// Slot index is not below the configured bond count.
    SlotOutOfRange(u8),

    /// The bond configuration cannot be laid out in storage.
    InvalidConfig,
}

/// Violations of the command/response exchange with the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolError {
    /// Event opcode was not a command response.
    UnexpectedEvent(u8),
    /// Command response carried neither continue nor complete.
    UnexpectedStatus(u8),
    /// More messages than the slot header allows.
    TooManyMessages,
    /// Event too short for the fields it must carry.
    MalformedEvent,
}

/// Failures of the byte storage or of the stored layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// The underlying device reported a read/write failure.
    Io,
    /// Address beyond the device capacity.
    OutOfBounds(u16),
    /// Captured data does not fit the slot's payload region.
    RegionFull,
    /// A stored record is malformed or runs past its slot.
    Corrupt(u16),
    /// Resizing this slot would move an occupied later slot.
    LayoutConflict,
}

/// Returned by a gateway when the transport could not carry a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransportError;

// Convenience conversions

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Error::Storage(e)
    }
}

impl From<TransportError> for Error {
    fn from(_: TransportError) -> Self {
        Error::Transport
    }
}
