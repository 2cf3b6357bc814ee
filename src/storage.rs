//! Byte-addressed non-volatile storage.
//!
//! The bond store only ever needs single-byte reads and writes; each
//! byte write is assumed atomic, multi-byte sequences are not. Three
//! backends are provided:
//!
//!   - [`RamEeprom`]: RAM-backed, zero-initialised, for host tests and
//!     simulators.
//!   - [`NvmEeprom`] (feature `nvm`): any blocking
//!     `embedded_storage::Storage` device.
//!   - Anything else implementing [`Eeprom`].

use crate::error::StorageError;

/// Single-writer byte storage.
pub trait Eeprom {
    /// Number of addressable bytes.
    fn capacity(&self) -> usize;

    /// Read one byte. Never-written storage reads as whatever the
    /// device's erased value is; the bond layout treats `0x00` as empty.
    fn read_byte(&mut self, addr: u16) -> Result<u8, StorageError>;

    /// Write one byte.
    fn write_byte(&mut self, addr: u16, value: u8) -> Result<(), StorageError>;
}

impl<T: Eeprom + ?Sized> Eeprom for &mut T {
    fn capacity(&self) -> usize {
        (**self).capacity()
    }

    fn read_byte(&mut self, addr: u16) -> Result<u8, StorageError> {
        (**self).read_byte(addr)
    }

    fn write_byte(&mut self, addr: u16, value: u8) -> Result<(), StorageError> {
        (**self).write_byte(addr, value)
    }
}

/// RAM-backed storage of `N` bytes.
#[derive(Clone, Debug)]
pub struct RamEeprom<const N: usize> {
    bytes: [u8; N],
    writes: usize,
}

impl<const N: usize> RamEeprom<N> {
    /// Create zero-filled storage.
    pub const fn new() -> Self {
        Self {
            bytes: [0; N],
            writes: 0,
        }
    }

    /// Raw contents, for inspection.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of byte writes performed so far.
    pub fn write_count(&self) -> usize {
        self.writes
    }
}

impl<const N: usize> Default for RamEeprom<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Eeprom for RamEeprom<N> {
    fn capacity(&self) -> usize {
        N
    }

    fn read_byte(&mut self, addr: u16) -> Result<u8, StorageError> {
        self.bytes
            .get(addr as usize)
            .copied()
            .ok_or(StorageError::OutOfBounds(addr))
    }

    fn write_byte(&mut self, addr: u16, value: u8) -> Result<(), StorageError> {
        let slot = self
            .bytes
            .get_mut(addr as usize)
            .ok_or(StorageError::OutOfBounds(addr))?;
        *slot = value;
        self.writes += 1;
        Ok(())
    }
}

/// Adapter over a blocking `embedded-storage` device.
#[cfg(feature = "nvm")]
pub struct NvmEeprom<S> {
    storage: S,
}

#[cfg(feature = "nvm")]
impl<S> NvmEeprom<S>
where
    S: embedded_storage::Storage,
{
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Give the device back.
    pub fn release(self) -> S {
        self.storage
    }
}

#[cfg(feature = "nvm")]
impl<S> Eeprom for NvmEeprom<S>
where
    S: embedded_storage::Storage,
{
    fn capacity(&self) -> usize {
        embedded_storage::ReadStorage::capacity(&self.storage)
    }

    fn read_byte(&mut self, addr: u16) -> Result<u8, StorageError> {
        if addr as usize >= self.capacity() {
            return Err(StorageError::OutOfBounds(addr));
        }
        let mut buf = [0u8; 1];
        embedded_storage::ReadStorage::read(&mut self.storage, addr as u32, &mut buf).map_err(
            |_| {
                error!("NVM read failed at {:x}", addr);
                StorageError::Io
            },
        )?;
        Ok(buf[0])
    }

    fn write_byte(&mut self, addr: u16, value: u8) -> Result<(), StorageError> {
        if addr as usize >= self.capacity() {
            return Err(StorageError::OutOfBounds(addr));
        }
        embedded_storage::Storage::write(&mut self.storage, addr as u32, &[value]).map_err(
            |_| {
                error!("NVM write failed at {:x}", addr);
                StorageError::Io
            },
        )
    }
}
