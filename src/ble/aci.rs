//! ACI (Application Controller Interface) vocabulary used by the bond core.
//!
//! Frames on the wire look like:
//! ```text
//! Byte 0:    length of everything that follows
//! Byte 1:    opcode (event opcode or command opcode)
//! Byte 2..:  parameters
//! ```
//!
//! A command-response event carries, after its opcode, the opcode of the
//! command it answers, a status byte, then the response data:
//! ```text
//! [len][0x84][cmd opcode][cmd status][data ...]    data = len - 3 bytes
//! ```

use heapless::Vec;

/// Longest frame body after the length byte.
pub const ACI_MAX_LENGTH: usize = 31;

/// Longest parameter block of an event (frame body minus opcode).
pub const ACI_MAX_PARAMS: usize = ACI_MAX_LENGTH - 1;

// Event opcodes
pub const EVT_DEVICE_STARTED: u8 = 0x81;
pub const EVT_CMD_RSP: u8 = 0x84;
pub const EVT_CONNECTED: u8 = 0x85;
pub const EVT_DISCONNECTED: u8 = 0x86;
pub const EVT_BOND_STATUS: u8 = 0x87;

// Command opcodes
pub const CMD_READ_DYNAMIC_DATA: u8 = 0x07;
pub const CMD_WRITE_DYNAMIC_DATA: u8 = 0x08;

// Status codes
pub const STATUS_SUCCESS: u8 = 0x00;
pub const STATUS_TRANSACTION_CONTINUE: u8 = 0x01;
pub const STATUS_TRANSACTION_COMPLETE: u8 = 0x02;
/// Disconnect status meaning the link closed with bond data ready to read.
pub const STATUS_EXTENDED: u8 = 0x03;
pub const STATUS_ERROR_INTERNAL: u8 = 0x81;

// Device modes reported by the device-started event
pub const DEVICE_MODE_SETUP: u8 = 0x02;
pub const DEVICE_MODE_STANDBY: u8 = 0x03;

/// Bond status event code for a completed bond.
pub const BOND_STATUS_SUCCESS: u8 = 0x00;

/// One event received from the controller. Owned by whoever polled it.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Event {
    len: u8,
    opcode: u8,
    params: Vec<u8, ACI_MAX_PARAMS>,
}

impl Event {
    /// Build an event from its opcode and parameters; extra parameter
    /// bytes beyond [`ACI_MAX_PARAMS`] are dropped.
    pub fn new(opcode: u8, params: &[u8]) -> Self {
        let take = params.len().min(ACI_MAX_PARAMS);
        let mut p = Vec::new();
        // Cannot fail: `take` is bounded by capacity.
        let _ = p.extend_from_slice(&params[..take]);
        Self {
            len: take as u8 + 1,
            opcode,
            params: p,
        }
    }

    /// Parse a raw `[len, opcode, params..]` frame.
    pub fn parse(frame: &[u8]) -> Option<Self> {
        let (&len, body) = frame.split_first()?;
        let len = len as usize;
        if len == 0 || len > ACI_MAX_LENGTH || body.len() < len {
            return None;
        }
        Some(Self::new(body[0], &body[1..len]))
    }

    /// Command response to `cmd_opcode` with `status` and response data.
    pub fn command_response(cmd_opcode: u8, status: u8, data: &[u8]) -> Self {
        let mut params: Vec<u8, ACI_MAX_PARAMS> = Vec::new();
        let _ = params.push(cmd_opcode);
        let _ = params.push(status);
        let take = data.len().min(ACI_MAX_PARAMS - 2);
        let _ = params.extend_from_slice(&data[..take]);
        Self::new(EVT_CMD_RSP, &params)
    }

    /// Disconnected event with the ACI status and the link-layer reason.
    pub fn disconnected(aci_status: u8, btle_status: u8) -> Self {
        Self::new(EVT_DISCONNECTED, &[aci_status, btle_status])
    }

    /// Device-started event.
    pub fn device_started(mode: u8, hw_error: u8, credits: u8) -> Self {
        Self::new(EVT_DEVICE_STARTED, &[mode, hw_error, credits])
    }

    /// Frame body length (opcode + parameters), as carried on the wire.
    pub fn len(&self) -> u8 {
        self.len
    }

    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    pub fn is_command_response(&self) -> bool {
        self.opcode == EVT_CMD_RSP
    }

    /// Status byte of a command response.
    pub fn command_status(&self) -> Option<u8> {
        if self.is_command_response() {
            self.params.get(1).copied()
        } else {
            None
        }
    }

    /// Data bytes of a command response: `len - 3` bytes following the
    /// answered opcode and the status.
    pub fn response_data(&self) -> Option<&[u8]> {
        if !self.is_command_response() || self.len < 3 {
            return None;
        }
        self.params.get(2..self.len as usize - 1)
    }

    /// ACI status of a disconnected event.
    pub fn disconnect_status(&self) -> Option<u8> {
        if self.opcode == EVT_DISCONNECTED {
            self.params.first().copied()
        } else {
            None
        }
    }

    /// Mode byte of a device-started event.
    pub fn device_mode(&self) -> Option<u8> {
        if self.opcode == EVT_DEVICE_STARTED {
            self.params.first().copied()
        } else {
            None
        }
    }

    /// Status code of a bond-status event.
    pub fn bond_status(&self) -> Option<u8> {
        if self.opcode == EVT_BOND_STATUS {
            self.params.first().copied()
        } else {
            None
        }
    }
}

/// One command frame: `[len, opcode, payload..]`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Command {
    buffer: Vec<u8, { ACI_MAX_LENGTH + 1 }>,
}

impl Command {
    /// Build `[payload.len() + 1, opcode, payload..]`. Returns `None` if
    /// the payload does not fit a frame.
    pub fn new(opcode: u8, payload: &[u8]) -> Option<Self> {
        if payload.len() + 1 > ACI_MAX_LENGTH {
            return None;
        }
        let mut buffer = Vec::new();
        buffer.push(payload.len() as u8 + 1).ok()?;
        buffer.push(opcode).ok()?;
        buffer.extend_from_slice(payload).ok()?;
        Some(Self { buffer })
    }

    /// Wrap an already-framed buffer whose length byte matches its body.
    pub fn from_frame(frame: &[u8]) -> Option<Self> {
        let (&len, body) = frame.split_first()?;
        if len == 0 || len as usize != body.len() || body.len() > ACI_MAX_LENGTH {
            return None;
        }
        let mut buffer = Vec::new();
        buffer.extend_from_slice(frame).ok()?;
        Some(Self { buffer })
    }

    pub fn opcode(&self) -> u8 {
        self.buffer[1]
    }

    pub fn payload(&self) -> &[u8] {
        &self.buffer[2..]
    }

    /// Full frame including the length byte.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_response_layout() {
        let event =
            Event::command_response(CMD_READ_DYNAMIC_DATA, STATUS_TRANSACTION_CONTINUE, &[1, 2, 3]);
        assert_eq!(event.len(), 6);
        assert_eq!(event.opcode(), EVT_CMD_RSP);
        assert_eq!(event.command_status(), Some(STATUS_TRANSACTION_CONTINUE));
        assert_eq!(event.response_data(), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn parse_reads_length_prefixed_frame() {
        let frame = [
            0x04,
            EVT_CMD_RSP,
            CMD_READ_DYNAMIC_DATA,
            STATUS_TRANSACTION_COMPLETE,
            0xAA,
            0xFF,
        ];
        let event = Event::parse(&frame).unwrap();
        assert_eq!(event.len(), 4);
        assert_eq!(event.response_data(), Some(&[0xAAu8][..]));
    }

    #[test]
    fn parse_rejects_truncated_and_empty_frames() {
        assert!(Event::parse(&[]).is_none());
        assert!(Event::parse(&[0x00]).is_none());
        assert!(Event::parse(&[0x05, EVT_CMD_RSP, 0x07]).is_none());
        assert!(Event::parse(&[0x20; 40]).is_none());
    }

    #[test]
    fn short_command_response_has_no_data() {
        let event = Event::new(EVT_CMD_RSP, &[CMD_READ_DYNAMIC_DATA]);
        assert_eq!(event.command_status(), None);
        assert_eq!(event.response_data(), None);

        let bare = Event::new(EVT_CMD_RSP, &[CMD_READ_DYNAMIC_DATA, STATUS_SUCCESS]);
        assert_eq!(bare.response_data(), Some(&[][..]));
    }

    #[test]
    fn accessors_check_opcode() {
        let disconnected = Event::disconnected(STATUS_EXTENDED, 0x13);
        assert_eq!(disconnected.disconnect_status(), Some(STATUS_EXTENDED));
        assert_eq!(disconnected.command_status(), None);
        assert_eq!(disconnected.device_mode(), None);

        let started = Event::device_started(DEVICE_MODE_STANDBY, 0, 2);
        assert_eq!(started.device_mode(), Some(DEVICE_MODE_STANDBY));
        assert_eq!(started.disconnect_status(), None);
    }

    #[test]
    fn command_frames() {
        let cmd = Command::new(CMD_WRITE_DYNAMIC_DATA, &[9, 8]).unwrap();
        assert_eq!(cmd.as_bytes(), &[3, CMD_WRITE_DYNAMIC_DATA, 9, 8]);
        assert_eq!(cmd.opcode(), CMD_WRITE_DYNAMIC_DATA);
        assert_eq!(cmd.payload(), &[9, 8]);

        assert!(Command::new(CMD_WRITE_DYNAMIC_DATA, &[0; ACI_MAX_LENGTH]).is_none());
        assert!(Command::from_frame(&[2, CMD_WRITE_DYNAMIC_DATA]).is_none());
        assert_eq!(
            Command::from_frame(&[2, CMD_WRITE_DYNAMIC_DATA, 7]).unwrap(),
            Command::new(CMD_WRITE_DYNAMIC_DATA, &[7]).unwrap()
        );
    }
}
