//! CH9329 frame types and fixed payload layouts.
//!
//! Wire format (CH9329 Serial Communication Protocol V1.0):
//! ```text
//! ┌──────┬──────┬──────┬──────┬──────────────┬──────────┐
//! │Header│ ADDR │ CMD  │ LEN  │   PAYLOAD    │   SUM    │
//! ├──────┼──────┼──────┼──────┼──────────────┼──────────┤
//! │57 AB │  00  │  xx  │  N   │   N bytes    │ checksum │
//! └──────┴──────┴──────┴──────┴──────────────┴──────────┘
//! ```
//!
//! The checksum is the low byte of the sum of every preceding byte, header
//! included.  The chip answers a command `xx` with `xx | 0x80` on success
//! and `xx | 0xC0` plus a one-byte status code on failure.

use serde::{Deserialize, Serialize};

/// Two-byte sync header that starts every CH9329 frame.
pub const FRAME_HEADER: [u8; 2] = [0x57, 0xAB];

/// Default chip address.  `0x00` is accepted by any chip.
pub const DEFAULT_ADDRESS: u8 = 0x00;

/// Largest payload the chip accepts.  Length bytes above this are framing noise.
pub const MAX_PAYLOAD_LEN: usize = 64;

/// Smallest possible frame: header (2) + addr + cmd + len + checksum.
pub const MIN_FRAME_LEN: usize = 6;

/// Bit 7 set in the command byte marks a success response from the chip.
pub const RESPONSE_BIT: u8 = 0x80;

/// Bits 7 and 6 set mark an error response carrying a status byte.
pub const ERROR_RESPONSE_MASK: u8 = 0xC0;

/// Command codes understood by the CH9329.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CommandCode {
    /// Query chip version, USB enumeration status, and lock-LED state.
    GetInfo = 0x01,
    /// Standard keyboard report (8-byte payload).
    KeyboardReport = 0x02,
    /// Consumer-control (media key) report (4-byte payload).
    MediaReport = 0x03,
    /// Absolute mouse report (7-byte payload, 0..=4095 coordinate space).
    MouseAbsoluteReport = 0x04,
    /// Relative mouse report (5-byte payload, signed single-byte deltas).
    MouseRelativeReport = 0x05,
    /// Read the chip's parameter configuration block.
    ConfigQuery = 0x08,
    /// Write the chip's parameter configuration block.
    ConfigSet = 0x09,
    /// Software reset.  The chip re-enumerates on the target afterwards.
    Reset = 0x0F,
}

impl CommandCode {
    /// Parses a command byte with any response bits already stripped.
    pub fn from_base(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::GetInfo),
            0x02 => Some(Self::KeyboardReport),
            0x03 => Some(Self::MediaReport),
            0x04 => Some(Self::MouseAbsoluteReport),
            0x05 => Some(Self::MouseRelativeReport),
            0x08 => Some(Self::ConfigQuery),
            0x09 => Some(Self::ConfigSet),
            0x0F => Some(Self::Reset),
            _ => None,
        }
    }

    /// Required payload length for host-to-chip report commands, if fixed.
    ///
    /// Non-report commands (`GetInfo`, `ConfigQuery`, `Reset`) take an empty
    /// payload on the way out but variable-length payloads in responses, so
    /// only the report commands are length-checked by the codec.
    pub fn fixed_command_len(self) -> Option<usize> {
        match self {
            Self::KeyboardReport => Some(KEYBOARD_PAYLOAD_LEN),
            Self::MediaReport => Some(MEDIA_PAYLOAD_LEN),
            Self::MouseAbsoluteReport => Some(MOUSE_ABS_PAYLOAD_LEN),
            Self::MouseRelativeReport => Some(MOUSE_REL_PAYLOAD_LEN),
            _ => None,
        }
    }
}

/// Payload length of a keyboard report: modifiers, reserved, six usage codes.
pub const KEYBOARD_PAYLOAD_LEN: usize = 8;
/// Payload length of a media report: group byte plus a 3-byte usage mask.
pub const MEDIA_PAYLOAD_LEN: usize = 4;
/// Payload length of an absolute mouse report.
pub const MOUSE_ABS_PAYLOAD_LEN: usize = 7;
/// Payload length of a relative mouse report.
pub const MOUSE_REL_PAYLOAD_LEN: usize = 5;

/// Whether a frame travels host-to-chip or chip-to-host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Host-to-chip command.
    Command,
    /// Chip-to-host success response (`cmd | 0x80`).
    Response,
    /// Chip-to-host error response (`cmd | 0xC0`); payload byte 0 is a
    /// [`DeviceStatus`].
    ErrorResponse,
}

impl FrameKind {
    /// Splits a raw command byte into its kind and base code byte.
    pub fn split(cmd_byte: u8) -> (Self, u8) {
        if cmd_byte & ERROR_RESPONSE_MASK == ERROR_RESPONSE_MASK {
            (Self::ErrorResponse, cmd_byte & !ERROR_RESPONSE_MASK)
        } else if cmd_byte & RESPONSE_BIT != 0 {
            (Self::Response, cmd_byte & !RESPONSE_BIT)
        } else {
            (Self::Command, cmd_byte)
        }
    }

    /// Recombines the kind with a base code into the wire command byte.
    pub fn apply(self, code: CommandCode) -> u8 {
        match self {
            Self::Command => code as u8,
            Self::Response => code as u8 | RESPONSE_BIT,
            Self::ErrorResponse => code as u8 | ERROR_RESPONSE_MASK,
        }
    }
}

/// One CH9329 frame, minus the parts the codec owns (header and checksum).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialCommand {
    /// Chip address byte.  [`DEFAULT_ADDRESS`] unless reconfigured.
    pub address: u8,
    /// Base command code with response bits stripped.
    pub code: CommandCode,
    /// Command, success response, or error response.
    pub kind: FrameKind,
    /// Payload bytes.  Length is validated against the fixed layouts for
    /// report commands.
    pub payload: Vec<u8>,
}

impl SerialCommand {
    /// A host-to-chip command with the default address.
    pub fn new(code: CommandCode, payload: Vec<u8>) -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            code,
            kind: FrameKind::Command,
            payload,
        }
    }

    /// The empty-payload `GetInfo` probe.
    pub fn get_info() -> Self {
        Self::new(CommandCode::GetInfo, Vec::new())
    }

    /// The empty-payload configuration query.
    pub fn config_query() -> Self {
        Self::new(CommandCode::ConfigQuery, Vec::new())
    }

    /// The software reset command.
    pub fn reset() -> Self {
        Self::new(CommandCode::Reset, Vec::new())
    }

    /// Total encoded length of this frame in bytes.
    pub fn encoded_len(&self) -> usize {
        MIN_FRAME_LEN + self.payload.len()
    }
}

/// Status byte carried by error responses (payload byte 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DeviceStatus {
    Success = 0x00,
    /// Serial receive timeout inside the chip.
    Timeout = 0xE1,
    /// The chip saw an invalid packet header.
    HeaderInvalid = 0xE2,
    /// The chip saw an unknown command code.
    CommandInvalid = 0xE3,
    /// The chip computed a different checksum.
    ChecksumMismatch = 0xE4,
    /// A parameter was out of range.
    ParameterInvalid = 0xE5,
    /// The command was understood but execution failed.
    OperationFailed = 0xE6,
}

impl From<u8> for DeviceStatus {
    fn from(byte: u8) -> Self {
        match byte {
            0x00 => Self::Success,
            0xE1 => Self::Timeout,
            0xE2 => Self::HeaderInvalid,
            0xE3 => Self::CommandInvalid,
            0xE4 => Self::ChecksumMismatch,
            0xE5 => Self::ParameterInvalid,
            _ => Self::OperationFailed,
        }
    }
}

/// Parsed `GetInfo` response payload (8 bytes).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChipInfo {
    /// Firmware version, e.g. "V1.1".
    pub version: String,
    /// Whether the target host has enumerated the chip's USB interface.
    pub usb_enumerated: bool,
    pub num_lock: bool,
    pub caps_lock: bool,
    pub scroll_lock: bool,
}

impl ChipInfo {
    /// Parses a `GetInfo` response payload.  Returns `None` if it is shorter
    /// than the documented 8 bytes.
    pub fn parse(payload: &[u8]) -> Option<Self> {
        if payload.len() < 8 {
            return None;
        }
        let version_raw = payload[0];
        let leds = payload[2];
        Some(Self {
            version: format!("V{}.{}", version_raw >> 4, version_raw & 0x0F),
            usb_enumerated: payload[1] == 0x01,
            num_lock: leds & 0x01 != 0,
            caps_lock: leds & 0x02 != 0,
            scroll_lock: leds & 0x04 != 0,
        })
    }
}
