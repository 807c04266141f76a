//! Binary codec for CH9329 frames: pure encoding and incremental decoding.
//!
//! Encoding is deterministic: the same [`SerialCommand`] always produces the
//! same bytes.  Decoding is incremental and self-resynchronizing: serial
//! links glitch, so a corrupt leading byte must never wedge the transport.
//! After any [`FrameError`] the decoder has already discarded input up to
//! the next plausible header byte and the caller just polls again.

use thiserror::Error;

use crate::protocol::frame::{
    CommandCode, FrameKind, SerialCommand, FRAME_HEADER, MAX_PAYLOAD_LEN, MIN_FRAME_LEN,
};

/// Errors produced while decoding frames off the serial link.
///
/// All of these are recoverable framing noise: the decoder resynchronizes
/// internally and none of them are surfaced past the transport layer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The bytes at the read position do not start with `57 AB`.
    #[error("invalid frame header")]
    InvalidHeader,

    /// The frame checksum does not match the received bytes.
    #[error("checksum mismatch: frame says 0x{expected:02X}, computed 0x{computed:02X}")]
    ChecksumMismatch { expected: u8, computed: u8 },

    /// The command byte (response bits stripped) is not a known code.
    #[error("unknown command code: 0x{0:02X}")]
    UnknownCommand(u8),

    /// The length byte is impossible for this command.
    #[error("invalid payload length {len} for command 0x{code:02X}")]
    InvalidLength { code: u8, len: u8 },
}

/// Result of attempting to decode one frame from the front of a buffer.
#[derive(Debug, PartialEq, Eq)]
pub enum DecodeStep {
    /// The buffer holds a prefix of a valid frame; feed more bytes.
    NeedMore,
    /// A complete frame was parsed; `consumed` bytes should be discarded.
    Frame {
        command: SerialCommand,
        consumed: usize,
    },
}

/// Low byte of the sum of all bytes, per the CH9329 checksum rule.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Encodes a [`SerialCommand`] into a complete wire frame.
///
/// # Examples
///
/// ```rust
/// use skvm_core::protocol::{encode, CommandCode, SerialCommand};
///
/// let cmd = SerialCommand::new(CommandCode::Reset, vec![]);
/// let bytes = encode(&cmd);
/// assert_eq!(bytes, [0x57, 0xAB, 0x00, 0x0F, 0x00, 0x11]);
/// ```
pub fn encode(command: &SerialCommand) -> Vec<u8> {
    let mut buf = Vec::with_capacity(command.encoded_len());
    buf.extend_from_slice(&FRAME_HEADER);
    buf.push(command.address);
    buf.push(command.kind.apply(command.code));
    buf.push(command.payload.len() as u8);
    buf.extend_from_slice(&command.payload);
    let sum = checksum(&buf);
    buf.push(sum);
    buf
}

/// Decodes one frame from the front of `bytes` without consuming input.
///
/// Returns [`DecodeStep::NeedMore`] when `bytes` is a valid prefix, the
/// parsed frame plus consumed-byte count on success, or a [`FrameError`]
/// when the leading bytes cannot begin a valid frame.  Callers that own a
/// buffer should use [`FrameDecoder`], which handles resynchronization.
pub fn decode(bytes: &[u8]) -> Result<DecodeStep, FrameError> {
    if bytes.is_empty() {
        return Ok(DecodeStep::NeedMore);
    }
    if bytes[0] != FRAME_HEADER[0] {
        return Err(FrameError::InvalidHeader);
    }
    if bytes.len() < 2 {
        return Ok(DecodeStep::NeedMore);
    }
    if bytes[1] != FRAME_HEADER[1] {
        return Err(FrameError::InvalidHeader);
    }
    if bytes.len() < MIN_FRAME_LEN - 1 {
        // Header seen but addr/cmd/len not all here yet.
        return Ok(DecodeStep::NeedMore);
    }

    let address = bytes[2];
    let cmd_byte = bytes[3];
    let len = bytes[4] as usize;

    let (kind, base) = FrameKind::split(cmd_byte);
    let code = CommandCode::from_base(base).ok_or(FrameError::UnknownCommand(cmd_byte))?;

    if len > MAX_PAYLOAD_LEN {
        return Err(FrameError::InvalidLength {
            code: cmd_byte,
            len: bytes[4],
        });
    }
    if kind == FrameKind::Command {
        if let Some(required) = code.fixed_command_len() {
            if len != required {
                return Err(FrameError::InvalidLength {
                    code: cmd_byte,
                    len: bytes[4],
                });
            }
        }
    }

    let total = MIN_FRAME_LEN + len;
    if bytes.len() < total {
        return Ok(DecodeStep::NeedMore);
    }

    let expected = bytes[total - 1];
    let computed = checksum(&bytes[..total - 1]);
    if expected != computed {
        return Err(FrameError::ChecksumMismatch { expected, computed });
    }

    Ok(DecodeStep::Frame {
        command: SerialCommand {
            address,
            code,
            kind,
            payload: bytes[5..5 + len].to_vec(),
        },
        consumed: total,
    })
}

/// Incremental frame decoder owning an append-only byte buffer.
///
/// Feed raw serial chunks with [`extend`](Self::extend), then drain frames
/// with [`next_frame`](Self::next_frame) until it returns `Ok(None)`.
/// Errors report framing noise that has already been skipped; calling
/// `next_frame` again resumes at the next plausible header.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends raw bytes received from the serial link.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes currently buffered and not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Attempts to decode the next frame from the buffered bytes.
    ///
    /// - `Ok(Some(frame))`: a frame was parsed and consumed.
    /// - `Ok(None)`: the buffer holds no complete frame; feed more bytes.
    /// - `Err(e)`: the leading bytes were noise.  They have been discarded
    ///   up to the next `0x57`, so the caller may poll again immediately.
    pub fn next_frame(&mut self) -> Result<Option<SerialCommand>, FrameError> {
        match decode(&self.buf) {
            Ok(DecodeStep::NeedMore) => Ok(None),
            Ok(DecodeStep::Frame { command, consumed }) => {
                self.buf.drain(..consumed);
                Ok(Some(command))
            }
            Err(e) => {
                self.resync();
                Err(e)
            }
        }
    }

    /// Drops the leading byte, then everything up to the next header byte.
    fn resync(&mut self) {
        let skip = self.buf[1..]
            .iter()
            .position(|&b| b == FRAME_HEADER[0])
            .map(|pos| pos + 1)
            .unwrap_or(self.buf.len());
        self.buf.drain(..skip);
    }
}
