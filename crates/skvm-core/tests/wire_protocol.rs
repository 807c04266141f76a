//! Integration tests for the CH9329 wire protocol stack.
//!
//! These tests exercise the codec, report state, and ack tracker together
//! through the public API, the way the host application uses them: build a
//! report from input state, encode it, push the bytes through the incremental
//! decoder as if they arrived on the serial line, and match chip responses
//! back to pending commands.
//!
//! # Frame layout
//!
//! ```text
//! 0x57 0xAB ADDR CMD LEN PAYLOAD... SUM
//! ```
//!
//! `SUM` is the low byte of the sum of all preceding bytes.  The chip answers
//! each command with `CMD | 0x80` on success and `CMD | 0xC0` plus a status
//! byte on failure.

use skvm_core::domain::report::{
    scale_absolute, KeyboardReportState, MouseButtons, MouseMode, MouseReportState,
};
use skvm_core::keymap::hid::HidKeyCode;
use skvm_core::protocol::ack::{AckOutcome, AckTracker};
use skvm_core::protocol::codec::{decode, encode, DecodeStep, FrameDecoder};
use skvm_core::protocol::frame::{
    ChipInfo, CommandCode, DeviceStatus, FrameKind, SerialCommand, DEFAULT_ADDRESS,
};
use skvm_core::MediaKey;

/// Feeds `bytes` to a decoder in `chunk`-sized pieces and collects every
/// complete frame, mimicking serial reads that split frames arbitrarily.
fn drip_feed(bytes: &[u8], chunk: usize) -> Vec<SerialCommand> {
    let mut decoder = FrameDecoder::new();
    let mut frames = Vec::new();
    for piece in bytes.chunks(chunk) {
        decoder.extend(piece);
        while let Ok(Some(frame)) = decoder.next_frame() {
            frames.push(frame);
        }
    }
    frames
}

// ── Command encoding end to end ───────────────────────────────────────────────

/// A keystroke travels from report state to wire bytes and back unchanged.
#[test]
fn test_keyboard_press_survives_the_wire() {
    // Arrange
    let mut keyboard = KeyboardReportState::new();
    keyboard.press(HidKeyCode::ShiftLeft);
    keyboard.press(HidKeyCode::KeyA);

    // Act
    let bytes = encode(&keyboard.to_command());
    let DecodeStep::Frame { command, consumed } = decode(&bytes).expect("frame must decode")
    else {
        panic!("complete frame expected");
    };

    // Assert
    assert_eq!(consumed, bytes.len());
    assert_eq!(command.code, CommandCode::KeyboardReport);
    assert_eq!(command.kind, FrameKind::Command);
    assert_eq!(command.payload[0], 0x02, "left shift modifier bit");
    assert!(command.payload[2..].contains(&(HidKeyCode::KeyA as u8)));
}

/// Every command family the host sends decodes back to its original form,
/// even when the bytes arrive in tiny serial read chunks.
#[test]
fn test_full_command_set_survives_chunked_reads() {
    // Arrange
    let mut keyboard = KeyboardReportState::new();
    keyboard.press(HidKeyCode::Enter);
    let mut abs_mouse = MouseReportState::new(MouseMode::Absolute);
    abs_mouse.press_button(MouseButtons::LEFT);
    let mut rel_mouse = MouseReportState::new(MouseMode::Relative);

    let commands = vec![
        SerialCommand::get_info(),
        keyboard.to_command(),
        abs_mouse
            .absolute_report(2048, 1024, 0)
            .expect("absolute mode"),
        rel_mouse.relative_report(-5, 12, 0).expect("relative mode"),
        MediaKey::VolumeUp.press_command(),
        MediaKey::release_command(),
        SerialCommand::config_query(),
        SerialCommand::reset(),
    ];
    let mut wire = Vec::new();
    for cmd in &commands {
        wire.extend_from_slice(&encode(cmd));
    }

    // Act - three bytes per read, smaller than any frame.
    let decoded = drip_feed(&wire, 3);

    // Assert
    assert_eq!(decoded, commands);
}

/// The decoder skips line noise and locks onto the next valid header.
#[test]
fn test_decoder_recovers_from_line_noise() {
    // Arrange - garbage, a valid frame, a corrupted frame, a valid frame.
    let good = encode(&SerialCommand::get_info());
    let mut corrupted = encode(&SerialCommand::config_query());
    let last = corrupted.len() - 1;
    corrupted[last] ^= 0xFF; // bad checksum
    let mut wire = vec![0x00, 0x57, 0x12, 0xFF];
    wire.extend_from_slice(&good);
    wire.extend_from_slice(&corrupted);
    wire.extend_from_slice(&good);

    // Act
    let mut decoder = FrameDecoder::new();
    decoder.extend(&wire);
    let mut frames = Vec::new();
    loop {
        match decoder.next_frame() {
            Ok(Some(frame)) => frames.push(frame),
            Ok(None) => break,
            Err(_) => continue, // resync and keep scanning
        }
    }

    // Assert - both intact frames recovered, corrupt one dropped.
    assert_eq!(frames.len(), 2);
    assert!(frames.iter().all(|f| f.code == CommandCode::GetInfo));
}

// ── Absolute coordinate scaling ───────────────────────────────────────────────

/// Pixel coordinates scale into the chip's 4096-step absolute grid and land
/// little-endian in the payload.
#[test]
fn test_absolute_coordinates_scale_and_serialize_little_endian() {
    // Arrange - centre of a 1920x1080 capture area.
    let x = scale_absolute(960, 1920);
    let y = scale_absolute(540, 1080);
    let mut mouse = MouseReportState::new(MouseMode::Absolute);

    // Act
    let cmd = mouse.absolute_report(x, y, 0).expect("absolute mode");

    // Assert
    assert_eq!(x, 2048);
    assert_eq!(y, 2048);
    assert_eq!(cmd.payload[2..4], 2048u16.to_le_bytes());
    assert_eq!(cmd.payload[4..6], 2048u16.to_le_bytes());
}

// ── Response matching ─────────────────────────────────────────────────────────

fn response(code: CommandCode, payload: Vec<u8>) -> SerialCommand {
    SerialCommand {
        address: DEFAULT_ADDRESS,
        code,
        kind: FrameKind::Response,
        payload,
    }
}

/// Responses resolve pending commands strictly in send order.
#[test]
fn test_ack_fifo_resolves_in_send_order() {
    // Arrange
    let mut tracker = AckTracker::new();
    let first = tracker.record(CommandCode::KeyboardReport);
    let second = tracker.record(CommandCode::MouseAbsoluteReport);

    // Act / Assert
    assert_eq!(
        tracker.resolve(&response(CommandCode::KeyboardReport, vec![0x00])),
        AckOutcome::Acknowledged { sequence: first }
    );
    assert_eq!(
        tracker.resolve(&response(CommandCode::MouseAbsoluteReport, vec![0x00])),
        AckOutcome::Acknowledged { sequence: second }
    );
    assert_eq!(tracker.pending_len(), 0);
}

/// An error response surfaces the chip's status code against the pending
/// command; a response with nothing pending is flagged unsolicited.
#[test]
fn test_error_and_unsolicited_responses() {
    // Arrange
    let mut tracker = AckTracker::new();
    let sequence = tracker.record(CommandCode::KeyboardReport);
    let error = SerialCommand {
        address: DEFAULT_ADDRESS,
        code: CommandCode::KeyboardReport,
        kind: FrameKind::ErrorResponse,
        payload: vec![0xE4],
    };

    // Act / Assert
    assert_eq!(
        tracker.resolve(&error),
        AckOutcome::Rejected {
            sequence,
            status: DeviceStatus::ChecksumMismatch,
        }
    );
    assert_eq!(
        tracker.resolve(&response(CommandCode::GetInfo, vec![0x00])),
        AckOutcome::Unsolicited
    );
}

/// A `GetInfo` response decoded off the wire parses into chip information.
#[test]
fn test_get_info_response_parses_from_wire_bytes() {
    // Arrange - firmware V1.1, USB enumerated, caps lock lit.
    let reply = response(
        CommandCode::GetInfo,
        vec![0x11, 0x01, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00],
    );
    let wire = encode(&reply);

    // Act
    let frames = drip_feed(&wire, 4);
    let info = ChipInfo::parse(&frames[0].payload).expect("8-byte payload");

    // Assert
    assert_eq!(frames[0].kind, FrameKind::Response);
    assert_eq!(info.version, "V1.1");
    assert!(info.usb_enumerated);
    assert!(info.caps_lock);
    assert!(!info.num_lock);
}
