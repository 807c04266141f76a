//! # skvm-core
//!
//! Shared library for serial-kvm containing the CH9329 serial protocol codec,
//! HID report state, acknowledgment tracking, and key translation tables.
//!
//! This crate is used by the host application and by its test suites.
//! It has zero dependencies on OS APIs, serial ports, or capture devices.
//!
//! # Architecture overview
//!
//! serial-kvm is a hardware KVM console: the machine it runs on (the
//! controller) drives a second machine (the target) through a CH9329
//! USB-HID-emulation module on a serial link, while the target's display
//! comes back through a UVC HDMI capture device.  The target sees a plain
//! USB keyboard and mouse; no software runs on it.
//!
//! This crate is the pure foundation.  It defines:
//!
//! - **`protocol`** - How bytes travel over the serial link.  CH9329 command
//!   frames (`[0x57, 0xAB, addr, cmd, len, payload.., checksum]`) are encoded
//!   from typed [`SerialCommand`] values and decoded back incrementally,
//!   resynchronizing on corrupt input.
//!
//! - **`domain`** - The HID report state: which keys and buttons are
//!   currently held, and how that state serializes into the fixed-length
//!   CH9329 report payloads.
//!
//! - **`keymap`** - Translation tables from platform key codes (Windows VK,
//!   X11 KeySyms) to the canonical representation the CH9329 consumes:
//!   USB HID Usage IDs.

pub mod domain;
pub mod keymap;
pub mod protocol;

pub use domain::media::MediaKey;
pub use domain::report::{
    KeyboardReportState, MouseButtons, MouseMode, MouseModeError, MouseReportState,
    MAX_PRESSED_KEYS,
};
pub use keymap::hid::HidKeyCode;
pub use protocol::codec::{encode, FrameDecoder, FrameError};
pub use protocol::frame::{CommandCode, FrameKind, SerialCommand};
