//! HID report state: which keys and buttons the target currently sees held.
//!
//! The CH9329 is stateless between reports - each report it receives fully
//! replaces the previous keyboard or mouse state on the target.  These types
//! therefore mirror what a real keyboard's firmware keeps: the set of keys
//! currently down (boot protocol allows six plus modifiers) and the mouse
//! button mask.  Every discrete press or release produces exactly one new
//! payload; nothing here batches or coalesces transitions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::keymap::hid::HidKeyCode;
use crate::protocol::frame::{
    CommandCode, SerialCommand, KEYBOARD_PAYLOAD_LEN, MOUSE_ABS_PAYLOAD_LEN, MOUSE_REL_PAYLOAD_LEN,
};

/// Boot-protocol keyboards report at most six concurrently held keys.
pub const MAX_PRESSED_KEYS: usize = 6;

/// Extent of the CH9329 absolute mouse coordinate space (0..=4095).
pub const ABSOLUTE_RANGE: u16 = 4096;

/// Current keyboard state: modifier bitmask plus up to six held usage codes.
///
/// Invariants:
/// - a usage code appears at most once (repeat press is a no-op),
/// - releasing an absent key is a no-op,
/// - key order is press order (the report slots shift left on release).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyboardReportState {
    modifiers: u8,
    keys: Vec<u8>,
}

impl KeyboardReportState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a key press and reports whether the state changed.
    ///
    /// Modifier usages (0xE0..=0xE7) set their bitmask bit instead of
    /// occupying a key slot, exactly as a boot-protocol keyboard does.
    /// When six non-modifier keys are already held, further presses are
    /// ignored (the transport has nothing meaningful to send for them).
    pub fn press(&mut self, key: HidKeyCode) -> bool {
        if let Some(bit) = key.modifier_bit() {
            if self.modifiers & bit != 0 {
                return false;
            }
            self.modifiers |= bit;
            return true;
        }
        let usage = key.usage();
        if usage == 0 || self.keys.contains(&usage) {
            return false;
        }
        if self.keys.len() == MAX_PRESSED_KEYS {
            return false;
        }
        self.keys.push(usage);
        true
    }

    /// Registers a key release and reports whether the state changed.
    pub fn release(&mut self, key: HidKeyCode) -> bool {
        if let Some(bit) = key.modifier_bit() {
            if self.modifiers & bit == 0 {
                return false;
            }
            self.modifiers &= !bit;
            return true;
        }
        let usage = key.usage();
        let Some(pos) = self.keys.iter().position(|&k| k == usage) else {
            return false;
        };
        self.keys.remove(pos);
        true
    }

    /// Releases every key and modifier.  Used when leaving the Active state
    /// so the target is never left with phantom held keys.
    pub fn clear(&mut self) -> bool {
        let changed = self.modifiers != 0 || !self.keys.is_empty();
        self.modifiers = 0;
        self.keys.clear();
        changed
    }

    /// Whether this usage code is currently held.
    pub fn is_pressed(&self, key: HidKeyCode) -> bool {
        if let Some(bit) = key.modifier_bit() {
            return self.modifiers & bit != 0;
        }
        self.keys.contains(&key.usage())
    }

    /// Number of held non-modifier keys.
    pub fn pressed_count(&self) -> usize {
        self.keys.len()
    }

    /// The current modifier bitmask (HID order: LCtrl bit 0 .. RMeta bit 7).
    pub fn modifiers(&self) -> u8 {
        self.modifiers
    }

    /// The 8-byte CH9329 keyboard payload for the current state.
    pub fn payload(&self) -> [u8; KEYBOARD_PAYLOAD_LEN] {
        let mut out = [0u8; KEYBOARD_PAYLOAD_LEN];
        out[0] = self.modifiers;
        for (slot, &usage) in out[2..].iter_mut().zip(self.keys.iter()) {
            *slot = usage;
        }
        out
    }

    /// Builds the keyboard report frame for the current state.
    pub fn to_command(&self) -> SerialCommand {
        SerialCommand::new(CommandCode::KeyboardReport, self.payload().to_vec())
    }
}

/// Mouse button bitmask as the CH9329 consumes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MouseButtons(pub u8);

impl MouseButtons {
    pub const LEFT: u8 = 0x01;
    pub const RIGHT: u8 = 0x02;
    pub const MIDDLE: u8 = 0x04;

    pub fn press(&mut self, mask: u8) {
        self.0 |= mask;
    }

    pub fn release(&mut self, mask: u8) {
        self.0 &= !mask;
    }

    pub fn release_all(&mut self) {
        self.0 = 0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Which mouse report family a session uses.  Fixed at connect time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseMode {
    /// Position reports in the chip's 0..=4095 coordinate space.
    Absolute,
    /// Signed per-report deltas, clamped to -128..=127.
    Relative,
}

/// Returned when a caller mixes absolute and relative operations.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("mouse report in {requested:?} mode but session is {active:?}")]
pub struct MouseModeError {
    pub active: MouseMode,
    pub requested: MouseMode,
}

/// Current mouse state for one session.
///
/// The mode is chosen once at construction; asking for a report of the other
/// family is an error rather than a silent mode switch, because the CH9329
/// absolute and relative reports carry incompatible coordinate meanings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MouseReportState {
    mode: MouseMode,
    buttons: MouseButtons,
    // Last absolute position, retained so button/wheel reports do not move
    // the cursor.  Unused in relative mode.
    x: u16,
    y: u16,
}

impl MouseReportState {
    pub fn new(mode: MouseMode) -> Self {
        Self {
            mode,
            buttons: MouseButtons::default(),
            x: 0,
            y: 0,
        }
    }

    pub fn mode(&self) -> MouseMode {
        self.mode
    }

    pub fn buttons(&self) -> MouseButtons {
        self.buttons
    }

    pub fn press_button(&mut self, mask: u8) {
        self.buttons.press(mask);
    }

    pub fn release_button(&mut self, mask: u8) {
        self.buttons.release(mask);
    }

    pub fn release_all_buttons(&mut self) {
        self.buttons.release_all();
    }

    /// Builds an absolute report at device coordinates, updating the stored
    /// position.  `x` and `y` are masked into the 12-bit space.
    pub fn absolute_report(
        &mut self,
        x: u16,
        y: u16,
        wheel: i8,
    ) -> Result<SerialCommand, MouseModeError> {
        if self.mode != MouseMode::Absolute {
            return Err(MouseModeError {
                active: self.mode,
                requested: MouseMode::Absolute,
            });
        }
        self.x = x.min(ABSOLUTE_RANGE - 1);
        self.y = y.min(ABSOLUTE_RANGE - 1);
        let mut payload = Vec::with_capacity(MOUSE_ABS_PAYLOAD_LEN);
        payload.push(0x02); // absolute report marker
        payload.push(self.buttons.0);
        payload.extend_from_slice(&self.x.to_le_bytes());
        payload.extend_from_slice(&self.y.to_le_bytes());
        payload.push(wheel as u8);
        Ok(SerialCommand::new(CommandCode::MouseAbsoluteReport, payload))
    }

    /// Builds a relative report, clamping deltas to the single-byte range.
    pub fn relative_report(
        &mut self,
        dx: i32,
        dy: i32,
        wheel: i8,
    ) -> Result<SerialCommand, MouseModeError> {
        if self.mode != MouseMode::Relative {
            return Err(MouseModeError {
                active: self.mode,
                requested: MouseMode::Relative,
            });
        }
        let dx = dx.clamp(-128, 127) as i8;
        let dy = dy.clamp(-128, 127) as i8;
        let payload = vec![0x01, self.buttons.0, dx as u8, dy as u8, wheel as u8];
        debug_assert_eq!(payload.len(), MOUSE_REL_PAYLOAD_LEN);
        Ok(SerialCommand::new(CommandCode::MouseRelativeReport, payload))
    }

    /// Builds a report reflecting only the current button state (no motion),
    /// in whichever mode is active.  Used for press/release and wheel events.
    pub fn button_report(&mut self, wheel: i8) -> SerialCommand {
        match self.mode {
            MouseMode::Absolute => {
                let (x, y) = (self.x, self.y);
                self.absolute_report(x, y, wheel).expect("mode is absolute")
            }
            MouseMode::Relative => self.relative_report(0, 0, wheel).expect("mode is relative"),
        }
    }
}

/// Scales a pixel coordinate into the CH9329 absolute space.
///
/// `value` is a position inside `0..extent` (the capture resolution);
/// the result lands in `0..=4095`.
pub fn scale_absolute(value: u32, extent: u32) -> u16 {
    if extent == 0 {
        return 0;
    }
    let scaled = (value as u64 * ABSOLUTE_RANGE as u64) / extent as u64;
    scaled.min(ABSOLUTE_RANGE as u64 - 1) as u16
}
