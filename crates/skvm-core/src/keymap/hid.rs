//! USB HID Usage IDs (page 0x07, Keyboard/Keypad page).
//!
//! The CH9329 keyboard report consumes raw usage bytes from this page, so
//! HID is the canonical key representation everywhere in serial-kvm.
//! Platform codes (Windows VK, X11 KeySyms) are translated to HID at the
//! capture boundary and never appear past the translator.
//!
//! Reference: USB HID Usage Tables 1.3, Section 10.  Usage IDs identify
//! physical key positions, not characters: 0x04 is "the key labelled A on a
//! US layout", whatever the target's layout prints for it.  Modifier keys
//! occupy 0xE0..=0xE7 and map onto the report's modifier bitmask rather
//! than a key slot.

use serde::{Deserialize, Serialize};

/// USB HID Usage ID for keyboard keys (page 0x07).
///
/// The numeric value of each variant is its usage id.  [`HidKeyCode::Unknown`]
/// (0x00) marks a key with no mapping; the translator drops such events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum HidKeyCode {
    Unknown = 0x00,

    // Letters (0x04..=0x1D)
    KeyA = 0x04,
    KeyB = 0x05,
    KeyC = 0x06,
    KeyD = 0x07,
    KeyE = 0x08,
    KeyF = 0x09,
    KeyG = 0x0A,
    KeyH = 0x0B,
    KeyI = 0x0C,
    KeyJ = 0x0D,
    KeyK = 0x0E,
    KeyL = 0x0F,
    KeyM = 0x10,
    KeyN = 0x11,
    KeyO = 0x12,
    KeyP = 0x13,
    KeyQ = 0x14,
    KeyR = 0x15,
    KeyS = 0x16,
    KeyT = 0x17,
    KeyU = 0x18,
    KeyV = 0x19,
    KeyW = 0x1A,
    KeyX = 0x1B,
    KeyY = 0x1C,
    KeyZ = 0x1D,

    // Digit row (0x1E..=0x27)
    Digit1 = 0x1E,
    Digit2 = 0x1F,
    Digit3 = 0x20,
    Digit4 = 0x21,
    Digit5 = 0x22,
    Digit6 = 0x23,
    Digit7 = 0x24,
    Digit8 = 0x25,
    Digit9 = 0x26,
    Digit0 = 0x27,

    // Control and punctuation (0x28..=0x38)
    Enter = 0x28,
    Escape = 0x29,
    Backspace = 0x2A,
    Tab = 0x2B,
    Space = 0x2C,
    Minus = 0x2D,
    Equal = 0x2E,
    BracketLeft = 0x2F,
    BracketRight = 0x30,
    Backslash = 0x31,
    Semicolon = 0x33,
    Quote = 0x34,
    Backquote = 0x35,
    Comma = 0x36,
    Period = 0x37,
    Slash = 0x38,

    CapsLock = 0x39,

    // Function keys (0x3A..=0x45)
    F1 = 0x3A,
    F2 = 0x3B,
    F3 = 0x3C,
    F4 = 0x3D,
    F5 = 0x3E,
    F6 = 0x3F,
    F7 = 0x40,
    F8 = 0x41,
    F9 = 0x42,
    F10 = 0x43,
    F11 = 0x44,
    F12 = 0x45,

    // Navigation cluster (0x46..=0x52)
    PrintScreen = 0x46,
    ScrollLock = 0x47,
    Pause = 0x48,
    Insert = 0x49,
    Home = 0x4A,
    PageUp = 0x4B,
    Delete = 0x4C,
    End = 0x4D,
    PageDown = 0x4E,
    ArrowRight = 0x4F,
    ArrowLeft = 0x50,
    ArrowDown = 0x51,
    ArrowUp = 0x52,

    // Numpad (0x53..=0x63)
    NumLock = 0x53,
    NumpadDivide = 0x54,
    NumpadMultiply = 0x55,
    NumpadSubtract = 0x56,
    NumpadAdd = 0x57,
    NumpadEnter = 0x58,
    Numpad1 = 0x59,
    Numpad2 = 0x5A,
    Numpad3 = 0x5B,
    Numpad4 = 0x5C,
    Numpad5 = 0x5D,
    Numpad6 = 0x5E,
    Numpad7 = 0x5F,
    Numpad8 = 0x60,
    Numpad9 = 0x61,
    Numpad0 = 0x62,
    NumpadDecimal = 0x63,

    ContextMenu = 0x65,

    // Modifiers (0xE0..=0xE7); these set bitmask bits, not key slots.
    ControlLeft = 0xE0,
    ShiftLeft = 0xE1,
    AltLeft = 0xE2,
    MetaLeft = 0xE3,
    ControlRight = 0xE4,
    ShiftRight = 0xE5,
    AltRight = 0xE6,
    MetaRight = 0xE7,
}

impl HidKeyCode {
    /// The raw usage byte as it appears in a CH9329 keyboard report slot.
    pub fn usage(self) -> u8 {
        self as u8
    }

    /// For modifier keys (0xE0..=0xE7), the bit this key occupies in the
    /// report's modifier bitmask.  `None` for ordinary keys.
    pub fn modifier_bit(self) -> Option<u8> {
        let usage = self.usage();
        if (0xE0..=0xE7).contains(&usage) {
            Some(1 << (usage - 0xE0))
        } else {
            None
        }
    }

    /// Whether this is one of the eight modifier keys.
    pub fn is_modifier(self) -> bool {
        self.modifier_bit().is_some()
    }
}
