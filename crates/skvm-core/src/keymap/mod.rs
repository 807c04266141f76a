//! Key code translation tables for platform input events.
//!
//! The canonical representation is USB HID Usage IDs (page 0x07), which the
//! CH9329 keyboard report consumes directly.  The shell that captures input
//! tells the translator which key space its raw codes live in.

pub mod hid;
pub mod linux_x11;
pub mod windows_vk;

use serde::{Deserialize, Serialize};

use crate::domain::media::MediaKey;

pub use hid::HidKeyCode;

/// The key space raw input event codes are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySpace {
    /// Windows Virtual-Key codes (low byte of `wParam` from the hook).
    WindowsVk,
    /// X11 KeySym values.
    X11Keysym,
    /// Already-translated HID usage bytes; passed through unchanged.
    HidUsage,
}

/// Unified key mapper dispatching on the configured [`KeySpace`].
pub struct KeyMapper;

impl KeyMapper {
    /// Translates a raw platform key code to a [`HidKeyCode`].
    ///
    /// Returns [`HidKeyCode::Unknown`] if no mapping exists.
    pub fn to_hid(space: KeySpace, code: u32) -> HidKeyCode {
        match space {
            KeySpace::WindowsVk => {
                if code > u8::MAX as u32 {
                    return HidKeyCode::Unknown;
                }
                windows_vk::vk_to_hid(code as u8)
            }
            KeySpace::X11Keysym => linux_x11::keysym_to_hid(code),
            KeySpace::HidUsage => hid_from_usage(code),
        }
    }

    /// Translates a raw platform key code to a consumer-control [`MediaKey`].
    ///
    /// Media keys live on the HID consumer page, so they never appear in
    /// [`to_hid`]'s keyboard-page output.  The `HidUsage` space carries
    /// keyboard-page bytes only and has no media mapping.
    ///
    /// [`to_hid`]: KeyMapper::to_hid
    pub fn to_media(space: KeySpace, code: u32) -> Option<MediaKey> {
        match space {
            KeySpace::WindowsVk => {
                if code > u8::MAX as u32 {
                    return None;
                }
                windows_vk::vk_to_media(code as u8)
            }
            KeySpace::X11Keysym => linux_x11::keysym_to_media(code),
            KeySpace::HidUsage => None,
        }
    }
}

/// Maps a raw usage byte back onto the enum, for shells that pre-translate.
fn hid_from_usage(code: u32) -> HidKeyCode {
    use HidKeyCode::*;
    const TABLE: &[HidKeyCode] = &[
        KeyA, KeyB, KeyC, KeyD, KeyE, KeyF, KeyG, KeyH, KeyI, KeyJ, KeyK, KeyL, KeyM, KeyN, KeyO,
        KeyP, KeyQ, KeyR, KeyS, KeyT, KeyU, KeyV, KeyW, KeyX, KeyY, KeyZ, Digit1, Digit2, Digit3,
        Digit4, Digit5, Digit6, Digit7, Digit8, Digit9, Digit0, Enter, Escape, Backspace, Tab,
        Space, Minus, Equal, BracketLeft, BracketRight, Backslash, Semicolon, Quote, Backquote,
        Comma, Period, Slash, CapsLock, F1, F2, F3, F4, F5, F6, F7, F8, F9, F10, F11, F12,
        PrintScreen, ScrollLock, Pause, Insert, Home, PageUp, Delete, End, PageDown, ArrowRight,
        ArrowLeft, ArrowDown, ArrowUp, NumLock, NumpadDivide, NumpadMultiply, NumpadSubtract,
        NumpadAdd, NumpadEnter, Numpad1, Numpad2, Numpad3, Numpad4, Numpad5, Numpad6, Numpad7,
        Numpad8, Numpad9, Numpad0, NumpadDecimal, ContextMenu, ControlLeft, ShiftLeft, AltLeft,
        MetaLeft, ControlRight, ShiftRight, AltRight, MetaRight,
    ];
    TABLE
        .iter()
        .copied()
        .find(|k| k.usage() as u32 == code)
        .unwrap_or(Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapper_dispatches_per_key_space() {
        assert_eq!(KeyMapper::to_hid(KeySpace::WindowsVk, 0x41), HidKeyCode::KeyA);
        assert_eq!(KeyMapper::to_hid(KeySpace::X11Keysym, 0x0061), HidKeyCode::KeyA);
        assert_eq!(KeyMapper::to_hid(KeySpace::HidUsage, 0x04), HidKeyCode::KeyA);
    }

    #[test]
    fn test_oversized_vk_is_unknown() {
        assert_eq!(KeyMapper::to_hid(KeySpace::WindowsVk, 0x1234), HidKeyCode::Unknown);
    }

    #[test]
    fn test_media_keys_resolve_per_key_space() {
        assert_eq!(
            KeyMapper::to_media(KeySpace::WindowsVk, 0xAF),
            Some(MediaKey::VolumeUp)
        );
        assert_eq!(
            KeyMapper::to_media(KeySpace::X11Keysym, 0x1008FF13),
            Some(MediaKey::VolumeUp)
        );
        assert_eq!(KeyMapper::to_media(KeySpace::HidUsage, 0xAF), None);
    }

    #[test]
    fn test_hid_usage_round_trips_through_table() {
        for usage in [0x04u32, 0x28, 0x52, 0xE0, 0xE7] {
            let key = KeyMapper::to_hid(KeySpace::HidUsage, usage);
            assert_eq!(key.usage() as u32, usage);
        }
    }
}
