//! Windows Virtual-Key code to HID usage translation.
//!
//! Capture-direction only: the host turns hook events into HID usages; the
//! reverse direction never occurs (the CH9329 is the only consumer).
//!
//! Reference: Winuser.h VK_* constants.

use super::hid::HidKeyCode;
use crate::domain::media::MediaKey;

/// Translates a Windows Virtual-Key code to a [`HidKeyCode`].
///
/// Returns [`HidKeyCode::Unknown`] when the VK has no HID equivalent
/// (e.g. IME and browser keys).
pub fn vk_to_hid(vk: u8) -> HidKeyCode {
    use HidKeyCode::*;
    match vk {
        // Letters: VK 0x41..=0x5A is 'A'..='Z'
        0x41 => KeyA,
        0x42 => KeyB,
        0x43 => KeyC,
        0x44 => KeyD,
        0x45 => KeyE,
        0x46 => KeyF,
        0x47 => KeyG,
        0x48 => KeyH,
        0x49 => KeyI,
        0x4A => KeyJ,
        0x4B => KeyK,
        0x4C => KeyL,
        0x4D => KeyM,
        0x4E => KeyN,
        0x4F => KeyO,
        0x50 => KeyP,
        0x51 => KeyQ,
        0x52 => KeyR,
        0x53 => KeyS,
        0x54 => KeyT,
        0x55 => KeyU,
        0x56 => KeyV,
        0x57 => KeyW,
        0x58 => KeyX,
        0x59 => KeyY,
        0x5A => KeyZ,

        // Digit row: VK 0x30..=0x39 is '0'..='9'
        0x31 => Digit1,
        0x32 => Digit2,
        0x33 => Digit3,
        0x34 => Digit4,
        0x35 => Digit5,
        0x36 => Digit6,
        0x37 => Digit7,
        0x38 => Digit8,
        0x39 => Digit9,
        0x30 => Digit0,

        0x0D => Enter,
        0x1B => Escape,
        0x08 => Backspace,
        0x09 => Tab,
        0x20 => Space,

        // OEM punctuation (US layout positions)
        0xBD => Minus,        // VK_OEM_MINUS
        0xBB => Equal,        // VK_OEM_PLUS
        0xDB => BracketLeft,  // VK_OEM_4
        0xDD => BracketRight, // VK_OEM_6
        0xDC => Backslash,    // VK_OEM_5
        0xBA => Semicolon,    // VK_OEM_1
        0xDE => Quote,        // VK_OEM_7
        0xC0 => Backquote,    // VK_OEM_3
        0xBC => Comma,        // VK_OEM_COMMA
        0xBE => Period,       // VK_OEM_PERIOD
        0xBF => Slash,        // VK_OEM_2

        0x14 => CapsLock,

        0x70 => F1,
        0x71 => F2,
        0x72 => F3,
        0x73 => F4,
        0x74 => F5,
        0x75 => F6,
        0x76 => F7,
        0x77 => F8,
        0x78 => F9,
        0x79 => F10,
        0x7A => F11,
        0x7B => F12,

        0x2C => PrintScreen, // VK_SNAPSHOT
        0x91 => ScrollLock,
        0x13 => Pause,
        0x2D => Insert,
        0x24 => Home,
        0x21 => PageUp, // VK_PRIOR
        0x2E => Delete,
        0x23 => End,
        0x22 => PageDown, // VK_NEXT
        0x27 => ArrowRight,
        0x25 => ArrowLeft,
        0x28 => ArrowDown,
        0x26 => ArrowUp,

        0x90 => NumLock,
        0x6F => NumpadDivide,
        0x6A => NumpadMultiply,
        0x6D => NumpadSubtract,
        0x6B => NumpadAdd,
        0x61 => Numpad1,
        0x62 => Numpad2,
        0x63 => Numpad3,
        0x64 => Numpad4,
        0x65 => Numpad5,
        0x66 => Numpad6,
        0x67 => Numpad7,
        0x68 => Numpad8,
        0x69 => Numpad9,
        0x60 => Numpad0,
        0x6E => NumpadDecimal,

        0x5D => ContextMenu, // VK_APPS

        0xA2 => ControlLeft,  // VK_LCONTROL
        0xA0 => ShiftLeft,    // VK_LSHIFT
        0xA4 => AltLeft,      // VK_LMENU
        0x5B => MetaLeft,     // VK_LWIN
        0xA3 => ControlRight, // VK_RCONTROL
        0xA1 => ShiftRight,   // VK_RSHIFT
        0xA5 => AltRight,     // VK_RMENU
        0x5C => MetaRight,    // VK_RWIN

        _ => Unknown,
    }
}

/// Translates a media Virtual-Key code to a [`MediaKey`].
///
/// These keys live on the HID consumer page, not the keyboard page, so they
/// go out as media reports instead of keyboard reports.
pub fn vk_to_media(vk: u8) -> Option<MediaKey> {
    match vk {
        0xAD => Some(MediaKey::Mute),       // VK_VOLUME_MUTE
        0xAE => Some(MediaKey::VolumeDown), // VK_VOLUME_DOWN
        0xAF => Some(MediaKey::VolumeUp),   // VK_VOLUME_UP
        0xB0 => Some(MediaKey::NextTrack),  // VK_MEDIA_NEXT_TRACK
        0xB1 => Some(MediaKey::PrevTrack),  // VK_MEDIA_PREV_TRACK
        0xB2 => Some(MediaKey::CdStop),     // VK_MEDIA_STOP
        0xB3 => Some(MediaKey::PlayPause),  // VK_MEDIA_PLAY_PAUSE
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letters_and_digits() {
        assert_eq!(vk_to_hid(0x41), HidKeyCode::KeyA);
        assert_eq!(vk_to_hid(0x5A), HidKeyCode::KeyZ);
        assert_eq!(vk_to_hid(0x30), HidKeyCode::Digit0);
        assert_eq!(vk_to_hid(0x31), HidKeyCode::Digit1);
    }

    #[test]
    fn test_side_specific_modifiers() {
        assert_eq!(vk_to_hid(0xA0), HidKeyCode::ShiftLeft);
        assert_eq!(vk_to_hid(0xA1), HidKeyCode::ShiftRight);
        assert_eq!(vk_to_hid(0x5B), HidKeyCode::MetaLeft);
    }

    #[test]
    fn test_unmapped_vk_is_unknown() {
        // VK_KANA has no HID keyboard-page equivalent here.
        assert_eq!(vk_to_hid(0x15), HidKeyCode::Unknown);
    }

    #[test]
    fn test_media_vks_map_to_consumer_keys() {
        assert_eq!(vk_to_media(0xAD), Some(MediaKey::Mute));
        assert_eq!(vk_to_media(0xAF), Some(MediaKey::VolumeUp));
        assert_eq!(vk_to_media(0xB3), Some(MediaKey::PlayPause));
        // Media VKs never land on the keyboard page.
        assert_eq!(vk_to_hid(0xAF), HidKeyCode::Unknown);
        assert_eq!(vk_to_media(0x41), None);
    }
}
