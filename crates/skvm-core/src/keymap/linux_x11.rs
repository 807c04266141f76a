//! X11 KeySym to HID usage translation.
//!
//! KeySyms are layout-dependent symbols, so both the lowercase and uppercase
//! Latin letters map to the same physical-position usage.  Reference:
//! X11/keysymdef.h.

use super::hid::HidKeyCode;
use crate::domain::media::MediaKey;

/// Translates an X11 KeySym to a [`HidKeyCode`].
///
/// Returns [`HidKeyCode::Unknown`] for symbols with no keyboard-page usage.
pub fn keysym_to_hid(keysym: u32) -> HidKeyCode {
    use HidKeyCode::*;
    match keysym {
        // Latin letters: XK_a..XK_z and XK_A..XK_Z land on the same keys.
        0x0061 | 0x0041 => KeyA,
        0x0062 | 0x0042 => KeyB,
        0x0063 | 0x0043 => KeyC,
        0x0064 | 0x0044 => KeyD,
        0x0065 | 0x0045 => KeyE,
        0x0066 | 0x0046 => KeyF,
        0x0067 | 0x0047 => KeyG,
        0x0068 | 0x0048 => KeyH,
        0x0069 | 0x0049 => KeyI,
        0x006A | 0x004A => KeyJ,
        0x006B | 0x004B => KeyK,
        0x006C | 0x004C => KeyL,
        0x006D | 0x004D => KeyM,
        0x006E | 0x004E => KeyN,
        0x006F | 0x004F => KeyO,
        0x0070 | 0x0050 => KeyP,
        0x0071 | 0x0051 => KeyQ,
        0x0072 | 0x0052 => KeyR,
        0x0073 | 0x0053 => KeyS,
        0x0074 | 0x0054 => KeyT,
        0x0075 | 0x0055 => KeyU,
        0x0076 | 0x0056 => KeyV,
        0x0077 | 0x0057 => KeyW,
        0x0078 | 0x0058 => KeyX,
        0x0079 | 0x0059 => KeyY,
        0x007A | 0x005A => KeyZ,

        0x0031 => Digit1,
        0x0032 => Digit2,
        0x0033 => Digit3,
        0x0034 => Digit4,
        0x0035 => Digit5,
        0x0036 => Digit6,
        0x0037 => Digit7,
        0x0038 => Digit8,
        0x0039 => Digit9,
        0x0030 => Digit0,

        0xFF0D => Enter,     // XK_Return
        0xFF1B => Escape,
        0xFF08 => Backspace, // XK_BackSpace
        0xFF09 => Tab,
        0x0020 => Space,

        0x002D => Minus,
        0x003D => Equal,
        0x005B => BracketLeft,
        0x005D => BracketRight,
        0x005C => Backslash,
        0x003B => Semicolon,
        0x0027 => Quote, // XK_apostrophe
        0x0060 => Backquote, // XK_grave
        0x002C => Comma,
        0x002E => Period,
        0x002F => Slash,

        0xFFE5 => CapsLock,

        0xFFBE => F1,
        0xFFBF => F2,
        0xFFC0 => F3,
        0xFFC1 => F4,
        0xFFC2 => F5,
        0xFFC3 => F6,
        0xFFC4 => F7,
        0xFFC5 => F8,
        0xFFC6 => F9,
        0xFFC7 => F10,
        0xFFC8 => F11,
        0xFFC9 => F12,

        0xFF61 => PrintScreen, // XK_Print
        0xFF14 => ScrollLock,
        0xFF13 => Pause,
        0xFF63 => Insert,
        0xFF50 => Home,
        0xFF55 => PageUp,
        0xFFFF => Delete,
        0xFF57 => End,
        0xFF56 => PageDown,
        0xFF53 => ArrowRight,
        0xFF51 => ArrowLeft,
        0xFF54 => ArrowDown,
        0xFF52 => ArrowUp,

        0xFF7F => NumLock,
        0xFFAF => NumpadDivide,
        0xFFAA => NumpadMultiply,
        0xFFAD => NumpadSubtract,
        0xFFAB => NumpadAdd,
        0xFF8D => NumpadEnter,
        0xFFB1 => Numpad1,
        0xFFB2 => Numpad2,
        0xFFB3 => Numpad3,
        0xFFB4 => Numpad4,
        0xFFB5 => Numpad5,
        0xFFB6 => Numpad6,
        0xFFB7 => Numpad7,
        0xFFB8 => Numpad8,
        0xFFB9 => Numpad9,
        0xFFB0 => Numpad0,
        0xFFAE => NumpadDecimal,

        0xFF67 => ContextMenu, // XK_Menu

        0xFFE3 => ControlLeft,
        0xFFE1 => ShiftLeft,
        0xFFE9 => AltLeft,
        0xFFEB => MetaLeft, // XK_Super_L
        0xFFE4 => ControlRight,
        0xFFE2 => ShiftRight,
        0xFFEA => AltRight,
        0xFFEC => MetaRight,

        _ => Unknown,
    }
}

/// Translates an XF86 media KeySym to a [`MediaKey`].
pub fn keysym_to_media(keysym: u32) -> Option<MediaKey> {
    match keysym {
        0x1008FF11 => Some(MediaKey::VolumeDown), // XF86AudioLowerVolume
        0x1008FF12 => Some(MediaKey::Mute),       // XF86AudioMute
        0x1008FF13 => Some(MediaKey::VolumeUp),   // XF86AudioRaiseVolume
        0x1008FF14 => Some(MediaKey::PlayPause),  // XF86AudioPlay
        0x1008FF15 => Some(MediaKey::CdStop),     // XF86AudioStop
        0x1008FF16 => Some(MediaKey::PrevTrack),  // XF86AudioPrev
        0x1008FF17 => Some(MediaKey::NextTrack),  // XF86AudioNext
        0x1008FF2C => Some(MediaKey::Eject),      // XF86Eject
        _ => None,
    }
}
