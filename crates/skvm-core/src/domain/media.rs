//! Consumer-control (media) keys.
//!
//! The CH9329 carries media keys in a separate report from the keyboard: a
//! 4-byte payload `[0x02, mask, 0x00, 0x00]` where the mask selects the key.
//! The chip latches the mask until an all-zero mask releases it, so a tap is
//! always a press frame followed by a release frame.

use serde::{Deserialize, Serialize};

use crate::protocol::frame::{CommandCode, SerialCommand};

/// Report-id byte that prefixes every media report payload.
const MEDIA_GROUP: u8 = 0x02;

/// Consumer-control keys the CH9329 can inject, as mask bits in the first
/// payload byte of a media report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum MediaKey {
    VolumeUp = 0x01,
    VolumeDown = 0x02,
    Mute = 0x04,
    PlayPause = 0x08,
    NextTrack = 0x10,
    PrevTrack = 0x20,
    CdStop = 0x40,
    Eject = 0x80,
}

impl MediaKey {
    /// The mask bit this key occupies in the report payload.
    pub fn mask(self) -> u8 {
        self as u8
    }

    /// The media report that presses this key.
    pub fn press_command(self) -> SerialCommand {
        SerialCommand::new(
            CommandCode::MediaReport,
            vec![MEDIA_GROUP, self.mask(), 0x00, 0x00],
        )
    }

    /// The media report that releases all media keys.
    pub fn release_command() -> SerialCommand {
        SerialCommand::new(CommandCode::MediaReport, vec![MEDIA_GROUP, 0x00, 0x00, 0x00])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codec::encode;

    #[test]
    fn test_press_payload_carries_key_mask() {
        let cmd = MediaKey::VolumeUp.press_command();
        assert_eq!(cmd.code, CommandCode::MediaReport);
        assert_eq!(cmd.payload, [0x02, 0x01, 0x00, 0x00]);

        let cmd = MediaKey::Eject.press_command();
        assert_eq!(cmd.payload, [0x02, 0x80, 0x00, 0x00]);
    }

    #[test]
    fn test_release_frame_matches_chip_reference() {
        // The documented all-released media packet.
        let bytes = encode(&MediaKey::release_command());
        assert_eq!(
            bytes,
            [0x57, 0xAB, 0x00, 0x03, 0x04, 0x02, 0x00, 0x00, 0x00, 0x0B]
        );
    }

    #[test]
    fn test_masks_are_distinct_bits() {
        let keys = [
            MediaKey::VolumeUp,
            MediaKey::VolumeDown,
            MediaKey::Mute,
            MediaKey::PlayPause,
            MediaKey::NextTrack,
            MediaKey::PrevTrack,
            MediaKey::CdStop,
            MediaKey::Eject,
        ];
        let mut seen = 0u8;
        for key in keys {
            assert_eq!(key.mask().count_ones(), 1);
            assert_eq!(seen & key.mask(), 0, "mask bit reused");
            seen |= key.mask();
        }
        assert_eq!(seen, 0xFF);
    }
}
