//! Input forwarding: raw captured events in, CH9329 frames out.
//!
//! The translator is a pure state machine: it owns the keyboard and mouse
//! report state and turns each raw event into at most one frame.  Discrete
//! transitions are never coalesced - ordering on the wire is exactly capture
//! ordering.  The forwarder wraps the translator in an async loop that
//! drains the input channel and pushes encoded frames to the transport,
//! blocking (never dropping) when the outbound queue is full.
//!
//! The middle mouse button is the session escape hatch: its press is never
//! forwarded to the target and instead ends forwarding.

use std::sync::{Arc, Mutex};

use skvm_core::domain::report::{
    scale_absolute, KeyboardReportState, MouseButtons, MouseMode, MouseReportState,
};
use skvm_core::keymap::{KeyMapper, KeySpace};
use skvm_core::protocol::ack::AckTracker;
use skvm_core::protocol::codec::encode;
use skvm_core::protocol::frame::SerialCommand;
use skvm_core::{HidKeyCode, MediaKey};
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::infrastructure::input_capture::{MouseButton, RawInputEvent};
use crate::infrastructure::serial::{SerialTransport, TransportError};

/// What one raw event translates to.
#[derive(Debug, PartialEq, Eq)]
pub enum Translation {
    /// Forward this frame.
    Command(SerialCommand),
    /// The user pressed the session-exit button; nothing is forwarded.
    ExitRequested,
    /// Nothing to send (no-op transition or unmappable key).
    None,
}

/// Pure translation state: capture events in, report frames out.
pub struct InputTranslator {
    key_space: KeySpace,
    keyboard: KeyboardReportState,
    mouse: MouseReportState,
    capture_width: u32,
    capture_height: u32,
    // Last cursor position in capture coordinates, for relative deltas.
    last_pos: Option<(u32, u32)>,
}

impl InputTranslator {
    pub fn new(
        key_space: KeySpace,
        mouse_mode: MouseMode,
        capture_width: u32,
        capture_height: u32,
    ) -> Self {
        Self {
            key_space,
            keyboard: KeyboardReportState::new(),
            mouse: MouseReportState::new(mouse_mode),
            capture_width,
            capture_height,
            last_pos: None,
        }
    }

    /// Translates one raw event into at most one frame.
    pub fn translate(&mut self, event: &RawInputEvent) -> Translation {
        match *event {
            RawInputEvent::KeyDown { code, .. } => self.key_transition(code, true),
            RawInputEvent::KeyUp { code, .. } => self.key_transition(code, false),
            RawInputEvent::MouseMove { x, y, .. } => self.mouse_move(x, y),
            RawInputEvent::MouseButtonDown { button, .. } => match button {
                MouseButton::Middle => Translation::ExitRequested,
                MouseButton::Left => self.button_transition(MouseButtons::LEFT, true),
                MouseButton::Right => self.button_transition(MouseButtons::RIGHT, true),
            },
            RawInputEvent::MouseButtonUp { button, .. } => match button {
                // The middle button never reaches the target, so its release
                // has nothing to undo.
                MouseButton::Middle => Translation::None,
                MouseButton::Left => self.button_transition(MouseButtons::LEFT, false),
                MouseButton::Right => self.button_transition(MouseButtons::RIGHT, false),
            },
            RawInputEvent::MouseWheel { delta, .. } => {
                Translation::Command(self.mouse.button_report(delta))
            }
        }
    }

    /// Frames that release every key and button, for leaving the session
    /// without phantom held input on the target.
    pub fn release_all(&mut self) -> Vec<SerialCommand> {
        self.keyboard.clear();
        self.mouse.release_all_buttons();
        vec![self.keyboard.to_command(), self.mouse.button_report(0)]
    }

    fn key_transition(&mut self, code: u32, down: bool) -> Translation {
        // Media keys go out as consumer-page reports and never touch the
        // keyboard report state.
        if let Some(media) = KeyMapper::to_media(self.key_space, code) {
            return Translation::Command(if down {
                media.press_command()
            } else {
                MediaKey::release_command()
            });
        }
        let key = KeyMapper::to_hid(self.key_space, code);
        if key == HidKeyCode::Unknown {
            warn!("dropping unmappable key code {code:#06X} ({:?})", self.key_space);
            return Translation::None;
        }
        let changed = if down {
            self.keyboard.press(key)
        } else {
            self.keyboard.release(key)
        };
        if !changed {
            return Translation::None;
        }
        Translation::Command(self.keyboard.to_command())
    }

    fn mouse_move(&mut self, x: u32, y: u32) -> Translation {
        let previous = self.last_pos.replace((x, y));
        match self.mouse.mode() {
            MouseMode::Absolute => {
                let dev_x = scale_absolute(x, self.capture_width);
                let dev_y = scale_absolute(y, self.capture_height);
                match self.mouse.absolute_report(dev_x, dev_y, 0) {
                    Ok(cmd) => Translation::Command(cmd),
                    Err(_) => Translation::None,
                }
            }
            MouseMode::Relative => {
                let Some((px, py)) = previous else {
                    // First position only establishes the reference point.
                    return Translation::None;
                };
                let dx = x as i32 - px as i32;
                let dy = y as i32 - py as i32;
                if dx == 0 && dy == 0 {
                    return Translation::None;
                }
                match self.mouse.relative_report(dx, dy, 0) {
                    Ok(cmd) => Translation::Command(cmd),
                    Err(_) => Translation::None,
                }
            }
        }
    }

    fn button_transition(&mut self, mask: u8, down: bool) -> Translation {
        if down {
            self.mouse.press_button(mask);
        } else {
            self.mouse.release_button(mask);
        }
        Translation::Command(self.mouse.button_report(0))
    }
}

/// Why the forwarding loop returned.
#[derive(Debug)]
pub enum ForwardOutcome {
    /// Middle button pressed; held input has been released on the target.
    ExitRequested,
    /// The input event channel closed (source stopped).
    SourceClosed,
    /// The transport rejected a frame; the session is broken.
    Transport(TransportError),
}

/// Drives an [`InputTranslator`] against a transport.
pub struct InputForwarder {
    translator: InputTranslator,
    transport: Arc<dyn SerialTransport>,
    ack: Arc<Mutex<AckTracker>>,
}

impl InputForwarder {
    pub fn new(
        translator: InputTranslator,
        transport: Arc<dyn SerialTransport>,
        ack: Arc<Mutex<AckTracker>>,
    ) -> Self {
        Self {
            translator,
            transport,
            ack,
        }
    }

    /// Consumes events until the source closes, the transport fails, or the
    /// user requests exit.  The receiver is borrowed so a suspended session
    /// can resume forwarding later without re-subscribing.
    pub async fn run(&mut self, events: &mut mpsc::Receiver<RawInputEvent>) -> ForwardOutcome {
        loop {
            let Some(event) = events.recv().await else {
                return ForwardOutcome::SourceClosed;
            };
            match self.translator.translate(&event) {
                Translation::Command(cmd) => {
                    if let Err(e) = self.dispatch(cmd).await {
                        return ForwardOutcome::Transport(e);
                    }
                }
                Translation::ExitRequested => {
                    if let Err(e) = self.flush_release().await {
                        // The exit still happens; the target may keep a
                        // stuck key until the next session clears it.
                        warn!("release-all on exit failed: {e}");
                    }
                    return ForwardOutcome::ExitRequested;
                }
                Translation::None => {}
            }
        }
    }

    /// Sends the release-everything frames immediately.
    pub async fn flush_release(&mut self) -> Result<(), TransportError> {
        for cmd in self.translator.release_all() {
            self.dispatch(cmd).await?;
        }
        Ok(())
    }

    async fn dispatch(&self, cmd: SerialCommand) -> Result<(), TransportError> {
        let sequence = self.ack.lock().map_err(|_| TransportError::Closed)?.record(cmd.code);
        trace!(sequence, code = ?cmd.code, "frame queued");
        self.transport.send(encode(&cmd)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::serial::mock::{MockTransport, SendBehavior};
    use skvm_core::protocol::codec::{decode, DecodeStep};
    use skvm_core::protocol::frame::CommandCode;

    fn absolute_translator() -> InputTranslator {
        InputTranslator::new(KeySpace::WindowsVk, MouseMode::Absolute, 1920, 1080)
    }

    fn decode_one(bytes: &[u8]) -> SerialCommand {
        match decode(bytes).expect("sent frame must decode") {
            DecodeStep::Frame { command, .. } => command,
            DecodeStep::NeedMore => panic!("incomplete frame on the wire"),
        }
    }

    fn key_down(code: u32) -> RawInputEvent {
        RawInputEvent::KeyDown { code, time_ms: 0 }
    }

    fn key_up(code: u32) -> RawInputEvent {
        RawInputEvent::KeyUp { code, time_ms: 0 }
    }

    // ── Translator: keyboard ─────────────────────────────────────────────────

    #[test]
    fn test_key_press_and_release_each_produce_one_frame() {
        let mut tr = absolute_translator();

        // VK 0x41 = 'A'
        let down = tr.translate(&key_down(0x41));
        let Translation::Command(cmd) = down else {
            panic!("press must produce a frame")
        };
        assert_eq!(cmd.code, CommandCode::KeyboardReport);
        assert_eq!(cmd.payload[2], 0x04, "HID usage for A");

        let up = tr.translate(&key_up(0x41));
        let Translation::Command(cmd) = up else {
            panic!("release must produce a frame")
        };
        assert_eq!(cmd.payload[2], 0x00, "slot cleared on release");
    }

    #[test]
    fn test_repeat_key_down_is_not_resent() {
        let mut tr = absolute_translator();
        assert!(matches!(tr.translate(&key_down(0x41)), Translation::Command(_)));
        // OS auto-repeat delivers the same key again.
        assert_eq!(tr.translate(&key_down(0x41)), Translation::None);
    }

    #[test]
    fn test_unmappable_key_is_dropped() {
        let mut tr = absolute_translator();
        // VK_KANA has no HID equivalent in the table.
        assert_eq!(tr.translate(&key_down(0x15)), Translation::None);
        // The keyboard state stays untouched.
        let Translation::Command(cmd) = tr.translate(&key_down(0x41)) else {
            panic!("mappable key must still work")
        };
        assert_eq!(cmd.payload[2], 0x04);
        assert_eq!(cmd.payload[3], 0x00);
    }

    #[test]
    fn test_modifier_updates_bitmask() {
        let mut tr = absolute_translator();
        // VK_LSHIFT
        let Translation::Command(cmd) = tr.translate(&key_down(0xA0)) else {
            panic!("modifier press must produce a frame")
        };
        assert_eq!(cmd.payload[0], 0x02, "left shift bit");
        assert_eq!(cmd.payload[2], 0x00, "no key slot used");
    }

    #[test]
    fn test_media_key_tap_produces_press_then_release_report() {
        let mut tr = absolute_translator();

        // VK_VOLUME_UP
        let Translation::Command(cmd) = tr.translate(&key_down(0xAF)) else {
            panic!("media press must produce a frame")
        };
        assert_eq!(cmd.code, CommandCode::MediaReport);
        assert_eq!(cmd.payload, [0x02, 0x01, 0x00, 0x00]);

        let Translation::Command(cmd) = tr.translate(&key_up(0xAF)) else {
            panic!("media release must produce a frame")
        };
        assert_eq!(cmd.payload, [0x02, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_media_key_leaves_keyboard_state_untouched() {
        let mut tr = absolute_translator();
        tr.translate(&key_down(0x41));

        // Volume tap while 'A' is held.
        tr.translate(&key_down(0xAF));
        tr.translate(&key_up(0xAF));

        // 'A' is still the only held key; its release clears the slot.
        let Translation::Command(cmd) = tr.translate(&key_up(0x41)) else {
            panic!("release must produce a frame")
        };
        assert_eq!(cmd.code, CommandCode::KeyboardReport);
        assert_eq!(cmd.payload, vec![0u8; 8]);
    }

    // ── Translator: mouse ────────────────────────────────────────────────────

    #[test]
    fn test_absolute_move_scales_to_device_space() {
        let mut tr = absolute_translator();
        let Translation::Command(cmd) =
            tr.translate(&RawInputEvent::MouseMove { x: 960, y: 540, time_ms: 0 })
        else {
            panic!("move must produce a frame")
        };
        assert_eq!(cmd.code, CommandCode::MouseAbsoluteReport);
        let x = u16::from_le_bytes([cmd.payload[2], cmd.payload[3]]);
        let y = u16::from_le_bytes([cmd.payload[4], cmd.payload[5]]);
        assert_eq!(x, 2048);
        assert_eq!(y, 2048);
    }

    #[test]
    fn test_relative_mode_emits_deltas() {
        let mut tr = InputTranslator::new(KeySpace::WindowsVk, MouseMode::Relative, 1920, 1080);

        // First position is only a reference point.
        assert_eq!(
            tr.translate(&RawInputEvent::MouseMove { x: 100, y: 100, time_ms: 0 }),
            Translation::None
        );

        let Translation::Command(cmd) =
            tr.translate(&RawInputEvent::MouseMove { x: 110, y: 95, time_ms: 1 })
        else {
            panic!("second move must produce a frame")
        };
        assert_eq!(cmd.code, CommandCode::MouseRelativeReport);
        assert_eq!(cmd.payload[2] as i8, 10);
        assert_eq!(cmd.payload[3] as i8, -5);
    }

    #[test]
    fn test_middle_button_requests_exit_and_is_not_forwarded() {
        let mut tr = absolute_translator();
        assert_eq!(
            tr.translate(&RawInputEvent::MouseButtonDown {
                button: MouseButton::Middle,
                time_ms: 0
            }),
            Translation::ExitRequested
        );
        assert_eq!(
            tr.translate(&RawInputEvent::MouseButtonUp {
                button: MouseButton::Middle,
                time_ms: 1
            }),
            Translation::None
        );
    }

    #[test]
    fn test_left_button_press_keeps_cursor_position() {
        let mut tr = absolute_translator();
        tr.translate(&RawInputEvent::MouseMove { x: 960, y: 540, time_ms: 0 });
        let Translation::Command(cmd) = tr.translate(&RawInputEvent::MouseButtonDown {
            button: MouseButton::Left,
            time_ms: 1,
        }) else {
            panic!("press must produce a frame")
        };
        assert_eq!(cmd.payload[1], MouseButtons::LEFT);
        let x = u16::from_le_bytes([cmd.payload[2], cmd.payload[3]]);
        assert_eq!(x, 2048, "button press must not move the cursor");
    }

    #[test]
    fn test_release_all_clears_keyboard_and_buttons() {
        let mut tr = absolute_translator();
        tr.translate(&key_down(0x41));
        tr.translate(&RawInputEvent::MouseButtonDown {
            button: MouseButton::Left,
            time_ms: 0,
        });

        let frames = tr.release_all();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].payload, vec![0u8; 8], "keyboard all-released");
        assert_eq!(frames[1].payload[1], 0x00, "buttons all-released");
    }

    // ── Forwarder ────────────────────────────────────────────────────────────

    fn forwarder(transport: Arc<MockTransport>) -> InputForwarder {
        InputForwarder::new(
            absolute_translator(),
            transport,
            Arc::new(Mutex::new(AckTracker::new())),
        )
    }

    #[tokio::test]
    async fn test_forwarder_preserves_capture_order_on_the_wire() {
        // Arrange
        let transport = Arc::new(MockTransport::new());
        let mut fwd = forwarder(Arc::clone(&transport));
        let (tx, mut rx) = mpsc::channel(16);

        // Act - a then shift then move, then close the source.
        tx.send(key_down(0x41)).await.unwrap();
        tx.send(key_down(0xA0)).await.unwrap();
        tx.send(RawInputEvent::MouseMove { x: 0, y: 0, time_ms: 2 })
            .await
            .unwrap();
        drop(tx);
        let outcome = fwd.run(&mut rx).await;

        // Assert
        assert!(matches!(outcome, ForwardOutcome::SourceClosed));
        let sent = transport.sent_frames();
        assert_eq!(sent.len(), 3, "one frame per transition");
        assert_eq!(decode_one(&sent[0]).code, CommandCode::KeyboardReport);
        assert_eq!(decode_one(&sent[1]).code, CommandCode::KeyboardReport);
        assert_eq!(decode_one(&sent[2]).code, CommandCode::MouseAbsoluteReport);
    }

    #[tokio::test]
    async fn test_forwarder_exit_releases_held_input_first() {
        // Arrange
        let transport = Arc::new(MockTransport::new());
        let mut fwd = forwarder(Arc::clone(&transport));
        let (tx, mut rx) = mpsc::channel(16);

        // Act - hold a key, then hit the exit button.
        tx.send(key_down(0x41)).await.unwrap();
        tx.send(RawInputEvent::MouseButtonDown {
            button: MouseButton::Middle,
            time_ms: 1,
        })
        .await
        .unwrap();
        let outcome = fwd.run(&mut rx).await;

        // Assert
        assert!(matches!(outcome, ForwardOutcome::ExitRequested));
        let sent = transport.sent_frames();
        // press-A, then release-all keyboard + release-all mouse.
        assert_eq!(sent.len(), 3);
        let last_kb = decode_one(&sent[1]);
        assert_eq!(last_kb.payload, vec![0u8; 8]);
    }

    #[tokio::test]
    async fn test_forwarder_surfaces_transport_failure() {
        // Arrange
        let transport = Arc::new(MockTransport::new());
        transport.set_behavior(SendBehavior::Closed);
        let mut fwd = forwarder(Arc::clone(&transport));
        let (tx, mut rx) = mpsc::channel(16);

        // Act
        tx.send(key_down(0x41)).await.unwrap();
        let outcome = fwd.run(&mut rx).await;

        // Assert
        assert!(matches!(
            outcome,
            ForwardOutcome::Transport(TransportError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_forwarder_records_pending_acks() {
        // Arrange
        let transport = Arc::new(MockTransport::new());
        let ack = Arc::new(Mutex::new(AckTracker::new()));
        let mut fwd = InputForwarder::new(
            absolute_translator(),
            Arc::clone(&transport) as Arc<dyn SerialTransport>,
            Arc::clone(&ack),
        );
        let (tx, mut rx) = mpsc::channel(16);

        // Act
        tx.send(key_down(0x41)).await.unwrap();
        drop(tx);
        fwd.run(&mut rx).await;

        // Assert
        assert_eq!(ack.lock().unwrap().pending_len(), 1);
    }
}
