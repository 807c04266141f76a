//! Input capture infrastructure for the host application.
//!
//! The window shell (outside this crate) owns the OS hooks and hands raw
//! events in through a [`channel::ChannelInputSource`]; tests inject
//! synthetic events through [`mock::MockInputSource`].  Either way the
//! forwarder only sees the [`InputSource`] trait and a stream of
//! [`RawInputEvent`]s.
//!
//! Event codes are platform key codes (Windows VK or X11 KeySym, declared
//! by the shell as a `KeySpace`); translation to HID usages happens in the
//! forwarder, not here.

use tokio::sync::mpsc;

pub mod channel;
pub mod mock;

/// A raw input event produced by an input source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawInputEvent {
    /// A key was pressed down.
    KeyDown {
        /// Platform key code (interpreted per the configured key space).
        code: u32,
        /// Milliseconds since an arbitrary epoch (from the hook).
        time_ms: u32,
    },
    /// A key was released.
    KeyUp { code: u32, time_ms: u32 },
    /// The cursor moved to an absolute position in capture coordinates.
    MouseMove { x: u32, y: u32, time_ms: u32 },
    /// A mouse button was pressed.
    MouseButtonDown { button: MouseButton, time_ms: u32 },
    /// A mouse button was released.
    MouseButtonUp { button: MouseButton, time_ms: u32 },
    /// The vertical wheel was scrolled.
    MouseWheel {
        /// Scroll steps; positive = away from user.
        delta: i8,
        time_ms: u32,
    },
}

/// Mouse button identifier used in [`RawInputEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    /// Never forwarded to the target; pressing it ends the session.
    Middle,
}

/// Error type for input capture operations.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("input source has already been started")]
    AlreadyStarted,
    #[error("input source has been stopped")]
    Stopped,
    #[error("input event queue is full")]
    QueueFull,
}

/// Trait abstracting input event production.
///
/// Implementations deliver events over a bounded channel in capture order.
pub trait InputSource: Send {
    /// Starts the source and returns the receiver for captured events.
    fn start(&self) -> Result<mpsc::Receiver<RawInputEvent>, InputError>;
    /// Stops the source; the event channel closes.
    fn stop(&self);
}
