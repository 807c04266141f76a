//! Protocol module containing the CH9329 frame types, the binary codec, and
//! acknowledgment tracking.

pub mod ack;
pub mod codec;
pub mod frame;

pub use ack::{AckTracker, SequenceCounter};
pub use codec::{encode, FrameDecoder, FrameError};
pub use frame::*;
