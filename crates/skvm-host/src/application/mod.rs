//! Application layer use cases for the host.
//!
//! Use cases orchestrate domain state from `skvm-core` against the
//! infrastructure traits (`SerialTransport`, `InputSource`, `FrameSource`).
//! They contain no OS calls, no serial I/O, and no device access of their
//! own, so every path here is unit-testable with mocks.
//!
//! # Sub-modules
//!
//! - **`forward_input`** - Translates raw captured input into CH9329 report
//!   frames, one frame per discrete transition, and pushes them to the
//!   transport in order.  Runs on every keystroke and mouse movement.
//!
//! - **`session`** - The session state machine: connects and tears down the
//!   serial and video collaborators, runs the forwarder while active, and
//!   publishes every state change.

pub mod forward_input;
pub mod session;
