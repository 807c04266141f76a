//! Infrastructure layer for the host application.
//!
//! Contains hardware-facing adapters: the CH9329 serial transport, input
//! capture sources, the UVC video capture pipeline, and file-system
//! configuration storage.
//!
//! **Dependency rule**: this layer may depend on `application` and `skvm_core`,
//! but MUST NOT be imported by the `application` or domain layers except
//! through the traits defined here.

pub mod input_capture;
pub mod serial;
pub mod storage;
pub mod video;
