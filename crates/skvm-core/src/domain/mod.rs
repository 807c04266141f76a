//! Pure domain state with no OS or I/O dependencies.

pub mod media;
pub mod report;

pub use media::MediaKey;
pub use report::{KeyboardReportState, MouseButtons, MouseMode, MouseReportState};
