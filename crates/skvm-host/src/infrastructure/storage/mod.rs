//! File-system storage for the host application.

pub mod config;
