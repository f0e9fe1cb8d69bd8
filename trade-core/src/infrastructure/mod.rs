//! Infrastructure layer: I/O and external integrations.

pub mod config;
pub mod logging;
pub mod storage;
pub mod transport;
pub mod wallet;
