// Library module for sitesync
// Re-exports modules for use in integration tests and the binary

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod remote;
pub mod sync;
