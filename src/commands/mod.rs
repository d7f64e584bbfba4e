//! CLI command implementations for herakles-dht-exporter.
//!
//! - `read`: Sample the sensor and print the readings
//! - `config`: Configuration file generation

pub mod config;
pub mod read;

// Re-export command functions
pub use config::command_config;
pub use read::command_read;
