//! System-level modules
//!
//! - Logging initialization
//! - Data directory lock

pub mod lockfile;
pub mod logging;

pub use lockfile::DataDirLock;
