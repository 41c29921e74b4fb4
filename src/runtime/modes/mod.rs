//! Mode routing
//!
//! - Serve mode (default): restore, run the watchdog, wait for Ctrl+C
//! - CLI mode: one-shot commands against the data directory

#[cfg(feature = "cli")]
pub mod cli;
pub mod serve;

#[cfg(feature = "cli")]
pub use cli::run_cli;
pub use serve::run_serve;
