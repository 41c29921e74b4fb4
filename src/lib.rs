//! safelink - URL shortener with continuous safety classification
//!
//! Short codes resolve to target addresses; every stored address is kept
//! classified as OK, phishing or malware.
//!
//! # Architecture
//! - `storage`: short codes, records, append-only segment log, restore
//! - `safety`: whitelist, blocklist cache, remote lookup, classifier
//! - `watchdog`: recurring jobs (blocklist refresh, revalidation)
//! - `services`: shorten / resolve shared by every entry point
//! - `config`: TOML + environment configuration
//! - `runtime`: startup wiring, shutdown, execution modes
//! - `system`: logging and data directory lock

pub mod cli;
pub mod config;
pub mod errors;
pub mod runtime;
pub mod safety;
pub mod services;
pub mod storage;
pub mod system;
pub mod utils;
pub mod watchdog;
