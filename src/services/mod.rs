//! Service layer for business logic
//!
//! Shared between the CLI commands and the serve mode.

mod link_service;

pub use link_service::*;
