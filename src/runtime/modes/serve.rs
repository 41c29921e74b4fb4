//! Serve mode
//!
//! Restores the store, starts the watchdog and blocks until shutdown.
//! Request routing sits outside this crate; embedders build their own
//! handlers on `StartupContext::link_service`.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::StaticConfig;
use crate::runtime::lifetime;
use crate::system::DataDirLock;

/// Run serve mode
pub async fn run_serve(config: &StaticConfig) -> Result<()> {
    let _lock = DataDirLock::acquire(&config.storage.data_dir)
        .context("Failed to lock data directory")?;

    let ctx = lifetime::startup::prepare_startup(config)?;

    let watchdog = lifetime::startup::build_watchdog(&ctx).start(
        Duration::from_secs(config.watchdog.initial_delay_secs),
        Duration::from_secs(config.watchdog.interval_secs),
    );

    info!(
        "safelink {} serving {} records (Ctrl+C to stop)",
        env!("CARGO_PKG_VERSION"),
        ctx.store.len()
    );

    lifetime::shutdown::listen_for_shutdown(watchdog).await;
    Ok(())
}
