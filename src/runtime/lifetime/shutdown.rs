use std::time::Duration;

use tokio::signal;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::watchdog::WatchdogHandle;

/// 关闭超时时间（秒）
const SHUTDOWN_TIMEOUT_SECS: u64 = 10;

/// 等待 Ctrl+C 后停止 watchdog
pub async fn listen_for_shutdown(watchdog: WatchdogHandle) {
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received, stopping watchdog...");
        }
        Err(e) => {
            warn!(
                "Failed to listen for Ctrl+C: {}. Proceeding with shutdown anyway.",
                e
            );
        }
    }

    shutdown(watchdog).await;
}

/// 停止 watchdog 并输出任务统计
pub async fn shutdown(watchdog: WatchdogHandle) {
    for (name, stats) in watchdog.stats() {
        info!(
            "Job {}: {} runs, {} failures, {} skipped",
            name, stats.runs, stats.failures, stats.skipped
        );
    }

    match timeout(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS), watchdog.stop()).await {
        Ok(()) => info!("All shutdown tasks completed successfully"),
        Err(_) => error!(
            "Watchdog did not stop within {} seconds",
            SHUTDOWN_TIMEOUT_SECS
        ),
    }
}
