//! 外部 HTTP 调用的公共部分（ureq 同步调用，放在 spawn_blocking 中执行）

use std::time::Duration;

use ureq::Agent;

use crate::errors::{Result, SafelinkError};

/// 创建带全局超时的 Agent
pub(crate) fn build_agent(timeout: Duration) -> Agent {
    Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

/// 在阻塞线程池中执行同步请求
pub(crate) async fn run_blocking<T, F>(what: &'static str, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SafelinkError::classification(format!("{} task failed: {}", what, e)))?
}
