//! watchdog 驱动的两个任务

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::Job;
use crate::safety::{BlocklistCache, BlocklistFeed, Classifier};
use crate::storage::Store;

/// 刷新黑名单缓存
pub struct BlocklistRefreshJob {
    cache: Arc<BlocklistCache>,
    feed: Arc<dyn BlocklistFeed>,
}

impl BlocklistRefreshJob {
    pub fn new(cache: Arc<BlocklistCache>, feed: Arc<dyn BlocklistFeed>) -> Self {
        Self { cache, feed }
    }
}

#[async_trait]
impl Job for BlocklistRefreshJob {
    fn name(&self) -> &str {
        "blocklist-refresh"
    }

    async fn run(&self) -> anyhow::Result<()> {
        let entries = self.cache.refresh(self.feed.as_ref()).await?;
        info!("Blocklist refreshed from {}: {} entries", self.feed.name(), entries);
        Ok(())
    }
}

/// 批量复检所有记录
pub struct RevalidationJob {
    store: Arc<Store>,
    classifier: Arc<Classifier>,
}

impl RevalidationJob {
    pub fn new(store: Arc<Store>, classifier: Arc<Classifier>) -> Self {
        Self { store, classifier }
    }
}

#[async_trait]
impl Job for RevalidationJob {
    fn name(&self) -> &str {
        "revalidation"
    }

    async fn run(&self) -> anyhow::Result<()> {
        let records = self.store.records();
        let report = self.classifier.classify_all(&records).await;
        info!(
            "Revalidation finished: {} examined, {} whitelisted, {} blocked, {} submitted, {} updated",
            report.examined, report.whitelisted, report.blocked, report.submitted, report.updated
        );
        Ok(())
    }
}
