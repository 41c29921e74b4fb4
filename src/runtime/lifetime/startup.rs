use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::config::StaticConfig;
use crate::safety::{
    BlocklistCache, BlocklistFeed, Classifier, HttpListFeed, WhitelistSet, build_remote_lookup,
};
use crate::services::LinkService;
use crate::storage::Store;
use crate::watchdog::{BlocklistRefreshJob, RevalidationJob, Watchdog};

/// 启动后共享的组件
pub struct StartupContext {
    pub store: Arc<Store>,
    pub classifier: Arc<Classifier>,
    pub link_service: Arc<LinkService>,
    /// 未配置黑名单源时为 None
    pub blocklist_feed: Option<Arc<dyn BlocklistFeed>>,
}

/// 构建分类器（白名单、黑名单缓存、远程查询）
pub fn build_classifier(config: &StaticConfig) -> Result<Classifier> {
    let whitelist = match config.safety.whitelist_path.as_deref() {
        Some(path) if !path.is_empty() => {
            WhitelistSet::load(path).context("Failed to load whitelist")?
        }
        _ => {
            debug!("No whitelist configured");
            WhitelistSet::empty()
        }
    };

    let remote = build_remote_lookup(&config.safety.remote);
    Ok(Classifier::new(
        Arc::new(whitelist),
        Arc::new(BlocklistCache::new()),
        remote,
        Duration::from_secs(config.safety.remote.timeout_secs.max(1)),
    ))
}

/// 恢复存储并组装服务
pub fn prepare_startup(config: &StaticConfig) -> Result<StartupContext> {
    let start_time = std::time::Instant::now();
    debug!("Starting pre-startup processing...");

    let classifier = Arc::new(build_classifier(config)?);
    let store = Arc::new(Store::open(&config.storage));
    let link_service = Arc::new(LinkService::new(Arc::clone(&store), Arc::clone(&classifier)));

    let blocklist_feed = HttpListFeed::from_config(&config.safety.blocklist)
        .map(|feed| Arc::new(feed) as Arc<dyn BlocklistFeed>);
    if blocklist_feed.is_none() {
        warn!("No blocklist feed configured, blocklist stays empty");
    }

    info!(
        "Startup prepared in {:?}: {} records in {}",
        start_time.elapsed(),
        store.len(),
        config.storage.data_dir
    );

    Ok(StartupContext {
        store,
        classifier,
        link_service,
        blocklist_feed,
    })
}

/// 注册定时任务：黑名单刷新（启动即执行）与批量复检（仅周期执行）
pub fn build_watchdog(ctx: &StartupContext) -> Watchdog {
    let mut watchdog = Watchdog::new();

    if let Some(feed) = &ctx.blocklist_feed {
        watchdog.register(
            Arc::new(BlocklistRefreshJob::new(
                Arc::clone(ctx.classifier.blocklist()),
                Arc::clone(feed),
            )),
            true,
        );
    }

    watchdog.register(
        Arc::new(RevalidationJob::new(
            Arc::clone(&ctx.store),
            Arc::clone(&ctx.classifier),
        )),
        false,
    );

    watchdog
}
