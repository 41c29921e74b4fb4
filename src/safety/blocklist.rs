//! 已知恶意地址缓存
//!
//! 条目来自外部列表（每行一个 URL 或域名），由定时任务整体刷新。
//! 新集合在锁外构建，再通过 ArcSwap 原子替换；读取端从不阻塞。

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use tracing::{debug, info, trace, warn};

use super::http::{build_agent, run_blocking};
use crate::config::BlocklistConfig;
use crate::errors::{Result, SafelinkError};
use crate::storage::TargetRecord;
use crate::utils::normalize_address;

/// 黑名单来源
#[async_trait]
pub trait BlocklistFeed: Send + Sync {
    /// 拉取完整列表，每项为 URL 或域名
    async fn fetch(&self) -> Result<Vec<String>>;

    /// 来源名称（用于日志）
    fn name(&self) -> &'static str;
}

#[derive(Debug, Default)]
struct BlockSet {
    addresses: HashSet<String>,
    domains: HashSet<String>,
}

impl BlockSet {
    fn len(&self) -> usize {
        self.addresses.len() + self.domains.len()
    }

    fn build<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        for entry in entries {
            let entry = entry.as_ref().trim();
            if entry.is_empty() || entry.starts_with('#') {
                continue;
            }
            if entry.contains("://") {
                match normalize_address(entry) {
                    Ok(n) => {
                        set.addresses.insert(n.address);
                    }
                    Err(e) => trace!("Ignoring blocklist entry {:?}: {}", entry, e),
                }
            } else if !entry.contains(['/', ' ', '\t']) {
                set.domains
                    .insert(entry.trim_end_matches('.').to_ascii_lowercase());
            } else {
                trace!("Ignoring blocklist entry {:?}", entry);
            }
        }
        set
    }
}

/// 黑名单缓存
pub struct BlocklistCache {
    current: ArcSwap<BlockSet>,
}

impl Default for BlocklistCache {
    fn default() -> Self {
        Self::new()
    }
}

impl BlocklistCache {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(BlockSet::default()),
        }
    }

    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            current: ArcSwap::from_pointee(BlockSet::build(entries)),
        }
    }

    /// 地址或域名命中即视为封禁
    pub fn is_banned(&self, record: &TargetRecord) -> bool {
        let set = self.current.load();
        set.addresses.contains(record.address()) || set.domains.contains(record.domain())
    }

    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 用新条目整体替换，返回生效的条目数
    ///
    /// 新列表为空而旧列表非空时保留旧列表（上游异常时不清空缓存）。
    pub fn replace<I, S>(&self, entries: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fresh = BlockSet::build(entries);
        let old_len = self.len();
        if fresh.len() == 0 && old_len > 0 {
            warn!(
                "Blocklist refresh produced no entries, keeping previous {} entries",
                old_len
            );
            return old_len;
        }

        let new_len = fresh.len();
        self.current.store(Arc::new(fresh));
        info!("Blocklist updated: {} -> {} entries", old_len, new_len);
        new_len
    }

    /// 从来源拉取并替换
    pub async fn refresh(&self, feed: &dyn BlocklistFeed) -> Result<usize> {
        debug!("Refreshing blocklist from {}", feed.name());
        let entries = feed.fetch().await?;
        Ok(self.replace(entries))
    }
}

/// 纯文本 HTTP 列表源
pub struct HttpListFeed {
    url: String,
    agent: ureq::Agent,
    max_entries: usize,
}

impl HttpListFeed {
    pub fn new(url: impl Into<String>, timeout: Duration, max_entries: usize) -> Self {
        Self {
            url: url.into(),
            agent: build_agent(timeout),
            max_entries,
        }
    }

    /// 未配置 feed_url 时返回 None
    pub fn from_config(config: &BlocklistConfig) -> Option<Self> {
        let url = config.feed_url.as_deref().filter(|u| !u.trim().is_empty())?;
        Some(Self::new(
            url.trim(),
            Duration::from_secs(config.timeout_secs),
            config.max_entries,
        ))
    }

    fn fetch_sync(agent: ureq::Agent, url: String, max_entries: usize) -> Result<Vec<String>> {
        let body = agent
            .get(&url)
            .call()
            .map_err(|e| {
                SafelinkError::classification(format!("Blocklist request to {} failed: {}", url, e))
            })?
            .into_body()
            .read_to_string()
            .map_err(|e| {
                SafelinkError::classification(format!("Blocklist body from {} unreadable: {}", url, e))
            })?;

        let mut entries: Vec<String> = body
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(String::from)
            .collect();

        if entries.len() > max_entries {
            warn!(
                "Blocklist from {} has {} entries, truncating to {}",
                url,
                entries.len(),
                max_entries
            );
            entries.truncate(max_entries);
        }
        Ok(entries)
    }
}

#[async_trait]
impl BlocklistFeed for HttpListFeed {
    async fn fetch(&self) -> Result<Vec<String>> {
        let agent = self.agent.clone();
        let url = self.url.clone();
        let max_entries = self.max_entries;
        run_blocking("Blocklist fetch", move || Self::fetch_sync(agent, url, max_entries)).await
    }

    fn name(&self) -> &'static str {
        "HttpList"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ShortCode;

    fn record(address: &str) -> TargetRecord {
        let code = ShortCode::parse("AAAAAA").unwrap();
        TargetRecord::new(code, normalize_address(address).unwrap())
    }

    #[test]
    fn test_matches_address_or_domain() {
        let cache = BlocklistCache::from_entries([
            "# feed header",
            "https://Phish.example/login#x",
            "evil.test",
            "not a url/with spaces",
        ]);
        assert_eq!(cache.len(), 2);

        assert!(cache.is_banned(&record("https://phish.example/login")));
        assert!(!cache.is_banned(&record("https://phish.example/other")));
        assert!(cache.is_banned(&record("http://evil.test/anything?q=1")));
        assert!(!cache.is_banned(&record("http://sub.evil.test/")));
    }

    #[test]
    fn test_empty_refresh_keeps_previous() {
        let cache = BlocklistCache::from_entries(["evil.test"]);
        assert_eq!(cache.replace(Vec::<String>::new()), 1);
        assert!(cache.is_banned(&record("https://evil.test/")));

        assert_eq!(cache.replace(["other.test"]), 1);
        assert!(!cache.is_banned(&record("https://evil.test/")));
    }

    #[test]
    fn test_from_config_requires_url() {
        let mut config = BlocklistConfig::default();
        assert!(HttpListFeed::from_config(&config).is_none());
        config.feed_url = Some("  ".into());
        assert!(HttpListFeed::from_config(&config).is_none());
        config.feed_url = Some("https://lists.example/phish.txt".into());
        assert!(HttpListFeed::from_config(&config).is_some());
    }
}
