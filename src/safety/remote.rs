//! 远程恶意地址查询
//!
//! - `NullLookup`: 未配置 API Key 时使用，始终不可用
//! - `SafeBrowsingLookup`: Google Safe Browsing v4 `threatMatches:find`，带每日配额
//!
//! 启动时由 [`build_remote_lookup`] 根据配置选择实现。

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use super::http::{build_agent, run_blocking};
use crate::config::RemoteLookupConfig;
use crate::errors::{Result, SafelinkError};
use crate::storage::Health;

/// 远程查询结论
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Clean,
    Phishing,
    Malware,
}

impl Verdict {
    pub fn health(self) -> Health {
        match self {
            Verdict::Clean => Health::Ok,
            Verdict::Phishing => Health::Phishing,
            Verdict::Malware => Health::Malware,
        }
    }

    fn severity(self) -> u8 {
        match self {
            Verdict::Clean => 0,
            Verdict::Phishing => 1,
            Verdict::Malware => 2,
        }
    }
}

/// 远程查询 trait
#[async_trait]
pub trait RemoteLookup: Send + Sync {
    /// 是否可用（已配置且还有配额）
    fn can_use(&self) -> bool;

    /// 查询单个地址
    async fn lookup(&self, address: &str) -> Result<Verdict>;

    /// 一次请求查询多个地址，结果与输入一一对应
    async fn lookup_batch(&self, addresses: &[String]) -> Result<Vec<Verdict>>;

    /// 实现名称（用于日志）
    fn name(&self) -> &'static str;
}

/// 禁用的远程查询
pub struct NullLookup;

#[async_trait]
impl RemoteLookup for NullLookup {
    fn can_use(&self) -> bool {
        false
    }

    async fn lookup(&self, _address: &str) -> Result<Verdict> {
        Err(SafelinkError::classification("Remote lookup is disabled"))
    }

    async fn lookup_batch(&self, _addresses: &[String]) -> Result<Vec<Verdict>> {
        Err(SafelinkError::classification("Remote lookup is disabled"))
    }

    fn name(&self) -> &'static str {
        "Null"
    }
}

/// 每日请求配额（UTC 自然日重置）
pub struct DailyQuota {
    limit: u64,
    used: AtomicU64,
    /// 自 1970-01-01 起的天数
    day: AtomicI64,
}

fn today() -> i64 {
    Utc::now().timestamp().div_euclid(86_400)
}

impl DailyQuota {
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            used: AtomicU64::new(0),
            day: AtomicI64::new(today()),
        }
    }

    fn roll_day(&self) {
        let now = today();
        let previous = self.day.load(Ordering::Acquire);
        if now != previous
            && self
                .day
                .compare_exchange(previous, now, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            self.used.store(0, Ordering::Release);
            debug!("Remote lookup quota reset for new day");
        }
    }

    pub fn remaining(&self) -> u64 {
        self.roll_day();
        self.limit.saturating_sub(self.used.load(Ordering::Acquire))
    }

    /// 占用一次配额；配额耗尽时返回 false
    pub fn try_acquire(&self) -> bool {
        self.roll_day();
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                (used < self.limit).then_some(used + 1)
            })
            .is_ok()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FindRequest<'a> {
    client: ClientInfo<'a>,
    threat_info: ThreatInfo<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientInfo<'a> {
    client_id: &'a str,
    client_version: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ThreatInfo<'a> {
    threat_types: &'static [&'static str],
    platform_types: &'static [&'static str],
    threat_entry_types: &'static [&'static str],
    threat_entries: Vec<ThreatEntry<'a>>,
}

#[derive(Serialize)]
struct ThreatEntry<'a> {
    url: &'a str,
}

#[derive(Deserialize, Default)]
struct FindResponse {
    #[serde(default)]
    matches: Vec<ThreatMatch>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreatMatch {
    threat_type: String,
    threat: MatchedEntry,
}

#[derive(Deserialize)]
struct MatchedEntry {
    url: String,
}

const THREAT_TYPES: &[&str] = &[
    "MALWARE",
    "SOCIAL_ENGINEERING",
    "UNWANTED_SOFTWARE",
    "POTENTIALLY_HARMFUL_APPLICATION",
];

fn verdict_for_threat(threat_type: &str) -> Verdict {
    match threat_type {
        "SOCIAL_ENGINEERING" => Verdict::Phishing,
        _ => Verdict::Malware,
    }
}

/// 将匹配结果映射回输入顺序；未匹配的地址为 Clean
fn collect_verdicts(addresses: &[String], response: FindResponse) -> Vec<Verdict> {
    let mut found: HashMap<String, Verdict> = HashMap::new();
    for m in response.matches {
        let verdict = verdict_for_threat(&m.threat_type);
        found
            .entry(m.threat.url)
            .and_modify(|v| {
                if verdict.severity() > v.severity() {
                    *v = verdict;
                }
            })
            .or_insert(verdict);
    }

    addresses
        .iter()
        .map(|a| found.get(a).copied().unwrap_or(Verdict::Clean))
        .collect()
}

/// Google Safe Browsing v4 查询
pub struct SafeBrowsingLookup {
    agent: ureq::Agent,
    endpoint: String,
    api_key: String,
    client_id: String,
    client_version: String,
    quota: DailyQuota,
}

impl SafeBrowsingLookup {
    pub fn new(config: &RemoteLookupConfig, api_key: &str) -> Self {
        Self {
            agent: build_agent(Duration::from_secs(config.timeout_secs.max(1))),
            endpoint: config.endpoint.clone(),
            api_key: api_key.to_string(),
            client_id: config.client_id.clone(),
            client_version: config.client_version.clone(),
            quota: DailyQuota::new(config.daily_quota),
        }
    }

    fn request_body(&self, addresses: &[String]) -> Result<serde_json::Value> {
        let request = FindRequest {
            client: ClientInfo {
                client_id: &self.client_id,
                client_version: &self.client_version,
            },
            threat_info: ThreatInfo {
                threat_types: THREAT_TYPES,
                platform_types: &["ANY_PLATFORM"],
                threat_entry_types: &["URL"],
                threat_entries: addresses.iter().map(|a| ThreatEntry { url: a }).collect(),
            },
        };
        Ok(serde_json::to_value(&request)?)
    }

    async fn find(&self, addresses: &[String]) -> Result<Vec<Verdict>> {
        if addresses.is_empty() {
            return Ok(Vec::new());
        }
        if !self.quota.try_acquire() {
            return Err(SafelinkError::classification(
                "Safe Browsing daily quota exhausted",
            ));
        }

        let body = self.request_body(addresses)?;
        let agent = self.agent.clone();
        let url = format!("{}?key={}", self.endpoint, self.api_key);
        let endpoint = self.endpoint.clone();

        let response = run_blocking("Safe Browsing lookup", move || {
            agent
                .post(&url)
                .send_json(&body)
                .map_err(|e| {
                    SafelinkError::classification(format!(
                        "Safe Browsing request to {} failed: {}",
                        endpoint, e
                    ))
                })?
                .into_body()
                .read_json::<FindResponse>()
                .map_err(|e| {
                    SafelinkError::classification(format!(
                        "Safe Browsing response from {} unreadable: {}",
                        endpoint, e
                    ))
                })
        })
        .await?;

        trace!(
            "Safe Browsing: {} addresses, {} matches",
            addresses.len(),
            response.matches.len()
        );
        Ok(collect_verdicts(addresses, response))
    }
}

#[async_trait]
impl RemoteLookup for SafeBrowsingLookup {
    fn can_use(&self) -> bool {
        self.quota.remaining() > 0
    }

    async fn lookup(&self, address: &str) -> Result<Verdict> {
        let verdicts = self.find(&[address.to_string()]).await?;
        Ok(verdicts.first().copied().unwrap_or(Verdict::Clean))
    }

    async fn lookup_batch(&self, addresses: &[String]) -> Result<Vec<Verdict>> {
        self.find(addresses).await
    }

    fn name(&self) -> &'static str {
        "SafeBrowsing"
    }
}

/// 根据配置选择远程查询实现
pub fn build_remote_lookup(config: &RemoteLookupConfig) -> Arc<dyn RemoteLookup> {
    let lookup: Arc<dyn RemoteLookup> = match config.api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => Arc::new(SafeBrowsingLookup::new(config, key)),
        _ => {
            debug!("No remote lookup API key configured");
            Arc::new(NullLookup)
        }
    };
    info!("Remote lookup: Initialized with {} provider", lookup.name());
    lookup
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_exhausts() {
        let quota = DailyQuota::new(2);
        assert!(quota.try_acquire());
        assert!(quota.try_acquire());
        assert!(!quota.try_acquire());
        assert_eq!(quota.remaining(), 0);
    }

    #[test]
    fn test_collect_verdicts_keeps_order_and_worst_match() {
        let addresses = vec![
            "https://a.test/".to_string(),
            "https://b.test/".to_string(),
            "https://c.test/".to_string(),
        ];
        let response: FindResponse = serde_json::from_str(
            r#"{"matches":[
                {"threatType":"SOCIAL_ENGINEERING","threat":{"url":"https://c.test/"}},
                {"threatType":"SOCIAL_ENGINEERING","threat":{"url":"https://a.test/"}},
                {"threatType":"MALWARE","threat":{"url":"https://a.test/"}}
            ]}"#,
        )
        .unwrap();

        assert_eq!(
            collect_verdicts(&addresses, response),
            vec![Verdict::Malware, Verdict::Clean, Verdict::Phishing]
        );
    }

    #[test]
    fn test_empty_response_is_clean() {
        let response: FindResponse = serde_json::from_str("{}").unwrap();
        let addresses = vec!["https://a.test/".to_string()];
        assert_eq!(collect_verdicts(&addresses, response), vec![Verdict::Clean]);
    }

    #[test]
    fn test_build_without_key_is_null() {
        let lookup = build_remote_lookup(&RemoteLookupConfig::default());
        assert_eq!(lookup.name(), "Null");
        assert!(!lookup.can_use());
    }

    #[test]
    fn test_request_body_shape() {
        let config = RemoteLookupConfig::default();
        let lookup = SafeBrowsingLookup::new(&config, "key");
        let body = lookup
            .request_body(&["https://a.test/".to_string()])
            .unwrap();
        assert_eq!(body["threatInfo"]["threatEntries"][0]["url"], "https://a.test/");
        assert_eq!(body["client"]["clientId"], config.client_id.as_str());
    }
}
