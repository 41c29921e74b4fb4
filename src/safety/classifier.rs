//! 健康分类
//!
//! 判定顺序：白名单 → 黑名单 → 远程查询。远程失败只记录日志，
//! 记录保持原状态；没有新信号时状态不会回退。

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use super::blocklist::BlocklistCache;
use super::remote::RemoteLookup;
use super::whitelist::WhitelistSet;
use crate::errors::SafelinkError;
use crate::storage::{Health, TargetRecord};

/// 本地判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LocalOutcome {
    Whitelisted,
    Blocked,
    Undecided,
}

/// 一次批量复检的统计
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifyReport {
    /// 参与复检的记录数（OK / UNKNOWN）
    pub examined: usize,
    pub whitelisted: usize,
    pub blocked: usize,
    /// 提交给远程查询的记录数
    pub submitted: usize,
    /// 因远程结论而改变状态的记录数
    pub updated: usize,
}

pub struct Classifier {
    whitelist: Arc<WhitelistSet>,
    blocklist: Arc<BlocklistCache>,
    remote: Arc<dyn RemoteLookup>,
    remote_timeout: Duration,
}

impl Classifier {
    pub fn new(
        whitelist: Arc<WhitelistSet>,
        blocklist: Arc<BlocklistCache>,
        remote: Arc<dyn RemoteLookup>,
        remote_timeout: Duration,
    ) -> Self {
        Self {
            whitelist,
            blocklist,
            remote,
            remote_timeout,
        }
    }

    pub fn blocklist(&self) -> &Arc<BlocklistCache> {
        &self.blocklist
    }

    fn classify_local(&self, record: &TargetRecord) -> LocalOutcome {
        if self.whitelist.contains(record.domain()) {
            record.set_health(Health::Ok);
            return LocalOutcome::Whitelisted;
        }

        if self.blocklist.is_banned(record) {
            if record.set_health(Health::Phishing) != Health::Phishing {
                info!("Caught phishing: {}", record);
            }
            return LocalOutcome::Blocked;
        }

        LocalOutcome::Undecided
    }

    /// 应用远程结论，返回状态是否改变
    ///
    /// CLEAN 只是缺少信号：在途期间被标记的记录不会被改回 OK。
    fn apply_remote(&self, record: &TargetRecord, health: Health) -> bool {
        match record.upgrade_health(health) {
            Some(old) if old != health => {
                if health.is_bad() {
                    info!("Remote lookup flagged {} as {}", record, health);
                } else {
                    debug!("Remote lookup marked {} ({} -> {})", record, old, health);
                }
                true
            }
            Some(_) => false,
            None => {
                debug!("Keeping {} despite clean remote verdict", record);
                false
            }
        }
    }

    /// 分类单条记录，返回分类后的状态
    pub async fn classify(&self, record: &TargetRecord, allow_remote: bool) -> Health {
        if self.classify_local(record) != LocalOutcome::Undecided {
            return record.health();
        }

        if !allow_remote || !self.remote.can_use() {
            trace!("Skipping remote lookup for {}", record);
            return record.health();
        }

        match timeout(self.remote_timeout, self.remote.lookup(record.address())).await {
            Ok(Ok(verdict)) => {
                self.apply_remote(record, verdict.health());
            }
            Ok(Err(e)) => warn!("{} ({})", e.format_simple(), record.code()),
            Err(_) => {
                let e = SafelinkError::classification(format!(
                    "Remote lookup timed out after {:?}",
                    self.remote_timeout
                ));
                warn!("{} ({})", e.format_simple(), record.code());
            }
        }

        record.health()
    }

    /// 批量复检
    ///
    /// 本地判定同步完成；仍为 OK / UNKNOWN 且未在白名单中的记录
    /// 合并为一次远程请求。
    pub async fn classify_all(&self, records: &[Arc<TargetRecord>]) -> ClassifyReport {
        let mut report = ClassifyReport::default();
        let mut pending: Vec<&Arc<TargetRecord>> = Vec::new();
        let use_remote = self.remote.can_use();

        for record in records {
            if !record.health().needs_recheck() {
                continue;
            }
            report.examined += 1;

            match self.classify_local(record) {
                LocalOutcome::Whitelisted => report.whitelisted += 1,
                LocalOutcome::Blocked => report.blocked += 1,
                LocalOutcome::Undecided if use_remote => pending.push(record),
                LocalOutcome::Undecided => {}
            }
        }

        if pending.is_empty() {
            debug!("Batch classification: nothing to submit remotely");
            return report;
        }

        let addresses: Vec<String> = pending.iter().map(|r| r.address().to_string()).collect();
        report.submitted = addresses.len();

        let outcome = timeout(self.remote_timeout, self.remote.lookup_batch(&addresses)).await;
        let verdicts = match outcome {
            Ok(Ok(verdicts)) if verdicts.len() == pending.len() => verdicts,
            Ok(Ok(verdicts)) => {
                let e = SafelinkError::classification(format!(
                    "Remote batch returned {} verdicts for {} addresses",
                    verdicts.len(),
                    pending.len()
                ));
                warn!("{}", e.format_simple());
                return report;
            }
            Ok(Err(e)) => {
                warn!("{}", e.format_simple());
                return report;
            }
            Err(_) => {
                let e = SafelinkError::classification(format!(
                    "Remote batch lookup timed out after {:?}",
                    self.remote_timeout
                ));
                warn!("{}", e.format_simple());
                return report;
            }
        };

        for (record, verdict) in pending.into_iter().zip(verdicts) {
            if self.apply_remote(record, verdict.health()) {
                report.updated += 1;
            }
        }

        report
    }

    /// 在后台任务中分类（shorten 路径不等待远程结果）
    ///
    /// 当前线程没有 tokio 运行时时不分类，返回 None；记录留给下一次批量复检。
    pub fn spawn_classify(
        self: &Arc<Self>,
        record: Arc<TargetRecord>,
    ) -> Option<JoinHandle<Health>> {
        let Ok(runtime) = Handle::try_current() else {
            warn!(
                "No async runtime available, {} waits for the next revalidation",
                record
            );
            return None;
        };
        let classifier = Arc::clone(self);
        Some(runtime.spawn(async move { classifier.classify(&record, true).await }))
    }
}
