//! 短码存储
//!
//! 内存中的权威映射 `ShortCode → TargetRecord`，由追加日志持久化。
//! - 正向表与反向索引都是 DashMap（分片锁，不相关 key 的读写互不阻塞）
//! - shorten 持有反向索引条目完成 分配 → 写日志 → 插入，保证同一地址幂等
//! - 日志写入失败时不插入任何内容

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info, warn};

use super::code::CodeGenerator;
use super::log::{AppendLog, SegmentLog};
use super::models::{ShortCode, StoreStats, TargetRecord};
use super::restore::{self, RestoreItem};
use crate::config::StorageConfig;
use crate::errors::{Result, SafelinkError};
use crate::utils::normalize_address;

/// shorten 的结果
#[derive(Debug, Clone)]
pub struct Shortened {
    pub record: Arc<TargetRecord>,
    /// 本次调用是否新建了记录
    pub created: bool,
}

impl Shortened {
    pub fn code(&self) -> ShortCode {
        self.record.code()
    }
}

pub struct Store {
    records: DashMap<ShortCode, Arc<TargetRecord>>,
    /// 规范化地址 → 记录
    by_address: DashMap<String, Arc<TargetRecord>>,
    codes: CodeGenerator,
    log: Arc<dyn AppendLog>,
    replayed: usize,
    replay_skipped: usize,
}

impl Store {
    /// 用恢复出的条目构造存储
    ///
    /// 回放不写日志；计数器种子为所有出现过的最大码值 + 1。
    pub fn new(items: Vec<RestoreItem>, log: Arc<dyn AppendLog>) -> Self {
        let codes = CodeGenerator::seeded_past(items.iter().map(|item| &item.code));
        let mut store = Self {
            records: DashMap::with_capacity(items.len()),
            by_address: DashMap::with_capacity(items.len()),
            codes,
            log,
            replayed: 0,
            replay_skipped: 0,
        };

        for item in items {
            store.replay(item);
        }

        info!(
            "Store ready: {} records replayed, {} skipped, next code #{}",
            store.replayed,
            store.replay_skipped,
            store.codes.peek()
        );
        store
    }

    /// 从配置的数据目录恢复并打开新日志段
    pub fn open(config: &StorageConfig) -> Self {
        let items = restore::load(&config.data_dir);
        Self::new(items, Arc::new(SegmentLog::from_config(config)))
    }

    fn replay(&mut self, item: RestoreItem) {
        let normalized = match normalize_address(&item.address) {
            Ok(n) => n,
            Err(e) => {
                warn!("Skipping restored {}: {}", item.code, e);
                self.replay_skipped += 1;
                return;
            }
        };

        if self.records.contains_key(&item.code) {
            warn!("Duplicate code {} in log, keeping first entry", item.code);
            self.replay_skipped += 1;
            return;
        }

        let record = Arc::new(TargetRecord::new(item.code, normalized));
        self.by_address
            .entry(record.address().to_string())
            .or_insert_with(|| Arc::clone(&record));
        self.records.insert(item.code, record);
        self.replayed += 1;
    }

    /// 缩短地址，返回短码
    pub fn shorten(&self, address: &str) -> Result<ShortCode> {
        self.shorten_record(address).map(|s| s.code())
    }

    /// 缩短地址，返回记录以及是否新建
    pub fn shorten_record(&self, address: &str) -> Result<Shortened> {
        let normalized = normalize_address(address)
            .map_err(|e| SafelinkError::validation(format!("{}: {}", e, address.trim())))?;

        match self.by_address.entry(normalized.address.clone()) {
            Entry::Occupied(existing) => {
                let record = Arc::clone(existing.get());
                debug!("Address already shortened as {}", record.code());
                Ok(Shortened {
                    record,
                    created: false,
                })
            }
            Entry::Vacant(slot) => {
                let code = self.codes.allocate()?;
                self.log.append(&code, &normalized.address)?;

                let record = Arc::new(TargetRecord::new(code, normalized));
                self.records.insert(code, Arc::clone(&record));
                slot.insert(Arc::clone(&record));

                info!("Shortened {} as {}", record.address(), code);
                Ok(Shortened {
                    record,
                    created: true,
                })
            }
        }
    }

    /// 查找短码
    pub fn resolve(&self, code: &ShortCode) -> Option<Arc<TargetRecord>> {
        self.records.get(code).map(|r| Arc::clone(r.value()))
    }

    /// 按字符串查找；长度或字符不合法时直接返回 None
    pub fn resolve_str(&self, code: &str) -> Option<Arc<TargetRecord>> {
        ShortCode::parse(code).and_then(|c| self.resolve(&c))
    }

    /// 按地址查找已有记录（地址先规范化）
    pub fn find_by_address(&self, address: &str) -> Option<Arc<TargetRecord>> {
        let normalized = normalize_address(address).ok()?;
        self.by_address
            .get(&normalized.address)
            .map(|r| Arc::clone(r.value()))
    }

    /// 所有记录的快照（用于批量复检）
    pub fn records(&self) -> Vec<Arc<TargetRecord>> {
        self.records.iter().map(|r| Arc::clone(r.value())).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            records: self.records.len(),
            replayed: self.replayed,
            replay_skipped: self.replay_skipped,
        }
    }
}
