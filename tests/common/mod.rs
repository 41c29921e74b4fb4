//! Shared helpers for integration tests
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use safelink::errors::{Result, SafelinkError};
use safelink::safety::{RemoteLookup, Verdict};
use safelink::storage::{AppendLog, ShortCode, Store};

/// 内存日志；可切换为写入失败
#[derive(Default)]
pub struct MemoryLog {
    pub lines: Mutex<Vec<(ShortCode, String)>>,
    pub fail: AtomicBool,
}

impl MemoryLog {
    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl AppendLog for MemoryLog {
    fn append(&self, code: &ShortCode, address: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SafelinkError::persistence("simulated write failure"));
        }
        self.lines.lock().push((*code, address.to_string()));
        Ok(())
    }
}

pub fn memory_store() -> (Arc<Store>, Arc<MemoryLog>) {
    let log = Arc::new(MemoryLog::default());
    (Arc::new(Store::new(Vec::new(), log.clone())), log)
}

/// 可编程的远程查询
pub struct MockRemote {
    pub verdict: Mutex<Verdict>,
    pub usable: AtomicBool,
    pub fail: AtomicBool,
    pub delay: Option<Duration>,
    pub single_calls: AtomicUsize,
    pub batch_calls: AtomicUsize,
    pub batch_sizes: Mutex<Vec<usize>>,
}

impl MockRemote {
    pub fn returning(verdict: Verdict) -> Self {
        Self {
            verdict: Mutex::new(verdict),
            usable: AtomicBool::new(true),
            fail: AtomicBool::new(false),
            delay: None,
            single_calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
            batch_sizes: Mutex::new(Vec::new()),
        }
    }

    pub fn slow(verdict: Verdict, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::returning(verdict)
        }
    }

    pub fn single_calls(&self) -> usize {
        self.single_calls.load(Ordering::SeqCst)
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    async fn respond(&self) -> Result<Verdict> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(SafelinkError::classification("simulated transport failure"));
        }
        Ok(*self.verdict.lock())
    }
}

#[async_trait]
impl RemoteLookup for MockRemote {
    fn can_use(&self) -> bool {
        self.usable.load(Ordering::SeqCst)
    }

    async fn lookup(&self, _address: &str) -> Result<Verdict> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        self.respond().await
    }

    async fn lookup_batch(&self, addresses: &[String]) -> Result<Vec<Verdict>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.batch_sizes.lock().push(addresses.len());
        let verdict = self.respond().await?;
        Ok(vec![verdict; addresses.len()])
    }

    fn name(&self) -> &'static str {
        "Mock"
    }
}
