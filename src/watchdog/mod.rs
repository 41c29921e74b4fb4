//! 定时任务调度（watchdog）
//!
//! 单个驱动任务按节拍下发所有已注册任务：
//! - `run_on_start` 的任务在启动时立即执行一次
//! - 所有任务在 `initial_delay` 后执行，之后每隔 `interval` 执行
//! - 任务仍在运行时到期则跳过本次，不排队
//! - 任务返回错误或 panic 只记录日志，不影响其它任务和后续执行

pub mod jobs;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, warn};

use crate::errors::SafelinkError;

pub use jobs::{BlocklistRefreshJob, RevalidationJob};

/// 最小节拍，避免 interval 为 0
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// 周期任务
#[async_trait]
pub trait Job: Send + Sync {
    /// 任务名称（用于日志与统计）
    fn name(&self) -> &str;

    /// 执行一次
    async fn run(&self) -> anyhow::Result<()>;
}

/// 单个任务的运行统计
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct JobStats {
    /// 已开始的执行次数
    pub runs: u64,
    /// 返回错误或 panic 的次数
    pub failures: u64,
    /// 因上一次仍在运行而跳过的次数
    pub skipped: u64,
    pub last_finished: Option<DateTime<Utc>>,
}

struct JobSlot {
    job: Arc<dyn Job>,
    run_on_start: bool,
    running: Arc<AtomicBool>,
    stats: Arc<Mutex<JobStats>>,
}

impl JobSlot {
    /// 下发一次执行；仍在运行时记为跳过
    fn dispatch(&self, tasks: &mut JoinSet<()>) {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.stats.lock().skipped += 1;
            debug!("Job {} still running, skipping this tick", self.job.name());
            return;
        }

        self.stats.lock().runs += 1;
        let job = Arc::clone(&self.job);
        let running = Arc::clone(&self.running);
        let stats = Arc::clone(&self.stats);

        tasks.spawn(async move {
            let outcome = AssertUnwindSafe(job.run()).catch_unwind().await;
            let failed = match outcome {
                Ok(Ok(())) => {
                    debug!("Job {} finished", job.name());
                    false
                }
                Ok(Err(e)) => {
                    let err = SafelinkError::job(format!("{} failed: {:#}", job.name(), e));
                    error!("{}", err.format_simple());
                    true
                }
                Err(payload) => {
                    let err = SafelinkError::job(format!(
                        "{} panicked: {}",
                        job.name(),
                        panic_message(payload.as_ref())
                    ));
                    error!("{}", err.format_simple());
                    true
                }
            };

            {
                let mut stats = stats.lock();
                if failed {
                    stats.failures += 1;
                }
                stats.last_finished = Some(Utc::now());
            }
            running.store(false, Ordering::Release);
        });
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// 任务注册表，`start` 后转为 [`WatchdogHandle`]
#[derive(Default)]
pub struct Watchdog {
    jobs: Vec<JobSlot>,
}

impl Watchdog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册任务
    pub fn register(&mut self, job: Arc<dyn Job>, run_on_start: bool) -> &mut Self {
        debug!("Registering job {} (run_on_start={})", job.name(), run_on_start);
        self.jobs.push(JobSlot {
            job,
            run_on_start,
            running: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(Mutex::new(JobStats::default())),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// 启动驱动任务（需要在 tokio 运行时中调用）
    pub fn start(self, initial_delay: Duration, interval: Duration) -> WatchdogHandle {
        let interval = interval.max(MIN_INTERVAL);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats = self
            .jobs
            .iter()
            .map(|slot| (slot.job.name().to_string(), Arc::clone(&slot.stats)))
            .collect();

        info!(
            "Watchdog starting with {} jobs (initial delay {:?}, interval {:?})",
            self.jobs.len(),
            initial_delay,
            interval
        );

        let driver = tokio::spawn(drive(self.jobs, initial_delay, interval, shutdown_rx));

        WatchdogHandle {
            shutdown: shutdown_tx,
            driver,
            stats,
        }
    }
}

async fn drive(
    slots: Vec<JobSlot>,
    initial_delay: Duration,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut tasks = JoinSet::new();

    for slot in slots.iter().filter(|s| s.run_on_start) {
        slot.dispatch(&mut tasks);
    }

    let mut ticker = interval_at(Instant::now() + initial_delay, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for slot in &slots {
                    slot.dispatch(&mut tasks);
                }
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined
                    && !e.is_cancelled()
                {
                    warn!("Job task ended abnormally: {}", e);
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    if !tasks.is_empty() {
        debug!("Watchdog aborting {} in-flight jobs", tasks.len());
    }
    tasks.shutdown().await;
    info!("Watchdog stopped");
}

/// 运行中的 watchdog
pub struct WatchdogHandle {
    shutdown: watch::Sender<bool>,
    driver: JoinHandle<()>,
    stats: Vec<(String, Arc<Mutex<JobStats>>)>,
}

impl WatchdogHandle {
    /// 所有任务的统计快照（按注册顺序）
    pub fn stats(&self) -> Vec<(String, JobStats)> {
        self.stats
            .iter()
            .map(|(name, stats)| (name.clone(), stats.lock().clone()))
            .collect()
    }

    /// 按名称查询统计
    pub fn job_stats(&self, name: &str) -> Option<JobStats> {
        self.stats
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, stats)| stats.lock().clone())
    }

    /// 停止驱动任务并中止正在运行的任务
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.driver.await {
            warn!("Watchdog driver ended abnormally: {}", e);
        }
    }
}
