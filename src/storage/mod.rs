//! 存储层
//!
//! - `models`: 短码、状态与目标记录
//! - `code`: 短码编码与分配
//! - `log`: 追加式段日志
//! - `restore`: 启动时从段日志恢复
//! - `store`: 内存映射与反向索引

pub mod code;
pub mod log;
pub mod models;
pub mod restore;
pub mod store;

pub use code::{CODE_ALPHABET, CODE_LENGTH, CodeGenerator};
pub use log::{AppendLog, SegmentLog};
pub use models::{Health, ShortCode, StoreStats, TargetRecord};
pub use restore::{RestoreItem, RestoreReport};
pub use store::{Shortened, Store};
