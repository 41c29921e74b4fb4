//! 安全分类
//!
//! - `whitelist`: 可信域名
//! - `blocklist`: 已知恶意地址/域名缓存与刷新源
//! - `remote`: 远程查询服务
//! - `classifier`: 单条与批量分类

pub mod blocklist;
pub mod classifier;
mod http;
pub mod remote;
pub mod whitelist;

pub use blocklist::{BlocklistCache, BlocklistFeed, HttpListFeed};
pub use classifier::{ClassifyReport, Classifier};
pub use remote::{
    DailyQuota, NullLookup, RemoteLookup, SafeBrowsingLookup, Verdict, build_remote_lookup,
};
pub use whitelist::WhitelistSet;
