//! 配置
//!
//! TOML 文件 + `SAFELINK__*` 环境变量，启动时加载一次，
//! 由 [`init_config`] 返回共享的 `Arc`。

mod r#impl;
mod structs;

pub use r#impl::init_config;
pub use structs::*;
