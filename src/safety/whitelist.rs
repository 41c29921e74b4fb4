//! 可信域名白名单
//!
//! 文本文件，每行一个域名；空行与 `#` 开头的行忽略。启动时加载一次。

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::errors::{Result, SafelinkError};

#[derive(Debug, Default, Clone)]
pub struct WhitelistSet {
    domains: HashSet<String>,
}

/// 规范化单个条目：去空白、小写、去掉末尾的 `.`
fn normalize_entry(line: &str) -> Option<String> {
    let entry = line.trim();
    if entry.is_empty() || entry.starts_with('#') {
        return None;
    }
    Some(entry.trim_end_matches('.').to_ascii_lowercase())
}

impl WhitelistSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let domains = entries
            .into_iter()
            .filter_map(|line| normalize_entry(line.as_ref()))
            .inspect(|domain| debug!("Adding {} to whitelist", domain))
            .collect();
        Self { domains }
    }

    /// 从文件加载
    ///
    /// 文件不存在时返回空白名单并记录警告；其它读取错误返回 `FileOperation`。
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let set = Self::from_entries(content.lines());
                info!("Whitelist loaded: {} domains from {}", set.len(), path.display());
                Ok(set)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Whitelist file {} not found, whitelist is empty", path.display());
                Ok(Self::empty())
            }
            Err(e) => Err(SafelinkError::file_operation(format!(
                "Can't read whitelist file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// 精确匹配域名（不含子域名）
    pub fn contains(&self, domain: &str) -> bool {
        self.domains.contains(domain)
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_entries_skips_comments_and_blanks() {
        let set = WhitelistSet::from_entries(["# trusted", "", "  Example.COM  ", "docs.rs."]);
        assert_eq!(set.len(), 2);
        assert!(set.contains("example.com"));
        assert!(set.contains("docs.rs"));
        assert!(!set.contains("sub.example.com"));
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let set = WhitelistSet::load("/no/such/whitelist/file").unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "#comment\ngithub.com\n\nrust-lang.org").unwrap();
        let set = WhitelistSet::load(file.path()).unwrap();
        assert!(set.contains("github.com"));
        assert!(set.contains("rust-lang.org"));
        assert_eq!(set.len(), 2);
    }
}
