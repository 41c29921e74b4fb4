use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

use super::code::{CODE_LENGTH, is_code_byte};
use crate::utils::NormalizedAddress;

/// 短码：固定长度，字符集 `A-Z a-z 0-9`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShortCode([u8; CODE_LENGTH]);

impl ShortCode {
    /// 校验并构造短码；长度或字符不合法时返回 None
    pub fn parse(s: &str) -> Option<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != CODE_LENGTH || !bytes.iter().all(|b| is_code_byte(*b)) {
            return None;
        }
        let mut buf = [0u8; CODE_LENGTH];
        buf.copy_from_slice(bytes);
        Some(Self(buf))
    }

    pub(crate) fn from_bytes(bytes: [u8; CODE_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; CODE_LENGTH] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        // 构造时已保证全部是 ASCII
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl fmt::Display for ShortCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShortCode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            format!(
                "Invalid short code: '{}'. Expected {} characters from [A-Za-z0-9]",
                s, CODE_LENGTH
            )
        })
    }
}

impl Serialize for ShortCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// 目标地址的安全状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum Health {
    Unknown = 0,
    Ok = 1,
    Phishing = 2,
    Malware = 3,
}

impl Health {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Health::Ok,
            2 => Health::Phishing,
            3 => Health::Malware,
            _ => Health::Unknown,
        }
    }

    /// PHISHING / MALWARE
    pub fn is_bad(self) -> bool {
        matches!(self, Health::Phishing | Health::Malware)
    }

    /// 批量复检只处理 OK / UNKNOWN
    pub fn needs_recheck(self) -> bool {
        matches!(self, Health::Ok | Health::Unknown)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Health::Unknown => "UNKNOWN",
            Health::Ok => "OK",
            Health::Phishing => "PHISHING",
            Health::Malware => "MALWARE",
        }
    }
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 可原子替换的状态单元
///
/// 读取方（resolve）永远不会被分类逻辑阻塞。
#[derive(Debug)]
pub struct HealthCell(AtomicU8);

impl HealthCell {
    pub fn new(health: Health) -> Self {
        Self(AtomicU8::new(health as u8))
    }

    pub fn load(&self) -> Health {
        Health::from_u8(self.0.load(Ordering::Acquire))
    }

    /// 写入新状态，返回旧状态
    pub fn store(&self, health: Health) -> Health {
        Health::from_u8(self.0.swap(health as u8, Ordering::AcqRel))
    }

    /// 条件写入：PHISHING / MALWARE 总是写入；OK / UNKNOWN 只在当前状态
    /// 仍为 OK / UNKNOWN 时写入。写入成功返回旧状态。
    pub fn upgrade(&self, health: Health) -> Option<Health> {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (health.is_bad() || Health::from_u8(current).needs_recheck())
                    .then_some(health as u8)
            })
            .ok()
            .map(Health::from_u8)
    }
}

/// 存储的目标记录
///
/// 除 health 外全部字段创建后不可变；health 只由分类器写入。
#[derive(Debug)]
pub struct TargetRecord {
    code: ShortCode,
    address: String,
    domain: String,
    health: HealthCell,
}

impl TargetRecord {
    pub fn new(code: ShortCode, normalized: NormalizedAddress) -> Self {
        Self {
            code,
            address: normalized.address,
            domain: normalized.domain,
            health: HealthCell::new(Health::Unknown),
        }
    }

    pub fn code(&self) -> ShortCode {
        self.code
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn health(&self) -> Health {
        self.health.load()
    }

    /// 返回旧状态
    pub(crate) fn set_health(&self, health: Health) -> Health {
        self.health.store(health)
    }

    /// 远程结论专用：不会把 PHISHING / MALWARE 改回 OK
    pub(crate) fn upgrade_health(&self, health: Health) -> Option<Health> {
        self.health.upgrade(health)
    }
}

impl fmt::Display for TargetRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} [{}]", self.code, self.address, self.health())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// 当前记录数
    pub records: usize,
    /// 启动时回放成功的条目数
    pub replayed: usize,
    /// 回放时跳过的条目数（重复短码或无效地址）
    pub replay_skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_code_parse() {
        assert!(ShortCode::parse("AAAAAA").is_some());
        assert!(ShortCode::parse("aZ09xy").is_some());
        assert!(ShortCode::parse("AAAAA").is_none());
        assert!(ShortCode::parse("AAAAAAA").is_none());
        assert!(ShortCode::parse("AAA-AA").is_none());
        assert_eq!(ShortCode::parse("Ab12cD").unwrap().as_str(), "Ab12cD");
    }

    #[test]
    fn test_health_cell_swap() {
        let cell = HealthCell::new(Health::Unknown);
        assert_eq!(cell.store(Health::Phishing), Health::Unknown);
        assert_eq!(cell.load(), Health::Phishing);
    }

    #[test]
    fn test_health_cell_upgrade_never_clears_bad_state() {
        let cell = HealthCell::new(Health::Unknown);
        assert_eq!(cell.upgrade(Health::Ok), Some(Health::Unknown));
        assert_eq!(cell.upgrade(Health::Malware), Some(Health::Ok));
        assert_eq!(cell.upgrade(Health::Ok), None);
        assert_eq!(cell.load(), Health::Malware);
        assert_eq!(cell.upgrade(Health::Phishing), Some(Health::Malware));
        assert_eq!(cell.load(), Health::Phishing);
    }

    #[test]
    fn test_health_flags() {
        assert!(Health::Malware.is_bad());
        assert!(!Health::Ok.is_bad());
        assert!(Health::Unknown.needs_recheck());
        assert!(!Health::Phishing.needs_recheck());
    }
}
