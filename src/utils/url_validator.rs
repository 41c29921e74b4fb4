//! URL 验证与规范化模块
//!
//! - 阻止危险协议，只允许 http/https
//! - 生成反向索引和日志回放共用的规范化地址

use url::Url;

/// URL 验证错误
#[derive(Debug, PartialEq, Eq)]
pub enum UrlValidationError {
    EmptyUrl,
    InvalidProtocol(String),
    DangerousProtocol(String),
    InvalidFormat(String),
    MissingHost,
}

impl std::fmt::Display for UrlValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyUrl => write!(f, "URL cannot be empty"),
            Self::InvalidProtocol(proto) => write!(
                f,
                "Invalid protocol: {}. Only http:// and https:// are allowed",
                proto
            ),
            Self::DangerousProtocol(proto) => {
                write!(f, "Dangerous protocol blocked: {}", proto)
            }
            Self::InvalidFormat(msg) => write!(f, "Invalid URL format: {}", msg),
            Self::MissingHost => write!(f, "URL has no host"),
        }
    }
}

impl std::error::Error for UrlValidationError {}

/// 直接拒绝的 scheme（不进入解析）
const DANGEROUS_SCHEMES: &[&str] = &["javascript", "data", "file", "vbscript", "about", "blob"];

/// shorten 入口的 scheme 检查：只接受能解析的 http/https 地址
pub fn validate_url(raw: &str) -> Result<(), UrlValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(UrlValidationError::EmptyUrl);
    }

    if let Some((scheme, _)) = raw.split_once(':') {
        let scheme = scheme.to_ascii_lowercase();
        if DANGEROUS_SCHEMES.contains(&scheme.as_str()) {
            return Err(UrlValidationError::DangerousProtocol(format!("{}:", scheme)));
        }
    }

    let parsed = Url::parse(raw).map_err(|e| UrlValidationError::InvalidFormat(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(UrlValidationError::InvalidProtocol(format!("{}:", other))),
    }
}

/// 规范化后的目标地址
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedAddress {
    /// 规范化地址（纯 ASCII，可直接写入日志）
    pub address: String,
    /// 小写主机名
    pub domain: String,
}

/// 规范化目标地址
///
/// 规则：
/// - `url` crate 解析：scheme/host 小写，host 转 punycode，非 ASCII 字符百分号编码
/// - 空路径变为 `/`，因此 `https://a.com` 与 `https://a.com/` 等价
/// - 丢弃 fragment，保留 path（大小写与结尾斜杠不变）和 query
///
/// 不要求 http/https，回放日志时也走这里。
pub fn normalize_address(raw: &str) -> Result<NormalizedAddress, UrlValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(UrlValidationError::EmptyUrl);
    }

    let mut parsed =
        Url::parse(raw).map_err(|e| UrlValidationError::InvalidFormat(e.to_string()))?;

    let domain = match parsed.host_str() {
        Some(host) if !host.is_empty() => host.to_ascii_lowercase(),
        _ => return Err(UrlValidationError::MissingHost),
    };

    parsed.set_fragment(None);

    Ok(NormalizedAddress {
        address: parsed.into(),
        domain,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_gate() {
        assert!(validate_url(" HTTP://localhost:8080/x ").is_ok());
        assert_eq!(
            validate_url("JavaScript:alert(1)"),
            Err(UrlValidationError::DangerousProtocol("javascript:".into()))
        );
        assert_eq!(
            validate_url("ftp://example.com"),
            Err(UrlValidationError::InvalidProtocol("ftp:".into()))
        );
        assert_eq!(validate_url("   "), Err(UrlValidationError::EmptyUrl));
    }

    #[test]
    fn test_normalize_case_and_fragment() {
        let n = normalize_address("HTTPS://Example.COM/Path?q=1#section").unwrap();
        assert_eq!(n.address, "https://example.com/Path?q=1");
        assert_eq!(n.domain, "example.com");
    }

    #[test]
    fn test_normalize_empty_path_gets_slash() {
        let a = normalize_address("https://example.com").unwrap();
        let b = normalize_address("https://example.com/").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_normalize_keeps_path_trailing_slash() {
        let a = normalize_address("https://example.com/x").unwrap();
        let b = normalize_address("https://example.com/x/").unwrap();
        assert_ne!(a.address, b.address);
    }

    #[test]
    fn test_normalize_non_ascii_becomes_ascii() {
        let n = normalize_address("https://bücher.example/straße").unwrap();
        assert!(n.address.is_ascii());
        assert_eq!(n.domain, "xn--bcher-kva.example");
    }

    #[test]
    fn test_normalize_rejects_hostless() {
        assert_eq!(
            normalize_address("mailto:someone@example.com"),
            Err(UrlValidationError::MissingHost)
        );
        assert!(matches!(
            normalize_address("not a url"),
            Err(UrlValidationError::InvalidFormat(_))
        ));
    }
}
