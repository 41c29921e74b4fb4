//! 启动恢复
//!
//! 读取数据目录下所有段文件，解析 `<code>,<address>` 行。
//! 单个坏行或坏文件只记录日志并跳过，不影响其它段和启动流程。

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, trace, warn};

use super::code::CODE_LENGTH;
use super::log::SEPARATOR;
use super::models::ShortCode;
use crate::errors::SafelinkError;

/// 恢复出的单条记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreItem {
    pub code: ShortCode,
    pub address: String,
}

/// 加载统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    pub files_read: usize,
    pub files_failed: usize,
    pub lines_ok: usize,
    pub lines_skipped: usize,
}

/// 解析单行（不含换行符）
pub fn parse_line(line: &[u8]) -> Result<RestoreItem, SafelinkError> {
    if !line.is_ascii() {
        return Err(SafelinkError::recovery_read("line contains non-ASCII bytes"));
    }
    if line.len() < CODE_LENGTH + 2 {
        return Err(SafelinkError::recovery_read(format!(
            "line too short ({} bytes)",
            line.len()
        )));
    }
    if line[CODE_LENGTH] != SEPARATOR {
        return Err(SafelinkError::recovery_read(format!(
            "expected separator '{}' at column {}",
            SEPARATOR as char, CODE_LENGTH
        )));
    }

    // 上面已检查 ASCII，以下转换不会失败
    let text = std::str::from_utf8(line)
        .map_err(|e| SafelinkError::recovery_read(e.to_string()))?;
    let code = ShortCode::parse(&text[..CODE_LENGTH]).ok_or_else(|| {
        SafelinkError::recovery_read(format!("invalid short code '{}'", &text[..CODE_LENGTH]))
    })?;
    let address = text[CODE_LENGTH + 1..].trim();
    if address.is_empty() {
        return Err(SafelinkError::recovery_read("empty address"));
    }

    Ok(RestoreItem {
        code,
        address: address.to_string(),
    })
}

/// 读取单个段文件
///
/// 读到一半出错时保留已读出的条目，放弃该文件剩余部分。
/// 文件末尾没有换行的残行视为写入中断，跳过。
fn read_segment(path: &Path, items: &mut Vec<RestoreItem>, report: &mut RestoreReport) {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            error!("Error reading restore file {}: {}", path.display(), e);
            report.files_failed += 1;
            return;
        }
    };

    trace!("Reading from restore file: {}", path.display());
    let mut reader = BufReader::new(file);
    let mut buf = Vec::with_capacity(256);
    let mut line_no = 0usize;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                line_no += 1;
                if buf.last() != Some(&b'\n') {
                    warn!(
                        "{}:{}: unterminated trailing line, treating as torn write",
                        path.display(),
                        line_no
                    );
                    report.lines_skipped += 1;
                    break;
                }
                buf.pop();
                if buf.last() == Some(&b'\r') {
                    buf.pop();
                }
                if buf.is_empty() {
                    continue;
                }

                match parse_line(&buf) {
                    Ok(item) => {
                        items.push(item);
                        report.lines_ok += 1;
                    }
                    Err(e) => {
                        warn!("{}:{}: skipping malformed line: {}", path.display(), line_no, e);
                        report.lines_skipped += 1;
                    }
                }
            }
            Err(e) => {
                error!(
                    "Error reading restore file {} after line {}: {}",
                    path.display(),
                    line_no,
                    e
                );
                report.files_failed += 1;
                return;
            }
        }
    }

    report.files_read += 1;
}

/// 列出目录下的普通文件（跳过 `.` 开头的隐藏文件，如锁文件），按文件名排序
fn list_segments(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() == std::io::ErrorKind::NotFound {
                info!("Restore directory {} does not exist, starting empty", dir.display());
            } else {
                error!("Cannot list restore directory {}: {}", dir.display(), e);
            }
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.path()),
            Err(e) => {
                warn!("Skipping unreadable directory entry: {}", e);
                None
            }
        })
        .filter(|path| path.is_file())
        .filter(|path| {
            !path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'))
        })
        .collect();
    files.sort();
    files
}

/// 从目录加载所有记录
///
/// 目录不存在或为空时返回空列表（不是错误）。
pub fn load<P: AsRef<Path>>(dir: P) -> Vec<RestoreItem> {
    load_with_report(dir).0
}

/// 同 [`load`]，额外返回统计
pub fn load_with_report<P: AsRef<Path>>(dir: P) -> (Vec<RestoreItem>, RestoreReport) {
    let dir = dir.as_ref();
    let files = list_segments(dir);
    let mut items = Vec::new();
    let mut report = RestoreReport::default();

    if files.is_empty() {
        return (items, report);
    }

    debug!("Found {} restore files in {}", files.len(), dir.display());

    for path in &files {
        read_segment(path, &mut items, &mut report);
    }

    info!(
        "Restore finished: {} entries from {} files ({} lines skipped, {} files failed)",
        report.lines_ok, report.files_read, report.lines_skipped, report.files_failed
    );

    (items, report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_ok() {
        let item = parse_line(b"AAAAAB,https://example.com/x").unwrap();
        assert_eq!(item.code.as_str(), "AAAAAB");
        assert_eq!(item.address, "https://example.com/x");
    }

    #[test]
    fn test_parse_line_rejects_malformed() {
        assert!(parse_line(b"").is_err());
        assert!(parse_line(b"AAAAAB,").is_err());
        assert!(parse_line(b"AAAAAB;https://a.com/").is_err());
        assert!(parse_line(b"AAA-AB,https://a.com/").is_err());
        assert!(parse_line(b"AAAAA,https://a.com/").is_err());
        assert!(parse_line("AAAAAB,https://ä.com/".as_bytes()).is_err());
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let items = load("/definitely/not/a/real/dir/for/safelink");
        assert!(items.is_empty());
    }
}
