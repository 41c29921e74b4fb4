//! 追加式持久化日志
//!
//! 每行一条 `<code>,<address>\n`，纯 ASCII。日志按段文件切分：
//! 每次启动打开新段，段超过 `segment_max_bytes` 时滚动。

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, error, info};

use super::code::CODE_LENGTH;
use super::models::ShortCode;
use crate::config::StorageConfig;
use crate::errors::{Result, SafelinkError};

/// 短码与地址之间的分隔符（不在短码字母表中）
pub const SEPARATOR: u8 = b',';

/// 段文件名前缀与后缀
pub const SEGMENT_PREFIX: &str = "segment-";
pub const SEGMENT_SUFFIX: &str = ".log";

/// 持久化日志 Sink
pub trait AppendLog: Send + Sync {
    /// 追加一条记录；返回 Ok 时该行已 flush（可选 fsync）
    fn append(&self, code: &ShortCode, address: &str) -> Result<()>;
}

/// 编码一行日志
pub fn encode_line(code: &ShortCode, address: &str) -> Result<Vec<u8>> {
    if !address.is_ascii() || address.bytes().any(|b| b == b'\n' || b == b'\r') {
        return Err(SafelinkError::persistence(format!(
            "Address for {} is not a single ASCII line",
            code
        )));
    }

    let mut line = Vec::with_capacity(CODE_LENGTH + address.len() + 2);
    line.extend_from_slice(code.as_bytes());
    line.push(SEPARATOR);
    line.extend_from_slice(address.as_bytes());
    line.push(b'\n');
    Ok(line)
}

/// 当前写入的段
struct ActiveSegment {
    file: File,
    path: PathBuf,
    written: u64,
}

/// 基于段文件的追加日志
pub struct SegmentLog {
    dir: PathBuf,
    sync_on_write: bool,
    segment_max_bytes: u64,
    /// 本次启动的段名前缀（时间戳），同一进程内按 seq 递增
    session: String,
    state: Mutex<SegmentState>,
}

struct SegmentState {
    active: Option<ActiveSegment>,
    next_seq: u32,
}

impl SegmentLog {
    pub fn new<P: AsRef<Path>>(dir: P, sync_on_write: bool, segment_max_bytes: u64) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            sync_on_write,
            segment_max_bytes: segment_max_bytes.max(1),
            session: Utc::now().format("%Y%m%dT%H%M%S%3fZ").to_string(),
            state: Mutex::new(SegmentState {
                active: None,
                next_seq: 0,
            }),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(
            &config.data_dir,
            config.sync_on_write,
            config.segment_max_bytes,
        )
    }

    /// 当前段路径（尚未写入时为 None）
    pub fn active_segment(&self) -> Option<PathBuf> {
        self.state.lock().active.as_ref().map(|s| s.path.clone())
    }

    /// 打开下一个段文件；同名文件已存在（同一毫秒内多次启动）时顺延序号
    fn open_segment(&self, next_seq: &mut u32) -> Result<ActiveSegment> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            SafelinkError::persistence(format!(
                "Failed to create log directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        loop {
            let path = self.dir.join(format!(
                "{}{}-{:04}{}",
                SEGMENT_PREFIX, self.session, *next_seq, SEGMENT_SUFFIX
            ));
            *next_seq += 1;

            match OpenOptions::new().append(true).create_new(true).open(&path) {
                Ok(file) => {
                    info!("Opened log segment: {}", path.display());
                    return Ok(ActiveSegment {
                        file,
                        path,
                        written: 0,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    debug!("Segment {} exists, trying next sequence", path.display());
                }
                Err(e) => {
                    return Err(SafelinkError::persistence(format!(
                        "Failed to open log segment {}: {}",
                        path.display(),
                        e
                    )));
                }
            }
        }
    }
}

impl AppendLog for SegmentLog {
    fn append(&self, code: &ShortCode, address: &str) -> Result<()> {
        let line = encode_line(code, address)?;

        // 锁守卫在作用域结束（包括出错返回）时释放
        let mut state = self.state.lock();

        let needs_roll = state
            .active
            .as_ref()
            .is_none_or(|s| s.written >= self.segment_max_bytes);
        if needs_roll {
            let mut next_seq = state.next_seq;
            let opened = self.open_segment(&mut next_seq);
            state.next_seq = next_seq;
            state.active = Some(opened?);
        }

        let Some(segment) = state.active.as_mut() else {
            return Err(SafelinkError::persistence("No active log segment"));
        };

        let result = segment
            .file
            .write_all(&line)
            .and_then(|_| segment.file.flush())
            .and_then(|_| {
                if self.sync_on_write {
                    segment.file.sync_data()
                } else {
                    Ok(())
                }
            });

        match result {
            Ok(()) => {
                segment.written += line.len() as u64;
                debug!("Appended {} to {}", code, segment.path.display());
                Ok(())
            }
            Err(e) => {
                error!(
                    "Failed to append {} to {}: {}",
                    code,
                    segment.path.display(),
                    e
                );
                // 丢弃句柄，下次写入打开新段，避免在残行后继续追加
                state.active = None;
                Err(SafelinkError::persistence(format!(
                    "Failed to write log entry for {}: {}",
                    code, e
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn code(s: &str) -> ShortCode {
        ShortCode::parse(s).unwrap()
    }

    #[test]
    fn test_encode_line_format() {
        let line = encode_line(&code("AAAAAA"), "https://example.com/x").unwrap();
        assert_eq!(line, b"AAAAAA,https://example.com/x\n");
    }

    #[test]
    fn test_encode_line_rejects_non_ascii_and_newlines() {
        assert!(encode_line(&code("AAAAAA"), "https://exämple.com/").is_err());
        assert!(encode_line(&code("AAAAAA"), "https://a.com/\nBBBBBB,x").is_err());
    }

    #[test]
    fn test_append_writes_lines_lazily() {
        let dir = TempDir::new().unwrap();
        let log = SegmentLog::new(dir.path().join("db"), false, 1024 * 1024);
        assert!(log.active_segment().is_none());

        log.append(&code("AAAAAA"), "https://a.com/").unwrap();
        log.append(&code("AAAAAB"), "https://b.com/").unwrap();

        let path = log.active_segment().unwrap();
        let content = fs::read_to_string(path).unwrap();
        assert_eq!(content, "AAAAAA,https://a.com/\nAAAAAB,https://b.com/\n");
    }

    #[test]
    fn test_segment_rolls_over() {
        let dir = TempDir::new().unwrap();
        let log = SegmentLog::new(dir.path(), false, 10);

        log.append(&code("AAAAAA"), "https://a.com/").unwrap();
        let first = log.active_segment().unwrap();
        log.append(&code("AAAAAB"), "https://b.com/").unwrap();
        let second = log.active_segment().unwrap();

        assert_ne!(first, second);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }
}
