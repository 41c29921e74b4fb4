//! 数据目录锁
//!
//! 同一数据目录只允许一个写入进程（serve 或 shorten），否则两个进程的
//! 短码计数器会分配出相同的短码。锁文件内容为持有者 PID，守卫释放时删除。

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, error, warn};

use crate::errors::{Result, SafelinkError};

pub const LOCK_FILE_NAME: &str = ".safelink.lock";

#[derive(Debug)]
pub struct DataDirLock {
    path: PathBuf,
}

impl DataDirLock {
    /// 获取锁；目录不存在时创建
    pub fn acquire<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        Self::acquire_with(data_dir, |file| writeln!(file, "{}", std::process::id()))
    }

    /// 创建锁文件后由 `stamp` 写入内容；写入失败时锁文件随守卫一起删除
    fn acquire_with<P, F>(data_dir: P, stamp: F) -> Result<Self>
    where
        P: AsRef<Path>,
        F: FnOnce(&mut File) -> io::Result<()>,
    {
        let dir = data_dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| {
            SafelinkError::file_operation(format!(
                "Failed to create data directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let path = dir.join(LOCK_FILE_NAME);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                let holder = fs::read_to_string(&path).unwrap_or_default();
                error!(
                    "Data directory {} is locked by PID {}",
                    dir.display(),
                    holder.trim()
                );
                error!("If no other instance is running, remove: {}", path.display());
                return Err(SafelinkError::file_operation(format!(
                    "Data directory {} is already in use",
                    dir.display()
                )));
            }
            Err(e) => {
                return Err(SafelinkError::file_operation(format!(
                    "Failed to create lock file {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let lock = Self { path };
        stamp(&mut file).map_err(|e| {
            SafelinkError::file_operation(format!(
                "Failed to write lock file {}: {}",
                lock.path.display(),
                e
            ))
        })?;
        debug!("Acquired data directory lock {}", lock.path.display());
        Ok(lock)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DataDirLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to remove lock file {}: {}", self.path.display(), e);
        } else {
            debug!("Released data directory lock {}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_until_released() {
        let dir = tempfile::TempDir::new().unwrap();
        let lock = DataDirLock::acquire(dir.path()).unwrap();
        assert!(lock.path().exists());
        assert!(DataDirLock::acquire(dir.path()).is_err());

        drop(lock);
        assert!(!dir.path().join(LOCK_FILE_NAME).exists());
        assert!(DataDirLock::acquire(dir.path()).is_ok());
    }

    #[test]
    fn test_failed_write_leaves_no_stale_lock() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = DataDirLock::acquire_with(dir.path(), |_| Err(io::Error::other("disk full")));
        assert!(matches!(result, Err(SafelinkError::FileOperation(_))));
        assert!(!dir.path().join(LOCK_FILE_NAME).exists());

        let lock = DataDirLock::acquire(dir.path()).unwrap();
        let holder = fs::read_to_string(lock.path()).unwrap();
        assert_eq!(holder.trim(), std::process::id().to_string());
    }
}
