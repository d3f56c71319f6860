//! 轮询进程管理 - PID 文件与单实例锁
//!
//! 同一个数据目录只能有一个轮询进程，否则两个进程会同时重写去重状态文件。

use anyhow::{anyhow, Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// 持有期间独占数据目录；drop 时释放锁并删除 PID 文件
#[derive(Debug)]
pub struct InstanceGuard {
    lock_file: File,
    pid_file: PathBuf,
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.pid_file);
        let _ = self.lock_file.unlock();
    }
}

/// 轮询进程管理器
pub struct PollerDaemon {
    data_dir: PathBuf,
}

impl PollerDaemon {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// 获取 PID 文件路径
    pub fn pid_file_path(&self) -> PathBuf {
        self.data_dir.join("wxc.pid")
    }

    pub fn lock_file_path(&self) -> PathBuf {
        self.data_dir.join("wxc.lock")
    }

    /// 获取单实例锁并写入当前 PID
    pub fn acquire(&self) -> Result<InstanceGuard> {
        fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("Failed to create {}", self.data_dir.display()))?;

        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_file_path())?;

        if lock_file.try_lock_exclusive().is_err() {
            let holder = self
                .read_pid()
                .ok()
                .flatten()
                .map(|pid| format!(" (pid {})", pid))
                .unwrap_or_default();
            return Err(anyhow!(
                "Another poller is already using {}{}",
                self.data_dir.display(),
                holder
            ));
        }

        let pid = std::process::id();
        fs::write(self.pid_file_path(), pid.to_string())?;
        debug!(pid, dir = %self.data_dir.display(), "Instance lock acquired");

        Ok(InstanceGuard {
            lock_file,
            pid_file: self.pid_file_path(),
        })
    }

    /// 读取 PID
    pub fn read_pid(&self) -> Result<Option<u32>> {
        let pid_file = self.pid_file_path();
        if !pid_file.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&pid_file)?;
        Ok(content.trim().parse().ok())
    }

    /// 检查轮询进程是否在运行（以单实例锁为准，PID 文件只用于展示）
    pub fn is_running(&self) -> bool {
        let lock_path = self.lock_file_path();
        if !lock_path.exists() {
            return false;
        }
        let Ok(lock_file) = OpenOptions::new().write(true).open(&lock_path) else {
            return false;
        };
        if lock_file.try_lock_exclusive().is_err() {
            return true;
        }
        let _ = lock_file.unlock();
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_paths() {
        let daemon = PollerDaemon::new("/tmp/wxc-data");
        assert!(daemon.pid_file_path().ends_with("wxc.pid"));
        assert!(daemon.lock_file_path().ends_with("wxc.lock"));
    }

    #[test]
    fn test_not_running_without_pid_file() {
        let dir = tempdir().unwrap();
        let daemon = PollerDaemon::new(dir.path());
        assert!(!daemon.is_running());
        assert_eq!(daemon.read_pid().unwrap(), None);
    }

    #[test]
    fn test_acquire_writes_pid_and_cleans_up() {
        let dir = tempdir().unwrap();
        let daemon = PollerDaemon::new(dir.path());
        {
            let _guard = daemon.acquire().unwrap();
            assert_eq!(daemon.read_pid().unwrap(), Some(std::process::id()));
            assert!(daemon.is_running());
        }
        assert!(!daemon.pid_file_path().exists());
        assert!(!daemon.is_running());
    }

    #[test]
    fn test_second_acquire_is_rejected() {
        let dir = tempdir().unwrap();
        let daemon = PollerDaemon::new(dir.path());
        let _guard = daemon.acquire().unwrap();

        let err = PollerDaemon::new(dir.path()).acquire().unwrap_err();
        assert!(err.to_string().contains("Another poller"));
    }

    #[test]
    fn test_stale_pid_file_is_not_running() {
        let dir = tempdir().unwrap();
        let daemon = PollerDaemon::new(dir.path());
        // 进程被 kill -9 后留下的 PID 文件，PID 可能已被复用
        fs::write(daemon.pid_file_path(), std::process::id().to_string()).unwrap();
        assert!(!daemon.is_running());
        assert!(daemon.acquire().is_ok());
    }

    #[test]
    fn test_reacquire_after_release() {
        let dir = tempdir().unwrap();
        let daemon = PollerDaemon::new(dir.path());
        drop(daemon.acquire().unwrap());
        assert!(daemon.acquire().is_ok());
    }
}
