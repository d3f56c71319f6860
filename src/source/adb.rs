//! ADB 读取器 - 通过 adb shell 读取模拟器中的微信 MMKV 文件
//!
//! 需要 root 权限的 adb 端口（MuMu 默认 5555）。

use anyhow::{anyhow, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::{decode_dump, ChangeTracker, ContentSource, FileStat};

/// MuMu 模拟器自带的 adb
pub const DEFAULT_ADB_PATH: &str =
    "/Applications/MuMuPlayer.app/Contents/MacOS/MuMuEmulator.app/Contents/MacOS/tools/adb";

/// 设备访问配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// adb 可执行文件路径
    pub adb_path: String,
    /// adb 主机
    pub host: String,
    /// adb 端口
    pub port: u16,
    /// 设备上的 MMKV 文件路径
    pub mmkv_path: String,
    /// 单条命令超时（秒）
    pub command_timeout_secs: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            adb_path: DEFAULT_ADB_PATH.to_string(),
            host: "127.0.0.1".to_string(),
            port: 5555,
            mmkv_path: "/data/data/com.tencent.mm/files/mmkv/SyncMMKV_773985255".to_string(),
            command_timeout_secs: 30,
        }
    }
}

impl DeviceConfig {
    /// adb -s 使用的设备序列号
    pub fn serial(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 命令输出
struct CommandOutput {
    success: bool,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

/// ADB 读取器，自己持有变化检测状态
pub struct AdbReader {
    config: DeviceConfig,
    adb_path: String,
    tracker: ChangeTracker,
}

impl AdbReader {
    pub fn new(config: DeviceConfig) -> Self {
        let adb_path = Self::resolve_adb_path(&config.adb_path);
        Self {
            config,
            adb_path,
            tracker: ChangeTracker::new(),
        }
    }

    /// 配置路径不存在时退回 PATH 中的 adb
    fn resolve_adb_path(configured: &str) -> String {
        if Path::new(configured).exists() {
            return configured.to_string();
        }
        match which::which("adb") {
            Ok(path) => path.to_string_lossy().into_owned(),
            Err(_) => configured.to_string(),
        }
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// 执行 `adb -s <serial> shell <args>`，带超时
    fn run_shell(&self, args: &[&str]) -> Result<CommandOutput> {
        let serial = self.config.serial();
        debug!(serial = %serial, args = ?args, "Running adb shell");

        let mut child = Command::new(&self.adb_path)
            .args(["-s", serial.as_str(), "shell"])
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| anyhow!("Failed to spawn {}: {}", self.adb_path, e))?;

        // 文件可能超过管道缓冲区，必须边等边读
        let mut stdout = child.stdout.take().ok_or_else(|| anyhow!("adb stdout unavailable"))?;
        let mut stderr = child.stderr.take().ok_or_else(|| anyhow!("adb stderr unavailable"))?;
        let stdout_reader = thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stdout.read_to_end(&mut buf);
            buf
        });
        let stderr_reader = thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf);
            buf
        });

        let timeout = Duration::from_secs(self.config.command_timeout_secs);
        let start = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if start.elapsed() >= timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(anyhow!("adb command timed out after {}s", timeout.as_secs()));
            }
            thread::sleep(Duration::from_millis(20));
        };

        let stdout = stdout_reader.join().unwrap_or_default();
        let stderr = stderr_reader.join().unwrap_or_default();
        Ok(CommandOutput {
            success: status.success(),
            stdout,
            stderr,
        })
    }

    /// 检查设备是否已连接
    pub fn check_device_connected(&self) -> bool {
        match self.run_shell(&["echo", "connected"]) {
            Ok(output) => output.success && String::from_utf8_lossy(&output.stdout).contains("connected"),
            Err(e) => {
                debug!(error = %e, "Device check failed");
                false
            }
        }
    }

    /// 获取 MMKV 文件的 mtime 和 size
    pub fn try_file_stat(&self) -> Result<FileStat> {
        let output = self.run_shell(&["stat", self.config.mmkv_path.as_str()])?;
        if !output.success {
            return Err(anyhow!(
                "stat {} failed: {}",
                self.config.mmkv_path,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_stat_output(&stdout)
            .ok_or_else(|| anyhow!("Unrecognized stat output: {}", stdout.trim()))
    }

    pub fn file_stat(&self) -> Option<FileStat> {
        match self.try_file_stat() {
            Ok(stat) => Some(stat),
            Err(e) => {
                warn!(error = %e, "stat failed");
                None
            }
        }
    }

    /// 读取原始字节
    pub fn try_read_raw(&self) -> Result<Vec<u8>> {
        let output = self.run_shell(&["cat", self.config.mmkv_path.as_str()])?;
        if !output.success {
            return Err(anyhow!(
                "Error reading MMKV file: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(output.stdout)
    }

    pub fn read_raw(&self) -> Option<Vec<u8>> {
        match self.try_read_raw() {
            Ok(raw) => Some(raw),
            Err(e) => {
                warn!(error = %e, "Exception reading MMKV file");
                None
            }
        }
    }
}

impl ContentSource for AdbReader {
    fn name(&self) -> &str {
        "adb"
    }

    fn has_new_content(&mut self) -> bool {
        match self.file_stat() {
            Some(stat) => self.tracker.observe(stat),
            None => false,
        }
    }

    fn read_text(&mut self) -> Option<String> {
        self.read_raw().map(|raw| decode_dump(&raw))
    }
}

/// 解析 toybox `stat` 输出
///
/// ```text
///   Size: 131072     Blocks: 256    IO Block: 4096 regular file
/// Modify: 2026-02-18 20:55:49.028003312 +0800
/// ```
pub fn parse_stat_output(output: &str) -> Option<FileStat> {
    let mut size = None;
    let mut mtime = None;

    for line in output.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("Size:") {
            size = rest.split_whitespace().next().and_then(|s| s.parse::<u64>().ok());
        } else if let Some(rest) = line.strip_prefix("Modify:") {
            let rest = rest.trim();
            let seconds = rest.split('.').next().unwrap_or(rest);
            let seconds = seconds.get(..19).unwrap_or(seconds);
            mtime = NaiveDateTime::parse_from_str(seconds, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.and_utc().timestamp());
        }
    }

    Some(FileStat {
        mtime: mtime?,
        size: size?,
    })
}
