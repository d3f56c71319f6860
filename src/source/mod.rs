//! 原始内容来源 - 提供 MMKV 文本快照
//!
//! 轮询引擎只依赖 [`ContentSource`]；真实部署使用 [`adb::AdbReader`]
//! 通过 ADB 读取模拟器里的文件，本地调试可以用 [`FileSource`]。

pub mod adb;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};

pub use adb::{AdbReader, DeviceConfig};

/// 文件状态（用于变化检测）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// 修改时间（秒）
    pub mtime: i64,
    /// 文件大小（字节）
    pub size: u64,
}

/// 变化检测器：记录上一次观察到的 mtime/size
///
/// 首次观察总是报告有变化。
#[derive(Debug, Clone, Default)]
pub struct ChangeTracker {
    last: Option<FileStat>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录新的状态，返回是否与上次不同
    pub fn observe(&mut self, stat: FileStat) -> bool {
        let changed = self.last != Some(stat);
        self.last = Some(stat);
        changed
    }

    pub fn last(&self) -> Option<FileStat> {
        self.last
    }
}

/// 原始内容提供者
pub trait ContentSource {
    /// 来源名称（用于日志）
    fn name(&self) -> &str;

    /// 自上次检查以来内容是否可能有变化
    fn has_new_content(&mut self) -> bool;

    /// 读取完整文本；不可达或读取失败时返回 None
    fn read_text(&mut self) -> Option<String>;
}

/// 把快照字节解码为文本，丢弃无效的 UTF-8 字节
///
/// MMKV 文件是二进制容器，pushcontent 标签本身是合法 UTF-8，
/// 周围的二进制噪声直接忽略。
pub fn decode_dump(raw: &[u8]) -> String {
    let mut text = String::with_capacity(raw.len());
    for chunk in raw.utf8_chunks() {
        text.push_str(chunk.valid());
    }
    text
}

/// 读取本地文件的来源（文件已经从设备上拷贝下来）
pub struct FileSource {
    path: PathBuf,
    tracker: ChangeTracker,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            tracker: ChangeTracker::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn stat(&self) -> Option<FileStat> {
        let metadata = fs::metadata(&self.path).ok()?;
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        Some(FileStat {
            mtime,
            size: metadata.len(),
        })
    }
}

impl ContentSource for FileSource {
    fn name(&self) -> &str {
        "file"
    }

    fn has_new_content(&mut self) -> bool {
        match self.stat() {
            Some(stat) => self.tracker.observe(stat),
            None => false,
        }
    }

    fn read_text(&mut self) -> Option<String> {
        match fs::read(&self.path) {
            Ok(raw) => {
                debug!(path = %self.path.display(), bytes = raw.len(), "Read dump file");
                Some(decode_dump(&raw))
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read dump file");
                None
            }
        }
    }
}
