//! 消息去重存储 - 记录已投递的消息身份
//!
//! 存储位置：`<data_dir>/dedup_state.json`
//!
//! ```json
//! {"processed_ids": ["..."], "last_update": "2026-02-18T12:55:49.028Z"}
//! ```
//!
//! 每次新增都同步全量重写文件（不做批量），加载失败按空状态冷启动。

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::message::MessageIdentity;

/// 状态文件名
pub const STATE_FILE_NAME: &str = "dedup_state.json";

/// 持久化的去重状态
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DedupState {
    #[serde(default)]
    pub processed_ids: Vec<MessageIdentity>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_update: Option<DateTime<Utc>>,
}

/// 兼容不带时区的 ISO-8601 时间（按 UTC 处理），无法解析时视为缺失
fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    Ok(NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc()))
}

/// 统计信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DedupStats {
    pub total_processed: usize,
    pub storage_path: PathBuf,
}

/// 去重存储，内存集合的唯一修改者
pub struct DedupStore {
    storage_path: PathBuf,
    processed: HashSet<MessageIdentity>,
}

impl DedupStore {
    /// 打开存储，加载已有状态
    pub fn open(storage_path: impl Into<PathBuf>) -> Self {
        let storage_path = storage_path.into();
        let processed = Self::load(&storage_path);
        Self {
            storage_path,
            processed,
        }
    }

    /// 在数据目录下打开默认状态文件
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::open(data_dir.join(STATE_FILE_NAME))
    }

    fn load(path: &Path) -> HashSet<MessageIdentity> {
        if !path.exists() {
            debug!(path = %path.display(), "No dedup state yet, starting empty");
            return HashSet::new();
        }

        let parsed = fs::read_to_string(path)
            .map_err(anyhow::Error::from)
            .and_then(|content| serde_json::from_str::<DedupState>(&content).map_err(Into::into));

        match parsed {
            Ok(state) => {
                let processed: HashSet<_> = state.processed_ids.into_iter().collect();
                info!(count = processed.len(), path = %path.display(), "Loaded dedup state");
                processed
            }
            Err(e) => {
                // 冷启动：可能重复投递旧消息，但不阻塞轮询
                warn!(error = %e, path = %path.display(), "Dedup state unreadable, starting empty");
                HashSet::new()
            }
        }
    }

    /// 全量重写状态文件
    fn save(&self) -> Result<()> {
        if let Some(parent) = self.storage_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let mut ids: Vec<MessageIdentity> = self.processed.iter().cloned().collect();
        ids.sort();
        let state = DedupState {
            processed_ids: ids,
            last_update: Some(Utc::now()),
        };
        let json = serde_json::to_string_pretty(&state)?;

        // 先写临时文件再原子替换
        let temp_path = self.storage_path.with_extension("json.tmp");
        fs::write(&temp_path, json)
            .with_context(|| format!("Failed to write {}", temp_path.display()))?;
        fs::rename(&temp_path, &self.storage_path)
            .with_context(|| format!("Failed to replace {}", self.storage_path.display()))?;
        Ok(())
    }

    pub fn is_known(&self, id: &MessageIdentity) -> bool {
        self.processed.contains(id)
    }

    /// 标记为已处理并立即落盘
    ///
    /// 写盘失败时内存中的记录仍然保留，本进程内不会重复投递，
    /// 但重启后可能再次投递。
    pub fn mark_known(&mut self, id: MessageIdentity) -> Result<()> {
        self.processed.insert(id);
        self.save().map_err(|e| {
            warn!(
                error = %e,
                path = %self.storage_path.display(),
                "Dedup state persist failed, in-memory set diverges from disk"
            );
            e
        })
    }

    /// 清空所有状态
    pub fn reset(&mut self) -> Result<()> {
        self.processed.clear();
        self.save()?;
        info!(path = %self.storage_path.display(), "Dedup state reset");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.processed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processed.is_empty()
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    pub fn stats(&self) -> DedupStats {
        DedupStats {
            total_processed: self.processed.len(),
            storage_path: self.storage_path.clone(),
        }
    }
}
