//! 连接器配置
//!
//! 加载顺序：默认值 → 配置文件（`--config` 或 `<data_dir>/config.json`）
//! → 环境变量 `WXC_HOOK_URL` / `WXC_HOOK_TOKEN` → 命令行参数。

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::message::ConversationLabels;
use crate::notification::WebhookConfig;
use crate::sender::SenderConfig;
use crate::source::DeviceConfig;

/// 配置文件名
pub const CONFIG_FILE_NAME: &str = "config.json";

/// 默认数据目录 `~/.wechat-connector`
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".wechat-connector")
}

/// 连接器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    /// 数据目录（去重状态、PID 文件）
    pub data_dir: PathBuf,
    /// 轮询间隔（秒）
    pub poll_interval_secs: f64,
    pub webhook: WebhookConfig,
    pub device: DeviceConfig,
    pub labels: ConversationLabels,
    pub sender: SenderConfig,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            poll_interval_secs: 1.0,
            webhook: WebhookConfig::default(),
            device: DeviceConfig::default(),
            labels: ConversationLabels::default(),
            sender: SenderConfig::default(),
        }
    }
}

impl ConnectorConfig {
    /// 从 JSON 文件读取
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))
    }

    /// 按优先级加载配置
    ///
    /// 显式指定的配置文件必须存在且合法；数据目录下的默认文件缺失时使用默认值。
    pub fn load(config_path: Option<&Path>, data_dir: Option<&Path>) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => Self::from_file(path)?,
            None => {
                let dir = data_dir.map(Path::to_path_buf).unwrap_or_else(default_data_dir);
                let candidate = dir.join(CONFIG_FILE_NAME);
                if candidate.exists() {
                    debug!(path = %candidate.display(), "Loading config");
                    Self::from_file(&candidate)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env();
        if let Some(dir) = data_dir {
            config.data_dir = dir.to_path_buf();
        }
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("WXC_HOOK_URL") {
            if !url.is_empty() {
                debug!("Using WXC_HOOK_URL from environment");
                self.webhook.url = url;
            }
        }
        if let Ok(token) = std::env::var("WXC_HOOK_TOKEN") {
            if !token.is_empty() {
                debug!("Using WXC_HOOK_TOKEN from environment");
                self.webhook.token = token;
            }
        }
    }

    /// 覆盖轮询间隔
    pub fn set_poll_interval(&mut self, secs: f64) -> Result<()> {
        if !secs.is_finite() || secs < 0.0 {
            return Err(anyhow!("poll interval must be a non-negative number, got {}", secs));
        }
        self.poll_interval_secs = secs;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval_secs.max(0.0))
    }
}
