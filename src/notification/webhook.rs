//! OpenClaw Webhook 投递 - 把新消息唤醒到主 session
//!
//! `POST /hooks/wake`，请求体 `{"text": "...", "mode": "now"}`，
//! 只有 HTTP 200 算成功。组件内部不重试，失败的消息留给下一轮轮询。

use anyhow::{anyhow, Result};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

/// Webhook 配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// 完整的 hook URL
    pub url: String,
    /// Bearer token
    pub token: String,
    /// 超时时间 (秒)
    pub timeout_secs: u64,
    /// 消息前缀标签
    pub tag: String,
    /// 唤醒模式: "now" | "next-heartbeat"
    pub mode: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:18789/hooks/wake".to_string(),
            token: "wechat-bridge-2026".to_string(),
            timeout_secs: 10,
            tag: "微信消息".to_string(),
            mode: "now".to_string(),
        }
    }
}

/// Webhook 请求载荷
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WakePayload {
    pub text: String,
    pub mode: String,
}

/// 格式化投递文本：`[<tag>] [<会话>] [<发送者>] <内容>`
pub fn format_wake_text(tag: &str, conversation_label: &str, sender: &str, content: &str) -> String {
    format!("[{}] [{}] [{}] {}", tag, conversation_label, sender, content)
}

/// 消息投递接口
pub trait Dispatch {
    /// 投递一条消息，成功返回 true；失败原因由实现方记录日志
    fn send(&self, conversation_label: &str, sender: &str, content: &str) -> bool;
}

/// 基于 HTTP webhook 的投递器
#[derive(Debug)]
pub struct WebhookDispatcher {
    client: Client,
    config: WebhookConfig,
}

impl WebhookDispatcher {
    /// 创建投递器
    pub fn new(config: WebhookConfig) -> Result<Self> {
        if config.token.is_empty() {
            return Err(anyhow!("webhook token is required"));
        }

        // 本地 endpoint，不走系统代理
        let client = Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &WebhookConfig {
        &self.config
    }

    pub fn payload(&self, conversation_label: &str, sender: &str, content: &str) -> WakePayload {
        WakePayload {
            text: format_wake_text(&self.config.tag, conversation_label, sender, content),
            mode: self.config.mode.clone(),
        }
    }

    /// 发送并返回具体失败原因
    pub fn try_send(&self, conversation_label: &str, sender: &str, content: &str) -> Result<()> {
        let payload = self.payload(conversation_label, sender, content);
        debug!(url = %self.config.url, text_len = payload.text.len(), "Posting wake hook");

        let start = std::time::Instant::now();
        let response = self
            .client
            .post(&self.config.url)
            .header("Authorization", format!("Bearer {}", self.config.token))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .map_err(|e| {
                let cause = if e.is_timeout() {
                    "timeout"
                } else if e.is_connect() {
                    "connection refused"
                } else {
                    "transport error"
                };
                anyhow!("Webhook {} after {}ms: {}", cause, start.elapsed().as_millis(), e)
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().unwrap_or_default();
            return Err(anyhow!("Webhook returned {}: {}", status, body.trim()));
        }

        debug!(elapsed_ms = start.elapsed().as_millis(), "Wake hook accepted");
        Ok(())
    }
}

impl Dispatch for WebhookDispatcher {
    fn send(&self, conversation_label: &str, sender: &str, content: &str) -> bool {
        match self.try_send(conversation_label, sender, content) {
            Ok(()) => {
                info!(conversation = %conversation_label, sender = %sender, "Message sent to main session");
                true
            }
            Err(e) => {
                error!(conversation = %conversation_label, sender = %sender, error = %e, "Webhook send failed");
                false
            }
        }
    }
}
