//! 消息分类器 - 把原始片段解析为结构化消息
//!
//! 群聊推送的 nickname 是固定标记，真正的发送者写在 content 里
//! （格式 ` 发送者 : 消息内容`）；私聊推送的 nickname 就是发送者。

use serde::{Deserialize, Serialize};

use super::extractor::RawFragment;

/// 群聊/私聊正文分隔符
pub const SENDER_SEPARATOR: &str = " : ";

/// 会话标签配置（每个部署固定一个群聊、一个私聊）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationLabels {
    /// 群聊目标名称
    pub group_label: String,
    /// 私聊目标名称
    pub direct_label: String,
    /// 表示群聊来源的 nickname 标记
    pub group_sentinels: Vec<String>,
    /// 群聊中无法解析发送者时的占位名
    pub unknown_sender: String,
}

impl Default for ConversationLabels {
    fn default() -> Self {
        Self {
            group_label: "group_with_AI".to_string(),
            direct_label: "Mwu！".to_string(),
            group_sentinels: vec!["群聊".to_string(), "group_with_AI".to_string()],
            unknown_sender: "未知".to_string(),
        }
    }
}

/// 结构化消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredMessage {
    pub sender: String,
    pub content: String,
    pub is_group: bool,
    pub conversation_label: String,
}

/// 消息分类器
#[derive(Debug, Clone, Default)]
pub struct MessageClassifier {
    labels: ConversationLabels,
}

impl MessageClassifier {
    pub fn new(labels: ConversationLabels) -> Self {
        Self { labels }
    }

    pub fn labels(&self) -> &ConversationLabels {
        &self.labels
    }

    /// 分类单个片段，总是返回一条消息
    pub fn classify(&self, fragment: &RawFragment) -> StructuredMessage {
        let nickname = fragment.nickname.trim();
        let is_group = self.labels.group_sentinels.iter().any(|s| s == nickname);
        let split = fragment.content.split_once(SENDER_SEPARATOR);

        if is_group {
            let (sender, content) = match split {
                Some((sender, body)) => (sender.trim().to_string(), body.trim().to_string()),
                None => (self.labels.unknown_sender.clone(), fragment.content.clone()),
            };
            StructuredMessage {
                sender,
                content,
                is_group: true,
                conversation_label: self.labels.group_label.clone(),
            }
        } else {
            // 私聊没有分隔符时保留完整原文，而不是占位发送者
            let content = match split {
                Some((_, body)) => body.trim().to_string(),
                None => fragment.content.clone(),
            };
            StructuredMessage {
                sender: nickname.to_string(),
                content,
                is_group: false,
                conversation_label: self.labels.direct_label.clone(),
            }
        }
    }
}
