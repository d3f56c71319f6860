//! 消息身份 - 基于内容的稳定去重键
//!
//! 去重键：md5("{is_group}:{sender}:{content}")，与消息在快照中的位置无关。
//! 沿用已部署版本的摘要算法，旧的 dedup_state.json 可以直接继续使用。
//! messageSvrId 与 pushcontent 在 MMKV 中数量和顺序都对不上，所以不使用。

use serde::{Deserialize, Serialize};
use md5::{Digest, Md5};
use std::fmt;

use super::classifier::StructuredMessage;

/// 定长十六进制摘要
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageIdentity(String);

impl MessageIdentity {
    /// 摘要长度（十六进制字符数）
    pub const LEN: usize = 32;

    /// 计算身份
    pub fn compute(is_group: bool, sender: &str, content: &str) -> Self {
        let key = canonical_key(is_group, sender, content);
        Self(format!("{:x}", Md5::digest(key.as_bytes())))
    }

    pub fn of(message: &StructuredMessage) -> Self {
        Self::compute(message.is_group, &message.sender, &message.content)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 日志中使用的短形式
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for MessageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for MessageIdentity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// 构造去重键字符串，布尔值写作 `True`/`False`，与既有部署的键保持一致
pub fn canonical_key(is_group: bool, sender: &str, content: &str) -> String {
    let flag = if is_group { "True" } else { "False" };
    format!("{}:{}:{}", flag, sender, content)
}
