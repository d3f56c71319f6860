//! pushcontent 提取器 - 从 MMKV 文本快照中扫描推送记录
//!
//! 微信把最近的推送写成 `<pushcontent content="..." nickname="..." />` 标签，
//! 夹杂在二进制内容里。这里只做模式匹配，不理解 MMKV 的容器格式。

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static PUSHCONTENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<pushcontent\s+content="(?P<content>[^"]*)"\s+nickname="(?P<nickname>[^"]*)"\s*/>"#)
        .expect("Invalid pushcontent regex")
});

/// 原始片段（未经分类的 nickname/content 对）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFragment {
    /// 显示昵称（可能是群聊标记）
    pub nickname: String,
    /// 推送文本
    pub content: String,
}

impl RawFragment {
    pub fn new(nickname: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            nickname: nickname.into(),
            content: content.into(),
        }
    }
}

/// 按文本顺序惰性产出所有完整的 pushcontent 片段
///
/// 不去重；残缺或属性顺序不符的标签直接跳过。
pub fn extract(text: &str) -> impl Iterator<Item = RawFragment> + '_ {
    PUSHCONTENT_RE.captures_iter(text).filter_map(|caps| {
        let content = caps.name("content")?.as_str();
        let nickname = caps.name("nickname")?.as_str();
        Some(RawFragment::new(nickname, content))
    })
}

/// 收集为 Vec 的便捷版本
pub fn extract_all(text: &str) -> Vec<RawFragment> {
    extract(text).collect()
}
