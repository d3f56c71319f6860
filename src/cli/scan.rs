//! Scan 命令 - 离线解析本地快照文件，不投递也不标记

use anyhow::{anyhow, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use super::{print_output, ConfigArgs};
use crate::dedup::DedupStore;
use crate::message::{extract, MessageClassifier, MessageIdentity, StructuredMessage};
use crate::source::{ContentSource, FileSource};

/// Scan 命令参数
#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    #[command(flatten)]
    pub common: ConfigArgs,

    /// 已拷贝到本地的 MMKV 文件
    #[arg(long)]
    pub file: PathBuf,
}

/// 单条解析结果
#[derive(Debug, Serialize)]
pub struct ScannedMessage {
    #[serde(flatten)]
    pub message: StructuredMessage,
    pub identity: MessageIdentity,
    /// 是否已投递过
    pub known: bool,
}

/// 解析文本并对照去重状态
pub fn scan_text(text: &str, classifier: &MessageClassifier, store: &DedupStore) -> Vec<ScannedMessage> {
    extract(text)
        .map(|fragment| {
            let message = classifier.classify(&fragment);
            let identity = MessageIdentity::of(&message);
            let known = store.is_known(&identity);
            ScannedMessage {
                message,
                identity,
                known,
            }
        })
        .collect()
}

/// 处理 scan 命令
pub fn handle_scan(args: ScanArgs) -> Result<()> {
    let config = args.common.load()?;
    let mut source = FileSource::new(&args.file);
    let text = source
        .read_text()
        .ok_or_else(|| anyhow!("无法读取文件: {}", args.file.display()))?;

    let classifier = MessageClassifier::new(config.labels.clone());
    let store = DedupStore::in_dir(&config.data_dir);
    print_output(&scan_text(&text, &classifier, &store));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_scan_text_flags_known_messages() {
        let dir = tempdir().unwrap();
        let mut store = DedupStore::in_dir(dir.path());
        store
            .mark_known(MessageIdentity::compute(false, "Bob", "hello"))
            .unwrap();

        let text = concat!(
            "<pushcontent content=\"hello\" nickname=\"Bob\" />",
            "<pushcontent content=\" Alice : hi\" nickname=\"群聊\" />",
        );
        let scanned = scan_text(text, &MessageClassifier::default(), &store);
        assert_eq!(scanned.len(), 2);
        assert!(scanned[0].known);
        assert!(!scanned[1].known);
        assert_eq!(scanned[1].message.sender, "Alice");

        let json = serde_json::to_value(&scanned[1]).unwrap();
        assert_eq!(json["conversation_label"], "group_with_AI");
        assert_eq!(json["known"], false);
    }
}
