//! Send 命令 - 通过微信客户端发送消息（macOS）

use anyhow::{anyhow, Result};
use clap::Args;
use serde::Serialize;

use super::{print_output, ConfigArgs};
use crate::message::ConversationLabels;
use crate::sender::{AppleScriptSender, MessageSender};

/// Send 命令参数
#[derive(Args, Debug, Clone)]
pub struct SendArgs {
    #[command(flatten)]
    pub common: ConfigArgs,

    /// 目标会话名称（默认私聊会话）
    #[arg(long, short)]
    pub target: Option<String>,

    /// 发送到群聊会话
    #[arg(long, conflicts_with = "target")]
    pub group: bool,

    /// 消息内容
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct SendOutput {
    pub sent: bool,
    pub target: String,
}

/// 解析目标会话
pub fn resolve_target(args: &SendArgs, labels: &ConversationLabels) -> String {
    match &args.target {
        Some(target) => target.clone(),
        None if args.group => labels.group_label.clone(),
        None => labels.direct_label.clone(),
    }
}

/// 处理 send 命令
pub fn handle_send(args: SendArgs) -> Result<()> {
    let config = args.common.load()?;
    let target = resolve_target(&args, &config.labels);
    let sender = AppleScriptSender::new(config.sender.clone());

    let sent = sender.send(&args.content, &target);
    print_output(&SendOutput {
        sent,
        target: target.clone(),
    });
    if sent {
        Ok(())
    } else {
        Err(anyhow!("发送失败: {}", target))
    }
}
