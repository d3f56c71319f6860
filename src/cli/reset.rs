//! Reset 命令 - 清空去重状态

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::{print_output, ConfigArgs};
use crate::daemon::PollerDaemon;
use crate::dedup::DedupStore;

/// Reset 命令参数
#[derive(Args, Debug, Clone)]
pub struct ResetArgs {
    #[command(flatten)]
    pub common: ConfigArgs,
}

#[derive(Debug, Serialize)]
pub struct ResetOutput {
    pub reset: bool,
    pub storage_path: PathBuf,
}

/// 处理 reset 命令
///
/// 轮询进程运行时拒绝执行，它持有的内存集合会在下一次写入时覆盖重置结果。
pub fn handle_reset(args: ResetArgs) -> Result<()> {
    let config = args.common.load()?;
    let output = reset_data_dir(&config.data_dir)?;
    print_output(&output);
    Ok(())
}

/// 持有单实例锁清空去重状态，期间 `start` 无法启动
///
/// 状态文件只比较摘要；从使用其它摘要算法的版本迁移时，快照里仍在的消息会被重新投递。
pub fn reset_data_dir(data_dir: &Path) -> Result<ResetOutput> {
    let _guard = PollerDaemon::new(data_dir)
        .acquire()
        .context("轮询进程正在运行，请先停止后再重置")?;

    let mut store = DedupStore::in_dir(data_dir);
    store.reset()?;
    Ok(ResetOutput {
        reset: true,
        storage_path: store.storage_path().to_path_buf(),
    })
}
