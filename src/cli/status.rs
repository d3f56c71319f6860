//! Status 命令 - 输出连接器状态（JSON）

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use super::{print_output, ConfigArgs};
use crate::daemon::PollerDaemon;
use crate::dedup::{DedupStats, DedupStore};
use crate::source::AdbReader;

/// Status 命令参数
#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub common: ConfigArgs,
}

/// Status 命令输出
#[derive(Debug, Serialize)]
pub struct StatusOutput {
    pub device_connected: bool,
    pub running: bool,
    pub dedup: DedupStats,
    pub data_dir: PathBuf,
}

pub fn collect_status(args: &StatusArgs) -> Result<StatusOutput> {
    let config = args.common.load()?;
    let reader = AdbReader::new(config.device.clone());
    let store = DedupStore::in_dir(&config.data_dir);

    Ok(StatusOutput {
        device_connected: reader.check_device_connected(),
        running: PollerDaemon::new(&config.data_dir).is_running(),
        dedup: store.stats(),
        data_dir: config.data_dir,
    })
}

/// 处理 status 命令
pub fn handle_status(args: StatusArgs) -> Result<()> {
    print_output(&collect_status(&args)?);
    Ok(())
}
