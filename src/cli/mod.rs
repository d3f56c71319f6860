//! CLI command handling

pub mod output;
pub mod reset;
pub mod scan;
pub mod send;
pub mod start;
pub mod status;

pub use output::*;
pub use reset::*;
pub use scan::*;
pub use send::*;
pub use start::*;
pub use status::*;

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use crate::config::ConnectorConfig;

/// 各命令共用的配置参数
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// 数据目录（默认 ~/.wechat-connector）
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// 配置文件路径（JSON）
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl ConfigArgs {
    pub fn load(&self) -> Result<ConnectorConfig> {
        ConnectorConfig::load(self.config.as_deref(), self.data_dir.as_deref())
    }
}
