//! Start 命令 - 开始轮询监听消息
//!
//! 检查设备连接，获取单实例锁，然后运行轮询引擎直到收到停止信号。

use anyhow::{anyhow, Result};
use clap::Args;
use tracing::info;

use super::{print_output, ConfigArgs};
use crate::daemon::PollerDaemon;
use crate::dedup::DedupStore;
use crate::engine::{PollEngine, StopHandle};
use crate::message::MessageClassifier;
use crate::notification::WebhookDispatcher;
use crate::source::AdbReader;

/// Start 命令参数
#[derive(Args, Debug, Clone)]
pub struct StartArgs {
    #[command(flatten)]
    pub common: ConfigArgs,

    /// 轮询间隔（秒）
    #[arg(long)]
    pub poll_interval: Option<f64>,

    /// 只执行一轮
    #[arg(long)]
    pub once: bool,
}

/// 处理 start 命令（阻塞直到停止）
pub fn handle_start(args: StartArgs, stop: StopHandle) -> Result<()> {
    let mut config = args.common.load()?;
    if let Some(secs) = args.poll_interval {
        config.set_poll_interval(secs)?;
    }

    let daemon = PollerDaemon::new(&config.data_dir);
    let _guard = daemon.acquire()?;

    let reader = AdbReader::new(config.device.clone());
    if !reader.check_device_connected() {
        return Err(anyhow!(
            "设备未连接，请检查 ADB 连接 ({})",
            config.device.serial()
        ));
    }

    let store = DedupStore::in_dir(&config.data_dir);
    let dispatcher = WebhookDispatcher::new(config.webhook.clone())?;
    let mut engine = PollEngine::new(reader, dispatcher, store, config.poll_interval())
        .with_classifier(MessageClassifier::new(config.labels.clone()));

    info!(
        data_dir = %config.data_dir.display(),
        interval_secs = config.poll_interval_secs,
        "WeChat connector initialised"
    );

    if args.once {
        let report = engine.poll_once();
        print_output(&report);
        return Ok(());
    }

    let total = engine.run(&stop);
    info!(total, "Polling stopped");
    Ok(())
}
