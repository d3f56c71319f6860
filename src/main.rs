//! WeChat Connector CLI
//!
//! 轮询模拟器中的微信 MMKV 文件，把新消息转发到 OpenClaw webhook

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use wechat_connector::{
    cli::{
        handle_reset, handle_scan, handle_send, handle_start, handle_status, ResetArgs, ScanArgs,
        SendArgs, StartArgs, StatusArgs,
    },
    StopHandle,
};

#[derive(Parser)]
#[command(name = "wxc")]
#[command(about = "WeChat Connector - 微信消息收发桥接")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 开始轮询监听消息（Ctrl+C 停止）
    Start(StartArgs),
    /// 输出连接器状态（JSON）
    Status(StatusArgs),
    /// 清空去重状态
    Reset(ResetArgs),
    /// 解析本地 MMKV 文件并列出消息（不投递）
    Scan(ScanArgs),
    /// 通过微信客户端发送消息
    Send(SendArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("wechat_connector=info,wxc=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start(args) => {
            let stop = StopHandle::new();

            let signal_stop = stop.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Stop requested, finishing current cycle");
                    signal_stop.stop();
                }
            });

            // 引擎使用阻塞 HTTP 客户端，放到阻塞线程池
            tokio::task::spawn_blocking(move || handle_start(args, stop)).await??;
        }
        Commands::Status(args) => {
            tokio::task::spawn_blocking(move || handle_status(args)).await??;
        }
        Commands::Reset(args) => handle_reset(args)?,
        Commands::Scan(args) => handle_scan(args)?,
        Commands::Send(args) => handle_send(args)?,
    }

    Ok(())
}
