use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use image_batch_analyzer::utils::logging;
use image_batch_analyzer::{App, Config, ReportFormat};

/// 批量图片分析
#[derive(Debug, Parser)]
#[command(name = "image-batch-analyzer", version, about)]
struct Cli {
    /// 待分析图片所在目录
    input_dir: PathBuf,

    /// TOML 配置文件（缺省时只读取环境变量）
    #[arg(long)]
    config: Option<PathBuf>,

    /// 报告输出目录
    #[arg(long)]
    output: Option<PathBuf>,

    /// 报告格式
    #[arg(long, value_enum, default_value_t = ReportFormat::Both)]
    format: ReportFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置
    let mut config = match &cli.config {
        Some(path) => Config::from_toml_file(path)?,
        None => Config::from_env(),
    };
    if let Some(output) = &cli.output {
        config.report_dir = output.display().to_string();
    }

    // 初始化日志
    logging::init(config.verbose_logging);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 收到中断信号，停止调度新批次");
            on_interrupt.cancel();
        }
    });

    // 初始化并运行应用
    let app = App::initialize(config)?;
    if app.run(&cli.input_dir, cli.format, cancel).await?.is_none() {
        warn!("⚠️ 运行被中断，没有生成报告");
    }

    Ok(())
}
