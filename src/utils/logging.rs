/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::models::ConsolidatedReport;

/// 初始化全局日志
///
/// 优先使用 `RUST_LOG`，否则按 `verbose` 选择 debug / info。重复调用不会报错。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
///
/// # 参数
/// - `config`: 当前配置
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 批量图片分析模式");
    info!("🤖 模型: {} @ {}", config.llm_model_name, config.llm_api_base_url);
    info!(
        "📊 每批 {} 张，最大并发批次数: {}",
        config.batch_size, config.max_concurrent_batches
    );
    info!(
        "🔁 最大重试次数: {}，单次超时: {} 秒",
        config.max_retries, config.request_timeout_secs
    );
    info!("{}", "=".repeat(60));
}

/// 记录分批计划
///
/// # 参数
/// - `total_images`: 图片总数
/// - `total_batches`: 批次总数
/// - `max_concurrent`: 最大并发批次数
pub fn log_run_planned(total_images: usize, total_batches: usize, max_concurrent: usize) {
    info!("✓ 找到 {} 张待分析的图片", total_images);
    info!("📋 共 {} 个批次，同时最多 {} 个", total_batches, max_concurrent);
    info!("💡 任一批次结束后立即开始下一批\n");
}

/// 打印最终统计信息
///
/// # 参数
/// - `report`: 汇总报告
/// - `written`: 已写入的报告文件
pub fn print_final_stats(report: &ConsolidatedReport, written: &[PathBuf]) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部分析完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("🖼️ 图片: {}", report.total_images);
    info!("✅ 成功批次: {}/{}", report.completed_batches, report.total_batches);
    info!("❌ 失败批次: {}", report.failed_batches);
    for failed in &report.failed {
        info!("   - {}: {}", failed.batch_id, truncate_text(&failed.error, 120));
    }
    info!("{}", "=".repeat(60));
    for path in written {
        info!("报告已保存至: {}", path.display());
    }
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("图片分析结果", 2), "图片...");
    }
}
