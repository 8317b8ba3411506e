//! 批量图片分析应用 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责一次完整分析的资源装配和流程串联。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：校验配置、创建分析后端和调度器
//! 2. **批量加载**：扫描输入目录，加载所有可分析的图片
//! 3. **分批调度**：交给 AnalysisSession / Scheduler 在并发预算内完成所有批次
//! 4. **报告输出**：把汇总报告写入输出目录
//! 5. **全局统计**：输出最终成功 / 失败统计
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单个批次的细节
//! - **向下委托**：请求、重试和解析都委托给 services 层

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::models::{load_images_from_dir, ConsolidatedReport, LoadLimits};
use crate::orchestrator::scheduler::{LogSink, Scheduler};
use crate::orchestrator::session::AnalysisSession;
use crate::services::{AnalysisBackend, AnalysisClient, OpenAiBackend, ReportFormat, ReportWriter};
use crate::utils::logging::{log_run_planned, log_startup, print_final_stats};

/// 应用主结构
pub struct App {
    config: Config,
    scheduler: Scheduler,
    writer: ReportWriter,
}

impl App {
    /// 初始化应用（使用 OpenAI 兼容后端）
    pub fn initialize(config: Config) -> Result<Self> {
        let backend = OpenAiBackend::new(&config).context("创建分析后端失败")?;
        Self::with_backend(config, Arc::new(backend))
    }

    /// 使用指定的分析后端初始化
    pub fn with_backend(config: Config, backend: Arc<dyn AnalysisBackend>) -> Result<Self> {
        config.validate().context("配置校验失败")?;
        log_startup(&config);

        let client = AnalysisClient::from_config(backend, &config);
        let scheduler = Scheduler::new(client, config.max_concurrent_batches);
        let writer = ReportWriter::new(&config.report_dir);

        Ok(Self {
            config,
            scheduler,
            writer,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 运行应用主逻辑
    ///
    /// # 返回
    /// 运行完成时返回报告；被取消时返回 `None`
    pub async fn run(
        &self,
        input_dir: &Path,
        format: ReportFormat,
        cancel: CancellationToken,
    ) -> Result<Option<ConsolidatedReport>> {
        info!("\n📁 正在扫描待分析的图片: {}", input_dir.display());
        let limits = LoadLimits::from(&self.config);
        let images = load_images_from_dir(input_dir, &limits).await?;

        if images.is_empty() {
            warn!("⚠️ 没有找到可分析的图片");
        }

        let mut session = AnalysisSession::from_config(&self.config);
        session.add_items(images)?;
        log_run_planned(
            session.total_images(),
            session.batches().len(),
            self.scheduler.max_concurrent(),
        );

        let Some(report) = session
            .run(
                &self.scheduler,
                &self.config.system_instruction,
                &LogSink,
                &cancel,
            )
            .await?
        else {
            return Ok(None);
        };

        let written = self
            .writer
            .write(&report, format)
            .await
            .context("写入报告失败")?;

        print_final_stats(&report, &written);
        Ok(Some(report))
    }
}
