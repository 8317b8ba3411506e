//! 报告写入服务 - 业务能力层
//!
//! 只负责把 ConsolidatedReport 写成文件，不关心流程

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::error::{AppError, AppResult, FileError};
use crate::models::{ConsolidatedReport, ReportStatus};

/// 导出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    Json,
    Text,
    Both,
}

/// 报告写入服务
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    /// 使用输出目录创建
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// 按格式写入报告
    ///
    /// # 返回
    /// 返回写入的文件路径列表
    pub async fn write(
        &self,
        report: &ConsolidatedReport,
        format: ReportFormat,
    ) -> AppResult<Vec<PathBuf>> {
        let mut written = Vec::new();
        if matches!(format, ReportFormat::Json | ReportFormat::Both) {
            written.push(self.write_json(report).await?);
        }
        if matches!(format, ReportFormat::Text | ReportFormat::Both) {
            written.push(self.write_text(report).await?);
        }
        Ok(written)
    }

    /// 写入 JSON 格式
    pub async fn write_json(&self, report: &ConsolidatedReport) -> AppResult<PathBuf> {
        let content = serde_json::to_string_pretty(report).map_err(FileError::from)?;
        self.write_file(&format!("report-{}.json", report.id), content)
            .await
    }

    /// 写入文本格式
    pub async fn write_text(&self, report: &ConsolidatedReport) -> AppResult<PathBuf> {
        self.write_file(&format!("report-{}.txt", report.id), render_text(report))
            .await
    }

    async fn write_file(&self, file_name: &str, content: String) -> AppResult<PathBuf> {
        fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| AppError::file_write_failed(self.output_dir.display().to_string(), e))?;

        let path = self.output_dir.join(file_name);
        debug!("写入报告: {} ({} 字节)", path.display(), content.len());
        fs::write(&path, content)
            .await
            .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;
        Ok(path)
    }
}

/// 把报告渲染成叙述文本
pub fn render_text(report: &ConsolidatedReport) -> String {
    let line = "=".repeat(60);
    let rule = "-".repeat(60);

    let status = match report.status {
        ReportStatus::Completed => "COMPLETED",
        ReportStatus::Error => "ERROR",
    };

    let mut out = format!(
        "{line}\n\
         Consolidated Analysis Report\n\
         {line}\n\
         Report ID:   {id}\n\
         Status:      {status}\n\
         Started:     {started}\n\
         Completed:   {completed}\n\
         Images:      {images}\n\
         Batches:     {total} total, {ok} completed, {failed} failed\n\
         Confidence:  {confidence}\n\n",
        id = report.id,
        started = report.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
        completed = report.completed_at.format("%Y-%m-%d %H:%M:%S UTC"),
        images = report.total_images,
        total = report.total_batches,
        ok = report.completed_batches,
        failed = report.failed_batches,
        confidence = report.confidence,
    );

    out.push_str(&format!("FINDINGS\n{rule}\n{}\n\n", report.overall_findings));

    out.push_str(&format!("RECOMMENDATIONS\n{rule}\n"));
    if report.recommendations.is_empty() {
        out.push_str("(none)\n");
    }
    for (i, rec) in report.recommendations.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, rec));
    }

    if !report.failed.is_empty() {
        out.push_str(&format!("\nFAILED BATCHES\n{rule}\n"));
        for failed in &report.failed {
            out.push_str(&format!("- {}: {}\n", failed.batch_id, failed.error));
        }
    }

    out
}
