use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// 运行中的汇总状态
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStatus {
    pub total_batches: usize,
    pub completed_batches: usize,
    pub failed_batches: usize,
    /// 当前处于 Processing 的批次数量
    pub processing_batches: usize,
    /// 0..=100
    pub overall_progress: u8,
    /// 最近一次被调度的批次（仅供展示）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_batch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_time_remaining: Option<Duration>,
}

impl RunStatus {
    pub fn finished_batches(&self) -> usize {
        self.completed_batches + self.failed_batches
    }

    pub fn is_finished(&self) -> bool {
        self.finished_batches() == self.total_batches
    }
}

/// 报告的最终状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    Completed,
    Error,
}

/// 失败批次及其错误信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedBatch {
    pub batch_id: String,
    pub error: String,
}

/// 一次运行的汇总报告
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidatedReport {
    pub id: Uuid,
    pub total_images: usize,
    pub total_batches: usize,
    pub completed_batches: usize,
    pub failed_batches: usize,
    pub overall_findings: String,
    pub recommendations: Vec<String>,
    pub confidence: String,
    pub failed: Vec<FailedBatch>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub status: ReportStatus,
}
