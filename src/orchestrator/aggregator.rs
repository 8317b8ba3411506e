//! 汇总器
//!
//! 把一次运行的全部终态批次归并为一份 ConsolidatedReport。对任意批次集合（包括空集合）都有结果。

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Batch, BatchStatus, ConsolidatedReport, FailedBatch, ReportStatus};

/// 各批次 Findings 之间的分隔行
pub const FINDINGS_SEPARATOR: &str = "\n\n---\n\n";
/// 没有任何批次成功时的 Findings
pub const NO_FINDINGS_MESSAGE: &str =
    "No findings available: none of the batches could be analyzed successfully.";
/// 至少一个批次成功时的置信度
pub const CONFIDENCE_STANDARD: &str = "Standard";
/// 没有批次成功时的置信度
pub const CONFIDENCE_LIMITED: &str = "Limited";

/// 汇总所有终态批次
///
/// # 参数
/// - `batches`: 终态批次集合（按其顺序输出 Findings 和 Recommendations）
/// - `total_images`: 原始图片总数
/// - `started_at` / `completed_at`: 运行的开始和结束时间
///
/// 只要有一个批次成功，报告状态就是 Completed；只有全部失败才是 Error
pub fn aggregate(
    batches: &[Batch],
    total_images: usize,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
) -> ConsolidatedReport {
    let completed: Vec<_> = batches
        .iter()
        .filter(|b| b.status() == BatchStatus::Completed)
        .filter_map(Batch::result)
        .collect();

    let failed: Vec<FailedBatch> = batches
        .iter()
        .filter(|b| b.status() == BatchStatus::Error)
        .map(|b| FailedBatch {
            batch_id: b.id().to_string(),
            error: b.error().unwrap_or_default().to_string(),
        })
        .collect();

    let overall_findings = if completed.is_empty() {
        NO_FINDINGS_MESSAGE.to_string()
    } else {
        let joined = completed
            .iter()
            .map(|r| r.findings.as_str())
            .collect::<Vec<_>>()
            .join(FINDINGS_SEPARATOR);
        format!(
            "Analysis of {} images across {} batches.\n\n{}",
            total_images,
            batches.len(),
            joined
        )
    };

    let recommendations = completed.iter().map(|r| r.recommendations.clone()).collect();

    let confidence = if completed.is_empty() {
        CONFIDENCE_LIMITED
    } else {
        CONFIDENCE_STANDARD
    };

    let status = if !batches.is_empty() && failed.len() == batches.len() {
        ReportStatus::Error
    } else {
        ReportStatus::Completed
    };

    ConsolidatedReport {
        id: Uuid::new_v4(),
        total_images,
        total_batches: batches.len(),
        completed_batches: completed.len(),
        failed_batches: failed.len(),
        overall_findings,
        recommendations,
        confidence: confidence.to_string(),
        failed,
        started_at,
        completed_at,
        status,
    }
}
