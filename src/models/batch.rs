use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::models::image::ImageItem;

/// 批次状态
///
/// 只能单向流转：Pending → Processing → Completed / Error，
/// 唯一的例外是显式的 [`Batch::reset`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl BatchStatus {
    /// 是否为终态
    pub fn is_terminal(self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Error)
    }
}

/// 单个批次的分析结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub batch_id: String,
    pub image_count: usize,
    pub findings: String,
    pub recommendations: String,
    pub confidence: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technical_notes: Option<String>,
    pub processing_time: Duration,
}

/// 批次：最多 N 张图片，作为一次分析请求提交
#[derive(Debug, Clone)]
pub struct Batch {
    id: String,
    items: Vec<Arc<ImageItem>>,
    status: BatchStatus,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    result: Option<BatchResult>,
    error: Option<String>,
}

impl Batch {
    /// 创建一个 Pending 状态的批次
    pub fn new(id: impl Into<String>, items: Vec<Arc<ImageItem>>) -> Self {
        Self {
            id: id.into(),
            items,
            status: BatchStatus::Pending,
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn items(&self) -> &[Arc<ImageItem>] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn status(&self) -> BatchStatus {
        self.status
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn result(&self) -> Option<&BatchResult> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Pending → Processing，记录开始时间
    ///
    /// 状态不是 Pending 时不做任何修改并返回 false
    pub fn mark_processing(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != BatchStatus::Pending {
            return false;
        }
        self.status = BatchStatus::Processing;
        self.started_at = Some(now);
        true
    }

    /// Processing → Completed，记录结果和结束时间
    pub fn mark_completed(&mut self, result: BatchResult, now: DateTime<Utc>) -> bool {
        if self.status != BatchStatus::Processing {
            return false;
        }
        self.status = BatchStatus::Completed;
        self.result = Some(result);
        self.completed_at = Some(now);
        true
    }

    /// Processing → Error，记录错误信息和结束时间
    pub fn mark_error(&mut self, error: impl Into<String>, now: DateTime<Utc>) -> bool {
        if self.status != BatchStatus::Processing {
            return false;
        }
        self.status = BatchStatus::Error;
        self.error = Some(error.into());
        self.completed_at = Some(now);
        true
    }

    /// 回到 Pending，丢弃结果、错误和时间戳
    pub fn reset(&mut self) {
        self.status = BatchStatus::Pending;
        self.started_at = None;
        self.completed_at = None;
        self.result = None;
        self.error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result(id: &str) -> BatchResult {
        BatchResult {
            batch_id: id.to_string(),
            image_count: 0,
            findings: "ok".to_string(),
            recommendations: "none".to_string(),
            confidence: "high".to_string(),
            technical_notes: None,
            processing_time: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_transitions_are_monotone() {
        let now = Utc::now();
        let mut batch = Batch::new("batch-1", Vec::new());

        // 不能跳过 Processing
        assert!(!batch.mark_completed(sample_result("batch-1"), now));
        assert!(!batch.mark_error("boom", now));
        assert_eq!(batch.status(), BatchStatus::Pending);

        assert!(batch.mark_processing(now));
        assert!(batch.started_at().is_some());
        assert!(!batch.mark_processing(now));

        assert!(batch.mark_error("boom", now));
        assert_eq!(batch.status(), BatchStatus::Error);

        // 终态不可再改
        assert!(!batch.mark_completed(sample_result("batch-1"), now));
        assert_eq!(batch.error(), Some("boom"));
        assert!(batch.result().is_none());
    }

    #[test]
    fn test_reset_discards_everything() {
        let now = Utc::now();
        let mut batch = Batch::new("batch-1", Vec::new());
        batch.mark_processing(now);
        batch.mark_completed(sample_result("batch-1"), now);
        assert!(batch.status().is_terminal());

        batch.reset();
        assert_eq!(batch.status(), BatchStatus::Pending);
        assert!(batch.result().is_none());
        assert!(batch.started_at().is_none());
        assert!(batch.completed_at().is_none());
    }
}
