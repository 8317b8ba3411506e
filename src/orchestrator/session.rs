//! 分析会话
//!
//! 持有当前的图片集合、由它推导出的批次以及最近一次运行的报告。
//! 图片集合一变化就重新分批。

use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{AppResult, ValidationError};
use crate::models::{Batch, ConsolidatedReport, ImageItem};
use crate::orchestrator::aggregator::aggregate;
use crate::orchestrator::partitioner::partition;
use crate::orchestrator::scheduler::{ProgressSink, RunOutcome, Scheduler};

pub struct AnalysisSession {
    items: Vec<Arc<ImageItem>>,
    batches: Vec<Batch>,
    report: Option<ConsolidatedReport>,
    batch_size: usize,
    max_images: usize,
}

impl AnalysisSession {
    pub fn new(batch_size: usize, max_images: usize) -> Self {
        Self {
            items: Vec::new(),
            batches: Vec::new(),
            report: None,
            batch_size: batch_size.max(1),
            max_images,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.batch_size, config.max_images)
    }

    pub fn items(&self) -> &[Arc<ImageItem>] {
        &self.items
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    /// 最近一次完成的运行报告
    pub fn report(&self) -> Option<&ConsolidatedReport> {
        self.report.as_ref()
    }

    pub fn total_images(&self) -> usize {
        self.items.len()
    }

    /// 追加图片（超过上限时整体拒绝，集合不变）
    ///
    /// # 返回
    /// 追加后的图片总数
    pub fn add_items(
        &mut self,
        items: impl IntoIterator<Item = ImageItem>,
    ) -> Result<usize, ValidationError> {
        let incoming: Vec<Arc<ImageItem>> = items.into_iter().map(Arc::new).collect();
        let count = self.items.len() + incoming.len();
        if count > self.max_images {
            return Err(ValidationError::TooManyImages {
                count,
                max: self.max_images,
            });
        }
        self.items.extend(incoming);
        self.repartition();
        Ok(self.items.len())
    }

    /// 按位置移除一张图片，后面的批次边界随之前移
    pub fn remove_item(&mut self, index: usize) -> Option<Arc<ImageItem>> {
        if index >= self.items.len() {
            return None;
        }
        let removed = self.items.remove(index);
        self.repartition();
        Some(removed)
    }

    /// 清空图片、批次和报告
    pub fn clear(&mut self) {
        self.items.clear();
        self.batches.clear();
        self.report = None;
    }

    /// 所有批次回到 Pending，丢弃报告
    pub fn reset(&mut self) {
        for batch in &mut self.batches {
            batch.reset();
        }
        self.report = None;
    }

    fn repartition(&mut self) {
        self.batches = partition(&self.items, self.batch_size);
    }

    /// 执行一次完整运行
    ///
    /// # 返回
    /// - `Ok(Some(report))`: 所有批次结束，已生成报告
    /// - `Ok(None)`: 运行被取消，不生成报告
    /// - `Err`: 运行前校验失败，没有发出任何请求
    pub async fn run(
        &mut self,
        scheduler: &Scheduler,
        system_instruction: &str,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> AppResult<Option<ConsolidatedReport>> {
        if self.items.is_empty() {
            return Err(ValidationError::EmptyItemSet.into());
        }

        let max = scheduler.client().max_batch_size();
        if let Some(batch) = self.batches.iter().find(|b| b.len() > max) {
            return Err(ValidationError::BatchTooLarge {
                batch_id: batch.id().to_string(),
                size: batch.len(),
                max,
            }
            .into());
        }

        self.reset();
        let started_at = Utc::now();
        let batches = std::mem::take(&mut self.batches);
        let RunOutcome {
            batches,
            cancelled,
            status,
            ..
        } = scheduler.run(batches, system_instruction, sink, cancel).await;
        self.batches = batches;

        if cancelled {
            warn!(
                "⚠️ 运行已取消: 完成 {} / 失败 {} / 共 {} 个批次，不生成报告",
                status.completed_batches, status.failed_batches, status.total_batches
            );
            return Ok(None);
        }

        let report = aggregate(&self.batches, self.items.len(), started_at, Utc::now());
        info!(
            "✓ 汇总完成: 成功 {} / 失败 {} 个批次",
            report.completed_batches, report.failed_batches
        );
        self.report = Some(report.clone());
        Ok(Some(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(i: usize) -> ImageItem {
        ImageItem::validate(format!("scan-{i:03}.png"), vec![0u8; 8], 1024).unwrap()
    }

    #[test]
    fn test_add_items_repartitions() {
        let mut session = AnalysisSession::new(20, 200);
        assert_eq!(session.add_items((0..45).map(item)).unwrap(), 45);
        let sizes: Vec<usize> = session.batches().iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![20, 20, 5]);

        session.add_items((45..50).map(item)).unwrap();
        assert_eq!(session.batches()[2].len(), 10);
    }

    #[test]
    fn test_add_items_over_cap_leaves_set_unchanged() {
        let mut session = AnalysisSession::new(20, 10);
        session.add_items((0..8).map(item)).unwrap();
        let err = session.add_items((8..11).map(item)).unwrap_err();
        assert_eq!(err, ValidationError::TooManyImages { count: 11, max: 10 });
        assert_eq!(session.total_images(), 8);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut session = AnalysisSession::new(2, 200);
        session.add_items((0..5).map(item)).unwrap();
        let removed = session.remove_item(0).unwrap();
        assert_eq!(removed.name(), "scan-000.png");
        assert_eq!(session.batches()[0].items()[0].name(), "scan-001.png");
        assert_eq!(session.batches().len(), 2);
        assert!(session.remove_item(99).is_none());

        session.clear();
        assert!(session.items().is_empty());
        assert!(session.batches().is_empty());
        assert!(session.report().is_none());
    }
}
