//! 分批器
//!
//! 把有序的图片集合切成固定容量的批次。每次图片集合变化都整体重算，不做增量修补。

use std::sync::Arc;

use crate::models::{Batch, ImageItem};

/// 批次标识（从 1 开始）
pub fn batch_id(index: usize) -> String {
    format!("batch-{}", index + 1)
}

/// 按容量切分
///
/// - 除最后一个批次外，每个批次正好 `capacity` 张
/// - 依次拼接所有批次可还原原始顺序
/// - 空输入返回空列表；`capacity` 为 0 时按 1 处理
pub fn partition(items: &[Arc<ImageItem>], capacity: usize) -> Vec<Batch> {
    let capacity = capacity.max(1);
    items
        .chunks(capacity)
        .enumerate()
        .map(|(index, chunk)| Batch::new(batch_id(index), chunk.to_vec()))
        .collect()
}
