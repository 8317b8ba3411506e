//! 批次调度器 - 编排层
//!
//! ## 职责
//!
//! 在并发预算内把所有 Pending 批次推进到终态。
//!
//! ## 核心规则
//!
//! 1. **按序调度**：严格按分批顺序调度，完成顺序不做约束
//! 2. **并发上限**：任意时刻 Processing 的批次数不超过 `max_concurrent`，空出的名额立即补上
//! 3. **失败隔离**：单个批次失败只会把它自己标记为 Error
//! 4. **单点更新**：所有状态和计数只在调度循环里修改，进行中的请求只返回结果
//! 5. **取消**：取消后不再调度新批次，进行中的请求直接丢弃，结果不会写回

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::AnalysisError;
use crate::models::{Batch, BatchResult, BatchStatus, RunStatus};
use crate::services::AnalysisClient;

/// 调度过程中发出的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// 批次进入 Processing
    BatchStarted { batch_id: String, position: usize },
    /// 批次进入终态
    BatchFinished {
        batch_id: String,
        status: BatchStatus,
        error: Option<String>,
    },
    /// 汇总状态快照（每次状态变化后发出）
    Status(RunStatus),
}

/// 接收调度事件
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: SchedulerEvent);
}

/// 丢弃所有事件
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn emit(&self, _event: SchedulerEvent) {}
}

/// 把进度写入日志
pub struct LogSink;

impl ProgressSink for LogSink {
    fn emit(&self, event: SchedulerEvent) {
        if let SchedulerEvent::Status(status) = event {
            let eta = status
                .estimated_time_remaining
                .map(|d| format!("，预计剩余 {} 秒", d.as_secs()))
                .unwrap_or_default();
            info!(
                "📊 进度 {}% (完成 {} / 失败 {} / 进行中 {} / 共 {}){}",
                status.overall_progress,
                status.completed_batches,
                status.failed_batches,
                status.processing_batches,
                status.total_batches,
                eta
            );
        }
    }
}

/// 一次调度的结果
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// 全部批次（顺序与输入一致）
    pub batches: Vec<Batch>,
    pub status: RunStatus,
    /// 是否被中途取消
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// 批次调度器
pub struct Scheduler {
    client: AnalysisClient,
    max_concurrent: usize,
}

impl Scheduler {
    /// `max_concurrent` 为 0 时按 1 处理
    pub fn new(client: AnalysisClient, max_concurrent: usize) -> Self {
        Self {
            client,
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn client(&self) -> &AnalysisClient {
        &self.client
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// 运行所有 Pending 批次直到终态（或被取消）
    ///
    /// # 参数
    /// - `batches`: 分批器产出的批次
    /// - `system_instruction`: 系统指令
    /// - `sink`: 进度事件接收方
    /// - `cancel`: 取消令牌
    pub async fn run(
        &self,
        batches: Vec<Batch>,
        system_instruction: &str,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> RunOutcome {
        let started_at = Utc::now();
        let mut state = RunState::new(batches, self.max_concurrent);
        let mut queue = state.pending_indices();
        let mut in_flight = FuturesUnordered::new();

        sink.emit(SchedulerEvent::Status(state.status()));

        loop {
            // 补满空闲名额
            while in_flight.len() < self.max_concurrent && !cancel.is_cancelled() {
                let Some(index) = queue.pop_front() else {
                    break;
                };
                if !state.admit(index) {
                    continue;
                }

                let batch = state.batches[index].clone();
                sink.emit(SchedulerEvent::BatchStarted {
                    batch_id: batch.id().to_string(),
                    position: index,
                });
                sink.emit(SchedulerEvent::Status(state.status()));

                let client = &self.client;
                in_flight.push(async move {
                    let started = Instant::now();
                    let outcome = client.submit(&batch, system_instruction).await;
                    (index, outcome, started.elapsed())
                });
            }

            if in_flight.is_empty() {
                break;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!("⚠️ 运行已取消，丢弃 {} 个进行中的批次结果", in_flight.len());
                    break;
                }
                next = in_flight.next() => {
                    if let Some((index, outcome, elapsed)) = next {
                        let event = state.finish(index, outcome, elapsed);
                        sink.emit(event);
                        sink.emit(SchedulerEvent::Status(state.status()));
                    }
                }
            }
        }

        // 未完成的请求随 in_flight 一起丢弃
        drop(in_flight);

        let cancelled = cancel.is_cancelled() && !state.all_terminal();
        let status = state.status();
        RunOutcome {
            batches: state.batches,
            status,
            cancelled,
            started_at,
            completed_at: Utc::now(),
        }
    }
}

/// 调度循环独占的运行状态
struct RunState {
    batches: Vec<Batch>,
    max_concurrent: usize,
    completed: usize,
    failed: usize,
    processing: usize,
    current_batch: Option<String>,
    /// 已结束批次的累计耗时，用于估算剩余时间
    elapsed_total: Duration,
    elapsed_samples: u32,
}

impl RunState {
    fn new(mut batches: Vec<Batch>, max_concurrent: usize) -> Self {
        let mut completed = 0;
        let mut failed = 0;
        for batch in &mut batches {
            match batch.status() {
                BatchStatus::Completed => completed += 1,
                BatchStatus::Error => failed += 1,
                BatchStatus::Processing => {
                    warn!("[批次 {}] 上次运行未结束，重新排队", batch.id());
                    batch.reset();
                }
                BatchStatus::Pending => {}
            }
        }

        Self {
            batches,
            max_concurrent,
            completed,
            failed,
            processing: 0,
            current_batch: None,
            elapsed_total: Duration::ZERO,
            elapsed_samples: 0,
        }
    }

    fn pending_indices(&self) -> std::collections::VecDeque<usize> {
        self.batches
            .iter()
            .enumerate()
            .filter(|(_, b)| b.status() == BatchStatus::Pending)
            .map(|(i, _)| i)
            .collect()
    }

    fn admit(&mut self, index: usize) -> bool {
        let batch = &mut self.batches[index];
        if !batch.mark_processing(Utc::now()) {
            return false;
        }
        info!("[批次 {}] 📦 开始分析 ({} 张图片)", batch.id(), batch.len());
        self.processing += 1;
        self.current_batch = Some(batch.id().to_string());
        true
    }

    fn finish(
        &mut self,
        index: usize,
        outcome: Result<BatchResult, AnalysisError>,
        elapsed: Duration,
    ) -> SchedulerEvent {
        let now = Utc::now();
        let batch = &mut self.batches[index];
        self.processing = self.processing.saturating_sub(1);
        self.elapsed_total += elapsed;
        self.elapsed_samples += 1;

        match outcome {
            Ok(result) => {
                if batch.mark_completed(result, now) {
                    self.completed += 1;
                }
                SchedulerEvent::BatchFinished {
                    batch_id: batch.id().to_string(),
                    status: batch.status(),
                    error: None,
                }
            }
            Err(e) => {
                error!("[批次 {}] ❌ 分析失败: {}", batch.id(), e);
                if batch.mark_error(e.to_string(), now) {
                    self.failed += 1;
                }
                SchedulerEvent::BatchFinished {
                    batch_id: batch.id().to_string(),
                    status: batch.status(),
                    error: batch.error().map(str::to_string),
                }
            }
        }
    }

    fn all_terminal(&self) -> bool {
        self.batches.iter().all(|b| b.status().is_terminal())
    }

    fn status(&self) -> RunStatus {
        let total = self.batches.len();
        let finished = self.completed + self.failed;
        RunStatus {
            total_batches: total,
            completed_batches: self.completed,
            failed_batches: self.failed,
            processing_batches: self.processing,
            overall_progress: overall_progress(finished, total),
            current_batch: self.current_batch.clone(),
            estimated_time_remaining: self.eta(total.saturating_sub(finished)),
        }
    }

    /// 平均耗时 × 剩余批次 ÷ 并发数
    fn eta(&self, remaining: usize) -> Option<Duration> {
        if self.elapsed_samples == 0 || remaining == 0 {
            return None;
        }
        let average = self.elapsed_total / self.elapsed_samples;
        let waves = remaining.div_ceil(self.max_concurrent) as u32;
        Some(average * waves)
    }
}

/// `round(100 * finished / total)`，未全部结束时最多 99
pub fn overall_progress(finished: usize, total: usize) -> u8 {
    if total == 0 || finished >= total {
        return 100;
    }
    let percent = (100.0 * finished as f64 / total as f64).round() as u8;
    percent.min(99)
}
