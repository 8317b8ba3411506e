//! 分析客户端 - 业务能力层
//!
//! 只负责"提交一个批次，拿回解析后的结果"，不关心调度
//!
//! - 提交前本地校验批次大小
//! - 每次请求有硬超时，超时不重试
//! - 429 / 502 / 503 / 传输层失败按指数退避重试
//! - 成功后交给 [`ResponseParser`] 解析

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AnalysisError, ValidationError};
use crate::models::{Batch, BatchResult, ImageItem};
use crate::services::response_parser::ResponseParser;

/// 一次分析请求的内容
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub batch_id: String,
    pub system_instruction: String,
    /// 文本指令部分
    pub prompt: String,
    /// 每张图片一个图片段
    pub images: Vec<Arc<ImageItem>>,
}

impl AnalysisRequest {
    pub fn for_batch(batch: &Batch, system_instruction: &str) -> Self {
        Self {
            batch_id: batch.id().to_string(),
            system_instruction: system_instruction.to_string(),
            prompt: build_user_prompt(batch),
            images: batch.items().to_vec(),
        }
    }
}

/// 构建文本指令
fn build_user_prompt(batch: &Batch) -> String {
    let names: Vec<String> = batch
        .items()
        .iter()
        .enumerate()
        .map(|(i, item)| format!("  Image {}: {} ({})", i + 1, item.name(), item.media_type()))
        .collect();

    format!(
        r#"Analyze the following {} images ({}).

{}

Structure your answer with these sections:
DETAILED FINDINGS:
RECOMMENDATIONS:
CONFIDENCE:
TECHNICAL NOTES:"#,
        batch.len(),
        batch.id(),
        names.join("\n")
    )
}

/// 分析服务的一次网络交换
///
/// 实现方只需要完成"发请求、拿文本、归类失败"，重试和超时由 [`AnalysisClient`] 负责
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<String, AnalysisError>;
}

/// 重试策略
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 可重试错误的额外尝试次数
    pub max_retries: u32,
    /// 第 0 次重试前的等待时间
    pub base_delay: Duration,
    /// 单次等待上限
    pub max_delay: Duration,
    /// 单次请求超时
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            attempt_timeout: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.max_retries,
            max_delay: config.max_backoff(),
            attempt_timeout: config.request_timeout(),
            ..Self::default()
        }
    }

    /// 第 `attempt` 次重试前的等待时间：`base * 2^attempt`，不超过上限
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// 分析客户端
pub struct AnalysisClient {
    backend: Arc<dyn AnalysisBackend>,
    policy: RetryPolicy,
    max_batch_size: usize,
}

impl AnalysisClient {
    pub fn new(backend: Arc<dyn AnalysisBackend>, policy: RetryPolicy, max_batch_size: usize) -> Self {
        Self {
            backend,
            policy,
            max_batch_size,
        }
    }

    pub fn from_config(backend: Arc<dyn AnalysisBackend>, config: &Config) -> Self {
        Self::new(backend, RetryPolicy::from_config(config), config.batch_size)
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// 提交一个批次并解析结果
    ///
    /// # 参数
    /// - `batch`: 待分析的批次
    /// - `system_instruction`: 系统指令
    ///
    /// # 返回
    /// 成功返回解析后的 [`BatchResult`]；可重试错误用尽重试次数后返回 `RetriesExhausted`
    pub async fn submit(
        &self,
        batch: &Batch,
        system_instruction: &str,
    ) -> Result<BatchResult, AnalysisError> {
        if batch.len() > self.max_batch_size {
            return Err(ValidationError::BatchTooLarge {
                batch_id: batch.id().to_string(),
                size: batch.len(),
                max: self.max_batch_size,
            }
            .into());
        }

        let request = AnalysisRequest::for_batch(batch, system_instruction);
        let started = Instant::now();
        let mut attempt: u32 = 0;

        let text = loop {
            match self.attempt_once(&request).await {
                Ok(text) => break text,
                Err(e) if e.is_retryable() && attempt < self.policy.max_retries => {
                    let delay = self.policy.backoff_delay(attempt);
                    warn!(
                        "[批次 {}] ⚠️ 请求失败 (尝试 {}/{}): {}，{} 秒后重试...",
                        batch.id(),
                        attempt + 1,
                        self.policy.max_retries + 1,
                        e,
                        delay.as_secs_f64()
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) if e.is_retryable() => {
                    return Err(AnalysisError::RetriesExhausted {
                        attempts: attempt + 1,
                        last: Box::new(e),
                    });
                }
                Err(e) => return Err(e),
            }
        };

        let parsed = ResponseParser::parse(&text);
        let processing_time = started.elapsed();
        info!(
            "[批次 {}] ✓ 分析完成，耗时 {:.1} 秒",
            batch.id(),
            processing_time.as_secs_f64()
        );

        Ok(BatchResult {
            batch_id: batch.id().to_string(),
            image_count: batch.len(),
            findings: parsed.findings,
            recommendations: parsed.recommendations,
            confidence: parsed.confidence,
            technical_notes: parsed.technical_notes,
            processing_time,
        })
    }

    /// 单次请求（带超时）
    async fn attempt_once(&self, request: &AnalysisRequest) -> Result<String, AnalysisError> {
        debug!(
            "[批次 {}] 发送请求，图片数量: {}",
            request.batch_id,
            request.images.len()
        );

        let text = match timeout(self.policy.attempt_timeout, self.backend.analyze(request)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(AnalysisError::Timeout {
                    secs: self.policy.attempt_timeout.as_secs(),
                })
            }
        };

        if text.trim().is_empty() {
            return Err(AnalysisError::EmptyContent);
        }
        Ok(text)
    }
}
