//! # Image Batch Analyzer
//!
//! 一个把大量图片分批提交给多模态分析服务、再汇总成一份报告的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用三层架构：
//!
//! ### ① 数据层（Models）
//! - `models/` - ImageItem / Batch / RunStatus / ConsolidatedReport
//! - `models/loaders` - 从目录加载并校验图片
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个批次
//! - `AnalysisClient` - 超时、重试、退避和响应解析
//! - `OpenAiBackend` - OpenAI 兼容的 chat/completions 传输
//! - `ResponseParser` - 把自由文本拆成 Findings / Recommendations / Confidence / Technical Notes
//! - `ReportWriter` - 写出 JSON / 文本报告
//!
//! ### ③ 编排层（Orchestration）
//! - `orchestrator/session` - 图片集合、分批和一次完整运行
//! - `orchestrator/scheduler` - 有界并发调度与进度
//! - `orchestrator/aggregator` - 汇总报告
//! - `orchestrator/batch_processor` - 应用入口
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;

// 重新导出常用类型
pub use config::Config;
pub use error::{AnalysisError, AppError, AppResult, ValidationError};
pub use models::{Batch, BatchResult, BatchStatus, ConsolidatedReport, ImageItem, MediaType, RunStatus};
pub use orchestrator::{AnalysisSession, App, Scheduler};
pub use services::{AnalysisBackend, AnalysisClient, ReportFormat};
