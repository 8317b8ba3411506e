//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责分批和调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 应用入口
//! - 装配后端、客户端、调度器和报告写入
//! - 加载图片、运行会话、写出报告、输出统计
//!
//! ### `session` - 分析会话
//! - 持有图片集合、批次和最近一次报告
//! - 图片集合变化后整体重新分批
//!
//! ### `partitioner` - 分批器
//! - 按固定容量切分，保持原始顺序
//!
//! ### `scheduler` - 批次调度器
//! - 按序调度，限制并发，失败隔离，支持取消
//! - 发出进度快照（进度百分比、剩余时间估计）
//!
//! ### `aggregator` - 汇总器
//! - 把终态批次归并为一份报告
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (一次完整运行)
//!     ↓
//! session (图片集合 → 批次 → 报告)
//!     ↓
//! partitioner / scheduler / aggregator
//!     ↓
//! services (能力层：analysis_client / response_parser / report_writer)
//! ```

pub mod aggregator;
pub mod batch_processor;
pub mod partitioner;
pub mod scheduler;
pub mod session;

// 重新导出主要类型
pub use aggregator::aggregate;
pub use batch_processor::App;
pub use partitioner::{batch_id, partition};
pub use scheduler::{
    overall_progress, LogSink, NoopSink, ProgressSink, RunOutcome, Scheduler, SchedulerEvent,
};
pub use session::AnalysisSession;
