//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量任务的生命周期和并发调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `eligibility` - 准入校验
//! - 归属校验、可分析文本过滤、已分析文档去重
//! - 唯一会同步返回给调用方的错误来源
//!
//! ### `executor` - 有界并发执行器
//! - 任意时刻最多 K 个文档在处理
//! - 取消后停止准入
//!
//! ### `job_store` - 任务存储
//! - 任务状态的唯一来源，读取返回副本
//!
//! ### `job_manager` - 任务生命周期
//! - 创建 / 查询 / 取消 / 列表 / 过期清理
//! - 后台驱动每个任务直到终止状态
//!
//! ### `batch_processor` - 命令行运行器
//! - 组装各层对象，提交一个任务并轮询到结束
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (命令行入口)
//!     ↓
//! job_manager (处理 BatchJob)
//!     ↓
//! executor (有界并发)
//!     ↓
//! workflow::ItemWorker (处理单个文档)
//!     ↓
//! services (能力层：document store / analysis engine / notifier)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：job_manager 管生命周期，executor 管并发
//! 2. **向下依赖**：编排层 → workflow → services
//! 3. **无业务逻辑**：只做调度和统计，不做合规判断

pub mod batch_processor;
pub mod eligibility;
pub mod executor;
pub mod job_manager;
pub mod job_store;

// 重新导出主要类型
pub use batch_processor::App;
pub use eligibility::EligibilityValidator;
pub use executor::{run_bounded, ExecutorReport};
pub use job_manager::{BatchJobManager, DEFAULT_RETENTION_HOURS};
pub use job_store::{InMemoryJobStore, JobStore};
