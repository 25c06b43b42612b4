//! # Compliance Batch
//!
//! 批量文档合规分析任务编排
//!
//! ## 架构设计
//!
//! 本系统采用严格的分层架构：
//!
//! ### ① 数据模型层（Models）
//! - `models/` - 文档、任务、结果、选项、法规
//! - `BatchJob` - 任务快照，带进度和逐文档结果
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个文档
//! - `DocumentStore` - 文档归属查询、正文读取、分析结果保存
//! - `AnalysisEngine` / `LlmAnalysisEngine` - 合规评分能力
//! - `CompletionNotifier` - 任务结束通知能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个文档"的完整处理流程
//! - `ItemCtx` - 上下文封装（job_id + document_id + 序号）
//! - `ItemWorker` - 读取正文 → 分析（超时）→ 失败退避重试
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/job_manager` - 任务生命周期，后台驱动
//! - `orchestrator/executor` - 有界并发执行器
//! - `orchestrator/batch_processor` - 命令行运行器
//!
//! ## 模块结构

pub mod config;
pub mod error;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{BatchAnalysisOptions, BatchJob, BatchResult, JobProgress, JobStatus};
pub use orchestrator::{App, BatchJobManager};
pub use workflow::{CancelFlag, ItemCtx, ItemWorker};
