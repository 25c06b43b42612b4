//! 批量分析运行器 - 编排层
//!
//! ## 职责
//!
//! 本模块是命令行应用的入口，负责组装各层对象并跑完一个批量任务。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：日志文件、加载 TOML 文档、创建分析引擎和通知器
//! 2. **任务管理器**：创建 `BatchJobManager` 并启动过期清理
//! 3. **提交与轮询**：提交一个任务，按间隔轮询直到终止
//! 4. **全局统计**：输出任务的最终结果
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单个文档的细节
//! - **向下委托**：任务驱动交给 `BatchJobManager`

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;
use crate::models::{BatchJob, JobProgress};
use crate::orchestrator::BatchJobManager;
use crate::services::{
    AnalysisEngine, CompletionNotifier, FanoutNotifier, FileNotifier, InMemoryDocumentStore,
    LlmAnalysisEngine, WebhookNotifier,
};
use crate::utils::logging;

/// 应用主结构
pub struct App {
    config: Config,
    documents: Arc<InMemoryDocumentStore>,
    manager: BatchJobManager,
    sweeper: JoinHandle<()>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        // 初始化日志文件
        logging::init_log_file(&config.output_log_file)?;

        logging::log_startup(config.batch_options.concurrency, config.regulation.name());

        // 加载文档
        info!("\n📁 正在扫描待分析的文档...");
        let loaded = crate::models::load_all_documents(&config.document_folder).await?;
        info!("✓ 加载了 {} 个文档", loaded.len());
        let documents = Arc::new(InMemoryDocumentStore::with_documents(loaded));

        let engine: Arc<dyn AnalysisEngine> =
            Arc::new(LlmAnalysisEngine::new(&config, documents.clone()));

        let manager = BatchJobManager::new(documents.clone(), engine)
            .with_retention(config.retention())
            .with_notifier(build_notifier(&config));
        let sweeper = manager.spawn_sweeper(Duration::from_secs(config.sweep_interval_secs.max(1)));

        Ok(Self {
            config,
            documents,
            manager,
            sweeper,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<()> {
        let owner_id = self.config.owner_id.as_str();
        let document_ids = if self.config.document_ids.is_empty() {
            self.documents.document_ids_for_owner(owner_id)
        } else {
            self.config.document_ids.clone()
        };

        if document_ids.is_empty() {
            warn!("⚠️ 用户 {} 没有可分析的文档，程序结束", owner_id);
            return Ok(());
        }

        let requested = document_ids.len();
        let job_id = self
            .manager
            .create_job(owner_id, document_ids, self.config.batch_options.clone())
            .await
            .context("创建批量任务失败")?;

        let total = self
            .manager
            .get_job_status(&job_id, owner_id)
            .map(|job| job.progress.total)
            .unwrap_or_default();
        logging::log_job_created(&job_id, total, requested);

        let job = self.wait_for_job(&job_id).await?;

        // 输出最终统计
        logging::print_final_stats(&job, &self.config.output_log_file);

        Ok(())
    }

    /// 轮询任务直到终止
    async fn wait_for_job(&self, job_id: &str) -> Result<BatchJob> {
        let poll = Duration::from_millis(self.config.poll_interval_ms.max(10));
        let mut last_progress: Option<JobProgress> = None;

        loop {
            let job = self
                .manager
                .get_job_status(job_id, &self.config.owner_id)
                .with_context(|| format!("任务 {} 不存在", job_id))?;

            if last_progress != Some(job.progress) {
                logging::log_progress(job_id, &job.progress);
                last_progress = Some(job.progress);
            }

            if job.is_terminal() {
                return Ok(job);
            }

            tokio::time::sleep(poll).await;
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

/// 文件通知总是开启，配置了 Webhook 时一并发送
fn build_notifier(config: &Config) -> Arc<dyn CompletionNotifier> {
    let file = FileNotifier::with_path(&config.notify_file);
    match &config.webhook_url {
        Some(url) => Arc::new(FanoutNotifier::new(vec![
            Box::new(file),
            Box::new(WebhookNotifier::new(url)),
        ])),
        None => Arc::new(file),
    }
}
