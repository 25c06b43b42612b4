//! 批量任务生命周期管理 - 编排层
//!
//! ## 职责
//!
//! 1. **创建任务**：准入校验通过后存入 `pending` 任务，立即返回任务 id
//! 2. **后台驱动**：分离的 tokio 任务把状态推进到 `processing`，
//!    用有界执行器跑每个文档，结果实时写回存储
//! 3. **查询 / 列表 / 取消**：都按用户隔离，不泄露别人任务是否存在
//! 4. **过期清理**：定时删除结束超过保留期的任务
//!
//! ## 取消语义
//!
//! 默认只改任务状态并停止启动新文档，已经在跑的尝试不会被打断，
//! 它们的结果仍会追加到任务里。`interrupt_on_cancel` 打开时取消信号
//! 会传到每次尝试和退避等待中。
//!
//! 取消后还没启动的文档不会再跑，直接记为 `"cancelled by user"` 失败结果，
//! 这样结果数最终等于总数。原有系统会让排队的文档继续跑完，这里有意不同。

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{AppResult, ItemError, JobError};
use crate::models::{BatchAnalysisOptions, BatchJob, BatchResult, JobStatus};
use crate::orchestrator::eligibility::EligibilityValidator;
use crate::orchestrator::executor::run_bounded;
use crate::orchestrator::job_store::{InMemoryJobStore, JobStore};
use crate::services::{AnalysisEngine, CompletionNotifier, DocumentStore};
use crate::workflow::{BackoffPolicy, CancelFlag, ItemCtx, ItemWorker};

/// 默认保留 24 小时
pub const DEFAULT_RETENTION_HOURS: i64 = 24;

/// 批量任务管理器
///
/// 所有字段都是 `Arc`，克隆后共享同一份状态。
#[derive(Clone)]
pub struct BatchJobManager {
    store: Arc<dyn JobStore>,
    documents: Arc<dyn DocumentStore>,
    engine: Arc<dyn AnalysisEngine>,
    validator: Arc<EligibilityValidator>,
    worker: Arc<ItemWorker>,
    notifier: Option<Arc<dyn CompletionNotifier>>,
    cancel_flags: Arc<DashMap<String, Arc<CancelFlag>>>,
    retention: chrono::Duration,
}

impl BatchJobManager {
    /// 使用内存任务存储和默认退避策略创建
    pub fn new(documents: Arc<dyn DocumentStore>, engine: Arc<dyn AnalysisEngine>) -> Self {
        let worker = ItemWorker::new(documents.clone(), engine.clone());
        Self {
            store: Arc::new(InMemoryJobStore::new()),
            validator: Arc::new(EligibilityValidator::new(documents.clone())),
            documents,
            engine,
            worker: Arc::new(worker),
            notifier: None,
            cancel_flags: Arc::new(DashMap::new()),
            retention: chrono::Duration::hours(DEFAULT_RETENTION_HOURS),
        }
    }

    /// 替换任务存储
    pub fn with_job_store(mut self, store: Arc<dyn JobStore>) -> Self {
        self.store = store;
        self
    }

    /// 设置完成通知器
    pub fn with_notifier(mut self, notifier: Arc<dyn CompletionNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// 替换重试退避策略，流程对象沿用创建时的文档存储和分析引擎
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.worker = Arc::new(ItemWorker::with_backoff(
            self.documents.clone(),
            self.engine.clone(),
            backoff,
        ));
        self
    }

    /// 设置结束任务的保留时长
    pub fn with_retention(mut self, retention: chrono::Duration) -> Self {
        self.retention = retention;
        self
    }

    /// 创建批量分析任务
    ///
    /// 只有选项和准入校验的错误会在这里返回；之后的一切只能通过轮询看到。
    pub async fn create_job(
        &self,
        owner_id: &str,
        document_ids: Vec<String>,
        options: BatchAnalysisOptions,
    ) -> AppResult<String> {
        options.validate()?;

        let requested = document_ids.len();
        let eligible = self
            .validator
            .validate(owner_id, &document_ids, options.skip_duplicates)
            .await?;

        let job_id = Uuid::new_v4().to_string();
        let job = BatchJob::new(&job_id, owner_id, eligible.clone(), options.clone());
        self.store.insert(job);

        let cancel = Arc::new(CancelFlag::new());
        self.cancel_flags.insert(job_id.clone(), cancel.clone());

        info!(
            job_id = %job_id,
            owner_id = %owner_id,
            total = eligible.len(),
            requested,
            "📦 创建批量分析任务"
        );

        let driver = JobDriver {
            job_id: job_id.clone(),
            owner_id: owner_id.to_string(),
            document_ids: eligible,
            options,
            store: self.store.clone(),
            worker: self.worker.clone(),
            notifier: self.notifier.clone(),
            cancel_flags: self.cancel_flags.clone(),
            cancel,
        };
        tokio::spawn(driver.run());

        Ok(job_id)
    }

    /// 查询任务状态
    ///
    /// 不属于 `owner_id` 的任务与不存在的任务返回相同结果。
    pub fn get_job_status(&self, job_id: &str, owner_id: &str) -> Option<BatchJob> {
        self.store
            .get(job_id)
            .filter(|job| job.owner_id == owner_id)
    }

    /// 取消正在处理的任务
    pub fn cancel_job(&self, job_id: &str, owner_id: &str) -> bool {
        let mut cancelled = false;
        self.store.update(job_id, &mut |job: &mut BatchJob| {
            if job.owner_id == owner_id && job.status == JobStatus::Processing {
                job.finish(JobStatus::Failed, Some(ItemError::Cancelled.to_string()));
                cancelled = true;
            }
        });

        if cancelled {
            if let Some(flag) = self.cancel_flags.get(job_id) {
                flag.cancel();
            }
            info!(job_id = %job_id, owner_id = %owner_id, "🛑 任务已被用户取消");
        }

        cancelled
    }

    /// 用户的全部任务，最新的在前
    pub fn list_jobs(&self, owner_id: &str) -> Vec<BatchJob> {
        self.store.list_by_owner(owner_id)
    }

    /// 删除过期的结束任务，返回删除数量
    pub fn sweep_expired(&self) -> usize {
        let Some(cutoff) = Utc::now().checked_sub_signed(self.retention) else {
            warn!("保留时长 {} 超出时间范围，跳过本次清理", self.retention);
            return 0;
        };
        let removed = self.store.remove_expired(cutoff);
        for job_id in &removed {
            self.cancel_flags.remove(job_id);
        }
        if !removed.is_empty() {
            info!("🧹 清理了 {} 个过期任务", removed.len());
        }
        removed.len()
    }

    /// 启动定时清理任务
    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // 第一次 tick 立即返回，跳过
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = manager.sweep_expired();
                debug!("定时清理完成，删除 {} 个任务", removed);
            }
        })
    }

    /// 当前存储中的任务数量
    pub fn job_count(&self) -> usize {
        self.store.len()
    }
}

/// 单个任务的后台驱动
struct JobDriver {
    job_id: String,
    owner_id: String,
    document_ids: Vec<String>,
    options: BatchAnalysisOptions,
    store: Arc<dyn JobStore>,
    worker: Arc<ItemWorker>,
    notifier: Option<Arc<dyn CompletionNotifier>>,
    cancel_flags: Arc<DashMap<String, Arc<CancelFlag>>>,
    cancel: Arc<CancelFlag>,
}

impl JobDriver {
    async fn run(self) {
        let outcome = AssertUnwindSafe(self.drive()).catch_unwind().await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.fail(e),
            Err(panic) => self.fail(JobError::DriverPanicked(panic_message(panic))),
        }

        self.cancel_flags.remove(&self.job_id);

        if self.options.notify_on_complete {
            self.notify().await;
        }
    }

    async fn drive(&self) -> Result<(), JobError> {
        let started = self.store.update(&self.job_id, &mut |job: &mut BatchJob| {
            if job.status == JobStatus::Pending {
                job.status = JobStatus::Processing;
                job.started_at = Some(Utc::now());
            }
        });
        if !started {
            return Err(self.vanished());
        }

        let total = self.document_ids.len();
        let items: Vec<ItemCtx> = self
            .document_ids
            .iter()
            .enumerate()
            .map(|(idx, document_id)| {
                ItemCtx::new(&self.job_id, &self.owner_id, document_id, idx + 1, total)
            })
            .collect();

        let processor = {
            let worker = self.worker.clone();
            let options = self.options.clone();
            let cancel = self.cancel.clone();
            move |ctx: ItemCtx| {
                let worker = worker.clone();
                let options = options.clone();
                let cancel = cancel.clone();
                async move { worker.run(&ctx, &options, &cancel).await }
            }
        };

        let store = self.store.clone();
        let job_id = self.job_id.clone();
        let report = run_bounded(
            items,
            self.options.concurrency,
            &self.cancel,
            processor,
            |result: &BatchResult| {
                store.update(&job_id, &mut |job: &mut BatchJob| {
                    if job.record_result(result.clone()) && job.progress.is_done() {
                        settle(job);
                    }
                });
            },
        )
        .await;

        if report.lost > 0 {
            warn!(job_id = %self.job_id, lost = report.lost, "⚠️ 有工作任务异常退出");
        }

        // 没有产出结果的文档补记为失败，保证结果数等于总数
        let cancelled_reason = ItemError::Cancelled.to_string();
        let lost_reason =
            JobError::WorkerLost("task aborted before reporting".to_string()).to_string();
        let mut final_job = None;
        let found = self.store.update(&self.job_id, &mut |job: &mut BatchJob| {
            for ctx in &report.skipped {
                job.record_result(BatchResult::failure(
                    &ctx.document_id,
                    cancelled_reason.clone(),
                    0,
                    0,
                ));
            }
            for document_id in job.pending_document_ids() {
                job.record_result(BatchResult::failure(document_id, lost_reason.clone(), 0, 0));
            }
            settle(job);
            final_job = Some((job.status, job.progress));
        });
        if !found {
            return Err(self.vanished());
        }

        if let Some((status, progress)) = final_job {
            info!(
                job_id = %self.job_id,
                owner_id = %self.owner_id,
                status = %status,
                completed = progress.completed,
                failed = progress.failed,
                total = progress.total,
                "🏁 任务结束"
            );
        }

        Ok(())
    }

    /// 任务级失败：补齐缺失结果并强制标记为失败
    fn fail(&self, err: JobError) {
        let message = err.to_string();
        error!(job_id = %self.job_id, owner_id = %self.owner_id, "❌ 任务驱动失败: {}", message);

        self.store.update(&self.job_id, &mut |job: &mut BatchJob| {
            for document_id in job.pending_document_ids() {
                job.record_result(BatchResult::failure(document_id, message.clone(), 0, 0));
            }
            if !job.is_terminal() {
                job.finish(JobStatus::Failed, Some(message.clone()));
            }
        });
    }

    async fn notify(&self) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        let Some(job) = self.store.get(&self.job_id) else {
            warn!(job_id = %self.job_id, "任务在通知前已被清理，跳过完成通知");
            return;
        };
        if let Err(e) = notifier.notify(&job).await {
            warn!(job_id = %self.job_id, "完成通知发送失败: {}", e);
        }
    }

    fn vanished(&self) -> JobError {
        JobError::Vanished {
            job_id: self.job_id.clone(),
        }
    }
}

/// 结果齐了且仍在处理中时，按成功/失败数决定终止状态
///
/// 和最后一个结果在同一次更新里完成，轮询永远看不到"结果已满但仍在处理"。
fn settle(job: &mut BatchJob) {
    if job.status == JobStatus::Processing {
        let status = JobStatus::from_counts(job.progress.completed, job.progress.failed);
        job.finish(status, None);
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
