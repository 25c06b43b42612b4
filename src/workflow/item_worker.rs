//! 单文档分析流程 - 流程层
//!
//! 核心职责：定义"一个文档"的完整分析流程
//!
//! 流程顺序：
//! 1. 重新读取文档正文（不复用校验阶段的数据）
//! 2. 调用分析引擎，与超时计时器赛跑
//! 3. 失败后按指数退避重试，直到用完重试次数
//!
//! 无论成功失败都只产出一个 `BatchResult`，错误不会向外传播。

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::time::{sleep, timeout};
use tracing::{error, info, warn};

use crate::error::ItemError;
use crate::models::{AnalysisOutcome, BatchAnalysisOptions, BatchResult};
use crate::services::{AnalysisEngine, DocumentStore};
use crate::workflow::{CancelFlag, ItemCtx};

/// 重试退避策略
///
/// 第 n 次失败后等待 `base_delay * 2^n`，可选按比例加随机抖动。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    /// 抖动比例，0.0 表示固定间隔，0.2 表示 ±20%
    pub jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            jitter: 0.0,
        }
    }
}

impl BackoffPolicy {
    pub fn new(base_delay: Duration) -> Self {
        Self {
            base_delay,
            jitter: 0.0,
        }
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// 第 `failures` 次失败后的等待时间
    pub fn delay_for(&self, failures: u32) -> Duration {
        let factor = 2u32.saturating_pow(failures.min(16));
        let delay = self.base_delay.saturating_mul(factor);
        if self.jitter <= 0.0 {
            return delay;
        }
        let scale = rand::thread_rng().gen_range((1.0 - self.jitter)..=(1.0 + self.jitter));
        delay.mul_f64(scale)
    }
}

/// 单文档分析流程
///
/// - 编排 读取 → 分析 → 重试 的完整流程
/// - 不持有任务状态，只依赖存储和引擎能力
pub struct ItemWorker {
    store: Arc<dyn DocumentStore>,
    engine: Arc<dyn AnalysisEngine>,
    backoff: BackoffPolicy,
}

impl ItemWorker {
    /// 创建新的文档分析流程
    pub fn new(store: Arc<dyn DocumentStore>, engine: Arc<dyn AnalysisEngine>) -> Self {
        Self::with_backoff(store, engine, BackoffPolicy::default())
    }

    pub fn with_backoff(
        store: Arc<dyn DocumentStore>,
        engine: Arc<dyn AnalysisEngine>,
        backoff: BackoffPolicy,
    ) -> Self {
        Self {
            store,
            engine,
            backoff,
        }
    }

    /// 分析一个文档，总是返回一个结果
    pub async fn run(
        &self,
        ctx: &ItemCtx,
        options: &BatchAnalysisOptions,
        cancel: &CancelFlag,
    ) -> BatchResult {
        let started = Instant::now();
        let interrupt = options.interrupt_on_cancel.then_some(cancel);
        let mut failures: u32 = 0;

        info!(
            job_id = %ctx.job_id,
            document_id = %ctx.document_id,
            owner_id = %ctx.owner_id,
            "{} 🔍 开始分析",
            ctx
        );

        loop {
            let attempt = failures + 1;
            let outcome = race_cancel(self.attempt(ctx, options), interrupt).await;

            match outcome {
                Ok(analysis) => {
                    let duration = elapsed_ms(started);
                    info!(
                        job_id = %ctx.job_id,
                        document_id = %ctx.document_id,
                        owner_id = %ctx.owner_id,
                        analysis_id = %analysis.analysis_id,
                        duration_ms = duration,
                        attempts = attempt,
                        "{} ✓ 分析完成",
                        ctx
                    );
                    return BatchResult::success(
                        &ctx.document_id,
                        analysis.analysis_id,
                        duration,
                        attempt,
                    );
                }
                Err(ItemError::Cancelled) => {
                    warn!(
                        job_id = %ctx.job_id,
                        document_id = %ctx.document_id,
                        "{} ⚠️ 任务已取消，中断分析",
                        ctx
                    );
                    return BatchResult::failure(
                        &ctx.document_id,
                        ItemError::Cancelled.to_string(),
                        elapsed_ms(started),
                        attempt,
                    );
                }
                Err(e) => {
                    failures += 1;
                    if failures <= options.retry_attempts {
                        let delay = self.backoff.delay_for(failures);
                        warn!(
                            job_id = %ctx.job_id,
                            document_id = %ctx.document_id,
                            owner_id = %ctx.owner_id,
                            attempt,
                            "{} 分析失败 (尝试 {}/{}): {}，{:?} 后重试",
                            ctx,
                            attempt,
                            options.retry_attempts + 1,
                            e,
                            delay
                        );
                        let slept = race_cancel(
                            async {
                                sleep(delay).await;
                                Ok(())
                            },
                            interrupt,
                        )
                        .await;
                        if slept.is_err() {
                            return BatchResult::failure(
                                &ctx.document_id,
                                ItemError::Cancelled.to_string(),
                                elapsed_ms(started),
                                attempt,
                            );
                        }
                        continue;
                    }

                    let duration = elapsed_ms(started);
                    error!(
                        job_id = %ctx.job_id,
                        document_id = %ctx.document_id,
                        owner_id = %ctx.owner_id,
                        duration_ms = duration,
                        attempts = attempt,
                        "{} ❌ 分析失败，已用完重试次数: {}",
                        ctx,
                        e
                    );
                    return BatchResult::failure(&ctx.document_id, e.to_string(), duration, attempt);
                }
            }
        }
    }

    /// 单次尝试
    async fn attempt(
        &self,
        ctx: &ItemCtx,
        options: &BatchAnalysisOptions,
    ) -> Result<AnalysisOutcome, ItemError> {
        let content = self
            .store
            .fetch_document_content(&ctx.document_id, &ctx.owner_id)
            .await?
            .ok_or_else(|| ItemError::ContentMissing {
                document_id: ctx.document_id.clone(),
            })?;

        // 超时后引擎调用被直接丢弃，它可能已经产生了副作用
        let analysis = self
            .engine
            .analyze(&content, &ctx.document_id, &ctx.owner_id);
        match timeout(Duration::from_millis(options.timeout_ms), analysis).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ItemError::Timeout {
                timeout_ms: options.timeout_ms,
            }),
        }
    }
}

/// 在需要时让一个操作与取消信号赛跑
async fn race_cancel<F, T>(fut: F, cancel: Option<&CancelFlag>) -> Result<T, ItemError>
where
    F: Future<Output = Result<T, ItemError>>,
{
    match cancel {
        Some(flag) => {
            tokio::select! {
                result = fut => result,
                _ = flag.cancelled() => Err(ItemError::Cancelled),
            }
        }
        None => fut.await,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
