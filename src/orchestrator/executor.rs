//! 有界并发执行器 - 编排层
//!
//! ## 职责
//!
//! 把一组工作项交给 `processor`，任意时刻最多 K 个在执行，结果按完成顺序回调。
//!
//! ## 核心规则
//!
//! 1. **按输入顺序准入**：在途数量达到 K 时，先等一个完成再放下一个
//! 2. **失败不扩散**：单项失败已经包含在结果里，执行器不认识"失败的批次"
//! 3. **取消只挡准入**：取消后不再启动新项，剩余项原样交还调用方
//! 4. **任务隔离**：每项在独立的 tokio 任务里跑，panic 只丢这一项

use std::future::Future;

use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::workflow::CancelFlag;

/// 执行报告
#[derive(Debug)]
pub struct ExecutorReport<T, R> {
    /// 按完成顺序收集的结果
    pub results: Vec<R>,
    /// 因取消而未启动的工作项（保持输入顺序）
    pub skipped: Vec<T>,
    /// 异常退出、没有产出结果的工作项数量
    pub lost: usize,
}

/// 以最多 `concurrency` 个并发运行 `processor`
///
/// `on_complete` 在每个结果到达时调用，用于把结果实时写回任务状态。
pub async fn run_bounded<T, R, F, Fut, C>(
    items: Vec<T>,
    concurrency: usize,
    cancel: &CancelFlag,
    processor: F,
    mut on_complete: C,
) -> ExecutorReport<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = R> + Send + 'static,
    C: FnMut(&R),
{
    let limit = concurrency.max(1);
    let total = items.len();
    let mut in_flight: JoinSet<R> = JoinSet::new();
    let mut report = ExecutorReport {
        results: Vec::with_capacity(total),
        skipped: Vec::new(),
        lost: 0,
    };

    let mut pending = items.into_iter();
    while let Some(item) = pending.next() {
        // 在途已满，先等一个完成
        if in_flight.len() >= limit {
            if let Some(joined) = in_flight.join_next().await {
                collect(joined, &mut report, &mut on_complete);
            }
        }

        if cancel.is_cancelled() {
            report.skipped.push(item);
            report.skipped.extend(pending.by_ref());
            debug!("执行器收到取消信号，跳过剩余 {} 项", report.skipped.len());
            break;
        }

        in_flight.spawn(processor(item));
    }

    // 等待剩余在途项
    while let Some(joined) = in_flight.join_next().await {
        collect(joined, &mut report, &mut on_complete);
    }

    debug!(
        "执行器结束: 共 {} 项，完成 {}，跳过 {}，丢失 {}",
        total,
        report.results.len(),
        report.skipped.len(),
        report.lost
    );

    report
}

fn collect<T, R, C>(
    joined: Result<R, tokio::task::JoinError>,
    report: &mut ExecutorReport<T, R>,
    on_complete: &mut C,
) where
    C: FnMut(&R),
{
    match joined {
        Ok(result) => {
            on_complete(&result);
            report.results.push(result);
        }
        Err(e) => {
            error!("工作任务异常退出: {}", e);
            report.lost += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// 记录同时在途的最大数量
    #[derive(Default)]
    struct Gauge {
        current: AtomicUsize,
        max: AtomicUsize,
    }

    impl Gauge {
        fn enter(&self) {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.max.fetch_max(now, Ordering::SeqCst);
        }

        fn exit(&self) {
            self.current.fetch_sub(1, Ordering::SeqCst);
        }
    }

    async fn run_with_limit(limit: usize, items: usize) -> (usize, Vec<usize>) {
        let gauge = Arc::new(Gauge::default());
        let cancel = CancelFlag::new();
        let processor = {
            let gauge = gauge.clone();
            move |i: usize| {
                let gauge = gauge.clone();
                async move {
                    gauge.enter();
                    // 不同时长，打乱完成顺序
                    tokio::time::sleep(Duration::from_millis(2 + (i % 4) as u64 * 3)).await;
                    gauge.exit();
                    i
                }
            }
        };

        let mut seen = Vec::new();
        let report = run_bounded((0..items).collect(), limit, &cancel, processor, |r| {
            seen.push(*r)
        })
        .await;

        assert_eq!(report.results, seen);
        assert!(report.skipped.is_empty());
        assert_eq!(report.lost, 0);
        (gauge.max.load(Ordering::SeqCst), report.results)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_bound_is_respected() {
        for limit in [1, 3, 10] {
            let (max_in_flight, mut results) = run_with_limit(limit, 20).await;
            assert!(
                max_in_flight <= limit,
                "limit {} exceeded: {}",
                limit,
                max_in_flight
            );
            assert!(max_in_flight >= 1);
            results.sort_unstable();
            assert_eq!(results, (0..20).collect::<Vec<_>>());
        }
    }

    #[tokio::test]
    async fn test_limit_one_preserves_input_order() {
        let (max_in_flight, results) = run_with_limit(1, 8).await;
        assert_eq!(max_in_flight, 1);
        assert_eq!(results, (0..8).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_zero_concurrency_is_treated_as_one() {
        let (max_in_flight, results) = run_with_limit(0, 3).await;
        assert_eq!(max_in_flight, 1);
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn test_cancel_stops_admission() {
        let cancel = Arc::new(CancelFlag::new());
        let processor = {
            let cancel = cancel.clone();
            move |i: usize| {
                let cancel = cancel.clone();
                async move {
                    if i == 1 {
                        cancel.cancel();
                    }
                    i
                }
            }
        };

        let report = run_bounded((0..6).collect(), 1, &cancel, processor, |_| {}).await;

        // 第 1 项完成后取消，已启动的项照常完成
        assert_eq!(report.results, vec![0, 1]);
        assert_eq!(report.skipped, vec![2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_panicking_item_is_counted_as_lost() {
        let cancel = CancelFlag::new();
        let processor = |i: usize| async move {
            if i == 2 {
                panic!("boom");
            }
            i
        };

        let report = run_bounded((0..4).collect(), 2, &cancel, processor, |_| {}).await;

        assert_eq!(report.lost, 1);
        let mut results = report.results;
        results.sort_unstable();
        assert_eq!(results, vec![0, 1, 3]);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let cancel = CancelFlag::new();
        let report: ExecutorReport<usize, usize> =
            run_bounded(Vec::new(), 3, &cancel, |i: usize| async move { i }, |_| {}).await;
        assert!(report.results.is_empty());
    }
}
