//! 任务取消信号

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// 任务级取消标记
///
/// 取消是单向的：一旦触发就不能恢复。
#[derive(Debug, Default)]
pub struct CancelFlag {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// 触发取消，唤醒所有等待者
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// 等待取消信号
    pub async fn cancelled(&self) {
        loop {
            // 先注册再检查，避免错过 notify_waiters
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}
