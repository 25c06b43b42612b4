//! 完成通知服务 - 业务能力层
//!
//! 只负责"任务结束后通知一下"能力。通知失败由调用方记录日志，不影响任务状态。

use async_trait::async_trait;
use std::time::Duration;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::NotifyError;
use crate::models::BatchJob;

/// 完成通知接口
#[async_trait]
pub trait CompletionNotifier: Send + Sync {
    async fn notify(&self, job: &BatchJob) -> Result<(), NotifyError>;
}

/// 文件通知
///
/// 每个结束的任务追加一行摘要到文件。
pub struct FileNotifier {
    file_path: String,
}

impl FileNotifier {
    /// 使用自定义文件路径创建
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            file_path: path.into(),
        }
    }

    fn format_line(job: &BatchJob) -> String {
        format!(
            "{} | 任务 {} | 用户 {} | 状态 {} | 成功 {}/{} | 失败 {}{}\n",
            job.completed_at
                .unwrap_or(job.created_at)
                .format("%Y-%m-%d %H:%M:%S"),
            job.id,
            job.owner_id,
            job.status,
            job.progress.completed,
            job.progress.total,
            job.progress.failed,
            job.error
                .as_deref()
                .map(|e| format!(" | 错误: {}", e))
                .unwrap_or_default()
        )
    }
}

#[async_trait]
impl CompletionNotifier for FileNotifier {
    async fn notify(&self, job: &BatchJob) -> Result<(), NotifyError> {
        debug!("写入完成通知: 任务 {} -> {}", job.id, self.file_path);

        let to_err = |source| NotifyError::File {
            path: self.file_path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)
            .await
            .map_err(to_err)?;

        file.write_all(Self::format_line(job).as_bytes())
            .await
            .map_err(to_err)?;

        Ok(())
    }
}

/// Webhook 通知
///
/// 把任务快照以 JSON POST 到配置的地址。
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl CompletionNotifier for WebhookNotifier {
    async fn notify(&self, job: &BatchJob) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(job)
            .send()
            .await
            .map_err(|source| NotifyError::Webhook {
                url: self.url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::WebhookStatus {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        debug!("Webhook 通知成功: 任务 {}", job.id);
        Ok(())
    }
}

/// 依次调用多个通知器，返回第一个错误但不中断后续通知
pub struct FanoutNotifier {
    notifiers: Vec<Box<dyn CompletionNotifier>>,
}

impl FanoutNotifier {
    pub fn new(notifiers: Vec<Box<dyn CompletionNotifier>>) -> Self {
        Self { notifiers }
    }
}

#[async_trait]
impl CompletionNotifier for FanoutNotifier {
    async fn notify(&self, job: &BatchJob) -> Result<(), NotifyError> {
        let mut first_error = None;
        for notifier in &self.notifiers {
            if let Err(e) = notifier.notify(job).await {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BatchAnalysisOptions, BatchResult, JobStatus};

    fn finished_job() -> BatchJob {
        let mut job = BatchJob::new(
            "job-42",
            "u1",
            vec!["d1".to_string(), "d2".to_string()],
            BatchAnalysisOptions::default(),
        );
        job.record_result(BatchResult::success("d1", "a1", 12, 1));
        job.record_result(BatchResult::failure("d2", "boom", 30, 3));
        job.finish(JobStatus::Partial, None);
        job
    }

    #[tokio::test]
    async fn test_file_notifier_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notify.txt");
        let notifier = FileNotifier::with_path(path.to_string_lossy().to_string());

        let job = finished_job();
        notifier.notify(&job).await.unwrap();
        notifier.notify(&job).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("job-42"));
        assert!(lines[0].contains("partial"));
        assert!(lines[0].contains("成功 1/2"));
    }

    #[tokio::test]
    async fn test_file_notifier_reports_bad_path() {
        let notifier = FileNotifier::with_path("/nonexistent-dir/notify.txt");
        let result = notifier.notify(&finished_job()).await;
        assert!(matches!(result, Err(NotifyError::File { .. })));
    }

    #[tokio::test]
    async fn test_fanout_keeps_going_after_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notify.txt");
        let fanout = FanoutNotifier::new(vec![
            Box::new(FileNotifier::with_path("/nonexistent-dir/notify.txt")),
            Box::new(FileNotifier::with_path(path.to_string_lossy().to_string())),
        ]);

        assert!(fanout.notify(&finished_job()).await.is_err());
        assert!(path.exists());
    }
}
