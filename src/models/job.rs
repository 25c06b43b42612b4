//! 批量任务数据模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::BatchAnalysisOptions;

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Partial,
}

impl JobStatus {
    /// 是否为终止状态
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Partial
        )
    }

    /// 根据成功/失败数量推导终止状态
    pub fn from_counts(completed: usize, failed: usize) -> Self {
        if completed == 0 {
            JobStatus::Failed
        } else if failed == 0 {
            JobStatus::Completed
        } else {
            JobStatus::Partial
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Partial => "partial",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个文档结果状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Success,
    Failed,
}

/// 任务进度
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
}

impl JobProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    /// 已结束的文档数量（成功 + 失败）
    pub fn finished(&self) -> usize {
        self.completed + self.failed
    }

    pub fn is_done(&self) -> bool {
        self.finished() >= self.total
    }
}

/// 单个文档的处理结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub document_id: String,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 耗时（毫秒，包含重试）
    pub duration: u64,
    /// 实际尝试次数
    pub attempts: u32,
}

impl BatchResult {
    pub fn success(
        document_id: impl Into<String>,
        analysis_id: impl Into<String>,
        duration: u64,
        attempts: u32,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            status: ItemStatus::Success,
            analysis_id: Some(analysis_id.into()),
            error: None,
            duration,
            attempts,
        }
    }

    pub fn failure(
        document_id: impl Into<String>,
        error: impl Into<String>,
        duration: u64,
        attempts: u32,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            status: ItemStatus::Failed,
            analysis_id: None,
            error: Some(error.into()),
            duration,
            attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ItemStatus::Success
    }
}

/// 批量分析任务
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchJob {
    pub id: String,
    pub owner_id: String,
    pub document_ids: Vec<String>,
    pub status: JobStatus,
    pub progress: JobProgress,
    pub results: Vec<BatchResult>,
    pub options: BatchAnalysisOptions,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchJob {
    /// 创建一个 `pending` 状态的新任务
    pub fn new(
        id: impl Into<String>,
        owner_id: impl Into<String>,
        document_ids: Vec<String>,
        options: BatchAnalysisOptions,
    ) -> Self {
        let total = document_ids.len();
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            document_ids,
            status: JobStatus::Pending,
            progress: JobProgress::new(total),
            results: Vec::with_capacity(total),
            options,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    /// 追加一个文档结果并更新计数
    ///
    /// 同一文档只记录一次，重复结果直接丢弃。
    pub fn record_result(&mut self, result: BatchResult) -> bool {
        if self.has_result_for(&result.document_id) {
            return false;
        }
        if result.is_success() {
            self.progress.completed += 1;
        } else {
            self.progress.failed += 1;
        }
        self.results.push(result);
        true
    }

    pub fn has_result_for(&self, document_id: &str) -> bool {
        self.results.iter().any(|r| r.document_id == document_id)
    }

    /// 尚未产生结果的文档
    pub fn pending_document_ids(&self) -> Vec<String> {
        self.document_ids
            .iter()
            .filter(|id| !self.has_result_for(id))
            .cloned()
            .collect()
    }

    /// 标记为终止状态
    pub fn finish(&mut self, status: JobStatus, error: Option<String>) {
        self.status = status;
        self.error = error;
        self.completed_at = Some(Utc::now());
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
