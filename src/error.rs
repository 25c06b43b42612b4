//! 错误类型
//!
//! 按照传播范围划分：
//! - `ValidationError`：创建任务时同步返回给调用方
//! - `ItemError`：单个文档的失败，只写入 `BatchResult`，不会向外传播
//! - `JobError`：后台驱动任务内部的整体失败，只能通过轮询任务状态看到
//!
//! 其余错误（存储、分析引擎、通知、配置）由 `AppError` 统一包装。

use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 准入校验失败
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// 文档存储错误
    #[error("存储错误: {0}")]
    Store(#[from] StoreError),
    /// 分析引擎错误
    #[error("分析引擎错误: {0}")]
    Engine(#[from] EngineError),
    /// 任务级错误
    #[error("任务错误: {0}")]
    Job(#[from] JobError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 准入校验错误
///
/// 消息文本会原样返回给 HTTP 层，保持英文。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no documents requested")]
    EmptyRequest,
    #[error("duplicate document id: {document_id}")]
    DuplicateDocument { document_id: String },
    #[error("documents not found or not owned")]
    DocumentsNotFound,
    #[error("no analyzable documents")]
    NoAnalyzableDocuments,
    #[error("all documents already analyzed")]
    AllAlreadyAnalyzed,
    #[error("invalid options: {reason}")]
    InvalidOptions { reason: String },
}

/// 单个文档的处理错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    #[error("document content not available: {document_id}")]
    ContentMissing { document_id: String },
    #[error("analysis timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("analysis failed: {0}")]
    Engine(String),
    #[error("document store failed: {0}")]
    Store(String),
    #[error("cancelled by user")]
    Cancelled,
}

/// 任务级错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("job {job_id} disappeared from the store")]
    Vanished { job_id: String },
    #[error("job driver panicked: {0}")]
    DriverPanicked(String),
    #[error("worker task lost: {0}")]
    WorkerLost(String),
}

/// 文档存储错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("存储不可用: {0}")]
    Unavailable(String),
    #[error("文档不存在: {document_id}")]
    DocumentNotFound { document_id: String },
}

/// 分析引擎错误
#[derive(Debug, Error)]
pub enum EngineError {
    /// API 调用失败
    #[error("API调用失败 (模型: {model}): {message}")]
    ApiCallFailed { model: String, message: String },
    /// 返回内容为空
    #[error("返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
    /// 返回内容无法解析
    #[error("无法解析分析结果: {response}")]
    UnparsableVerdict { response: String },
    /// 持久化分析结果失败
    #[error("保存分析结果失败: {0}")]
    Persist(#[from] StoreError),
}

/// 完成通知错误
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("写入通知文件失败 ({path}): {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Webhook 请求失败 ({url}): {source}")]
    Webhook {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Webhook 返回错误状态 ({url}): {status}")]
    WebhookStatus { url: String, status: u16 },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 配置文件读取失败
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 配置项取值超出范围
    #[error("配置项 {field} 取值 {value} 无效: {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
    /// 配置文件解析失败
    #[error("解析配置文件失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

impl From<StoreError> for ItemError {
    fn from(err: StoreError) -> Self {
        ItemError::Store(err.to_string())
    }
}

impl From<EngineError> for ItemError {
    fn from(err: EngineError) -> Self {
        ItemError::Engine(err.to_string())
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages_are_stable() {
        assert_eq!(
            ValidationError::DocumentsNotFound.to_string(),
            "documents not found or not owned"
        );
        assert_eq!(
            ValidationError::NoAnalyzableDocuments.to_string(),
            "no analyzable documents"
        );
        assert_eq!(
            ValidationError::AllAlreadyAnalyzed.to_string(),
            "all documents already analyzed"
        );
        assert_eq!(ItemError::Cancelled.to_string(), "cancelled by user");
    }

    #[test]
    fn test_validation_error_passes_through_app_error() {
        let err: AppError = ValidationError::NoAnalyzableDocuments.into();
        assert_eq!(err.to_string(), "no analyzable documents");
        assert!(matches!(
            err,
            AppError::Validation(ValidationError::NoAnalyzableDocuments)
        ));
    }

    #[test]
    fn test_engine_error_becomes_item_error() {
        let err = EngineError::EmptyContent {
            model: "gpt-4o-mini".to_string(),
        };
        let item: ItemError = err.into();
        assert!(matches!(item, ItemError::Engine(_)));
    }
}
