use async_trait::async_trait;

use crate::error::EngineError;
use crate::models::AnalysisOutcome;

/// 分析引擎接口
///
/// 对一份文档做合规评分。调用可能很慢、可能失败，也可能一直不返回，
/// 超时由调用方负责。结果的持久化是引擎自己的副作用。
#[async_trait]
pub trait AnalysisEngine: Send + Sync {
    async fn analyze(
        &self,
        content: &str,
        document_id: &str,
        owner_id: &str,
    ) -> Result<AnalysisOutcome, EngineError>;
}
