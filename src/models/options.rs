//! 批量分析选项

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// 批量分析选项
///
/// 所有字段都可以单独省略，缺省值与 HTTP 层约定一致。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchAnalysisOptions {
    /// 同时处理的文档数量上限
    pub concurrency: usize,
    /// 首次失败后的额外重试次数
    pub retry_attempts: u32,
    /// 单次尝试的超时时间（毫秒）
    pub timeout_ms: u64,
    /// 跳过已经分析过的文档
    pub skip_duplicates: bool,
    /// 完成后是否发送通知
    pub notify_on_complete: bool,
    /// 取消时是否中断正在进行的尝试
    pub interrupt_on_cancel: bool,
}

impl Default for BatchAnalysisOptions {
    fn default() -> Self {
        Self {
            concurrency: 3,
            retry_attempts: 2,
            timeout_ms: 300_000,
            skip_duplicates: true,
            notify_on_complete: true,
            interrupt_on_cancel: false,
        }
    }
}

impl BatchAnalysisOptions {
    /// 校验选项取值
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.concurrency == 0 {
            return Err(ValidationError::InvalidOptions {
                reason: "concurrency must be positive".to_string(),
            });
        }
        if self.timeout_ms == 0 {
            return Err(ValidationError::InvalidOptions {
                reason: "timeoutMs must be positive".to_string(),
            });
        }
        Ok(())
    }
}
