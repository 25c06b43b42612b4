//! 文档处理上下文
//!
//! 封装"我正在处理哪个任务的第几个文档"这一信息

use std::fmt::Display;

/// 文档处理上下文
///
/// 包含处理单个文档所需的所有上下文信息
#[derive(Debug, Clone)]
pub struct ItemCtx {
    /// 任务ID
    pub job_id: String,

    /// 任务所属用户
    pub owner_id: String,

    /// 文档ID
    pub document_id: String,

    /// 文档在任务中的序号（从1开始，仅用于日志显示）
    pub item_index: usize,

    /// 任务中的文档总数
    pub total: usize,
}

impl ItemCtx {
    /// 创建新的文档上下文
    pub fn new(
        job_id: impl Into<String>,
        owner_id: impl Into<String>,
        document_id: impl Into<String>,
        item_index: usize,
        total: usize,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            owner_id: owner_id.into(),
            document_id: document_id.into(),
            item_index,
            total,
        }
    }
}

impl Display for ItemCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[任务 {} 文档#{} {}/{}]",
            self.job_id, self.document_id, self.item_index, self.total
        )
    }
}
