use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 用户上传的文档
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub owner_id: String,
    #[serde(default)]
    pub title: String,
    /// OCR/文本抽取后的正文，未抽取时为空
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Document {
    /// 是否有可分析的文本
    pub fn has_extractable_content(&self) -> bool {
        self.content
            .as_deref()
            .map(|c| !c.trim().is_empty())
            .unwrap_or(false)
    }
}

/// 分析引擎返回的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub analysis_id: String,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub compliant: Option<bool>,
    #[serde(default)]
    pub findings: Vec<String>,
}

impl AnalysisOutcome {
    pub fn new(analysis_id: impl Into<String>) -> Self {
        Self {
            analysis_id: analysis_id.into(),
            score: None,
            compliant: None,
            findings: Vec::new(),
        }
    }
}

/// 持久化的分析记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub document_id: String,
    pub owner_id: String,
    pub regulation: String,
    pub score: f64,
    pub compliant: bool,
    pub findings: Vec<String>,
    pub created_at: DateTime<Utc>,
}
