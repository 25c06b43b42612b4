//! 准入校验 - 编排层
//!
//! 创建任务前确认：文档都属于请求用户、都有可分析的文本、
//! （可选）之前没有分析过。只有这里的错误会同步返回给调用方。

use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;

use crate::error::{AppResult, ValidationError};
use crate::services::DocumentStore;

/// 准入校验器
pub struct EligibilityValidator {
    documents: Arc<dyn DocumentStore>,
}

impl EligibilityValidator {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    /// 返回可以进入任务的文档 id，保持请求中的相对顺序
    pub async fn validate(
        &self,
        owner_id: &str,
        requested: &[String],
        skip_duplicates: bool,
    ) -> AppResult<Vec<String>> {
        if requested.is_empty() {
            return Err(ValidationError::EmptyRequest.into());
        }

        let mut seen = HashSet::with_capacity(requested.len());
        for id in requested {
            if !seen.insert(id.as_str()) {
                return Err(ValidationError::DuplicateDocument {
                    document_id: id.clone(),
                }
                .into());
            }
        }

        // 1. 归属校验：少一个都不行
        let owned = self
            .documents
            .fetch_documents_by_ids(requested, owner_id)
            .await?;
        if owned.len() != requested.len() {
            return Err(ValidationError::DocumentsNotFound.into());
        }

        // 2. 过滤没有文本的文档
        let analyzable: HashSet<&str> = owned
            .iter()
            .filter(|doc| doc.has_extractable_content())
            .map(|doc| doc.id.as_str())
            .collect();
        let mut eligible: Vec<String> = requested
            .iter()
            .filter(|id| analyzable.contains(id.as_str()))
            .cloned()
            .collect();
        if eligible.is_empty() {
            return Err(ValidationError::NoAnalyzableDocuments.into());
        }

        // 3. 跳过已分析过的文档
        if skip_duplicates {
            let existing: HashSet<String> = self
                .documents
                .fetch_existing_analysis_document_ids(&eligible, owner_id)
                .await?
                .into_iter()
                .collect();
            if !existing.is_empty() {
                let before = eligible.len();
                eligible.retain(|id| !existing.contains(id));
                info!(
                    owner_id = %owner_id,
                    skipped = before - eligible.len(),
                    "跳过 {} 个已分析的文档",
                    before - eligible.len()
                );
            }
            if eligible.is_empty() {
                return Err(ValidationError::AllAlreadyAnalyzed.into());
            }
        }

        Ok(eligible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{AnalysisRecord, Document};
    use crate::services::InMemoryDocumentStore;
    use chrono::Utc;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    async fn setup() -> (Arc<InMemoryDocumentStore>, EligibilityValidator) {
        let store = Arc::new(InMemoryDocumentStore::with_documents(vec![
            Document {
                id: "d1".to_string(),
                owner_id: "u1".to_string(),
                title: String::new(),
                content: Some("policy one".to_string()),
            },
            Document {
                id: "d2".to_string(),
                owner_id: "u1".to_string(),
                title: String::new(),
                content: None,
            },
            Document {
                id: "d3".to_string(),
                owner_id: "u1".to_string(),
                title: String::new(),
                content: Some("policy three".to_string()),
            },
            Document {
                id: "x1".to_string(),
                owner_id: "u2".to_string(),
                title: String::new(),
                content: Some("someone else".to_string()),
            },
        ]));
        let validator = EligibilityValidator::new(store.clone());
        (store, validator)
    }

    async fn mark_analyzed(store: &InMemoryDocumentStore, document_id: &str) {
        store
            .save_analysis(AnalysisRecord {
                document_id: document_id.to_string(),
                owner_id: "u1".to_string(),
                regulation: "gdpr".to_string(),
                score: 90.0,
                compliant: true,
                findings: vec![],
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    fn validation(err: AppError) -> ValidationError {
        match err {
            AppError::Validation(v) => v,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_filters_and_keeps_order() {
        let (_, validator) = setup().await;
        let eligible = validator
            .validate("u1", &ids(&["d3", "d2", "d1"]), true)
            .await
            .unwrap();
        assert_eq!(eligible, ids(&["d3", "d1"]));
    }

    #[tokio::test]
    async fn test_partial_ownership_is_rejected() {
        let (_, validator) = setup().await;
        let err = validator
            .validate("u1", &ids(&["d1", "x1"]), true)
            .await
            .unwrap_err();
        assert_eq!(validation(err), ValidationError::DocumentsNotFound);

        let err = validator
            .validate("u1", &ids(&["nope"]), true)
            .await
            .unwrap_err();
        assert_eq!(validation(err), ValidationError::DocumentsNotFound);
    }

    #[tokio::test]
    async fn test_no_analyzable_documents() {
        let (_, validator) = setup().await;
        let err = validator.validate("u1", &ids(&["d2"]), true).await.unwrap_err();
        assert_eq!(validation(err), ValidationError::NoAnalyzableDocuments);
    }

    #[tokio::test]
    async fn test_skip_duplicates() {
        let (store, validator) = setup().await;
        mark_analyzed(&store, "d1").await;

        let eligible = validator
            .validate("u1", &ids(&["d1", "d3"]), true)
            .await
            .unwrap();
        assert_eq!(eligible, ids(&["d3"]));

        let eligible = validator
            .validate("u1", &ids(&["d1", "d3"]), false)
            .await
            .unwrap();
        assert_eq!(eligible, ids(&["d1", "d3"]));

        mark_analyzed(&store, "d3").await;
        let err = validator
            .validate("u1", &ids(&["d1", "d3"]), true)
            .await
            .unwrap_err();
        assert_eq!(validation(err), ValidationError::AllAlreadyAnalyzed);
    }

    #[tokio::test]
    async fn test_rejects_empty_and_duplicate_requests() {
        let (_, validator) = setup().await;
        let err = validator.validate("u1", &[], true).await.unwrap_err();
        assert_eq!(validation(err), ValidationError::EmptyRequest);

        let err = validator
            .validate("u1", &ids(&["d1", "d1"]), true)
            .await
            .unwrap_err();
        assert_eq!(
            validation(err),
            ValidationError::DuplicateDocument {
                document_id: "d1".to_string()
            }
        );
    }
}
