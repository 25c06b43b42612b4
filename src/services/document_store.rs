//! 文档存储服务 - 业务能力层
//!
//! 只负责"读文档 / 存分析结果"能力，不关心任务和流程。
//! 真正的关系型存储在外部实现，这里提供接口和一个内存版本。

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{AnalysisRecord, Document};

/// 文档存储接口
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// 查询 `owner_id` 名下、id 在 `ids` 中的文档
    async fn fetch_documents_by_ids(
        &self,
        ids: &[String],
        owner_id: &str,
    ) -> Result<Vec<Document>, StoreError>;

    /// 查询 `ids` 中已经有分析结果的文档 id
    async fn fetch_existing_analysis_document_ids(
        &self,
        ids: &[String],
        owner_id: &str,
    ) -> Result<Vec<String>, StoreError>;

    /// 读取单个文档的最新正文
    async fn fetch_document_content(
        &self,
        document_id: &str,
        owner_id: &str,
    ) -> Result<Option<String>, StoreError>;

    /// 保存分析结果，返回分析 id
    async fn save_analysis(&self, record: AnalysisRecord) -> Result<String, StoreError>;
}

/// 内存文档存储
#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: DashMap<String, Document>,
    analyses: DashMap<String, AnalysisRecord>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用已加载的文档创建
    pub fn with_documents(documents: impl IntoIterator<Item = Document>) -> Self {
        let store = Self::new();
        for document in documents {
            store.insert_document(document);
        }
        store
    }

    pub fn insert_document(&self, document: Document) {
        self.documents.insert(document.id.clone(), document);
    }

    /// 更新文档正文（模拟文本抽取完成）
    pub fn set_content(&self, document_id: &str, content: Option<String>) -> bool {
        match self.documents.get_mut(document_id) {
            Some(mut doc) => {
                doc.content = content;
                true
            }
            None => false,
        }
    }

    /// 某个用户名下的所有文档 id（按 id 排序）
    pub fn document_ids_for_owner(&self, owner_id: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .documents
            .iter()
            .filter(|entry| entry.owner_id == owner_id)
            .map(|entry| entry.id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn analysis(&self, analysis_id: &str) -> Option<AnalysisRecord> {
        self.analyses.get(analysis_id).map(|r| r.clone())
    }

    pub fn analysis_count(&self) -> usize {
        self.analyses.len()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn fetch_documents_by_ids(
        &self,
        ids: &[String],
        owner_id: &str,
    ) -> Result<Vec<Document>, StoreError> {
        let documents: Vec<Document> = ids
            .iter()
            .filter_map(|id| self.documents.get(id).map(|d| d.clone()))
            .filter(|doc| doc.owner_id == owner_id)
            .collect();
        debug!(
            "查询文档: 请求 {} 个，命中 {} 个 (owner: {})",
            ids.len(),
            documents.len(),
            owner_id
        );
        Ok(documents)
    }

    async fn fetch_existing_analysis_document_ids(
        &self,
        ids: &[String],
        owner_id: &str,
    ) -> Result<Vec<String>, StoreError> {
        let existing: Vec<String> = ids
            .iter()
            .filter(|id| {
                self.analyses
                    .iter()
                    .any(|a| &a.document_id == *id && a.owner_id == owner_id)
            })
            .cloned()
            .collect();
        Ok(existing)
    }

    async fn fetch_document_content(
        &self,
        document_id: &str,
        owner_id: &str,
    ) -> Result<Option<String>, StoreError> {
        let doc = self
            .documents
            .get(document_id)
            .filter(|d| d.owner_id == owner_id)
            .ok_or_else(|| StoreError::DocumentNotFound {
                document_id: document_id.to_string(),
            })?;
        Ok(doc.content.clone().filter(|c| !c.trim().is_empty()))
    }

    async fn save_analysis(&self, record: AnalysisRecord) -> Result<String, StoreError> {
        let analysis_id = Uuid::new_v4().to_string();
        debug!(
            "保存分析结果: 文档 {} -> {}",
            record.document_id, analysis_id
        );
        self.analyses.insert(analysis_id.clone(), record);
        Ok(analysis_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn doc(id: &str, owner: &str, content: Option<&str>) -> Document {
        Document {
            id: id.to_string(),
            owner_id: owner.to_string(),
            title: id.to_string(),
            content: content.map(str::to_string),
        }
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_fetch_is_owner_scoped() {
        let store = InMemoryDocumentStore::with_documents(vec![
            doc("d1", "u1", Some("a")),
            doc("d2", "u2", Some("b")),
        ]);

        let found = store
            .fetch_documents_by_ids(&ids(&["d1", "d2", "d3"]), "u1")
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "d1");

        let content = store.fetch_document_content("d2", "u1").await;
        assert!(matches!(content, Err(StoreError::DocumentNotFound { .. })));
    }

    #[tokio::test]
    async fn test_saved_analysis_marks_document_as_analyzed() {
        let store = InMemoryDocumentStore::with_documents(vec![doc("d1", "u1", Some("a"))]);
        let analysis_id = store
            .save_analysis(AnalysisRecord {
                document_id: "d1".to_string(),
                owner_id: "u1".to_string(),
                regulation: "gdpr".to_string(),
                score: 80.0,
                compliant: true,
                findings: vec![],
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        assert!(store.analysis(&analysis_id).is_some());
        let existing = store
            .fetch_existing_analysis_document_ids(&ids(&["d1"]), "u1")
            .await
            .unwrap();
        assert_eq!(existing, ids(&["d1"]));
        let other_owner = store
            .fetch_existing_analysis_document_ids(&ids(&["d1"]), "u2")
            .await
            .unwrap();
        assert!(other_owner.is_empty());
    }

    #[tokio::test]
    async fn test_blank_content_reads_as_missing() {
        let store = InMemoryDocumentStore::with_documents(vec![doc("d1", "u1", Some("  "))]);
        assert_eq!(store.fetch_document_content("d1", "u1").await.unwrap(), None);
        assert!(store.set_content("d1", Some("text".to_string())));
        assert_eq!(
            store.fetch_document_content("d1", "u1").await.unwrap(),
            Some("text".to_string())
        );
    }
}
