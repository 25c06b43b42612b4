use crate::models::Document;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 从 TOML 文件加载单个文档
pub async fn load_toml_to_document(toml_file_path: &Path) -> Result<Document> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    let mut document: Document = toml::from_str(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))?;

    // 没有标题时使用文件名
    if document.title.is_empty() {
        document.title = toml_file_path
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
    }

    Ok(document)
}

/// 从文件夹中加载所有 TOML 文档
///
/// 解析失败的文件只记录警告并跳过。
pub async fn load_all_documents(folder_path: &str) -> Result<Vec<Document>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut documents = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            tracing::debug!(
                "正在加载: {}",
                path.file_name().unwrap_or_default().to_string_lossy()
            );

            match load_toml_to_document(&path).await {
                Ok(document) => {
                    if !document.has_extractable_content() {
                        tracing::info!("文档 {} 尚无可分析的文本", document.id);
                    }
                    documents.push(document);
                }
                Err(e) => {
                    tracing::warn!("加载文件失败 {}: {}", path.display(), e);
                }
            }
        }
    }

    // read_dir 顺序不稳定
    documents.sort_by(|a, b| a.id.cmp(&b.id));

    Ok(documents)
}
