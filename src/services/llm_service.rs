//! LLM 分析引擎 - 业务能力层
//!
//! 只负责"给一份文档打合规分"能力，不关心任务和重试
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini, Doubao 等）

use std::sync::Arc;

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::EngineError;
use crate::models::{AnalysisOutcome, AnalysisRecord, Regulation};
use crate::services::{AnalysisEngine, DocumentStore};
use crate::utils::logging::truncate_text;

/// 模型返回的合规结论
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ComplianceVerdict {
    pub score: f64,
    pub compliant: bool,
    #[serde(default)]
    pub findings: Vec<String>,
}

/// LLM 分析引擎
///
/// 职责：
/// - 调用 LLM API 对单个文档做合规评分
/// - 把结论写入文档存储，返回分析 id
/// - 不处理超时和重试
pub struct LlmAnalysisEngine {
    client: Client<OpenAIConfig>,
    model_name: String,
    regulation: Regulation,
    max_content_chars: usize,
    store: Arc<dyn DocumentStore>,
    json_block: Regex,
}

impl LlmAnalysisEngine {
    /// 创建新的分析引擎
    pub fn new(config: &Config, store: Arc<dyn DocumentStore>) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
            regulation: config.regulation,
            max_content_chars: config.max_content_chars,
            store,
            json_block: json_block_regex(),
        }
    }

    /// 通用的 LLM 调用函数
    ///
    /// # 参数
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（可选）
    ///
    /// # 返回
    /// 返回 LLM 的响应内容（字符串）
    pub async fn send_to_llm(
        &self,
        user_message: &str,
        system_message: Option<&str>,
    ) -> Result<String, EngineError> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()
                .map_err(|e| self.api_error(e))?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(|e| self.api_error(e))?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        // 评分需要稳定输出，温度压低
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(0.1)
            .max_tokens(1024u32)
            .build()
            .map_err(|e| self.api_error(e))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            self.api_error(e)
        })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| EngineError::EmptyContent {
                model: self.model_name.clone(),
            })?;

        Ok(content.trim().to_string())
    }

    /// 构建合规评分消息
    ///
    /// 返回 (user_message, system_message)
    fn build_messages(&self, content: &str) -> (String, String) {
        let system_message = format!(
            "You are a regulatory compliance auditor specialised in {}. \
             You review business documents and report how well they comply. \
             Answer with a single JSON object and nothing else.",
            self.regulation.name()
        );

        let user_message = format!(
            r#"Assess the following document for {regulation} compliance.

Focus areas: {guidance}

Return JSON with exactly these fields:
{{"score": <number 0-100>, "compliant": <true|false>, "findings": [<short strings>]}}

Document:
"""
{content}
""""#,
            regulation = self.regulation.name(),
            guidance = self.regulation.guidance(),
            content = truncate_text(content, self.max_content_chars),
        );

        (user_message, system_message)
    }

    /// 解析模型返回的结论
    ///
    /// 模型经常用 ```json 包裹或在前后加解释，这里取第一个 JSON 对象。
    pub fn parse_verdict(&self, response: &str) -> Result<ComplianceVerdict, EngineError> {
        let unparsable = || EngineError::UnparsableVerdict {
            response: truncate_text(response, 200),
        };

        let candidate = self
            .json_block
            .find(response)
            .map(|m| m.as_str())
            .ok_or_else(unparsable)?;

        let mut verdict: ComplianceVerdict =
            serde_json::from_str(candidate).map_err(|_| unparsable())?;

        if !verdict.score.is_finite() {
            return Err(unparsable());
        }
        verdict.score = verdict.score.clamp(0.0, 100.0);

        Ok(verdict)
    }

    fn api_error(&self, err: impl std::fmt::Display) -> EngineError {
        EngineError::ApiCallFailed {
            model: self.model_name.clone(),
            message: err.to_string(),
        }
    }
}

fn json_block_regex() -> Regex {
    // 字面量正则，编译不会失败
    Regex::new(r"(?s)\{.*\}").expect("valid verdict regex")
}

#[async_trait]
impl AnalysisEngine for LlmAnalysisEngine {
    async fn analyze(
        &self,
        content: &str,
        document_id: &str,
        owner_id: &str,
    ) -> Result<AnalysisOutcome, EngineError> {
        let (user_message, system_message) = self.build_messages(content);
        let response = self
            .send_to_llm(&user_message, Some(&system_message))
            .await?;
        let verdict = self.parse_verdict(&response)?;

        debug!(
            "文档 {} 评分: {:.1} (合规: {})",
            document_id, verdict.score, verdict.compliant
        );

        let analysis_id = self
            .store
            .save_analysis(AnalysisRecord {
                document_id: document_id.to_string(),
                owner_id: owner_id.to_string(),
                regulation: self.regulation.code().to_string(),
                score: verdict.score,
                compliant: verdict.compliant,
                findings: verdict.findings.clone(),
                created_at: Utc::now(),
            })
            .await?;

        Ok(AnalysisOutcome {
            analysis_id,
            score: Some(verdict.score),
            compliant: Some(verdict.compliant),
            findings: verdict.findings,
        })
    }
}
