//! 程序配置
//!
//! 加载顺序：内置默认值 → `COMPLIANCE_CONFIG` 指向的 TOML 文件（可选）→ 环境变量。

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;
use crate::models::{BatchAnalysisOptions, Regulation};

/// 指定配置文件路径的环境变量
pub const CONFIG_PATH_ENV: &str = "COMPLIANCE_CONFIG";

/// 保留时长上限：10 年
pub const MAX_RETENTION_HOURS: i64 = 24 * 365 * 10;

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 未显式指定时使用的批量分析选项
    pub batch_options: BatchAnalysisOptions,
    /// 结束任务的保留时长（小时）
    pub retention_hours: i64,
    /// 过期清理间隔（秒）
    pub sweep_interval_secs: u64,
    /// 命令行运行时的状态轮询间隔（毫秒）
    pub poll_interval_ms: u64,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    /// 审查的法规
    #[serde(deserialize_with = "deserialize_regulation")]
    pub regulation: Regulation,
    /// 送入模型的最大字符数
    pub max_content_chars: usize,
    // --- 命令行运行 ---
    /// TOML 文档存放目录
    pub document_folder: String,
    /// 提交任务的用户
    pub owner_id: String,
    /// 要分析的文档，为空时分析该用户的全部文档
    pub document_ids: Vec<String>,
    /// 输出日志文件
    pub output_log_file: String,
    // --- 通知 ---
    /// 完成通知追加写入的文件
    pub notify_file: String,
    /// 完成通知的 Webhook 地址
    pub webhook_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            batch_options: BatchAnalysisOptions::default(),
            retention_hours: 24,
            sweep_interval_secs: 3600,
            poll_interval_ms: 1000,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            regulation: Regulation::Gdpr,
            max_content_chars: 20_000,
            document_folder: "documents".to_string(),
            owner_id: "local".to_string(),
            document_ids: Vec::new(),
            output_log_file: "output.txt".to_string(),
            notify_file: "notifications.txt".to_string(),
            webhook_url: None,
        }
    }
}

impl Config {
    /// 默认值加环境变量覆盖
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载，缺失字段使用默认值
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseFailed {
            path: path.display().to_string(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 完整加载：配置文件（如果指定了）再叠加环境变量
    pub fn load() -> Result<Self, ConfigError> {
        let base = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_toml_file(path.trim())?,
            _ => Self::default(),
        };
        base.with_env_overrides()
    }

    /// 用环境变量覆盖当前值
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        let options = &mut self.batch_options;
        override_parsed(&mut options.concurrency, "MAX_CONCURRENT", "usize")?;
        override_parsed(&mut options.retry_attempts, "RETRY_ATTEMPTS", "u32")?;
        override_parsed(&mut options.timeout_ms, "TIMEOUT_MS", "u64")?;
        override_parsed(&mut options.skip_duplicates, "SKIP_DUPLICATES", "bool")?;
        override_parsed(&mut options.notify_on_complete, "NOTIFY_ON_COMPLETE", "bool")?;
        override_parsed(&mut options.interrupt_on_cancel, "INTERRUPT_ON_CANCEL", "bool")?;

        override_parsed(&mut self.retention_hours, "RETENTION_HOURS", "i64")?;
        override_parsed(&mut self.sweep_interval_secs, "SWEEP_INTERVAL_SECS", "u64")?;
        override_parsed(&mut self.poll_interval_ms, "POLL_INTERVAL_MS", "u64")?;
        override_parsed(&mut self.max_content_chars, "MAX_CONTENT_CHARS", "usize")?;

        override_string(&mut self.llm_api_key, "LLM_API_KEY");
        override_string(&mut self.llm_api_base_url, "LLM_API_BASE_URL");
        override_string(&mut self.llm_model_name, "LLM_MODEL_NAME");
        override_string(&mut self.document_folder, "DOCUMENT_FOLDER");
        override_string(&mut self.owner_id, "OWNER_ID");
        override_string(&mut self.output_log_file, "OUTPUT_LOG_FILE");
        override_string(&mut self.notify_file, "NOTIFY_FILE");

        if let Ok(value) = std::env::var("REGULATION") {
            self.regulation =
                Regulation::from_str(&value).ok_or_else(|| ConfigError::EnvVarParseFailed {
                    var_name: "REGULATION".to_string(),
                    value: value.clone(),
                    expected_type: "regulation".to_string(),
                })?;
        }
        if let Ok(value) = std::env::var("DOCUMENT_IDS") {
            self.document_ids = split_list(&value);
        }
        if let Ok(value) = std::env::var("WEBHOOK_URL") {
            self.webhook_url = Some(value).filter(|v| !v.trim().is_empty());
        }

        self.validate()?;
        Ok(self)
    }

    /// 检查取值范围
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_RETENTION_HOURS).contains(&self.retention_hours) {
            return Err(ConfigError::InvalidValue {
                field: "retention_hours".to_string(),
                value: self.retention_hours.to_string(),
                reason: format!("must be between 1 and {}", MAX_RETENTION_HOURS),
            });
        }
        Ok(())
    }

    /// 保留时长，超出范围的取值被夹到合法区间
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::hours(self.retention_hours.clamp(1, MAX_RETENTION_HOURS))
    }
}

fn override_parsed<T: FromStr>(
    target: &mut T,
    var_name: &str,
    expected_type: &str,
) -> Result<(), ConfigError> {
    if let Ok(value) = std::env::var(var_name) {
        *target = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value: value.clone(),
                expected_type: expected_type.to_string(),
            })?;
    }
    Ok(())
}

fn override_string(target: &mut String, var_name: &str) {
    if let Ok(value) = std::env::var(var_name) {
        *target = value;
    }
}

/// 逗号分隔的列表，忽略空项
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn deserialize_regulation<'de, D>(deserializer: D) -> Result<Regulation, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Regulation::from_str(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unknown regulation: {}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.batch_options, BatchAnalysisOptions::default());
        assert_eq!(config.retention_hours, 24);
        assert_eq!(config.retention(), chrono::Duration::hours(24));
        assert!(config.document_ids.is_empty());
        assert!(config.webhook_url.is_none());
    }

    #[test]
    fn test_from_toml_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
regulation = "PCI DSS"
owner_id = "u1"
document_ids = ["d1", "d2"]
webhook_url = "http://localhost:9000/hook"

[batch_options]
concurrency = 5
retryAttempts = 1
"#
        )
        .unwrap();

        let config = Config::from_toml_file(file.path()).unwrap();
        assert_eq!(config.regulation, Regulation::PciDss);
        assert_eq!(config.owner_id, "u1");
        assert_eq!(config.document_ids, vec!["d1", "d2"]);
        assert_eq!(config.batch_options.concurrency, 5);
        assert_eq!(config.batch_options.retry_attempts, 1);
        // 没写的字段保持默认
        assert_eq!(config.batch_options.timeout_ms, 300_000);
        assert_eq!(config.sweep_interval_secs, 3600);
        assert_eq!(
            config.webhook_url.as_deref(),
            Some("http://localhost:9000/hook")
        );
    }

    #[test]
    fn test_from_toml_file_errors() {
        assert!(matches!(
            Config::from_toml_file("/definitely/not/here.toml"),
            Err(ConfigError::ReadFailed { .. })
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "regulation = \"made-up\"").unwrap();
        assert!(matches!(
            Config::from_toml_file(file.path()),
            Err(ConfigError::TomlParseFailed { .. })
        ));
    }

    #[test]
    fn test_retention_hours_range_is_checked() {
        for bad in [0, -5, MAX_RETENTION_HOURS + 1, 1_000_000_000_000, i64::MAX / 1000] {
            let config = Config {
                retention_hours: bad,
                ..Config::default()
            };
            assert!(
                matches!(config.validate(), Err(ConfigError::InvalidValue { .. })),
                "retention_hours {} should be rejected",
                bad
            );
            // 即使没校验，计算保留时长和截止时间也不会 panic
            let cutoff = chrono::Utc::now().checked_sub_signed(config.retention());
            assert!(cutoff.is_some());
        }

        let config = Config {
            retention_hours: MAX_RETENTION_HOURS,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_file_rejects_bad_retention() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "retention_hours = -1").unwrap();
        assert!(matches!(
            Config::from_toml_file(file.path()),
            Err(ConfigError::InvalidValue { .. })
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "retention_hours = 1000000000000").unwrap();
        assert!(matches!(
            Config::from_toml_file(file.path()),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" d1, d2 ,,d3 "), vec!["d1", "d2", "d3"]);
        assert!(split_list("").is_empty());
    }
}
