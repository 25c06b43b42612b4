use anyhow::Result;
/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use std::fs;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::models::{BatchJob, JobProgress};

/// 初始化 tracing 日志
///
/// 日志级别由 `RUST_LOG` 控制，默认 `info`。重复调用不会报错。
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n批量合规分析日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
///
/// # 参数
/// - `max_concurrent`: 最大并发数
/// - `regulation`: 审查的法规名称
pub fn log_startup(max_concurrent: usize, regulation: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 批量合规分析模式");
    info!("📊 最大并发数: {}", max_concurrent);
    info!("📜 审查法规: {}", regulation);
    info!("{}", "=".repeat(60));
}

/// 记录任务创建信息
///
/// # 参数
/// - `job_id`: 任务ID
/// - `total`: 待分析文档数量
/// - `requested`: 请求的文档数量
pub fn log_job_created(job_id: &str, total: usize, requested: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 已创建任务 {}", job_id);
    info!("📄 请求 {} 个文档，实际分析 {} 个", requested, total);
    info!("{}", "=".repeat(60));
}

/// 记录轮询到的进度
pub fn log_progress(job_id: &str, progress: &JobProgress) {
    info!(
        "⏳ 任务 {} 进度: {}/{} (成功 {}, 失败 {})",
        job_id,
        progress.finished(),
        progress.total,
        progress.completed,
        progress.failed
    );
}

/// 打印最终统计信息
///
/// # 参数
/// - `job`: 已结束的任务快照
/// - `log_file_path`: 日志文件路径
pub fn print_final_stats(job: &BatchJob, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("🏁 任务状态: {}", job.status);
    info!("✅ 成功: {}/{}", job.progress.completed, job.progress.total);
    info!("❌ 失败: {}", job.progress.failed);
    if let Some(error) = &job.error {
        info!("⚠️ 任务错误: {}", error);
    }
    for result in job.results.iter().filter(|r| !r.is_success()) {
        info!(
            "   - {}: {}",
            result.document_id,
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("短文本", 10), "短文本");
        assert_eq!(truncate_text("合规分析任务", 2), "合规...");
    }

    #[test]
    fn test_init_log_file_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.txt");
        init_log_file(path.to_str().unwrap()).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("批量合规分析日志"));
    }
}
