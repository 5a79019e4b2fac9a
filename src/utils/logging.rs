/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use std::path::Path;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// 初始化 tracing 日志，默认级别 info，可用 RUST_LOG 覆盖
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!(
        "🚀 程序启动 - {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("🤖 模型: {} ({:?})", config.model_name, config.api);
    info!("🧠 推理强度: {}", config.reasoning_effort.as_str());
    info!("🌐 服务地址: {}:{}", config.host, config.port);
    info!("📊 最大并发数: {}", config.max_workers);
    info!("{}", "=".repeat(60));
}

/// 记录断点续跑的计划
///
/// # 参数
/// - `total`: 输入记录总数
/// - `done`: 输出文件中已有的记录数
/// - `pending`: 本次需要处理的记录数
pub fn log_run_plan(total: usize, done: usize, pending: usize) {
    info!("📋 总数: {}, 已完成: {}, 待处理: {}", total, done, pending);
}

/// 打印最终统计信息
pub fn print_final_stats(
    success: usize,
    failed: usize,
    total: usize,
    elapsed: Duration,
    output_path: &Path,
) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", success, total);
    info!("❌ 失败: {}", failed);
    info!("⏱️ 耗时: {:.1} 秒", elapsed.as_secs_f64());
    info!("{}", "=".repeat(60));
    info!("\n结果已追加至: {}", output_path.display());
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
