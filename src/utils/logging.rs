/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化日志
///
/// `RUST_LOG` 优先；否则默认 info，`verbose` 时为 debug。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
///
/// # 参数
/// - `title`: 当前命令的标题
pub fn log_startup(title: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 {}", title);
    info!("{}", "=".repeat(60));
}

/// 记录图片加载信息
///
/// # 参数
/// - `total`: 图片总数
/// - `model_name`: 使用的模型
pub fn log_images_loaded(total: usize, model_name: &str) {
    info!("✓ 找到 {} 张待分级的图片", total);
    info!("🤖 使用模型: {}", model_name);
    info!("{}", "=".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `graded`: 完成分级数量
/// - `not_applicable`: 不适用（非囊胚）数量
/// - `failed`: 失败数量
/// - `total`: 总数
pub fn print_final_stats(graded: usize, not_applicable: usize, failed: usize, total: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 已分级: {}/{}", graded, total);
    info!("➖ 不适用: {}", not_applicable);
    info!("❌ 失败: {}", failed);
    info!("{}", "=".repeat(60));
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
