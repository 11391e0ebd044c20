//! 图片提取 - 编排层

use anyhow::Result;
use std::path::Path;
use tracing::{info, warn};

use crate::services::image_extractor::{ExtractionSummary, ImageExtractor};

/// 从 HTML 报告中提取所有内嵌图片到 `output_dir`
pub async fn run_extract(
    html_file: &Path,
    output_dir: &Path,
    filename_pattern: &str,
) -> Result<ExtractionSummary> {
    info!("📄 正在读取 HTML: {}", html_file.display());

    let extractor = ImageExtractor::new(filename_pattern)?;
    let summary = extractor.extract_from_file(html_file, output_dir).await?;

    if summary.found == 0 {
        warn!("⚠️ HTML 中没有找到内嵌图片");
    }
    if summary.skipped > 0 {
        warn!("⚠️ {} 张图片解码失败，已跳过", summary.skipped);
    }
    info!(
        "✓ 共提取 {}/{} 张图片到 {}",
        summary.saved.len(),
        summary.found,
        output_dir.display()
    );

    Ok(summary)
}
