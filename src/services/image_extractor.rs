//! 图片提取服务 - 业务能力层
//!
//! 从 HTML 报告中取出 base64 内嵌图片并写成独立文件。

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult, ExtractError};

static DATA_URI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"data:image/(jpeg|jpg|png);base64,([A-Za-z0-9+/=]+)").expect("valid regex")
});

/// 提取结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionSummary {
    /// HTML 中找到的内嵌图片数量
    pub found: usize,
    /// 成功写出的文件
    pub saved: Vec<PathBuf>,
    /// 解码失败被跳过的数量
    pub skipped: usize,
}

/// 从 HTML 中解析出的一张图片（尚未写盘）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub file_name: String,
    pub data: Vec<u8>,
}

/// 图片提取服务
pub struct ImageExtractor {
    filename_re: Regex,
}

impl ImageExtractor {
    /// 使用自定义的文件名正则创建
    pub fn new(filename_pattern: &str) -> AppResult<Self> {
        let filename_re = Regex::new(&format!("({})", filename_pattern))
            .map_err(|e| AppError::Extract(ExtractError::InvalidPattern(e)))?;
        Ok(Self { filename_re })
    }

    /// 读取 HTML 文件并把图片写入 `output_dir`
    pub async fn extract_from_file(
        &self,
        html_file: &Path,
        output_dir: &Path,
    ) -> AppResult<ExtractionSummary> {
        if !html_file.exists() {
            return Err(crate::error::FileError::NotFound {
                path: html_file.display().to_string(),
            }
            .into());
        }

        let html = fs::read_to_string(html_file)
            .await
            .map_err(|e| AppError::file_read_failed(html_file.display().to_string(), e))?;

        info!("📄 正在解析 {}", html_file.display());
        self.extract_from_str(&html, output_dir).await
    }

    /// 从 HTML 字符串中提取图片并写入 `output_dir`
    pub async fn extract_from_str(
        &self,
        html: &str,
        output_dir: &Path,
    ) -> AppResult<ExtractionSummary> {
        fs::create_dir_all(output_dir)
            .await
            .map_err(|e| AppError::file_write_failed(output_dir.display().to_string(), e))?;

        let (images, found) = self.decode_all(html);
        let mut summary = ExtractionSummary {
            found,
            skipped: found - images.len(),
            ..Default::default()
        };

        for image in images {
            let output_file = output_dir.join(&image.file_name);
            match fs::write(&output_file, &image.data).await {
                Ok(()) => {
                    info!("✓ 已保存: {} ({} bytes)", output_file.display(), image.data.len());
                    summary.saved.push(output_file);
                }
                Err(e) => {
                    warn!("⚠️ 保存图片失败 {}: {}", output_file.display(), e);
                    summary.skipped += 1;
                }
            }
        }

        info!(
            "✅ 共提取 {} 张图片到 {}",
            summary.saved.len(),
            output_dir.display()
        );
        Ok(summary)
    }

    /// 解析出所有可解码的图片，并分配互不相同的文件名
    ///
    /// 返回 (图片列表, HTML 中找到的图片总数)
    pub fn decode_all(&self, html: &str) -> (Vec<EmbeddedImage>, usize) {
        let payloads: Vec<(&str, &str)> = DATA_URI_RE
            .captures_iter(html)
            .filter_map(|c| Some((c.get(1)?.as_str(), c.get(2)?.as_str())))
            .collect();
        let names = self.find_file_names(html);

        info!("🔍 在 HTML 中找到 {} 张内嵌图片", payloads.len());
        if names.len() != payloads.len() {
            warn!(
                "⚠️ 找到 {} 个文件名但有 {} 张图片，缺少的文件名使用通用命名",
                names.len(),
                payloads.len()
            );
        }

        let mut used: HashSet<String> = HashSet::new();
        let mut images = Vec::with_capacity(payloads.len());

        for (i, (subtype, payload)) in payloads.iter().enumerate() {
            let data = match STANDARD.decode(payload) {
                Ok(data) => data,
                Err(source) => {
                    let err = ExtractError::DecodeFailed { index: i + 1, source };
                    warn!("⚠️ {}", err);
                    continue;
                }
            };

            let candidate = names.get(i).cloned().unwrap_or_else(|| {
                let ext = if *subtype == "png" { "png" } else { "jpg" };
                format!("embryo_{:02}.{}", i + 1, ext)
            });
            let file_name = unique_name(candidate, &mut used);
            debug!("第 {} 张图片命名为 {}", i + 1, file_name);

            images.push(EmbeddedImage { file_name, data });
        }

        (images, payloads.len())
    }

    /// 按出现顺序去重的文件名列表
    fn find_file_names(&self, html: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.filename_re
            .find_iter(html)
            .map(|m| m.as_str().to_string())
            .filter(|name| seen.insert(name.clone()))
            .collect()
    }
}

/// 已被占用时追加 `_2`、`_3` 后缀
fn unique_name(candidate: String, used: &mut HashSet<String>) -> String {
    if used.insert(candidate.clone()) {
        return candidate;
    }

    let path = Path::new(&candidate);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| candidate.clone());
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut n = 2;
    loop {
        let name = format!("{}_{}{}", stem, n, ext);
        if used.insert(name.clone()) {
            return name;
        }
        n += 1;
    }
}
