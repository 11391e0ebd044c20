//! 批量分级 - 编排层
//!
//! ## 职责
//!
//! 1. **加载**：扫描图片目录（jpg / jpeg / png）
//! 2. **顺序处理**：逐张交给 `GradingFlow`，可配置请求间隔
//! 3. **输出**：运行结束后一次性写出 CSV / JSON / HTML
//! 4. **统计**：汇总已分级 / 不适用 / 失败数量
//!
//! 不做并发，不重试；单张失败只影响该张图片的记录。

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::clients::VisionModel;
use crate::config::Config;
use crate::error::{AppError, FileError};
use crate::models::{list_images, GradingRecord};
use crate::services::report_writer::{self, HtmlReportOptions};
use crate::utils::logging::{log_images_loaded, print_final_stats};
use crate::workflow::{GradingFlow, ImageCtx};

/// 处理统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingStats {
    pub graded: usize,
    pub not_applicable: usize,
    pub failed: usize,
    pub total: usize,
}

impl ProcessingStats {
    pub fn from_records(records: &[GradingRecord]) -> Self {
        records.iter().fold(
            Self {
                total: records.len(),
                ..Default::default()
            },
            |mut stats, r| {
                if r.is_error() {
                    stats.failed += 1;
                } else if r.is_graded() {
                    stats.graded += 1;
                } else {
                    stats.not_applicable += 1;
                }
                stats
            },
        )
    }
}

/// 输出文件路径
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub csv: PathBuf,
    pub json: PathBuf,
    pub html: PathBuf,
}

impl ReportPaths {
    /// `grading_results_<ts>.csv` / `.json`，`grading_report_<ts>.html`
    pub fn in_dir(output_dir: &Path, timestamp: &str) -> Self {
        Self {
            csv: output_dir.join(format!("grading_results_{}.csv", timestamp)),
            json: output_dir.join(format!("grading_results_{}.json", timestamp)),
            html: output_dir.join(format!("grading_report_{}.html", timestamp)),
        }
    }
}

/// 一次批量分级的结果
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub records: Vec<GradingRecord>,
    pub stats: ProcessingStats,
    /// 没有图片时为 None
    pub reports: Option<ReportPaths>,
}

/// 批量分级器
pub struct BatchGrader<M> {
    config: Config,
    flow: GradingFlow<M>,
}

impl<M: VisionModel> BatchGrader<M> {
    pub fn new(config: Config, flow: GradingFlow<M>) -> Self {
        Self { config, flow }
    }

    /// 对 `config.image_dir` 中的所有图片分级并写出报告
    pub async fn run(&self) -> Result<BatchOutcome> {
        let image_dir = &self.config.image_dir;
        if !image_dir.is_dir() {
            return Err(AppError::File(FileError::ImageDirNotFound {
                path: image_dir.display().to_string(),
            })
            .into());
        }

        info!("\n📁 正在扫描图片目录: {}", image_dir.display());
        let images = list_images(image_dir).await?;

        if images.is_empty() {
            warn!("⚠️ 在 {} 中没有找到图片", image_dir.display());
            return Ok(BatchOutcome {
                records: Vec::new(),
                stats: ProcessingStats::default(),
                reports: None,
            });
        }

        log_images_loaded(images.len(), self.flow.model().model_name());

        let records = self.grade_all(&images).await?;
        let stats = ProcessingStats::from_records(&records);

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
        let reports = self.write_reports(&records, &timestamp)?;

        print_final_stats(stats.graded, stats.not_applicable, stats.failed, stats.total);

        Ok(BatchOutcome {
            records,
            stats,
            reports: Some(reports),
        })
    }

    /// 逐张分级
    ///
    /// 致命错误（缺少/无效 API Key）立即中止；其他失败记为 ERROR 并继续。
    pub async fn grade_all(&self, images: &[PathBuf]) -> Result<Vec<GradingRecord>> {
        let total = images.len();
        let delay = Duration::from_millis(self.config.request_delay_ms);
        let mut records = Vec::with_capacity(total);

        for (idx, image_path) in images.iter().enumerate() {
            if idx > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let image_name = image_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let ctx = ImageCtx::new(idx + 1, total, image_name);

            let record = self
                .flow
                .grade_image(image_path, &ctx)
                .await
                .context("分级中止")?;
            records.push(record);
        }

        Ok(records)
    }

    /// 写出 CSV / JSON / HTML
    pub fn write_reports(&self, records: &[GradingRecord], timestamp: &str) -> Result<ReportPaths> {
        let output_dir = &self.config.output_dir;
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("无法创建输出目录: {}", output_dir.display()))?;

        let paths = ReportPaths::in_dir(output_dir, timestamp);
        let opts = HtmlReportOptions {
            model_name: self.flow.model().model_name().to_string(),
            embed_images: self.config.embed_images,
            generated_at: None,
        };

        report_writer::write_csv(records, &paths.csv)?;
        report_writer::write_json(records, &paths.json)?;
        report_writer::write_html(records, &paths.html, &opts)?;

        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_from_records() {
        let records = vec![
            GradingRecord::graded(
                Path::new("D5_1.jpg"),
                crate::models::GardnerGrade::parse("4AA").unwrap(),
                "Good",
                "",
            ),
            GradingRecord::not_applicable(Path::new("D3_1.jpg"), "8-cell"),
            GradingRecord::failed(Path::new("D5_2.jpg"), "timeout"),
        ];
        let stats = ProcessingStats::from_records(&records);
        assert_eq!(
            stats,
            ProcessingStats {
                graded: 1,
                not_applicable: 1,
                failed: 1,
                total: 3
            }
        );
    }

    #[test]
    fn test_report_paths() {
        let paths = ReportPaths::in_dir(Path::new("out"), "20260101_100000");
        assert_eq!(paths.csv, PathBuf::from("out/grading_results_20260101_100000.csv"));
        assert_eq!(paths.html, PathBuf::from("out/grading_report_20260101_100000.html"));
    }
}
