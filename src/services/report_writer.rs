//! 报告输出服务 - 业务能力层
//!
//! 把分级记录写成 CSV / JSON / HTML 三种格式。

use std::fmt::Write as _;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::models::{mime_type_for, ExpansionStage, GradingRecord, ImagePayload, CSV_HEADERS};

/// 写 CSV，列顺序见 `CSV_HEADERS`，不包含 full_response
pub fn write_csv(records: &[GradingRecord], path: &Path) -> AppResult<()> {
    if records.is_empty() {
        warn!("⚠️ 没有结果可保存");
        return Ok(());
    }

    let path_str = path.display().to_string();
    let mut writer =
        csv::Writer::from_path(path).map_err(|e| AppError::csv_failed(&path_str, e))?;

    writer
        .write_record(CSV_HEADERS)
        .map_err(|e| AppError::csv_failed(&path_str, e))?;
    for record in records {
        writer
            .write_record(record.csv_row())
            .map_err(|e| AppError::csv_failed(&path_str, e))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::file_write_failed(&path_str, e))?;

    info!("💾 CSV 结果已保存: {}", path.display());
    Ok(())
}

/// 读回 CSV 结果文件
pub fn read_csv(path: &Path) -> AppResult<Vec<GradingRecord>> {
    let path_str = path.display().to_string();
    let mut reader =
        csv::Reader::from_path(path).map_err(|e| AppError::csv_failed(&path_str, e))?;

    reader
        .deserialize()
        .map(|row| row.map_err(|e| AppError::csv_failed(&path_str, e)))
        .collect()
}

/// 写完整 JSON（包含模型原始回复）
pub fn write_json(records: &[GradingRecord], path: &Path) -> AppResult<()> {
    if records.is_empty() {
        warn!("⚠️ 没有结果可保存");
        return Ok(());
    }

    let json = serde_json::to_string_pretty(records)?;
    std::fs::write(path, json)
        .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;

    info!("💾 JSON 结果已保存: {}", path.display());
    Ok(())
}

/// HTML 报告选项
#[derive(Debug, Clone)]
pub struct HtmlReportOptions {
    /// 报告中显示的模型名称
    pub model_name: String,
    /// 图片以 data URI 内嵌；读取失败时退回文件路径
    pub embed_images: bool,
    /// 生成时间，为空时使用当前时间
    pub generated_at: Option<String>,
}

impl Default for HtmlReportOptions {
    fn default() -> Self {
        Self {
            model_name: "Google Gemini 2.0 Flash".to_string(),
            embed_images: true,
            generated_at: None,
        }
    }
}

/// 写 HTML 报告
pub fn write_html(
    records: &[GradingRecord],
    path: &Path,
    opts: &HtmlReportOptions,
) -> AppResult<()> {
    if records.is_empty() {
        warn!("⚠️ 没有结果可生成报告");
        return Ok(());
    }

    let html = render_html(records, opts);
    std::fs::write(path, html)
        .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;

    info!("📊 HTML 报告已保存: {}", path.display());
    Ok(())
}

const REPORT_CSS: &str = r#"
        body { font-family: Arial, sans-serif; max-width: 1200px; margin: 0 auto; padding: 20px; background: #f5f5f5; }
        h1 { text-align: center; color: #333; }
        .summary { background: white; padding: 20px; margin-bottom: 30px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }
        .embryo-card { background: white; padding: 20px; margin-bottom: 20px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); display: flex; gap: 20px; }
        .image-container { flex: 0 0 300px; }
        .image-container img { width: 100%; border-radius: 4px; border: 2px solid #ddd; }
        .details { flex: 1; }
        .grade-badge { display: inline-block; font-size: 24px; font-weight: bold; padding: 10px 20px; border-radius: 4px; background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); color: white; }
        .grade-error { background: #dc3545; }
        .metric { margin: 10px 0; padding: 10px; background: #f8f9fa; border-radius: 4px; border-left: 4px solid #667eea; }
        .quality-good { border-left-color: #28a745; }
        .quality-fair { border-left-color: #ffc107; }
        .quality-poor { border-left-color: #dc3545; }
        .explanation { margin-top: 15px; padding: 15px; background: #f8f9fa; border-radius: 4px; color: #555; line-height: 1.6; }
        table { width: 100%; border-collapse: collapse; }
        th, td { padding: 10px; text-align: left; border-bottom: 1px solid #ddd; }
        th { background: #f8f9fa; font-weight: bold; }
"#;

/// 渲染 HTML 报告（不做 I/O，图片内嵌除外）
pub fn render_html(records: &[GradingRecord], opts: &HtmlReportOptions) -> String {
    let generated = opts.generated_at.clone().unwrap_or_else(|| {
        chrono::Local::now()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    });

    let graded = records.iter().filter(|r| r.is_graded()).count();
    let not_applicable = records.iter().filter(|r| r.is_not_applicable()).count();
    let errors = records.iter().filter(|r| r.is_error()).count();

    let mut out = String::with_capacity(16 * 1024);
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n    <meta charset=\"utf-8\">\n");
    out.push_str("    <title>Embryo Grading Report</title>\n    <style>");
    out.push_str(REPORT_CSS);
    out.push_str("    </style>\n</head>\n<body>\n    <h1>🔬 Embryo Grading Report</h1>\n\n");

    // 汇总
    let _ = write!(
        out,
        r#"    <div class="summary">
        <h2>Summary</h2>
        <table>
            <tr><th>Total Images</th><td>{}</td></tr>
            <tr><th>Graded</th><td>{}</td></tr>
            <tr><th>Not Applicable</th><td>{}</td></tr>
            <tr><th>Errors</th><td>{}</td></tr>
            <tr><th>Model</th><td>{}</td></tr>
            <tr><th>Grading Scale</th><td>Gardner Scale</td></tr>
            <tr><th>Generated</th><td>{}</td></tr>
        </table>
    </div>

    <h2>Individual Assessments</h2>
"#,
        records.len(),
        graded,
        not_applicable,
        errors,
        esc(&opts.model_name),
        esc(&generated),
    );

    for record in records {
        render_card(&mut out, record, opts.embed_images);
    }

    out.push_str("</body>\n</html>\n");
    out
}

fn render_card(out: &mut String, record: &GradingRecord, embed_images: bool) {
    let image_src = if embed_images {
        embed_image(Path::new(&record.image_path)).unwrap_or_else(|| record.image_path.clone())
    } else {
        record.image_path.clone()
    };
    let stage = ExpansionStage::parse(&record.expansion)
        .map(|s| format!(" ({})", s.description()))
        .unwrap_or_default();
    let badge_class = if record.is_error() {
        "grade-badge grade-error"
    } else {
        "grade-badge"
    };

    let _ = write!(
        out,
        r#"
    <div class="embryo-card">
        <div class="image-container">
            <img src="{src}" alt="{name}">
        </div>
        <div class="details">
            <h3>{name}</h3>
            <div class="{badge_class}">{grade}</div>
            <div class="metric {quality_class}">
                <strong>Expansion:</strong> {expansion}{stage} |
                <strong>ICM:</strong> {icm} |
                <strong>TE:</strong> {te} |
                <strong>Quality:</strong> {quality}
            </div>
            <div class="explanation">
                <strong>Analysis:</strong> {explanation}
            </div>
        </div>
    </div>
"#,
        src = esc(&image_src),
        name = esc(&record.image_name),
        badge_class = badge_class,
        grade = esc(&record.gardner_grade),
        quality_class = quality_class(&record.quality_score),
        expansion = esc(&record.expansion),
        stage = esc(&stage),
        icm = esc(&record.icm_quality),
        te = esc(&record.te_quality),
        quality = esc(&record.quality_score),
        explanation = esc(&record.explanation),
    );
}

/// 按整体质量选择卡片边框样式
pub fn quality_class(quality: &str) -> &'static str {
    let q = quality.to_lowercase();
    if q.contains("good") {
        "quality-good"
    } else if q.contains("fair") {
        "quality-fair"
    } else if q.contains("poor") {
        "quality-poor"
    } else {
        ""
    }
}

fn embed_image(path: &Path) -> Option<String> {
    let mime_type = mime_type_for(path)?;
    let data = std::fs::read(path).ok()?;
    Some(ImagePayload::new(mime_type, data).data_url())
}

/// HTML 转义
fn esc(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, grade: &str, quality: &str, explanation: &str) -> GradingRecord {
        GradingRecord {
            image_name: name.to_string(),
            gardner_grade: grade.to_string(),
            expansion: grade.chars().next().map(String::from).unwrap_or_default(),
            icm_quality: "A".to_string(),
            te_quality: "B".to_string(),
            quality_score: quality.to_string(),
            explanation: explanation.to_string(),
            timestamp: "2026-01-01T10:00:00.000000".to_string(),
            image_path: format!("missing_dir/{}", name),
            full_response: String::new(),
        }
    }

    #[test]
    fn test_quality_class() {
        assert_eq!(quality_class("Good"), "quality-good");
        assert_eq!(quality_class("fair-ish"), "quality-fair");
        assert_eq!(quality_class("POOR"), "quality-poor");
        assert_eq!(quality_class("Not Applicable"), "");
    }

    #[test]
    fn test_render_escapes_text() {
        let records = vec![record("D5_1.jpg", "4AB", "Good", "ICM <dense> & \"tight\"")];
        let html = render_html(&records, &HtmlReportOptions::default());

        assert!(html.contains("ICM &lt;dense&gt; &amp; &quot;tight&quot;"));
        assert!(!html.contains("<dense>"));
    }

    #[test]
    fn test_render_summary_counts() {
        let mut failed = record("D5_2.jpg", "ERROR", "ERROR", "Error during grading: boom");
        failed.expansion = "ERROR".to_string();
        let records = vec![
            record("D5_1.jpg", "4AB", "Good", "ok"),
            record("D3_1.jpg", "N/A", "Not Applicable", "cleavage"),
            failed,
        ];
        let opts = HtmlReportOptions {
            generated_at: Some("2026-01-01 10:00:00".to_string()),
            ..HtmlReportOptions::default()
        };
        let html = render_html(&records, &opts);

        assert!(html.contains("<tr><th>Total Images</th><td>3</td></tr>"));
        assert!(html.contains("<tr><th>Graded</th><td>1</td></tr>"));
        assert!(html.contains("<tr><th>Not Applicable</th><td>1</td></tr>"));
        assert!(html.contains("<tr><th>Errors</th><td>1</td></tr>"));
        assert!(html.contains("grade-badge grade-error"));
        assert_eq!(html.matches("class=\"embryo-card\"").count(), 3);
    }

    #[test]
    fn test_card_names_expansion_stage() {
        let mut not_applicable = record("D3_1.jpg", "N/A", "Not Applicable", "cleavage");
        not_applicable.expansion = "N/A".to_string();
        let records = vec![record("D5_1.jpg", "4AB", "Good", "ok"), not_applicable];
        let html = render_html(&records, &HtmlReportOptions::default());
        assert!(html.contains("<strong>Expansion:</strong> 4 (Expanded blastocyst) |"));
        assert!(html.contains("<strong>Expansion:</strong> N/A |"));
    }

    #[test]
    fn test_unreadable_image_falls_back_to_path() {
        let records = vec![record("D5_1.jpg", "4AB", "Good", "ok")];
        let html = render_html(&records, &HtmlReportOptions::default());
        assert!(html.contains("src=\"missing_dir/D5_1.jpg\""));
    }
}
