//! 专家反馈分析 - 业务能力层
//!
//! 读取专家复核 CSV，统计一致率，并根据分歧意见生成提示词补充说明。

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::{AgreementLevel, AgreementStats, FeedbackAnalysis, FeedbackEntry};

static TE_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bte\b").expect("valid regex"));

const STAGE_SECTION: &str = r#"
**CRITICAL: Blastocyst vs Cleavage Stage Identification**
- ONLY embryos with a visible blastocoel cavity can be graded using Gardner Scale
- Day 3 embryos are almost always cleavage-stage (2-8 cells) - mark as N/A
- Compacted morulas without a cavity - mark as N/A
- If you cannot clearly see a fluid-filled blastocoel, default to N/A
"#;

const EXPANSION_SECTION: &str = r#"
**EXPANSION STAGE GUIDELINES (Expert-Refined):**
- Stage 1-2: Blastocoel is smaller than or equal to embryo size
- Stage 3: Blastocoel fills the entire embryo but zona is not thinning
- Stage 4: Embryo is larger than original size, zona is visibly thinner
- Stage 5-6: Embryo is hatching or hatched (rarely seen in Day 5)
- When in doubt between stages, choose the lower number
"#;

const ICM_SECTION: &str = r#"
**ICM QUALITY GUIDELINES (Expert-Refined):**
- Grade A: Many cells (>8), very tightly compacted, clear distinct mass
- Grade B: Several cells (4-8), somewhat loose grouping
- Grade C: Few cells (<4) or very poorly defined
- If ICM is difficult to distinguish, default to grade B, not A
"#;

const TE_SECTION: &str = r#"
**TE QUALITY GUIDELINES (Expert-Refined):**
- Grade A: Many cells forming a smooth, continuous epithelium around entire circumference
- Grade B: Moderate cells, some gaps or irregularity in epithelium
- Grade C: Very few cells, large gaps, or very large/irregular cells
- Look for cohesiveness - even if many cells, gaps = grade B
"#;

/// 专家意见中指出的错误类别
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorClasses {
    pub stage_misidentification: bool,
    pub expansion: bool,
    pub icm: bool,
    pub te: bool,
}

impl ErrorClasses {
    /// 根据专家评论的关键字归类
    pub fn from_comments<'a>(comments: impl IntoIterator<Item = &'a str>) -> Self {
        let mut classes = Self::default();
        for comment in comments {
            let c = comment.to_lowercase();
            if c.contains("not a blastocyst") || c.contains("cleavage") || c.contains("morula") {
                classes.stage_misidentification = true;
            }
            if c.contains("expansion") || c.contains("stage") {
                classes.expansion = true;
            }
            if c.contains("icm") || c.contains("inner cell mass") {
                classes.icm = true;
            }
            if TE_WORD_RE.is_match(&c) || c.contains("trophectoderm") {
                classes.te = true;
            }
        }
        classes
    }
}

/// 读取专家反馈 CSV
pub fn load_feedback(path: &Path) -> AppResult<Vec<FeedbackEntry>> {
    if !path.exists() {
        return Err(crate::error::FileError::NotFound {
            path: path.display().to_string(),
        }
        .into());
    }

    let path_str = path.display().to_string();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| AppError::csv_failed(&path_str, e))?;

    let entries: Vec<FeedbackEntry> = reader
        .deserialize()
        .map(|row| row.map_err(|e| AppError::csv_failed(&path_str, e)))
        .collect::<AppResult<_>>()?;

    info!("✓ 已加载 {} 条专家反馈", entries.len());
    Ok(entries)
}

/// 统计一致率并找出分歧
pub fn analyze(entries: &[FeedbackEntry]) -> FeedbackAnalysis {
    let mut stats = AgreementStats::default();
    let mut discrepancies = Vec::new();

    for entry in entries {
        let level = entry.agreement_level();
        stats.record(level);
        if level != AgreementLevel::Agree {
            discrepancies.push(entry.clone());
        }
    }

    let improvement_recommendations = improved_prompt(&discrepancies);

    FeedbackAnalysis {
        timestamp: chrono::Local::now()
            .format("%Y-%m-%dT%H:%M:%S%.6f")
            .to_string(),
        total_embryos: stats.total,
        agreement_stats: stats,
        accuracy: stats.accuracy(),
        discrepancies,
        improvement_recommendations,
    }
}

/// 根据分歧生成提示词补充说明，没有可识别的错误类别时返回空字符串
pub fn improved_prompt(discrepancies: &[FeedbackEntry]) -> String {
    let classes = ErrorClasses::from_comments(
        discrepancies.iter().map(|d| d.expert_comments.as_str()),
    );

    let mut sections = Vec::new();
    if classes.stage_misidentification {
        sections.push(STAGE_SECTION);
    }
    if classes.expansion {
        sections.push(EXPANSION_SECTION);
    }
    if classes.icm {
        sections.push(ICM_SECTION);
    }
    if classes.te {
        sections.push(TE_SECTION);
    }
    sections.join("\n")
}

/// 保存分析报告（JSON）
pub fn save_analysis(analysis: &FeedbackAnalysis, path: &Path) -> AppResult<()> {
    let json = serde_json::to_string_pretty(analysis)?;
    std::fs::write(path, json)
        .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;
    info!("📄 分析报告已保存: {}", path.display());
    Ok(())
}

/// 在日志中输出统计信息和分歧明细
pub fn log_analysis(analysis: &FeedbackAnalysis) {
    let stats = &analysis.agreement_stats;
    info!("{}", "=".repeat(60));
    info!("📋 反馈分析");
    info!("{}", "=".repeat(60));
    info!("胚胎总数: {}", stats.total);
    info!("✅ 完全一致: {} ({}%)", stats.agree, stats.percentage(stats.agree));
    info!("⚠️ 部分一致: {} ({}%)", stats.partial, stats.percentage(stats.partial));
    info!("❌ 不一致: {} ({}%)", stats.disagree, stats.percentage(stats.disagree));

    if !analysis.discrepancies.is_empty() {
        info!("\n📊 分歧明细 ({} 条):", analysis.discrepancies.len());
        for disc in &analysis.discrepancies {
            info!("  {}", or_dash(&disc.image_name));
            info!("    AI 分级: {}", or_dash(&disc.ai_grade));
            info!("    专家分级: {}", or_dash(&disc.expert_grade));
            info!("    意见: {}", or_dash(&disc.expert_comments));
        }
    }
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() {
        "-"
    } else {
        s
    }
}
