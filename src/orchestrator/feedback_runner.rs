//! 专家反馈处理 - 编排层
//!
//! 读取反馈 CSV → 统计分析 → 保存分析报告和补充提示词。
//! 是否用新提示词重新分级由调用方决定。

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::models::FeedbackAnalysis;
use crate::services::feedback_analyzer;

/// 一次反馈分析的结果
#[derive(Debug, Clone)]
pub struct FeedbackOutcome {
    pub analysis: FeedbackAnalysis,
    pub analysis_path: PathBuf,
    pub prompt_path: PathBuf,
}

impl FeedbackOutcome {
    /// 补充提示词，没有可识别的错误类别时为 None
    pub fn supplement(&self) -> Option<&str> {
        let text = self.analysis.improvement_recommendations.as_str();
        (!text.trim().is_empty()).then_some(text)
    }
}

/// 分析反馈文件并把结果写入 `output_dir`
///
/// 输出 `feedback_analysis_<ts>.json` 和 `improved_prompt_<ts>.txt`
pub fn run_feedback_analysis(feedback_csv: &Path, output_dir: &Path) -> Result<FeedbackOutcome> {
    info!("📥 正在读取专家反馈: {}", feedback_csv.display());
    let entries = feedback_analyzer::load_feedback(feedback_csv)?;

    if entries.is_empty() {
        warn!("⚠️ 反馈文件中没有任何记录");
    }

    let analysis = feedback_analyzer::analyze(&entries);
    feedback_analyzer::log_analysis(&analysis);

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("无法创建输出目录: {}", output_dir.display()))?;

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let analysis_path = output_dir.join(format!("feedback_analysis_{}.json", timestamp));
    let prompt_path = output_dir.join(format!("improved_prompt_{}.txt", timestamp));

    feedback_analyzer::save_analysis(&analysis, &analysis_path)?;

    std::fs::write(&prompt_path, &analysis.improvement_recommendations)
        .with_context(|| format!("无法写入提示词文件: {}", prompt_path.display()))?;

    if analysis.improvement_recommendations.trim().is_empty() {
        info!("✓ 未发现需要补充的提示词内容");
    } else {
        info!("📝 改进后的提示词已保存: {}", prompt_path.display());
    }

    Ok(FeedbackOutcome {
        analysis,
        analysis_path,
        prompt_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_feedback_analysis_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("feedback.csv");
        std::fs::write(
            &csv_path,
            "image_name,ai_grade,expert_grade,agreement,expert_comments\n\
             D5_1.jpg,4AA,4AA,yes,\n\
             D5_2.jpg,4AB,3BB,no,expansion is overestimated\n",
        )
        .unwrap();

        let out = dir.path().join("improved");
        let outcome = run_feedback_analysis(&csv_path, &out).unwrap();

        assert!(outcome.analysis_path.exists());
        assert!(outcome.prompt_path.exists());
        assert_eq!(outcome.analysis.total_embryos, 2);
        assert_eq!(outcome.analysis.discrepancies.len(), 1);
        assert!(outcome.supplement().is_some());
    }

    #[test]
    fn test_all_agree_has_no_supplement() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("feedback.csv");
        std::fs::write(
            &csv_path,
            "image_name,ai_grade,expert_grade,agreement,expert_comments\nD5_1.jpg,4AA,4AA,agree,\n",
        )
        .unwrap();

        let outcome = run_feedback_analysis(&csv_path, dir.path()).unwrap();
        assert!(outcome.supplement().is_none());
        assert_eq!(std::fs::read_to_string(&outcome.prompt_path).unwrap(), "");
    }
}
