use serde::{Deserialize, Serialize};

/// 专家反馈 CSV 中的一行
///
/// 列：image_name, ai_grade, expert_grade, agreement, expert_comments
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackEntry {
    pub image_name: String,
    pub ai_grade: String,
    pub expert_grade: String,
    pub agreement: String,
    pub expert_comments: String,
}

impl FeedbackEntry {
    pub fn agreement_level(&self) -> AgreementLevel {
        AgreementLevel::classify(&self.agreement)
    }
}

/// 专家与模型的一致程度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgreementLevel {
    Agree,
    Partial,
    Disagree,
}

impl AgreementLevel {
    /// 按关键字归类，"disagree" 必须先于 "agree" 判断
    pub fn classify(agreement: &str) -> Self {
        let text = agreement.trim().to_lowercase();
        let has_word = |w: &str| text.split(|c: char| !c.is_alphanumeric()).any(|t| t == w);

        if text.contains("disagree") || has_word("no") {
            AgreementLevel::Disagree
        } else if text.contains("partial") {
            AgreementLevel::Partial
        } else if has_word("yes") || text.contains("agree") {
            AgreementLevel::Agree
        } else {
            AgreementLevel::Disagree
        }
    }
}

/// 一致性统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementStats {
    pub total: usize,
    pub agree: usize,
    pub partial: usize,
    pub disagree: usize,
}

impl AgreementStats {
    pub fn record(&mut self, level: AgreementLevel) {
        self.total += 1;
        match level {
            AgreementLevel::Agree => self.agree += 1,
            AgreementLevel::Partial => self.partial += 1,
            AgreementLevel::Disagree => self.disagree += 1,
        }
    }

    /// 百分比，保留一位小数
    pub fn percentage(&self, count: usize) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (count as f64 / self.total as f64 * 1000.0).round() / 10.0
    }

    pub fn accuracy(&self) -> f64 {
        self.percentage(self.agree)
    }
}

/// 反馈分析报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackAnalysis {
    pub timestamp: String,
    pub total_embryos: usize,
    pub agreement_stats: AgreementStats,
    pub accuracy: f64,
    pub discrepancies: Vec<FeedbackEntry>,
    pub improvement_recommendations: String,
}
