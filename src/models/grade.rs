//! Gardner 分级数据结构
//!
//! 类型化的核心（`GardnerGrade`）+ 扁平的输出记录（`GradingRecord`）。
//! 输出记录的字段全部是字符串，与 CSV 列一一对应。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// 不适用（非囊胚或无法解析）
pub const NOT_APPLICABLE: &str = "N/A";
/// 非囊胚时的整体质量描述
pub const NOT_APPLICABLE_QUALITY: &str = "Not Applicable";
/// 调用失败时所有字段的占位值
pub const ERROR_LABEL: &str = "ERROR";

/// 扩张期（1-6）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExpansionStage(u8);

impl ExpansionStage {
    pub fn new(stage: u8) -> Option<Self> {
        (1..=6).contains(&stage).then_some(Self(stage))
    }

    pub fn parse(s: &str) -> Option<Self> {
        s.trim().parse::<u8>().ok().and_then(Self::new)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// 标准描述
    pub fn description(self) -> &'static str {
        match self.0 {
            1 => "Early blastocyst",
            2 => "Blastocyst",
            3 => "Full blastocyst",
            4 => "Expanded blastocyst",
            5 => "Hatching blastocyst",
            _ => "Hatched blastocyst",
        }
    }
}

impl fmt::Display for ExpansionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ICM / TE 细胞质量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellQuality {
    A,
    B,
    C,
}

impl CellQuality {
    /// 解析单个字母（不区分大小写）
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "A" | "a" => Some(CellQuality::A),
            "B" | "b" => Some(CellQuality::B),
            "C" | "c" => Some(CellQuality::C),
            _ => None,
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'A' => Some(CellQuality::A),
            'B' => Some(CellQuality::B),
            'C' => Some(CellQuality::C),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CellQuality::A => "A",
            CellQuality::B => "B",
            CellQuality::C => "C",
        }
    }
}

impl fmt::Display for CellQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 完整的 Gardner 分级，例如 4AA
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GardnerGrade {
    pub expansion: ExpansionStage,
    pub icm: CellQuality,
    pub te: CellQuality,
}

impl GardnerGrade {
    /// 解析 "4AA" 形式的分级标签
    pub fn parse(s: &str) -> Option<Self> {
        let mut chars = s.trim().chars();
        let expansion = chars
            .next()
            .and_then(|c| c.to_digit(10))
            .and_then(|d| ExpansionStage::new(d as u8))?;
        let icm = chars.next().and_then(CellQuality::from_char)?;
        let te = chars.next().and_then(CellQuality::from_char)?;
        if chars.next().is_some() {
            return None;
        }
        Some(Self { expansion, icm, te })
    }
}

impl fmt::Display for GardnerGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.expansion, self.icm, self.te)
    }
}

/// 模型回复解析结果
///
/// 每个字段独立解析，解析不到时为 None（输出时记为 N/A）。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedGrade {
    pub expansion: Option<ExpansionStage>,
    pub icm: Option<CellQuality>,
    pub te: Option<CellQuality>,
    /// 模型明确表示不是囊胚
    pub not_blastocyst: bool,
    pub quality_score: Option<String>,
    pub explanation: Option<String>,
}

impl ParsedGrade {
    /// 三个分量都存在时才有完整分级
    pub fn grade(&self) -> Option<GardnerGrade> {
        if self.not_blastocyst {
            return None;
        }
        Some(GardnerGrade {
            expansion: self.expansion?,
            icm: self.icm?,
            te: self.te?,
        })
    }

    /// 一个字段都没解析出来
    pub fn is_empty(&self) -> bool {
        !self.not_blastocyst
            && self.expansion.is_none()
            && self.icm.is_none()
            && self.te.is_none()
            && self.quality_score.is_none()
            && self.explanation.is_none()
    }
}

/// CSV 列顺序
pub const CSV_HEADERS: [&str; 9] = [
    "image_name",
    "gardner_grade",
    "expansion",
    "icm_quality",
    "te_quality",
    "quality_score",
    "explanation",
    "timestamp",
    "image_path",
];

/// 单张图片的分级记录
///
/// 创建后不再修改。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradingRecord {
    pub image_name: String,
    pub gardner_grade: String,
    pub expansion: String,
    pub icm_quality: String,
    pub te_quality: String,
    pub quality_score: String,
    pub explanation: String,
    pub timestamp: String,
    pub image_path: String,
    /// 模型原始回复（仅 JSON 输出）
    #[serde(default)]
    pub full_response: String,
}

impl GradingRecord {
    /// 根据解析结果创建记录，解析不到的字段记为 N/A
    pub fn from_parsed(image_path: &Path, parsed: &ParsedGrade, raw_response: &str) -> Self {
        let (gardner_grade, expansion, icm_quality, te_quality) = if parsed.not_blastocyst {
            (
                NOT_APPLICABLE.to_string(),
                NOT_APPLICABLE.to_string(),
                NOT_APPLICABLE.to_string(),
                NOT_APPLICABLE.to_string(),
            )
        } else {
            (
                parsed
                    .grade()
                    .map(|g| g.to_string())
                    .unwrap_or_else(|| NOT_APPLICABLE.to_string()),
                na_or(parsed.expansion),
                na_or(parsed.icm),
                na_or(parsed.te),
            )
        };

        let quality_score = parsed.quality_score.clone().unwrap_or_else(|| {
            if parsed.not_blastocyst {
                NOT_APPLICABLE_QUALITY.to_string()
            } else {
                NOT_APPLICABLE.to_string()
            }
        });

        let explanation = parsed.explanation.clone().unwrap_or_else(|| {
            if parsed.is_empty() {
                "Could not parse model response; see full_response.".to_string()
            } else {
                String::new()
            }
        });

        Self {
            image_name: file_name_of(image_path),
            gardner_grade,
            expansion,
            icm_quality,
            te_quality,
            quality_score,
            explanation,
            timestamp: now_iso(),
            image_path: image_path.display().to_string(),
            full_response: raw_response.to_string(),
        }
    }

    /// 创建完整分级的记录
    pub fn graded(
        image_path: &Path,
        grade: GardnerGrade,
        quality_score: impl Into<String>,
        explanation: impl Into<String>,
    ) -> Self {
        let parsed = ParsedGrade {
            expansion: Some(grade.expansion),
            icm: Some(grade.icm),
            te: Some(grade.te),
            not_blastocyst: false,
            quality_score: Some(quality_score.into()),
            explanation: Some(explanation.into()),
        };
        Self::from_parsed(image_path, &parsed, "")
    }

    /// 创建非囊胚（不适用）记录
    pub fn not_applicable(image_path: &Path, explanation: impl Into<String>) -> Self {
        let parsed = ParsedGrade {
            not_blastocyst: true,
            explanation: Some(explanation.into()),
            ..ParsedGrade::default()
        };
        Self::from_parsed(image_path, &parsed, "")
    }

    /// 调用失败的记录，所有分级字段为 ERROR
    pub fn failed(image_path: &Path, error: impl fmt::Display) -> Self {
        Self {
            image_name: file_name_of(image_path),
            gardner_grade: ERROR_LABEL.to_string(),
            expansion: ERROR_LABEL.to_string(),
            icm_quality: ERROR_LABEL.to_string(),
            te_quality: ERROR_LABEL.to_string(),
            quality_score: ERROR_LABEL.to_string(),
            explanation: format!("Error during grading: {}", error),
            timestamp: now_iso(),
            image_path: image_path.display().to_string(),
            full_response: String::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.gardner_grade == ERROR_LABEL
    }

    pub fn is_not_applicable(&self) -> bool {
        self.gardner_grade == NOT_APPLICABLE
    }

    pub fn is_graded(&self) -> bool {
        GardnerGrade::parse(&self.gardner_grade).is_some()
    }

    /// CSV 行，顺序与 `CSV_HEADERS` 一致
    pub fn csv_row(&self) -> [&str; 9] {
        [
            &self.image_name,
            &self.gardner_grade,
            &self.expansion,
            &self.icm_quality,
            &self.te_quality,
            &self.quality_score,
            &self.explanation,
            &self.timestamp,
            &self.image_path,
        ]
    }
}

fn na_or<T: ToString>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| NOT_APPLICABLE.to_string())
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn now_iso() -> String {
    chrono::Local::now()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}
