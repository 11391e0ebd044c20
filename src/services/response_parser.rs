//! 模型回复解析 - 业务能力层
//!
//! 把模型返回的半结构化文本映射成 `ParsedGrade`。
//!
//! 解析顺序：
//! 1. 去掉 markdown 代码块，尝试按 JSON 解析
//! 2. JSON 不可用时，按 `Expansion: 4, ICM: A, TE: A` 这类键值片段匹配
//! 3. 组合分级（如 `4AA`）补齐缺失的分量
//!
//! 解析不到的字段保持 None，不重试。

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::debug;

use crate::models::{CellQuality, ExpansionStage, GardnerGrade, ParsedGrade};

// 标签与取值之间的分隔：冒号/等号，两侧允许 markdown 强调、引号和空白
// 例如 `Expansion: 4`、`**Expansion:** 4`、`"expansion": "4"`
macro_rules! field_regex {
    ($label:literal, $value:literal) => {
        LazyLock::new(|| {
            Regex::new(concat!(
                "(?i)\\b",
                $label,
                r#"[*_"'\s]*[:=][*_"'\s]*"#,
                $value,
                "\\b"
            ))
            .expect("valid regex")
        })
    };
}

static EXPANSION_RE: LazyLock<Regex> = field_regex!(
    r"expansion(?:[ _]stage)?(?:[ _]grade)?",
    r"([1-6]|n/?a|not applicable)"
);
static ICM_RE: LazyLock<Regex> = field_regex!(
    r"(?:icm|inner cell mass(?:\s*\(icm\))?)(?:[ _]quality)?(?:[ _]grade)?",
    r"(?:grade\s+)?([abc]|n/?a|not applicable)"
);
static TE_RE: LazyLock<Regex> = field_regex!(
    r"(?:te|trophectoderm(?:\s*\(te\))?)(?:[ _]quality)?(?:[ _]grade)?",
    r"(?:grade\s+)?([abc]|n/?a|not applicable)"
);
static QUALITY_RE: LazyLock<Regex> = field_regex!(
    r"(?:overall[ _])?quality(?:[ _]score)?",
    r"(good|fair|poor|not applicable|n/a)"
);
static GRADE_RE: LazyLock<Regex> = field_regex!(
    r"(?:gardner[ _])?grade",
    r"([1-6][abc]{2}|n/?a)"
);
static EXPLANATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)\bexplanation[*_"'\s]*[:=][*_"'\s]*(.+)"#).expect("valid regex")
});
/// 以其他字段标签开头的行，说明到此结束
static NEXT_FIELD_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?im)^[\s*_\-•]*(?:gardner[ _])?",
        r"(?:expansion|icm|inner cell mass|te|trophectoderm|overall[ _]quality|quality|grade)",
        r"\b[^:=\n]{0,30}[:=]",
    ))
    .expect("valid regex")
});
static NOT_BLASTOCYST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bnot\s+(?:a\s+)?blastocyst").expect("valid regex")
});
static CLEAVAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:cleavage[- ]stage|morula)\b").expect("valid regex")
});

/// 解析模型回复
pub fn parse_response(text: &str) -> ParsedGrade {
    let mut explicit_na = false;

    let (mut parsed, structured) = match parse_json_object(text) {
        Some(object) => {
            debug!("按 JSON 解析模型回复");
            (from_json(&object, &mut explicit_na), true)
        }
        None => {
            debug!("回复不是合法 JSON，按键值片段解析");
            (from_text(text, &mut explicit_na), false)
        }
    };

    let components_complete =
        parsed.expansion.is_some() && parsed.icm.is_some() && parsed.te.is_some();

    // JSON 给出完整分级时，只认显式 N/A；说明文字里的措辞不算数
    let phrase_says_not_blastocyst = !(structured && components_complete)
        && (NOT_BLASTOCYST_RE.is_match(text)
            || (!components_complete && CLEAVAGE_RE.is_match(text)));

    if explicit_na || phrase_says_not_blastocyst {
        parsed.not_blastocyst = true;
        parsed.expansion = None;
        parsed.icm = None;
        parsed.te = None;
    }

    parsed
}

/// 取出回复中的 JSON 片段（```json 代码块 / ``` 代码块 / 最外层花括号）
pub fn extract_json_block(text: &str) -> Option<&str> {
    let text = text.trim();

    if let Some(start) = text.find("```json") {
        let body = &text[start + 7..];
        let end = body.find("```").unwrap_or(body.len());
        return Some(body[..end].trim());
    }
    if let Some(start) = text.find("```") {
        let body = &text[start + 3..];
        let end = body.find("```").unwrap_or(body.len());
        return Some(body[..end].trim());
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn parse_json_object(text: &str) -> Option<Map<String, Value>> {
    let block = extract_json_block(text)?;
    match serde_json::from_str::<Value>(block) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

fn from_json(object: &Map<String, Value>, explicit_na: &mut bool) -> ParsedGrade {
    let field = |key: &str| -> Option<String> {
        match object.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    };

    let mut parsed = ParsedGrade::default();

    if let Some(expansion) = field("expansion") {
        *explicit_na |= is_na(&expansion);
        parsed.expansion = ExpansionStage::parse(&expansion);
    }
    parsed.icm = field("icm_quality").and_then(|v| CellQuality::parse(&v));
    parsed.te = field("te_quality").and_then(|v| CellQuality::parse(&v));

    if let Some(grade) = field("gardner_grade") {
        *explicit_na |= is_na(&grade);
        fill_from_grade(&mut parsed, &grade);
    }

    parsed.quality_score = field("quality_score").map(|q| normalize_quality(&q));
    parsed.explanation = field("explanation");
    parsed
}

fn from_text(text: &str, explicit_na: &mut bool) -> ParsedGrade {
    let capture = |re: &Regex| -> Option<String> {
        re.captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
    };

    let mut parsed = ParsedGrade::default();

    if let Some(expansion) = capture(&EXPANSION_RE) {
        *explicit_na |= is_na(&expansion);
        parsed.expansion = ExpansionStage::parse(&expansion);
    }
    parsed.icm = capture(&ICM_RE).and_then(|v| CellQuality::parse(&v));
    parsed.te = capture(&TE_RE).and_then(|v| CellQuality::parse(&v));

    if let Some(grade) = capture(&GRADE_RE) {
        *explicit_na |= is_na(&grade);
        fill_from_grade(&mut parsed, &grade);
    }

    parsed.quality_score = capture(&QUALITY_RE).map(|q| normalize_quality(&q));
    parsed.explanation = capture(&EXPLANATION_RE)
        .map(|e| cut_at_next_field(&e).trim_end_matches(['"', '}', '*']).trim().to_string())
        .filter(|e| !e.is_empty());
    parsed
}

/// 说明之后如果还有其他字段行，截断到该行之前
fn cut_at_next_field(explanation: &str) -> &str {
    NEXT_FIELD_LINE_RE
        .find_iter(explanation)
        .find(|m| m.start() > 0)
        .map_or(explanation, |m| &explanation[..m.start()])
}

/// 用组合分级补齐缺失的分量，已解析出的分量不覆盖
fn fill_from_grade(parsed: &mut ParsedGrade, grade: &str) {
    if let Some(g) = GardnerGrade::parse(grade) {
        parsed.expansion.get_or_insert(g.expansion);
        parsed.icm.get_or_insert(g.icm);
        parsed.te.get_or_insert(g.te);
    }
}

fn is_na(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "n/a" | "na" | "not applicable"
    )
}

fn normalize_quality(value: &str) -> String {
    match value.trim().to_ascii_lowercase().as_str() {
        "good" => "Good".to_string(),
        "fair" => "Fair".to_string(),
        "poor" => "Poor".to_string(),
        "n/a" | "na" | "not applicable" => "Not Applicable".to_string(),
        _ => value.trim().to_string(),
    }
}
