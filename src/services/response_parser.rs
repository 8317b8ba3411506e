//! 响应解析 - 业务能力层
//!
//! 把分析服务返回的自由文本拆成四个固定字段。解析是全函数：任何输入都能得到结果，不会报错。

use regex::Regex;
use std::sync::OnceLock;

/// Findings 缺失时截取的原文长度
pub const FINDINGS_FALLBACK_CHARS: usize = 1000;
/// 截断标记
pub const ELLIPSIS: &str = "...";
/// Recommendations 缺失时的占位文本
pub const DEFAULT_RECOMMENDATIONS: &str =
    "Please review the findings above and consult a qualified specialist for clinical interpretation.";
/// Confidence 缺失时的默认标签
pub const DEFAULT_CONFIDENCE: &str = "Moderate";

/// 可识别的段落类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Findings,
    Recommendations,
    Confidence,
    TechnicalNotes,
}

impl Section {
    fn from_heading(heading: &str) -> Option<Self> {
        let normalized = heading
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();
        match normalized.as_str() {
            "DETAILED FINDINGS" | "FINDINGS" | "OBSERVATIONS" => Some(Section::Findings),
            "RECOMMENDATIONS" | "NEXT STEPS" | "FOLLOW-UP" => Some(Section::Recommendations),
            "CONFIDENCE" | "CERTAINTY" | "DIAGNOSTIC CONFIDENCE" => Some(Section::Confidence),
            "TECHNICAL NOTES" | "TECHNICAL COMMENTS" | "IMAGE QUALITY" => Some(Section::TechnicalNotes),
            _ => None,
        }
    }
}

/// 标题正则
///
/// 长标题排在短标题前面（DETAILED FINDINGS 在 FINDINGS 前，DIAGNOSTIC CONFIDENCE 在 CONFIDENCE 前）。
/// 标题后必须紧跟冒号，或者独占一行；前后允许 markdown 的 `#` / `*` 装饰。
fn heading_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?imR)(?:[#*_]+[ \t]*)?\b(DETAILED[ \t]+FINDINGS|FINDINGS|OBSERVATIONS|RECOMMENDATIONS|NEXT[ \t]+STEPS|FOLLOW-UP|DIAGNOSTIC[ \t]+CONFIDENCE|CONFIDENCE|CERTAINTY|TECHNICAL[ \t]+NOTES|TECHNICAL[ \t]+COMMENTS|IMAGE[ \t]+QUALITY)\b[ \t*#_]*(?::[ \t*_]*|$)",
        )
        .expect("heading regex is valid")
    })
}

/// 解析后的四个字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    pub findings: String,
    pub recommendations: String,
    pub confidence: String,
    pub technical_notes: Option<String>,
}

/// 响应解析器
pub struct ResponseParser;

impl ResponseParser {
    /// 解析分析服务返回的文本
    ///
    /// - 每种段落只认第一次出现的标题，之后的同类标题是正文
    /// - 段落内容延伸到下一个被认可的标题或文本末尾
    /// - 缺失时使用兜底值；TechnicalNotes 没有兜底
    pub fn parse(text: &str) -> ParsedResponse {
        // 同类标题只保留第一次出现，后续重复一律算正文
        let mut headings: Vec<(Section, usize, usize)> = Vec::new();
        for caps in heading_regex().captures_iter(text) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let Some(section) = Section::from_heading(name.as_str()) else {
                continue;
            };
            if headings.iter().all(|(s, _, _)| *s != section) {
                headings.push((section, whole.start(), whole.end()));
            }
        }

        let extract = |section: Section| -> Option<String> {
            let idx = headings.iter().position(|(s, _, _)| *s == section)?;
            let (_, _, body_start) = headings[idx];
            let body_end = headings
                .get(idx + 1)
                .map(|(_, start, _)| *start)
                .unwrap_or(text.len());
            let body = clean_body(&text[body_start..body_end]);
            if body.is_empty() {
                None
            } else {
                Some(body)
            }
        };

        let findings = extract(Section::Findings).unwrap_or_else(|| fallback_findings(text));
        let recommendations =
            extract(Section::Recommendations).unwrap_or_else(|| DEFAULT_RECOMMENDATIONS.to_string());
        let confidence = extract(Section::Confidence).unwrap_or_else(|| DEFAULT_CONFIDENCE.to_string());
        let technical_notes = extract(Section::TechnicalNotes);

        ParsedResponse {
            findings,
            recommendations,
            confidence,
            technical_notes,
        }
    }
}

/// 去掉首尾空白以及段落末尾残留的 markdown 标记
fn clean_body(raw: &str) -> String {
    raw.trim()
        .trim_end_matches(|c: char| c == '#' || c == '*' || c == '_' || c.is_whitespace())
        .to_string()
}

fn fallback_findings(text: &str) -> String {
    let mut head: String = text.chars().take(FINDINGS_FALLBACK_CHARS).collect();
    head.push_str(ELLIPSIS);
    head
}
