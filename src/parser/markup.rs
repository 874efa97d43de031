use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use super::Paragraph;

pub const ITALIC_OPEN: &str = "<i>";
pub const ITALIC_CLOSE: &str = "</i>";
pub const BOLD_OPEN: &str = "<b>";
pub const BOLD_CLOSE: &str = "</b>";

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static SPACE_BEFORE_STOP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+([.!?。！？])").unwrap());
static SPACE_BEFORE_COMMA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+([,，;；])").unwrap());
static OPEN_PAREN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(\s+").unwrap());
static CLOSE_PAREN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+\)").unwrap());
static MARKUP_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</?[bi]>").unwrap());

/// 根据样式段重建斜体标记
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupFormatter;

impl MarkupFormatter {
    pub fn new() -> Self {
        Self
    }

    /// 为段落中的斜体文字加上 `<i>` 标记；没有样式时原样返回
    pub fn format(&self, paragraph: &Paragraph) -> String {
        if paragraph.styles.is_empty() {
            return paragraph.text.clone();
        }
        let runs = italic_runs(paragraph);
        if runs.is_empty() {
            return paragraph.text.clone();
        }
        wrap_italic(&paragraph.text, &runs)
    }
}

/// 收集斜体文字。相邻且在正文中只隔空白的斜体段合并成一段，
/// 整段斜体的段落因此只包一次标记。
fn italic_runs(paragraph: &Paragraph) -> Vec<String> {
    let text = paragraph.text.as_str();
    let mut runs: Vec<String> = Vec::new();
    let mut cursor = 0usize;
    let mut open: Option<(usize, usize)> = None;

    for span in &paragraph.styles {
        let needle = span.text.trim();
        if needle.is_empty() {
            continue;
        }

        match text[cursor..].find(needle) {
            Some(offset) => {
                let start = cursor + offset;
                let end = start + needle.len();
                cursor = end;

                if span.is_slanted() {
                    open = match open {
                        Some((run_start, run_end)) if text[run_end..start].trim().is_empty() => {
                            Some((run_start, end))
                        }
                        Some((run_start, run_end)) => {
                            runs.push(text[run_start..run_end].to_string());
                            Some((start, end))
                        }
                        None => Some((start, end)),
                    };
                } else if let Some((run_start, run_end)) = open.take() {
                    runs.push(text[run_start..run_end].to_string());
                }
            }
            None => {
                // Span text no longer literal in the paragraph (e.g. dehyphenated).
                if let Some((run_start, run_end)) = open.take() {
                    runs.push(text[run_start..run_end].to_string());
                }
                if span.is_slanted() {
                    runs.push(needle.to_string());
                }
            }
        }
    }

    if let Some((run_start, run_end)) = open {
        runs.push(text[run_start..run_end].to_string());
    }
    runs
}

/// 以斜体标记包裹每段文字的每次出现，最长的先处理；
/// 已在标记内的出现跳过，因此不会产生嵌套标记。
pub fn wrap_italic(text: &str, runs: &[String]) -> String {
    let mut seen = HashSet::new();
    let mut ordered: Vec<&str> = runs
        .iter()
        .map(|r| r.as_str())
        .filter(|r| !r.is_empty() && seen.insert(*r))
        .collect();
    ordered.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));

    let mut out = text.to_string();
    for run in ordered {
        out = wrap_occurrences(&out, run, ITALIC_OPEN, ITALIC_CLOSE);
    }
    out
}

fn wrap_occurrences(text: &str, needle: &str, open: &str, close: &str) -> String {
    let marked = marked_ranges(text, open, close);
    let mut out = String::with_capacity(text.len() + open.len() + close.len());
    let mut last = 0;

    for (start, _) in text.match_indices(needle) {
        let end = start + needle.len();
        if marked.iter().any(|&(s, e)| start < e && end > s) {
            continue;
        }
        out.push_str(&text[last..start]);
        out.push_str(open);
        out.push_str(needle);
        out.push_str(close);
        last = end;
    }

    out.push_str(&text[last..]);
    out
}

/// 已有标记对（含标签本身）的字节区间
fn marked_ranges(text: &str, open: &str, close: &str) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut from = 0;

    while let Some(offset) = text[from..].find(open) {
        let start = from + offset;
        let body = start + open.len();
        match text[body..].find(close) {
            Some(len) => {
                let end = body + len + close.len();
                ranges.push((start, end));
                from = end;
            }
            None => break,
        }
    }
    ranges
}

/// 整段加粗，已加粗则不重复
pub fn wrap_bold(text: &str) -> String {
    if text.starts_with(BOLD_OPEN) {
        text.to_string()
    } else {
        format!("{BOLD_OPEN}{text}{BOLD_CLOSE}")
    }
}

/// 去除 `<b>` / `<i>` 标记
pub fn strip_markup(text: &str) -> String {
    MARKUP_TAG_RE.replace_all(text, "").into_owned()
}

/// 清理文字：合并空白，去掉标点和括号内侧多余的空格
pub fn clean_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let text = WHITESPACE_RE.replace_all(text, " ");
    let text = text.trim();
    let text = SPACE_BEFORE_STOP_RE.replace_all(text, "$1");
    let text = SPACE_BEFORE_COMMA_RE.replace_all(&text, "$1");
    let text = OPEN_PAREN_RE.replace_all(&text, "(");
    let text = CLOSE_PAREN_RE.replace_all(&text, ")");
    text.into_owned()
}
