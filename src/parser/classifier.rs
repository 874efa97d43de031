use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

use super::markup::{clean_text, strip_markup, wrap_bold, MarkupFormatter};
use super::{is_cjk_ideograph, Paragraph};
use crate::config::ClassificationRules;
use crate::storage::ClassifiedRecord;

/// 标题只在字号最大的前几个段落中挑选
const TITLE_POOL: usize = 5;
const BOLD_TITLE_BONUS: f32 = 2.0;
const DETAIL_LIMIT_CHARS: usize = 500;

const TITLE_BLOCKLIST: &[&str] = &["publisher", "isbn", "pages", "price"];
const LOCALIZED_TITLE_BLOCKLIST: &[&str] = &["出版", "頁數", "價格", "isbn"];
const PUBLICATION_KEYWORDS: &[&str] = &[
    "publisher", "isbn", "pages", "price", "format", "volume", "出版社", "頁數", "價格", "格式",
    "尺寸", "版次", "版權",
];

static TITLE_SHAPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Za-z\s:]+$").unwrap());
static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]{4}").unwrap());
static TRAILING_DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*\d+\s*$").unwrap());
static TRAILING_PUNCT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,，。.;；:：]+$").unwrap());
static NUMERIC_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").unwrap());
static ACRONYM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z]{2,}$").unwrap());

/// 格式化后的段落：原始段落 + 标记并清理后的文本行
#[derive(Debug, Clone, PartialEq)]
pub struct FormattedParagraph {
    pub paragraph: Paragraph,
    pub line: String,
}

impl FormattedParagraph {
    pub fn new(formatter: &MarkupFormatter, paragraph: Paragraph) -> Self {
        let line = clean_text(&formatter.format(&paragraph));
        Self { paragraph, line }
    }
}

/// 人名类字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PersonField {
    Author,
    Translator,
    Illustrator,
}

/// 关键词及其取值正则：关键词之后到下一个数字或行尾
#[derive(Debug, Clone)]
struct KeywordMatcher {
    keyword: String,
    capture: Regex,
}

impl KeywordMatcher {
    fn compile(keywords: &[String]) -> Vec<Self> {
        keywords
            .iter()
            .filter_map(|keyword| {
                let pattern = format!(r"(?i){}[:：\s]*([^\d\n]*)", regex::escape(keyword));
                match Regex::new(&pattern) {
                    Ok(capture) => Some(Self {
                        keyword: keyword.to_lowercase(),
                        capture,
                    }),
                    Err(e) => {
                        warn!("关键词无法编译，已忽略 '{}': {}", keyword, e);
                        None
                    }
                }
            })
            .collect()
    }

    fn extract(&self, line: &str) -> Option<String> {
        let caps = self.capture.captures(line)?;
        let raw = caps.get(1)?.as_str().trim();
        let value = TRAILING_DIGITS_RE.replace(raw, "");
        let value = TRAILING_PUNCT_RE.replace(value.trim(), "");
        let value = value.trim();

        if value.chars().count() > 1 && !NUMERIC_RE.is_match(value) {
            Some(value.to_string())
        } else {
            None
        }
    }
}

/// 字段分类：把段落序列分配到固定的记录字段
#[derive(Debug, Clone)]
pub struct FieldClassifier {
    rules: Arc<ClassificationRules>,
    author: Vec<KeywordMatcher>,
    translator: Vec<KeywordMatcher>,
    illustrator: Vec<KeywordMatcher>,
}

impl FieldClassifier {
    pub fn new(rules: Arc<ClassificationRules>) -> Self {
        Self {
            author: KeywordMatcher::compile(&rules.author_keywords),
            translator: KeywordMatcher::compile(&rules.translator_keywords),
            illustrator: KeywordMatcher::compile(&rules.illustrator_keywords),
            rules,
        }
    }

    /// 分类一份文档的段落；找不到候选时字段保持为空，不会报错
    pub fn classify(&self, paragraphs: &[FormattedParagraph]) -> ClassifiedRecord {
        let mut record = ClassifiedRecord::default();
        // 已归属某字段的段落下标
        let mut consumed: HashSet<usize> = HashSet::new();

        if let Some(idx) = self.select_title(paragraphs) {
            record.title = wrap_bold(&paragraphs[idx].line);
            consumed.insert(idx);
            debug!("标题: 段落 #{} -> {}", idx, record.title);
        }

        if let Some(idx) = self.select_localized_title(paragraphs, &record.title) {
            record.localized_title = strip_markup(&paragraphs[idx].line);
            consumed.insert(idx);
            debug!("中文书名: 段落 #{} -> {}", idx, record.localized_title);
        }

        self.assign_people(paragraphs, &mut record, &mut consumed);
        record.category = categorize(paragraphs).to_string();
        self.collect_free_text(paragraphs, &mut record, &consumed);

        info!(
            "分类完成: 标题={}, 作者={}, 译者={}, 插画={}, 类别={}",
            !record.title.is_empty(),
            !record.author.is_empty(),
            !record.translator.is_empty(),
            !record.illustrator.is_empty(),
            record.category
        );
        record
    }

    fn select_title(&self, paragraphs: &[FormattedParagraph]) -> Option<usize> {
        let mut by_size: Vec<usize> = (0..paragraphs.len()).collect();
        // Stable: equal sizes keep document order.
        by_size.sort_by(|&a, &b| {
            paragraphs[b]
                .paragraph
                .avg_font_size
                .total_cmp(&paragraphs[a].paragraph.avg_font_size)
        });

        let mut best: Option<(usize, f32)> = None;
        for &idx in by_size.iter().take(TITLE_POOL) {
            let paragraph = &paragraphs[idx].paragraph;
            let text = paragraph.text.trim();
            let len = text.chars().count();

            if len <= 10 || len >= 200 || !is_title_shaped(text) || is_not_title(text) {
                continue;
            }

            let score = if paragraph.has_bold() {
                paragraph.avg_font_size + BOLD_TITLE_BONUS
            } else {
                paragraph.avg_font_size
            };
            debug!("标题候选 #{} 得分 {}: {}", idx, score, text);

            if best.map_or(true, |(_, top)| score > top) {
                best = Some((idx, score));
            }
        }
        best.map(|(idx, _)| idx)
    }

    fn select_localized_title(&self, paragraphs: &[FormattedParagraph], title: &str) -> Option<usize> {
        let title_plain = strip_markup(title);

        paragraphs.iter().position(|item| {
            let text = item.paragraph.text.trim();
            let cjk = text.chars().filter(|c| is_cjk_ideograph(*c)).count();
            let visible = text.chars().filter(|c| !c.is_whitespace()).count().max(1);
            let len = text.chars().count();

            cjk >= 3
                && cjk as f32 / visible as f32 > 0.6
                && len > 5
                && len < 100
                && strip_markup(&item.line) != title_plain
                && !contains_any(&text.to_lowercase(), LOCALIZED_TITLE_BLOCKLIST)
        })
    }

    /// 作者、译者、插画家：每行最多归属一个字段，每个字段取第一个匹配
    fn assign_people(
        &self,
        paragraphs: &[FormattedParagraph],
        record: &mut ClassifiedRecord,
        consumed: &mut HashSet<usize>,
    ) {
        for (idx, item) in paragraphs.iter().enumerate() {
            if consumed.contains(&idx) {
                continue;
            }
            let line = strip_markup(&item.line);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let lower = line.to_lowercase();

            for field in [PersonField::Author, PersonField::Translator, PersonField::Illustrator] {
                let slot = match field {
                    PersonField::Author => &mut record.author,
                    PersonField::Translator => &mut record.translator,
                    PersonField::Illustrator => &mut record.illustrator,
                };
                if !slot.is_empty() {
                    continue;
                }
                if let Some(name) = self.match_person(field, line, &lower) {
                    debug!("{:?}: 段落 #{} -> {}", field, idx, name);
                    *slot = name;
                    consumed.insert(idx);
                    break;
                }
            }
        }
    }

    fn match_person(&self, field: PersonField, line: &str, lower: &str) -> Option<String> {
        let matchers = match field {
            PersonField::Author => {
                if contains_any(lower, &self.rules.translator_keywords)
                    || contains_any(lower, &self.rules.illustrator_keywords)
                {
                    return None;
                }
                &self.author
            }
            PersonField::Translator => &self.translator,
            PersonField::Illustrator => {
                if lower.contains("publisher") || lower.contains("出版") {
                    return None;
                }
                &self.illustrator
            }
        };

        matchers
            .iter()
            .filter(|m| lower.contains(&m.keyword))
            .filter_map(|m| m.extract(line))
            .find(|name| field != PersonField::Illustrator || !name.to_lowercase().contains("publish"))
    }

    /// 未归属的行：出版资讯进 MoreInfo，其余有意义的内容进 Detail
    fn collect_free_text(
        &self,
        paragraphs: &[FormattedParagraph],
        record: &mut ClassifiedRecord,
        consumed: &HashSet<usize>,
    ) {
        let assigned: Vec<String> = [
            strip_markup(&record.title),
            record.localized_title.clone(),
            record.author.clone(),
            record.translator.clone(),
            record.illustrator.clone(),
        ]
        .into_iter()
        .filter(|v| !v.is_empty())
        .collect();

        let mut detail: Vec<&str> = Vec::new();
        let mut more_info: Vec<&str> = Vec::new();

        for (idx, item) in paragraphs.iter().enumerate() {
            if consumed.contains(&idx) {
                continue;
            }
            let line = item.line.trim();
            if line.is_empty() {
                continue;
            }
            let lower = line.to_lowercase();

            if self.is_publication_metadata(&lower) {
                more_info.push(line);
                continue;
            }

            let plain = strip_markup(line);
            let meaningful = line.chars().count() > 10
                && !NUMERIC_RE.is_match(line)
                && !ACRONYM_RE.is_match(line);
            if meaningful && !assigned.iter().any(|v| *v == plain) {
                detail.push(line);
            }
        }

        record.detail = truncate_detail(detail.join(" "));
        record.more_info = more_info.join(" ");
    }

    fn is_publication_metadata(&self, lower: &str) -> bool {
        contains_any(lower, PUBLICATION_KEYWORDS)
            || contains_any(lower, &self.rules.publisher_keywords)
            || contains_any(lower, &self.rules.exclude_from_detail)
    }
}

fn contains_any<S: AsRef<str>>(haystack: &str, needles: &[S]) -> bool {
    needles.iter().any(|n| haystack.contains(n.as_ref()))
}

fn is_title_shaped(text: &str) -> bool {
    let has_latin = text.chars().any(|c| c.is_ascii_alphabetic());
    let has_cjk = text.chars().any(is_cjk_ideograph);

    TITLE_SHAPE_RE.is_match(text)
        || (has_latin && text.split_whitespace().count() >= 2)
        || (has_latin && has_cjk)
}

fn is_not_title(text: &str) -> bool {
    let lower = text.to_lowercase();
    contains_any(&lower, TITLE_BLOCKLIST)
        || lower.starts_with("by ")
        || YEAR_RE.is_match(text)
        || text.split_whitespace().count() < 2
}

/// 全文类别判断，漫画优先于小说，小说优先于教科书
fn categorize(paragraphs: &[FormattedParagraph]) -> &'static str {
    let full_text = paragraphs
        .iter()
        .map(|p| p.line.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let lower = full_text.to_lowercase();

    if contains_any(&lower, &["comic", "manga", "漫畫"]) {
        "漫畫類"
    } else if contains_any(&lower, &["novel", "小說"]) {
        "小說類"
    } else if contains_any(&lower, &["textbook", "教科書"]) {
        "教育類"
    } else {
        ""
    }
}

fn truncate_detail(detail: String) -> String {
    if detail.chars().count() > DETAIL_LIMIT_CHARS {
        let cut: String = detail.chars().take(DETAIL_LIMIT_CHARS).collect();
        format!("{cut}...")
    } else {
        detail
    }
}
