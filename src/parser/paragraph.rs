use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use super::{is_cjk_ideograph, Fragment, Paragraph, StyleSpan};

/// 平均字号超过此值视为标题/新段落
pub const HEADING_FONT_SIZE: f32 = 14.0;

/// 两段都短于此字符数时倾向合并
const SHORT_TEXT_CHARS: usize = 50;

const CHAPTER_KEYWORDS: &[&str] = &["Chapter", "Part", "Section", "第", "章", "節", "篇"];

static LATIN_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][a-z][A-Za-z\s]{10,}").unwrap());
static CJK_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\x{4e00}-\x{9fff}]{2,}[:：︰]").unwrap());
static NUMBERED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+[.)]\s*").unwrap());

fn is_sentence_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '。' | '！' | '？')
}

/// 判断片段是否开始一个新段落
pub fn is_new_paragraph(fragment: &Fragment) -> bool {
    let text = fragment.text.trim();

    // 字体较大的通常是标题
    if fragment.avg_font_size > HEADING_FONT_SIZE {
        return true;
    }

    if fragment.styles.iter().any(|s| s.is_bold) {
        return true;
    }

    if LATIN_HEADING_RE.is_match(text)
        || CJK_HEADING_RE.is_match(text)
        || NUMBERED_RE.is_match(text)
    {
        return true;
    }

    CHAPTER_KEYWORDS.iter().any(|kw| text.starts_with(kw))
}

/// 判断后一段文字是否接续当前段落，按优先级依次判断
pub fn should_merge(current: &str, incoming: &str) -> bool {
    // 当前段以完整句子结尾
    if current.ends_with(is_sentence_terminal) {
        return false;
    }

    let Some(first) = incoming.chars().next() else {
        return false;
    };

    // 大写或汉字开头：仅当当前段像被截断的句子时合并
    if first.is_ascii_uppercase() || is_cjk_ideograph(first) {
        return current.ends_with([',', '，']) || !current.contains(is_sentence_terminal);
    }

    if first.is_ascii_lowercase() {
        return true;
    }

    if current.ends_with(['-', ',', '，']) || current.ends_with(char::is_whitespace) {
        return true;
    }

    current.chars().count() < SHORT_TEXT_CHARS && incoming.chars().count() < SHORT_TEXT_CHARS
}

/// 连接两段文字：行尾连字符直接拼接（断词），否则以单个空格连接
pub fn join(current: &str, incoming: &str) -> String {
    if let Some(stem) = current.strip_suffix('-') {
        return format!("{stem}{incoming}");
    }
    if current.ends_with(char::is_whitespace) {
        return format!("{current}{incoming}");
    }
    format!("{current} {incoming}")
}

/// 标题字号的段落不吸收正文字号的片段；以连字符结尾的断词仍然接续
fn leaves_heading_size(paragraph: &str, paragraph_size: f32, fragment_size: f32) -> bool {
    paragraph_size > HEADING_FONT_SIZE
        && fragment_size <= HEADING_FONT_SIZE
        && !paragraph.ends_with('-')
}

/// 构建中的段落，仅由重建循环持有
struct ParagraphBuilder {
    text: String,
    styles: Vec<StyleSpan>,
    avg_font_size: f32,
    page: u32,
}

impl ParagraphBuilder {
    fn start(fragment: &Fragment) -> Self {
        Self {
            text: fragment.text.trim().to_string(),
            styles: fragment.styles.clone(),
            avg_font_size: fragment.avg_font_size,
            page: fragment.page,
        }
    }

    fn absorb(&mut self, fragment: &Fragment) {
        self.text = join(&self.text, fragment.text.trim());
        self.styles.extend(fragment.styles.iter().cloned());
        // Pairwise, not cumulative: later fragments weigh more. Kept for output parity.
        self.avg_font_size = (self.avg_font_size + fragment.avg_font_size) / 2.0;
    }

    fn finish(self) -> Paragraph {
        Paragraph {
            text: self.text,
            styles: self.styles,
            avg_font_size: self.avg_font_size,
            page: self.page,
        }
    }
}

/// 段落重建：把被版面切断的行合并回逻辑段落
#[derive(Debug, Clone, Copy, Default)]
pub struct ParagraphReconstructor;

impl ParagraphReconstructor {
    pub fn new() -> Self {
        Self
    }

    pub fn reconstruct(&self, fragments: &[Fragment]) -> Vec<Paragraph> {
        let mut paragraphs: Vec<Paragraph> = Vec::new();
        let mut current: Option<ParagraphBuilder> = None;

        for fragment in fragments {
            if fragment.text.trim().is_empty() {
                continue;
            }

            current = Some(match current.take() {
                None => ParagraphBuilder::start(fragment),
                Some(open) => {
                    let breaks = is_new_paragraph(fragment)
                        || leaves_heading_size(&open.text, open.avg_font_size, fragment.avg_font_size)
                        || !should_merge(&open.text, fragment.text.trim());

                    if breaks {
                        paragraphs.push(open.finish());
                        ParagraphBuilder::start(fragment)
                    } else {
                        let mut open = open;
                        open.absorb(fragment);
                        open
                    }
                }
            });
        }

        if let Some(open) = current {
            paragraphs.push(open.finish());
        }

        debug!("段落重建: {} 个片段 -> {} 个段落", fragments.len(), paragraphs.len());
        paragraphs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(text: &str) -> Fragment {
        Fragment::styled(1, StyleSpan::new(text, "Times-Roman", 12.0))
    }

    fn sized(text: &str, size: f32) -> Fragment {
        Fragment::styled(1, StyleSpan::new(text, "Times-Roman", size))
    }

    #[test]
    fn empty_input_gives_no_paragraphs() {
        assert!(ParagraphReconstructor::new().reconstruct(&[]).is_empty());
    }

    #[test]
    fn singleton_is_unchanged() {
        let out = ParagraphReconstructor::new().reconstruct(&[body("just one line here")]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "just one line here");
        assert_eq!(out[0].page, 1);
    }

    #[test]
    fn hyphenated_line_break_is_rejoined_without_space() {
        let out = ParagraphReconstructor::new().reconstruct(&[body("the inter-"), body("national stage")]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "the international stage");
    }

    #[test]
    fn large_bold_heading_does_not_absorb_body_text() {
        let heading = Fragment::styled(1, StyleSpan::new("Chapter One: Origins", "Times-Bold", 18.0).bold());
        let out = ParagraphReconstructor::new().reconstruct(&[heading, body("is a story of courage.")]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].text, "Chapter One: Origins");
        assert_eq!(out[1].text, "is a story of courage.");
    }

    #[test]
    fn hyphenated_heading_still_joins_body_size_text() {
        let tail = body("national Prize");
        assert!(!is_new_paragraph(&tail));
        let out = ParagraphReconstructor::new().reconstruct(&[sized("The Inter-", 16.0), tail]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "The International Prize");
        assert_eq!(out[0].avg_font_size, 14.0);
    }

    #[test]
    fn average_size_is_pairwise() {
        let out = ParagraphReconstructor::new().reconstruct(&[
            sized("the first line", 10.0),
            sized("and a second", 12.0),
            sized("and a third", 14.0),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].avg_font_size, 12.5);
        assert_eq!(out[0].styles.len(), 3);
    }

    #[test]
    fn merged_paragraph_keeps_first_page() {
        let second = Fragment::styled(2, StyleSpan::new("continues here", "Times-Roman", 12.0));
        let out = ParagraphReconstructor::new().reconstruct(&[body("a sentence that"), second]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].page, 1);
    }

    #[test]
    fn new_paragraph_triggers() {
        assert!(is_new_paragraph(&sized("big text", 16.0)));
        assert!(is_new_paragraph(&Fragment::styled(
            1,
            StyleSpan::new("short", "Times", 12.0).bold()
        )));
        assert!(is_new_paragraph(&body("Introduction to things")));
        assert!(is_new_paragraph(&body("内容简介：本书讲述")));
        assert!(is_new_paragraph(&body("3. Third item")));
        assert!(is_new_paragraph(&body("2)next")));
        assert!(is_new_paragraph(&body("Section 4")));
        assert!(is_new_paragraph(&body("第一章")));
        assert!(!is_new_paragraph(&body("and then it went on")));
        assert!(!is_new_paragraph(&body("In 1977, he left")));
        assert!(!is_new_paragraph(&sized("exactly fourteen", 14.0)));
    }

    #[test]
    fn merge_rules_in_priority_order() {
        // 1. terminal punctuation closes the paragraph
        assert!(!should_merge("It ended.", "and more"));
        assert!(!should_merge("結束了。", "然後"));
        // 2. capital / CJK start
        assert!(should_merge("first part,", "Then more"));
        assert!(should_merge("no stop at all", "Then more"));
        assert!(!should_merge("One. two", "Then more"));
        assert!(should_merge("民主星火", "的枷鎖"));
        // 3. lowercase start
        assert!(should_merge("One. two", "three"));
        // 4. trailing hyphen / comma
        assert!(should_merge("One. state-", "\"quoted\""));
        assert!(should_merge("One. a,", "(aside)"));
        // 5. both short
        assert!(should_merge("One. two", "(aside)"));
        // 6. default
        let long = format!("{}and then", "One sentence. ".repeat(5));
        assert!(!should_merge(&long, "(an aside)"));
    }

    #[test]
    fn join_rules() {
        assert_eq!(join("hyphen-", "ated"), "hyphenated");
        assert_eq!(join("spaced ", "text"), "spaced text");
        assert_eq!(join("plain", "text"), "plain text");
        assert_eq!(join("plain", "Text"), "plain Text");
    }

    #[test]
    fn reconstruction_is_deterministic() {
        let input = vec![body("a line that"), body("continues."), body("Another One starts")];
        let reconstructor = ParagraphReconstructor::new();
        assert_eq!(reconstructor.reconstruct(&input), reconstructor.reconstruct(&input));
    }
}
