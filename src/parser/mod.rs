pub mod batch;
pub mod classifier;
pub mod markup;
pub mod paragraph;
pub mod pdf_parser;

pub use batch::{collect_inputs, process_batch, InputKind};
pub use classifier::{FieldClassifier, FormattedParagraph};
pub use markup::MarkupFormatter;
pub use paragraph::ParagraphReconstructor;
pub use pdf_parser::PdfParser;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ClassificationRules;
use crate::storage::ClassifiedRecord;

/// 同一样式的一段文字
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleSpan {
    pub text: String,
    #[serde(default)]
    pub is_italic: bool,
    #[serde(default)]
    pub is_bold: bool,
    #[serde(default)]
    pub font_name: String,
    #[serde(default)]
    pub font_size: f32,
}

impl StyleSpan {
    pub fn new(text: impl Into<String>, font_name: impl Into<String>, font_size: f32) -> Self {
        Self {
            text: text.into(),
            is_italic: false,
            is_bold: false,
            font_name: font_name.into(),
            font_size,
        }
    }

    pub fn bold(mut self) -> Self {
        self.is_bold = true;
        self
    }

    pub fn italic(mut self) -> Self {
        self.is_italic = true;
        self
    }

    /// 显式斜体标志，或字体名中带 italic / oblique
    pub fn is_slanted(&self) -> bool {
        if self.is_italic {
            return true;
        }
        let name = self.font_name.to_lowercase();
        name.contains("italic") || name.contains("oblique")
    }
}

/// 版面提取器输出的一行文字
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fragment {
    pub page: u32,
    pub text: String,
    pub styles: Vec<StyleSpan>,
    pub avg_font_size: f32,
}

impl Fragment {
    /// 文本去除首尾空白，平均字号取各样式段字号的均值（无样式时为 0）
    pub fn new(page: u32, text: impl AsRef<str>, styles: Vec<StyleSpan>) -> Self {
        let avg_font_size = if styles.is_empty() {
            0.0
        } else {
            styles.iter().map(|s| s.font_size).sum::<f32>() / styles.len() as f32
        };
        Self {
            page,
            text: text.as_ref().trim().to_string(),
            styles,
            avg_font_size,
        }
    }

    /// 单一样式的片段
    pub fn styled(page: u32, span: StyleSpan) -> Self {
        let text = span.text.clone();
        Self::new(page, text, vec![span])
    }
}

/// 由一个或多个片段合并而成的逻辑段落
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paragraph {
    pub text: String,
    pub styles: Vec<StyleSpan>,
    pub avg_font_size: f32,
    pub page: u32,
}

impl Paragraph {
    pub fn has_bold(&self) -> bool {
        self.styles.iter().any(|s| s.is_bold)
    }
}

/// CJK 统一表意文字（U+4E00..U+9FFF）
pub(crate) fn is_cjk_ideograph(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

/// 统一提取管道：段落重建 → 格式标记 → 字段分类
///
/// 管道本身无可变状态，规则通过 `Arc` 在并发任务间只读共享。
#[derive(Clone)]
pub struct ExtractionPipeline {
    pdf_parser: PdfParser,
    reconstructor: ParagraphReconstructor,
    formatter: MarkupFormatter,
    classifier: FieldClassifier,
}

impl ExtractionPipeline {
    pub fn new(rules: Arc<ClassificationRules>) -> Self {
        Self {
            pdf_parser: PdfParser::new(),
            reconstructor: ParagraphReconstructor::new(),
            formatter: MarkupFormatter::new(),
            classifier: FieldClassifier::new(rules),
        }
    }

    /// 重建段落并生成格式化文本行
    pub fn paragraphs(&self, fragments: &[Fragment]) -> Vec<FormattedParagraph> {
        self.reconstructor
            .reconstruct(fragments)
            .into_iter()
            .map(|paragraph| FormattedParagraph::new(&self.formatter, paragraph))
            .collect()
    }

    /// 处理一份文档的片段序列；空输入返回全空记录
    pub fn process_fragments(&self, fragments: &[Fragment]) -> ClassifiedRecord {
        let paragraphs = self.paragraphs(fragments);
        info!("{} 个片段合并为 {} 个段落", fragments.len(), paragraphs.len());
        self.classifier.classify(&paragraphs)
    }

    /// 处理一个PDF文件；提取失败时记录警告并返回空记录
    pub fn process_pdf(&self, pdf_path: &Path) -> ClassifiedRecord {
        info!("正在处理 PDF: {}", pdf_path.display());

        let fragments = match self.pdf_parser.extract_fragments(pdf_path) {
            Ok(fragments) => fragments,
            Err(e) => {
                warn!("PDF文字提取失败 {}: {:#}", pdf_path.display(), e);
                Vec::new()
            }
        };

        if fragments.is_empty() {
            warn!("无法从 {} 提取文字", pdf_path.display());
        }

        self.process_fragments(&fragments)
    }

    /// 处理一个片段 JSON 文件
    pub fn process_fragments_file(&self, json_path: &Path) -> Result<ClassifiedRecord> {
        let fragments = pdf_parser::load_fragments_json(json_path)?;
        Ok(self.process_fragments(&fragments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_average_is_mean_of_spans() {
        let fragment = Fragment::new(
            1,
            "  Hello world  ",
            vec![
                StyleSpan::new("Hello", "Times", 10.0),
                StyleSpan::new("world", "Times", 14.0),
            ],
        );
        assert_eq!(fragment.text, "Hello world");
        assert_eq!(fragment.avg_font_size, 12.0);
    }

    #[test]
    fn fragment_without_spans_has_zero_size() {
        assert_eq!(Fragment::new(1, "plain", Vec::new()).avg_font_size, 0.0);
    }

    #[test]
    fn slant_from_flag_or_font_name() {
        assert!(StyleSpan::new("a", "Times", 12.0).italic().is_slanted());
        assert!(StyleSpan::new("a", "Helvetica-Oblique", 12.0).is_slanted());
        assert!(StyleSpan::new("a", "Garamond-Italic", 12.0).is_slanted());
        assert!(!StyleSpan::new("a", "Garamond-Bold", 12.0).is_slanted());
    }

    #[test]
    fn empty_document_yields_empty_record() {
        let pipeline = ExtractionPipeline::new(Arc::new(ClassificationRules::default()));
        assert!(pipeline.process_fragments(&[]).is_empty());
    }

    #[test]
    fn unreadable_pdf_yields_empty_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf at all").unwrap();
        let pipeline = ExtractionPipeline::new(Arc::new(ClassificationRules::default()));
        assert!(pipeline.process_pdf(&path).is_empty());
    }
}
