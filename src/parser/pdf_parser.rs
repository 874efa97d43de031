use anyhow::{Context, Result};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

use super::{Fragment, StyleSpan};
use crate::utils::{CatalogError, CatalogResult};

/// 同一行内 Tm 纵坐标变化小于此值视为同一行
const LINE_Y_TOLERANCE: f32 = 1.0;

/// TJ 数组中小于此值的字距调整视为词间空格（千分之一字号单位）
const TJ_SPACE_THRESHOLD: f32 = -200.0;

const BOLD_MARKERS: &[&str] = &["bold", "black", "heavy", "semibold", "demi"];
const ITALIC_MARKERS: &[&str] = &["italic", "oblique"];

/// 当前字体状态
#[derive(Debug, Clone, Default)]
struct FontState {
    name: String,
    encoding: Option<String>,
    size: f32,
    scale: f32,
}

impl FontState {
    fn effective_size(&self) -> f32 {
        let scale = if self.scale > 0.0 { self.scale } else { 1.0 };
        self.size * scale
    }

    fn span(&self, text: &str) -> StyleSpan {
        let lower = self.name.to_lowercase();
        StyleSpan {
            text: text.to_string(),
            is_italic: ITALIC_MARKERS.iter().any(|m| lower.contains(m)),
            is_bold: BOLD_MARKERS.iter().any(|m| lower.contains(m)),
            font_name: self.name.clone(),
            font_size: self.effective_size(),
        }
    }
}

/// 收集一行内的文字与样式段
struct LineCollector {
    page: u32,
    raw: String,
    spans: Vec<StyleSpan>,
}

impl LineCollector {
    fn new(page: u32) -> Self {
        Self {
            page,
            raw: String::new(),
            spans: Vec::new(),
        }
    }

    fn push(&mut self, text: &str, font: &FontState) {
        if text.is_empty() {
            return;
        }
        self.raw.push_str(text);

        // 同字体同字号的连续文字并入同一样式段
        let size = font.effective_size();
        match self.spans.last_mut() {
            Some(last) if last.font_name == font.name && (last.font_size - size).abs() < f32::EPSILON => {
                last.text.push_str(text);
            }
            _ => self.spans.push(font.span(text)),
        }
    }

    fn flush(&mut self, out: &mut Vec<Fragment>) {
        let text = self.raw.split_whitespace().collect::<Vec<_>>().join(" ");
        let spans: Vec<StyleSpan> = std::mem::take(&mut self.spans)
            .into_iter()
            .filter_map(|mut span| {
                span.text = span.text.split_whitespace().collect::<Vec<_>>().join(" ");
                (!span.text.is_empty()).then_some(span)
            })
            .collect();
        self.raw.clear();

        if !text.is_empty() {
            out.push(Fragment::new(self.page, text, spans));
        }
    }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

/// 字体资源的 BaseFont 名称，去掉子集前缀（如 `ABCDEF+`）
fn base_font_name(font: &Dictionary) -> String {
    let name = font
        .get(b"BaseFont")
        .ok()
        .and_then(|n| n.as_name().ok())
        .map(|n| String::from_utf8_lossy(n).into_owned())
        .unwrap_or_default();

    match name.split_once('+') {
        Some((prefix, rest)) if prefix.len() == 6 && prefix.chars().all(|c| c.is_ascii_uppercase()) => {
            rest.to_string()
        }
        _ => name,
    }
}

/// PDF 文字提取器
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfParser;

impl PdfParser {
    pub fn new() -> Self {
        Self
    }

    /// 提取带样式的文本片段，按页序和阅读顺序排列
    ///
    /// 优先逐页解析内容流；解析不到文字时退回 pdf-extract 的纯文本（无样式）。
    pub fn extract_fragments(&self, pdf_path: &Path) -> Result<Vec<Fragment>> {
        info!("解析PDF: {}", pdf_path.display());

        if !pdf_path.exists() {
            return Err(anyhow::anyhow!("PDF文件不存在: {}", pdf_path.display()));
        }

        let doc = Document::load(pdf_path)
            .map_err(|e| CatalogError::PdfError(e.to_string()))
            .with_context(|| format!("无法打开PDF: {}", pdf_path.display()))?;

        let fragments = self.extract_styled(&doc);
        if !fragments.is_empty() {
            info!("成功提取 {} 个文字片段", fragments.len());
            return Ok(fragments);
        }

        warn!("内容流中未找到文字，改用纯文本提取");
        let fragments = self.extract_plain(pdf_path)?;
        info!("纯文本提取 {} 行", fragments.len());
        Ok(fragments)
    }

    fn extract_styled(&self, doc: &Document) -> Vec<Fragment> {
        let mut fragments = Vec::new();

        for (page_num, page_id) in doc.get_pages() {
            let fonts = doc.get_page_fonts(page_id);
            let content = match doc.get_page_content(page_id).and_then(|data| Content::decode(&data)) {
                Ok(content) => content,
                Err(e) => {
                    warn!("第 {} 页内容流解析失败: {}", page_num, e);
                    continue;
                }
            };

            let before = fragments.len();
            self.walk_page(page_num, &content, &fonts, &mut fragments);
            debug!("第 {} 页: {} 个片段", page_num, fragments.len() - before);
        }

        fragments
    }

    fn walk_page(
        &self,
        page: u32,
        content: &Content,
        fonts: &BTreeMap<Vec<u8>, &Dictionary>,
        out: &mut Vec<Fragment>,
    ) {
        let mut line = LineCollector::new(page);
        let mut font = FontState::default();
        let mut y = 0.0f32;

        for op in &content.operations {
            let operands = &op.operands;
            match op.operator.as_str() {
                "BT" => font.scale = 1.0,
                "Tf" => {
                    if let (Some(Object::Name(key)), Some(size)) =
                        (operands.first(), operands.get(1).and_then(number))
                    {
                        match fonts.get(key) {
                            Some(dict) => {
                                font.name = base_font_name(dict);
                                font.encoding = Some(dict.get_font_encoding().to_string());
                            }
                            None => {
                                font.name = String::from_utf8_lossy(key).into_owned();
                                font.encoding = None;
                            }
                        }
                        font.size = size;
                    }
                }
                "Tm" => {
                    if let Some(new_y) = operands.get(5).and_then(number) {
                        if (new_y - y).abs() > LINE_Y_TOLERANCE {
                            line.flush(out);
                        }
                        y = new_y;
                    }
                    if let Some(d) = operands.get(3).and_then(number) {
                        font.scale = d.abs();
                    }
                }
                "Td" | "TD" => {
                    if let Some(ty) = operands.get(1).and_then(number) {
                        if ty.abs() > f32::EPSILON {
                            line.flush(out);
                        }
                        y += ty;
                    }
                }
                "T*" => line.flush(out),
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        line.push(&decode(&font, bytes), &font);
                    }
                }
                "'" => {
                    line.flush(out);
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        line.push(&decode(&font, bytes), &font);
                    }
                }
                "\"" => {
                    line.flush(out);
                    if let Some(Object::String(bytes, _)) = operands.get(2) {
                        line.push(&decode(&font, bytes), &font);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        let mut text = String::new();
                        for item in items {
                            match item {
                                Object::String(bytes, _) => text.push_str(&decode(&font, bytes)),
                                other => {
                                    if number(other).is_some_and(|n| n < TJ_SPACE_THRESHOLD) {
                                        text.push(' ');
                                    }
                                }
                            }
                        }
                        line.push(&text, &font);
                    }
                }
                _ => {}
            }
        }

        line.flush(out);
    }

    /// pdf-extract 纯文本，换页符分页
    fn extract_plain(&self, pdf_path: &Path) -> Result<Vec<Fragment>> {
        // pdf-extract panics on some malformed fonts
        let text = std::panic::catch_unwind(|| pdf_extract::extract_text(pdf_path))
            .map_err(|_| CatalogError::PdfError("pdf-extract 解析时崩溃".to_string()))?
            .map_err(|e| CatalogError::PdfError(e.to_string()))?;

        Ok(plain_text_fragments(&text))
    }
}

fn decode(font: &FontState, bytes: &[u8]) -> String {
    Document::decode_text(font.encoding.as_deref(), bytes)
}

/// 把纯文本按行切成无样式片段
pub fn plain_text_fragments(text: &str) -> Vec<Fragment> {
    text.split('\u{c}')
        .enumerate()
        .flat_map(|(idx, page)| {
            let page_num = idx as u32 + 1;
            page.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(move |line| Fragment::new(page_num, line, Vec::new()))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// JSON 片段：`avg_font_size` 缺省时按样式段重新计算
#[derive(Debug, Deserialize)]
struct RawFragment {
    page: u32,
    text: String,
    #[serde(default)]
    styles: Vec<StyleSpan>,
    avg_font_size: Option<f32>,
}

/// 解析片段 JSON 数组；空白文本的片段被跳过
pub fn parse_fragments_json(content: &str) -> CatalogResult<Vec<Fragment>> {
    let raw: Vec<RawFragment> = serde_json::from_str(content)?;
    let mut fragments = Vec::with_capacity(raw.len());

    for (idx, item) in raw.into_iter().enumerate() {
        if item.page == 0 {
            return Err(CatalogError::ParseError(format!("第 {} 个片段的页码必须从 1 开始", idx)));
        }
        if item.text.trim().is_empty() {
            continue;
        }
        let mut fragment = Fragment::new(item.page, &item.text, item.styles);
        if let Some(size) = item.avg_font_size {
            fragment.avg_font_size = size;
        }
        fragments.push(fragment);
    }

    Ok(fragments)
}

pub fn load_fragments_json(path: &Path) -> Result<Vec<Fragment>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("无法读取片段文件: {}", path.display()))?;
    let fragments = parse_fragments_json(&content)
        .with_context(|| format!("片段文件格式错误: {}", path.display()))?;
    info!("读取 {} 个片段: {}", fragments.len(), path.display());
    Ok(fragments)
}
