use std::path::{Path, PathBuf};
use std::sync::Arc;

use pdfcatalog::parser::markup::strip_markup;
use pdfcatalog::parser::{self, pdf_parser};
use pdfcatalog::storage::{self, FIELD_NAMES};
use pdfcatalog::{ClassificationRules, ExtractionPipeline, Fragment, OutputFormat, StyleSpan};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn pipeline() -> ExtractionPipeline {
    ExtractionPipeline::new(Arc::new(ClassificationRules::default()))
}

fn heading(text: &str) -> Fragment {
    Fragment::styled(1, StyleSpan::new(text, "Times-Bold", 20.0).bold())
}

fn body(text: &str) -> Fragment {
    Fragment::styled(1, StyleSpan::new(text, "Times-Roman", 12.0))
}

#[test]
fn catalogue_page_is_fully_classified() {
    let record = pipeline()
        .process_fragments_file(&fixture("democracy_on_fire.json"))
        .unwrap();

    assert_eq!(record.title, "<b>Democracy on Fire: Breaking the Chains of Martial Law</b>");
    assert_eq!(record.localized_title, "民主星火：衝破戒嚴的枷鎖");
    assert_eq!(record.category, "小說類");
    assert_eq!(record.author, "Lin Tsung-kuang");
    assert_eq!(record.translator, "Chen-Yu Chang, Noax Tao and Lee-Hang Chen");
    assert_eq!(record.illustrator, "");
    assert_eq!(record.more_info, "Publisher: Spring Hill Publishing, 320 pages");
    assert_eq!(
        record.detail,
        "<i>In 1977, a young man returned to Taiwan from abroad, carrying secrets and a quiet \
         hope that democracy would one day find its candidate.</i> As a spy, he met a promising \
         young man named Ah Yu. The two young men engaged in intense debates about Taiwan's \
         future in this novel."
    );
    assert_eq!(record.rights_sold, "");
    assert_eq!(record.tags, "");
}

#[test]
fn title_never_repeats_as_localized_title() {
    let record = pipeline()
        .process_fragments_file(&fixture("democracy_on_fire.json"))
        .unwrap();
    assert!(!record.title.is_empty());
    assert_ne!(strip_markup(&record.title), record.localized_title);
    assert!(!record.detail.contains("Democracy on Fire"));
    assert!(!record.detail.contains("民主星火"));
}

#[test]
fn italic_lines_become_one_wrapped_paragraph() {
    let fragments = pdf_parser::load_fragments_json(&fixture("democracy_on_fire.json")).unwrap();
    let paragraphs = pipeline().paragraphs(&fragments);

    assert_eq!(paragraphs.len(), 7);
    let italic = &paragraphs[2];
    assert_eq!(italic.line.matches("<i>").count(), 1);
    assert!(italic.line.starts_with("<i>In 1977, a young man returned to Taiwan from abroad,"));
    assert!(italic.line.ends_with("find its candidate.</i>"));
    assert_eq!(italic.paragraph.page, 1);
}

#[test]
fn comic_wins_over_novel() {
    let record = pipeline().process_fragments(&[
        heading("The Lantern Keeper of Tamsui"),
        body("A graphic novel told across three generations, drawn as a 漫畫 serial."),
    ]);
    assert_eq!(record.category, "漫畫類");
}

#[test]
fn detail_is_capped() {
    let mut fragments = vec![heading("An Extremely Long Description")];
    for _ in 0..40 {
        fragments.push(body("This sentence keeps the description going for a while."));
    }
    let record = pipeline().process_fragments(&fragments);

    assert!(record.detail.chars().count() <= 503);
    assert!(record.detail.ends_with("..."));
}

#[test]
fn configured_keywords_replace_defaults() {
    let rules = ClassificationRules::from_json_str(r#"{"translator_keywords": ["Rendered by"]}"#).unwrap();
    let pipeline = ExtractionPipeline::new(Arc::new(rules));

    let record = pipeline.process_fragments(&[
        heading("The Night Ferry to Kinmen"),
        Fragment::styled(1, StyleSpan::new("Rendered by: Mary Jones", "Times-Roman", 12.0).bold()),
        Fragment::styled(1, StyleSpan::new("Translator: Nobody Here", "Times-Roman", 12.0).bold()),
    ]);

    assert_eq!(record.translator, "Mary Jones");
    assert_eq!(record.author, "");
}

#[tokio::test]
async fn batch_records_serialise_in_field_order() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::copy(fixture("democracy_on_fire.json"), dir.path().join("fire.json")).unwrap();
    std::fs::write(dir.path().join("empty.pdf"), b"%PDF-broken").unwrap();

    let inputs = parser::collect_inputs(&[dir.path().to_path_buf()]).unwrap();
    let records = parser::process_batch(pipeline(), inputs, 4).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].source_file, "empty.pdf");
    assert!(records[0].record.is_empty());
    assert_eq!(records[1].source_file, "fire.json");
    assert_eq!(records[1].record.author, "Lin Tsung-kuang");

    let mut out = Vec::new();
    storage::write_records(&mut out, &records, OutputFormat::Jsonl).unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);

    let line = lines[1];
    let mut last = 0;
    for key in FIELD_NAMES.iter().chain(["SourceFile"].iter()) {
        let pos = line.find(&format!("\"{key}\":")).unwrap();
        assert!(pos >= last, "{key} out of order");
        last = pos;
    }
}
