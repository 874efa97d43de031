//! PDF 书目资料提取：段落重建、斜体标记还原与字段分类。

pub mod config;
pub mod parser;
pub mod storage;
pub mod utils;

pub use config::{AppConfig, ClassificationRules};
pub use parser::{ExtractionPipeline, Fragment, Paragraph, StyleSpan};
pub use storage::{ClassifiedRecord, OutputFormat, SourcedRecord};
pub use utils::{CatalogError, CatalogResult};
