pub mod models;

pub use models::{ClassifiedRecord, SourcedRecord, FIELD_NAMES};

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use tracing::info;

use crate::utils::CatalogResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// 单个 JSON 数组
    Json,
    /// 每行一条记录
    Jsonl,
    /// 表头为固定字段顺序，来源列在最后
    Csv,
}

/// 将记录序列化到写入器
pub fn write_records<W: Write>(
    writer: &mut W,
    records: &[SourcedRecord],
    format: OutputFormat,
) -> CatalogResult<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *writer, records)?;
            writeln!(writer)?;
        }
        OutputFormat::Jsonl => {
            for record in records {
                serde_json::to_writer(&mut *writer, record)?;
                writeln!(writer)?;
            }
        }
        OutputFormat::Csv => {
            let mut csv_writer = csv::Writer::from_writer(&mut *writer);
            csv_writer.write_record(FIELD_NAMES.iter().chain(["SourceFile"].iter()))?;
            for sourced in records {
                let row = sourced.record.fields().map(|(_, value)| value);
                csv_writer.write_record(row.iter().chain([sourced.source_file.as_str()].iter()))?;
            }
            csv_writer.flush()?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// 保存记录；路径为空时写到标准输出
pub fn save_records(
    path: Option<&Path>,
    records: &[SourcedRecord],
    format: OutputFormat,
) -> CatalogResult<()> {
    match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
            write_records(&mut file, records, format)?;
            info!("结果已保存到: {} ({} 条记录)", path.display(), records.len());
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            write_records(&mut handle, records, format)?;
        }
    }
    Ok(())
}
