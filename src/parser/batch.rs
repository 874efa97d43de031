use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use super::ExtractionPipeline;
use crate::storage::{ClassifiedRecord, SourcedRecord};

/// 输入文件类型，按扩展名判断
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Pdf,
    Fragments,
}

impl InputKind {
    pub fn of(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "json" => Some(Self::Fragments),
            _ => None,
        }
    }
}

/// 展开输入：目录内的 PDF / 片段 JSON 按文件名排序，文件原样保留
pub fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut inputs = Vec::new();

    for path in paths {
        if path.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(path)
                .with_context(|| format!("无法读取目录: {}", path.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && InputKind::of(p).is_some())
                .collect();
            entries.sort();
            info!("目录 {} 中找到 {} 个文件", path.display(), entries.len());
            inputs.extend(entries);
        } else if path.exists() {
            if InputKind::of(path).is_none() {
                warn!("未知的文件类型，跳过: {}", path.display());
                continue;
            }
            inputs.push(path.clone());
        } else {
            return Err(anyhow::anyhow!("输入不存在: {}", path.display()));
        }
    }

    Ok(inputs)
}

fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// 处理单个文件；读取失败不会中断批处理，只产生空记录和警告
pub fn process_file(pipeline: &ExtractionPipeline, path: &Path) -> SourcedRecord {
    let record = match InputKind::of(path) {
        Some(InputKind::Pdf) => pipeline.process_pdf(path),
        Some(InputKind::Fragments) => pipeline.process_fragments_file(path).unwrap_or_else(|e| {
            warn!("片段文件处理失败 {}: {:#}", path.display(), e);
            ClassifiedRecord::default()
        }),
        None => {
            warn!("未知的文件类型: {}", path.display());
            ClassifiedRecord::default()
        }
    };

    if record.is_empty() {
        warn!("{} 未提取到任何字段", path.display());
    }

    SourcedRecord {
        record,
        source_file: source_name(path),
    }
}

/// 并发处理多个文件，结果顺序与输入一致
///
/// 每个文档在阻塞线程池中独立处理，`workers` 限制同时处理的文档数。
pub async fn process_batch(
    pipeline: ExtractionPipeline,
    inputs: Vec<PathBuf>,
    workers: usize,
) -> Result<Vec<SourcedRecord>> {
    let total = inputs.len();
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut tasks = JoinSet::new();

    info!("批量处理 {} 个文件，并发数 {}", total, workers.max(1));

    for (idx, path) in inputs.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        let pipeline = pipeline.clone();

        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await?;
            let record = tokio::task::spawn_blocking(move || process_file(&pipeline, &path)).await?;
            Ok::<_, anyhow::Error>((idx, record))
        });
    }

    let mut slots: Vec<Option<SourcedRecord>> = (0..total).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        let (idx, record) = joined??;
        slots[idx] = Some(record);
    }

    let records: Vec<SourcedRecord> = slots.into_iter().flatten().collect();
    let found = records.iter().filter(|r| !r.record.is_empty()).count();
    info!("批量处理完成: {}/{} 个文件提取到内容", found, total);
    Ok(records)
}
