use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use pdfcatalog::config::{self, AppConfig, ClassificationRules};
use pdfcatalog::parser::{self, pdf_parser, ExtractionPipeline, InputKind};
use pdfcatalog::storage::{self, OutputFormat};
use pdfcatalog::utils::logger;

#[derive(Parser)]
#[command(name = "pdfcatalog")]
#[command(about = "PDF 书目资料提取与字段分类", long_about = None)]
struct Cli {
    /// 配置文件路径
    #[arg(long, global = true, default_value = config::SETTINGS_PATH)]
    settings: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 生成默认配置文件
    Init {
        /// 覆盖已存在的配置
        #[arg(long)]
        force: bool,
    },
    /// 批量提取 PDF 或片段 JSON，输出分类记录
    Extract {
        /// PDF、片段 JSON 或包含它们的目录
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// 分类规则文件
        #[arg(short = 'c', long)]
        rules: Option<PathBuf>,
        /// 输出文件（默认标准输出）
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// 输出格式
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
        /// 并发文档数
        #[arg(short = 'j', long)]
        workers: Option<usize>,
    },
    /// 显示单个文件的段落重建结果和分类记录
    Inspect {
        input: PathBuf,
        #[arg(short = 'c', long)]
        rules: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    logger::init_logger();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => {
            init_command(&cli.settings, force).await?;
        }
        Commands::Extract {
            inputs,
            rules,
            output,
            format,
            workers,
        } => {
            let mut app_config = AppConfig::load_from(&cli.settings)?;
            if let Some(path) = output {
                app_config.output.path = path.display().to_string();
            }
            if let Some(format) = format {
                app_config.output.format = format;
            }
            if let Some(workers) = workers {
                app_config.extractor.workers = workers.max(1);
            }
            extract_command(&app_config, &inputs, rules).await?;
        }
        Commands::Inspect { input, rules } => {
            let app_config = AppConfig::load_from(&cli.settings)?;
            inspect_command(&app_config, &input, rules)?;
        }
    }

    Ok(())
}

fn load_rules(app_config: &AppConfig, override_path: Option<PathBuf>) -> Arc<ClassificationRules> {
    let path = override_path.or_else(|| app_config.rules_path());
    Arc::new(ClassificationRules::load(path.as_deref()))
}

async fn init_command(settings_path: &Path, force: bool) -> Result<()> {
    info!("初始化配置...");

    let app_config = AppConfig::default();
    let rules_path = PathBuf::from(config::RULES_PATH);

    for path in [settings_path, rules_path.as_path()] {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    if settings_path.exists() && !force {
        info!("配置文件已存在，跳过: {}", settings_path.display());
    } else {
        app_config.save(settings_path)?;
        info!("已生成配置文件: {}", settings_path.display());
    }

    if rules_path.exists() && !force {
        info!("分类规则已存在，跳过: {}", rules_path.display());
    } else {
        let content = ClassificationRules::default().to_json_pretty()?;
        tokio::fs::write(&rules_path, content).await?;
        info!("已生成分类规则: {}", rules_path.display());
    }

    info!("✅ 初始化完成");
    info!("下一步:");
    info!("  1. 编辑 {} 调整关键词", rules_path.display());
    info!("  2. 运行 'pdfcatalog extract <目录>' 开始提取");

    Ok(())
}

async fn extract_command(app_config: &AppConfig, inputs: &[PathBuf], rules: Option<PathBuf>) -> Result<()> {
    let rules = load_rules(app_config, rules);
    let pipeline = ExtractionPipeline::new(rules);

    let files = parser::collect_inputs(inputs)?;
    if files.is_empty() {
        info!("没有找到可处理的文件");
        return Ok(());
    }

    let records = parser::process_batch(pipeline, files, app_config.extractor.workers).await?;

    let output = app_config.output.path.trim();
    let output = (!output.is_empty()).then(|| PathBuf::from(output));
    storage::save_records(output.as_deref(), &records, app_config.output.format)?;

    info!("✅ 提取完成，共 {} 条记录", records.len());
    Ok(())
}

fn inspect_command(app_config: &AppConfig, input: &Path, rules: Option<PathBuf>) -> Result<()> {
    let pipeline = ExtractionPipeline::new(load_rules(app_config, rules));

    let fragments = match InputKind::of(input) {
        Some(InputKind::Pdf) => parser::PdfParser::new().extract_fragments(input)?,
        Some(InputKind::Fragments) => pdf_parser::load_fragments_json(input)?,
        None => anyhow::bail!("不支持的文件类型: {}", input.display()),
    };

    println!("== 段落 ({} 个片段) ==", fragments.len());
    for (idx, item) in pipeline.paragraphs(&fragments).iter().enumerate() {
        println!(
            "#{:<3} p{} {:>5.1}pt {} {}",
            idx,
            item.paragraph.page,
            item.paragraph.avg_font_size,
            if item.paragraph.has_bold() { "B" } else { " " },
            item.line
        );
    }

    let record = pipeline.process_fragments(&fragments);
    println!("== 记录 ==");
    println!(
        "{}",
        serde_json::to_string_pretty(&record).context("记录序列化失败")?
    );
    Ok(())
}
