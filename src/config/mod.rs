pub mod keywords;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use keywords::ClassificationRules;

use crate::storage::OutputFormat;
use crate::utils::{CatalogError, CatalogResult};

pub const SETTINGS_PATH: &str = "config/settings.toml";
pub const RULES_PATH: &str = "config/classification_config.json";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    pub extractor: ExtractorConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExtractorConfig {
    /// 分类规则文件（JSON，扩展名为 .toml 时按 TOML 解析）
    pub rules_path: String,
    /// 批量处理时的并发文档数
    pub workers: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OutputConfig {
    /// 为空时输出到标准输出
    pub path: String,
    pub format: OutputFormat,
}

impl AppConfig {
    pub fn load() -> CatalogResult<Self> {
        Self::load_from(Path::new(SETTINGS_PATH))
    }

    pub fn load_from(config_path: &Path) -> CatalogResult<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> CatalogResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn rules_path(&self) -> Option<PathBuf> {
        let path = self.extractor.rules_path.trim();
        (!path.is_empty()).then(|| PathBuf::from(path))
    }

    fn validate(&self) -> CatalogResult<()> {
        if self.extractor.workers == 0 {
            return Err(CatalogError::ConfigError(
                "extractor.workers 必须大于 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            extractor: ExtractorConfig {
                rules_path: RULES_PATH.to_string(),
                workers: 4,
            },
            output: OutputConfig {
                path: String::new(),
                format: OutputFormat::Json,
            },
        }
    }
}
