pub mod logger;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("解析错误: {0}")]
    ParseError(String),

    #[error("PDF处理错误: {0}")]
    PdfError(String),

    #[error("IO错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON序列化错误: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("CSV写入错误: {0}")]
    CsvError(#[from] csv::Error),

    #[error("TOML解析错误: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("TOML序列化错误: {0}")]
    TomlSerError(#[from] toml::ser::Error),
}

pub type CatalogResult<T> = Result<T, CatalogError>;
