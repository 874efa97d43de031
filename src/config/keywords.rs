use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::utils::CatalogResult;

/// 字段分类规则：各字段的关键词列表
///
/// 构造后只读，可在多个文档处理任务之间共享。关键词统一转为小写，
/// 匹配时不区分大小写。
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ClassificationRules {
    /// 仅作记录，标题识别使用固定启发式
    pub title_patterns: Vec<String>,
    /// 仅作记录，中文书名识别使用固定启发式
    pub chinese_title_patterns: Vec<String>,
    pub author_keywords: Vec<String>,
    pub translator_keywords: Vec<String>,
    pub illustrator_keywords: Vec<String>,
    pub publisher_keywords: Vec<String>,
    /// 仅作记录，类别使用固定优先级规则
    pub category_keywords: Vec<String>,
    pub exclude_from_detail: Vec<String>,
}

/// 配置文件覆盖层：缺失的键保持默认值，未知键忽略
#[derive(Debug, Default, Deserialize)]
struct RulesOverlay {
    title_patterns: Option<Vec<String>>,
    chinese_title_patterns: Option<Vec<String>>,
    author_keywords: Option<Vec<String>>,
    translator_keywords: Option<Vec<String>>,
    illustrator_keywords: Option<Vec<String>>,
    publisher_keywords: Option<Vec<String>>,
    category_keywords: Option<Vec<String>>,
    exclude_from_detail: Option<Vec<String>>,
}

impl ClassificationRules {
    /// 加载规则文件；文件缺失或格式错误时记录警告并回退到默认规则
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        if !path.exists() {
            info!("分类规则文件不存在，使用默认规则: {}", path.display());
            return Self::default();
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("无法读取分类规则文件，使用默认设置: {}", e);
                return Self::default();
            }
        };

        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        let parsed = if is_toml {
            Self::from_toml_str(&content)
        } else {
            Self::from_json_str(&content)
        };

        match parsed {
            Ok(rules) => {
                info!("已加载分类规则: {}", path.display());
                rules
            }
            Err(e) => {
                warn!("无法载入配置文件，使用默认设置: {}", e);
                Self::default()
            }
        }
    }

    /// 以 JSON 对象覆盖默认规则（按键整体替换，不做深度合并）
    pub fn from_json_str(content: &str) -> CatalogResult<Self> {
        let overlay: RulesOverlay = serde_json::from_str(content)?;
        Ok(Self::default().overlay(overlay))
    }

    /// 以 TOML 表覆盖默认规则
    pub fn from_toml_str(content: &str) -> CatalogResult<Self> {
        let overlay: RulesOverlay = toml::from_str(content)?;
        Ok(Self::default().overlay(overlay))
    }

    pub fn to_json_pretty(&self) -> CatalogResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn overlay(self, overlay: RulesOverlay) -> Self {
        let pick = |custom: Option<Vec<String>>, default: Vec<String>| match custom {
            Some(list) => normalize(list),
            None => default,
        };

        let rules = Self {
            title_patterns: overlay.title_patterns.unwrap_or(self.title_patterns),
            chinese_title_patterns: overlay
                .chinese_title_patterns
                .unwrap_or(self.chinese_title_patterns),
            author_keywords: pick(overlay.author_keywords, self.author_keywords),
            translator_keywords: pick(overlay.translator_keywords, self.translator_keywords),
            illustrator_keywords: pick(overlay.illustrator_keywords, self.illustrator_keywords),
            publisher_keywords: pick(overlay.publisher_keywords, self.publisher_keywords),
            category_keywords: pick(overlay.category_keywords, self.category_keywords),
            exclude_from_detail: pick(overlay.exclude_from_detail, self.exclude_from_detail),
        };
        debug!("分类规则: {:?}", rules);
        rules
    }
}

/// 小写、去空白、丢弃空串
fn normalize(list: Vec<String>) -> Vec<String> {
    list.into_iter()
        .map(|kw| kw.trim().to_lowercase())
        .filter(|kw| !kw.is_empty())
        .collect()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ClassificationRules {
    fn default() -> Self {
        Self {
            title_patterns: strings(&[r"^[A-Z][A-Za-z\s:]+$", r".{20,}"]),
            chinese_title_patterns: strings(&[r"[\u4e00-\u9fff]{3,}"]),
            author_keywords: strings(&["author", "作者", "by"]),
            translator_keywords: strings(&["translator", "翻譯", "translated by"]),
            illustrator_keywords: strings(&["illustrator", "插畫", "illustrated by"]),
            publisher_keywords: strings(&["publisher", "出版", "published by"]),
            category_keywords: strings(&["category", "類別", "type", "genre"]),
            exclude_from_detail: strings(&[
                "publisher:", "date:", "pages:", "size:", "volume:", "isbn:", "price:", "format:",
            ]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn overlay_replaces_only_present_keys() {
        let rules =
            ClassificationRules::from_json_str(r#"{"author_keywords": ["Writer", " 著 "]}"#).unwrap();
        assert_eq!(rules.author_keywords, vec!["writer", "著"]);
        assert_eq!(rules.translator_keywords, ClassificationRules::default().translator_keywords);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let rules = ClassificationRules::from_json_str(r#"{"colour": "blue"}"#).unwrap();
        assert_eq!(rules, ClassificationRules::default());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(ClassificationRules::from_json_str("{ not json").is_err());
        assert!(ClassificationRules::from_json_str(r#"{"author_keywords": "author"}"#).is_err());
    }

    #[test]
    fn load_falls_back_to_defaults_on_bad_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[1, 2, 3").unwrap();
        let rules = ClassificationRules::load(Some(file.path()));
        assert_eq!(rules, ClassificationRules::default());
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let rules = ClassificationRules::load(Some(&dir.path().join("absent.json")));
        assert_eq!(rules, ClassificationRules::default());
    }

    #[test]
    fn load_reads_toml_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.toml");
        std::fs::write(&path, "illustrator_keywords = [\"Drawn by\"]\n").unwrap();
        let rules = ClassificationRules::load(Some(&path));
        assert_eq!(rules.illustrator_keywords, vec!["drawn by"]);
    }

    #[test]
    fn defaults_round_trip_through_json() {
        let json = ClassificationRules::default().to_json_pretty().unwrap();
        let rules = ClassificationRules::from_json_str(&json).unwrap();
        assert_eq!(rules, ClassificationRules::default());
    }
}
