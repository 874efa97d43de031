use serde::{Deserialize, Serialize};

/// 输出字段顺序（固定）
pub const FIELD_NAMES: [&str; 10] = [
    "Title",
    "LocalizedTitle",
    "Category",
    "Author",
    "Translator",
    "Illustrator",
    "Detail",
    "RightsSold",
    "MoreInfo",
    "Tags",
];

/// 一份文档的分类结果，所有字段默认为空串
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClassifiedRecord {
    pub title: String,
    pub localized_title: String,
    pub category: String,
    pub author: String,
    pub translator: String,
    pub illustrator: String,
    pub detail: String,
    pub rights_sold: String,
    pub more_info: String,
    pub tags: String,
}

impl ClassifiedRecord {
    /// 按固定顺序返回 (字段名, 值)
    pub fn fields(&self) -> [(&'static str, &str); 10] {
        [
            (FIELD_NAMES[0], self.title.as_str()),
            (FIELD_NAMES[1], self.localized_title.as_str()),
            (FIELD_NAMES[2], self.category.as_str()),
            (FIELD_NAMES[3], self.author.as_str()),
            (FIELD_NAMES[4], self.translator.as_str()),
            (FIELD_NAMES[5], self.illustrator.as_str()),
            (FIELD_NAMES[6], self.detail.as_str()),
            (FIELD_NAMES[7], self.rights_sold.as_str()),
            (FIELD_NAMES[8], self.more_info.as_str()),
            (FIELD_NAMES[9], self.tags.as_str()),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|(_, value)| value.is_empty())
    }
}

/// 带来源标识的记录，来源列追加在末尾
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcedRecord {
    #[serde(flatten)]
    pub record: ClassifiedRecord,
    #[serde(rename = "SourceFile")]
    pub source_file: String,
}
