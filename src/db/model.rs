use crate::color::ColorFeature;
use crate::record::Record;

/// 提示词表中的一行
#[derive(Debug, sqlx::FromRow)]
pub struct PromptRow {
    pub id: i64,
    pub title: String,
    pub prompt: String,
    pub image: String,
    /// JSON 数组
    pub tags: String,
    pub feature_r: Option<i64>,
    pub feature_g: Option<i64>,
    pub feature_b: Option<i64>,
    pub created_at: String,
}

impl From<PromptRow> for Record {
    fn from(row: PromptRow) -> Self {
        let channel = |v: i64| v.clamp(0, 255) as u8;
        let feature = match (row.feature_r, row.feature_g, row.feature_b) {
            (Some(r), Some(g), Some(b)) => Some(ColorFeature::new(channel(r), channel(g), channel(b))),
            _ => None,
        };
        Record {
            id: row.id,
            title: row.title,
            prompt: row.prompt,
            image: row.image,
            tags: serde_json::from_str(&row.tags).unwrap_or_default(),
            feature,
            created_at: row.created_at,
        }
    }
}

/// 将特征拆分为三个可空列
pub fn feature_columns(feature: Option<ColorFeature>) -> (Option<i64>, Option<i64>, Option<i64>) {
    match feature {
        Some(f) => (Some(f.r as i64), Some(f.g as i64), Some(f.b as i64)),
        None => (None, None, None),
    }
}

pub fn tags_column(tags: &[String]) -> String {
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
}
