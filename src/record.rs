use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::color::ColorFeature;

/// 提示词记录
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// 记录 ID
    pub id: i64,
    /// 标题
    #[serde(default)]
    pub title: String,
    /// 提示词
    pub prompt: String,
    /// 参考图片，可以是 URL、data URI 或本地路径
    pub image: String,
    /// 标签
    #[serde(default)]
    pub tags: Vec<String>,
    /// 预先计算的颜色特征
    #[serde(default)]
    pub feature: Option<ColorFeature>,
    /// 创建时间，RFC 3339 格式
    #[serde(default)]
    pub created_at: String,
}

impl Record {
    /// 提示词和图片均不能为空
    pub fn is_valid(&self) -> bool {
        required_fields_present(&self.prompt, &self.image)
    }

    /// 用于文本匹配的小写文本：标题、提示词和标签以空格连接
    pub fn haystack(&self) -> String {
        format!("{} {} {}", self.title, self.prompt, self.tags.join(" ")).to_lowercase()
    }
}

/// 新增记录的请求
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct NewPrompt {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub feature: Option<ColorFeature>,
}

impl NewPrompt {
    /// 提示词和图片均不能为空
    pub fn is_valid(&self) -> bool {
        required_fields_present(&self.prompt, &self.image)
    }
}

/// 部分更新记录的请求，未填写的字段保持不变
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct PromptPatch {
    pub title: Option<String>,
    pub prompt: Option<String>,
    pub image: Option<String>,
    pub tags: Option<Vec<String>>,
    pub feature: Option<ColorFeature>,
}

impl PromptPatch {
    /// 将修改应用到记录上
    ///
    /// 更换图片但没有提供新特征时，旧特征随之失效
    pub fn apply(self, record: &mut Record) {
        if let Some(title) = self.title {
            record.title = title;
        }
        if let Some(prompt) = self.prompt {
            record.prompt = prompt;
        }
        if let Some(image) = self.image {
            if image != record.image {
                record.feature = None;
            }
            record.image = image;
        }
        if let Some(tags) = self.tags {
            record.tags = tags;
        }
        if self.feature.is_some() {
            record.feature = self.feature;
        }
    }
}

fn required_fields_present(prompt: &str, image: &str) -> bool {
    !prompt.trim().is_empty() && !image.trim().is_empty()
}

/// 解析逗号分隔的标签列表
pub fn parse_tags(s: &str) -> Vec<String> {
    s.split(',').map(str::trim).filter(|t| !t.is_empty()).map(String::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haystack() {
        let record = Record {
            title: "Portrait Rim Light".into(),
            prompt: "Dramatic PORTRAIT".into(),
            tags: vec!["Film".into(), "rim light".into()],
            ..Default::default()
        };
        assert_eq!(record.haystack(), "portrait rim light dramatic portrait film rim light");
    }

    #[test]
    fn test_json_format() {
        let raw = r#"{
            "id": 3,
            "title": "Portrait Rim Light",
            "prompt": "Dramatic portrait",
            "image": "https://example.com/a.jpg",
            "tags": ["portrait"],
            "feature": null,
            "createdAt": "2025-01-01T00:00:00.000Z"
        }"#;
        let record: Record = serde_json::from_str(raw).unwrap();
        assert_eq!(record.id, 3);
        assert_eq!(record.feature, None);
        assert_eq!(record.created_at, "2025-01-01T00:00:00.000Z");

        let raw = r#"{"id": 4, "prompt": "p", "image": "i", "feature": {"r": 1, "g": 2, "b": 3}}"#;
        let record: Record = serde_json::from_str(raw).unwrap();
        assert_eq!(record.feature, Some(ColorFeature::new(1, 2, 3)));
        assert!(record.tags.is_empty());
    }

    #[test]
    fn test_patch_image_clears_feature() {
        let mut record = Record {
            image: "a.png".into(),
            feature: Some(ColorFeature::new(1, 2, 3)),
            ..Default::default()
        };
        PromptPatch { title: Some("t".into()), ..Default::default() }.apply(&mut record);
        assert_eq!(record.feature, Some(ColorFeature::new(1, 2, 3)));

        PromptPatch { image: Some("b.png".into()), ..Default::default() }.apply(&mut record);
        assert_eq!(record.image, "b.png");
        assert_eq!(record.feature, None);
    }

    #[test]
    fn test_new_prompt_validation() {
        let mut new = NewPrompt { prompt: "p".into(), ..Default::default() };
        assert!(!new.is_valid());
        new.image = "https://example.com/a.jpg".into();
        assert!(new.is_valid());
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!(parse_tags(" a, b ,,c "), vec!["a", "b", "c"]);
        assert!(parse_tags("").is_empty());
    }
}
