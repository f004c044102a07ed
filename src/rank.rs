use std::collections::HashMap;

use serde::Serialize;

use crate::cache::effective_feature;
use crate::color::ColorFeature;
use crate::record::Record;

/// 完整查询命中的权重
pub const FULL_MATCH_WEIGHT: f32 = 1.5;
/// 每个查询词命中的权重
pub const TOKEN_WEIGHT: f32 = 0.5;
/// 视觉相似度的最大得分
pub const VISUAL_MAX: f32 = 1.5;
/// 视觉得分随距离线性衰减的尺度，距离 450 时降为 0
pub const DISTANCE_SCALE: f32 = 300.;

/// 搜索条件
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    text: String,
    feature: Option<ColorFeature>,
}

impl Query {
    pub fn new(text: &str, feature: Option<ColorFeature>) -> Self {
        Self { text: normalize(text), feature }
    }

    /// 规范化后的查询文本
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn feature(&self) -> Option<ColorFeature> {
        self.feature
    }

    pub fn set_text(&mut self, text: &str) {
        self.text = normalize(text);
    }

    pub fn set_feature(&mut self, feature: Option<ColorFeature>) {
        self.feature = feature;
    }

    pub fn has_text(&self) -> bool {
        !self.text.is_empty()
    }

    pub fn has_visual(&self) -> bool {
        self.feature.is_some()
    }

    /// 查询方式，用于日志和指标
    pub fn mode(&self) -> &'static str {
        match (self.has_text(), self.has_visual()) {
            (true, true) => "mixed",
            (true, false) => "text",
            (false, true) => "visual",
            (false, false) => "none",
        }
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// 排序结果
#[derive(Debug, Clone, Serialize)]
pub struct Ranked<'a> {
    /// 综合得分
    pub score: f32,
    /// 对应的记录
    pub prompt: &'a Record,
}

/// 文本得分，`haystack` 与 `query` 都应已转为小写
pub fn text_score(haystack: &str, query: &str) -> f32 {
    if query.is_empty() {
        return 0.;
    }
    let mut score = 0.;
    if haystack.contains(query) {
        score += FULL_MATCH_WEIGHT;
    }
    for token in query.split_whitespace() {
        if haystack.contains(token) {
            score += TOKEN_WEIGHT;
        }
    }
    score
}

/// 视觉得分：距离为 0 时最高，距离 450 及以上为 0
pub fn visual_score(query: &ColorFeature, feature: &ColorFeature) -> f32 {
    distance_score(query.distance(feature))
}

/// 将颜色距离映射为得分
pub fn distance_score(distance: f32) -> f32 {
    (VISUAL_MAX - distance / DISTANCE_SCALE).clamp(0., VISUAL_MAX)
}

/// 对记录进行排序
///
/// 有查询文本时，不包含完整查询文本的记录被直接过滤。其余记录按
/// 文本得分与视觉得分之和降序排列，得分相同时保持输入顺序。
pub fn rank<'a>(
    records: &'a [Record],
    query: &Query,
    cache: &HashMap<i64, ColorFeature>,
) -> Vec<Ranked<'a>> {
    let mut ranked = records
        .iter()
        .filter_map(|record| {
            let mut score = 0.;
            if query.has_text() {
                let haystack = record.haystack();
                if !haystack.contains(query.text()) {
                    return None;
                }
                score += text_score(&haystack, query.text());
            }
            if let Some(q) = &query.feature {
                if let Some(feature) = effective_feature(record, cache) {
                    score += visual_score(q, &feature);
                }
            }
            Some(Ranked { score, prompt: record })
        })
        .collect::<Vec<_>>();

    // sort_by 是稳定排序
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked
}
