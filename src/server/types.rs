use axum::body::Bytes;
use axum_typed_multipart::TryFromMultipart;
use serde::Serialize;
use utoipa::ToSchema;

use crate::record::Record;

/// 搜索请求参数
#[derive(TryFromMultipart)]
pub struct SearchRequest {
    pub q: Option<String>,
    pub file: Option<Bytes>,
    pub wait_ms: Option<u64>,
    pub count: Option<usize>,
}

/// 搜索表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct SearchForm {
    /// 搜索文本，在标题、提示词和标签中匹配
    pub q: Option<String>,
    /// 参考图片，按主色调相似度排序
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: Option<String>,
    /// 等待后台特征计算的最长时间，单位为毫秒
    pub wait_ms: Option<u64>,
    /// 返回的结果数量
    pub count: Option<usize>,
}

/// 单条搜索结果
#[derive(Debug, Serialize, ToSchema)]
pub struct SearchHit {
    pub score: f32,
    pub prompt: Record,
}

/// 搜索响应
#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResponse {
    /// 搜索耗时，单位为毫秒
    pub time: u64,
    /// 查询模式：mixed、text、visual 或 none
    pub mode: String,
    /// 超时后仍未完成计算的图片数量
    pub pending: usize,
    /// 按得分从高到低排序的结果
    pub result: Vec<SearchHit>,
}
