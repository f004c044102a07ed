use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum_typed_multipart::TypedMultipart;
use log::{info, warn};
use tokio::task::block_in_place;

use super::error::{AppError, Result};
use super::state::{AppState, Bearer};
use super::types::*;
use crate::gallery::RecordSource;
use crate::metrics;
use crate::record::{NewPrompt, PromptPatch, Record};

/// 列出所有提示词
#[utoipa::path(
    get,
    path = "/prompts",
    responses(
        (status = 200, body = Vec<Record>),
    )
)]
pub async fn list_handler(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Record>>> {
    Ok(Json(state.gallery.list_records().await?))
}

/// 获取一条提示词
#[utoipa::path(
    get,
    path = "/prompts/{id}",
    params(("id" = i64, Path, description = "记录 ID")),
    responses(
        (status = 200, body = Record),
        (status = 404),
    )
)]
pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Record>> {
    match state.gallery.get(id).await? {
        Some(record) => Ok(Json(record)),
        None => Err(AppError::not_found(id)),
    }
}

/// 添加一条提示词
#[utoipa::path(
    post,
    path = "/prompts",
    request_body = NewPrompt,
    responses(
        (status = 201, body = Record),
        (status = 400),
        (status = 401),
    )
)]
pub async fn add_handler(
    State(state): State<Arc<AppState>>,
    bearer: Bearer,
    Json(data): Json<NewPrompt>,
) -> Result<(StatusCode, Json<Record>)> {
    state.authorize(&bearer)?;
    if !data.is_valid() {
        return Err(AppError::bad_request("提示词和图片不能为空"));
    }
    let record = state.gallery.add_prompt(data).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// 修改一条提示词
#[utoipa::path(
    put,
    path = "/prompts/{id}",
    params(("id" = i64, Path, description = "记录 ID")),
    request_body = PromptPatch,
    responses(
        (status = 200, body = Record),
        (status = 400),
        (status = 401),
        (status = 404),
    )
)]
pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    bearer: Bearer,
    Path(id): Path<i64>,
    Json(data): Json<PromptPatch>,
) -> Result<Json<Record>> {
    state.authorize(&bearer)?;
    let blank = |s: &Option<String>| s.as_deref().is_some_and(|s| s.trim().is_empty());
    if blank(&data.prompt) || blank(&data.image) {
        return Err(AppError::bad_request("提示词和图片不能为空"));
    }
    match state.gallery.update_prompt(id, data).await? {
        Some(record) => Ok(Json(record)),
        None => Err(AppError::not_found(id)),
    }
}

/// 删除一条提示词
#[utoipa::path(
    delete,
    path = "/prompts/{id}",
    params(("id" = i64, Path, description = "记录 ID")),
    responses(
        (status = 204),
        (status = 401),
        (status = 404),
    )
)]
pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    bearer: Bearer,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    state.authorize(&bearer)?;
    if state.gallery.delete_prompt(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found(id))
    }
}

/// 按文本和参考图片搜索提示词
#[utoipa::path(
    post,
    path = "/search",
    request_body(content = SearchForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = SearchResponse),
    )
)]
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    data: TypedMultipart<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    let start = Instant::now();
    let mut session = state.gallery.session().await?;
    session.set_query_text(data.q.as_deref().unwrap_or_default());

    if let Some(file) = &data.file {
        info!("正在搜索上传图片，大小 {} 字节", file.len());
        block_in_place(|| session.set_query_image(Some(&file[..])));
        let wait = data.wait_ms.map(Duration::from_millis).unwrap_or_else(|| state.enrich.wait());
        if !session.settled(wait).await {
            warn!("等待超时，仍有 {} 张图片未完成", session.cache().pending());
        }
    }

    let mode = session.query().mode();
    let features = session.computed_features();
    state.gallery.store_features(&features).await?;

    let mut result: Vec<SearchHit> = session
        .current_ranking()
        .into_iter()
        .map(|r| {
            let mut prompt = r.prompt.clone();
            prompt.feature = prompt.feature.or_else(|| features.get(&prompt.id).copied());
            SearchHit { score: r.score, prompt }
        })
        .collect();
    if let Some(count) = data.count {
        result.truncate(count);
    }
    let pending = session.cache().pending();
    session.close();

    let elapsed = start.elapsed();
    metrics::inc_search_count(mode);
    metrics::inc_search_duration(mode, elapsed.as_secs_f32());

    Ok(Json(SearchResponse {
        time: elapsed.as_millis() as u64,
        mode: mode.to_string(),
        pending,
        result,
    }))
}

/// prometheus 指标
#[utoipa::path(get, path = "/metrics")]
pub async fn metrics_handler() -> Result<String> {
    Ok(metrics::gather_text()?)
}
