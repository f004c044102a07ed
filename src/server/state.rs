use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum_auth::AuthBearerCustom;

use super::error::AppError;
use crate::Gallery;
use crate::config::EnrichOptions;

/// 应用状态
pub struct AppState {
    /// 提示词画廊
    pub gallery: Gallery,
    /// 默认的后台计算选项
    pub enrich: EnrichOptions,
    /// 鉴权 token
    pub token: String,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(gallery: Gallery, enrich: EnrichOptions, token: String) -> Arc<Self> {
        Arc::new(AppState { gallery, enrich, token })
    }

    /// 校验写操作的 token
    pub fn authorize(&self, bearer: &Bearer) -> Result<(), AppError> {
        if token_eq(bearer.0.as_bytes(), self.token.as_bytes()) {
            Ok(())
        } else {
            Err(AppError::unauthorized())
        }
    }
}

/// `Authorization: Bearer <token>`，缺失时返回 401
pub struct Bearer(pub String);

impl AuthBearerCustom for Bearer {
    const ERROR_CODE: StatusCode = StatusCode::UNAUTHORIZED;
    const ERROR_OVERWRITE: Option<&'static str> = None;

    fn from_header(contents: &str) -> Self {
        Self(contents.to_string())
    }
}

impl<S> FromRequestParts<S> for Bearer
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        Self::decode_request_parts(parts)
    }
}

/// 比较耗时只与长度有关，不随首个不同字节的位置变化
fn token_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
