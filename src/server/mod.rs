mod api;
mod error;
mod state;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use self::state::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::list_handler,
        api::get_handler,
        api::add_handler,
        api::update_handler,
        api::delete_handler,
        api::search_handler,
        api::metrics_handler,
    ),
    components(schemas(
        types::SearchForm,
        types::SearchHit,
        types::SearchResponse,
        crate::record::Record,
        crate::record::NewPrompt,
        crate::record::PromptPatch,
        crate::color::ColorFeature,
    ))
)]
pub struct ApiDoc;

/// 构建API服务器
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/prompts", get(api::list_handler).post(api::add_handler))
        .route(
            "/prompts/{id}",
            get(api::get_handler).put(api::update_handler).delete(api::delete_handler),
        )
        .route("/search", post(api::search_handler))
        .route("/metrics", get(api::metrics_handler))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::disable())
        // 上传限制：10M
        .layer(RequestBodyLimitLayer::new(1024 * 1024 * 10))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use anyhow::Result;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use indicatif::ProgressBar;
    use serde_json::{Value, json};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::*;
    use crate::GalleryBuilder;
    use crate::color::ColorFeature;
    use crate::config::EnrichOptions;
    use crate::record::Record;

    const TOKEN: &str = "test-token";
    const BOUNDARY: &str = "promptsearch-boundary";

    fn png(rgb: [u8; 3]) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb(rgb)))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn write_png(dir: &TempDir, name: &str, rgb: [u8; 3]) -> String {
        let path = dir.path().join(name);
        std::fs::write(&path, png(rgb)).unwrap();
        path.to_string_lossy().into_owned()
    }

    async fn state(dir: &TempDir) -> Result<Arc<AppState>> {
        let gallery = GalleryBuilder::new(dir.path().to_string_lossy().parse()?).open().await?;
        let enrich = EnrichOptions { sample_size: 64, wait_ms: 5000 };
        Ok(AppState::new(gallery, enrich, TOKEN.to_string()))
    }

    async fn send(state: &Arc<AppState>, request: Request<Body>) -> Result<(StatusCode, Value)> {
        let response = create_app(state.clone()).oneshot(request).await?;
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        Ok((status, value))
    }

    fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder =
            Request::builder().method(method).uri(uri).header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn search_request(q: &str, file: Option<&[u8]>) -> Request<Body> {
        let mut body = Vec::new();
        body.extend(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"q\"\r\n\r\n{q}\r\n").as_bytes(),
        );
        if let Some(file) = file {
            body.extend(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"q.png\"\r\n\
                     Content-Type: image/png\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend(file);
            body.extend(b"\r\n");
        }
        body.extend(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/search")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_mutations_require_token() -> Result<()> {
        let dir = TempDir::new()?;
        let state = state(&dir).await?;
        let red = write_png(&dir, "red.png", [255, 0, 0]);
        let body = json!({"title": "Red", "prompt": "red", "image": red});

        let (status, _) = send(&state, json_request("POST", "/prompts", None, body.clone())).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = send(&state, json_request("POST", "/prompts", Some("wrong"), body.clone())).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = send(&state, json_request("DELETE", "/prompts/1", None, Value::Null)).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) =
            send(&state, json_request("PUT", "/prompts/1", Some("wrong"), json!({"title": "x"}))).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        assert_eq!(state.gallery.count().await?, (0, 0));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_prompt_crud() -> Result<()> {
        let dir = TempDir::new()?;
        let state = state(&dir).await?;
        let red = write_png(&dir, "red.png", [255, 0, 0]);

        let blank = json!({"prompt": "red", "image": " "});
        let (status, _) = send(&state, json_request("POST", "/prompts", Some(TOKEN), blank)).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let body = json!({"title": "Red", "prompt": "red", "image": red, "tags": ["warm"]});
        let (status, created) = send(&state, json_request("POST", "/prompts", Some(TOKEN), body)).await?;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["feature"], json!({"r": 255, "g": 0, "b": 0}));
        let id = created["id"].as_i64().unwrap();

        let (status, fetched) = send(&state, get(&format!("/prompts/{id}"))).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, created);
        let (status, _) = send(&state, get("/prompts/999")).await?;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let uri = format!("/prompts/{id}");
        let (status, _) =
            send(&state, json_request("PUT", &uri, Some(TOKEN), json!({"image": ""}))).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, updated) =
            send(&state, json_request("PUT", &uri, Some(TOKEN), json!({"title": "Crimson"}))).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["title"], "Crimson");
        let (status, _) =
            send(&state, json_request("PUT", "/prompts/999", Some(TOKEN), json!({"title": "x"}))).await?;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, listed) = send(&state, get("/prompts")).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().map(Vec::len), Some(1));

        let (status, _) = send(&state, json_request("DELETE", &uri, Some(TOKEN), Value::Null)).await?;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&state, json_request("DELETE", &uri, Some(TOKEN), Value::Null)).await?;
        assert_eq!(status, StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_search() -> Result<()> {
        let dir = TempDir::new()?;
        let state = state(&dir).await?;
        let red = write_png(&dir, "red.png", [255, 0, 0]);
        let blue = write_png(&dir, "blue.png", [0, 0, 255]);
        let record = |id: i64, title: &str, image: &str| Record {
            id,
            title: title.into(),
            prompt: "p".into(),
            image: image.into(),
            created_at: format!("2025-01-0{}T00:00:00.000Z", 4 - id),
            ..Default::default()
        };
        let records =
            vec![record(1, "Portrait red", &red), record(2, "Portrait blue", &blue), record(3, "Landscape", &blue)];
        state.gallery.import(&records, false, &ProgressBar::hidden()).await?;

        let (status, text) = send(&state, search_request("PORTRAIT", None)).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(text["mode"], "text");
        let ids = |v: &Value| -> Vec<i64> {
            v["result"].as_array().unwrap().iter().filter_map(|r| r["prompt"]["id"].as_i64()).collect()
        };
        assert_eq!(ids(&text), vec![1, 2]);

        let (status, mixed) = send(&state, search_request("portrait", Some(&png([0, 0, 250])))).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(mixed["mode"], "mixed");
        assert_eq!(mixed["pending"], 0);
        assert_eq!(ids(&mixed), vec![2, 1]);
        assert_eq!(mixed["result"][0]["prompt"]["feature"], json!({"r": 0, "g": 0, "b": 255}));
        assert!(mixed["result"][0]["score"].as_f64() > mixed["result"][1]["score"].as_f64());
        assert_eq!(state.gallery.get(2).await?.and_then(|r| r.feature), Some(ColorFeature::new(0, 0, 255)));

        // 无法解码的参考图片视为只有文本
        let (status, garbage) = send(&state, search_request("portrait", Some(b"garbage"))).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(garbage["mode"], "text");
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_metrics() -> Result<()> {
        let dir = TempDir::new()?;
        let state = state(&dir).await?;
        send(&state, search_request("", None)).await?;

        let response = create_app(state).oneshot(get("/metrics")).await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        assert!(String::from_utf8_lossy(&body).contains("ps_search_count"));
        Ok(())
    }
}
