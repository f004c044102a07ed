use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use base64::prelude::*;

/// 根据记录中的图片引用获取图片内容
pub trait ImageFetcher: Send + Sync + 'static {
    fn fetch(&self, reference: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// 支持 http(s) URL、data URI 和本地路径
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("promptsearch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>> {
        let reference = reference.trim();
        if let Some(uri) = reference.strip_prefix("data:") {
            return decode_data_uri(uri);
        }
        if reference.starts_with("http://") || reference.starts_with("https://") {
            let resp = self.client.get(reference).send().await?.error_for_status()?;
            return Ok(resp.bytes().await?.to_vec());
        }
        let path = reference.strip_prefix("file://").unwrap_or(reference);
        tokio::fs::read(path).await.with_context(|| format!("无法读取图片: {path}"))
    }
}

/// 解析 `data:` 之后的部分，形如 `image/png;base64,....`
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>> {
    let Some((meta, payload)) = uri.split_once(',') else {
        bail!("无效的 data URI");
    };
    if meta.split(';').any(|p| p.eq_ignore_ascii_case("base64")) {
        Ok(BASE64_STANDARD.decode(payload.trim())?)
    } else {
        Ok(payload.as_bytes().to_vec())
    }
}
