use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, warn};
use tokio::task::spawn_blocking;

use crate::cache::FeatureCache;
use crate::color::{self, ColorFeature};
use crate::fetch::ImageFetcher;
use crate::metrics::{EnrichOutcome, inc_enrich_count};
use crate::record::Record;

/// 后台特征计算调度器
///
/// 视觉查询生效时，为缺少特征的记录各启动一个任务，结果逐个写入缓存。
/// 任务不会被强制中止，过期结果通过代数和 `active` 标志丢弃。
pub struct EnrichmentCoordinator<F> {
    cache: Arc<FeatureCache>,
    fetcher: Arc<F>,
    active: Arc<AtomicBool>,
    sample_size: u32,
}

impl<F: ImageFetcher> EnrichmentCoordinator<F> {
    pub fn new(cache: Arc<FeatureCache>, fetcher: Arc<F>, sample_size: u32) -> Self {
        Self { cache, fetcher, active: Arc::new(AtomicBool::new(true)), sample_size }
    }

    pub fn cache(&self) -> &Arc<FeatureCache> {
        &self.cache
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// 为当前代数下缺少特征的记录启动计算任务，返回启动的任务数量
    ///
    /// 必须在 tokio 运行时内调用
    pub fn launch(&self, records: &[Record]) -> usize {
        if !self.is_active() {
            return 0;
        }

        let generation = self.cache.generation();
        let mut launched = 0;
        for record in records.iter().filter(|r| r.feature.is_none()) {
            if !self.cache.claim(record.id, generation) {
                continue;
            }
            self.spawn_task(record.id, record.image.clone(), generation);
            launched += 1;
        }

        if launched > 0 {
            debug!("第 {} 代：启动 {} 个特征计算任务", generation, launched);
        }
        launched
    }

    fn spawn_task(&self, id: i64, image: String, generation: u64) {
        let cache = self.cache.clone();
        let fetcher = self.fetcher.clone();
        let active = self.active.clone();
        let sample_size = self.sample_size;

        tokio::spawn(async move {
            let outcome = match compute(fetcher.as_ref(), &image, sample_size).await {
                _ if !active.load(Ordering::Acquire) => {
                    cache.release(id, generation);
                    EnrichOutcome::Discarded
                }
                Ok(feature) => {
                    if cache.put(id, feature, generation) {
                        EnrichOutcome::Stored
                    } else {
                        EnrichOutcome::Discarded
                    }
                }
                Err(outcome) => {
                    // 过期任务的失败不影响新一代
                    if !cache.fail(id, generation) {
                        EnrichOutcome::Discarded
                    } else {
                        outcome
                    }
                }
            };
            inc_enrich_count(outcome);
        });
    }

    /// 等待当前代数的任务全部结束，超时返回 false
    pub async fn settled(&self, timeout: Duration) -> bool {
        let mut rx = self.cache.subscribe();
        let wait = async {
            loop {
                if self.cache.pending() == 0 {
                    return;
                }
                if rx.changed().await.is_err() {
                    return;
                }
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }

    /// 关闭调度器，之后所有未完成任务的结果都会被丢弃
    pub fn shutdown(&self) {
        self.active.store(false, Ordering::Release);
    }
}

impl<F> Drop for EnrichmentCoordinator<F> {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}

async fn compute<F: ImageFetcher>(
    fetcher: &F,
    image: &str,
    sample_size: u32,
) -> Result<ColorFeature, EnrichOutcome> {
    let bytes = match fetcher.fetch(image).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("获取图片失败: {}: {e}", preview(image));
            return Err(EnrichOutcome::FetchFailed);
        }
    };

    let decoded = spawn_blocking(move || {
        color::decode(&bytes).map(|img| ColorFeature::from_image(&img, sample_size))
    })
    .await;

    match decoded {
        Ok(Ok(feature)) => Ok(feature),
        Ok(Err(e)) => {
            warn!("解码图片失败: {}: {e}", preview(image));
            Err(EnrichOutcome::DecodeFailed)
        }
        Err(e) => {
            warn!("特征计算任务异常: {}: {e}", preview(image));
            Err(EnrichOutcome::DecodeFailed)
        }
    }
}

/// data URI 可能很长，日志中只保留开头
fn preview(image: &str) -> &str {
    match image.char_indices().nth(64) {
        Some((i, _)) => &image[..i],
        None => image,
    }
}
