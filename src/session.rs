use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::watch;

use crate::cache::FeatureCache;
use crate::color::{self, ColorFeature};
use crate::enrich::EnrichmentCoordinator;
use crate::fetch::ImageFetcher;
use crate::rank::{Query, Ranked, rank};
use crate::record::Record;

/// 一个搜索上下文：记录集合、查询条件、特征缓存和后台调度器
///
/// 每个上下文互相独立，销毁时未完成的后台结果全部丢弃。
/// 设置视觉查询会启动后台任务，需要在 tokio 运行时内调用。
pub struct SearchSession<F: ImageFetcher> {
    records: Vec<Record>,
    query: Query,
    coordinator: EnrichmentCoordinator<F>,
    sample_size: u32,
}

impl<F: ImageFetcher> SearchSession<F> {
    pub fn new(fetcher: Arc<F>, sample_size: u32) -> Self {
        let cache = Arc::new(FeatureCache::new());
        Self {
            records: vec![],
            query: Query::default(),
            coordinator: EnrichmentCoordinator::new(cache, fetcher, sample_size),
            sample_size,
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn cache(&self) -> &FeatureCache {
        self.coordinator.cache()
    }

    /// 替换记录集合，缓存随之清空
    pub fn set_records(&mut self, records: Vec<Record>) {
        self.records = records;
        self.coordinator.cache().reset();
        if self.query.has_visual() {
            self.coordinator.launch(&self.records);
        }
    }

    /// 修改查询文本，不会触发后台计算
    pub fn set_query_text(&mut self, text: &str) {
        self.query.set_text(text);
    }

    /// 设置或清除参考图片，返回提取出的查询特征
    ///
    /// 无法解码的图片视为没有参考图片
    pub fn set_query_image(&mut self, image: Option<&[u8]>) -> Option<ColorFeature> {
        let feature = image.and_then(|bytes| match color::decode(bytes) {
            Ok(img) => Some(ColorFeature::from_image(&img, self.sample_size)),
            Err(e) => {
                warn!("参考图片无法解码，忽略视觉查询: {e}");
                None
            }
        });
        self.set_query_feature(feature);
        feature
    }

    /// 设置或清除查询特征
    ///
    /// 每次调用都会递增代数，之前启动的任务结果不再写入
    pub fn set_query_feature(&mut self, feature: Option<ColorFeature>) {
        let generation = self.coordinator.cache().advance();
        self.query.set_feature(feature);
        match feature {
            Some(feature) => {
                debug!("第 {} 代视觉查询: {}", generation, feature);
                self.coordinator.launch(&self.records);
            }
            None => debug!("第 {} 代：清除视觉查询", generation),
        }
    }

    /// 当前排序结果
    pub fn current_ranking(&self) -> Vec<Ranked<'_>> {
        let snapshot = self.coordinator.cache().snapshot();
        rank(&self.records, &self.query, &snapshot)
    }

    /// 等待后台计算结束，超时返回 false
    pub async fn settled(&self, timeout: Duration) -> bool {
        self.coordinator.settled(timeout).await
    }

    /// 订阅缓存变化，用于在特征逐步补全时重新排序
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.coordinator.cache().subscribe()
    }

    /// 后台计算得到的特征，可写回存储
    pub fn computed_features(&self) -> HashMap<i64, ColorFeature> {
        self.coordinator.cache().snapshot()
    }

    /// 关闭会话，之后的后台结果全部丢弃
    pub fn close(&self) {
        self.coordinator.shutdown();
    }
}
