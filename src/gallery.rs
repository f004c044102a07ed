use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use indicatif::ProgressBar;
use log::{debug, info, warn};
use tokio::task::spawn_blocking;

use crate::color::{self, ColorFeature, DEFAULT_SAMPLE_SIZE};
use crate::config::ConfDir;
use crate::db::{Database, crud, init_db};
use crate::fetch::{HttpFetcher, ImageFetcher};
use crate::record::{NewPrompt, PromptPatch, Record};
use crate::session::SearchSession;

/// 记录来源
pub trait RecordSource {
    /// 按创建时间倒序返回所有记录
    fn list_records(&self) -> impl Future<Output = Result<Vec<Record>>> + Send;
}

impl RecordSource for Vec<Record> {
    async fn list_records(&self) -> Result<Vec<Record>> {
        Ok(self.clone())
    }
}

pub struct GalleryBuilder {
    conf_dir: ConfDir,
    sample_size: u32,
}

impl GalleryBuilder {
    pub fn new(conf_dir: ConfDir) -> Self {
        Self { conf_dir, sample_size: DEFAULT_SAMPLE_SIZE }
    }

    /// 颜色特征的采样尺寸
    pub fn sample_size(mut self, sample_size: u32) -> Self {
        self.sample_size = sample_size;
        self
    }

    pub async fn open(self) -> Result<Gallery> {
        let db = init_db(&self.conf_dir).await?;
        let fetcher = Arc::new(HttpFetcher::new()?);
        Ok(Gallery { db, fetcher, sample_size: self.sample_size })
    }
}

/// 提示词画廊：记录存储与搜索入口
pub struct Gallery {
    db: Database,
    fetcher: Arc<HttpFetcher>,
    sample_size: u32,
}

impl RecordSource for Gallery {
    async fn list_records(&self) -> Result<Vec<Record>> {
        Ok(crud::list_prompts(&self.db).await?)
    }
}

impl Gallery {
    pub fn sample_size(&self) -> u32 {
        self.sample_size
    }

    pub async fn get(&self, id: i64) -> Result<Option<Record>> {
        Ok(crud::get_prompt(&self.db, id).await?)
    }

    /// 记录总数和缺少特征的记录数
    pub async fn count(&self) -> Result<(i64, i64)> {
        Ok(crud::get_count(&self.db).await?)
    }

    /// 创建一个新的搜索上下文，并载入当前所有记录
    pub async fn session(&self) -> Result<SearchSession<HttpFetcher>> {
        let mut session = SearchSession::new(self.fetcher.clone(), self.sample_size);
        session.set_records(self.list_records().await?);
        Ok(session)
    }

    /// 计算一张图片的颜色特征，获取或解码失败时返回 None
    pub async fn compute_feature(&self, image: &str) -> Option<ColorFeature> {
        let bytes = match self.fetcher.fetch(image).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("获取图片失败，特征留待之后计算: {e}");
                return None;
            }
        };
        let sample_size = self.sample_size;
        let decoded = spawn_blocking(move || {
            color::decode(&bytes).map(|img| ColorFeature::from_image(&img, sample_size))
        })
        .await;
        match decoded {
            Ok(Ok(feature)) => Some(feature),
            Ok(Err(e)) => {
                warn!("解码图片失败: {e}");
                None
            }
            Err(e) => {
                warn!("特征计算任务异常: {e}");
                None
            }
        }
    }

    /// 添加记录，没有提供特征时尝试立即计算
    pub async fn add_prompt(&self, mut new: NewPrompt) -> Result<Record> {
        if !new.is_valid() {
            bail!("提示词和图片不能为空");
        }
        if new.feature.is_none() {
            new.feature = self.compute_feature(&new.image).await;
        }
        let record = crud::add_prompt(&self.db, &new).await?;
        info!("添加记录 {}: {}", record.id, record.title);
        Ok(record)
    }

    /// 部分更新记录，记录不存在时返回 None
    pub async fn update_prompt(&self, id: i64, patch: PromptPatch) -> Result<Option<Record>> {
        let Some(mut record) = self.get(id).await? else {
            return Ok(None);
        };
        patch.apply(&mut record);
        if record.feature.is_none() {
            record.feature = self.compute_feature(&record.image).await;
        }
        crud::update_prompt(&self.db, &record).await?;
        info!("更新记录 {}", id);
        Ok(Some(record))
    }

    pub async fn delete_prompt(&self, id: i64) -> Result<bool> {
        let deleted = crud::delete_prompt(&self.db, id).await?;
        if deleted {
            info!("删除记录 {}", id);
        }
        Ok(deleted)
    }

    /// 将后台计算出的特征写回数据库，只会填充缺失的特征
    pub async fn store_features(&self, features: &HashMap<i64, ColorFeature>) -> Result<usize> {
        if features.is_empty() {
            return Ok(0);
        }
        let mut tx = self.db.begin().await?;
        let mut stored = 0;
        for (&id, &feature) in features {
            if crud::set_feature_if_missing(&mut *tx, id, feature).await? {
                stored += 1;
            }
        }
        tx.commit().await?;
        debug!("写回 {} 个颜色特征", stored);
        Ok(stored)
    }

    /// 为所有缺少特征的记录计算特征并写回，返回写入数量
    pub async fn backfill(&self, timeout: Duration, pb: &ProgressBar) -> Result<usize> {
        let mut session = self.session().await?;
        let missing = session.records().iter().filter(|r| r.feature.is_none()).count();
        pb.set_length(missing as u64);
        if missing == 0 {
            return Ok(0);
        }

        let mut rx = session.subscribe();
        // 查询特征本身不影响计算，只用于激活后台任务
        session.set_query_feature(Some(ColorFeature::NEUTRAL));

        let wait = async {
            loop {
                let cache = session.cache();
                pb.set_position((missing - cache.pending()) as u64);
                if cache.pending() == 0 || rx.changed().await.is_err() {
                    break;
                }
            }
        };
        if tokio::time::timeout(timeout, wait).await.is_err() {
            warn!("等待超时，仍有 {} 张图片未完成", session.cache().pending());
        }

        let stored = self.store_features(&session.computed_features()).await?;
        session.close();
        Ok(stored)
    }

    /// 导入记录，返回写入数量
    pub async fn import(&self, records: &[Record], overwrite: bool, pb: &ProgressBar) -> Result<usize> {
        pb.set_length(records.len() as u64);
        let mut tx = self.db.begin().await?;
        let mut imported = 0;
        for record in records {
            if !record.is_valid() {
                pb.println(format!("跳过无效记录: {}", record.id));
            } else if crud::import_record(&mut *tx, record, overwrite).await? {
                imported += 1;
            } else {
                pb.set_message(format!("跳过已存在记录: {}", record.id));
            }
            pb.inc(1);
        }
        tx.commit().await?;
        Ok(imported)
    }

    /// 导出所有记录
    pub async fn export(&self) -> Result<Vec<Record>> {
        self.list_records().await
    }
}
