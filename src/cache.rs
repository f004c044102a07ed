use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::watch;

use crate::color::ColorFeature;
use crate::record::Record;

/// 懒计算的颜色特征缓存
///
/// 只保存记录本身没有特征时后台计算出的结果。每个搜索上下文持有一份，
/// 通过代数（generation）丢弃过期任务的结果。
pub struct FeatureCache {
    inner: RwLock<CacheInner>,
    revision: watch::Sender<u64>,
}

#[derive(Default)]
struct CacheInner {
    generation: u64,
    entries: HashMap<i64, ColorFeature>,
    /// 正在计算的记录，值为发起任务时的代数
    in_flight: HashMap<i64, u64>,
    /// 获取或解码失败的记录，本次会话内不再重试
    failed: HashSet<i64>,
}

impl CacheInner {
    /// 移除由该代数任务登记的计算状态
    fn release(&mut self, id: i64, generation: u64) -> bool {
        if self.in_flight.get(&id) == Some(&generation) {
            self.in_flight.remove(&id);
            true
        } else {
            false
        }
    }
}

impl Default for FeatureCache {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureCache {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self { inner: RwLock::new(CacheInner::default()), revision }
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump_revision(&self) {
        self.revision.send_modify(|r| *r += 1);
    }

    /// 当前代数
    pub fn generation(&self) -> u64 {
        self.read().generation
    }

    /// 查询条件变化时调用，递增代数并返回新值
    ///
    /// 已有的特征保持有效，旧代数的任务之后无法再写入
    pub fn advance(&self) -> u64 {
        let generation = {
            let mut inner = self.write();
            inner.generation += 1;
            inner.generation
        };
        self.bump_revision();
        generation
    }

    /// 记录集合替换时调用，递增代数并清空所有状态
    pub fn reset(&self) -> u64 {
        let generation = {
            let mut inner = self.write();
            inner.generation += 1;
            inner.entries.clear();
            inner.in_flight.clear();
            inner.failed.clear();
            inner.generation
        };
        self.bump_revision();
        generation
    }

    pub fn get(&self, id: i64) -> Option<ColorFeature> {
        self.read().entries.get(&id).copied()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.read().entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().entries.is_empty()
    }

    /// 获取当前所有特征的一致快照
    pub fn snapshot(&self) -> HashMap<i64, ColorFeature> {
        self.read().entries.clone()
    }

    /// 当前代数下仍在计算的任务数量
    pub fn pending(&self) -> usize {
        let inner = self.read();
        inner.in_flight.values().filter(|&&g| g == inner.generation).count()
    }

    pub fn is_failed(&self, id: i64) -> bool {
        self.read().failed.contains(&id)
    }

    /// 为记录登记一个计算任务
    ///
    /// 已有特征、当前代数下已在计算、已永久失败或代数过期时返回 false
    pub fn claim(&self, id: i64, generation: u64) -> bool {
        let mut inner = self.write();
        if generation != inner.generation
            || inner.entries.contains_key(&id)
            || inner.failed.contains(&id)
            || inner.in_flight.get(&id) == Some(&generation)
        {
            return false;
        }
        inner.in_flight.insert(id, generation);
        true
    }

    /// 写入计算结果，只有代数匹配且尚无特征时才会写入
    pub fn put(&self, id: i64, feature: ColorFeature, generation: u64) -> bool {
        {
            let mut inner = self.write();
            inner.release(id, generation);
            if generation != inner.generation || inner.entries.contains_key(&id) {
                return false;
            }
            inner.entries.insert(id, feature);
        }
        self.bump_revision();
        true
    }

    /// 标记记录永久失败，代数过期时忽略
    pub fn fail(&self, id: i64, generation: u64) -> bool {
        {
            let mut inner = self.write();
            inner.release(id, generation);
            if generation != inner.generation {
                return false;
            }
            inner.failed.insert(id);
        }
        self.bump_revision();
        true
    }

    /// 放弃任务但不记录结果，用于会话关闭后结束的任务
    pub fn release(&self, id: i64, generation: u64) -> bool {
        let released = self.write().release(id, generation);
        if released {
            self.bump_revision();
        }
        released
    }

    /// 订阅缓存变化，每次写入、失败或代数变化都会递增版本号
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

/// 记录的有效特征：优先使用持久化的特征，其次是缓存
pub fn effective_feature(record: &Record, cache: &HashMap<i64, ColorFeature>) -> Option<ColorFeature> {
    record.feature.or_else(|| cache.get(&record.id).copied())
}
