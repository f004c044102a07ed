use std::time::Duration;

use anyhow::{Context, Result};
use log::info;
use sqlx::{SqlitePool, sqlite::*};

use crate::config::ConfDir;

pub mod crud;
pub mod model;

pub use model::*;

pub type Database = SqlitePool;

/// 打开配置目录下的提示词库，目录或数据库不存在时自动创建
pub async fn init_db(conf_dir: &ConfDir) -> Result<Database> {
    std::fs::create_dir_all(conf_dir.path())
        .with_context(|| format!("无法创建配置目录: {}", conf_dir.path().display()))?;

    let filename = conf_dir.database();
    info!("打开提示词库: {}", filename.display());

    // 搜索写回特征和服务器写操作可能同时发生
    let options = SqliteConnectOptions::new()
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5))
        .filename(&filename)
        .create_if_missing(true);

    let pool = SqlitePool::connect_with(options).await?;
    sqlx::migrate!().run(&pool).await.context("提示词库迁移失败")?;

    let (total, missing) = crud::get_count(&pool).await?;
    info!("共 {} 条提示词，{} 条缺少颜色特征", total, missing);

    Ok(pool)
}
