use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use clap::{Parser, Subcommand};
use directories::ProjectDirs;

use crate::cli::*;
use crate::color::DEFAULT_SAMPLE_SIZE;

static CONF_DIR: LazyLock<String> = LazyLock::new(|| {
    match ProjectDirs::from("", "promptsearch", "promptsearch") {
        Some(proj_dirs) => proj_dirs.config_dir().to_string_lossy().into_owned(),
        None => ".promptsearch".to_string(),
    }
});

fn default_config_dir() -> &'static str {
    CONF_DIR.as_str()
}

#[derive(Parser, Debug, Clone)]
pub struct EnrichOptions {
    /// 颜色特征采样尺寸，图片宽高分别缩小到不超过该值
    #[arg(long, value_name = "N", default_value_t = DEFAULT_SAMPLE_SIZE, value_parser = clap::value_parser!(u32).range(1..=4096))]
    pub sample_size: u32,
    /// 等待后台特征计算完成的最长时间，单位为毫秒
    #[arg(long, value_name = "MS", default_value_t = 3000)]
    pub wait_ms: u64,
}

impl EnrichOptions {
    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "promptsearch", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// promptsearch 配置文件目录
    #[arg(short, long, default_value = default_config_dir())]
    pub conf_dir: ConfDir,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 添加一条提示词
    Add(AddCommand),
    /// 删除一条提示词
    Remove(RemoveCommand),
    /// 列出所有提示词
    List(ListCommand),
    /// 按文本和参考图片搜索提示词
    Search(SearchCommand),
    /// 为缺少颜色特征的提示词计算特征
    Backfill(BackfillCommand),
    /// 从 JSON 文件导入提示词
    Import(ImportCommand),
    /// 导出所有提示词为 JSON
    Export(ExportCommand),
    /// 启动 HTTP 服务
    Server(ServerCommand),
}

#[derive(Debug, Clone)]
pub struct ConfDir {
    path: PathBuf,
}

impl ConfDir {
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 返回数据库文件的路径
    pub fn database(&self) -> PathBuf {
        self.path.join("promptsearch.db")
    }
}

impl FromStr for ConfDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}
