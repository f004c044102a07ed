use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use indicatif::ProgressBar;
use log::info;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::gallery::GalleryBuilder;
use crate::record::Record;
use crate::utils::pb_style;

#[derive(Parser, Debug, Clone)]
pub struct ImportCommand {
    /// JSON 文件路径，内容为记录数组
    pub path: PathBuf,
    /// 如果 ID 已存在，是否覆盖旧的记录
    #[arg(long)]
    pub overwrite: bool,
}

impl SubCommandExtend for ImportCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let records: Vec<Record> = serde_json::from_str(&raw)?;

        let gallery = GalleryBuilder::new(opts.conf_dir.clone()).open().await?;
        let pb = ProgressBar::no_length().with_style(pb_style());
        let imported = gallery.import(&records, self.overwrite, &pb).await?;
        pb.finish_and_clear();
        info!("导入 {} / {} 条记录", imported, records.len());
        Ok(())
    }
}
