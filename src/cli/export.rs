use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::info;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::gallery::GalleryBuilder;

#[derive(Parser, Debug, Clone)]
pub struct ExportCommand {
    /// 输出文件，不填则输出到标准输出
    pub output: Option<PathBuf>,
}

impl SubCommandExtend for ExportCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let gallery = GalleryBuilder::new(opts.conf_dir.clone()).open().await?;
        let records = gallery.export().await?;
        let data = serde_json::to_string_pretty(&records)?;
        match &self.output {
            Some(path) => {
                tokio::fs::write(path, data).await?;
                info!("导出 {} 条记录到 {}", records.len(), path.display());
            }
            None => println!("{}", data),
        }
        Ok(())
    }
}
