use anyhow::{Result, bail};
use clap::Parser;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::gallery::GalleryBuilder;

#[derive(Parser, Debug, Clone)]
pub struct RemoveCommand {
    /// 提示词 ID
    pub id: i64,
}

impl SubCommandExtend for RemoveCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let gallery = GalleryBuilder::new(opts.conf_dir.clone()).open().await?;
        if !gallery.delete_prompt(self.id).await? {
            bail!("记录不存在: {}", self.id);
        }
        Ok(())
    }
}
