use anyhow::Result;
use clap::Parser;
use indicatif::ProgressBar;
use log::info;

use crate::cli::SubCommandExtend;
use crate::config::{EnrichOptions, Opts};
use crate::gallery::GalleryBuilder;
use crate::utils::pb_style;

#[derive(Parser, Debug, Clone)]
pub struct BackfillCommand {
    #[command(flatten)]
    pub enrich: EnrichOptions,
}

impl SubCommandExtend for BackfillCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let gallery =
            GalleryBuilder::new(opts.conf_dir.clone()).sample_size(self.enrich.sample_size).open().await?;
        let (total, missing) = gallery.count().await?;
        info!("共 {} 条记录，{} 条缺少颜色特征", total, missing);

        let pb = ProgressBar::no_length().with_style(pb_style());
        let stored = gallery.backfill(self.enrich.wait(), &pb).await?;
        pb.finish_with_message(format!("写入 {} 个颜色特征", stored));
        Ok(())
    }
}
