use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use log::{debug, info, warn};
use tokio::task::block_in_place;

use crate::cli::{OutputFormat, SubCommandExtend, print_ranking};
use crate::config::{EnrichOptions, Opts};
use crate::gallery::GalleryBuilder;
use crate::metrics;

#[derive(Parser, Debug, Clone)]
pub struct SearchCommand {
    #[command(flatten)]
    pub enrich: EnrichOptions,
    /// 搜索文本
    #[arg(short, long)]
    pub text: Option<String>,
    /// 参考图片路径
    #[arg(short, long)]
    pub image: Option<PathBuf>,
    /// 显示的结果数量
    #[arg(long, value_name = "COUNT", default_value_t = 20)]
    pub count: usize,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for SearchCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let gallery =
            GalleryBuilder::new(opts.conf_dir.clone()).sample_size(self.enrich.sample_size).open().await?;
        let mut session = gallery.session().await?;
        let start = Instant::now();

        session.set_query_text(self.text.as_deref().unwrap_or_default());
        if let Some(path) = &self.image {
            let bytes = tokio::fs::read(path).await?;
            let feature = block_in_place(|| session.set_query_image(Some(&bytes)));
            debug!("参考图片特征: {:?}", feature);
            if !session.settled(self.enrich.wait()).await {
                warn!("等待超时，仍有 {} 张图片未完成", session.cache().pending());
            }
        }

        let mode = session.query().mode();
        metrics::inc_search_count(mode);
        metrics::inc_search_duration(mode, start.elapsed().as_secs_f32());

        let stored = gallery.store_features(&session.computed_features()).await?;
        if stored > 0 {
            info!("写回 {} 个颜色特征", stored);
        }

        let mut result = session.current_ranking();
        result.truncate(self.count);
        print_ranking(&result, self.output_format)
    }
}
