use anyhow::Result;
use clap::Parser;

use crate::cli::SubCommandExtend;
use crate::config::{EnrichOptions, Opts};
use crate::gallery::GalleryBuilder;
use crate::record::{NewPrompt, parse_tags};

#[derive(Parser, Debug, Clone)]
pub struct AddCommand {
    #[command(flatten)]
    pub enrich: EnrichOptions,
    /// 标题
    #[arg(short, long, default_value = "")]
    pub title: String,
    /// 提示词
    #[arg(short, long)]
    pub prompt: String,
    /// 参考图片，可以是 URL、data URI 或本地路径
    #[arg(short, long)]
    pub image: String,
    /// 标签，多个标签用逗号分隔
    #[arg(long, default_value = "")]
    pub tags: String,
}

impl SubCommandExtend for AddCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let gallery =
            GalleryBuilder::new(opts.conf_dir.clone()).sample_size(self.enrich.sample_size).open().await?;
        let record = gallery
            .add_prompt(NewPrompt {
                title: self.title.clone(),
                prompt: self.prompt.clone(),
                image: self.image.clone(),
                tags: parse_tags(&self.tags),
                feature: None,
            })
            .await?;
        println!("{}", serde_json::to_string_pretty(&record)?);
        Ok(())
    }
}
