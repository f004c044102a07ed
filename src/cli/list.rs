use anyhow::Result;
use clap::Parser;

use crate::cli::{OutputFormat, SubCommandExtend, print_records};
use crate::config::Opts;
use crate::gallery::{GalleryBuilder, RecordSource};

#[derive(Parser, Debug, Clone)]
pub struct ListCommand {
    /// 输出格式
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for ListCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let gallery = GalleryBuilder::new(opts.conf_dir.clone()).open().await?;
        let records = gallery.list_records().await?;
        print_records(&records, self.output_format)
    }
}
