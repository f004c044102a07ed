mod add;
mod backfill;
mod export;
mod import;
mod list;
mod remove;
mod search;
pub mod server;

pub use add::*;
pub use backfill::*;
pub use export::*;
pub use import::*;
pub use list::*;
pub use remove::*;
pub use search::*;
pub use server::*;

use anyhow::Result;
use clap::ValueEnum;

use crate::config::Opts;
use crate::rank::Ranked;
use crate::record::Record;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum OutputFormat {
    Json,
    #[default]
    Table,
}

fn print_records(records: &[Record], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(records)?)
        }
        OutputFormat::Table => {
            for r in records {
                let feature = r.feature.map(|f| f.to_string()).unwrap_or_else(|| "-".to_string());
                println!("{}\t{}\t{}\t{}", r.id, feature, r.title, r.tags.join(","));
            }
        }
    }
    Ok(())
}

fn print_ranking(result: &[Ranked], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?)
        }
        OutputFormat::Table => {
            for r in result {
                println!("{:.2}\t{}\t{}", r.score, r.prompt.id, r.prompt.title);
            }
        }
    }
    Ok(())
}
