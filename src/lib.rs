pub mod cache;
pub mod cli;
pub mod color;
pub mod config;
mod db;
pub mod enrich;
pub mod fetch;
pub mod gallery;
mod metrics;
pub mod rank;
pub mod record;
mod server;
pub mod session;
pub mod utils;

pub use config::Opts;
pub use gallery::{Gallery, GalleryBuilder};
