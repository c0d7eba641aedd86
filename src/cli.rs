use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::completion::{DEFAULT_API_BASE, DEFAULT_MODEL};

#[derive(Parser, Debug)]
#[command(
    name = "prodspec",
    version,
    about = "Local product specification extraction and reconciliation tooling"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Lookup(LookupArgs),
    Scrape(ScrapeArgs),
    Fill(FillArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct LookupArgs {
    #[arg(long = "id", required = true)]
    pub identifiers: Vec<String>,

    #[arg(long, default_value_t = false)]
    pub by_sku: bool,

    #[arg(long, default_value = "./existing_data")]
    pub data_root: PathBuf,

    #[arg(long, default_value_t = false)]
    pub nested: bool,

    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ScrapeArgs {
    #[arg(long)]
    pub product: String,

    #[arg(long, default_value_t = 10)]
    pub timeout_secs: u64,

    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct FillArgs {
    #[arg(long)]
    pub product: String,

    #[arg(long, default_value_t = false)]
    pub by_sku: bool,

    #[arg(long, default_value = "./existing_data")]
    pub data_root: PathBuf,

    #[arg(long, default_value = "./templates")]
    pub templates: PathBuf,

    #[arg(long, default_value_t = false)]
    pub from_catalog: bool,

    #[arg(long)]
    pub scraped_file: Option<PathBuf>,

    #[arg(long, default_value = "output.json")]
    pub out: PathBuf,

    #[arg(long, default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    #[arg(long, default_value_t = 60)]
    pub timeout_secs: u64,

    #[arg(long, default_value_t = 10)]
    pub scrape_timeout_secs: u64,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = "./existing_data")]
    pub data_root: PathBuf,

    #[arg(long, default_value = "./templates")]
    pub templates: PathBuf,

    #[arg(long, default_value = "output.json")]
    pub artifact: PathBuf,
}
