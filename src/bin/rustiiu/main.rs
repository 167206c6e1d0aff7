// main.rs from rustiiu (c) 2025 NinjaCheetah & Contributors
// https://github.com/NinjaCheetah/rustiiu
//
// Base for the rustiiu CLI that handles argument parsing and logging setup.

mod download;

use std::path::PathBuf;
use anyhow::Result;
use clap::{Args, Parser};
use rustiiu::nus::download::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT};
use rustiiu::nus::layout;
use rustiiu::nus::plan::ALL_REGIONS;

#[derive(Parser)]
#[command(version, about = "Downloads Wii U titles from the CDN, ready to be installed")]
pub struct Cli {
    #[command(flatten)]
    pub source: Source,
    /// Title Keys to use for the titles, in the same order as the titles
    #[arg(short, long, num_args = 1.., value_name = "KEY", conflicts_with = "regions")]
    pub keys: Vec<String>,
    /// The directory to download titles into
    #[arg(short, long, default_value = "install")]
    pub out_dir: PathBuf,
    /// Get Title Keys (and names and regions) from the key site
    #[arg(long)]
    pub online_keys: bool,
    /// Download premade Tickets from the key site instead of generating them
    #[arg(long)]
    pub online_tickets: bool,
    /// How many times to try each download before giving up on a title
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(0..=9))]
    pub retry_count: u32,
    /// Patch generated DLC Tickets so that all DLC is unlocked
    #[arg(long)]
    pub patch_dlc: bool,
    /// Patch generated demo Tickets to remove play count limits
    #[arg(long)]
    pub patch_demo: bool,
    /// Don't download anything, only show what would be downloaded and where
    #[arg(long)]
    pub simulate: bool,
    /// Only create the Ticket, TMD and certificate chain, without downloading any content
    #[arg(long)]
    pub tickets_only: bool,
    /// The base URL of the key site to use for online keys and Tickets
    #[arg(long)]
    pub keysite: Option<String>,
    /// The base URL of the CDN to download from
    #[arg(long, default_value = layout::DEFAULT_CDN)]
    pub cdn: String,
    /// Seconds to wait when connecting to a server
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT.as_secs(), value_name = "SECS")]
    pub connect_timeout: u64,
    /// Seconds to wait for data from a server before the attempt is retried
    #[arg(long, default_value_t = DEFAULT_READ_TIMEOUT.as_secs(), value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,
    /// Where to save the key database downloaded from the key site
    #[arg(long, default_value = "titlekeys.json")]
    pub key_db: PathBuf,
}

#[derive(Args)]
#[group(multiple = false, required = true)]
pub struct Source {
    /// Title IDs of the titles to download
    #[arg(short, long, num_args = 1.., value_name = "TITLE")]
    pub titles: Vec<String>,
    /// Download every title in the key database from these regions
    #[arg(short, long, num_args = 1.., value_name = "REGION", value_parser = ALL_REGIONS)]
    pub regions: Vec<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .format_target(false)
        .init();
    let cli = Cli::parse();
    download::run(&cli)
}
