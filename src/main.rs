use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;
mod config;
mod logcache;
mod utils;

use cmd::MetaArgs;
use config::{FileConfig, MetaConfig};

/// log-cache-meta - per-source metadata report for a Log Cache service
///
/// Command layout:
///   log-cache-meta meta [--timeout 2s] [--no-headers] [--json]
///
/// Global flags / env:
///   -v / -vv          Increase verbosity (logs go to stderr)
///   -q / --quiet      Errors only
///   --addr            Log Cache address (or LOG_CACHE_ADDR)
///   --config          YAML file with `addr` / `timeout` (or LOG_CACHE_CONFIG)
///
/// Examples:
///   log-cache-meta --addr https://log-cache.example.com meta
///   LOG_CACHE_ADDR=localhost:8080 log-cache-meta meta --no-headers
///   log-cache-meta --config lc.yml meta --timeout 5s --json
#[derive(Parser, Debug)]
#[command(
    name = "log-cache-meta",
    version,
    author,
    about = "List cluster logs and metrics held by Log Cache",
    propagate_version = true,
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Silence all non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log Cache address (http/https URL or host:port)
    #[arg(long = "addr", global = true, env = "LOG_CACHE_ADDR", value_name = "URL")]
    addr: Option<String>,

    /// YAML config file providing `addr` and `timeout`
    #[arg(long = "config", global = true, env = "LOG_CACHE_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show counts, expirations and cache duration per source
    Meta(MetaArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = utils::derive_level(cli.verbose, cli.quiet);
    utils::init_logging(level);

    let file = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };

    match cli.command {
        Commands::Meta(args) => {
            let conf = MetaConfig::resolve(cli.addr.as_deref(), &file, &args)?;
            tracing::debug!(addr = %conf.addr, timeout = ?conf.timeout, "resolved configuration");
            cmd::execute_meta(conf)
        }
    }
}
