//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Harvest resource changes and publish them as an inventory plus changesets
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: syncfeed.toml)
    #[arg(short = 'C', long, global = true, default_value = "syncfeed.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Ingest JSON-lines event files and write the feed as XML files
    #[command(visible_alias = "r")]
    Replay {
        /// Event files, one batch per file, in order
        #[arg(required = true, value_hint = clap::ValueHint::FilePath)]
        events: Vec<PathBuf>,

        /// Output directory for sitemaps and changesets
        #[arg(short, long, default_value = "public", value_hint = clap::ValueHint::DirPath)]
        output: PathBuf,
    },

    /// Harvest continuously and serve the feed over HTTP
    #[command(visible_alias = "s")]
    Serve {
        /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
        #[arg(short, long)]
        interface: Option<std::net::IpAddr>,

        /// Port number to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
}
