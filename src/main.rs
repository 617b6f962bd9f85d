//! syncfeed - harvest resource changes, serve an inventory and changesets.

use anyhow::Result;
use clap::{ColorChoice, Parser};
use syncfeed::cli::{self, Cli, Commands};
use syncfeed::config::FeedConfig;
use syncfeed::logger;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    cli::serve::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let mut config = FeedConfig::load(&cli.config)?;

    match cli.command {
        Commands::Replay { events, output } => {
            cli::replay::run_replay(&config, &events, &output).map(|_| ())
        }
        Commands::Serve { interface, port } => {
            config.apply_serve_options(interface, port);
            cli::serve::serve(config)
        }
    }
}
