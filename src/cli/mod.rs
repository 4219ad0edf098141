use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod formatters;

#[derive(Parser)]
#[command(name = "quotefolio")]
#[command(version, about = "Live stock portfolio valuation with sector breakdown")]
#[command(
    long_about = "Values a stock portfolio against live quotes (Yahoo Finance with Google Finance fallback), breaks it down by sector, and keeps refreshing on a fixed interval."
)]
pub struct Cli {
    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    /// Portfolio config file (defaults to $QUOTEFOLIO_CONFIG or the user config dir)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a sample portfolio config
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Fetch quotes once and print the portfolio
    Show,

    /// Keep refreshing and re-print after every pass (Enter refreshes now)
    Watch {
        /// Override the configured refresh interval, in seconds
        #[arg(short, long)]
        interval: Option<u64>,
    },
}
