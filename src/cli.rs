use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "release-impact",
    version,
    about = "Monthly player counts against media release dates"
)]
pub struct Cli {
    /// Path of the JSON configuration file.
    #[arg(long, global = true, default_value = "config.json")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Download monthly tables for every configured source.
    Fetch,
    /// Chart and analyze the stored tables of every franchise.
    Analyze,
    /// Fetch, then analyze.
    Run,
}
