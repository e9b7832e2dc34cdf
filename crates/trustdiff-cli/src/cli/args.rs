//! Command-line argument definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::output::OutputFormat;

/// Compare a root program catalog against a reference root store
///
/// Run `trustdiff refresh` once to populate the catalog cache, then
/// `trustdiff diff` to see which catalog roots the reference store lacks.
#[derive(Parser, Debug)]
#[command(name = "trustdiff")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, env = "TRUSTDIFF_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum)]
    pub output: Option<OutputFormat>,

    /// Increase verbosity
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download the inclusion report and every listed certificate
    Refresh,

    /// Show cache state and the outcome of the last refresh
    Status,

    /// List catalog certificates missing from the reference store
    Diff(DiffArgs),

    /// List the cached catalog, flagging roots the reference store has
    Catalog,

    /// List the reference store, flagging roots the catalog has
    Reference,

    /// List trust anchors from local trust stores
    Roots,

    /// Refresh on an interval until interrupted
    Watch(WatchArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Keep well-known long-lived anchors in the result
    #[arg(long)]
    pub include_known_anchors: bool,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Hours between refreshes (overrides the config file)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval_hours: Option<u64>,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Show config file path
    Path,

    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
