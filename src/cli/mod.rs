//! Command-line interface
//!
//! Uses clap v4 with derive macros for argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod commands;

/// pagestash - Save pages and posts, find them again by meaning
#[derive(Parser, Debug)]
#[command(name = "pagestash")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Machine-readable JSON output
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file path (default: ~/.config/pagestash/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Data directory (default: platform data dir)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Save a page or post
    Save(SaveArgs),
    /// Search saved content by meaning and keyword
    Search(SearchArgs),
    /// List saved content, newest first
    List,
    /// Delete one saved item
    Delete(DeleteArgs),
    /// Delete everything
    Clear(ClearArgs),
    /// Regenerate every embedding with the active backend
    Reindex,
    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(clap::Args, Debug)]
pub struct SaveArgs {
    /// Title of the saved item
    #[arg(long)]
    pub title: String,

    /// Source URL
    #[arg(long)]
    pub url: String,

    /// Short excerpt shown in listings
    #[arg(long, default_value = "")]
    pub excerpt: String,

    /// Full text content; reads stdin when omitted
    #[arg(long)]
    pub text: Option<String>,

    /// Read the full text from a file instead
    #[arg(long, conflicts_with = "text")]
    pub file: Option<PathBuf>,

    /// Save as a social post
    #[arg(long)]
    pub post: bool,

    /// Post author display name
    #[arg(long, requires = "post")]
    pub author: Option<String>,

    /// Post author handle
    #[arg(long, requires = "post")]
    pub handle: Option<String>,

    /// Favicon URL
    #[arg(long)]
    pub favicon: Option<String>,

    /// Preview image URL
    #[arg(long)]
    pub image: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct SearchArgs {
    /// The query; optional with --watch
    #[arg(required_unless_present = "watch")]
    pub query: Option<String>,

    /// Maximum number of results
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,

    /// Read queries from stdin, one per line, debounced
    #[arg(long)]
    pub watch: bool,
}

#[derive(clap::Args, Debug)]
pub struct DeleteArgs {
    /// Id of the item to delete
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct ClearArgs {
    /// Skip the confirmation
    #[arg(long)]
    pub yes: bool,
}

#[derive(clap::Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}
