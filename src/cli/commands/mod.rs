//! Command handlers

use std::io;

use clap::CommandFactory;

use crate::app::AppContext;
use crate::cli::{Cli, Commands, CompletionsArgs};
use crate::error::Result;

pub mod list;
pub mod manage;
pub mod save;
pub mod search;

pub fn run(ctx: &AppContext, command: &Commands) -> Result<()> {
    match command {
        Commands::Save(args) => save::run(ctx, args),
        Commands::Search(args) => search::run(ctx, args),
        Commands::List => list::run(ctx),
        Commands::Delete(args) => manage::delete(ctx, args),
        Commands::Clear(args) => manage::clear(ctx, args),
        Commands::Reindex => manage::reindex(ctx),
        Commands::Completions(args) => run_completions(args),
    }
}

/// Completions need no app context; dispatched before it is built.
pub fn run_completions(args: &CompletionsArgs) -> Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(args.shell, &mut cmd, "pagestash", &mut io::stdout());
    Ok(())
}
