//! Lifecycle commands: delete, clear, reindex

use colored::Colorize;

use crate::app::AppContext;
use crate::cli::{ClearArgs, DeleteArgs};
use crate::error::{Result, StashError};
use crate::search::CollectionEvent;

pub fn delete(ctx: &AppContext, args: &DeleteArgs) -> Result<()> {
    // The embedding record goes with the document in one transaction, so
    // the store never dangles; the event also evicts the cached vector.
    let deleted = ctx.db.delete_document(&args.id)?;
    ctx.consistency
        .handle_event(CollectionEvent::Deleted(args.id.clone()));

    if !deleted {
        return Err(StashError::DocumentNotFound(args.id.clone()));
    }

    if ctx.json_output {
        println!(
            "{}",
            serde_json::to_string(&serde_json::json!({ "deleted": true, "id": args.id }))?
        );
    } else {
        println!("{} {}", "Deleted".red().bold(), args.id);
    }
    Ok(())
}

pub fn clear(ctx: &AppContext, args: &ClearArgs) -> Result<()> {
    if !args.yes {
        return Err(StashError::InvalidInput(
            "this deletes every saved item; pass --yes to confirm".to_string(),
        ));
    }

    ctx.db.clear_documents()?;
    ctx.consistency.handle_event(CollectionEvent::Cleared);

    if ctx.json_output {
        println!(
            "{}",
            serde_json::to_string(&serde_json::json!({ "cleared": true }))?
        );
    } else {
        println!("{}", "Cleared all saved items".red().bold());
    }
    Ok(())
}

pub fn reindex(ctx: &AppContext) -> Result<()> {
    let documents = ctx.db.list_documents()?;
    let total = documents.len();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        for handle in ctx.consistency.reindex(&documents) {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "background embedding task failed");
            }
        }
    });

    if ctx.json_output {
        println!(
            "{}",
            serde_json::to_string(&serde_json::json!({ "reindexed": total }))?
        );
    } else {
        println!("{} {} items", "Reindexed".green().bold(), total);
    }
    Ok(())
}
