//! Save a page or post

use std::io::Read;

use colored::Colorize;

use crate::app::AppContext;
use crate::cli::SaveArgs;
use crate::core::Document;
use crate::error::{Result, StashError};
use crate::search::CollectionEvent;

pub fn run(ctx: &AppContext, args: &SaveArgs) -> Result<()> {
    let text = read_text(args)?;

    let mut doc = if args.post {
        let author = args.author.clone().unwrap_or_default();
        let handle = args.handle.clone().unwrap_or_default();
        let mut doc = Document::new_post(author, handle, args.url.clone(), text);
        doc.title = args.title.clone();
        doc
    } else {
        Document::new_page(
            args.title.clone(),
            args.url.clone(),
            args.excerpt.clone(),
            text,
        )
    };
    doc.favicon = args.favicon.clone();
    doc.image = args.image.clone();

    ctx.db.upsert_document(&doc)?;

    // Embed in the background, but wait before exiting the process
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        if let Some(handle) = ctx.consistency.handle_event(CollectionEvent::Created(doc.clone())) {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "background embedding task failed");
            }
        }
    });

    if ctx.json_output {
        println!(
            "{}",
            serde_json::to_string(&serde_json::json!({ "saved": true, "id": doc.id }))?
        );
    } else {
        println!("{} {} ({})", "Saved".green().bold(), doc.title, doc.id.dimmed());
    }
    Ok(())
}

fn read_text(args: &SaveArgs) -> Result<String> {
    if let Some(text) = &args.text {
        return Ok(text.clone());
    }
    if let Some(path) = &args.file {
        return Ok(std::fs::read_to_string(path)?);
    }

    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .map_err(StashError::Io)?;
    Ok(buf)
}
