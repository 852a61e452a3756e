//! List saved content, newest first

use colored::Colorize;

use crate::app::AppContext;
use crate::error::Result;

pub fn run(ctx: &AppContext) -> Result<()> {
    let documents = ctx.db.list_documents()?;

    // Opening the collection view schedules generation for anything still
    // missing a vector; cached documents are left untouched.
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        for handle in ctx.consistency.reconcile(&documents) {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "background embedding task failed");
            }
        }
    });

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&documents)?);
        return Ok(());
    }

    if documents.is_empty() {
        println!("No pages saved yet.");
        return Ok(());
    }

    for doc in &documents {
        println!(
            "{}  {}  {}",
            doc.timestamp.format("%Y-%m-%d %H:%M").to_string().dimmed(),
            doc.title.bold(),
            doc.id.dimmed(),
        );
        println!("        {}", doc.url);
    }
    Ok(())
}
