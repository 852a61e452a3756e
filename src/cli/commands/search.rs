//! Hybrid search over saved content

use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;

use crate::app::AppContext;
use crate::cli::SearchArgs;
use crate::error::Result;
use crate::search::{DebouncedSearch, SearchResult};

pub fn run(ctx: &AppContext, args: &SearchArgs) -> Result<()> {
    if args.watch {
        return run_watch(ctx, args);
    }

    let query = args.query.as_deref().unwrap_or_default();
    let documents = ctx.db.list_documents()?;
    let limit = args.limit.unwrap_or(ctx.config.search.top_k);
    let results = ctx.orchestrator.search_with_limit(query, &documents, limit);

    if ctx.json_output {
        print_json(&results)?;
    } else {
        print_human(query, &results);
    }
    Ok(())
}

/// Interactive mode: every stdin line is a query. Submissions are
/// debounced, so rapid input collapses into one search and only the
/// latest result is printed.
fn run_watch(ctx: &AppContext, args: &SearchArgs) -> Result<()> {
    let documents = ctx.db.list_documents()?;
    let limit = args.limit.unwrap_or(ctx.config.search.top_k);
    let quiet_period = Duration::from_millis(ctx.config.search.debounce_ms);
    let json_output = ctx.json_output;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let debounced = DebouncedSearch::new(Arc::clone(&ctx.orchestrator), quiet_period);
        let mut outcomes = debounced.subscribe();

        let printer = tokio::spawn(async move {
            while outcomes.changed().await.is_ok() {
                let outcome = outcomes.borrow_and_update().clone();
                if let Some(outcome) = outcome {
                    let mut results = outcome.results.clone();
                    results.truncate(limit);
                    if json_output {
                        let _ = print_json(&results);
                    } else {
                        print_human(&outcome.query, &results);
                    }
                }
            }
        });

        let mut last_submission = args
            .query
            .clone()
            .map(|query| debounced.submit(query, documents.clone()));
        loop {
            let line = tokio::task::spawn_blocking(|| {
                let mut buf = String::new();
                match std::io::stdin().read_line(&mut buf) {
                    Ok(0) | Err(_) => None,
                    Ok(_) => Some(buf),
                }
            })
            .await
            .ok()
            .flatten();

            let Some(line) = line else { break };
            let query = line.trim().to_string();
            if query.is_empty() {
                continue;
            }
            last_submission = Some(debounced.submit(query, documents.clone()));
        }

        // Let the final submission run to completion, then stop printing
        if let Some(handle) = last_submission {
            let _ = handle.await;
        }
        drop(debounced);
        let _ = printer.await;
        Ok(())
    })
}

fn print_json(results: &[SearchResult]) -> Result<()> {
    let rows: Vec<serde_json::Value> = results
        .iter()
        .map(|r| {
            serde_json::json!({
                "id": r.document.id,
                "title": r.document.title,
                "url": r.document.url,
                "score": r.combined_score,
                "lexical_hit": r.lexical_hit,
                "semantic_score": r.semantic_score,
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

fn print_human(query: &str, results: &[SearchResult]) {
    if results.is_empty() {
        println!("No results for {}", query.bold());
        return;
    }

    for result in results {
        let marker = if result.lexical_hit {
            "keyword".yellow()
        } else {
            "semantic".cyan()
        };
        println!(
            "{:>6.3}  {}  {} [{}]",
            result.combined_score,
            result.document.title.bold(),
            result.document.url.dimmed(),
            marker,
        );
        if !result.document.excerpt.is_empty() {
            println!("        {}", result.document.excerpt);
        }
    }
}
