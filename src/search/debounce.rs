//! Debounced search invocation
//!
//! Collapses bursts of query input into one execution: each submission
//! schedules a task that waits out a quiet period, and a newer submission
//! supersedes anything still waiting. Supersession is a monotonic sequence
//! number rather than a bare timer handle: the scheduled task re-checks the
//! sequence when its timer fires (so superseded work never starts) and
//! again before publishing (so a search that was already in flight when it
//! was superseded can never clobber a later result).
//!
//! Results are published on a watch channel; subscribers always observe
//! the outcome of the latest surviving invocation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::core::Document;
use crate::search::hybrid::{SearchOrchestrator, SearchResult};

/// Outcome of one debounced search invocation
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Sequence number of the invocation that produced these results
    pub seq: u64,
    pub query: String,
    pub results: Vec<SearchResult>,
}

/// Debounced front-end over a [`SearchOrchestrator`]
pub struct DebouncedSearch {
    orchestrator: Arc<SearchOrchestrator>,
    quiet_period: Duration,
    seq: Arc<AtomicU64>,
    outcome_tx: watch::Sender<Option<Arc<SearchOutcome>>>,
}

impl DebouncedSearch {
    pub fn new(orchestrator: Arc<SearchOrchestrator>, quiet_period: Duration) -> Self {
        let (outcome_tx, _) = watch::channel(None);
        Self {
            orchestrator,
            quiet_period,
            seq: Arc::new(AtomicU64::new(0)),
            outcome_tx,
        }
    }

    /// Observe published outcomes.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<SearchOutcome>>> {
        self.outcome_tx.subscribe()
    }

    /// Sequence number of the most recent submission.
    pub fn latest_seq(&self) -> u64 {
        self.seq.load(Ordering::SeqCst)
    }

    /// Schedule a search for `query` over a snapshot of the collection.
    ///
    /// Supersedes any scheduled invocation that has not yet started. Must
    /// be called within a tokio runtime; the returned handle resolves when
    /// this invocation finishes (or bows out as superseded).
    pub fn submit(&self, query: String, documents: Vec<Document>) -> JoinHandle<()> {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let latest = Arc::clone(&self.seq);
        let orchestrator = Arc::clone(&self.orchestrator);
        let outcome_tx = self.outcome_tx.clone();
        let quiet_period = self.quiet_period;

        tokio::spawn(async move {
            tokio::time::sleep(quiet_period).await;
            if latest.load(Ordering::SeqCst) != seq {
                tracing::trace!(seq, "superseded before start");
                return;
            }

            let search_query = query.clone();
            let searched = tokio::task::spawn_blocking(move || {
                orchestrator.search(&search_query, &documents)
            })
            .await;

            let results: Vec<SearchResult> = match searched {
                Ok(results) => results,
                Err(err) => {
                    tracing::warn!(seq, error = %err, "search task failed");
                    return;
                }
            };

            // A later invocation may have been submitted while this one ran
            if latest.load(Ordering::SeqCst) != seq {
                tracing::trace!(seq, "stale result dropped");
                return;
            }

            let _ = outcome_tx.send(Some(Arc::new(SearchOutcome {
                seq,
                query,
                results,
            })));
        })
    }

    /// Cancel whatever is scheduled without submitting a replacement.
    pub fn cancel(&self) {
        self.seq.fetch_add(1, Ordering::SeqCst);
    }
}
