//! Two-phase fleet search.
//!
//! Phase 1 lists every endpoint concurrently and appends each record to a
//! shared job list. Phase 2 feeds the jobs through a bounded channel to a
//! fixed pool of workers, which resolve themes when needed and keep their
//! own matches until they are joined.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::endpoint::ListFilter;
use crate::fleet::{fan_out, Fleet, ForumThemeId, OperationFailure, OperationKind};

use super::types::{SearchJob, SearchMatch, SearchQuery};

/// Number of Phase 2 workers.
pub const SEARCH_WORKERS: usize = 4;

#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    /// Matches ordered by fleet position, then hash.
    pub matches: Vec<SearchMatch>,
    /// Records inspected in Phase 2.
    pub inspected: usize,
    pub failures: Vec<OperationFailure>,
}

/// Search every endpoint for records matching `query`.
pub async fn search(fleet: &Fleet, query: &SearchQuery) -> SearchOutcome {
    let mut outcome = SearchOutcome::default();
    if query.is_empty() {
        return outcome;
    }

    let (jobs, failures) = collect_jobs(fleet).await;
    outcome.failures = failures;
    outcome.inspected = jobs.len();
    debug!(jobs = jobs.len(), query = %query, "Search jobs collected");

    let (tx, rx) = mpsc::channel::<SearchJob>(jobs.len().max(1));
    let rx = Arc::new(Mutex::new(rx));

    let handles: Vec<_> = (0..SEARCH_WORKERS)
        .map(|worker| {
            let rx = Arc::clone(&rx);
            let query = query.clone();
            tokio::spawn(async move { run_worker(worker, rx, query).await })
        })
        .collect();

    for job in jobs {
        if tx.send(job).await.is_err() {
            // Every worker is gone; their join results report why.
            break;
        }
    }
    drop(tx);

    for handle in handles {
        match handle.await {
            Ok((matches, failures)) => {
                outcome.matches.extend(matches);
                outcome.failures.extend(failures);
            }
            Err(e) => {
                error!(error = %e, "Search worker failed");
                outcome
                    .failures
                    .push(OperationFailure::fleet_wide(OperationKind::Search, e));
            }
        }
    }

    outcome.matches.sort_by(|a, b| {
        a.endpoint_index
            .cmp(&b.endpoint_index)
            .then_with(|| a.record.hash.cmp(&b.record.hash))
    });
    outcome
}

/// Phase 1: list every endpoint concurrently into one shared job list.
async fn collect_jobs(fleet: &Fleet) -> (Vec<SearchJob>, Vec<OperationFailure>) {
    let sink: Arc<Mutex<Vec<SearchJob>>> = Arc::new(Mutex::new(Vec::new()));

    let listings = fan_out(fleet.endpoints().iter().cloned().enumerate(), |(index, endpoint)| {
        let sink = Arc::clone(&sink);
        async move {
            let records = match endpoint.list_torrents(ListFilter::All).await {
                Ok(records) => records,
                Err(e) => {
                    warn!(endpoint = %endpoint.id(), error = %e, "Torrent listing failed");
                    return Some(OperationFailure::new(
                        OperationKind::Search,
                        endpoint.id(),
                        &e,
                    ));
                }
            };
            for record in records {
                sink.lock().await.push(SearchJob {
                    endpoint_index: index,
                    endpoint: Arc::clone(&endpoint),
                    record,
                });
            }
            None
        }
    })
    .await;

    let failures: Vec<_> = fleet
        .endpoints()
        .iter()
        .zip(listings)
        .filter_map(|(endpoint, joined)| match joined {
            Ok(failure) => failure,
            Err(e) => {
                error!(endpoint = %endpoint.id(), error = %e, "Listing task failed");
                Some(OperationFailure::new(OperationKind::Search, endpoint.id(), e))
            }
        })
        .collect();

    let jobs = std::mem::take(&mut *sink.lock().await);
    (jobs, failures)
}

/// Phase 2 worker: drain the shared receiver until the sender is dropped.
async fn run_worker(
    worker: usize,
    rx: Arc<Mutex<mpsc::Receiver<SearchJob>>>,
    query: SearchQuery,
) -> (Vec<SearchMatch>, Vec<OperationFailure>) {
    let mut matches = Vec::new();
    let mut failures = Vec::new();

    loop {
        let job = rx.lock().await.recv().await;
        let Some(job) = job else { break };

        let theme = if query.theme.is_some() {
            match job.endpoint.torrent_detail(&job.record.hash).await {
                Ok(detail) => ForumThemeId::extract(&detail.comment),
                Err(e) => {
                    warn!(
                        endpoint = %job.endpoint.id(),
                        hash = %job.record.hash,
                        error = %e,
                        "Detail lookup failed during search"
                    );
                    failures.push(OperationFailure::new(
                        OperationKind::Search,
                        job.endpoint.id(),
                        &e,
                    ));
                    None
                }
            }
        } else {
            None
        };

        if query.matches(&job.record.hash, theme) {
            info!(worker, endpoint = %job.endpoint.id(), "Search match\n{:#?}", job.record);
            matches.push(SearchMatch {
                endpoint_index: job.endpoint_index,
                endpoint: job.endpoint.id().clone(),
                record: job.record,
                theme,
            });
        }
    }

    (matches, failures)
}
