//! Fleet-wide pause and resume.

use std::fmt;
use std::sync::Arc;

use tracing::{error, info};

use crate::endpoint::EndpointError;
use crate::fleet::{fan_out, FleetSnapshot, OperationFailure, OperationKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseAction {
    Pause,
    Resume,
}

impl PauseAction {
    fn kind(self) -> OperationKind {
        match self {
            PauseAction::Pause => OperationKind::Pause,
            PauseAction::Resume => OperationKind::Resume,
        }
    }
}

impl fmt::Display for PauseAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PauseAction::Pause => f.write_str("pause"),
            PauseAction::Resume => f.write_str("resume"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PauseOutcome {
    /// Endpoints that accepted the batch.
    pub endpoints: usize,
    /// Torrents covered by accepted batches.
    pub torrents: usize,
    pub failures: Vec<OperationFailure>,
}

/// Apply `action` to every torrent in the snapshot, one call per endpoint.
/// Endpoints without torrents are skipped.
pub async fn apply(snapshot: &FleetSnapshot, action: PauseAction) -> PauseOutcome {
    let batches: Vec<_> = snapshot
        .listings()
        .iter()
        .filter(|listing| !listing.records.is_empty())
        .map(|listing| {
            let hashes: Vec<String> = listing.records.iter().map(|r| r.hash.clone()).collect();
            (Arc::clone(&listing.endpoint), hashes)
        })
        .collect();
    let targets: Vec<_> = batches
        .iter()
        .map(|(endpoint, hashes)| (endpoint.id().clone(), hashes.len()))
        .collect();

    let results = fan_out(batches, move |(endpoint, hashes)| async move {
        match action {
            PauseAction::Pause => endpoint.pause(&hashes).await,
            PauseAction::Resume => endpoint.resume(&hashes).await,
        }
    })
    .await;

    let mut outcome = PauseOutcome::default();
    for ((id, count), joined) in targets.into_iter().zip(results) {
        let result = joined.unwrap_or_else(|e| Err(EndpointError::ApiError(e.to_string())));
        match result {
            Ok(()) => {
                info!(endpoint = %id, count, action = %action, "Batch applied");
                outcome.endpoints += 1;
                outcome.torrents += count;
            }
            Err(e) => {
                error!(endpoint = %id, error = %e, action = %action, "Batch failed");
                outcome
                    .failures
                    .push(OperationFailure::new(action.kind(), &id, &e));
            }
        }
    }
    outcome
}
