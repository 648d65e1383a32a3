//! Adaptive download-queue sizing.
//!
//! Stalled downloads occupy active slots without making progress. Each
//! endpoint's active-download limit is set to its stalled count plus a fixed
//! headroom, so `headroom` torrents can always be moving.

use std::sync::Arc;

use tracing::{error, info};

use crate::endpoint::{Endpoint, EndpointId, ListFilter, PreferenceUpdate, TorrentState};
use crate::fleet::{fan_out, Fleet, OperationFailure, OperationKind};

/// Queue limit applied to one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadBalanceDecision {
    pub endpoint: EndpointId,
    /// `stalledDL` records in the downloading listing.
    pub stalled: u64,
    pub new_limit: u64,
}

#[derive(Debug, Clone, Default)]
pub struct LoadBalanceOutcome {
    /// Decisions applied successfully, in fleet order.
    pub decisions: Vec<LoadBalanceDecision>,
    pub failures: Vec<OperationFailure>,
}

/// Largest queue limit qBittorrent accepts; its preferences are 32-bit ints.
pub const MAX_QUEUE_LIMIT: u64 = i32::MAX as u64;

/// Resize every endpoint's download queue to `stalled + headroom`.
pub async fn balance(fleet: &Fleet, headroom: u64) -> LoadBalanceOutcome {
    let results = fan_out(fleet.endpoints().iter().cloned(), move |endpoint| {
        balance_one(endpoint, headroom)
    })
    .await;

    let mut outcome = LoadBalanceOutcome::default();
    for (endpoint, joined) in fleet.endpoints().iter().zip(results) {
        match joined {
            Ok(Ok(decision)) => outcome.decisions.push(decision),
            Ok(Err(failure)) => outcome.failures.push(failure),
            Err(e) => {
                error!(endpoint = %endpoint.id(), error = %e, "Balancing task failed");
                outcome.failures.push(OperationFailure::new(
                    OperationKind::LoadBalance,
                    endpoint.id(),
                    e,
                ));
            }
        }
    }
    outcome
}

async fn balance_one(
    endpoint: Arc<dyn Endpoint>,
    headroom: u64,
) -> Result<LoadBalanceDecision, OperationFailure> {
    let id = endpoint.id().clone();

    let records = endpoint
        .list_torrents(ListFilter::Downloading)
        .await
        .map_err(|e| {
            error!(endpoint = %id, error = %e, "Failed to list downloading torrents");
            OperationFailure::new(OperationKind::LoadBalance, &id, &e)
        })?;

    let stalled = records
        .iter()
        .filter(|r| r.state == TorrentState::StalledDl)
        .count() as u64;
    let new_limit = stalled
        .checked_add(headroom)
        .filter(|limit| *limit <= MAX_QUEUE_LIMIT)
        .ok_or_else(|| {
            error!(endpoint = %id, stalled, headroom, "Queue limit out of range");
            OperationFailure::new(
                OperationKind::LoadBalance,
                &id,
                format!(
                    "queue limit {} + {} exceeds {}",
                    stalled, headroom, MAX_QUEUE_LIMIT
                ),
            )
        })?;

    endpoint
        .set_preferences(&PreferenceUpdate::download_queue(new_limit))
        .await
        .map_err(|e| {
            error!(endpoint = %id, error = %e, "Failed to update queue preferences");
            OperationFailure::new(OperationKind::LoadBalance, &id, &e)
        })?;

    info!(endpoint = %id, stalled, new_limit, "Download queue resized");
    Ok(LoadBalanceDecision {
        endpoint: id,
        stalled,
        new_limit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    use crate::testing::{fixtures, MockEndpoint};

    async fn endpoint_with(states: &[TorrentState]) -> Arc<MockEndpoint> {
        let endpoint = Arc::new(MockEndpoint::new("box", 8080));
        for (i, state) in states.iter().enumerate() {
            endpoint
                .add_torrent(fixtures::record_in_state(&format!("h{}", i), *state))
                .await;
        }
        endpoint
    }

    #[tokio::test]
    async fn test_limit_is_stalled_plus_headroom() {
        let endpoint = endpoint_with(&[
            TorrentState::StalledDl,
            TorrentState::StalledDl,
            TorrentState::StalledDl,
            TorrentState::Downloading,
            TorrentState::Uploading,
        ])
        .await;

        let fleet = Fleet::new(vec![endpoint.clone()]);
        let outcome = balance(&fleet, 2).await;

        assert_eq!(outcome.decisions.len(), 1);
        assert_eq!(outcome.decisions[0].stalled, 3);
        assert_eq!(outcome.decisions[0].new_limit, 5);

        let updates = endpoint.preference_updates().await;
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].get("max_active_downloads"), Some(&Value::from(5u64)));
        assert_eq!(updates[0].get("queueing_enabled"), Some(&Value::Bool(true)));
        assert_eq!(updates[0].get("max_active_torrents"), Some(&Value::from(-1)));
        assert_eq!(endpoint.listing_calls().await, vec![ListFilter::Downloading]);
    }

    #[tokio::test]
    async fn test_zero_headroom_limits_to_stalled() {
        let endpoint = endpoint_with(&[TorrentState::StalledDl, TorrentState::StalledDl]).await;

        let fleet = Fleet::new(vec![endpoint.clone()]);
        let outcome = balance(&fleet, 0).await;

        assert_eq!(outcome.decisions[0].new_limit, 2);
    }

    #[tokio::test]
    async fn test_balancing_is_idempotent() {
        let endpoint = endpoint_with(&[TorrentState::StalledDl, TorrentState::QueuedDl]).await;
        let fleet = Fleet::new(vec![endpoint.clone()]);

        let first = balance(&fleet, 4).await;
        let second = balance(&fleet, 4).await;

        assert_eq!(first.decisions, second.decisions);
        assert_eq!(endpoint.current_preferences().await.max_active_downloads, 5);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_other_endpoints() {
        let good = endpoint_with(&[TorrentState::StalledDl]).await;
        let broken = Arc::new(MockEndpoint::new("broken", 8080));
        broken.set_preferences_failure(true).await;
        let unreachable = Arc::new(MockEndpoint::new("down", 8080));
        unreachable.set_listing_failure(true).await;

        let fleet = Fleet::new(vec![good.clone(), broken, unreachable.clone()]);
        let outcome = balance(&fleet, 1).await;

        assert_eq!(outcome.decisions.len(), 1);
        assert_eq!(outcome.decisions[0].new_limit, 2);
        assert_eq!(outcome.failures.len(), 2);
        assert!(outcome
            .failures
            .iter()
            .all(|f| f.operation == OperationKind::LoadBalance));
        assert!(unreachable.preference_updates().await.is_empty());
    }

    #[tokio::test]
    async fn test_out_of_range_limit_is_not_sent() {
        let endpoint = endpoint_with(&[TorrentState::StalledDl]).await;
        let fleet = Fleet::new(vec![endpoint.clone()]);

        let outcome = balance(&fleet, u64::MAX).await;
        assert!(outcome.decisions.is_empty());
        assert_eq!(outcome.failures.len(), 1);
        assert!(outcome.failures[0].error.contains("exceeds"));

        let outcome = balance(&fleet, MAX_QUEUE_LIMIT).await;
        assert_eq!(outcome.failures.len(), 1);
        assert!(endpoint.preference_updates().await.is_empty());

        let outcome = balance(&fleet, MAX_QUEUE_LIMIT - 1).await;
        assert_eq!(outcome.decisions[0].new_limit, MAX_QUEUE_LIMIT);
    }
}
