//! Runs the selected operations once across the fleet.

use chrono::Utc;
use tracing::{debug, info};

use crate::balancer;
use crate::control::{apply_pause, filters};
use crate::dedup::run_dedup;
use crate::endpoint::ListFilter;
use crate::fleet::{Fleet, FleetError, FleetSnapshot};
use crate::report::{
    missing_files, normalize_force_start, CategoryReport, ErrorReport, StatusReport,
};
use crate::search;

use super::types::{Operations, RoundReport, RoundSettings};

/// Run one round.
///
/// Endpoints whose credentials were rejected get one fresh login attempt.
/// One unfiltered snapshot is fetched up front and shared by every operation
/// that reads it; the others query the fleet themselves. Selected operations
/// run concurrently and the round ends when all of them have finished.
pub async fn run_round(
    fleet: &Fleet,
    ops: &Operations,
    settings: &RoundSettings,
) -> Result<RoundReport, FleetError> {
    ops.validate()?;
    let started_at = Utc::now();
    fleet.retry_rejected().await;

    let snapshot = if ops.needs_snapshot() {
        FleetSnapshot::fetch(fleet, ListFilter::All).await
    } else {
        FleetSnapshot::default()
    };
    debug!(torrents = snapshot.len(), "Round snapshot ready");
    let snapshot = &snapshot;

    let (status, dedup, balance, search, pause, filters) = tokio::join!(
        async {
            if ops.status {
                let report = StatusReport::build(snapshot);
                let force_start = normalize_force_start(snapshot).await;
                Some((report, force_start))
            } else {
                None
            }
        },
        async {
            match ops.dedup {
                Some(mode) => Some(run_dedup(snapshot, mode).await),
                None => None,
            }
        },
        async {
            match ops.headroom {
                Some(headroom) => Some(balancer::balance(fleet, headroom).await),
                None => None,
            }
        },
        async {
            match &ops.search {
                Some(query) => Some(search::search(fleet, query).await),
                None => None,
            }
        },
        async {
            match ops.pause_action() {
                Some(action) => Some(apply_pause(snapshot, action).await),
                None => None,
            }
        },
        async {
            if ops.filters {
                Some(filters::renew(fleet, &settings.filter_url).await)
            } else {
                None
            }
        },
    );

    let categories = ops.categories.then(|| CategoryReport::build(snapshot));
    let errors = ops.wants_errors().then(|| ErrorReport::build(snapshot));
    let notices = if ops.wants_missing_files() {
        missing_files(snapshot)
    } else {
        Vec::new()
    };
    let (status, force_start) = match status {
        Some((report, force_start)) => (Some(report), Some(force_start)),
        None => (None, None),
    };

    let mut failures = snapshot.failures().to_vec();
    let collected = [
        force_start.as_ref().map(|o| &o.failures),
        dedup.as_ref().map(|o| &o.failures),
        balance.as_ref().map(|o| &o.failures),
        search.as_ref().map(|o| &o.failures),
        pause.as_ref().map(|o| &o.failures),
        filters.as_ref().map(|o| &o.failures),
    ];
    for list in collected.into_iter().flatten() {
        failures.extend(list.iter().cloned());
    }

    let report = RoundReport {
        started_at,
        finished_at: Utc::now(),
        snapshot_size: snapshot.len(),
        categories,
        status,
        force_start,
        dedup,
        balance,
        search,
        pause,
        filters,
        errors,
        missing_files: notices,
        failures,
    };

    info!(
        torrents = report.snapshot_size,
        failures = report.failures.len(),
        elapsed_ms = report.elapsed().num_milliseconds(),
        "Round complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::dedup::DedupMode;
    use crate::endpoint::TorrentState;
    use crate::testing::{fixtures, MockEndpoint};

    fn settings() -> RoundSettings {
        RoundSettings {
            filter_url: "http://127.0.0.1:9/ipfilter.dat".to_string(),
        }
    }

    #[tokio::test]
    async fn test_invalid_operations_contact_nothing() {
        let a = Arc::new(MockEndpoint::new("a", 8080));
        let fleet = Fleet::new(vec![a.clone()]);
        let ops = Operations {
            pause: true,
            resume: true,
            ..Default::default()
        };

        let result = run_round(&fleet, &ops, &settings()).await;
        assert!(matches!(result, Err(FleetError::InvalidArgument(_))));
        assert!(a.listing_calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_is_shared_by_readers() {
        let a = Arc::new(MockEndpoint::new("a", 8080));
        a.add_torrent(fixtures::record_in_category("x", "movies", 10, "/d"))
            .await;

        let fleet = Fleet::new(vec![a.clone()]);
        let ops = Operations {
            status: true,
            categories: true,
            errors: true,
            dedup: Some(DedupMode::ReportOnly),
            ..Default::default()
        };

        let report = run_round(&fleet, &ops, &settings()).await.unwrap();
        assert_eq!(a.listing_calls().await, vec![ListFilter::All]);
        assert_eq!(report.snapshot_size, 1);
        assert!(report.categories.is_some());
        assert!(report.status.is_some());
        assert!(report.force_start.is_some());
        assert!(report.errors.is_some());
        assert!(report.balance.is_none());
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_failures_are_collected_not_fatal() {
        let good = Arc::new(MockEndpoint::new("good", 8080));
        let bad = Arc::new(MockEndpoint::new("bad", 8080));
        good.add_torrent(fixtures::record_in_state("s", TorrentState::StalledDl))
            .await;
        bad.set_preferences_failure(true).await;

        let fleet = Fleet::new(vec![good.clone(), bad]);
        let ops = Operations {
            headroom: Some(3),
            ..Default::default()
        };

        let report = run_round(&fleet, &ops, &settings()).await.unwrap();
        let balance = report.balance.unwrap();
        assert_eq!(balance.decisions.len(), 1);
        assert_eq!(balance.decisions[0].new_limit, 4);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.snapshot_size, 0);
    }
}
