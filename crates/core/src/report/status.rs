//! Per-state totals and force-start normalisation.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::{error, info};

use crate::endpoint::{Endpoint, TorrentState};
use crate::fleet::{fan_out, FleetSnapshot, OperationFailure, OperationKind};

/// Bucket key: lifecycle state plus the force-start qualifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusKey {
    pub state: TorrentState,
    pub forced: bool,
}

impl StatusKey {
    /// Display label, `"<state>"` or `"<state>+F"`.
    pub fn label(&self) -> String {
        if self.forced {
            format!("{}+F", self.state)
        } else {
            self.state.to_string()
        }
    }
}

impl fmt::Display for StatusKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatusAggregate {
    pub size_bytes: u64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusRow {
    pub key: StatusKey,
    pub aggregate: StatusAggregate,
}

/// Status buckets sorted by label.
#[derive(Debug, Clone, Default)]
pub struct StatusReport {
    pub rows: Vec<StatusRow>,
}

impl StatusReport {
    pub fn build(snapshot: &FleetSnapshot) -> Self {
        // Keyed by label so iteration yields rows already in label order.
        let mut buckets: BTreeMap<String, StatusRow> = BTreeMap::new();

        for (_, record) in snapshot.records() {
            let key = StatusKey {
                state: record.state,
                forced: record.force_start,
            };
            let row = buckets.entry(key.label()).or_insert_with(|| StatusRow {
                key,
                aggregate: StatusAggregate::default(),
            });
            row.aggregate.size_bytes += record.size_bytes;
            row.aggregate.count += 1;
        }

        Self {
            rows: buckets.into_values().collect(),
        }
    }

    pub fn get(&self, label: &str) -> Option<&StatusAggregate> {
        self.rows
            .iter()
            .find(|row| row.key.label() == label)
            .map(|row| &row.aggregate)
    }
}

/// Force-start changes applied by [`normalize_force_start`].
#[derive(Debug, Clone, Default)]
pub struct ForceStartOutcome {
    /// Torrents whose force start was cleared.
    pub cleared: usize,
    /// Torrents force-started.
    pub forced: usize,
    pub failures: Vec<OperationFailure>,
}

/// Clear force start on torrents running in a forced state, and force-start
/// torrents stuck in `checkingDL`, one call of each kind per endpoint.
pub async fn normalize_force_start(snapshot: &FleetSnapshot) -> ForceStartOutcome {
    let plans = snapshot.listings().iter().map(|listing| {
        let mut to_clear = Vec::new();
        let mut to_force = Vec::new();
        for record in &listing.records {
            if record.force_start && record.state.is_forced() {
                to_clear.push(record.hash.clone());
            }
            if record.state == TorrentState::CheckingDl {
                to_force.push(record.hash.clone());
            }
        }
        (Arc::clone(&listing.endpoint), to_clear, to_force)
    });

    let results = fan_out(plans, |(endpoint, to_clear, to_force)| {
        apply_force_start(endpoint, to_clear, to_force)
    })
    .await;

    let mut total = ForceStartOutcome::default();
    for (listing, joined) in snapshot.listings().iter().zip(results) {
        match joined {
            Ok(o) => {
                total.cleared += o.cleared;
                total.forced += o.forced;
                total.failures.extend(o.failures);
            }
            Err(e) => {
                error!(endpoint = %listing.endpoint.id(), error = %e, "Force start task failed");
                total.failures.push(OperationFailure::new(
                    OperationKind::Status,
                    listing.endpoint.id(),
                    e,
                ));
            }
        }
    }
    total
}

async fn apply_force_start(
    endpoint: Arc<dyn Endpoint>,
    to_clear: Vec<String>,
    to_force: Vec<String>,
) -> ForceStartOutcome {
    let mut outcome = ForceStartOutcome::default();
    for (hashes, value) in [(to_clear, false), (to_force, true)] {
        if hashes.is_empty() {
            continue;
        }
        match endpoint.set_force_start(&hashes, value).await {
            Ok(()) => {
                info!(
                    endpoint = %endpoint.id(),
                    count = hashes.len(),
                    value,
                    "Force start updated"
                );
                if value {
                    outcome.forced += hashes.len();
                } else {
                    outcome.cleared += hashes.len();
                }
            }
            Err(e) => {
                error!(endpoint = %endpoint.id(), error = %e, "Failed to update force start");
                outcome
                    .failures
                    .push(OperationFailure::new(OperationKind::Status, endpoint.id(), &e));
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::endpoint::ListFilter;
    use crate::fleet::Fleet;
    use crate::testing::{fixtures, MockEndpoint};

    #[tokio::test]
    async fn test_status_buckets_split_forced() {
        let a = Arc::new(MockEndpoint::new("a", 8080));
        let mut forced = fixtures::record_in_state("f", TorrentState::ForcedUp);
        forced.force_start = true;
        forced.size_bytes = 5;
        let mut up1 = fixtures::record_in_state("u1", TorrentState::Uploading);
        up1.size_bytes = 3;
        let mut up2 = fixtures::record_in_state("u2", TorrentState::Uploading);
        up2.size_bytes = 4;
        let mut up_forced = fixtures::record_in_state("u3", TorrentState::Uploading);
        up_forced.force_start = true;
        up_forced.size_bytes = 100;
        for r in [forced, up1, up2, up_forced] {
            a.add_torrent(r).await;
        }

        let fleet = Fleet::new(vec![a]);
        let report = StatusReport::build(&FleetSnapshot::fetch(&fleet, ListFilter::All).await);

        let uploading = report.get("uploading").unwrap();
        assert_eq!(uploading.count, 2);
        assert_eq!(uploading.size_bytes, 7);

        let uploading_forced = report.get("uploading+F").unwrap();
        assert_eq!(uploading_forced.count, 1);
        assert_eq!(uploading_forced.size_bytes, 100);

        assert_eq!(report.get("forcedUP+F").unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_status_rows_sorted_by_label() {
        let a = Arc::new(MockEndpoint::new("a", 8080));
        for (hash, state) in [
            ("1", TorrentState::Uploading),
            ("2", TorrentState::Error),
            ("3", TorrentState::StalledDl),
            ("4", TorrentState::PausedUp),
        ] {
            a.add_torrent(fixtures::record_in_state(hash, state)).await;
        }

        let fleet = Fleet::new(vec![a]);
        let report = StatusReport::build(&FleetSnapshot::fetch(&fleet, ListFilter::All).await);
        let labels: Vec<_> = report.rows.iter().map(|r| r.key.label()).collect();
        assert_eq!(labels, vec!["error", "pausedUP", "stalledDL", "uploading"]);
    }

    #[tokio::test]
    async fn test_normalize_force_start() {
        let a = Arc::new(MockEndpoint::new("a", 8080));
        let mut forced = fixtures::record_in_state("forced", TorrentState::ForcedDl);
        forced.force_start = true;
        a.add_torrent(forced).await;
        a.add_torrent(fixtures::record_in_state("checking", TorrentState::CheckingDl))
            .await;
        a.add_torrent(fixtures::record_in_state("plain", TorrentState::Downloading))
            .await;

        let fleet = Fleet::new(vec![a.clone()]);
        let snapshot = FleetSnapshot::fetch(&fleet, ListFilter::All).await;
        let outcome = normalize_force_start(&snapshot).await;

        assert_eq!(outcome.cleared, 1);
        assert_eq!(outcome.forced, 1);
        assert!(outcome.failures.is_empty());

        let calls = a.force_start_calls().await;
        assert_eq!(
            calls,
            vec![
                (vec!["forced".to_string()], false),
                (vec!["checking".to_string()], true),
            ]
        );
    }

    #[tokio::test]
    async fn test_normalize_force_start_collects_failures() {
        let a = Arc::new(MockEndpoint::new("a", 8080));
        a.add_torrent(fixtures::record_in_state("checking", TorrentState::CheckingDl))
            .await;
        a.set_mutation_failure(true).await;

        let fleet = Fleet::new(vec![a]);
        let snapshot = FleetSnapshot::fetch(&fleet, ListFilter::All).await;
        let outcome = normalize_force_start(&snapshot).await;

        assert_eq!(outcome.forced, 0);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].operation, OperationKind::Status);
    }
}
