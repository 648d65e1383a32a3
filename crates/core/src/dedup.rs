//! Duplicate detection and resolution across the fleet.
//!
//! Records are correlated by the forum theme parsed from their comment. In
//! every group with two or more members the earliest-added record survives
//! and the others are removed from the endpoint that owns them. Downloaded
//! files are never deleted.
//!
//! Ties on `added_on` resolve by fleet configuration order, then by
//! lexicographic hash, so the survivor never depends on fetch timing.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, error, info, warn};

use crate::endpoint::{EndpointError, EndpointId, TorrentRecord};
use crate::fleet::{
    fan_out, EndpointListing, FleetSnapshot, ForumThemeId, OperationFailure, OperationKind,
};

/// Maximum concurrent detail lookups while resolving comments.
pub const DETAIL_LOOKUP_CONCURRENCY: usize = 4;

/// Whether duplicates are removed or only reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupMode {
    Delete,
    ReportOnly,
}

/// One record participating in a duplicate group.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateMember {
    /// Position of the owning endpoint in the fleet configuration.
    pub endpoint_index: usize,
    pub endpoint: EndpointId,
    pub record: TorrentRecord,
}

impl DuplicateMember {
    fn survivor_order(&self, other: &Self) -> Ordering {
        self.record
            .added_on
            .cmp(&other.record.added_on)
            .then_with(|| self.endpoint_index.cmp(&other.endpoint_index))
            .then_with(|| self.record.hash.cmp(&other.record.hash))
    }
}

/// All records sharing one forum theme.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateGroup {
    pub theme: ForumThemeId,
    pub members: Vec<DuplicateMember>,
}

impl DuplicateGroup {
    pub fn is_actionable(&self) -> bool {
        self.members.len() >= 2
    }

    /// The earliest-added member.
    pub fn survivor(&self) -> Option<&DuplicateMember> {
        self.survivor_index().map(|i| &self.members[i])
    }

    /// Every member except the survivor. Members that compare equal to the
    /// survivor are still redundant; exactly one member is kept.
    pub fn redundant(&self) -> Vec<&DuplicateMember> {
        let survivor = self.survivor_index();
        self.members
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != survivor)
            .map(|(_, m)| m)
            .collect()
    }

    fn survivor_index(&self) -> Option<usize> {
        self.members
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.survivor_order(b))
            .map(|(i, _)| i)
    }
}

/// Hashes to remove from one endpoint, issued as a single delete call.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletionBatch {
    pub endpoint_index: usize,
    pub endpoint: EndpointId,
    pub hashes: Vec<String>,
}

/// Actionable groups and the per-endpoint deletions they imply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupPlan {
    /// Groups with two or more members, ordered by theme.
    pub groups: Vec<DuplicateGroup>,
    /// One batch per endpoint, ordered by fleet position.
    pub batches: Vec<DeletionBatch>,
}

impl DedupPlan {
    /// Group themed members and pick survivors.
    pub fn build(members: impl IntoIterator<Item = (ForumThemeId, DuplicateMember)>) -> Self {
        let mut by_theme: BTreeMap<ForumThemeId, Vec<DuplicateMember>> = BTreeMap::new();
        for (theme, member) in members {
            by_theme.entry(theme).or_default().push(member);
        }

        let groups: Vec<DuplicateGroup> = by_theme
            .into_iter()
            .map(|(theme, members)| DuplicateGroup { theme, members })
            .filter(DuplicateGroup::is_actionable)
            .collect();

        let mut by_endpoint: BTreeMap<usize, DeletionBatch> = BTreeMap::new();
        for group in &groups {
            for member in group.redundant() {
                by_endpoint
                    .entry(member.endpoint_index)
                    .or_insert_with(|| DeletionBatch {
                        endpoint_index: member.endpoint_index,
                        endpoint: member.endpoint.clone(),
                        hashes: Vec::new(),
                    })
                    .hashes
                    .push(member.record.hash.clone());
            }
        }

        Self {
            groups,
            batches: by_endpoint.into_values().collect(),
        }
    }

    pub fn deletion_count(&self) -> usize {
        self.batches.iter().map(|b| b.hashes.len()).sum()
    }
}

/// Result of a dedup pass.
#[derive(Debug, Clone, Default)]
pub struct DedupOutcome {
    pub plan: DedupPlan,
    /// Torrents actually removed.
    pub deleted: usize,
    pub failures: Vec<OperationFailure>,
}

/// Resolve themes for the snapshot, plan survivors and apply `mode`.
pub async fn run_dedup(snapshot: &FleetSnapshot, mode: DedupMode) -> DedupOutcome {
    let mut failures = Vec::new();
    let mut members = Vec::new();

    let resolved: Vec<_> = futures::stream::iter(snapshot.records())
        .map(|(listing, record)| resolve_theme(listing, record))
        .buffered(DETAIL_LOOKUP_CONCURRENCY)
        .collect()
        .await;

    for result in resolved {
        match result {
            Ok(Some(entry)) => members.push(entry),
            Ok(None) => {}
            Err(failure) => failures.push(failure),
        }
    }

    let plan = DedupPlan::build(members);
    debug!(
        groups = plan.groups.len(),
        deletions = plan.deletion_count(),
        "Dedup plan ready"
    );

    let deleted = match mode {
        DedupMode::ReportOnly => {
            for group in &plan.groups {
                if let Some(kept) = group.survivor() {
                    info!(
                        theme = %group.theme,
                        endpoint = %kept.endpoint,
                        "Duplicate kept: {} {}",
                        kept.record.name,
                        kept.record.hash
                    );
                }
            }
            0
        }
        DedupMode::Delete => apply_deletions(snapshot, &plan, &mut failures).await,
    };

    DedupOutcome {
        plan,
        deleted,
        failures,
    }
}

/// Read the record's comment (from the listing or a detail lookup) and parse
/// its theme. Records without a theme are skipped.
async fn resolve_theme(
    listing: &EndpointListing,
    record: &TorrentRecord,
) -> Result<Option<(ForumThemeId, DuplicateMember)>, OperationFailure> {
    let comment = match &record.comment {
        Some(comment) => comment.clone(),
        None => match listing.endpoint.torrent_detail(&record.hash).await {
            Ok(detail) => detail.comment,
            Err(e) => {
                warn!(
                    endpoint = %listing.endpoint.id(),
                    hash = %record.hash,
                    error = %e,
                    "Detail lookup failed, record excluded from dedup"
                );
                return Err(OperationFailure::new(
                    OperationKind::Dedup,
                    listing.endpoint.id(),
                    &e,
                ));
            }
        },
    };

    if comment.is_empty() {
        return Ok(None);
    }

    Ok(ForumThemeId::extract(&comment).map(|theme| {
        (
            theme,
            DuplicateMember {
                endpoint_index: listing.index,
                endpoint: listing.endpoint.id().clone(),
                record: record.clone(),
            },
        )
    }))
}

async fn apply_deletions(
    snapshot: &FleetSnapshot,
    plan: &DedupPlan,
    failures: &mut Vec<OperationFailure>,
) -> usize {
    let targets: Vec<_> = plan
        .batches
        .iter()
        .filter_map(|batch| {
            let listing = snapshot
                .listings()
                .iter()
                .find(|l| l.index == batch.endpoint_index)?;
            Some((Arc::clone(&listing.endpoint), batch))
        })
        .collect();

    let results = fan_out(
        targets
            .iter()
            .map(|(endpoint, batch)| (Arc::clone(endpoint), batch.hashes.clone())),
        |(endpoint, hashes)| async move { endpoint.delete(&hashes, false).await },
    )
    .await;

    let mut deleted = 0;
    for ((_, batch), joined) in targets.iter().zip(results) {
        let result = joined.unwrap_or_else(|e| Err(EndpointError::ApiError(e.to_string())));
        match result {
            Ok(()) => {
                info!(endpoint = %batch.endpoint, hashes = ?batch.hashes, "Deleted duplicates");
                deleted += batch.hashes.len();
            }
            Err(e) => {
                error!(endpoint = %batch.endpoint, error = %e, "Failed to delete duplicates");
                failures.push(OperationFailure::new(OperationKind::Dedup, &batch.endpoint, &e));
            }
        }
    }
    deleted
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::endpoint::ListFilter;
    use crate::fleet::Fleet;
    use crate::testing::{fixtures, MockEndpoint};

    fn member(index: usize, hash: &str, added_on: i64) -> DuplicateMember {
        let mut record = fixtures::record(hash, 1);
        record.added_on = added_on;
        DuplicateMember {
            endpoint_index: index,
            endpoint: EndpointId::new(format!("e{}", index), 8080, false),
            record,
        }
    }

    #[test]
    fn test_single_member_group_is_not_actionable() {
        let plan = DedupPlan::build(vec![(ForumThemeId(1), member(0, "aa", 10))]);
        assert!(plan.groups.is_empty());
        assert!(plan.batches.is_empty());
    }

    #[test]
    fn test_identical_members_keep_exactly_one() {
        let plan = DedupPlan::build(vec![
            (ForumThemeId(5), member(0, "aa", 100)),
            (ForumThemeId(5), member(0, "aa", 100)),
        ]);

        let group = &plan.groups[0];
        assert_eq!(group.redundant().len(), 1);
        assert_eq!(plan.deletion_count(), 1);
        assert_eq!(plan.batches[0].hashes, vec!["aa".to_string()]);
    }

    #[test]
    fn test_survivor_is_earliest_added() {
        let plan = DedupPlan::build(vec![
            (ForumThemeId(7), member(0, "aa", 300)),
            (ForumThemeId(7), member(1, "bb", 100)),
            (ForumThemeId(7), member(2, "cc", 200)),
        ]);

        assert_eq!(plan.groups.len(), 1);
        assert_eq!(plan.groups[0].survivor().unwrap().record.hash, "bb");
        assert_eq!(plan.deletion_count(), 2);

        let batches: Vec<_> = plan
            .batches
            .iter()
            .map(|b| (b.endpoint_index, b.hashes.clone()))
            .collect();
        assert_eq!(
            batches,
            vec![(0, vec!["aa".to_string()]), (2, vec!["cc".to_string()])]
        );
    }

    #[test]
    fn test_tie_breaks_by_fleet_order_then_hash() {
        let plan = DedupPlan::build(vec![
            (ForumThemeId(1), member(1, "aa", 100)),
            (ForumThemeId(1), member(0, "zz", 100)),
        ]);
        assert_eq!(plan.groups[0].survivor().unwrap().record.hash, "zz");

        let plan = DedupPlan::build(vec![
            (ForumThemeId(1), member(0, "bb", 100)),
            (ForumThemeId(1), member(0, "aa", 100)),
        ]);
        assert_eq!(plan.groups[0].survivor().unwrap().record.hash, "aa");
    }

    #[test]
    fn test_deletions_batched_per_endpoint() {
        let plan = DedupPlan::build(vec![
            (ForumThemeId(1), member(0, "a1", 1)),
            (ForumThemeId(1), member(1, "b1", 5)),
            (ForumThemeId(2), member(0, "a2", 1)),
            (ForumThemeId(2), member(1, "b2", 5)),
            (ForumThemeId(3), member(1, "b3", 1)),
            (ForumThemeId(3), member(1, "b4", 2)),
        ]);

        assert_eq!(plan.groups.len(), 3);
        assert_eq!(plan.batches.len(), 1);
        assert_eq!(plan.batches[0].endpoint_index, 1);
        assert_eq!(plan.batches[0].hashes, vec!["b1", "b2", "b4"]);
    }

    #[tokio::test]
    async fn test_two_endpoint_scenario_deletes_newer_copy() {
        let a = Arc::new(MockEndpoint::new("a", 8080));
        let b = Arc::new(MockEndpoint::new("b", 8080));
        a.add_torrent_with_comment(fixtures::record_added("aa", 100), &fixtures::theme_comment(100))
            .await;
        b.add_torrent_with_comment(fixtures::record_added("bb", 50), &fixtures::theme_comment(100))
            .await;

        let fleet = Fleet::new(vec![a.clone(), b.clone()]);
        let snapshot = FleetSnapshot::fetch(&fleet, ListFilter::All).await;
        let outcome = run_dedup(&snapshot, DedupMode::Delete).await;

        assert_eq!(outcome.deleted, 1);
        assert!(outcome.failures.is_empty());
        assert_eq!(a.delete_calls().await, vec![(vec!["aa".to_string()], false)]);
        assert!(b.delete_calls().await.is_empty());
        assert!(b.has_torrent("bb").await);
        assert!(!a.has_torrent("aa").await);
    }

    #[tokio::test]
    async fn test_report_only_issues_no_deletes() {
        let a = Arc::new(MockEndpoint::new("a", 8080));
        a.add_torrent_with_comment(fixtures::record_added("aa", 1), &fixtures::theme_comment(5))
            .await;
        a.add_torrent_with_comment(fixtures::record_added("bb", 2), &fixtures::theme_comment(5))
            .await;

        let fleet = Fleet::new(vec![a.clone()]);
        let snapshot = FleetSnapshot::fetch(&fleet, ListFilter::All).await;
        let outcome = run_dedup(&snapshot, DedupMode::ReportOnly).await;

        assert_eq!(outcome.deleted, 0);
        assert_eq!(outcome.plan.deletion_count(), 1);
        assert!(a.delete_calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_records_without_theme_are_ignored() {
        let a = Arc::new(MockEndpoint::new("a", 8080));
        a.add_torrent_with_comment(fixtures::record_added("aa", 1), "no theme here")
            .await;
        a.add_torrent_with_comment(fixtures::record_added("bb", 2), "no theme here")
            .await;
        a.add_torrent(fixtures::record_added("cc", 3)).await;

        let fleet = Fleet::new(vec![a.clone()]);
        let snapshot = FleetSnapshot::fetch(&fleet, ListFilter::All).await;
        let outcome = run_dedup(&snapshot, DedupMode::Delete).await;

        assert!(outcome.plan.groups.is_empty());
        assert!(a.delete_calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_comment_from_listing_skips_detail_lookup() {
        let a = Arc::new(MockEndpoint::new("a", 8080));
        let mut record = fixtures::record_added("aa", 1);
        record.comment = Some(fixtures::theme_comment(9));
        a.add_torrent(record).await;

        let fleet = Fleet::new(vec![a.clone()]);
        let snapshot = FleetSnapshot::fetch(&fleet, ListFilter::All).await;
        run_dedup(&snapshot, DedupMode::ReportOnly).await;

        assert_eq!(a.detail_call_count().await, 0);
    }

    #[tokio::test]
    async fn test_delete_failure_is_collected() {
        let a = Arc::new(MockEndpoint::new("a", 8080));
        a.add_torrent_with_comment(fixtures::record_added("aa", 1), &fixtures::theme_comment(5))
            .await;
        a.add_torrent_with_comment(fixtures::record_added("bb", 2), &fixtures::theme_comment(5))
            .await;
        a.set_mutation_failure(true).await;

        let fleet = Fleet::new(vec![a]);
        let snapshot = FleetSnapshot::fetch(&fleet, ListFilter::All).await;
        let outcome = run_dedup(&snapshot, DedupMode::Delete).await;

        assert_eq!(outcome.deleted, 0);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].operation, OperationKind::Dedup);
    }
}
