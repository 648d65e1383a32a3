//! Point-in-time torrent inventory across the fleet.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::endpoint::{Endpoint, ListFilter, TorrentRecord};

use super::{fan_out, Fleet, OperationFailure, OperationKind};

/// One endpoint's contribution to a snapshot.
#[derive(Clone)]
pub struct EndpointListing {
    /// Position of the endpoint in the fleet configuration.
    pub index: usize,
    pub endpoint: Arc<dyn Endpoint>,
    pub records: Vec<TorrentRecord>,
}

/// Merged listings of every endpoint for one round, in fleet order.
#[derive(Clone, Default)]
pub struct FleetSnapshot {
    listings: Vec<EndpointListing>,
    failures: Vec<OperationFailure>,
}

impl FleetSnapshot {
    /// Fetch every endpoint's listing concurrently.
    ///
    /// A failing endpoint is logged and contributes an empty listing; the
    /// failure is kept in [`FleetSnapshot::failures`].
    pub async fn fetch(fleet: &Fleet, filter: ListFilter) -> Self {
        let results = fan_out(fleet.endpoints().iter().cloned(), move |endpoint| async move {
            endpoint.list_torrents(filter).await
        })
        .await;

        let mut listings = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for (index, (endpoint, joined)) in fleet.endpoints().iter().zip(results).enumerate() {
            let records = match joined {
                Ok(Ok(records)) => {
                    debug!(
                        endpoint = %endpoint.id(),
                        filter = filter.as_query(),
                        count = records.len(),
                        "Fetched torrent listing"
                    );
                    records
                }
                Ok(Err(e)) => {
                    warn!(endpoint = %endpoint.id(), error = %e, "Torrent listing failed");
                    failures.push(OperationFailure::new(
                        OperationKind::Snapshot,
                        endpoint.id(),
                        &e,
                    ));
                    Vec::new()
                }
                Err(e) => {
                    warn!(endpoint = %endpoint.id(), error = %e, "Listing task failed");
                    failures.push(OperationFailure::new(OperationKind::Snapshot, endpoint.id(), e));
                    Vec::new()
                }
            };
            listings.push(EndpointListing {
                index,
                endpoint: Arc::clone(endpoint),
                records,
            });
        }

        Self { listings, failures }
    }

    pub fn listings(&self) -> &[EndpointListing] {
        &self.listings
    }

    pub fn failures(&self) -> &[OperationFailure] {
        &self.failures
    }

    /// Every record with its owning listing, in fleet order.
    pub fn records(&self) -> impl Iterator<Item = (&EndpointListing, &TorrentRecord)> {
        self.listings
            .iter()
            .flat_map(|listing| listing.records.iter().map(move |r| (listing, r)))
    }

    pub fn len(&self) -> usize {
        self.listings.iter().map(|l| l.records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of every record's total size.
    pub fn total_size(&self) -> u64 {
        self.records().map(|(_, r)| r.size_bytes).sum()
    }
}
