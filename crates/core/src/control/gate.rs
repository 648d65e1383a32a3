//! Post-round health check.

use tracing::{info, warn};

use crate::endpoint::{EndpointId, ListFilter, TorrentState};
use crate::fleet::{Fleet, FleetSnapshot, OperationFailure, OperationKind};

/// Fleet health after the last round.
#[derive(Debug, Clone, PartialEq)]
pub enum GateVerdict {
    /// No record is in a blocking state.
    Clear,
    /// The first blocking record found, in fleet order.
    Blocked {
        endpoint: EndpointId,
        hash: String,
        name: String,
        state: TorrentState,
    },
}

impl GateVerdict {
    pub fn is_blocked(&self) -> bool {
        matches!(self, GateVerdict::Blocked { .. })
    }

    /// Process exit code for this verdict.
    pub fn exit_code(&self) -> i32 {
        if self.is_blocked() {
            1
        } else {
            0
        }
    }
}

#[derive(Debug, Clone)]
pub struct GateOutcome {
    pub verdict: GateVerdict,
    /// Listing failures; those endpoints are not inspected.
    pub failures: Vec<OperationFailure>,
}

/// Take a fresh listing and look for any torrent in a blocking state.
pub async fn check(fleet: &Fleet) -> GateOutcome {
    let snapshot = FleetSnapshot::fetch(fleet, ListFilter::All).await;

    let verdict = snapshot
        .records()
        .find(|(_, record)| record.state.is_blocking())
        .map(|(listing, record)| {
            warn!(
                endpoint = %listing.endpoint.id(),
                hash = %record.hash,
                state = %record.state,
                "Status gate blocked"
            );
            GateVerdict::Blocked {
                endpoint: listing.endpoint.id().clone(),
                hash: record.hash.clone(),
                name: record.name.clone(),
                state: record.state,
            }
        })
        .unwrap_or_else(|| {
            info!(torrents = snapshot.len(), "Status gate clear");
            GateVerdict::Clear
        });

    GateOutcome {
        verdict,
        failures: snapshot
            .failures()
            .iter()
            .map(|f| OperationFailure {
                operation: OperationKind::Gate,
                ..f.clone()
            })
            .collect(),
    }
}
