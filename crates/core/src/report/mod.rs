//! Fleet-wide reports folded from a snapshot.
//!
//! - **Categories**: size, count and save-path roots per category label
//! - **Statuses**: size and count per lifecycle state (with force-start flag)
//! - **Errors**: records in an errored state, dumped per endpoint

mod categories;
mod errors;
mod status;

pub use categories::{normalize_save_path, CategoryAggregate, CategoryReport, CategoryRow};
pub use errors::{ErrorReport, ErroredTorrent};
pub use status::{
    normalize_force_start, ForceStartOutcome, StatusAggregate, StatusKey, StatusReport, StatusRow,
};

use tracing::warn;

use crate::endpoint::{EndpointId, TorrentState};
use crate::fleet::FleetSnapshot;

/// A record whose files are missing on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct MissingFilesNotice {
    pub endpoint: EndpointId,
    pub name: String,
    pub save_path: String,
}

/// Collect and log every `missingFiles` record in the snapshot.
pub fn missing_files(snapshot: &FleetSnapshot) -> Vec<MissingFilesNotice> {
    snapshot
        .records()
        .filter(|(_, record)| record.state == TorrentState::MissingFiles)
        .map(|(listing, record)| {
            warn!(
                endpoint = %listing.endpoint.id(),
                name = %record.name,
                save_path = %record.save_path,
                "missingFiles"
            );
            MissingFilesNotice {
                endpoint: listing.endpoint.id().clone(),
                name: record.name.clone(),
                save_path: record.save_path.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::endpoint::ListFilter;
    use crate::fleet::Fleet;
    use crate::testing::{fixtures, MockEndpoint};

    #[tokio::test]
    async fn test_missing_files_are_collected() {
        let a = Arc::new(MockEndpoint::new("a", 8080));
        let mut broken = fixtures::record_in_state("gone", TorrentState::MissingFiles);
        broken.name = "Lost Album".to_string();
        broken.save_path = "/data/music".to_string();
        a.add_torrent(broken).await;
        a.add_torrent(fixtures::record_in_state("ok", TorrentState::Uploading))
            .await;

        let fleet = Fleet::new(vec![a]);
        let snapshot = FleetSnapshot::fetch(&fleet, ListFilter::All).await;

        let notices = missing_files(&snapshot);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].name, "Lost Album");
        assert_eq!(notices[0].save_path, "/data/music");
        assert_eq!(notices[0].endpoint.host, "a");
    }
}
