//! Errored torrents, dumped per endpoint.

use tracing::info;

use crate::endpoint::{EndpointId, TorrentRecord};
use crate::fleet::FleetSnapshot;

#[derive(Debug, Clone, PartialEq)]
pub struct ErroredTorrent {
    pub endpoint: EndpointId,
    pub record: TorrentRecord,
}

#[derive(Debug, Clone, Default)]
pub struct ErrorReport {
    pub torrents: Vec<ErroredTorrent>,
}

impl ErrorReport {
    /// Collect every `error` or `missingFiles` record and log a dump of each.
    pub fn build(snapshot: &FleetSnapshot) -> Self {
        let torrents = snapshot
            .records()
            .filter(|(_, record)| record.state.is_errored())
            .map(|(listing, record)| {
                info!(endpoint = %listing.endpoint.id(), "Errored torrent\n{:#?}", record);
                ErroredTorrent {
                    endpoint: listing.endpoint.id().clone(),
                    record: record.clone(),
                }
            })
            .collect();

        Self { torrents }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::endpoint::{ListFilter, TorrentState};
    use crate::fleet::Fleet;
    use crate::testing::{fixtures, MockEndpoint};

    #[tokio::test]
    async fn test_error_report_lists_errored_states_only() {
        let a = Arc::new(MockEndpoint::new("a", 8080));
        let b = Arc::new(MockEndpoint::new("b", 8080));
        a.add_torrent(fixtures::record_in_state("e", TorrentState::Error))
            .await;
        a.add_torrent(fixtures::record_in_state("ok", TorrentState::Uploading))
            .await;
        b.add_torrent(fixtures::record_in_state("m", TorrentState::MissingFiles))
            .await;
        b.add_torrent(fixtures::record_in_state("c", TorrentState::CheckingUp))
            .await;

        let fleet = Fleet::new(vec![a, b]);
        let report = ErrorReport::build(&FleetSnapshot::fetch(&fleet, ListFilter::All).await);

        let found: Vec<_> = report
            .torrents
            .iter()
            .map(|t| (t.endpoint.host.as_str(), t.record.hash.as_str()))
            .collect();
        assert_eq!(found, vec![("a", "e"), ("b", "m")]);
    }
}
