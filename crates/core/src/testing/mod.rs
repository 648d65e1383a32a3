//! Testing utilities and a mock endpoint.
//!
//! The mock implements the same trait as the qBittorrent client, so every
//! fleet operation can be exercised without a running server.
//!
//! # Example
//!
//! ```rust,ignore
//! use qbfleet_core::testing::{fixtures, MockEndpoint};
//!
//! let endpoint = Arc::new(MockEndpoint::new("seedbox", 8080));
//! endpoint.add_torrent(fixtures::record_in_state("abc", TorrentState::Error)).await;
//!
//! let fleet = Fleet::new(vec![endpoint.clone()]);
//! ```

mod mock_endpoint;

pub use mock_endpoint::MockEndpoint;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::endpoint::{TorrentRecord, TorrentState};

    /// Create a seeding torrent record with reasonable defaults.
    pub fn record(hash: &str, size_bytes: u64) -> TorrentRecord {
        TorrentRecord {
            hash: hash.to_string(),
            name: format!("Torrent {}", hash),
            category: String::new(),
            save_path: "/downloads".to_string(),
            size_bytes,
            state: TorrentState::Uploading,
            force_start: false,
            added_on: 1_700_000_000,
            comment: None,
        }
    }

    pub fn record_in_state(hash: &str, state: TorrentState) -> TorrentRecord {
        TorrentRecord {
            state,
            ..record(hash, 1024)
        }
    }

    pub fn record_in_category(
        hash: &str,
        category: &str,
        size_bytes: u64,
        save_path: &str,
    ) -> TorrentRecord {
        TorrentRecord {
            category: category.to_string(),
            save_path: save_path.to_string(),
            ..record(hash, size_bytes)
        }
    }

    /// A record added at `added_on` epoch seconds.
    pub fn record_added(hash: &str, added_on: i64) -> TorrentRecord {
        TorrentRecord {
            added_on,
            ..record(hash, 1024)
        }
    }

    /// A tracker comment pointing at forum theme `id`.
    pub fn theme_comment(id: u64) -> String {
        format!("https://rutracker.org/forum/viewtopic.php?t={}", id)
    }
}
