//! Endpoint abstraction.
//!
//! This module provides the `Endpoint` trait, the capability set the fleet
//! uses to read and mutate one remote download client, and its qBittorrent
//! Web API implementation.

mod qbittorrent;
mod types;

pub use qbittorrent::QBittorrentEndpoint;
pub use types::*;
