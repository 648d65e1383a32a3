//! Types for endpoint operations.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors that can occur during endpoint operations.
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Torrent not found: {0}")]
    TorrentNotFound(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("I/O error: {0}")]
    Io(String),
}

/// Identity of one remote download-client instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct EndpointId {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

impl EndpointId {
    pub fn new(host: impl Into<String>, port: u16, tls: bool) -> Self {
        Self {
            host: host.into(),
            port,
            tls,
        }
    }

    /// Base URL of the Web API, without trailing slash.
    pub fn base_url(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_url())
    }
}

/// Session state of an endpoint connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connected,
    AuthFailed,
}

/// Lifecycle state of a torrent, as reported by qBittorrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TorrentState {
    Error,
    MissingFiles,
    Uploading,
    PausedUp,
    StoppedUp,
    QueuedUp,
    StalledUp,
    CheckingUp,
    ForcedUp,
    Allocating,
    Downloading,
    MetaDl,
    ForcedMetaDl,
    PausedDl,
    StoppedDl,
    QueuedDl,
    StalledDl,
    CheckingDl,
    ForcedDl,
    CheckingResumeData,
    Moving,
    Unknown,
}

impl TorrentState {
    /// Parse a wire label. Unrecognised labels map to `Unknown`.
    pub fn parse(label: &str) -> Self {
        match label {
            "error" => TorrentState::Error,
            "missingFiles" => TorrentState::MissingFiles,
            "uploading" => TorrentState::Uploading,
            "pausedUP" => TorrentState::PausedUp,
            "stoppedUP" => TorrentState::StoppedUp,
            "queuedUP" => TorrentState::QueuedUp,
            "stalledUP" => TorrentState::StalledUp,
            "checkingUP" => TorrentState::CheckingUp,
            "forcedUP" => TorrentState::ForcedUp,
            "allocating" => TorrentState::Allocating,
            "downloading" => TorrentState::Downloading,
            "metaDL" => TorrentState::MetaDl,
            "forcedMetaDL" => TorrentState::ForcedMetaDl,
            "pausedDL" => TorrentState::PausedDl,
            "stoppedDL" => TorrentState::StoppedDl,
            "queuedDL" => TorrentState::QueuedDl,
            "stalledDL" => TorrentState::StalledDl,
            "checkingDL" => TorrentState::CheckingDl,
            "forcedDL" => TorrentState::ForcedDl,
            "checkingResumeData" => TorrentState::CheckingResumeData,
            "moving" => TorrentState::Moving,
            _ => TorrentState::Unknown,
        }
    }

    /// Returns the wire label.
    pub fn as_str(&self) -> &'static str {
        match self {
            TorrentState::Error => "error",
            TorrentState::MissingFiles => "missingFiles",
            TorrentState::Uploading => "uploading",
            TorrentState::PausedUp => "pausedUP",
            TorrentState::StoppedUp => "stoppedUP",
            TorrentState::QueuedUp => "queuedUP",
            TorrentState::StalledUp => "stalledUP",
            TorrentState::CheckingUp => "checkingUP",
            TorrentState::ForcedUp => "forcedUP",
            TorrentState::Allocating => "allocating",
            TorrentState::Downloading => "downloading",
            TorrentState::MetaDl => "metaDL",
            TorrentState::ForcedMetaDl => "forcedMetaDL",
            TorrentState::PausedDl => "pausedDL",
            TorrentState::StoppedDl => "stoppedDL",
            TorrentState::QueuedDl => "queuedDL",
            TorrentState::StalledDl => "stalledDL",
            TorrentState::CheckingDl => "checkingDL",
            TorrentState::ForcedDl => "forcedDL",
            TorrentState::CheckingResumeData => "checkingResumeData",
            TorrentState::Moving => "moving",
            TorrentState::Unknown => "unknown",
        }
    }

    /// States that keep a torrent out of tracker reports.
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            TorrentState::Error
                | TorrentState::MissingFiles
                | TorrentState::CheckingUp
                | TorrentState::Allocating
                | TorrentState::CheckingDl
                | TorrentState::CheckingResumeData
                | TorrentState::Moving
                | TorrentState::Unknown
        )
    }

    /// Errored states surfaced by the error report.
    pub fn is_errored(&self) -> bool {
        matches!(self, TorrentState::Error | TorrentState::MissingFiles)
    }

    /// States entered because force start is set.
    pub fn is_forced(&self) -> bool {
        self.as_str().starts_with("forced")
    }
}

impl fmt::Display for TorrentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time snapshot of one torrent on one endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct TorrentRecord {
    /// Info hash (lowercase hex).
    pub hash: String,
    pub name: String,
    /// Category label, empty when uncategorized.
    pub category: String,
    pub save_path: String,
    /// Total size in bytes.
    pub size_bytes: u64,
    pub state: TorrentState,
    pub force_start: bool,
    /// Epoch seconds.
    pub added_on: i64,
    /// Free-text comment, when the listing carried one.
    pub comment: Option<String>,
}

impl TorrentRecord {
    /// When the torrent was added.
    pub fn added_at(&self) -> Option<DateTime<Utc>> {
        if self.added_on > 0 {
            Utc.timestamp_opt(self.added_on, 0).single()
        } else {
            None
        }
    }
}

/// Per-torrent properties that the listing call does not return.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TorrentDetail {
    pub comment: String,
    pub save_path: String,
    pub addition_date: i64,
}

/// Server-side listing filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListFilter {
    #[default]
    All,
    Downloading,
}

impl ListFilter {
    /// Value for the `filter` query parameter.
    pub fn as_query(&self) -> &'static str {
        match self {
            ListFilter::All => "all",
            ListFilter::Downloading => "downloading",
        }
    }

    /// Whether a record with `state` passes this filter.
    pub fn accepts(&self, state: TorrentState) -> bool {
        match self {
            ListFilter::All => true,
            ListFilter::Downloading => matches!(
                state,
                TorrentState::Downloading
                    | TorrentState::MetaDl
                    | TorrentState::ForcedMetaDl
                    | TorrentState::StalledDl
                    | TorrentState::CheckingDl
                    | TorrentState::ForcedDl
                    | TorrentState::QueuedDl
                    | TorrentState::PausedDl
                    | TorrentState::StoppedDl
            ),
        }
    }
}

/// Application preferences read from an endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Preferences {
    /// Path of the IP filter file, empty when not configured.
    pub ip_filter_path: String,
    pub ip_filter_enabled: bool,
    pub queueing_enabled: bool,
    pub max_active_downloads: i64,
}

/// A partial preferences update.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PreferenceUpdate(Map<String, Value>);

impl PreferenceUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an arbitrary preference key.
    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Queueing with `max_active_downloads` slots, unlimited active torrents,
    /// slow torrents counted against the limit.
    pub fn download_queue(max_active_downloads: u64) -> Self {
        Self::new()
            .set("queueing_enabled", true)
            .set("max_active_downloads", max_active_downloads)
            .set("max_active_torrents", -1)
            .set("dont_count_slow_torrents", false)
    }

    pub fn ip_filter_enabled(enabled: bool) -> Self {
        Self::new().set("ip_filter_enabled", enabled)
    }

    pub fn clear_banned_ips() -> Self {
        Self::new().set("banned_IPs", "")
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// JSON payload for `setPreferences`.
    pub fn to_json(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }
}

/// Capability object bound to one remote download-client instance.
#[async_trait]
pub trait Endpoint: Send + Sync {
    /// Endpoint identity for logging and reports.
    fn id(&self) -> &EndpointId;

    /// Authenticate with the configured credentials.
    async fn login(&self) -> Result<(), EndpointError>;

    /// Current session state.
    async fn session_state(&self) -> SessionState;

    /// Application version string.
    async fn app_version(&self) -> Result<String, EndpointError>;

    /// List torrents passing `filter`.
    async fn list_torrents(&self, filter: ListFilter)
        -> Result<Vec<TorrentRecord>, EndpointError>;

    /// Detail lookup for a single torrent.
    async fn torrent_detail(&self, hash: &str) -> Result<TorrentDetail, EndpointError>;

    async fn preferences(&self) -> Result<Preferences, EndpointError>;

    async fn set_preferences(&self, update: &PreferenceUpdate) -> Result<(), EndpointError>;

    async fn pause(&self, hashes: &[String]) -> Result<(), EndpointError>;

    async fn resume(&self, hashes: &[String]) -> Result<(), EndpointError>;

    async fn set_force_start(&self, hashes: &[String], value: bool) -> Result<(), EndpointError>;

    /// Remove torrents. If `delete_files` is true, also delete downloaded files.
    async fn delete(&self, hashes: &[String], delete_files: bool) -> Result<(), EndpointError>;
}
