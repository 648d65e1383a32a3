//! Mock endpoint for testing.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::endpoint::{
    Endpoint, EndpointError, EndpointId, ListFilter, PreferenceUpdate, Preferences,
    SessionState, TorrentDetail, TorrentRecord,
};

/// Failure switches for the mock. Each stays on until cleared.
#[derive(Debug, Clone, Copy, Default)]
struct FailureSwitches {
    login: bool,
    listing: bool,
    detail: bool,
    preferences: bool,
    mutation: bool,
}

/// Calls recorded for assertions.
#[derive(Debug, Clone, Default)]
struct Recorded {
    listings: Vec<ListFilter>,
    details: Vec<String>,
    preference_updates: Vec<PreferenceUpdate>,
    pauses: Vec<Vec<String>>,
    resumes: Vec<Vec<String>>,
    force_starts: Vec<(Vec<String>, bool)>,
    deletes: Vec<(Vec<String>, bool)>,
}

/// Mock implementation of the Endpoint trait.
///
/// Provides controllable behavior for testing:
/// - Pre-populated torrents, listed in insertion order
/// - Per-torrent comments served through detail lookups
/// - Recorded mutations for assertions
/// - Sticky failure switches per operation family
///
/// # Example
///
/// ```rust,ignore
/// let endpoint = Arc::new(MockEndpoint::new("seedbox", 8080));
/// endpoint.add_torrent(fixtures::record("abc", 1024)).await;
///
/// let fleet = Fleet::new(vec![endpoint.clone()]);
/// // ... run an operation ...
///
/// assert_eq!(endpoint.delete_calls().await.len(), 1);
/// ```
#[derive(Debug)]
pub struct MockEndpoint {
    id: EndpointId,
    version: String,
    torrents: Arc<RwLock<Vec<TorrentRecord>>>,
    /// Comments returned by detail lookups, by hash.
    comments: Arc<RwLock<HashMap<String, String>>>,
    preferences: Arc<RwLock<Preferences>>,
    session: Arc<RwLock<SessionState>>,
    failures: Arc<RwLock<FailureSwitches>>,
    recorded: Arc<RwLock<Recorded>>,
}

impl MockEndpoint {
    /// Create a new mock endpoint with no torrents.
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            id: EndpointId::new(host, port, false),
            version: "v4.6.7".to_string(),
            torrents: Arc::new(RwLock::new(Vec::new())),
            comments: Arc::new(RwLock::new(HashMap::new())),
            preferences: Arc::new(RwLock::new(Preferences::default())),
            session: Arc::new(RwLock::new(SessionState::Disconnected)),
            failures: Arc::new(RwLock::new(FailureSwitches::default())),
            recorded: Arc::new(RwLock::new(Recorded::default())),
        }
    }

    /// Pre-populate a torrent.
    pub async fn add_torrent(&self, record: TorrentRecord) {
        self.torrents.write().await.push(record);
    }

    /// Pre-populate a torrent whose comment is only visible via detail lookup.
    pub async fn add_torrent_with_comment(&self, record: TorrentRecord, comment: &str) {
        self.comments
            .write()
            .await
            .insert(record.hash.clone(), comment.to_string());
        self.add_torrent(record).await;
    }

    /// Check if a torrent exists.
    pub async fn has_torrent(&self, hash: &str) -> bool {
        self.torrents.read().await.iter().any(|t| t.hash == hash)
    }

    /// Get a torrent by hash.
    pub async fn torrent(&self, hash: &str) -> Option<TorrentRecord> {
        self.torrents
            .read()
            .await
            .iter()
            .find(|t| t.hash == hash)
            .cloned()
    }

    pub async fn torrent_count(&self) -> usize {
        self.torrents.read().await.len()
    }

    /// Replace the preferences returned by `preferences()`.
    pub async fn set_preferences_state(&self, preferences: Preferences) {
        *self.preferences.write().await = preferences;
    }

    pub async fn current_preferences(&self) -> Preferences {
        self.preferences.read().await.clone()
    }

    pub async fn set_login_failure(&self, fail: bool) {
        self.failures.write().await.login = fail;
    }

    pub async fn set_listing_failure(&self, fail: bool) {
        self.failures.write().await.listing = fail;
    }

    pub async fn set_detail_failure(&self, fail: bool) {
        self.failures.write().await.detail = fail;
    }

    /// Fail both preference reads and writes.
    pub async fn set_preferences_failure(&self, fail: bool) {
        self.failures.write().await.preferences = fail;
    }

    /// Fail pause, resume, force start and delete.
    pub async fn set_mutation_failure(&self, fail: bool) {
        self.failures.write().await.mutation = fail;
    }

    pub async fn listing_calls(&self) -> Vec<ListFilter> {
        self.recorded.read().await.listings.clone()
    }

    pub async fn detail_call_count(&self) -> usize {
        self.recorded.read().await.details.len()
    }

    pub async fn preference_updates(&self) -> Vec<PreferenceUpdate> {
        self.recorded.read().await.preference_updates.clone()
    }

    pub async fn pause_calls(&self) -> Vec<Vec<String>> {
        self.recorded.read().await.pauses.clone()
    }

    pub async fn resume_calls(&self) -> Vec<Vec<String>> {
        self.recorded.read().await.resumes.clone()
    }

    pub async fn force_start_calls(&self) -> Vec<(Vec<String>, bool)> {
        self.recorded.read().await.force_starts.clone()
    }

    pub async fn delete_calls(&self) -> Vec<(Vec<String>, bool)> {
        self.recorded.read().await.deletes.clone()
    }

    async fn check_mutation(&self) -> Result<(), EndpointError> {
        if self.failures.read().await.mutation {
            return Err(EndpointError::ApiError("mock mutation failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Endpoint for MockEndpoint {
    fn id(&self) -> &EndpointId {
        &self.id
    }

    async fn login(&self) -> Result<(), EndpointError> {
        if self.failures.read().await.login {
            *self.session.write().await = SessionState::AuthFailed;
            return Err(EndpointError::AuthenticationFailed(
                "Invalid username or password".into(),
            ));
        }
        *self.session.write().await = SessionState::Connected;
        Ok(())
    }

    async fn session_state(&self) -> SessionState {
        *self.session.read().await
    }

    async fn app_version(&self) -> Result<String, EndpointError> {
        Ok(self.version.clone())
    }

    async fn list_torrents(
        &self,
        filter: ListFilter,
    ) -> Result<Vec<TorrentRecord>, EndpointError> {
        self.recorded.write().await.listings.push(filter);
        if self.failures.read().await.listing {
            return Err(EndpointError::ConnectionFailed("mock listing failure".into()));
        }

        Ok(self
            .torrents
            .read()
            .await
            .iter()
            .filter(|t| filter.accepts(t.state))
            .cloned()
            .collect())
    }

    async fn torrent_detail(&self, hash: &str) -> Result<TorrentDetail, EndpointError> {
        self.recorded.write().await.details.push(hash.to_string());
        if self.failures.read().await.detail {
            return Err(EndpointError::Timeout);
        }

        let record = self
            .torrent(hash)
            .await
            .ok_or_else(|| EndpointError::TorrentNotFound(hash.to_string()))?;
        let comment = self
            .comments
            .read()
            .await
            .get(hash)
            .cloned()
            .or(record.comment)
            .unwrap_or_default();

        Ok(TorrentDetail {
            comment,
            save_path: record.save_path,
            addition_date: record.added_on,
        })
    }

    async fn preferences(&self) -> Result<Preferences, EndpointError> {
        if self.failures.read().await.preferences {
            return Err(EndpointError::ApiError("mock preferences failure".into()));
        }
        Ok(self.preferences.read().await.clone())
    }

    async fn set_preferences(&self, update: &PreferenceUpdate) -> Result<(), EndpointError> {
        self.recorded
            .write()
            .await
            .preference_updates
            .push(update.clone());
        if self.failures.read().await.preferences {
            return Err(EndpointError::ApiError("mock preferences failure".into()));
        }

        let mut prefs = self.preferences.write().await;
        if let Some(Value::Bool(v)) = update.get("queueing_enabled") {
            prefs.queueing_enabled = *v;
        }
        if let Some(v) = update.get("max_active_downloads").and_then(Value::as_i64) {
            prefs.max_active_downloads = v;
        }
        if let Some(Value::Bool(v)) = update.get("ip_filter_enabled") {
            prefs.ip_filter_enabled = *v;
        }
        Ok(())
    }

    async fn pause(&self, hashes: &[String]) -> Result<(), EndpointError> {
        self.check_mutation().await?;
        self.recorded.write().await.pauses.push(hashes.to_vec());
        Ok(())
    }

    async fn resume(&self, hashes: &[String]) -> Result<(), EndpointError> {
        self.check_mutation().await?;
        self.recorded.write().await.resumes.push(hashes.to_vec());
        Ok(())
    }

    async fn set_force_start(&self, hashes: &[String], value: bool) -> Result<(), EndpointError> {
        self.check_mutation().await?;
        self.recorded
            .write()
            .await
            .force_starts
            .push((hashes.to_vec(), value));
        for torrent in self.torrents.write().await.iter_mut() {
            if hashes.contains(&torrent.hash) {
                torrent.force_start = value;
            }
        }
        Ok(())
    }

    async fn delete(&self, hashes: &[String], delete_files: bool) -> Result<(), EndpointError> {
        self.check_mutation().await?;
        self.recorded
            .write()
            .await
            .deletes
            .push((hashes.to_vec(), delete_files));
        self.torrents
            .write()
            .await
            .retain(|t| !hashes.contains(&t.hash));
        Ok(())
    }
}
