//! qBittorrent Web API endpoint implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::EndpointConfig;

use super::{
    Endpoint, EndpointError, EndpointId, ListFilter, PreferenceUpdate, Preferences,
    SessionState, TorrentDetail, TorrentRecord, TorrentState,
};

/// Endpoint backed by a qBittorrent Web UI.
pub struct QBittorrentEndpoint {
    client: Client,
    id: EndpointId,
    username: String,
    password: String,
    session: RwLock<SessionState>,
}

/// Outcome of a single HTTP exchange, before status interpretation.
enum Reply {
    Body(String),
    NotFound,
}

impl QBittorrentEndpoint {
    /// Create a new endpoint handle. No network traffic happens until the
    /// first call.
    pub fn new(config: &EndpointConfig) -> Result<Self, EndpointError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .cookie_store(true)
            .build()
            .map_err(|e| EndpointError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            id: config.id(),
            username: config.login.clone(),
            password: config.password.clone(),
            session: RwLock::new(SessionState::Disconnected),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.id.base_url(), path)
    }

    /// Login unless a session exists. A credential rejection is not retried
    /// here; `Fleet::retry_rejected` retries it once per round.
    async fn ensure_authenticated(&self) -> Result<(), EndpointError> {
        // Copied out so the read guard is released before `login` writes.
        let state = *self.session.read().await;
        match state {
            SessionState::Connected => Ok(()),
            SessionState::AuthFailed => Err(EndpointError::AuthenticationFailed(format!(
                "{} rejected the configured credentials",
                self.id
            ))),
            SessionState::Disconnected => self.login().await,
        }
    }

    /// Send an authenticated request, re-authenticating once on HTTP 403.
    async fn execute<F>(&self, build: F) -> Result<Reply, EndpointError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        self.ensure_authenticated().await?;

        let response = build(&self.client).send().await.map_err(map_transport_error)?;

        let response = if response.status() == StatusCode::FORBIDDEN {
            warn!(endpoint = %self.id, "qBittorrent session expired, re-authenticating");
            *self.session.write().await = SessionState::Disconnected;
            self.login().await?;
            build(&self.client).send().await.map_err(map_transport_error)?
        } else {
            response
        };

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(Reply::NotFound);
        }
        if !status.is_success() {
            return Err(EndpointError::ApiError(format!("HTTP {}", status)));
        }

        response
            .text()
            .await
            .map(Reply::Body)
            .map_err(|e| EndpointError::ApiError(e.to_string()))
    }

    /// Authenticated GET.
    async fn get(&self, path: &str) -> Result<String, EndpointError> {
        let url = self.url(path);
        match self.execute(|client| client.get(&url)).await? {
            Reply::Body(body) => Ok(body),
            Reply::NotFound => Err(EndpointError::ApiError(format!("HTTP 404 for {}", path))),
        }
    }

    /// Authenticated form POST. `paths` are tried in order while the server
    /// answers 404, which covers endpoints renamed between API versions.
    async fn post_form(
        &self,
        paths: &[&str],
        params: &[(&str, &str)],
    ) -> Result<String, EndpointError> {
        for path in paths {
            let url = self.url(path);
            match self.execute(|client| client.post(&url).form(params)).await? {
                Reply::Body(body) => return Ok(body),
                Reply::NotFound => debug!(endpoint = %self.id, path, "API path not found"),
            }
        }
        Err(EndpointError::ApiError(format!(
            "HTTP 404 for {}",
            paths.join(", ")
        )))
    }
}

fn map_transport_error(e: reqwest::Error) -> EndpointError {
    if e.is_timeout() {
        EndpointError::Timeout
    } else if e.is_connect() {
        EndpointError::ConnectionFailed(e.to_string())
    } else {
        EndpointError::ApiError(e.to_string())
    }
}

fn parse_json<'a, T: Deserialize<'a>>(body: &'a str) -> Result<T, EndpointError> {
    serde_json::from_str(body)
        .map_err(|e| EndpointError::ApiError(format!("Failed to parse response: {}", e)))
}

/// qBittorrent torrent info response.
#[derive(Debug, Deserialize)]
struct QBTorrentInfo {
    hash: String,
    name: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    save_path: String,
    #[serde(default)]
    total_size: i64,
    state: String,
    #[serde(default)]
    force_start: bool,
    #[serde(default)]
    added_on: i64,
    /// Only present on qBittorrent 5.0 and later.
    #[serde(default)]
    comment: Option<String>,
}

impl QBTorrentInfo {
    fn into_record(self) -> TorrentRecord {
        TorrentRecord {
            hash: self.hash.to_lowercase(),
            name: self.name,
            category: self.category,
            save_path: self.save_path,
            size_bytes: self.total_size.max(0) as u64,
            state: TorrentState::parse(&self.state),
            force_start: self.force_start,
            added_on: self.added_on,
            comment: self.comment,
        }
    }
}

/// qBittorrent torrent properties response.
#[derive(Debug, Deserialize)]
struct QBTorrentProperties {
    #[serde(default)]
    comment: String,
    #[serde(default)]
    save_path: String,
    #[serde(default)]
    addition_date: i64,
}

/// The subset of qBittorrent preferences the fleet reads.
#[derive(Debug, Deserialize)]
struct QBPreferences {
    #[serde(default)]
    ip_filter_path: String,
    #[serde(default)]
    ip_filter_enabled: bool,
    #[serde(default)]
    queueing_enabled: bool,
    #[serde(default)]
    max_active_downloads: i64,
}

fn join_hashes(hashes: &[String]) -> String {
    hashes.join("|")
}

#[async_trait]
impl Endpoint for QBittorrentEndpoint {
    fn id(&self) -> &EndpointId {
        &self.id
    }

    async fn login(&self) -> Result<(), EndpointError> {
        let url = self.url("/api/v2/auth/login");
        let params = [
            ("username", self.username.as_str()),
            ("password", self.password.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            // qBittorrent rejects logins whose Referer does not match the host.
            .header(reqwest::header::REFERER, self.id.base_url())
            .form(&params)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() && body.contains("Ok.") {
            debug!(endpoint = %self.id, "qBittorrent login successful");
            *self.session.write().await = SessionState::Connected;
            Ok(())
        } else if body.contains("Fails.") || status == StatusCode::FORBIDDEN {
            *self.session.write().await = SessionState::AuthFailed;
            Err(EndpointError::AuthenticationFailed(
                "Invalid credentials".to_string(),
            ))
        } else {
            Err(EndpointError::AuthenticationFailed(format!(
                "Unexpected response: {}",
                body.chars().take(100).collect::<String>()
            )))
        }
    }

    async fn session_state(&self) -> SessionState {
        *self.session.read().await
    }

    async fn app_version(&self) -> Result<String, EndpointError> {
        Ok(self.get("/api/v2/app/version").await?.trim().to_string())
    }

    async fn list_torrents(
        &self,
        filter: ListFilter,
    ) -> Result<Vec<TorrentRecord>, EndpointError> {
        let path = format!("/api/v2/torrents/info?filter={}", filter.as_query());
        let body = self.get(&path).await?;
        let torrents: Vec<QBTorrentInfo> = parse_json(&body)?;
        Ok(torrents.into_iter().map(QBTorrentInfo::into_record).collect())
    }

    async fn torrent_detail(&self, hash: &str) -> Result<TorrentDetail, EndpointError> {
        let path = format!(
            "/api/v2/torrents/properties?hash={}",
            urlencoding::encode(&hash.to_lowercase())
        );
        let url = self.url(&path);
        let body = match self.execute(|client| client.get(&url)).await? {
            Reply::Body(body) => body,
            Reply::NotFound => return Err(EndpointError::TorrentNotFound(hash.to_string())),
        };
        let props: QBTorrentProperties = parse_json(&body)?;
        Ok(TorrentDetail {
            comment: props.comment,
            save_path: props.save_path,
            addition_date: props.addition_date,
        })
    }

    async fn preferences(&self) -> Result<Preferences, EndpointError> {
        let body = self.get("/api/v2/app/preferences").await?;
        let prefs: QBPreferences = parse_json(&body)?;
        Ok(Preferences {
            ip_filter_path: prefs.ip_filter_path,
            ip_filter_enabled: prefs.ip_filter_enabled,
            queueing_enabled: prefs.queueing_enabled,
            max_active_downloads: prefs.max_active_downloads,
        })
    }

    async fn set_preferences(&self, update: &PreferenceUpdate) -> Result<(), EndpointError> {
        let json = update.to_json();
        self.post_form(&["/api/v2/app/setPreferences"], &[("json", &json)])
            .await?;
        Ok(())
    }

    async fn pause(&self, hashes: &[String]) -> Result<(), EndpointError> {
        if hashes.is_empty() {
            return Ok(());
        }
        let joined = join_hashes(hashes);
        self.post_form(
            &["/api/v2/torrents/pause", "/api/v2/torrents/stop"],
            &[("hashes", &joined)],
        )
        .await?;
        Ok(())
    }

    async fn resume(&self, hashes: &[String]) -> Result<(), EndpointError> {
        if hashes.is_empty() {
            return Ok(());
        }
        let joined = join_hashes(hashes);
        self.post_form(
            &["/api/v2/torrents/resume", "/api/v2/torrents/start"],
            &[("hashes", &joined)],
        )
        .await?;
        Ok(())
    }

    async fn set_force_start(&self, hashes: &[String], value: bool) -> Result<(), EndpointError> {
        if hashes.is_empty() {
            return Ok(());
        }
        let joined = join_hashes(hashes);
        let value = if value { "true" } else { "false" };
        self.post_form(
            &["/api/v2/torrents/setForceStart"],
            &[("hashes", &joined), ("value", value)],
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, hashes: &[String], delete_files: bool) -> Result<(), EndpointError> {
        if hashes.is_empty() {
            return Ok(());
        }
        let joined = join_hashes(hashes);
        let delete_str = if delete_files { "true" } else { "false" };
        self.post_form(
            &["/api/v2/torrents/delete"],
            &[("hashes", &joined), ("deleteFiles", delete_str)],
        )
        .await?;
        Ok(())
    }
}
