//! The managed fleet and its per-round snapshot.

mod failure;
mod snapshot;
mod theme;

pub use failure::{FleetError, OperationFailure, OperationKind};
pub use snapshot::{EndpointListing, FleetSnapshot};
pub use theme::ForumThemeId;

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinError;
use tracing::{info, warn};

use crate::config::Config;
use crate::endpoint::{Endpoint, EndpointError, EndpointId, QBittorrentEndpoint, SessionState};

/// Spawn `task` for every item on its own runtime task and join them all.
/// Results come back in input order; a panicked task yields its `JoinError`.
pub(crate) async fn fan_out<I, T, F, Fut>(items: I, task: F) -> Vec<Result<T, JoinError>>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let handles: Vec<_> = items
        .into_iter()
        .map(task)
        .map(tokio::spawn)
        .collect();
    futures::future::join_all(handles).await
}

/// Result of connecting to one endpoint.
#[derive(Debug, Clone)]
pub struct ConnectionStatus {
    pub endpoint: EndpointId,
    pub state: SessionState,
    /// Application version, when requested and available.
    pub version: Option<String>,
    pub error: Option<String>,
}

/// Ordered set of endpoint handles operated as one unit.
#[derive(Clone)]
pub struct Fleet {
    endpoints: Vec<Arc<dyn Endpoint>>,
}

impl Fleet {
    pub fn new(endpoints: Vec<Arc<dyn Endpoint>>) -> Self {
        Self { endpoints }
    }

    /// Build qBittorrent handles for every configured endpoint, in order.
    pub fn from_config(config: &Config) -> Result<Self, EndpointError> {
        let endpoints = config
            .endpoints
            .iter()
            .map(|c| QBittorrentEndpoint::new(c).map(|e| Arc::new(e) as Arc<dyn Endpoint>))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(endpoints))
    }

    pub fn endpoints(&self) -> &[Arc<dyn Endpoint>] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Log in to every endpoint concurrently. A failed login is logged and
    /// reported; the endpoint stays in the fleet and contributes best-effort
    /// results afterwards.
    pub async fn connect(&self, with_version: bool) -> Vec<ConnectionStatus> {
        let results = fan_out(self.endpoints.iter().cloned(), move |endpoint| {
            connect_one(endpoint, with_version)
        })
        .await;

        self.endpoints
            .iter()
            .zip(results)
            .map(|(endpoint, joined)| {
                joined.unwrap_or_else(|e| ConnectionStatus {
                    endpoint: endpoint.id().clone(),
                    state: SessionState::Disconnected,
                    version: None,
                    error: Some(e.to_string()),
                })
            })
            .collect()
    }

    /// Log in again to endpoints whose credentials were rejected, once each.
    /// Returns how many endpoints are connected afterwards.
    pub async fn retry_rejected(&self) -> usize {
        let results = fan_out(self.endpoints.iter().cloned(), |endpoint| async move {
            if endpoint.session_state().await == SessionState::AuthFailed {
                match endpoint.login().await {
                    Ok(()) => info!(endpoint = %endpoint.id(), "Login accepted after rejection"),
                    Err(e) => warn!(endpoint = %endpoint.id(), error = %e, "Login still rejected"),
                }
            }
            endpoint.session_state().await == SessionState::Connected
        })
        .await;

        results
            .into_iter()
            .filter(|joined| matches!(joined, Ok(true)))
            .count()
    }
}

async fn connect_one(endpoint: Arc<dyn Endpoint>, with_version: bool) -> ConnectionStatus {
    let id = endpoint.id().clone();
    if let Err(e) = endpoint.login().await {
        warn!(endpoint = %id, error = %e, "Endpoint login failed");
        return ConnectionStatus {
            state: endpoint.session_state().await,
            endpoint: id,
            version: None,
            error: Some(e.to_string()),
        };
    }

    let version = if with_version {
        match endpoint.app_version().await {
            Ok(version) => {
                info!(endpoint = %id, version = %version, "Connected");
                Some(version)
            }
            Err(e) => {
                warn!(endpoint = %id, error = %e, "Failed to read application version");
                None
            }
        }
    } else {
        None
    };

    ConnectionStatus {
        state: endpoint.session_state().await,
        endpoint: id,
        version,
        error: None,
    }
}
