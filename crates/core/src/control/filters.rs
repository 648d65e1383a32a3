//! IP filter list renewal.
//!
//! The list is downloaded once and written to every distinct filter path the
//! endpoints report. Each endpoint then has filtering switched off and on so
//! it reloads the file, and its banned-address list is cleared.

use std::collections::BTreeSet;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, error, info, warn};

use crate::endpoint::{EndpointError, PreferenceUpdate};
use crate::fleet::{fan_out, Fleet, FleetError, OperationFailure, OperationKind};

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    /// Filter files rewritten, sorted.
    pub paths_written: Vec<String>,
    /// Size of the downloaded list.
    pub bytes: usize,
    /// Endpoints that reloaded their filter.
    pub endpoints_reloaded: usize,
    pub failures: Vec<OperationFailure>,
}

/// Download the list from `url`, install it and make every endpoint reload.
///
/// A failed download aborts the renewal before any file or endpoint is
/// touched; it is reported as a fleet-wide failure. A failed write stops the
/// renewal before any endpoint reloads.
pub async fn renew(fleet: &Fleet, url: &str) -> FilterOutcome {
    let mut outcome = FilterOutcome::default();

    let reads = fan_out(fleet.endpoints().iter().cloned(), |endpoint| async move {
        endpoint.preferences().await
    })
    .await;

    let mut paths = BTreeSet::new();
    for (endpoint, joined) in fleet.endpoints().iter().zip(reads) {
        match joined {
            Ok(Ok(prefs)) if !prefs.ip_filter_path.is_empty() => {
                paths.insert(prefs.ip_filter_path);
            }
            Ok(Ok(_)) => debug!(endpoint = %endpoint.id(), "No IP filter path configured"),
            Ok(Err(e)) => {
                error!(endpoint = %endpoint.id(), error = %e, "Failed to read preferences");
                outcome
                    .failures
                    .push(OperationFailure::new(OperationKind::Filters, endpoint.id(), &e));
            }
            Err(e) => {
                error!(endpoint = %endpoint.id(), error = %e, "Preferences task failed");
                outcome
                    .failures
                    .push(OperationFailure::new(OperationKind::Filters, endpoint.id(), e));
            }
        }
    }

    let list = match download(url).await {
        Ok(list) => list,
        Err(e) => {
            error!(url, error = %e, "IP filter download failed");
            outcome
                .failures
                .push(OperationFailure::fleet_wide(OperationKind::Filters, e));
            return outcome;
        }
    };
    outcome.bytes = list.len();

    for path in paths {
        if let Err(e) = tokio::fs::write(&path, &list).await {
            error!(path = %path, error = %e, "Failed to write IP filter, endpoints not reloaded");
            outcome.failures.push(OperationFailure::fleet_wide(
                OperationKind::Filters,
                format!("{}: {}", path, e),
            ));
            return outcome;
        }
        info!(path = %path, bytes = list.len(), "IP filter written");
        outcome.paths_written.push(path);
    }

    let reloads = fan_out(fleet.endpoints().iter().cloned(), |endpoint| async move {
        for update in [
            PreferenceUpdate::ip_filter_enabled(false),
            PreferenceUpdate::ip_filter_enabled(true),
            PreferenceUpdate::clear_banned_ips(),
        ] {
            endpoint.set_preferences(&update).await?;
        }
        Ok::<(), EndpointError>(())
    })
    .await;

    for (endpoint, joined) in fleet.endpoints().iter().zip(reloads) {
        let result = joined.unwrap_or_else(|e| Err(EndpointError::ApiError(e.to_string())));
        match result {
            Ok(()) => outcome.endpoints_reloaded += 1,
            Err(e) => {
                warn!(endpoint = %endpoint.id(), error = %e, "Failed to reload IP filter");
                outcome
                    .failures
                    .push(OperationFailure::new(OperationKind::Filters, endpoint.id(), &e));
            }
        }
    }

    outcome
}

/// Fetch the filter list body.
pub async fn download(url: &str) -> Result<Vec<u8>, FleetError> {
    let client = Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()
        .map_err(|e| FleetError::FilterDownload(e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| FleetError::FilterDownload(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FleetError::FilterDownload(format!(
            "{} returned HTTP {}",
            url, status
        )));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| FleetError::FilterDownload(e.to_string()))?;
    Ok(body.to_vec())
}
