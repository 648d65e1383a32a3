use std::fmt;

use thiserror::Error;

use crate::config::ConfigError;
use crate::endpoint::EndpointId;

/// Errors that stop a fleet operation before or instead of per-endpoint work.
#[derive(Debug, Error)]
pub enum FleetError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Filter download failed: {0}")]
    FilterDownload(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Fleet operation that can fail against an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Snapshot,
    Categories,
    Status,
    Dedup,
    LoadBalance,
    Search,
    Pause,
    Resume,
    Filters,
    Errors,
    Gate,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Snapshot => "snapshot",
            OperationKind::Categories => "categories",
            OperationKind::Status => "status",
            OperationKind::Dedup => "dedup",
            OperationKind::LoadBalance => "load_balance",
            OperationKind::Search => "search",
            OperationKind::Pause => "pause",
            OperationKind::Resume => "resume",
            OperationKind::Filters => "filters",
            OperationKind::Errors => "errors",
            OperationKind::Gate => "gate",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed call, collected into the round report instead of aborting it.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationFailure {
    pub operation: OperationKind,
    /// `None` for failures not tied to one endpoint.
    pub endpoint: Option<EndpointId>,
    pub error: String,
}

impl OperationFailure {
    pub fn new(operation: OperationKind, endpoint: &EndpointId, error: impl fmt::Display) -> Self {
        Self {
            operation,
            endpoint: Some(endpoint.clone()),
            error: error.to_string(),
        }
    }

    pub fn fleet_wide(operation: OperationKind, error: impl fmt::Display) -> Self {
        Self {
            operation,
            endpoint: None,
            error: error.to_string(),
        }
    }
}

impl fmt::Display for OperationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.endpoint {
            Some(endpoint) => write!(f, "[{}] {}: {}", self.operation, endpoint, self.error),
            None => write!(f, "[{}] {}", self.operation, self.error),
        }
    }
}
