use std::collections::HashSet;

use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - At least one endpoint is configured
/// - Endpoint hosts are non-empty and ports are not 0
/// - No endpoint is listed twice
/// - Loop interval is not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.endpoints.is_empty() {
        return Err(ConfigError::ValidationError(
            "at least one endpoint must be configured".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for (idx, endpoint) in config.endpoints.iter().enumerate() {
        if endpoint.host.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "endpoints[{}].host cannot be empty",
                idx
            )));
        }
        if endpoint.port == 0 {
            return Err(ConfigError::ValidationError(format!(
                "endpoints[{}].port cannot be 0",
                idx
            )));
        }
        if !seen.insert(endpoint.id()) {
            return Err(ConfigError::ValidationError(format!(
                "endpoints[{}] duplicates {}",
                idx,
                endpoint.id()
            )));
        }
    }

    if config.rounds.interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "rounds.interval_secs cannot be 0".to_string(),
        ));
    }

    Ok(())
}
