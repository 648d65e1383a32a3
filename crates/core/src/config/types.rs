use serde::{Deserialize, Serialize};

use crate::endpoint::EndpointId;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Managed endpoints, in the order rounds traverse them.
    pub endpoints: Vec<EndpointConfig>,
    #[serde(default)]
    pub filters: FiltersConfig,
    #[serde(default)]
    pub rounds: RoundsConfig,
}

/// One qBittorrent Web UI
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    pub host: String,
    pub port: u16,
    /// Use https for the Web API.
    #[serde(default)]
    pub tls: bool,
    pub login: String,
    pub password: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

impl EndpointConfig {
    pub fn id(&self) -> EndpointId {
        EndpointId::new(self.host.clone(), self.port, self.tls)
    }
}

fn default_timeout() -> u32 {
    30
}

/// IP filter refresh configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FiltersConfig {
    /// Where the filter list is downloaded from.
    #[serde(default = "default_filter_url")]
    pub url: String,
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            url: default_filter_url(),
        }
    }
}

fn default_filter_url() -> String {
    "https://bot.keeps.cyou/static/ipfilter.dat".to_string()
}

/// Round scheduling configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoundsConfig {
    /// Pause between rounds in loop mode.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
}

impl Default for RoundsConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
        }
    }
}

fn default_interval() -> u64 {
    60
}

/// Sanitized config for logging (passwords redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub endpoints: Vec<SanitizedEndpointConfig>,
    pub filters: FiltersConfig,
    pub rounds: RoundsConfig,
}

/// Sanitized endpoint config (password hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedEndpointConfig {
    pub url: String,
    pub login: String,
    pub password_configured: bool,
    pub timeout_secs: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            endpoints: config
                .endpoints
                .iter()
                .map(|e| SanitizedEndpointConfig {
                    url: e.id().base_url(),
                    login: e.login.clone(),
                    password_configured: !e.password.is_empty(),
                    timeout_secs: e.timeout_secs,
                })
                .collect(),
            filters: config.filters.clone(),
            rounds: config.rounds.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_endpoint() {
        let toml = r#"
[[endpoints]]
host = "127.0.0.1"
port = 8080
login = "admin"
password = "adminadmin"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let endpoint = &config.endpoints[0];
        assert_eq!(endpoint.host, "127.0.0.1");
        assert!(!endpoint.tls);
        assert_eq!(endpoint.timeout_secs, 30); // default
        assert_eq!(config.rounds.interval_secs, 60);
        assert_eq!(
            config.filters.url,
            "https://bot.keeps.cyou/static/ipfilter.dat"
        );
    }

    #[test]
    fn test_deserialize_missing_password_fails() {
        let toml = r#"
[[endpoints]]
host = "127.0.0.1"
port = 8080
login = "admin"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_custom_filter_url() {
        let toml = r#"
[[endpoints]]
host = "a"
port = 1
login = "u"
password = "p"

[filters]
url = "http://mirror.local/ipfilter.dat"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.filters.url, "http://mirror.local/ipfilter.dat");
    }

    #[test]
    fn test_endpoint_id() {
        let toml = r#"
[[endpoints]]
host = "box"
port = 443
tls = true
login = "u"
password = "p"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.endpoints[0].id().base_url(), "https://box:443");
    }

    #[test]
    fn test_sanitized_config_hides_password() {
        let config = Config {
            endpoints: vec![EndpointConfig {
                host: "box".to_string(),
                port: 8080,
                tls: false,
                login: "admin".to_string(),
                password: "secret".to_string(),
                timeout_secs: 30,
            }],
            filters: FiltersConfig::default(),
            rounds: RoundsConfig::default(),
        };

        let sanitized = SanitizedConfig::from(&config);
        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("secret"));
        assert_eq!(sanitized.endpoints[0].url, "http://box:8080");
        assert!(sanitized.endpoints[0].password_configured);
    }
}
