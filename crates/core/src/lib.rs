pub mod balancer;
pub mod config;
pub mod control;
pub mod dedup;
pub mod endpoint;
pub mod fleet;
pub mod report;
pub mod round;
pub mod search;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, EndpointConfig,
    SanitizedConfig,
};
pub use endpoint::{
    Endpoint, EndpointError, EndpointId, ListFilter, QBittorrentEndpoint, SessionState,
    TorrentRecord, TorrentState,
};
pub use fleet::{
    ConnectionStatus, Fleet, FleetError, FleetSnapshot, ForumThemeId, OperationFailure,
    OperationKind,
};
pub use round::{run_round, Operations, RoundReport, RoundSettings};
