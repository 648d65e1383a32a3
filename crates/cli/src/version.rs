/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const NOT_SET: &str = "not set";

/// Build timestamp, injected through `QBFLEET_BUILD_TIME` at compile time.
pub fn build_time() -> &'static str {
    option_env!("QBFLEET_BUILD_TIME").unwrap_or(NOT_SET)
}

pub fn banner() -> String {
    format!("Version:    {}\nBuild Time: {}", VERSION, build_time())
}
