//! Central project identity contract.
//!
//! This module is the single source of truth for runtime identity values.

pub const DISPLAY_NAME: &str = "ExtData";
pub const BINARY_NAME: &str = "extdata";
pub const STABLE_PROJECT_ID: &str = "extdata";
pub const CONFIG_DIR_NAME: &str = "extdata";
pub const ENV_PREFIX: &str = "EXTDATA";
pub const CONFIG_FILE_BASENAME: &str = "sources.kdl";
pub const CACHE_DB_BASENAME: &str = "cache.sqlite";
pub const THROTTLE_FILE_BASENAME: &str = "throttle.json";

pub fn env_key(suffix: &str) -> String {
    format!("{}_{}", ENV_PREFIX, suffix)
}

pub fn user_agent() -> String {
    format!("{}/{}", BINARY_NAME, env!("CARGO_PKG_VERSION"))
}
