pub mod glob;
pub mod paths;
pub mod platform;
pub mod regex_cache;
pub mod sanitize;
pub mod urls;
