pub mod cache;
pub mod completions;
pub mod fetch;
pub mod jsonpath;
pub mod sources;
