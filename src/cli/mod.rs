pub mod args;
pub mod dispatcher;

pub use args::{CacheCommand, Cli, Command, GlobalFlags, OutputFormat};
