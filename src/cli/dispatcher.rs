//! Command dispatcher
//!
//! Routes CLI commands to their appropriate handlers.

use crate::cli::args::{CacheCommand, Cli, Command};
use crate::commands;
use crate::error::Result;

/// Dispatch the parsed CLI command to the appropriate handler
pub fn dispatch(args: &Cli) -> Result<()> {
    match &args.command {
        Command::Fetch {
            entry,
            params,
            output,
            no_meta,
        } => commands::fetch::run(commands::fetch::FetchOptions {
            entry: *entry,
            params: params.clone(),
            output: *output,
            no_meta: *no_meta,
            config: args.global.config.clone(),
            cache_store: args.global.cache_store,
        }),

        Command::Sources { scope } => commands::sources::run(commands::sources::SourcesOptions {
            config: args.global.config.as_deref(),
            scope: scope.clone(),
        }),

        Command::Cache {
            command: CacheCommand::Clear { throttle },
        } => commands::cache::clear(commands::cache::CacheOptions {
            cache_store: args.global.cache_store,
            throttle: *throttle,
        }),

        Command::Jsonpath { file, expression } => commands::jsonpath::run(file, expression),

        Command::Completions { shell } => commands::completions::run(*shell),
    }
}
