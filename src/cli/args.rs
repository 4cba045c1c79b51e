use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::connectors::EntryPoint;
use crate::connectors::clients::CacheBackend;

#[derive(Parser, Debug)]
#[command(
    name = "extdata",
    about = "Fetch external data into named variables",
    long_about = "Fetch data from web endpoints, databases, files, programs and LDAP \
                  directories, parse it and map it onto named variables",
    version,
    next_line_help = false,
    term_width = 80
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Parser, Debug)]
pub struct GlobalFlags {
    /// Source registry file (default: $EXTDATA_CONFIG or the user config dir)
    #[arg(short = 'c', long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Quiet mode
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Where cached responses are kept
    #[arg(long, value_enum, default_value_t = CacheBackend::Files, global = true)]
    pub cache_store: CacheBackend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch data through an entry point
    #[command(after_help = "Examples:\n  \
        extdata fetch web url=https://example.org/rates.csv data=rate=usd\n  \
        extdata fetch db db=stock from=items 'where=qty > 0'\n  \
        extdata fetch inline 'text=a,b\n1,2' format=csv")]
    Fetch {
        /// Entry point (web, soap, db, file, program, ldap, inline, external)
        #[arg(value_enum)]
        entry: EntryPoint,

        /// Request parameters as key=value; bare words are flags
        #[arg(value_name = "KEY=VALUE")]
        params: Vec<String>,

        /// Output format
        #[arg(short = 'o', long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,

        /// Hide metadata columns (__time, __stale, ...)
        #[arg(long)]
        no_meta: bool,
    },

    /// List configured source scopes and their settings
    Sources {
        /// Show only this scope
        scope: Option<String>,
    },

    /// Manage cached responses and throttle state
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },

    /// Evaluate a JSONPath expression against a JSON or YAML file
    Jsonpath {
        /// Document to query ("-" for stdin)
        file: PathBuf,

        /// Expression, e.g. '$.items[?(@.price < 10)].name'
        expression: String,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Remove every cached response
    Clear {
        /// Also reset throttle reservations
        #[arg(long)]
        throttle: bool,
    },
}
