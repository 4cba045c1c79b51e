//! Connectors: resolution of a request to a backend and the fetch
//! executors for each backend kind.

pub mod clients;
pub mod database;
pub mod directory;
pub mod encoding;
pub mod http;
pub mod inline;
pub mod ldap;
pub mod program;
pub mod registry;

use clap::ValueEnum;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::core::{ErrorList, Payload};
use crate::error::{ExtDataError, Result};
use crate::fetch::cache::Cached;
use crate::params::{ParamValue, RequestParams};

/// Caller-facing operation, injected as the `__pf` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum EntryPoint {
    #[value(name = "web", alias = "get_web_data")]
    Web,
    #[value(name = "soap", alias = "get_soap_data")]
    Soap,
    #[value(name = "db", alias = "get_db_data")]
    Db,
    #[value(name = "file", alias = "get_file_data")]
    File,
    #[value(name = "program", alias = "get_program_data")]
    Program,
    #[value(name = "ldap", alias = "get_ldap_data")]
    Ldap,
    #[value(name = "inline", alias = "get_inline_data")]
    Inline,
    #[value(name = "external", alias = "get_external_data")]
    External,
}

impl EntryPoint {
    pub const ALL: [EntryPoint; 8] = [
        EntryPoint::Web,
        EntryPoint::Soap,
        EntryPoint::Db,
        EntryPoint::File,
        EntryPoint::Program,
        EntryPoint::Ldap,
        EntryPoint::Inline,
        EntryPoint::External,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EntryPoint::Web => "get_web_data",
            EntryPoint::Soap => "get_soap_data",
            EntryPoint::Db => "get_db_data",
            EntryPoint::File => "get_file_data",
            EntryPoint::Program => "get_program_data",
            EntryPoint::Ldap => "get_ldap_data",
            EntryPoint::Inline => "get_inline_data",
            EntryPoint::External => "get_external_data",
        }
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EntryPoint {
    type Err = ExtDataError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim();
        EntryPoint::ALL
            .into_iter()
            .find(|entry| {
                entry.name().eq_ignore_ascii_case(wanted)
                    || entry
                        .to_possible_value()
                        .is_some_and(|value| value.matches(wanted, true))
            })
            .ok_or_else(|| ExtDataError::Other(format!("Unknown entry point '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Soap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbEngine {
    Sqlite,
    Postgres,
    Mysql,
    Mssql,
    Odbc,
    Mongo,
}

impl DbEngine {
    pub const ALL: [DbEngine; 6] = [
        DbEngine::Sqlite,
        DbEngine::Postgres,
        DbEngine::Mysql,
        DbEngine::Mssql,
        DbEngine::Odbc,
        DbEngine::Mongo,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DbEngine::Sqlite => "sqlite",
            DbEngine::Postgres => "postgres",
            DbEngine::Mysql => "mysql",
            DbEngine::Mssql => "mssql",
            DbEngine::Odbc => "odbc",
            DbEngine::Mongo => "mongodb",
        }
    }

    /// Values of the `type` setting selecting this engine.
    pub fn type_names(&self) -> &'static [&'static str] {
        match self {
            DbEngine::Sqlite => &["sqlite", "sqlite3"],
            DbEngine::Postgres => &["postgres", "postgresql"],
            DbEngine::Mysql => &["mysql", "mariadb"],
            DbEngine::Mssql => &["mssql", "sqlsrv"],
            DbEngine::Odbc => &["odbc"],
            DbEngine::Mongo => &["mongodb", "mongo"],
        }
    }

    /// Row limits are written `SELECT TOP n` instead of `LIMIT n`.
    pub fn uses_top(&self) -> bool {
        matches!(self, DbEngine::Mssql | DbEngine::Odbc)
    }
}

/// Composed SELECT (or Mongo find) versus a pre-registered statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbQuery {
    Composed,
    Prepared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSource {
    /// `file=<id>`: the configured `path`.
    NamedFile,
    /// `directory=<id>` + `file name=<name>`.
    DirectoryFile,
    /// `directory=<id>` + `file name=<pattern>`.
    DirectoryWalk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorKind {
    Http(HttpMethod),
    Database(DbEngine, DbQuery),
    Directory(FileSource),
    Program,
    Ldap,
    Inline,
    Unresolved,
}

impl fmt::Display for ConnectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectorKind::Http(HttpMethod::Get) => f.write_str("web (GET)"),
            ConnectorKind::Http(HttpMethod::Post) => f.write_str("web (POST)"),
            ConnectorKind::Http(HttpMethod::Soap) => f.write_str("SOAP"),
            ConnectorKind::Database(engine, DbQuery::Composed) => write!(f, "{} query", engine.name()),
            ConnectorKind::Database(engine, DbQuery::Prepared) => {
                write!(f, "{} prepared statement", engine.name())
            }
            ConnectorKind::Directory(FileSource::NamedFile) => f.write_str("file"),
            ConnectorKind::Directory(FileSource::DirectoryFile) => f.write_str("directory file"),
            ConnectorKind::Directory(FileSource::DirectoryWalk) => f.write_str("directory walk"),
            ConnectorKind::Program => f.write_str("program"),
            ConnectorKind::Ldap => f.write_str("LDAP"),
            ConnectorKind::Inline => f.write_str("inline text"),
            ConnectorKind::Unresolved => f.write_str("unresolved"),
        }
    }
}

impl ConnectorKind {
    /// Keys only site configuration may set for this kind. Caller values
    /// for them are dropped before the site settings are merged.
    pub fn site_only_keys(&self) -> &'static [&'static str] {
        match self {
            ConnectorKind::Program => &["command", "env", "params", "param filters"],
            ConnectorKind::Directory(_) => &["path"],
            ConnectorKind::Database(..) => &[
                "server",
                "name",
                "user",
                "password",
                "directory",
                "flags",
                "prepared",
                "types",
            ],
            _ => &[],
        }
    }

    /// Parameter naming the target, which must be a configured scope.
    pub fn configured_id_key(&self) -> Option<&'static str> {
        match self {
            ConnectorKind::Program => Some("program"),
            ConnectorKind::Database(..) => Some("db"),
            ConnectorKind::Directory(FileSource::NamedFile) => Some("file"),
            ConnectorKind::Directory(_) => Some("directory"),
            _ => None,
        }
    }
}

/// One resolved invocation: backend kind, effective parameters and the
/// errors collected so far.
#[derive(Debug, Clone)]
pub struct Connector {
    pub entry: EntryPoint,
    pub kind: ConnectorKind,
    pub params: RequestParams,
    pub errors: ErrorList,
}

impl Connector {
    /// Whether the fetch may run: resolved and free of validation errors.
    pub fn is_runnable(&self) -> bool {
        self.kind != ConnectorKind::Unresolved && self.errors.is_empty()
    }

    pub fn push_error(&mut self, err: &ExtDataError) {
        self.errors.push(err.to_string());
    }
}

/// What an executor hands back to the pipeline.
#[derive(Debug)]
pub struct Fetched {
    pub payload: Payload,
    /// Unix time the payload was fetched, possibly long ago when cached.
    pub timestamp: i64,
    pub stale: bool,
    /// Attempts made; 0 when served from the cache.
    pub tries: u32,
    /// Soft error describing a degraded result.
    pub notice: Option<ExtDataError>,
}

impl Fetched {
    pub fn new(payload: Payload, timestamp: i64, tries: u32) -> Self {
        Self {
            payload,
            timestamp,
            stale: false,
            tries,
            notice: None,
        }
    }

    pub fn from_cached(cached: Cached, tries: u32) -> Self {
        Self {
            tries: if cached.from_cache { 0 } else { tries },
            stale: !cached.fresh,
            payload: cached.payload,
            timestamp: cached.timestamp,
            notice: cached.notice,
        }
    }
}

/// Required non-empty parameter.
pub(crate) fn require<'a>(params: &'a RequestParams, key: &str) -> Result<&'a str> {
    params
        .non_empty(key)
        .ok_or_else(|| ExtDataError::MissingParameter(key.to_string()))
}

/// Cache identity of a fetch: its kind, its target and the options that
/// change what comes back.
pub(crate) fn identity(kind: &str, target: &str, params: &RequestParams, options: &[&str]) -> Value {
    let mut selected = Map::new();
    for key in options {
        if let Some(value) = params.get(key) {
            selected.insert(key.to_string(), param_json(value));
        }
    }
    serde_json::json!({
        "kind": kind,
        "target": target,
        "options": selected,
    })
}

/// Options that change how fetched bytes are decoded.
pub(crate) const DECODING_OPTIONS: &[&str] = &["encoding", "encodings", "replacements"];

fn param_json(value: &ParamValue) -> Value {
    match value {
        ParamValue::Flag => Value::Bool(true),
        ParamValue::Text(text) => Value::String(text.clone()),
        ParamValue::List(items) => items.iter().cloned().map(Value::String).collect(),
        ParamValue::Table(table) => table
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect::<Map<String, Value>>()
            .into(),
    }
}
