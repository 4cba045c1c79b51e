//! Backend clients and shared fetch state a facade runs with.

use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

use super::DbEngine;
use crate::error::{ExtDataError, Result};
use crate::fetch::FetchState;
use crate::fetch::cache::{CacheStore, FileCacheStore, MemoryCacheStore, SqliteCacheStore};
use crate::fetch::clock::{Clock, SystemClock};
use crate::fetch::jobs::{JobQueue, NullJobQueue};
use crate::fetch::throttle::{FileThrottleStore, MemoryThrottleStore, ThrottleStore};
use crate::utils::paths;

pub use super::database::{DatabaseClient, SqliteClient};
pub use super::http::{HttpTransport, ReqwestTransport};
pub use super::ldap::LdapClient;

/// Where a persistent cache lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CacheBackend {
    /// One JSON file per entry in the cache directory.
    #[default]
    Files,
    /// A single SQLite table.
    Sqlite,
}

pub struct Services {
    pub http: Arc<dyn HttpTransport>,
    databases: HashMap<DbEngine, Arc<dyn DatabaseClient>>,
    ldap: Option<Arc<dyn LdapClient>>,
    pub cache: Arc<dyn CacheStore>,
    pub throttle: Arc<dyn ThrottleStore>,
    pub jobs: Arc<dyn JobQueue>,
    pub clock: Arc<dyn Clock>,
}

impl Services {
    /// Real network and SQLite clients with process-local cache and
    /// throttle state.
    pub fn in_memory() -> Self {
        Self {
            http: Arc::new(ReqwestTransport),
            databases: HashMap::from([(
                DbEngine::Sqlite,
                Arc::new(SqliteClient) as Arc<dyn DatabaseClient>,
            )]),
            ldap: None,
            cache: Arc::new(MemoryCacheStore::new()),
            throttle: Arc::new(MemoryThrottleStore::new()),
            jobs: Arc::new(NullJobQueue),
            clock: Arc::new(SystemClock),
        }
    }

    /// Cache and throttle state kept on disk across runs.
    pub fn persistent(backend: CacheBackend) -> Result<Self> {
        let cache_dir = paths::cache_dir()?;
        fs::create_dir_all(&cache_dir).map_err(|e| ExtDataError::IoError {
            path: cache_dir.clone(),
            source: e,
        })?;
        let throttle_file = paths::throttle_file()?;
        if let Some(parent) = throttle_file.parent() {
            fs::create_dir_all(parent).map_err(|e| ExtDataError::IoError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let cache: Arc<dyn CacheStore> = match backend {
            CacheBackend::Files => Arc::new(FileCacheStore::new(cache_dir)),
            CacheBackend::Sqlite => Arc::new(SqliteCacheStore::open(&paths::cache_db_file()?)?),
        };

        Ok(Self {
            cache,
            throttle: Arc::new(FileThrottleStore::new(throttle_file)),
            ..Self::in_memory()
        })
    }

    pub fn with_http(mut self, http: Arc<dyn HttpTransport>) -> Self {
        self.http = http;
        self
    }

    pub fn with_database(mut self, engine: DbEngine, client: Arc<dyn DatabaseClient>) -> Self {
        self.databases.insert(engine, client);
        self
    }

    pub fn with_ldap(mut self, client: Arc<dyn LdapClient>) -> Self {
        self.ldap = Some(client);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_throttle(mut self, throttle: Arc<dyn ThrottleStore>) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_jobs(mut self, jobs: Arc<dyn JobQueue>) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn database(&self, engine: DbEngine) -> Result<&dyn DatabaseClient> {
        self.databases
            .get(&engine)
            .map(|client| client.as_ref())
            .ok_or_else(|| {
                ExtDataError::ConfigError(format!("No client registered for {} databases", engine.name()))
            })
    }

    pub fn ldap(&self) -> Result<&dyn LdapClient> {
        self.ldap
            .as_deref()
            .ok_or_else(|| ExtDataError::ConfigError("No LDAP client registered".to_string()))
    }

    pub fn fetch_state(&self) -> FetchState<'_> {
        FetchState {
            cache: self.cache.as_ref(),
            throttle: self.throttle.as_ref(),
            jobs: self.jobs.as_ref(),
            clock: self.clock.as_ref(),
        }
    }
}

impl Default for Services {
    fn default() -> Self {
        Self::in_memory()
    }
}
