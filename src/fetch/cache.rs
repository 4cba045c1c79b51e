//! Read-through cache of fetched payloads with stale-serve fallback.

use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::lock::lock_exclusive;
use crate::core::Payload;
use crate::error::{ExtDataError, Result};
use crate::ui;

/// Keys longer than this are replaced by their SHA-256 digest.
pub const MAX_KEY_LEN: usize = 200;

const LOCK_FILE: &str = ".cache.lock";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub payload: Payload,
    /// Unix time the payload was fetched.
    pub timestamp: i64,
}

impl CacheEntry {
    pub fn is_fresh(&self, ttl: i64, now: i64) -> bool {
        is_fresh(self.timestamp, ttl, now)
    }
}

pub fn is_fresh(timestamp: i64, ttl: i64, now: i64) -> bool {
    ttl != 0 && now - timestamp <= ttl
}

pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Option<CacheEntry>;
    /// Replace any entry under the same key.
    fn put(&self, entry: &CacheEntry) -> Result<()>;
    /// Remove every entry, returning how many were removed.
    fn clear(&self) -> Result<usize>;
}

/// Deterministic key for a fetch: canonical JSON of the identifying
/// arguments, hashed when long.
pub fn cache_key(identity: &Value) -> String {
    let canonical = canonical_json(identity);
    if canonical.len() > MAX_KEY_LEN {
        hex::encode(Sha256::digest(canonical.as_bytes()))
    } else {
        canonical
    }
}

/// JSON text with object keys sorted at every level.
fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{}:{}", Value::String(k.clone()), canonical_json(&map[k])))
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        other => other.to_string(),
    }
}

/// Outcome of a cached call.
#[derive(Debug)]
pub struct Cached {
    pub payload: Payload,
    pub timestamp: i64,
    pub fresh: bool,
    pub from_cache: bool,
    /// Soft error describing a degraded result (stale served).
    pub notice: Option<ExtDataError>,
}

/// Serve a fresh cached payload, otherwise call `fetch` and store its
/// result. When `fetch` fails and an entry exists, the stale payload is
/// served if `allow_stale` is set, or if the failure is a throttle
/// rejection (no call was made). A `ttl` of 0 bypasses the cache.
pub fn call_cached<F>(
    store: &dyn CacheStore,
    key: &str,
    ttl: i64,
    allow_stale: bool,
    now: i64,
    fetch: F,
) -> Result<Cached>
where
    F: FnOnce() -> Result<Payload>,
{
    if ttl == 0 {
        return fetch().map(|payload| Cached {
            payload,
            timestamp: now,
            fresh: true,
            from_cache: false,
            notice: None,
        });
    }

    let existing = store.get(key);
    if let Some(entry) = &existing
        && entry.is_fresh(ttl, now)
    {
        ui::verbose(&format!("Cache hit ({}s old)", now - entry.timestamp));
        return Ok(Cached {
            payload: entry.payload.clone(),
            timestamp: entry.timestamp,
            fresh: true,
            from_cache: true,
            notice: None,
        });
    }

    match fetch() {
        Ok(payload) => {
            let entry = CacheEntry {
                key: key.to_string(),
                payload,
                timestamp: now,
            };
            if let Err(e) = store.put(&entry) {
                ui::warning(&format!("Could not write cache entry: {}", e));
            }
            Ok(Cached {
                payload: entry.payload,
                timestamp: now,
                fresh: true,
                from_cache: false,
                notice: None,
            })
        }
        Err(err) => {
            let throttled = matches!(err, ExtDataError::Throttled { .. });
            match existing {
                Some(entry) if allow_stale || throttled => {
                    let notice = match err {
                        ExtDataError::Throttled {
                            target, not_before, ..
                        } => ExtDataError::Throttled {
                            target,
                            not_before,
                            stale_served: true,
                        },
                        other => ExtDataError::StaleServed {
                            target: key.to_string(),
                            reason: other.to_string(),
                        },
                    };
                    ui::warning(&notice.to_string());
                    Ok(Cached {
                        payload: entry.payload,
                        timestamp: entry.timestamp,
                        fresh: false,
                        from_cache: true,
                        notice: Some(notice),
                    })
                }
                _ => Err(err),
            }
        }
    }
}

/// One JSON file per hashed key.
pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        self.dir.join(format!("{}.json", digest))
    }
}

impl CacheStore for FileCacheStore {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        let path = self.path_for(key);
        let content = fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<CacheEntry>(&content) {
            Ok(entry) if entry.key == key => Some(entry),
            Ok(_) => None,
            Err(e) => {
                ui::verbose(&format!("Ignoring unreadable cache file {}: {}", path.display(), e));
                None
            }
        }
    }

    fn put(&self, entry: &CacheEntry) -> Result<()> {
        let _lock = lock_exclusive(&self.dir, LOCK_FILE)?;
        let path = self.path_for(&entry.key);
        let tmp = path.with_extension("tmp");
        let json = serde_json::to_string(entry)?;
        fs::write(&tmp, json).map_err(|e| ExtDataError::IoError {
            path: tmp.clone(),
            source: e,
        })?;
        fs::rename(&tmp, &path).map_err(|e| ExtDataError::IoError {
            path: path.clone(),
            source: e,
        })?;
        Ok(())
    }

    fn clear(&self) -> Result<usize> {
        if !self.dir.exists() {
            return Ok(0);
        }
        let _lock = lock_exclusive(&self.dir, LOCK_FILE)?;
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir).map_err(|e| ExtDataError::IoError {
            path: self.dir.clone(),
            source: e,
        })? {
            let path = entry?.path();
            if path.extension().and_then(std::ffi::OsStr::to_str) == Some("json") {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Entries in the `ed_url_cache` table.
pub struct SqliteCacheStore {
    conn: Mutex<Connection>,
}

impl SqliteCacheStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ExtDataError::IoError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS ed_url_cache (
                hashed_key TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                request_time INTEGER NOT NULL
            )",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ExtDataError::LockError(e.to_string()))
    }
}

impl CacheStore for SqliteCacheStore {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        let conn = self.conn().ok()?;
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT payload, request_time FROM ed_url_cache WHERE hashed_key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .unwrap_or_else(|e| {
                ui::verbose(&format!("Cache lookup failed: {}", e));
                None
            });
        let (payload, timestamp) = row?;
        let payload = serde_json::from_str(&payload).ok()?;
        Some(CacheEntry {
            key: key.to_string(),
            payload,
            timestamp,
        })
    }

    fn put(&self, entry: &CacheEntry) -> Result<()> {
        let payload = serde_json::to_string(&entry.payload)?;
        self.conn()?.execute(
            "INSERT OR REPLACE INTO ed_url_cache (hashed_key, payload, request_time) VALUES (?1, ?2, ?3)",
            params![entry.key, payload, entry.timestamp],
        )?;
        Ok(())
    }

    fn clear(&self) -> Result<usize> {
        Ok(self.conn()?.execute("DELETE FROM ed_url_cache", [])?)
    }
}

#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn put(&self, entry: &CacheEntry) -> Result<()> {
        self.entries
            .lock()
            .map_err(|e| ExtDataError::LockError(e.to_string()))?
            .insert(entry.key.clone(), entry.clone());
        Ok(())
    }

    fn clear(&self) -> Result<usize> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| ExtDataError::LockError(e.to_string()))?;
        let removed = entries.len();
        entries.clear();
        Ok(removed)
    }
}
