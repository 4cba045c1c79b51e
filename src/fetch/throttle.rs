//! Keyed rate limiter with reservation semantics.
//!
//! A permitted call reserves its slot (`next allowed = now + interval`)
//! before the wrapped fetch runs, so a failed or slow fetch still counts.
//! A rejected call emits a [`RetryJob`] and fails with
//! [`ExtDataError::Throttled`].

use indexmap::IndexMap;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::jobs::{JobQueue, RetryJob};
use super::lock::lock_exclusive;
use crate::error::{ExtDataError, Result};
use crate::ui;
use crate::utils::urls;

const LOCK_FILE: &str = ".throttle.lock";

pub trait ThrottleStore: Send + Sync {
    /// Unix time before which calls under `key` are rejected.
    fn next_allowed(&self, key: &str) -> Result<Option<i64>>;
    fn reserve(&self, key: &str, next_allowed: i64) -> Result<()>;
    fn clear(&self) -> Result<usize>;
}

/// Expand `$host$` and `$2nd_lvl_domain$` in a throttle key template.
pub fn expand_key(template: &str, url: Option<&str>) -> String {
    let host = url.and_then(urls::host).unwrap_or_default();
    let domain = urls::second_level_domain(&host);
    template
        .replace("$host$", &host)
        .replace("$2nd_lvl_domain$", &domain)
}

pub fn call_throttled<T, F>(
    store: &dyn ThrottleStore,
    queue: &dyn JobQueue,
    key: &str,
    interval: i64,
    target: &str,
    now: i64,
    fetch: F,
) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    if let Some(next_allowed) = store.next_allowed(key)?
        && now < next_allowed
    {
        ui::verbose(&format!(
            "Throttled '{}' under key '{}' for {}s",
            target,
            key,
            next_allowed - now
        ));
        queue.push(RetryJob {
            target: target.to_string(),
            not_before: next_allowed,
        })?;
        return Err(ExtDataError::Throttled {
            target: target.to_string(),
            not_before: next_allowed,
            stale_served: false,
        });
    }

    store.reserve(key, now + interval)?;
    fetch()
}

/// Reservations persisted as one JSON map, rewritten under a lock.
pub struct FileThrottleStore {
    path: PathBuf,
}

impl FileThrottleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    fn load(&self) -> IndexMap<String, i64> {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }

    fn save(&self, map: &IndexMap<String, i64>) -> Result<()> {
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_string_pretty(map)?).map_err(|e| ExtDataError::IoError {
            path: tmp.clone(),
            source: e,
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| ExtDataError::IoError {
            path: self.path.clone(),
            source: e,
        })
    }
}

impl ThrottleStore for FileThrottleStore {
    fn next_allowed(&self, key: &str) -> Result<Option<i64>> {
        Ok(self.load().get(key).copied())
    }

    fn reserve(&self, key: &str, next_allowed: i64) -> Result<()> {
        let _lock = lock_exclusive(self.dir(), LOCK_FILE)?;
        let mut map = self.load();
        map.insert(key.to_string(), next_allowed);
        self.save(&map)
    }

    fn clear(&self) -> Result<usize> {
        if !self.path.exists() {
            return Ok(0);
        }
        let _lock = lock_exclusive(self.dir(), LOCK_FILE)?;
        let removed = self.load().len();
        fs::remove_file(&self.path).map_err(|e| ExtDataError::IoError {
            path: self.path.clone(),
            source: e,
        })?;
        Ok(removed)
    }
}

#[derive(Debug, Default)]
pub struct MemoryThrottleStore {
    slots: Mutex<HashMap<String, i64>>,
}

impl MemoryThrottleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ThrottleStore for MemoryThrottleStore {
    fn next_allowed(&self, key: &str) -> Result<Option<i64>> {
        Ok(self
            .slots
            .lock()
            .map_err(|e| ExtDataError::LockError(e.to_string()))?
            .get(key)
            .copied())
    }

    fn reserve(&self, key: &str, next_allowed: i64) -> Result<()> {
        self.slots
            .lock()
            .map_err(|e| ExtDataError::LockError(e.to_string()))?
            .insert(key.to_string(), next_allowed);
        Ok(())
    }

    fn clear(&self) -> Result<usize> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|e| ExtDataError::LockError(e.to_string()))?;
        let removed = slots.len();
        slots.clear();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests;
