//! Fetch pipeline: backend calls wrapped in the cache and throttle gate.

pub mod cache;
pub mod clock;
pub mod jobs;
mod lock;
pub mod throttle;

use serde_json::Value;

use crate::core::Payload;
use crate::error::{ExtDataError, Result};
use crate::params::RequestParams;
use cache::{CacheStore, Cached, call_cached};
use clock::Clock;
use jobs::JobQueue;
use throttle::{ThrottleStore, call_throttled, expand_key};

/// Shared state the pipeline reads and writes.
pub struct FetchState<'a> {
    pub cache: &'a dyn CacheStore,
    pub throttle: &'a dyn ThrottleStore,
    pub jobs: &'a dyn JobQueue,
    pub clock: &'a dyn Clock,
}

/// Caching and throttling settings of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPolicy {
    /// 0 disables caching.
    pub cache_seconds: i64,
    pub use_stale_cache: bool,
    /// Expanded throttle key and interval in seconds.
    pub throttle: Option<(String, i64)>,
}

impl FetchPolicy {
    /// Read `cache seconds`, `min cache seconds`, `use stale cache`,
    /// `throttle key` and `throttle interval`.
    pub fn from_params(params: &RequestParams, url: Option<&str>) -> Self {
        let mut cache_seconds = params.number("cache seconds").unwrap_or(0).max(0);
        if let Some(min) = params.number("min cache seconds")
            && cache_seconds > 0
        {
            cache_seconds = cache_seconds.max(min);
        }

        let throttle = params
            .non_empty("throttle key")
            .map(|template| expand_key(template, url))
            .filter(|key| !key.is_empty())
            .zip(params.number("throttle interval").filter(|i| *i > 0));

        Self {
            cache_seconds,
            use_stale_cache: params.flag("use stale cache"),
            throttle,
        }
    }

    /// A policy that neither caches nor throttles.
    pub fn uncached() -> Self {
        Self {
            cache_seconds: 0,
            use_stale_cache: false,
            throttle: None,
        }
    }
}

impl FetchState<'_> {
    /// Run `fetch` through the cache (outer) and throttle gate (inner).
    /// `identity` names the fetch for the cache key; `target` is what a
    /// retry job would fetch again.
    pub fn run<F>(&self, identity: &Value, target: &str, policy: &FetchPolicy, fetch: F) -> Result<Cached>
    where
        F: FnOnce() -> Result<Payload>,
    {
        let now = self.clock.now();
        let key = cache::cache_key(identity);

        let gated = || match &policy.throttle {
            Some((throttle_key, interval)) => call_throttled(
                self.throttle,
                self.jobs,
                throttle_key,
                *interval,
                target,
                now,
                fetch,
            ),
            None => fetch(),
        };

        call_cached(
            self.cache,
            &key,
            policy.cache_seconds,
            policy.use_stale_cache,
            now,
            gated,
        )
    }

    /// Like [`run`](Self::run) but never cached: POST requests.
    pub fn run_uncached<F>(&self, target: &str, policy: &FetchPolicy, fetch: F) -> Result<Payload>
    where
        F: FnOnce() -> Result<Payload>,
    {
        match &policy.throttle {
            Some((key, interval)) => call_throttled(
                self.throttle,
                self.jobs,
                key,
                *interval,
                target,
                self.clock.now(),
                fetch,
            ),
            None => fetch(),
        }
    }
}

/// Whether an error should count as a failed attempt worth retrying.
pub fn is_retryable(err: &ExtDataError) -> bool {
    matches!(err, ExtDataError::Connection { .. })
}
