//! `extdata cache clear`: drop cached responses and, on request, throttle
//! reservations.

use crate::connectors::clients::{CacheBackend, Services};
use crate::error::Result;
use crate::fetch::cache::CacheStore;
use crate::fetch::throttle::ThrottleStore;
use crate::ui as output;

pub struct CacheOptions {
    pub cache_store: CacheBackend,
    /// Also reset throttle reservations.
    pub throttle: bool,
}

pub fn clear(options: CacheOptions) -> Result<()> {
    let services = Services::persistent(options.cache_store)?;
    clear_services(&services, options.throttle)
}

pub fn clear_services(services: &Services, throttle: bool) -> Result<()> {
    let removed = services.cache.clear()?;
    output::success(&format!("Removed {} cached response(s)", removed));

    if throttle {
        let reset = services.throttle.clear()?;
        output::success(&format!("Reset {} throttle reservation(s)", reset));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Document, Payload};
    use crate::fetch::cache::{CacheEntry, MemoryCacheStore};
    use crate::fetch::throttle::MemoryThrottleStore;
    use std::sync::Arc;

    #[test]
    fn clears_cache_and_optionally_throttle() {
        let cache = Arc::new(MemoryCacheStore::new());
        let throttle = Arc::new(MemoryThrottleStore::new());
        cache
            .put(&CacheEntry {
                key: "k".into(),
                payload: Payload::Document(Document::text(None, "x")),
                timestamp: 1,
            })
            .unwrap();
        throttle.reserve("example.org", 99).unwrap();

        let services = Services::in_memory()
            .with_cache(cache.clone())
            .with_throttle(throttle.clone());

        clear_services(&services, false).unwrap();
        assert!(cache.is_empty());
        assert_eq!(throttle.next_allowed("example.org").unwrap(), Some(99));

        clear_services(&services, true).unwrap();
        assert_eq!(throttle.next_allowed("example.org").unwrap(), None);
    }
}
