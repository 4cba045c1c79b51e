use super::*;
use crate::fetch::jobs::MemoryJobQueue;
use std::cell::Cell;
use tempfile::tempdir;

#[test]
fn back_to_back_calls_run_once() {
    let store = MemoryThrottleStore::new();
    let queue = MemoryJobQueue::new();
    let calls = Cell::new(0);
    let fetch = || {
        calls.set(calls.get() + 1);
        Ok("body")
    };

    let first = call_throttled(&store, &queue, "api", 10, "https://x.org/a", 1000, fetch);
    let second = call_throttled(&store, &queue, "api", 10, "https://x.org/b", 1000, fetch);

    assert_eq!(first.unwrap(), "body");
    assert!(matches!(
        second,
        Err(ExtDataError::Throttled {
            not_before: 1010,
            stale_served: false,
            ..
        })
    ));
    assert_eq!(calls.get(), 1);
    assert_eq!(
        queue.jobs(),
        vec![RetryJob {
            target: "https://x.org/b".into(),
            not_before: 1010
        }]
    );
}

#[test]
fn calls_are_permitted_once_the_interval_passes() {
    let store = MemoryThrottleStore::new();
    let queue = MemoryJobQueue::new();
    call_throttled(&store, &queue, "k", 10, "t", 100, || Ok(())).unwrap();
    assert!(call_throttled(&store, &queue, "k", 10, "t", 109, || Ok(())).is_err());
    assert!(call_throttled(&store, &queue, "k", 10, "t", 110, || Ok(())).is_ok());
}

#[test]
fn reservation_holds_even_when_fetch_fails() {
    let store = MemoryThrottleStore::new();
    let queue = MemoryJobQueue::new();
    let failed: Result<()> = call_throttled(&store, &queue, "k", 30, "t", 0, || {
        Err(ExtDataError::Other("boom".into()))
    });
    assert!(failed.is_err());
    assert_eq!(store.next_allowed("k").unwrap(), Some(30));
}

#[test]
fn keys_are_independent() {
    let store = MemoryThrottleStore::new();
    let queue = MemoryJobQueue::new();
    call_throttled(&store, &queue, "a", 60, "t", 0, || Ok(())).unwrap();
    assert!(call_throttled(&store, &queue, "b", 60, "t", 0, || Ok(())).is_ok());
}

#[test]
fn key_templates_expand_from_url() {
    let url = Some("https://api.data.example.org/v1?q=x");
    assert_eq!(expand_key("$host$", url), "api.data.example.org");
    assert_eq!(expand_key("site:$2nd_lvl_domain$", url), "site:example.org");
    assert_eq!(expand_key("fixed", None), "fixed");
}

#[test]
fn file_store_persists_reservations() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state").join("throttle.json");
    let store = FileThrottleStore::new(&path);
    assert_eq!(store.next_allowed("k").unwrap(), None);
    store.reserve("k", 42).unwrap();
    store.reserve("j", 7).unwrap();

    let reopened = FileThrottleStore::new(&path);
    assert_eq!(reopened.next_allowed("k").unwrap(), Some(42));
    assert_eq!(reopened.clear().unwrap(), 2);
    assert_eq!(reopened.next_allowed("k").unwrap(), None);
}
