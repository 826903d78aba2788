#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fibre_sync::{FetchPolicy, ManualClock, SyncCache};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::{sleep, Instant};

/// The error every test fetcher fails with.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("backend unavailable: {0}")]
pub struct BackendError(pub &'static str);

pub fn ms(n: u64) -> Duration {
  Duration::from_millis(n)
}

/// Fresh for 1000ms, stale until 5000ms.
pub fn policy() -> FetchPolicy {
  FetchPolicy::new(ms(1000), ms(5000)).unwrap()
}

/// A cache driven by a manual clock that starts at zero.
pub fn build_test_cache() -> (SyncCache, Arc<ManualClock>) {
  let clock = Arc::new(ManualClock::new());
  let cache = SyncCache::builder().clock(clock.clone()).build().unwrap();
  (cache, clock)
}

/// A fetcher that returns `value` immediately and counts its invocations.
pub fn counted<T>(
  calls: &Arc<AtomicUsize>,
  value: T,
) -> impl FnOnce() -> std::future::Ready<Result<T, BackendError>> {
  let calls = calls.clone();
  move || {
    calls.fetch_add(1, Ordering::SeqCst);
    std::future::ready(Ok(value))
  }
}

/// A fetcher that fails immediately.
pub fn failing<T>(
  calls: &Arc<AtomicUsize>,
  reason: &'static str,
) -> impl FnOnce() -> std::future::Ready<Result<T, BackendError>> {
  let calls = calls.clone();
  move || {
    calls.fetch_add(1, Ordering::SeqCst);
    std::future::ready(Err(BackendError(reason)))
  }
}

/// A fetcher that only resolves once `gate` is notified.
pub fn gated<T: Send + 'static>(
  gate: &Arc<Notify>,
  calls: &Arc<AtomicUsize>,
  value: T,
) -> impl FnOnce() -> std::pin::Pin<Box<dyn Future<Output = Result<T, BackendError>> + Send>> {
  let gate = gate.clone();
  let calls = calls.clone();
  move || {
    calls.fetch_add(1, Ordering::SeqCst);
    Box::pin(async move {
      gate.notified().await;
      Ok(value)
    })
  }
}

/// Collects every value a subscriber receives.
pub fn recorder<T: Clone + Send + Sync + 'static>() -> (Arc<Mutex<Vec<T>>>, impl Fn(Arc<T>) + Send + Sync + 'static) {
  let seen = Arc::new(Mutex::new(Vec::new()));
  let sink = seen.clone();
  (seen, move |value: Arc<T>| sink.lock().push((*value).clone()))
}

/// Polls `condition` until it holds, panicking after two seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
  let deadline = Instant::now() + Duration::from_secs(2);
  while !condition() {
    assert!(Instant::now() < deadline, "condition not met within 2s");
    sleep(ms(5)).await;
  }
}
