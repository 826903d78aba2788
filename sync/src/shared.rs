use crate::entry::{CacheEntry, ErasedValue};
use crate::error::SyncError;
use crate::flight::{FetchFuture, Outcome};
use crate::metrics::Metrics;
use crate::policy::FetchPolicy;
use crate::subscriber::SubscriberRegistry;
use crate::task::refresh::RefreshTimer;
use crate::time::Clock;
use crate::TaskSpawner;

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::mem;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures_util::FutureExt;
use parking_lot::Mutex;

/// A map keyed by the caller's opaque string keys.
pub(crate) type KeyMap<V> = HashMap<String, V, ahash::RandomState>;

/// The internal, thread-safe core of the cache.
///
/// Each map has its own lock. No lock is ever held across an `.await` or
/// while a subscriber callback runs.
pub(crate) struct CacheShared {
  pub(crate) entries: Mutex<KeyMap<CacheEntry>>,
  pub(crate) pending: Mutex<KeyMap<Arc<FetchFuture>>>,
  pub(crate) subscribers: Mutex<SubscriberRegistry>,
  pub(crate) timers: Mutex<KeyMap<RefreshTimer>>,
  pub(crate) metrics: Metrics,
  pub(crate) default_policy: FetchPolicy,
  pub(crate) clock: Arc<dyn Clock>,
  pub(crate) spawner: Arc<dyn TaskSpawner>,
}

impl fmt::Debug for CacheShared {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheShared")
      .field("entries", &self.entries.lock().len())
      .field("pending", &self.pending.lock().len())
      .field("timers", &self.timers.lock().len())
      .field("default_policy", &self.default_policy)
      .field("metrics", &self.metrics.snapshot())
      .finish_non_exhaustive()
  }
}

impl Drop for CacheShared {
  fn drop(&mut self) {
    for (_, timer) in self.timers.get_mut().drain() {
      timer.stop();
    }
  }
}

impl CacheShared {
  pub(crate) fn new(
    default_policy: FetchPolicy,
    clock: Arc<dyn Clock>,
    spawner: Arc<dyn TaskSpawner>,
  ) -> Self {
    Self {
      entries: Mutex::new(KeyMap::default()),
      pending: Mutex::new(KeyMap::default()),
      subscribers: Mutex::new(SubscriberRegistry::default()),
      timers: Mutex::new(KeyMap::default()),
      metrics: Metrics::new(),
      default_policy,
      clock,
      spawner,
    }
  }

  /// Starts a fetch for `key`, or joins the one already in flight.
  ///
  /// The fetcher is only invoked when no fetch is pending. The lookup and the
  /// registration of the new `FetchFuture` happen under one lock, so two
  /// callers can never both start a fetch for the same key. The fetcher itself
  /// runs after the lock is released.
  pub(crate) fn fetch<T, F, Fut, E>(shared: &Arc<Self>, key: &str, fetcher: F) -> Arc<FetchFuture>
  where
    T: Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: StdError + Send + Sync + 'static,
  {
    let flight = {
      let mut pending = shared.pending.lock();
      if let Some(flight) = pending.get(key) {
        Metrics::incr(&shared.metrics.fetches_joined);
        tracing::trace!(key = %key, "joined in-flight fetch");
        return flight.clone();
      }
      let flight = Arc::new(FetchFuture::new());
      pending.insert(key.to_owned(), flight.clone());
      flight
    };

    Metrics::incr(&shared.metrics.fetches_started);
    tracing::debug!(key = %key, "fetch started");

    let request = {
      let guard = FetcherGuard {
        shared,
        key,
        flight: &flight,
      };
      let request = fetcher();
      mem::forget(guard);
      request
    };

    // The fetch runs detached from the caller, so a dropped `get` future can
    // never leave the pending slot occupied.
    let task = {
      let shared = shared.clone();
      let key = key.to_owned();
      let flight = flight.clone();
      async move {
        let outcome = match AssertUnwindSafe(request).catch_unwind().await {
          Ok(Ok(value)) => Ok(Arc::new(value) as ErasedValue),
          Ok(Err(err)) => Err(SyncError::fetch(err)),
          Err(_) => Err(SyncError::FetchPanicked { key: key.clone() }),
        };
        shared.settle(&key, &flight, outcome);
      }
    };
    shared.spawner.spawn(Box::pin(task));

    flight
  }

  /// Applies a finished fetch: writes the entry on success, frees the pending
  /// slot unconditionally, notifies subscribers, then wakes joined callers.
  fn settle(&self, key: &str, flight: &Arc<FetchFuture>, outcome: Outcome) {
    match &outcome {
      Ok(value) => {
        let entry = CacheEntry::new(value.clone(), self.clock.now());
        self.entries.lock().insert(key.to_owned(), entry);
        tracing::debug!(key = %key, "fetch succeeded");
      }
      Err(err) => {
        Metrics::incr(&self.metrics.fetches_failed);
        tracing::warn!(key = %key, error = %err, "fetch failed");
      }
    }

    {
      let mut pending = self.pending.lock();
      if pending.get(key).is_some_and(|f| Arc::ptr_eq(f, flight)) {
        pending.remove(key);
      }
    }

    if let Ok(value) = &outcome {
      self.notify(key, value);
    }
    flight.complete(outcome);
  }

  /// Invokes every subscriber of `key`, in registration order.
  pub(crate) fn notify(&self, key: &str, value: &ErasedValue) {
    let callbacks = self.subscribers.lock().callbacks(key);
    for callback in callbacks {
      Metrics::incr(&self.metrics.notifications);
      // A panicking subscriber must not starve the others or the waiters.
      if panic::catch_unwind(AssertUnwindSafe(|| callback(key, value))).is_err() {
        tracing::warn!(key = %key, "subscriber panicked");
      }
    }
  }
}

/// Settles a registered flight as panicked if the fetcher unwinds before
/// handing back its future. Forgotten once the fetcher returns.
struct FetcherGuard<'a> {
  shared: &'a CacheShared,
  key: &'a str,
  flight: &'a Arc<FetchFuture>,
}

impl Drop for FetcherGuard<'_> {
  fn drop(&mut self) {
    let outcome = Err(SyncError::FetchPanicked {
      key: self.key.to_owned(),
    });
    self.shared.settle(self.key, self.flight, outcome);
  }
}
