use crate::builder::SyncCacheBuilder;
use crate::entry::{CacheEntry, EntryInfo, ErasedValue};
use crate::error::{BuildError, SyncError};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::policy::{FetchPolicy, Freshness};
use crate::shared::CacheShared;
use crate::subscriber::{self, Subscription};
use crate::task::refresh::RefreshTimer;

use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// A stale-while-revalidate cache in front of asynchronous data sources.
///
/// `SyncCache` is a cheap, cloneable handle; all clones share the same
/// entries, in-flight fetches, subscribers and refresh timers. Independent
/// caches share nothing.
///
/// Values are typed per call. A key written as `T` must be read as `T`;
/// reading it as another type yields [`SyncError::TypeMismatch`].
#[derive(Debug, Clone)]
pub struct SyncCache {
  pub(crate) shared: Arc<CacheShared>,
}

fn downcast<T>(key: &str, value: ErasedValue) -> Result<Arc<T>, SyncError>
where
  T: Send + Sync + 'static,
{
  value
    .downcast::<T>()
    .map_err(|_| SyncError::type_mismatch::<T>(key))
}

impl SyncCache {
  /// Returns a builder for configuring a new cache.
  pub fn builder() -> SyncCacheBuilder {
    SyncCacheBuilder::new()
  }

  /// Creates a cache with default settings. Requires a Tokio runtime unless
  /// the `tokio` feature is disabled, in which case use [`SyncCache::builder`]
  /// and supply a spawner.
  pub fn new() -> Result<Self, BuildError> {
    SyncCacheBuilder::new().build()
  }

  /// Reads `key`, fetching it with `fetcher` as `policy` dictates.
  ///
  /// - No entry, or older than the stale window: waits for a fetch.
  /// - Inside the fresh window: returns the cached value, no fetch.
  /// - Inside the stale window: returns the cached value now and refreshes
  ///   it in the background.
  ///
  /// A fetch already in flight for `key` is joined rather than duplicated; in
  /// that case `fetcher` is never called. If a waited-on fetch fails while
  /// the key still has a cached value, that value is returned instead of the
  /// error.
  pub async fn get<T, F, Fut, E>(
    &self,
    key: &str,
    fetcher: F,
    policy: &FetchPolicy,
  ) -> Result<Arc<T>, SyncError>
  where
    T: Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: StdError + Send + Sync + 'static,
  {
    let now = self.shared.clock.now();
    let cached = {
      let mut entries = self.shared.entries.lock();
      entries
        .get_mut(key)
        .and_then(|entry| match policy.classify(entry.age(now)) {
          Freshness::Fresh => Some((entry.value.clone(), Freshness::Fresh)),
          Freshness::Stale => {
            // A mistyped read must not mark the entry.
            if entry.value.is::<T>() {
              entry.stale = true;
            }
            Some((entry.value.clone(), Freshness::Stale))
          }
          Freshness::Expired => None,
        })
    };

    match cached {
      Some((value, Freshness::Stale)) => {
        // Checked before revalidating so a mistyped read cannot replace the
        // entry with a value of its own type.
        let value = downcast::<T>(key, value)?;
        Metrics::incr(&self.shared.metrics.stale_hits);
        tracing::trace!(key = %key, "stale hit; revalidating");
        let _ = CacheShared::fetch(&self.shared, key, fetcher);
        return Ok(value);
      }
      Some((value, _)) => {
        Metrics::incr(&self.shared.metrics.fresh_hits);
        tracing::trace!(key = %key, "fresh hit");
        return downcast(key, value);
      }
      None => Metrics::incr(&self.shared.metrics.misses),
    }

    let flight = CacheShared::fetch(&self.shared, key, fetcher);
    match (&*flight).await {
      Ok(value) => downcast(key, value),
      Err(err) => {
        let fallback = self
          .shared
          .entries
          .lock()
          .get(key)
          .map(|entry| entry.value.clone());
        match fallback {
          Some(value) => {
            Metrics::incr(&self.shared.metrics.fallbacks);
            tracing::warn!(key = %key, error = %err, "fetch failed; serving cached value");
            downcast(key, value)
          }
          None => Err(err),
        }
      }
    }
  }

  /// Like [`SyncCache::get`], using the cache's default policy.
  pub async fn get_with_default<T, F, Fut, E>(&self, key: &str, fetcher: F) -> Result<Arc<T>, SyncError>
  where
    T: Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: StdError + Send + Sync + 'static,
  {
    let policy = self.shared.default_policy;
    self.get(key, fetcher, &policy).await
  }

  /// Registers `callback` to receive the value of `key` after every
  /// successful fetch and every optimistic update. Does not fetch.
  pub fn subscribe<T, C>(&self, key: &str, callback: C) -> Subscription
  where
    T: Send + Sync + 'static,
    C: Fn(Arc<T>) + Send + Sync + 'static,
  {
    let id = self
      .shared
      .subscribers
      .lock()
      .insert(key, subscriber::erase::<T, C>(callback));
    tracing::debug!(key = %key, id, "subscriber added");
    Subscription {
      shared: Arc::downgrade(&self.shared),
      key: key.to_owned(),
      id,
    }
  }

  /// Number of live subscriptions for `key`.
  pub fn subscriber_count(&self, key: &str) -> usize {
    self.shared.subscribers.lock().count(key)
  }

  /// Re-fetches `key` every `interval`, replacing any timer already running
  /// for it. Results go through the normal fetch path (entry update and
  /// subscriber notification); failures are logged and the schedule
  /// continues.
  pub fn start_auto_refresh<T, F, Fut, E>(
    &self,
    key: &str,
    fetcher: F,
    interval: Duration,
  ) -> Result<(), SyncError>
  where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: StdError + Send + Sync + 'static,
  {
    if interval.is_zero() {
      return Err(SyncError::InvalidInterval);
    }

    let mut timers = self.shared.timers.lock();
    if let Some(previous) = timers.remove(key) {
      previous.stop();
      tracing::debug!(key = %key, "replaced auto-refresh timer");
    }
    let timer = RefreshTimer::spawn(&self.shared, key.to_owned(), fetcher, interval);
    timers.insert(key.to_owned(), timer);
    tracing::debug!(key = %key, ?interval, "auto-refresh started");
    Ok(())
  }

  /// Cancels the auto-refresh timer for `key`. Returns false if none was
  /// running.
  pub fn stop_auto_refresh(&self, key: &str) -> bool {
    match self.shared.timers.lock().remove(key) {
      Some(timer) => {
        timer.stop();
        tracing::debug!(key = %key, "auto-refresh stopped");
        true
      }
      None => false,
    }
  }

  /// The interval of the running auto-refresh timer for `key`, if any.
  pub fn auto_refresh_interval(&self, key: &str) -> Option<Duration> {
    self.shared.timers.lock().get(key).map(RefreshTimer::interval)
  }

  /// Removes the entry for `key`. In-flight fetches and timers are left
  /// alone; the next `get` waits for a fresh fetch.
  pub fn invalidate(&self, key: &str) -> bool {
    let removed = self.shared.entries.lock().remove(key).is_some();
    if removed {
      Metrics::incr(&self.shared.metrics.invalidations);
      tracing::debug!(key = %key, "entry invalidated");
    }
    removed
  }

  /// Removes every entry. Subscribers, timers and in-flight fetches are kept.
  pub fn clear(&self) {
    let mut entries = self.shared.entries.lock();
    tracing::debug!(count = entries.len(), "cache cleared");
    entries.clear();
  }

  /// Applies `updater` to the cached value of `key` without fetching.
  ///
  /// The result becomes the new value, counted as just fetched, and is pushed
  /// to subscribers. Returns `Ok(false)` and changes nothing when `key` has no
  /// entry.
  pub fn optimistic_update<T, U>(&self, key: &str, updater: U) -> Result<bool, SyncError>
  where
    T: Send + Sync + 'static,
    U: FnOnce(&T) -> T,
  {
    let current = match self.shared.entries.lock().get(key) {
      Some(entry) => entry.value.clone(),
      None => return Ok(false),
    };
    let current = downcast::<T>(key, current)?;

    // The updater runs unlocked; a concurrent fetch may land in between and
    // is then overwritten (last write wins).
    let next: ErasedValue = Arc::new(updater(&current));
    let now = self.shared.clock.now();
    {
      let mut entries = self.shared.entries.lock();
      match entries.get_mut(key) {
        Some(entry) => *entry = CacheEntry::new(next.clone(), now),
        None => return Ok(false),
      }
    }

    Metrics::incr(&self.shared.metrics.optimistic_updates);
    tracing::debug!(key = %key, "optimistic update applied");
    self.shared.notify(key, &next);
    Ok(true)
  }

  /// Returns the cached value for `key` regardless of its age. Never fetches.
  ///
  /// Returns `None` when the key is absent or holds a value of another type.
  pub fn get_cached<T>(&self, key: &str) -> Option<Arc<T>>
  where
    T: Send + Sync + 'static,
  {
    let value = self.shared.entries.lock().get(key)?.value.clone();
    value.downcast::<T>().ok()
  }

  /// Age and stale flag of the entry for `key`.
  pub fn entry_info(&self, key: &str) -> Option<EntryInfo> {
    let now = self.shared.clock.now();
    self.shared.entries.lock().get(key).map(|entry| entry.info(now))
  }

  /// Whether a fetch for `key` is currently in flight.
  pub fn is_fetching(&self, key: &str) -> bool {
    self.shared.pending.lock().contains_key(key)
  }

  /// Stops every auto-refresh timer and drops every subscription.
  ///
  /// Cached entries and in-flight fetches are untouched. Safe to call more
  /// than once.
  pub fn cleanup(&self) {
    let timers: Vec<_> = self.shared.timers.lock().drain().collect();
    let stopped = timers.len();
    for (_, timer) in timers {
      timer.stop();
    }
    self.shared.subscribers.lock().clear();
    tracing::debug!(timers = stopped, "cache cleaned up");
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.shared.metrics.snapshot()
  }

  /// The policy used by [`SyncCache::get_with_default`].
  pub fn default_policy(&self) -> FetchPolicy {
    self.shared.default_policy
  }
}
