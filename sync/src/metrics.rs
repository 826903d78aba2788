use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_utils::CachePadded;

/// A thread-safe, internal metrics collector for the cache.
/// All fields are atomic to allow for lock-free updates.
#[derive(Debug)]
pub struct Metrics {
  // --- Read Outcomes ---
  pub(crate) fresh_hits: CachePadded<AtomicU64>,
  pub(crate) stale_hits: CachePadded<AtomicU64>,
  pub(crate) misses: CachePadded<AtomicU64>,
  pub(crate) fallbacks: CachePadded<AtomicU64>,

  // --- Fetches ---
  pub(crate) fetches_started: CachePadded<AtomicU64>,
  pub(crate) fetches_joined: CachePadded<AtomicU64>,
  pub(crate) fetches_failed: CachePadded<AtomicU64>,
  pub(crate) refresh_ticks: CachePadded<AtomicU64>,

  // --- Mutations ---
  pub(crate) optimistic_updates: CachePadded<AtomicU64>,
  pub(crate) invalidations: CachePadded<AtomicU64>,
  pub(crate) notifications: CachePadded<AtomicU64>,

  // --- Timestamps for Uptime ---
  created_at: Instant,
}

// Manual implementation of Default to handle the non-default `Instant`.
impl Default for Metrics {
  fn default() -> Self {
    Self {
      fresh_hits: CachePadded::new(AtomicU64::new(0)),
      stale_hits: CachePadded::new(AtomicU64::new(0)),
      misses: CachePadded::new(AtomicU64::new(0)),
      fallbacks: CachePadded::new(AtomicU64::new(0)),
      fetches_started: CachePadded::new(AtomicU64::new(0)),
      fetches_joined: CachePadded::new(AtomicU64::new(0)),
      fetches_failed: CachePadded::new(AtomicU64::new(0)),
      refresh_ticks: CachePadded::new(AtomicU64::new(0)),
      optimistic_updates: CachePadded::new(AtomicU64::new(0)),
      invalidations: CachePadded::new(AtomicU64::new(0)),
      notifications: CachePadded::new(AtomicU64::new(0)),
      created_at: Instant::now(),
    }
  }
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub(crate) fn incr(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
  }

  /// Creates a point-in-time snapshot of the current metrics.
  pub(crate) fn snapshot(&self) -> MetricsSnapshot {
    let fresh_hits = self.fresh_hits.load(Ordering::Relaxed);
    let stale_hits = self.stale_hits.load(Ordering::Relaxed);
    let misses = self.misses.load(Ordering::Relaxed);
    let total_lookups = fresh_hits + stale_hits + misses;

    MetricsSnapshot {
      fresh_hits,
      stale_hits,
      misses,
      hit_ratio: if total_lookups == 0 {
        0.0
      } else {
        (fresh_hits + stale_hits) as f64 / total_lookups as f64
      },
      fallbacks: self.fallbacks.load(Ordering::Relaxed),
      fetches_started: self.fetches_started.load(Ordering::Relaxed),
      fetches_joined: self.fetches_joined.load(Ordering::Relaxed),
      fetches_failed: self.fetches_failed.load(Ordering::Relaxed),
      refresh_ticks: self.refresh_ticks.load(Ordering::Relaxed),
      optimistic_updates: self.optimistic_updates.load(Ordering::Relaxed),
      invalidations: self.invalidations.load(Ordering::Relaxed),
      notifications: self.notifications.load(Ordering::Relaxed),
      uptime_secs: self.created_at.elapsed().as_secs(),
    }
  }
}

/// A point-in-time, public-facing snapshot of the cache's metrics.
#[derive(Clone)]
pub struct MetricsSnapshot {
  /// Reads served from an entry inside its fresh window.
  pub fresh_hits: u64,
  /// Reads served from an entry inside its stale window (a refresh was triggered).
  pub stale_hits: u64,
  /// Reads that had to wait for a fetch (no entry, or past the stale window).
  pub misses: u64,
  /// The cache hit ratio ((fresh + stale) / all reads).
  pub hit_ratio: f64,
  /// Failed waited-on fetches answered with a previously cached value.
  pub fallbacks: u64,
  /// Fetches actually issued to a fetcher.
  pub fetches_started: u64,
  /// Callers that joined a fetch already in flight instead of starting one.
  pub fetches_joined: u64,
  /// Fetches that settled with an error or a panic.
  pub fetches_failed: u64,
  /// Auto-refresh timer ticks.
  pub refresh_ticks: u64,
  /// Applied optimistic updates.
  pub optimistic_updates: u64,
  /// Entries removed by `invalidate`.
  pub invalidations: u64,
  /// Subscriber callbacks invoked.
  pub notifications: u64,
  /// The number of seconds the cache has been running.
  pub uptime_secs: u64,
}

impl fmt::Debug for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MetricsSnapshot")
      .field("fresh_hits", &self.fresh_hits)
      .field("stale_hits", &self.stale_hits)
      .field("misses", &self.misses)
      .field("hit_ratio", &format!("{:.2}%", self.hit_ratio * 100.0))
      .field("fallbacks", &self.fallbacks)
      .field("fetches_started", &self.fetches_started)
      .field("fetches_joined", &self.fetches_joined)
      .field("fetches_failed", &self.fetches_failed)
      .field("refresh_ticks", &self.refresh_ticks)
      .field("optimistic_updates", &self.optimistic_updates)
      .field("invalidations", &self.invalidations)
      .field("notifications", &self.notifications)
      .field("uptime_secs", &self.uptime_secs)
      .finish()
  }
}
